use std::path::PathBuf;

use crate::{
    app::{Session, Suggestion},
    cli::{
        errors::{CliError, CliResult},
        validation::*,
    },
    feedback::StoreOutcome,
};

/// Command for suggesting tables
#[derive(Debug, Clone)]
pub struct IdentifyCommand {
    pub query: String,
    pub json: bool,
}

impl IdentifyCommand {
    pub fn new(words: Vec<String>, json: bool) -> CliResult<Self> {
        Ok(Self {
            query: join_query(&words)?,
            json,
        })
    }

    pub fn execute(self, session: &mut Session) -> CliResult<()> {
        match session.identify(&self.query)? {
            Suggestion::Suggested(resolution) => {
                if self.json {
                    println!("{}", serde_json::to_string_pretty(&resolution)?);
                    return Ok(());
                }

                if resolution.tables.is_empty() {
                    println!("No tables found, use `confirm` to teach the right ones");
                    return Ok(());
                }

                println!("{} ({:.2}, {} stage)", self.query, resolution.confidence, resolution.stage);
                for table in &resolution.tables {
                    println!("  {table}");
                }
                Ok(())
            }
            Suggestion::ManualFallback { attempts, tables } => {
                eprintln!("Learned state stayed busy after {attempts} attempts, pick tables manually:");
                for table in &tables {
                    println!("  {table}");
                }
                Ok(())
            }
        }
    }
}

/// Command for confirming or correcting a suggestion
#[derive(Debug, Clone)]
pub struct FeedbackCommand {
    pub query: String,
    pub tables: Vec<String>,
    pub correction: bool,
}

impl FeedbackCommand {
    pub fn new(words: Vec<String>, tables: &str, correction: bool) -> CliResult<Self> {
        Ok(Self {
            query: join_query(&words)?,
            tables: parse_tables(tables)?,
            correction,
        })
    }

    pub fn execute(self, session: &mut Session) -> CliResult<()> {
        let outcome = if self.correction {
            session.correct(&self.query, &self.tables)?
        } else {
            session.confirm(&self.query, &self.tables)?
        };

        match outcome {
            StoreOutcome::Created => println!("Learned '{}'", self.query),
            StoreOutcome::Updated => println!("Updated '{}'", self.query),
        }
        Ok(())
    }
}

/// Feedback history maintenance
#[derive(Debug, Clone)]
pub enum FeedbackAction {
    Top { n: usize },
    Export { dir: PathBuf },
    Import { dir: PathBuf },
    Clear { yes: bool },
}

impl FeedbackAction {
    pub fn validate(&self) -> CliResult<()> {
        match self {
            FeedbackAction::Top { n } => validate_top_n(*n),
            FeedbackAction::Import { dir } if !dir.is_dir() => Err(CliError::validation(
                "dir",
                format!("{} is not a directory", dir.display()),
            )),
            _ => Ok(()),
        }
    }

    pub fn execute(self, session: &mut Session) -> CliResult<()> {
        match self {
            FeedbackAction::Top { n } => {
                for (query, count) in session.top_queries(n)? {
                    println!("{count:>5}  {query}");
                }
            }
            FeedbackAction::Export { dir } => {
                let count = session.export_feedback(&dir)?;
                println!("{count} records exported to {}", dir.display());
            }
            FeedbackAction::Import { dir } => {
                let report = session.import_feedback(&dir)?;
                for (path, reason) in &report.skipped {
                    eprintln!("skipped {}: {reason}", path.display());
                }
                println!(
                    "{} created, {} updated, {} unchanged, {} skipped",
                    report.created,
                    report.updated,
                    report.unchanged,
                    report.skipped.len()
                );
            }
            FeedbackAction::Clear { yes } => {
                if !yes {
                    match inquire::prompt_confirmation("Delete all feedback records? (y/n)") {
                        inquire::error::InquireResult::Ok(true) => {}
                        inquire::error::InquireResult::Ok(false) => return Err(CliError::UserCancelled),
                        inquire::error::InquireResult::Err(err) => {
                            return Err(CliError::invalid_input(err.to_string()))
                        }
                    }
                }
                let count = session.clear_feedback()?;
                println!("{count} records deleted");
            }
        }
        Ok(())
    }
}

/// Command for training ingestion and templates
#[derive(Debug, Clone)]
pub struct TrainCommand {
    pub csv: PathBuf,
    pub show_progress: bool,
}

impl TrainCommand {
    pub fn new(csv: PathBuf, show_progress: bool) -> CliResult<Self> {
        if !csv.is_file() {
            return Err(CliError::validation("csv", format!("{} not found", csv.display())));
        }
        Ok(Self { csv, show_progress })
    }

    pub fn execute(self, session: &mut Session) -> CliResult<()> {
        let report = session.train(&self.csv, self.show_progress)?;
        println!(
            "{} records: {} patterns, {} synonyms, {} feedback, {} skipped",
            report.records, report.patterns, report.synonyms, report.feedback, report.skipped
        );
        Ok(())
    }
}
