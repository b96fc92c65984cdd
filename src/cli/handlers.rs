use std::path::PathBuf;

use anyhow::Result;

use crate::{
    app::Session,
    cli::commands::{FeedbackAction, FeedbackCommand, IdentifyCommand, TrainCommand},
};

use super::types::{FeedbackArgs, SynonymArgs};

pub fn handle_identify(query: Vec<String>, json: bool, session: &mut Session) -> Result<()> {
    let command = IdentifyCommand::new(query, json)?;
    command.execute(session).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_feedback(query: Vec<String>, tables: String, correction: bool, session: &mut Session) -> Result<()> {
    let command = FeedbackCommand::new(query, &tables, correction)?;
    command.execute(session).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_feedback_action(action: FeedbackArgs, session: &mut Session) -> Result<()> {
    let action = match action {
        FeedbackArgs::Top { n } => FeedbackAction::Top { n },
        FeedbackArgs::Export { dir } => FeedbackAction::Export { dir },
        FeedbackArgs::Import { dir } => FeedbackAction::Import { dir },
        FeedbackArgs::Clear { yes } => FeedbackAction::Clear { yes },
    };

    action.validate()?;
    action.execute(session).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_synonyms(action: SynonymArgs, session: &mut Session) -> Result<()> {
    match action {
        SynonymArgs::Promote {} => {
            let promoted = session.promote_synonyms()?;
            let (dynamic, defaults) = session.synonym_layers();
            println!("{promoted} synonym pairings promoted ({dynamic} dynamic, {defaults} default)");
        }
    }
    Ok(())
}

pub fn handle_train(csv: PathBuf, show_progress: bool, session: &mut Session) -> Result<()> {
    let command = TrainCommand::new(csv, show_progress)?;
    command.execute(session).map_err(|e| anyhow::anyhow!(e))
}

pub fn handle_template(output: PathBuf, session: &Session) -> Result<()> {
    let rows = session.write_template(&output)?;
    println!("{rows} rows written to {}", output.display());
    Ok(())
}

pub fn handle_weights(session: &Session) -> Result<()> {
    for (table, weight) in session.weights().iter() {
        println!("{weight:>8.4}  {table}");
    }
    Ok(())
}

pub fn handle_tables(session: &Session) -> Result<()> {
    if session.schema().is_empty() {
        println!("No schema loaded, put schema.json in {}", session.paths().db_path.display());
        return Ok(());
    }
    for table in session.schema().tables() {
        println!("{} ({} columns)", table.id, table.columns.len());
    }
    Ok(())
}

pub fn handle_history(session: &Session) -> Result<()> {
    let mut empty = true;
    for entry in session.history() {
        empty = false;
        let mark = if entry.confirmed { "confirmed" } else { "suggested" };
        let tables: Vec<String> = entry.tables.iter().map(|t| t.to_string()).collect();
        println!("{mark:>9}  {}  ->  {}", entry.query, tables.join(", "));
    }
    if empty {
        println!("No recent questions");
    }
    Ok(())
}
