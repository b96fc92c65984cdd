use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod config;
mod eid;
mod feedback;
mod learned;
mod linguistic;
mod lock;
mod resolver;
mod schema;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;
mod training;

use app::{AppFactory, Session};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let args = cli::Args::parse();

    let paths = AppFactory::get_paths(&args.db)?;
    let config = AppFactory::create_config(&paths)?;
    let embedder = AppFactory::create_embedder(&config.embedding, &paths)?;
    let analyzer = AppFactory::create_analyzer();
    let mut session = Session::open(paths, config, embedder, analyzer)?;

    match args.command {
        cli::Command::Identify { query, json } => cli::handle_identify(query, json, &mut session)?,
        cli::Command::Confirm { query, tables } => cli::handle_feedback(query, tables, false, &mut session)?,
        cli::Command::Correct { query, tables } => cli::handle_feedback(query, tables, true, &mut session)?,
        cli::Command::Feedback { action } => cli::handle_feedback_action(action, &mut session)?,
        cli::Command::Synonyms { action } => cli::handle_synonyms(action, &mut session)?,
        cli::Command::Train { csv } => cli::handle_train(csv, args.progress, &mut session)?,
        cli::Command::Template { output } => cli::handle_template(output, &session)?,
        cli::Command::Weights {} => cli::handle_weights(&session)?,
        cli::Command::Tables {} => cli::handle_tables(&session)?,
        cli::Command::History {} => cli::handle_history(&session)?,
    }

    session.save()?;
    Ok(())
}
