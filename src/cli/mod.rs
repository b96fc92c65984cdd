use clap::{Parser, Subcommand};

mod commands;
mod errors;
mod handlers;
mod types;
mod validation;

pub use handlers::*;
pub use types::*;

#[derive(Parser, Debug)]
#[command(version, about = "Find the tables a question is about", long_about = None)]
pub struct Args {
    /// Database whose schema and learned state to use
    #[clap(long, global = true, env = "TABLESCOUT_DB", default_value = "default")]
    pub db: String,

    /// Show progress bars for long-running jobs
    #[clap(long, global = true, default_value = "false")]
    pub progress: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Suggest tables for a question
    Identify {
        /// The question, e.g. "orders placed last year"
        #[clap(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Print the result as json
        #[clap(long, default_value = "false")]
        json: bool,
    },
    /// Confirm the tables that answer a question
    Confirm {
        #[clap(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Comma separated `schema.table` list
        #[clap(short, long)]
        tables: String,
    },
    /// Replace a wrong suggestion with the right tables
    Correct {
        #[clap(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Comma separated `schema.table` list
        #[clap(short, long)]
        tables: String,
    },
    /// Manage feedback history
    Feedback {
        #[clap(subcommand)]
        action: FeedbackArgs,
    },
    /// Manage learned synonyms
    Synonyms {
        #[clap(subcommand)]
        action: SynonymArgs,
    },
    /// Ingest a training csv into the learned stores
    Train {
        /// Path to the csv
        csv: std::path::PathBuf,
    },
    /// Write a training csv template for the current schema
    Template {
        /// Output path
        #[clap(default_value = "training.csv")]
        output: std::path::PathBuf,
    },
    /// Print the current table weights
    Weights {},
    /// List the tables of the current schema
    Tables {},
    /// Show recent questions and their answers
    History {},
}
