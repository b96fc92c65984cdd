use std::path::PathBuf;

use clap::Subcommand;

#[derive(Subcommand, Debug, Clone)]
pub enum FeedbackArgs {
    /// Most used queries
    Top {
        #[clap(short, default_value = "3")]
        n: usize,
    },
    /// Write one json document per record into a directory
    Export { dir: PathBuf },
    /// Merge exported documents from a directory
    Import { dir: PathBuf },
    /// Delete every feedback record
    Clear {
        /// Skip confirmation
        #[clap(short, long, default_value = "false")]
        yes: bool,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum SynonymArgs {
    /// Move session-learned synonyms into the default layer
    Promote {},
}
