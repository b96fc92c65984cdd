use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use homedir::my_home;

use crate::app::errors::AppError;
use crate::config::{Config, EmbeddingConfig};
use crate::linguistic::{Analyzer, RuleAnalyzer};
use crate::semantic::{Embedder, HashingEmbedder};

pub const SCHEMA_FILE: &str = "schema.json";
pub const TRAINING_FILE: &str = "training.csv";
pub const HISTORY_FILE: &str = "history.yaml";

/// Where a database's learned state lives.
///
/// `<base>/config.yaml` is shared; everything else sits under `<base>/<db>/`.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub base_path: PathBuf,
    pub db_path: PathBuf,
    pub db_name: String,
}

impl AppPaths {
    pub fn schema_file(&self) -> PathBuf {
        self.db_path.join(SCHEMA_FILE)
    }

    pub fn training_file(&self) -> PathBuf {
        self.db_path.join(TRAINING_FILE)
    }

    pub fn weights_file(&self) -> PathBuf {
        self.db_path.join(crate::learned::weights::FILE_NAME)
    }

    pub fn history_file(&self) -> PathBuf {
        self.db_path.join(HISTORY_FILE)
    }

    pub fn feedback_dir(&self) -> PathBuf {
        self.db_path.join("feedback")
    }
}

pub struct AppFactory;

impl AppFactory {
    /// Resolve and create the directories for database `db_name`.
    pub fn get_paths(db_name: &str) -> Result<AppPaths> {
        let base_path = Self::get_base_path()?;
        Self::paths_in(&base_path, db_name)
    }

    pub fn paths_in(base_path: &Path, db_name: &str) -> Result<AppPaths> {
        Self::validate_db_name(db_name)?;
        let db_path = base_path.join(db_name);

        std::fs::create_dir_all(&db_path)
            .context("Failed to create database directory")?;

        Ok(AppPaths {
            base_path: base_path.to_path_buf(),
            db_path,
            db_name: db_name.to_string(),
        })
    }

    pub fn create_config(paths: &AppPaths) -> Result<Config, AppError> {
        Ok(Config::load_with(&paths.base_path)?)
    }

    pub fn create_embedder(config: &EmbeddingConfig, paths: &AppPaths) -> Result<Arc<dyn Embedder>, AppError> {
        match config.backend.as_str() {
            "hashing" => {
                log::info!("using hashing embedder ({} dimensions)", config.dimensions);
                Ok(Arc::new(HashingEmbedder::new(config.dimensions)))
            }
            #[cfg(feature = "fastembed")]
            "fastembed" => Ok(Arc::new(crate::semantic::FastEmbedder::new(
                &config.model,
                paths.base_path.clone(),
            )?)),
            other => {
                let _ = paths;
                Err(anyhow::anyhow!("embedding backend '{other}' is not available in this build").into())
            }
        }
    }

    pub fn create_analyzer() -> Arc<dyn Analyzer> {
        Arc::new(RuleAnalyzer::new())
    }

    /// `TABLESCOUT_BASE_PATH`, or `~/.local/share/tablescout`
    fn get_base_path() -> Result<PathBuf> {
        if let Ok(base_path) = std::env::var("TABLESCOUT_BASE_PATH") {
            return Ok(PathBuf::from(base_path));
        }

        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/tablescout"))
    }

    fn validate_db_name(db_name: &str) -> Result<()> {
        let valid = !db_name.is_empty()
            && db_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            anyhow::bail!("database name '{db_name}' may only contain letters, digits, '-' and '_'");
        }
        Ok(())
    }
}
