mod classify;
mod clean;
mod commands;
mod init;
pub mod prompt;
mod stage;
mod summary;

pub use classify::run_classify;
pub use clean::run_clean;
pub use commands::{Commands, StageArgs};
pub use init::run_init;
pub use stage::run_stage;
pub use summary::run_summary;

use std::path::Path;

use crate::config::PipelineConfig;
use crate::store::SqliteStore;

/// Open the configured store, checking it was initialized
pub fn init_store(config: &PipelineConfig) -> anyhow::Result<SqliteStore> {
    let db_path = config.db_path();

    if !db_path.exists() {
        anyhow::bail!(
            "Database not found at {}. Run 'sigadopt init' first.",
            db_path.display()
        );
    }

    SqliteStore::new(&db_path).map_err(Into::into)
}

/// Config file (if any) with command-line overrides applied
pub fn load_config(path: Option<&str>, data_dir: Option<&str>) -> anyhow::Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(Path::new(path))?,
        None => PipelineConfig::default(),
    };
    if let Some(data_dir) = data_dir {
        config.data_dir = data_dir.into();
    }
    Ok(config)
}
