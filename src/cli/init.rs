use std::fs;

use crate::config::PipelineConfig;
use crate::store::SqliteStore;

pub fn run_init(config: &PipelineConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.data_dir)?;

    let db_path = config.db_path();
    let existed = db_path.exists();
    let store = SqliteStore::new(&db_path)?;
    store.initialize()?;

    if existed {
        println!("Database at {} is up to date.", db_path.display());
    } else {
        println!("Initialized database at {}", db_path.display());
    }
    Ok(())
}
