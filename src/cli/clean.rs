use crate::config::PipelineConfig;
use crate::types::{CleanLevel, Registry};

use super::init_store;
use super::prompt::confirm_action;

pub fn run_clean(
    config: &PipelineConfig,
    registry: String,
    level: String,
    yes: bool,
    non_interactive: bool,
) -> anyhow::Result<()> {
    let registry: Registry = registry.parse()?;
    let level: CleanLevel = level.parse()?;
    let store = init_store(config)?;

    let message = format!("Delete {registry} data from the {level} level down?");
    if !confirm_action(&message, yes, non_interactive)? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = store.clean(registry, level)?;
    println!("Cleaned {registry} from {level}:");
    for (table, rows) in removed {
        println!("  {table:<14} {rows}");
    }
    Ok(())
}
