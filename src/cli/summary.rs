use crate::config::PipelineConfig;
use crate::pipeline::analysis::{self, Summary};
use crate::types::Registry;

use super::init_store;

pub fn run_summary(config: &PipelineConfig, registry: String, json: bool) -> anyhow::Result<()> {
    let registry: Registry = registry.parse()?;
    let store = init_store(config)?;
    let summary = analysis::summarize(&store, registry)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

pub(super) fn print_summary(summary: &Summary) {
    let title = format!("{} adoption", summary.registry);
    println!();
    println!("{title}");
    println!("{}", "─".repeat(title.chars().count()));
    println!("Packages:   {}", summary.packages);
    println!("Versions:   {}", summary.versions);
    println!(
        "Artifacts:  {} ({} signed)",
        summary.artifacts, summary.signed_artifacts
    );

    if !summary.statuses.is_empty() {
        println!();
        println!("Signature status:");
        for (status, count) in &summary.statuses {
            println!("  {status:<8} {count}");
        }
    }

    if !summary.key_sizes.is_empty() {
        println!();
        println!("Key sizes:");
        for size in &summary.key_sizes {
            let algo = size
                .algo
                .map_or_else(|| "?".to_string(), |algo| algo.to_string());
            println!("  algo {algo:<3} {:>5} bits  {}", size.bits, size.count);
        }
    }
    println!();
}
