use anyhow::Result;

use crate::config::Config;
use crate::pipeline::Stage;

/// Print the task chain and the metadata the external scheduler runs it by.
pub fn print_plan(config: &Config) -> Result<()> {
    let pipeline = &config.pipeline;
    let start = pipeline.start()?;

    println!("pipeline {}", pipeline.name);
    println!("  owner: {}", pipeline.owner);
    println!("  start date: {}", start.format("%Y-%m-%d %H:%M"));
    println!("  schedule: {}", pipeline.schedule);
    println!("  catchup: {}", pipeline.catchup);
    println!();
    println!("  {:<4} {:<8} {:<14} UPSTREAM", "#", "STAGE", "TASK");
    for (i, stage) in Stage::ALL.iter().enumerate() {
        let upstream = stage
            .upstream()
            .map(|s| s.task_id().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<4} {:<8} {:<14} {}",
            i + 1,
            stage.name(),
            stage.task_id(),
            upstream
        );
    }
    println!();
    println!(
        "  {}",
        Stage::ALL
            .iter()
            .map(|s| s.task_id())
            .collect::<Vec<_>>()
            .join(" >> ")
    );

    Ok(())
}
