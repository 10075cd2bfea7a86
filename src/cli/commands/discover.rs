//! Discover command: list the tasks a conversion would run

use super::Outcome;
use crate::cli::args::{DiscoverArgs, OutputFormat};
use crate::logging::setup_logging;
use crate::models::Task;
use crate::processor::BatchConverter;

use anyhow::Context;
use colored::*;
use std::collections::BTreeMap;

pub async fn run_discover(args: DiscoverArgs) -> anyhow::Result<Outcome> {
    setup_logging(args.common.get_log_level(), args.common.quiet, None)
        .context("Failed to set up logging")?;

    let config = args.load_config().context("Invalid configuration")?;
    let mut converter = BatchConverter::new(config)?;
    let tasks = converter
        .discover()
        .await
        .context("Task discovery failed")?;

    match args.output_format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&tasks)
                .context("Failed to serialise task list")?;
            println!("{}", json);
        }
        OutputFormat::Human => print_task_table(&tasks, converter.year_count()),
    }

    Ok(Outcome::Success)
}

/// Tasks grouped by `year/quarter`, in discovery order
pub fn print_task_table(tasks: &[Task], year_count: usize) {
    println!(
        "{} {} tasks across {} years",
        "Discovered".bright_green().bold(),
        tasks.len().to_string().bright_white().bold(),
        year_count.to_string().bright_white().bold()
    );

    let mut groups: BTreeMap<(&str, &str), Vec<&Task>> = BTreeMap::new();
    for task in tasks {
        groups
            .entry((task.year.as_str(), task.quarter.as_str()))
            .or_default()
            .push(task);
    }

    for ((year, quarter), group) in groups {
        println!("\n  {}", format!("{}/{}", year, quarter).bright_cyan());
        for task in group {
            println!(
                "    {} {}",
                task.stem.bright_white(),
                format!("-> {}", task.output_path.display()).bright_black()
            );
        }
    }
}
