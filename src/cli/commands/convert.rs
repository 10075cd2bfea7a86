//! Convert command implementation
//!
//! Builds the run configuration, opens the run directory and its main log,
//! runs the batch converter and prints the summary.

use super::Outcome;
use super::discover::print_task_table;
use crate::cli::args::ConvertArgs;
use crate::logging::{RunDirectory, setup_logging};
use crate::models::Report;
use crate::processor::BatchConverter;
use crate::processor::report::read_failed_list;

use anyhow::Context;
use colored::*;
use tracing::{debug, info};

pub async fn run_convert(args: ConvertArgs) -> anyhow::Result<Outcome> {
    let level = args.common.get_log_level();
    let config = args.load_config().context("Invalid configuration")?;

    let only = match &args.failed_list {
        Some(path) => Some(
            read_failed_list(path)
                .with_context(|| format!("Failed to load retry list {}", path.display()))?,
        ),
        None => None,
    };

    if args.dry_run {
        setup_logging(level, args.common.quiet, None).context("Failed to set up logging")?;
        let mut converter = BatchConverter::new(config)?;
        if let Some(only) = only {
            converter = converter.with_only(only);
        }
        let tasks = converter
            .discover()
            .await
            .context("Task discovery failed")?;
        print_task_table(&tasks, converter.year_count());
        println!("\n{}", "Dry run - nothing was written".bright_yellow());
        return Ok(Outcome::Success);
    }

    let run_dir = RunDirectory::create(&config.log_root).with_context(|| {
        format!(
            "Failed to create run directory under {}",
            config.log_root.display()
        )
    })?;
    setup_logging(level, args.common.quiet, Some(run_dir.main_log_path().as_path()))
        .context("Failed to set up logging")?;

    info!("Run directory: {}", run_dir.path().display());
    debug!("Configuration: {:?}", config);

    let mut converter = BatchConverter::new(config)?
        .with_run_directory(run_dir.clone())
        .with_progress(args.show_progress())
        .with_worker_level(level);
    if let Some(only) = only {
        converter = converter.with_only(only);
    }

    let report = match converter.run().await {
        Ok(report) => report,
        Err(e) if e.is_fatal() => return Err(e).context("Cannot start conversion run"),
        Err(e) => return Err(e).context("Conversion run failed"),
    };

    if !args.common.quiet {
        print_summary(&report, &run_dir);
    }

    Ok(if report.has_failures() {
        Outcome::TasksFailed
    } else {
        Outcome::Success
    })
}

fn print_summary(report: &Report, run_dir: &RunDirectory) {
    println!("\n{}", "Conversion Summary".bright_green().bold());
    println!(
        "  {} {}s",
        "Time elapsed:".bright_cyan(),
        report.elapsed_sec.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Tasks:".bright_cyan(),
        report.counts.total.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Converted:".bright_cyan(),
        report.counts.ok.to_string().bright_white().bold()
    );
    println!(
        "  {} {}",
        "Skipped:".bright_cyan(),
        report.counts.skip.to_string().bright_white()
    );

    if report.has_failures() {
        println!(
            "  {} {}",
            "Failed:".bright_red(),
            report.counts.fail.to_string().bright_red().bold()
        );
        for result in report.failures() {
            println!(
                "    {} {} {}",
                result.stem.bright_red(),
                result.reason,
                format!("({}/{})", result.year, result.quarter).bright_black()
            );
        }
        println!(
            "  {} {}",
            "Failed list:".bright_cyan(),
            run_dir.failed_list_path().display()
        );
        println!(
            "  {} faers-decode convert --failed-list {}",
            "Retry with:".bright_cyan(),
            run_dir.failed_list_path().display()
        );
    }

    if report.counts.total > 0 {
        println!(
            "  {} {}",
            "Report:".bright_cyan(),
            run_dir.report_path().display()
        );
    }
}
