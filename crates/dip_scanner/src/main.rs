use std::fs;
use std::path::Path;

use anyhow::Context;
use dip_detector::{detect_dip, find_all_dips, find_dips_optimal_for_interval};
use tracing::info;

use crate::{
	cli::{Command, DetectArgs, ScanArgs},
	config::Config,
	series::parse_series,
	worker::scan_all,
};

mod cli;
mod config;
mod series;
mod worker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
		)
		.with_writer(std::io::stderr)
		.init();

	let args: Vec<String> = std::env::args().skip(1).collect();
	let Some(command) = cli::parse_args(&args)? else {
		return Ok(());
	};

	match command {
		Command::Scan(args) => run_scan(&args).await,
		Command::Detect(args) => run_detect(&args),
	}
}

async fn run_scan(args: &ScanArgs) -> anyhow::Result<()> {
	let config = Config::load(&args.config).context("Failed to load configuration")?;
	info!(path = %args.config, jobs = config.jobs.len(), "Configuration loaded");

	let base_dir = Path::new(&args.config).parent().unwrap_or_else(|| Path::new("."));
	let jobs = config.jobs(base_dir).context("Failed to prepare jobs")?;

	let mut reports = scan_all(jobs, config.scanner.concurrency).await;
	reports.sort_by(|a, b| a.ticker.cmp(&b.ticker));

	let json = serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?;

	match &config.scanner.output {
		Some(path) => {
			fs::write(path, json).with_context(|| format!("Failed to write report: {path}"))?;
			info!(path = %path, reports = reports.len(), "Report written");
		},
		None => println!("{json}"),
	}

	Ok(())
}

fn run_detect(args: &DetectArgs) -> anyhow::Result<()> {
	config::validate_detector(&args.config)?;
	let series = parse_series(&args.series).context("Failed to parse --series")?;

	if let Some((start, end)) = args.segment() {
		let metrics = detect_dip(&series, start, end, &args.config)?;

		if args.json {
			println!("{}", serde_json::to_string_pretty(&metrics).context("Failed to serialize metrics")?);
		} else {
			println!("{}", cli::format_classification(&metrics));
		}

		return Ok(());
	}

	let dips = match args.interval {
		Some(interval) => find_dips_optimal_for_interval(&series, interval, &args.config),
		None => find_all_dips(&series, &args.config),
	};

	if args.json {
		println!("{}", serde_json::to_string_pretty(&dips).context("Failed to serialize dips")?);
	} else if dips.is_empty() {
		println!("No dips found");
	} else {
		for (rank, dip) in dips.iter().enumerate() {
			println!("{}", cli::format_dip_line(rank + 1, dip));
		}
	}

	Ok(())
}
