use chrono::{DateTime, Utc};
use dip_detector::{DipConfig, DipMetrics, find_dips_optimal_for_interval, validate_series};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

/// A request to analyse one series.
#[derive(Debug, Clone)]
pub struct DipJob {
	pub ticker: String,
	pub interval: usize,
	pub series: Vec<f64>,
	pub config: DipConfig,
}

/// The answer to exactly one [`DipJob`]. `dips` is empty when the job could not be analysed.
#[derive(Debug, Clone, Serialize)]
pub struct DipReport {
	pub ticker: String,
	pub interval: usize,
	pub samples: usize,
	pub dips: Vec<DipMetrics>,
	pub analyzed_at: DateTime<Utc>,
}

/// Runs detection for `job` on the blocking pool.
///
/// Never fails: invalid input or a crashed detection task is logged and answered with an empty
/// dip list.
pub async fn run_job(job: DipJob) -> DipReport {
	let DipJob { ticker, interval, series, config } = job;
	let samples = series.len();

	let dips = if let Err(err) = validate_series(&series) {
		warn!(ticker = %ticker, error = %err, "Skipping series with invalid samples");
		Vec::new()
	} else {
		match tokio::task::spawn_blocking(move || find_dips_optimal_for_interval(&series, interval, &config)).await {
			Ok(dips) => dips,
			Err(err) => {
				warn!(ticker = %ticker, error = %err, "Dip detection task failed");
				Vec::new()
			},
		}
	};

	debug!(ticker = %ticker, samples, dips = dips.len(), "Job finished");

	DipReport { ticker, interval, samples, dips, analyzed_at: Utc::now() }
}

/// Runs every job with at most `concurrency` in flight. Reports come back in completion order.
pub async fn scan_all(jobs: Vec<DipJob>, concurrency: usize) -> Vec<DipReport> {
	let total = jobs.len();
	info!(jobs = total, concurrency, "Starting scan");

	let reports: Vec<DipReport> = stream::iter(jobs).map(run_job).buffer_unordered(concurrency.max(1)).collect().await;

	let dips: usize = reports.iter().map(|report| report.dips.len()).sum();
	info!(jobs = total, dips, "Scan complete");

	reports
}

#[cfg(test)]
mod tests {
	use super::*;

	fn job(ticker: &str, series: Vec<f64>) -> DipJob {
		DipJob {
			ticker: ticker.to_string(),
			interval: 30,
			series,
			config: DipConfig { min_width: 1, k: 0.1, smoothing_window: 1, ..DipConfig::default() },
		}
	}

	#[tokio::test]
	async fn test_run_job_detects_dip() {
		let report = run_job(job("AAA", vec![10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0])).await;

		assert_eq!(report.ticker, "AAA");
		assert_eq!(report.interval, 30);
		assert_eq!(report.samples, 7);
		assert_eq!(report.dips.len(), 1);
		assert_eq!(report.dips[0].seg_min_index, 3);
	}

	#[tokio::test]
	async fn test_run_job_invalid_series_yields_empty_report() {
		let report = run_job(job("BAD", vec![10.0, f64::NAN, 10.0, 2.0])).await;

		assert_eq!(report.ticker, "BAD");
		assert_eq!(report.samples, 4);
		assert!(report.dips.is_empty());
	}

	#[tokio::test]
	async fn test_scan_all_answers_every_job() {
		let jobs = vec![
			job("AAA", vec![10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0]),
			job("BBB", vec![5.0; 8]),
			job("CCC", vec![1.0]),
		];

		let mut reports = scan_all(jobs, 2).await;
		reports.sort_by(|a, b| a.ticker.cmp(&b.ticker));

		let tickers: Vec<&str> = reports.iter().map(|report| report.ticker.as_str()).collect();
		assert_eq!(tickers, vec!["AAA", "BBB", "CCC"]);
		assert_eq!(reports[0].dips.len(), 1);
		assert!(reports[1].dips.is_empty());
		assert!(reports[2].dips.is_empty());
	}

	#[tokio::test]
	async fn test_report_serializes_flat_metrics() {
		let report = run_job(job("AAA", vec![10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0])).await;
		let json = serde_json::to_value(&report).unwrap();

		assert_eq!(json["ticker"], "AAA");
		assert_eq!(json["dips"][0]["seg_min_index"], 3);
		assert_eq!(json["dips"][0]["detection_scale"], "fast");
		assert!(json["analyzed_at"].is_string());
	}
}
