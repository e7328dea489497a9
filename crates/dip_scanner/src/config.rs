use anyhow::{Context, Result};
use dip_detector::DipConfig;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::series::parse_series;
use crate::worker::DipJob;

const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub detector: DipConfig,
	#[serde(default)]
	pub scanner: ScannerConfig,
	#[serde(default)]
	pub jobs: Vec<JobConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScannerConfig {
	/// Jobs analysed at the same time.
	#[serde(default = "default_concurrency")]
	pub concurrency: usize,
	/// Report destination; stdout when unset.
	pub output: Option<String>,
}

impl Default for ScannerConfig {
	fn default() -> Self {
		Self { concurrency: DEFAULT_CONCURRENCY, output: None }
	}
}

const fn default_concurrency() -> usize {
	DEFAULT_CONCURRENCY
}

/// One series to analyse, given inline or as a file.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
	pub ticker: String,
	/// Analysis horizon in samples.
	pub interval: usize,
	pub series: Option<Vec<f64>>,
	pub path: Option<String>,
}

impl Config {
	pub fn load(path: &str) -> Result<Self> {
		let content = fs::read_to_string(path).with_context(|| format!("Failed to read config file: {path}"))?;

		Self::parse(&content)
	}

	pub fn parse(content: &str) -> Result<Self> {
		let config: Self = toml::from_str(content).with_context(|| "Failed to parse config file")?;

		config.validate()?;

		Ok(config)
	}

	fn validate(&self) -> Result<()> {
		validate_detector(&self.detector)?;

		if self.scanner.concurrency == 0 {
			anyhow::bail!("scanner concurrency must be greater than 0");
		}

		for job in &self.jobs {
			if job.ticker.trim().is_empty() {
				anyhow::bail!("every job needs a ticker");
			}

			match (&job.series, &job.path) {
				(Some(_), Some(_)) => anyhow::bail!("job {} sets both series and path", job.ticker),
				(None, None) => anyhow::bail!("job {} needs either series or path", job.ticker),
				_ => {},
			}
		}

		Ok(())
	}

	/// Materializes the configured jobs. Relative series paths resolve against `base_dir`.
	pub fn jobs(&self, base_dir: &Path) -> Result<Vec<DipJob>> {
		self.jobs
			.iter()
			.map(|job| -> Result<DipJob> {
				let series = match (&job.series, &job.path) {
					(Some(series), _) => series.clone(),
					(None, Some(path)) => {
						let path = base_dir.join(path);
						let content = fs::read_to_string(&path)
							.with_context(|| format!("Failed to read series for {}: {}", job.ticker, path.display()))?;
						parse_series(&content).with_context(|| format!("Invalid series for {}", job.ticker))?
					},
					(None, None) => anyhow::bail!("job {} needs either series or path", job.ticker),
				};

				Ok(DipJob { ticker: job.ticker.clone(), interval: job.interval, series, config: self.detector.clone() })
			})
			.collect()
	}
}

/// Rejects detector settings that cannot produce meaningful results.
pub fn validate_detector(detector: &DipConfig) -> Result<()> {
	if detector.min_width == 0 {
		anyhow::bail!("detector minWidth must be greater than 0");
	}

	if detector.stride == 0 {
		anyhow::bail!("detector stride must be greater than 0");
	}

	if detector.window_days == 0 {
		anyhow::bail!("detector windowDays must be greater than 0");
	}

	if detector.k < 0.0 {
		anyhow::bail!("detector k must be non-negative");
	}

	if detector.min_abs_depth < 0.0 {
		anyhow::bail!("detector minAbsDepth must be non-negative");
	}

	if detector.n0 <= 0.0 {
		anyhow::bail!("detector n0 must be positive");
	}

	if detector.scale_factors.as_ref().is_some_and(|factors| factors.contains(&0)) {
		anyhow::bail!("detector scaleFactors must all be greater than 0");
	}

	Ok(())
}
