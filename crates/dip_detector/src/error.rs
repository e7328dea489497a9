/// Failures of the detection API.
///
/// Only caller bugs and unusable input end up here. A segment that is too narrow, too shallow or
/// never recovers is a normal outcome and is reported through `DipMetrics::reason` instead.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DipError {
	#[error("invalid segment bounds [{start}, {end}] for series of length {len}")]
	InvalidSegment { start: usize, end: usize, len: usize },
	#[error("non-finite sample {value} at index {index}")]
	NonFiniteSample { index: usize, value: f64 },
}

/// Rejects series containing NaN or infinite samples.
pub fn validate_series(series: &[f64]) -> Result<(), DipError> {
	match series.iter().position(|value| !value.is_finite()) {
		Some(index) => Err(DipError::NonFiniteSample { index, value: series[index] }),
		None => Ok(()),
	}
}
