/// Floor for any scale estimate handed to the scorer.
pub const SCALE_EPSILON: f64 = 1e-9;

/// MAD equivalent of one interquartile range for normal data.
const IQR_TO_MAD: f64 = 1.349;
const STD_TO_MAD: f64 = 1.4826;

/// Median of `values`; NaN when empty.
#[must_use]
pub fn median(values: &[f64]) -> f64 {
	if values.is_empty() {
		return f64::NAN;
	}

	let sorted = sorted_copy(values);
	let mid = sorted.len() / 2;

	if sorted.len() % 2 == 1 { sorted[mid] } else { (sorted[mid - 1] + sorted[mid]) / 2.0 }
}

/// Median absolute deviation around `center` (the median when `None`).
#[must_use]
pub fn mad(values: &[f64], center: Option<f64>) -> f64 {
	if values.is_empty() {
		return 0.0;
	}

	let center = center.unwrap_or_else(|| median(values));
	let deviations: Vec<f64> = values.iter().map(|value| (value - center).abs()).collect();

	median(&deviations)
}

/// Interquartile range from the `floor(0.25n)` and `floor(0.75n)` order statistics.
#[must_use]
pub fn iqr(values: &[f64]) -> f64 {
	let n = values.len();
	if n < 4 {
		return 0.0;
	}

	let sorted = sorted_copy(values);
	let q1 = sorted[n / 4];
	let q3 = sorted[(3 * n) / 4];

	q3 - q1
}

#[must_use]
pub fn mean(values: &[f64]) -> f64 {
	if values.is_empty() {
		return f64::NAN;
	}

	values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
	if values.is_empty() {
		return f64::NAN;
	}

	let mean = mean(values);
	let variance = values.iter().map(|value| (value - mean).powi(2)).sum::<f64>() / values.len() as f64;

	variance.sqrt()
}

/// Mean after dropping `max(1, floor(n * fraction))` values from each end.
///
/// Fewer than three values fall back to the plain mean (zero for an empty slice), as does a trim
/// that would leave nothing behind.
#[must_use]
pub fn trimmed_mean(values: &[f64], fraction: f64) -> f64 {
	if values.len() < 3 {
		return if values.is_empty() { 0.0 } else { mean(values) };
	}

	let sorted = sorted_copy(values);
	let trim = ((sorted.len() as f64 * fraction) as usize).max(1);

	if 2 * trim >= sorted.len() {
		return mean(values);
	}

	mean(&sorted[trim..sorted.len() - trim])
}

/// Robust spread of `context` around `center`.
///
/// Cascades MAD -> IQR / 1.349 -> std / 1.4826 and never returns less than [`SCALE_EPSILON`], so
/// the result is always safe to divide by.
#[must_use]
pub fn robust_scale(context: &[f64], center: f64) -> f64 {
	let mad = mad(context, Some(center));
	if mad > 0.0 {
		return mad;
	}

	let iqr = iqr(context);
	if iqr > 0.0 {
		return iqr / IQR_TO_MAD;
	}

	let std = std_dev(context);
	if std > 0.0 { std / STD_TO_MAD } else { SCALE_EPSILON }
}

/// Centered moving median with edge padding.
///
/// The window for sample `i` spans `i - w/2 .. i - w/2 + w`, clamped to the series edges. A window
/// of one or less returns the series unchanged.
#[must_use]
pub fn moving_median(series: &[f64], window: usize) -> Vec<f64> {
	if window <= 1 || series.is_empty() {
		return series.to_vec();
	}

	let last = series.len() - 1;
	let pad = window / 2;
	let mut buffer = Vec::with_capacity(window);

	(0..series.len())
		.map(|i| {
			buffer.clear();
			buffer.extend((i..i + window).map(|j| series[j.saturating_sub(pad).min(last)]));
			median(&buffer)
		})
		.collect()
}

pub(crate) fn min_max(values: &[f64]) -> (f64, f64) {
	values
		.iter()
		.fold((f64::INFINITY, f64::NEG_INFINITY), |(low, high), &value| (low.min(value), high.max(value)))
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
	let mut sorted = values.to_vec();
	sorted.sort_by(f64::total_cmp);
	sorted
}
