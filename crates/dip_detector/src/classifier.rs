use crate::config::{DEFAULT_CONTEXT_WINDOW, DipConfig};
use crate::error::DipError;
use crate::metrics::{DipMetrics, RejectReason, ScaleProvenance};
use crate::stats::{robust_scale, trimmed_mean};

const TRIM_FRACTION: f64 = 0.1;
/// Segments ending this close to the last sample have no usable recovery data yet.
const ONGOING_TAIL: usize = 3;
const NORMALIZER_EPSILON: f64 = 1e-12;

/// Classifies the inclusive segment `[start, end]` of `series` as a dip or not.
///
/// The verdict is `metrics.is_dip`, with `metrics.reason` explaining a rejection. Bounds outside
/// the series are a caller bug and come back as [`DipError::InvalidSegment`].
pub fn detect_dip(series: &[f64], start: usize, end: usize, config: &DipConfig) -> Result<DipMetrics, DipError> {
	let n = series.len();
	if end >= n || end < start {
		return Err(DipError::InvalidSegment { start, end, len: n });
	}

	let segment = &series[start..=end];
	let width = end - start + 1;
	let (seg_min_offset, seg_min) = segment_minimum(segment);
	let seg_min_index = start + seg_min_offset;

	if width < config.min_width {
		return Ok(narrow_segment(start, end, seg_min, seg_min_index, config));
	}

	let pre_window = config.pre_window.unwrap_or(DEFAULT_CONTEXT_WINDOW);
	let post_window = config.post_window.unwrap_or(DEFAULT_CONTEXT_WINDOW);

	let pre = &series[start.saturating_sub(pre_window)..start];
	let post = &series[end + 1..(end + 1).saturating_add(post_window).min(n)];
	let outside: Vec<f64> = series[..start].iter().chain(&series[end + 1..]).copied().collect();

	let is_ongoing = end + ONGOING_TAIL >= n || post.is_empty();

	// Depressed post-dip samples of an unfinished dip would drag the baseline down with them.
	let mut local_context: Vec<f64> = pre.to_vec();
	if !is_ongoing {
		local_context.extend_from_slice(post);
	}
	if local_context.len() < config.min_width.max(5) {
		local_context.clone_from(&outside);
	}
	if local_context.len() < 3 {
		local_context = series.to_vec();
	}

	let local_median = trimmed_mean(&local_context, TRIM_FRACTION);
	let local_mad = robust_scale(&local_context, local_median);

	let global_median = if outside.is_empty() {
		trimmed_mean(series, TRIM_FRACTION)
	} else {
		trimmed_mean(&outside, TRIM_FRACTION)
	};

	let alpha = 1.0 - (-(n as f64) / config.n0).exp();

	let baseline = if is_ongoing || local_median > global_median {
		local_median.max(global_median)
	} else {
		alpha * global_median + (1.0 - alpha) * local_median
	};

	let depth = baseline - seg_min;
	let depth_threshold = config.min_abs_depth.max(config.k * local_mad);
	let passes_depth = depth >= depth_threshold;

	let left_ref = if pre.is_empty() { baseline } else { trimmed_mean(pre, TRIM_FRACTION) };
	let right_ref = if post.is_empty() { baseline } else { trimmed_mean(post, TRIM_FRACTION) };
	let prominence = (left_ref + right_ref) / 2.0 - seg_min;

	let recovered = if config.require_recovery && !post.is_empty() {
		let probe = RecoveryProbe { series, end, post, post_window, baseline, local_mad, seg_min, depth };
		probe.recovered(depth_threshold)
	} else {
		true
	};

	let area: f64 = segment.iter().map(|value| baseline - value).sum();
	let confidence = confidence_score(depth, area, prominence, width, local_mad);

	let is_dip = passes_depth && (recovered || !config.require_recovery);
	let reason = if !passes_depth {
		Some(RejectReason::DepthBelowThreshold)
	} else if config.require_recovery && !recovered {
		Some(RejectReason::NoRecovery)
	} else {
		None
	};

	Ok(DipMetrics {
		start,
		end,
		width,
		baseline,
		local_median,
		local_mad,
		global_median,
		alpha,
		seg_min,
		seg_min_index,
		depth,
		depth_threshold,
		prominence,
		area,
		recovered,
		is_ongoing,
		confidence,
		is_dip,
		reason,
		k: config.k,
		min_abs_depth: config.min_abs_depth,
		provenance: ScaleProvenance::default(),
	})
}

/// Bounded score from depth, mean depth per sample and prominence, each in units of local MAD.
fn confidence_score(depth: f64, area: f64, prominence: f64, width: usize, local_mad: f64) -> f64 {
	let scale = local_mad + NORMALIZER_EPSILON;

	let depth_score = depth / scale;
	let area_score = area / (scale * width as f64);
	let prominence_score = prominence / scale;

	let raw = 0.4 * depth_score + 0.3 * area_score + 0.3 * prominence_score;
	((raw / 3.0).tanh() * 1.2).clamp(0.0, 1.0)
}

struct RecoveryProbe<'a> {
	series: &'a [f64],
	end: usize,
	post: &'a [f64],
	post_window: usize,
	baseline: f64,
	local_mad: f64,
	seg_min: f64,
	depth: f64,
}

impl RecoveryProbe<'_> {
	fn recovered(&self, depth_threshold: f64) -> bool {
		let depth_ratio = if depth_threshold > 0.0 { self.depth / depth_threshold } else { 0.0 };
		let tolerance = 0.5 * self.local_mad;

		if depth_ratio > 3.0 {
			// deep dips get twice the window, and the deepest a looser tolerance too
			let extended_end =
				(self.end + 1).saturating_add(self.post_window.saturating_mul(2)).min(self.series.len());
			let extended = &self.series[self.end + 1..extended_end];

			return self.returns_to_baseline(extended, tolerance)
				|| (depth_ratio > 5.0 && self.returns_to_baseline(extended, self.local_mad));
		}

		self.returns_to_baseline(self.post, tolerance) || self.improves_steadily()
	}

	fn returns_to_baseline(&self, values: &[f64], tolerance: f64) -> bool {
		values.iter().any(|value| (value - self.baseline).abs() <= tolerance)
	}

	/// Second half of the post window sits clearly farther above the minimum than the first.
	fn improves_steadily(&self) -> bool {
		if self.post.len() < 5 {
			return false;
		}

		let (first, second) = self.post.split_at(self.post.len() / 2);
		if first.len() < 2 || second.len() < 2 {
			return false;
		}

		let mean_distance = |values: &[f64]| {
			values.iter().map(|value| (value - self.seg_min).abs()).sum::<f64>() / values.len() as f64
		};

		mean_distance(second) - mean_distance(first) >= 0.3 * self.depth
	}
}

/// First occurrence of the segment minimum as `(offset, value)`.
fn segment_minimum(segment: &[f64]) -> (usize, f64) {
	segment
		.iter()
		.copied()
		.enumerate()
		.fold((0, f64::INFINITY), |best, (i, value)| if value < best.1 { (i, value) } else { best })
}

fn narrow_segment(start: usize, end: usize, seg_min: f64, seg_min_index: usize, config: &DipConfig) -> DipMetrics {
	DipMetrics {
		start,
		end,
		width: end - start + 1,
		baseline: 0.0,
		local_median: 0.0,
		local_mad: 0.0,
		global_median: 0.0,
		alpha: 0.0,
		seg_min,
		seg_min_index,
		depth: 0.0,
		depth_threshold: 0.0,
		prominence: 0.0,
		area: 0.0,
		recovered: false,
		is_ongoing: false,
		confidence: 0.0,
		is_dip: false,
		reason: Some(RejectReason::WidthBelowMin),
		k: config.k,
		min_abs_depth: config.min_abs_depth,
		provenance: ScaleProvenance::default(),
	}
}
