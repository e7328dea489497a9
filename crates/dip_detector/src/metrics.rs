use serde::Serialize;

/// A local minimum found before classification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalMinimum {
	pub index: usize,
	pub value: f64,
	pub prominence: f64,
	/// The trailing-descent candidate at the end of the series.
	pub open_ended: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
	WidthBelowMin,
	DepthBelowThreshold,
	NoRecovery,
}

impl std::fmt::Display for RejectReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::WidthBelowMin => write!(f, "width_below_min"),
			Self::DepthBelowThreshold => write!(f, "depth_below_threshold"),
			Self::NoRecovery => write!(f, "no_recovery"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionScale {
	Fast,
	Medium,
	Slow,
}

impl DetectionScale {
	#[must_use]
	pub const fn from_factor(scale_factor: u32) -> Self {
		match scale_factor {
			0 | 1 => Self::Fast,
			2 => Self::Medium,
			_ => Self::Slow,
		}
	}
}

impl std::fmt::Display for DetectionScale {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Fast => write!(f, "fast"),
			Self::Medium => write!(f, "medium"),
			Self::Slow => write!(f, "slow"),
		}
	}
}

/// Which smoothing scales produced a dip. Empty for direct classification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScaleProvenance {
	pub scale_factor: Option<u32>,
	pub detection_scale: Option<DetectionScale>,
	pub detected_at_scales: Option<usize>,
	pub scale_list: Option<Vec<u32>>,
}

impl ScaleProvenance {
	#[must_use]
	pub const fn at_scale(scale_factor: u32) -> Self {
		Self {
			scale_factor: Some(scale_factor),
			detection_scale: Some(DetectionScale::from_factor(scale_factor)),
			detected_at_scales: None,
			scale_list: None,
		}
	}

	/// Same origin scale, annotated with every scale that confirmed it.
	#[must_use]
	pub fn with_scales(&self, scales: Vec<u32>) -> Self {
		Self { detected_at_scales: Some(scales.len()), scale_list: Some(scales), ..self.clone() }
	}

	pub(crate) fn factor(&self) -> u32 {
		self.scale_factor.unwrap_or(1)
	}
}

/// Everything measured about one candidate segment.
///
/// `start`/`end` are inclusive. `reason` is set only when `is_dip` is false.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DipMetrics {
	pub start: usize,
	pub end: usize,
	pub width: usize,

	pub baseline: f64,
	pub local_median: f64,
	pub local_mad: f64,
	pub global_median: f64,
	pub alpha: f64,

	pub seg_min: f64,
	pub seg_min_index: usize,

	pub depth: f64,
	pub depth_threshold: f64,
	pub prominence: f64,
	pub area: f64,

	pub recovered: bool,
	pub is_ongoing: bool,
	pub confidence: f64,

	pub is_dip: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reason: Option<RejectReason>,

	pub k: f64,
	pub min_abs_depth: f64,

	#[serde(flatten)]
	pub provenance: ScaleProvenance,
}

impl DipMetrics {
	/// Shifts all positions by `offset`, for dips found inside a sub-window.
	#[must_use]
	pub fn translated(&self, offset: usize) -> Self {
		Self {
			start: self.start + offset,
			end: self.end + offset,
			seg_min_index: self.seg_min_index + offset,
			..self.clone()
		}
	}

	/// Re-derives the position-dependent fields against a series of `len` samples.
	#[must_use]
	pub fn normalized(&self, len: usize) -> Self {
		let end = self.end.min(len.saturating_sub(1));
		let start = self.start.min(end);

		Self {
			start,
			end,
			width: end - start + 1,
			seg_min_index: self.seg_min_index.clamp(start, end),
			is_ongoing: end + 3 >= len,
			confidence: self.confidence.clamp(0.0, 1.0),
			..self.clone()
		}
	}

	pub(crate) const fn overlaps_within(&self, other: &Self, gap: usize) -> bool {
		other.start <= self.end + gap
	}
}

#[cfg(test)]
pub(crate) fn sample_metrics(start: usize, end: usize, depth: f64, confidence: f64) -> DipMetrics {
	DipMetrics {
		start,
		end,
		width: end - start + 1,
		baseline: 10.0,
		local_median: 10.0,
		local_mad: 1.0,
		global_median: 10.0,
		alpha: 0.5,
		seg_min: 10.0 - depth,
		seg_min_index: start,
		depth,
		depth_threshold: 0.25,
		prominence: depth,
		area: depth,
		recovered: true,
		is_ongoing: false,
		confidence,
		is_dip: true,
		reason: None,
		k: 0.25,
		min_abs_depth: 0.0,
		provenance: ScaleProvenance::at_scale(1),
	}
}
