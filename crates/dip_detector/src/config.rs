use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTEXT_WINDOW: usize = 50;
pub const DEFAULT_WINDOW_DAYS: usize = 125;

/// Every tunable of the detector, from segment classification up to rolling windows.
///
/// Deserializes from camelCase keys; missing keys take the defaults below and unknown keys are
/// ignored, so a partial TOML/JSON table is always accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DipConfig {
	/// Samples before the segment used as local context. `None` means 50 for direct
	/// classification and `max(min_width, min(50, N/4))` for discovery.
	pub pre_window: Option<usize>,
	pub post_window: Option<usize>,
	pub min_width: usize,
	/// Depth threshold multiplier on the local MAD.
	pub k: f64,
	pub min_abs_depth: f64,
	pub require_recovery: bool,
	/// Decay constant of the global blend weight `1 - exp(-N / n0)`.
	pub n0: f64,

	pub smoothing_window: usize,
	pub min_prominence_factor: f64,
	pub max_dips: usize,
	pub multi_scale: bool,
	pub scale_factors: Option<Vec<u32>>,

	pub window_days: usize,
	pub stride: usize,
}

impl Default for DipConfig {
	fn default() -> Self {
		Self {
			pre_window: None,
			post_window: None,
			min_width: 2,
			k: 0.25,
			min_abs_depth: 0.0,
			require_recovery: true,
			n0: 200.0,
			smoothing_window: 3,
			min_prominence_factor: 0.3,
			max_dips: 50,
			multi_scale: true,
			scale_factors: None,
			window_days: DEFAULT_WINDOW_DAYS,
			stride: 1,
		}
	}
}

impl DipConfig {
	/// Scale ladder for a series of `len` samples.
	///
	/// Longer series get coarser extra scales. Zero factors are lifted to one.
	#[must_use]
	pub fn scale_ladder(&self, len: usize) -> Vec<u32> {
		if !self.multi_scale {
			return vec![1];
		}

		match &self.scale_factors {
			Some(factors) if !factors.is_empty() => factors.iter().map(|&factor| factor.max(1)).collect(),
			_ if len > 200 => vec![1, 2, 4, 8],
			_ if len > 50 => vec![1, 2, 4],
			_ => vec![1, 2],
		}
	}

	/// Context window auto-sized to a quarter of the series, bounded to `[min_width, 50]`.
	pub(crate) fn auto_window(&self, len: usize) -> usize {
		(len / 4).min(DEFAULT_CONTEXT_WINDOW).max(self.min_width)
	}
}
