pub const DEFAULT_THRESHOLD_FACTOR: f64 = 0.3;

/// Grows a segment outward from `min_index` until the series climbs back to the crossing level.
///
/// The crossing level is `baseline - factor * depth`. The factor shrinks below `threshold_factor`
/// as the dip deepens relative to the baseline, so deep dips keep more of their shoulders. When no
/// sample reaches the level on one side, that side runs to the series boundary. Returns inclusive
/// `(start, end)`.
#[must_use]
pub fn expand_dip_boundaries(series: &[f64], min_index: usize, baseline: f64, threshold_factor: f64) -> (usize, usize) {
	let depth = baseline - series[min_index];

	let factor = if depth > 0.0 {
		threshold_factor.min(threshold_factor * (1.0 + depth / (baseline + 1e-9)))
	} else {
		threshold_factor
	};
	let crossing_level = baseline - factor * depth;

	let start = series[..min_index].iter().rposition(|&value| value >= crossing_level).map_or(0, |i| i + 1);
	let end = series[min_index + 1..]
		.iter()
		.position(|&value| value >= crossing_level)
		.map_or(series.len() - 1, |i| min_index + i);

	(start, end)
}
