use tracing::{debug, warn};

use crate::boundary::{DEFAULT_THRESHOLD_FACTOR, expand_dip_boundaries};
use crate::classifier::detect_dip;
use crate::config::DipConfig;
use crate::metrics::{DipMetrics, LocalMinimum, ScaleProvenance};
use crate::minima::find_local_minima;
use crate::stats::{SCALE_EPSILON, mad, median, min_max, moving_median};

/// Finds every dip in `series`, ranked by confidence.
///
/// The series is smoothed at each scale of the ladder, minima of the smoothed series are expanded
/// into candidate segments, and the candidates are classified against the raw series. Candidates
/// found at several scales are merged into one record. Series that are too short yield nothing.
#[must_use]
pub fn find_all_dips(series: &[f64], config: &DipConfig) -> Vec<DipMetrics> {
	let n = series.len();
	if n < 3 || n < config.min_width {
		return Vec::new();
	}

	let pre_window = config.pre_window.unwrap_or_else(|| config.auto_window(n));
	let post_window = config.post_window.unwrap_or_else(|| config.auto_window(n));

	let mut candidates = Vec::new();

	for scale_factor in config.scale_ladder(n) {
		let scale = f64::from(scale_factor);
		let smoothed = moving_median(series, (config.smoothing_window * scale_factor as usize).max(1));

		let global_median = median(&smoothed);
		let mut global_mad = mad(&smoothed, Some(global_median));
		if global_mad == 0.0 {
			let (low, high) = min_max(&smoothed);
			global_mad = if high > low { (high - low) / 6.0 } else { SCALE_EPSILON };
		}

		let min_prominence = config.min_prominence_factor / scale.sqrt() * global_mad;
		let proximity_range = (10 * scale_factor as usize).min(n / 4);
		let minima = find_local_minima(&smoothed, min_prominence, proximity_range);

		let scale_config = DipConfig {
			pre_window: Some(pre_window),
			post_window: Some(post_window),
			min_width: config.min_width.max((config.min_width as f64 * scale.sqrt()) as usize),
			..config.clone()
		};

		let before = candidates.len();
		for minimum in &minima {
			let baseline = minimum_baseline(&smoothed, minimum, pre_window, post_window);
			let (start, end) = expand_dip_boundaries(&smoothed, minimum.index, baseline, DEFAULT_THRESHOLD_FACTOR);

			match detect_dip(series, start, end, &scale_config) {
				Ok(metrics) if metrics.is_dip => {
					candidates.push(DipMetrics { provenance: ScaleProvenance::at_scale(scale_factor), ..metrics });
				},
				Ok(_) => {},
				Err(error) => warn!(%error, scale_factor, "Skipping candidate with invalid bounds"),
			}
		}

		debug!(scale_factor, minima = minima.len(), accepted = candidates.len() - before, "Scale pass complete");
	}

	let mut merged = merge_across_scales(candidates);
	merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
	merged.truncate(config.max_dips);
	merged
}

/// Rough level the series sits at around `minimum`, used to place the boundary crossings.
///
/// Near the end of the series there is no after-context, so the estimate looks further back and
/// drops samples that are already part of the descent.
fn minimum_baseline(smoothed: &[f64], minimum: &LocalMinimum, pre_window: usize, post_window: usize) -> f64 {
	let n = smoothed.len();
	let index = minimum.index;

	let mut context: Vec<f64> = if index + 2 >= n {
		let window = &smoothed[index.saturating_sub(pre_window.saturating_mul(2))..index];
		let floor = minimum.value + 0.5 * minimum.prominence;
		let stable: Vec<f64> =
			window[..window.len().saturating_sub(1)].iter().copied().filter(|&value| value >= floor).collect();

		if window.len() > 3 && stable.len() >= 3 { stable } else { window.to_vec() }
	} else {
		let before = &smoothed[index.saturating_sub(pre_window)..index];
		let after = &smoothed[index + 1..index.saturating_add(post_window).min(n)];
		before.iter().chain(after).copied().collect()
	};

	if context.len() < 3 {
		context = smoothed.to_vec();
	}

	median(&context)
}

/// Overlap allowance between two candidates; coarser scales get more slack.
pub(crate) fn gap_tolerance(scale_a: u32, scale_b: u32) -> usize {
	let coarsest = f64::from(scale_a.max(scale_b));
	((2.0 * coarsest.sqrt()) as usize).max(2)
}

/// Collapses overlapping candidates from different scales into one dip each.
pub(crate) fn merge_across_scales(mut candidates: Vec<DipMetrics>) -> Vec<DipMetrics> {
	candidates.sort_by_key(|dip| dip.start);

	let mut candidates = candidates.into_iter();
	let Some(first) = candidates.next() else {
		return Vec::new();
	};

	let (mut merged, last) = candidates.fold((Vec::new(), ScaleGroup::new(first)), |(mut merged, group), next| {
		if group.overlaps(&next) {
			(merged, group.absorb(next))
		} else {
			merged.push(group.finish());
			(merged, ScaleGroup::new(next))
		}
	});

	merged.push(last.finish());
	merged
}

/// Running accumulator of the cross-scale merge.
struct ScaleGroup {
	representative: DipMetrics,
	scales: Vec<u32>,
}

impl ScaleGroup {
	fn new(dip: DipMetrics) -> Self {
		let scales = vec![dip.provenance.factor()];
		Self { representative: dip, scales }
	}

	fn overlaps(&self, next: &DipMetrics) -> bool {
		let gap = gap_tolerance(self.representative.provenance.factor(), next.provenance.factor());
		self.representative.overlaps_within(next, gap)
	}

	fn absorb(mut self, next: DipMetrics) -> Self {
		let current_depth = self.representative.depth;

		if next.depth > current_depth * 1.1 {
			return Self::new(next);
		}

		let similar =
			if current_depth > 0.0 { (next.depth - current_depth).abs() / current_depth < 0.1 } else { next.depth == current_depth };
		if similar {
			self.scales.push(next.provenance.factor());
		}

		self
	}

	fn finish(mut self) -> DipMetrics {
		self.scales.sort_unstable();
		self.scales.dedup();

		let corroborating = self.scales.len().saturating_sub(1);
		let confidence = (self.representative.confidence * 0.1f64.mul_add(corroborating as f64, 1.0)).min(1.0);

		DipMetrics {
			confidence,
			provenance: self.representative.provenance.with_scales(self.scales),
			..self.representative
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metrics::sample_metrics;

	fn at_scale(mut dip: DipMetrics, scale_factor: u32) -> DipMetrics {
		dip.provenance = ScaleProvenance::at_scale(scale_factor);
		dip
	}

	#[test]
	fn test_gap_tolerance() {
		assert_eq!(gap_tolerance(1, 1), 2);
		assert_eq!(gap_tolerance(1, 4), 4);
		assert_eq!(gap_tolerance(8, 2), 5);
	}

	#[test]
	fn test_merge_keeps_similar_depth_and_boosts() {
		let fast = at_scale(sample_metrics(4, 6, 2.8, 0.5), 1);
		let medium = at_scale(sample_metrics(3, 7, 2.9, 0.4), 2);

		let merged = merge_across_scales(vec![fast, medium]);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].start, 3);
		assert_eq!(merged[0].provenance.scale_list, Some(vec![1, 2]));
		assert_eq!(merged[0].provenance.detected_at_scales, Some(2));
		// the scale-2 dip came first in start order and is the representative
		assert!((merged[0].confidence - 0.44).abs() < 1e-12);
	}

	#[test]
	fn test_merge_prefers_significantly_deeper() {
		let shallow = at_scale(sample_metrics(3, 7, 2.0, 0.9), 1);
		let deep = at_scale(sample_metrics(5, 9, 3.0, 0.6), 4);

		let merged = merge_across_scales(vec![shallow, deep]);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].depth, 3.0);
		assert_eq!(merged[0].provenance.scale_list, Some(vec![4]));
		assert_eq!(merged[0].confidence, 0.6);
	}

	#[test]
	fn test_merge_keeps_distant_dips_apart() {
		let first = at_scale(sample_metrics(2, 4, 2.0, 0.5), 1);
		let second = at_scale(sample_metrics(10, 12, 2.0, 0.7), 1);

		let merged = merge_across_scales(vec![second, first]);

		assert_eq!(merged.len(), 2);
		assert_eq!(merged[0].start, 2);
		assert_eq!(merged[1].start, 10);
		assert_eq!(merged[1].provenance.detected_at_scales, Some(1));
	}

	#[test]
	fn test_merge_caps_confidence() {
		let dips = (1..=3).map(|scale| at_scale(sample_metrics(5, 8, 2.0, 0.95), scale)).collect();
		let merged = merge_across_scales(dips);

		assert_eq!(merged.len(), 1);
		assert_eq!(merged[0].confidence, 1.0);
	}

	#[test]
	fn test_find_all_dips_two_dips() {
		let series = [10.0, 10.0, 10.0, 9.0, 8.0, 7.0, 8.0, 9.0, 10.0, 10.0, 10.0, 9.5, 8.0, 7.0, 8.5, 9.5, 10.0];
		let config = DipConfig { k: 0.25, min_width: 2, ..DipConfig::default() };

		let mut dips = find_all_dips(&series, &config);
		dips.sort_by_key(|dip| dip.start);

		assert_eq!(dips.len(), 2);
		assert_eq!((dips[0].start, dips[0].end, dips[0].seg_min_index), (4, 6, 5));
		assert_eq!((dips[1].start, dips[1].end, dips[1].seg_min_index), (12, 14, 13));
		assert!(dips.iter().all(|dip| dip.is_dip && dip.provenance.scale_list == Some(vec![1, 2])));
	}

	#[test]
	fn test_find_all_dips_short_or_flat() {
		assert!(find_all_dips(&[1.0, 2.0], &DipConfig::default()).is_empty());
		assert!(find_all_dips(&[5.0; 8], &DipConfig::default()).is_empty());
		assert!(find_all_dips(&[], &DipConfig::default()).is_empty());
	}

	#[test]
	fn test_find_all_dips_respects_max_dips() {
		let mut series = Vec::new();
		for depth in [1.0, 3.0, 2.0] {
			series.extend([10.0, 10.0, 10.0, 10.0, 10.0 - depth / 2.0, 10.0 - depth, 10.0 - depth / 2.0]);
		}
		series.extend([10.0, 10.0, 10.0, 10.0]);

		let config = DipConfig { max_dips: 2, smoothing_window: 1, ..DipConfig::default() };
		let dips = find_all_dips(&series, &config);

		assert_eq!(dips.len(), 2);
		assert!(dips[0].confidence >= dips[1].confidence);
	}

	#[test]
	fn test_find_all_dips_huge_windows_clamp_to_series() {
		let series = [10.0, 10.0, 10.0, 9.0, 8.0, 7.0, 8.0, 9.0, 10.0, 10.0, 10.0, 9.5, 8.0, 7.0, 8.5, 9.5, 10.0];
		let huge = DipConfig { pre_window: Some(usize::MAX), post_window: Some(usize::MAX), ..DipConfig::default() };
		let whole =
			DipConfig { pre_window: Some(series.len()), post_window: Some(series.len()), ..DipConfig::default() };

		let dips = find_all_dips(&series, &huge);
		assert!(!dips.is_empty());
		assert_eq!(dips, find_all_dips(&series, &whole));
	}

	#[test]
	fn test_minimum_baseline_near_end_ignores_descent() {
		let smoothed = [10.0, 10.0, 10.0, 10.0, 9.0, 7.0, 5.0];
		let minimum = LocalMinimum { index: 6, value: 5.0, prominence: 5.0, open_ended: true };

		assert_eq!(minimum_baseline(&smoothed, &minimum, 3, 3), 10.0);
	}
}
