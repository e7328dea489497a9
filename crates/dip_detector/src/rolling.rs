use rayon::prelude::*;
use tracing::debug;

use crate::config::DipConfig;
use crate::metrics::DipMetrics;
use crate::multi_scale::{find_all_dips, gap_tolerance};

/// Runs the multi-scale detector over every `window_days`-sample window of a long series and
/// merges what the windows report into one list in global coordinates.
///
/// A dip seen by many overlapping windows comes out once, spanning the union of what each window
/// saw. Series no longer than one window are analysed directly. Either way `width` and `is_ongoing`
/// are re-derived against the full series.
#[must_use]
pub fn find_dips_rolling(series: &[f64], config: &DipConfig) -> Vec<DipMetrics> {
	let n = series.len();
	let window_days = config.window_days.max(1);

	if n <= window_days {
		return find_all_dips(series, config).iter().map(|dip| dip.normalized(n)).collect();
	}

	let offsets = window_offsets(n, window_days, config.stride);
	let candidates: Vec<DipMetrics> = offsets
		.par_iter()
		.map(|&offset| {
			find_all_dips(&series[offset..offset + window_days], config)
				.iter()
				.map(|dip| dip.translated(offset))
				.collect::<Vec<_>>()
		})
		.collect::<Vec<_>>()
		.into_iter()
		.flatten()
		.collect();

	debug!(windows = offsets.len(), candidates = candidates.len(), "Rolling windows evaluated");

	let mut merged = merge_across_windows(candidates, n);
	merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
	merged.truncate(config.max_dips);
	merged
}

/// Window start positions. The last window always ends on the newest sample.
pub(crate) fn window_offsets(len: usize, window_days: usize, stride: usize) -> Vec<usize> {
	if window_days == 0 || len < window_days {
		return Vec::new();
	}

	let last = len - window_days;
	let mut offsets: Vec<usize> = (0..=last).step_by(stride.max(1)).collect();
	if offsets.last() != Some(&last) {
		offsets.push(last);
	}
	offsets
}

fn merge_across_windows(mut candidates: Vec<DipMetrics>, len: usize) -> Vec<DipMetrics> {
	candidates.sort_by_key(|dip| dip.start);

	let mut candidates = candidates.into_iter();
	let Some(first) = candidates.next() else {
		return Vec::new();
	};

	let (mut merged, last) = candidates.fold((Vec::new(), WindowGroup::new(first)), |(mut merged, group), next| {
		if group.overlaps(&next) {
			(merged, group.absorb(next))
		} else {
			merged.push(group.finish(len));
			(merged, WindowGroup::new(next))
		}
	});

	merged.push(last.finish(len));
	merged
}

/// A dip as reported by a run of neighbouring windows.
struct WindowGroup {
	representative: DipMetrics,
	start: usize,
	end: usize,
	scales: Vec<u32>,
	windows: usize,
}

impl WindowGroup {
	fn new(dip: DipMetrics) -> Self {
		Self { start: dip.start, end: dip.end, scales: scales_of(&dip), windows: 1, representative: dip }
	}

	fn overlaps(&self, next: &DipMetrics) -> bool {
		next.start <= self.end + gap_tolerance(self.representative.provenance.factor(), next.provenance.factor())
	}

	fn absorb(mut self, next: DipMetrics) -> Self {
		self.start = self.start.min(next.start);
		self.end = self.end.max(next.end);
		self.windows += 1;
		self.scales.extend(scales_of(&next));

		if next.depth > self.representative.depth * 1.05 {
			self.representative = next;
		}

		self
	}

	fn finish(mut self, len: usize) -> DipMetrics {
		self.scales.sort_unstable();
		self.scales.dedup();

		let boost = 1.0 + 0.1 * (1.0 - (-((self.windows - 1) as f64) / 10.0).exp());

		DipMetrics {
			start: self.start,
			end: self.end,
			confidence: (self.representative.confidence * boost).min(1.0),
			provenance: self.representative.provenance.with_scales(self.scales),
			..self.representative
		}
		.normalized(len)
	}
}

fn scales_of(dip: &DipMetrics) -> Vec<u32> {
	dip.provenance.scale_list.clone().unwrap_or_else(|| vec![dip.provenance.factor()])
}
