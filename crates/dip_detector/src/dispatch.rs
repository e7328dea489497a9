use tracing::debug;

use crate::config::DipConfig;
use crate::metrics::DipMetrics;
use crate::multi_scale::find_all_dips;
use crate::rolling::find_dips_rolling;

/// Picks the detector for an analysis horizon of `interval` samples.
///
/// Horizons longer than one rolling window use [`find_dips_rolling`]; shorter ones analyse the
/// series directly. The whole series is analysed in both cases, and the result is normalized
/// against it.
#[must_use]
pub fn find_dips_optimal_for_interval(series: &[f64], interval: usize, config: &DipConfig) -> Vec<DipMetrics> {
	if interval > config.window_days {
		debug!(interval, window_days = config.window_days, "Using rolling detection");
		find_dips_rolling(series, config)
	} else {
		debug!(interval, "Using direct detection");
		find_all_dips(series, config).iter().map(|dip| dip.normalized(series.len())).collect()
	}
}
