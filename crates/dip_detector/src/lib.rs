//! Multi-scale detection of dips in 1-D numeric series.
//!
//! [`find_all_dips`] discovers dips over a whole series, [`find_dips_rolling`] does the same with
//! sliding windows for long histories and [`find_dips_optimal_for_interval`] picks between the two.
//! [`detect_dip`] classifies a single caller-chosen segment.

mod boundary;
mod classifier;
mod config;
mod dispatch;
mod error;
mod metrics;
mod minima;
mod multi_scale;
mod rolling;
pub mod stats;

pub use boundary::{DEFAULT_THRESHOLD_FACTOR, expand_dip_boundaries};
pub use classifier::detect_dip;
pub use config::{DEFAULT_CONTEXT_WINDOW, DEFAULT_WINDOW_DAYS, DipConfig};
pub use dispatch::find_dips_optimal_for_interval;
pub use error::{DipError, validate_series};
pub use metrics::{DetectionScale, DipMetrics, LocalMinimum, RejectReason, ScaleProvenance};
pub use minima::find_local_minima;
pub use multi_scale::find_all_dips;
pub use rolling::find_dips_rolling;
