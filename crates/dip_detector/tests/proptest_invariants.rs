use dip_detector::{DipConfig, DipMetrics, RejectReason, detect_dip, find_all_dips, find_dips_rolling};
use proptest::prelude::*;
use proptest::test_runner::Config as ProptestConfig;

fn assert_record_invariants(dips: &[DipMetrics], len: usize) -> Result<(), TestCaseError> {
	for dip in dips {
		prop_assert!(dip.start <= dip.end);
		prop_assert!(dip.end < len);
		prop_assert_eq!(dip.width, dip.end - dip.start + 1);
		prop_assert!(dip.start <= dip.seg_min_index && dip.seg_min_index <= dip.end);
		prop_assert!((0.0..=1.0).contains(&dip.confidence));
		prop_assert!(dip.is_dip);
		prop_assert!(dip.depth >= dip.depth_threshold);
		prop_assert!(dip.depth_threshold >= 0.0);
	}
	Ok(())
}

proptest! {
	#![proptest_config(ProptestConfig {
		cases: 128,
		.. ProptestConfig::default()
	})]

	#[test]
	fn discovered_dips_respect_record_invariants(
		values in prop::collection::vec(-50.0f64..50.0, 0..120),
		min_width in 1usize..5,
		k in 0.0f64..2.0,
	) {
		let config = DipConfig { min_width, k, ..DipConfig::default() };
		let dips = find_all_dips(&values, &config);

		assert_record_invariants(&dips, values.len())?;
		prop_assert!(dips.len() <= config.max_dips);
		prop_assert!(dips.windows(2).all(|pair| pair[0].confidence >= pair[1].confidence));
	}

	#[test]
	fn merged_dips_do_not_overlap(values in prop::collection::vec(-50.0f64..50.0, 3..120)) {
		let mut dips = find_all_dips(&values, &DipConfig::default());
		dips.sort_by_key(|dip| dip.start);

		for pair in dips.windows(2) {
			prop_assert!(pair[1].start > pair[0].end);
		}
	}

	#[test]
	fn rolling_dips_respect_record_invariants(
		values in prop::collection::vec(-50.0f64..50.0, 30..90),
		window_days in 20usize..40,
		stride in 1usize..8,
	) {
		let config = DipConfig { window_days, stride, ..DipConfig::default() };
		let dips = find_dips_rolling(&values, &config);

		assert_record_invariants(&dips, values.len())?;
		for dip in &dips {
			prop_assert_eq!(dip.is_ongoing, dip.end + 3 >= values.len());
		}
	}

	#[test]
	fn rolling_matches_direct_for_short_series(values in prop::collection::vec(-50.0f64..50.0, 0..60)) {
		let config = DipConfig { window_days: 60, ..DipConfig::default() };

		let direct: Vec<DipMetrics> =
			find_all_dips(&values, &config).iter().map(|dip| dip.normalized(values.len())).collect();
		prop_assert_eq!(find_dips_rolling(&values, &config), direct);
	}

	#[test]
	fn detection_is_deterministic(values in prop::collection::vec(-50.0f64..50.0, 3..100)) {
		let config = DipConfig::default();

		let first = serde_json::to_string(&find_all_dips(&values, &config)).unwrap();
		let second = serde_json::to_string(&find_all_dips(&values, &config)).unwrap();
		prop_assert_eq!(first, second);
	}

	#[test]
	fn classifier_accepts_any_valid_segment(
		values in prop::collection::vec(-50.0f64..50.0, 1..80),
		a in any::<prop::sample::Index>(),
		b in any::<prop::sample::Index>(),
		min_width in 1usize..6,
	) {
		let (start, end) = {
			let (x, y) = (a.index(values.len()), b.index(values.len()));
			(x.min(y), x.max(y))
		};
		let config = DipConfig { min_width, ..DipConfig::default() };

		let metrics = detect_dip(&values, start, end, &config).unwrap();

		prop_assert!(metrics.start <= metrics.seg_min_index && metrics.seg_min_index <= metrics.end);
		prop_assert!((0.0..=1.0).contains(&metrics.confidence));
		prop_assert_eq!(metrics.is_dip, metrics.reason.is_none());
		if end - start + 1 < min_width {
			prop_assert_eq!(metrics.reason, Some(RejectReason::WidthBelowMin));
		}
		prop_assert!(detect_dip(&values, start, values.len(), &config).is_err());
	}
}
