use crate::metrics::LocalMinimum;

/// Finds local minima (single points or flat plateaus) with at least `min_prominence`.
///
/// A plateau is represented by its midpoint. Prominence is measured against the highest sample
/// within `proximity_range` beyond each side of the plateau. After the scan, an unfinished descent
/// at the very end of the series is reported as an open-ended minimum, since the neighbour test
/// above can never fire on the last sample.
#[must_use]
pub fn find_local_minima(series: &[f64], min_prominence: f64, proximity_range: usize) -> Vec<LocalMinimum> {
	let n = series.len();
	if n < 3 {
		return Vec::new();
	}

	let mut minima = Vec::new();
	let mut i = 1;

	while i < n - 1 {
		let value = series[i];
		if value > series[i - 1] || value > series[i + 1] {
			i += 1;
			continue;
		}

		let mut j = i;
		while j < n - 1 && series[j + 1] == value {
			j += 1;
		}

		let is_minimum = if j < n - 1 {
			value <= series[j + 1] && (value < series[i - 1] || value < series[j + 1])
		} else {
			// plateau running into the end of the series
			value < series[i - 1]
		};

		if is_minimum {
			let index = (i + j) / 2;

			let left_peak = series[i.saturating_sub(proximity_range)..i].iter().copied().fold(series[i - 1], f64::max);
			let right_peak = if j < n - 1 {
				series[j + 1..(j + proximity_range + 1).min(n)].iter().copied().fold(series[j + 1], f64::max)
			} else {
				series[index]
			};

			let prominence = left_peak.min(right_peak) - series[index];
			if prominence >= min_prominence {
				minima.push(LocalMinimum { index, value: series[index], prominence, open_ended: false });
			}
		}

		i = j + 1;
	}

	if let Some(trailing) = trailing_descent(series, proximity_range)
		&& trailing.prominence >= min_prominence
		&& minima.iter().all(|minimum| minimum.index != trailing.index)
	{
		minima.push(trailing);
	}

	minima
}

/// The last sample as a minimum when the series is still strictly falling into it.
fn trailing_descent(series: &[f64], proximity_range: usize) -> Option<LocalMinimum> {
	let last = series.len().checked_sub(1)?;
	if last < 2 || series[last] >= series[last - 1] {
		return None;
	}

	let mut descent_start = last - 1;
	while descent_start > 0 && series[descent_start] < series[descent_start - 1] {
		descent_start -= 1;
	}

	let peak = series[descent_start.saturating_sub(proximity_range)..=descent_start]
		.iter()
		.copied()
		.fold(series[descent_start], f64::max);

	Some(LocalMinimum {
		index: last,
		value: series[last],
		prominence: peak - series[last],
		open_ended: true,
	})
}
