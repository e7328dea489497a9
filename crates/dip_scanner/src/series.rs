use anyhow::{Context, Result};
use dip_detector::validate_series;

/// Parses a series given either as a JSON array or as numbers separated by commas, whitespace or
/// newlines. Everything after `#` on a line is ignored.
pub fn parse_series(input: &str) -> Result<Vec<f64>> {
	let content = input
		.lines()
		.map(|line| line.split_once('#').map_or(line, |(data, _)| data))
		.collect::<Vec<_>>()
		.join("\n");
	let content = content.trim();

	let series: Vec<f64> = if content.starts_with('[') {
		serde_json::from_str(content).context("Failed to parse series as a JSON array")?
	} else {
		content
			.split(|c: char| c == ',' || c.is_whitespace())
			.filter(|token| !token.is_empty())
			.enumerate()
			.map(|(index, token)| {
				token.parse::<f64>().with_context(|| format!("Invalid sample '{token}' at position {index}"))
			})
			.collect::<Result<_>>()?
	};

	validate_series(&series)?;

	Ok(series)
}
