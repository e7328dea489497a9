use anyhow::{Result, anyhow, bail};
use dip_detector::{DipConfig, DipMetrics};

const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// `detect` is stricter than the library defaults: wider segments and a higher depth multiplier.
const DETECT_MIN_WIDTH: usize = 3;
const DETECT_K: f64 = 0.5;

#[derive(Debug, PartialEq)]
pub enum Command {
	Scan(ScanArgs),
	Detect(DetectArgs),
}

#[derive(Debug, PartialEq)]
pub struct ScanArgs {
	pub config: String,
}

#[derive(Debug, PartialEq)]
pub struct DetectArgs {
	pub series: String,
	pub start: Option<usize>,
	pub end: Option<usize>,
	pub json: bool,
	pub interval: Option<usize>,
	pub config: DipConfig,
}

impl DetectArgs {
	/// The explicit segment, when both bounds were given.
	pub const fn segment(&self) -> Option<(usize, usize)> {
		match (self.start, self.end) {
			(Some(start), Some(end)) => Some((start, end)),
			_ => None,
		}
	}
}

/// Parses the arguments after the program name. `Ok(None)` means help or version was printed.
pub fn parse_args(args: &[String]) -> Result<Option<Command>> {
	let Some(command_name) = args.first() else {
		print_root_help();
		return Ok(None);
	};

	if matches!(command_name.as_str(), "-h" | "--help") {
		print_root_help();
		return Ok(None);
	}
	if matches!(command_name.as_str(), "-V" | "--version") {
		print_version();
		return Ok(None);
	}

	let rest = &args[1..];
	if rest.iter().any(|arg| matches!(arg.as_str(), "-h" | "--help")) {
		print_command_help(command_name)?;
		return Ok(None);
	}

	let command = match command_name.as_str() {
		"scan" => Command::Scan(parse_scan_args(rest)?),
		"detect" => Command::Detect(parse_detect_args(rest)?),
		other => bail!("unknown command '{other}'; expected one of: scan, detect"),
	};

	Ok(Some(command))
}

fn parse_scan_args(tokens: &[String]) -> Result<ScanArgs> {
	let mut args = ScanArgs { config: DEFAULT_CONFIG_PATH.to_string() };

	let mut idx = 0;
	while idx < tokens.len() {
		let (flag, inline_value) = split_flag(&tokens[idx])?;
		match flag {
			"--config" => args.config = take_flag_value(flag, inline_value, tokens, &mut idx)?,
			other => bail!("unknown scan option '{other}'"),
		}
		idx += 1;
	}

	Ok(args)
}

fn parse_detect_args(tokens: &[String]) -> Result<DetectArgs> {
	let mut series = None;
	let mut args = DetectArgs {
		series: String::new(),
		start: None,
		end: None,
		json: false,
		interval: None,
		config: DipConfig { min_width: DETECT_MIN_WIDTH, k: DETECT_K, ..DipConfig::default() },
	};

	let mut idx = 0;
	while idx < tokens.len() {
		let (flag, inline_value) = split_flag(&tokens[idx])?;
		match flag {
			"--series" => series = Some(take_flag_value(flag, inline_value, tokens, &mut idx)?),
			"--start" => args.start = Some(parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?),
			"--end" => args.end = Some(parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?),
			"--interval" => {
				args.interval = Some(parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?);
			},
			"--json" => {
				ensure_no_inline_value(flag, inline_value)?;
				args.json = true;
			},
			"--pre-window" => {
				args.config.pre_window = Some(parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?);
			},
			"--post-window" => {
				args.config.post_window = Some(parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?);
			},
			"--min-width" => {
				args.config.min_width = parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?;
			},
			"--k" => args.config.k = parse_f64_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?,
			"--min-abs-depth" => {
				args.config.min_abs_depth = parse_f64_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?;
			},
			"--no-recovery-check" => {
				ensure_no_inline_value(flag, inline_value)?;
				args.config.require_recovery = false;
			},
			"--n0" => args.config.n0 = parse_f64_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?,
			"--smoothing-window" => {
				args.config.smoothing_window = parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?;
			},
			"--min-prominence-factor" => {
				args.config.min_prominence_factor =
					parse_f64_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?;
			},
			"--max-dips" => {
				args.config.max_dips = parse_usize_arg(&take_flag_value(flag, inline_value, tokens, &mut idx)?, flag)?;
			},
			"--no-multi-scale" => {
				ensure_no_inline_value(flag, inline_value)?;
				args.config.multi_scale = false;
			},
			"--scale-factors" => {
				let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
				args.config.scale_factors = Some(parse_scale_factors(&raw, flag)?);
			},
			other => bail!("unknown detect option '{other}'"),
		}
		idx += 1;
	}

	args.series = series.ok_or_else(|| anyhow!("detect requires --series <values>"))?;

	if args.start.is_some() != args.end.is_some() {
		bail!("--start and --end must be given together");
	}

	Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>)> {
	if !token.starts_with("--") {
		bail!("unexpected positional argument '{token}'; expected --flag value");
	}
	if let Some((flag, value)) = token.split_once('=') {
		return Ok((flag, Some(value.to_string())));
	}
	Ok((token, None))
}

fn take_flag_value(flag: &str, inline_value: Option<String>, tokens: &[String], idx: &mut usize) -> Result<String> {
	if let Some(value) = inline_value {
		return Ok(value);
	}

	*idx += 1;
	let value = tokens.get(*idx).ok_or_else(|| anyhow!("{flag} requires a value"))?;
	if value.starts_with("--") {
		bail!("{flag} requires a value, but got option '{value}'");
	}
	Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<()> {
	if inline_value.is_some() {
		bail!("{flag} does not accept a value");
	}
	Ok(())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize> {
	raw.parse::<usize>().map_err(|_| anyhow!("{flag} expects a non-negative integer, got '{raw}'"))
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64> {
	raw.parse::<f64>().map_err(|_| anyhow!("{flag} expects a number, got '{raw}'"))
}

fn parse_scale_factors(raw: &str, flag: &str) -> Result<Vec<u32>> {
	raw.split(',')
		.map(str::trim)
		.filter(|token| !token.is_empty())
		.map(|token| token.parse::<u32>().map_err(|_| anyhow!("{flag} expects comma-separated integers, got '{token}'")))
		.collect()
}

/// One summary line per discovered dip, numbered from 1.
pub fn format_dip_line(rank: usize, dip: &DipMetrics) -> String {
	let scale = dip.provenance.detection_scale.map_or_else(|| "-".to_string(), |scale| scale.to_string());
	let scales = dip.provenance.detected_at_scales.unwrap_or(1);

	format!(
		"{rank}. [{}:{}] depth={:.3} width={} conf={:.3} [{scale}] scales={scales}",
		dip.start, dip.end, dip.depth, dip.width, dip.confidence
	)
}

pub fn format_classification(metrics: &DipMetrics) -> String {
	let mut line = format!(
		"is_dip={} depth={:.3} threshold={:.3} confidence={:.3}",
		metrics.is_dip, metrics.depth, metrics.depth_threshold, metrics.confidence
	);
	if let Some(reason) = metrics.reason {
		line.push_str(&format!(" reason={reason}"));
	}
	line
}

fn print_version() {
	println!("dip_scanner {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
	println!(
		"dip_scanner {}\n\nUSAGE:\n  dip_scanner <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  scan     Run every job from a config file and print a JSON report\n  detect   Find dips in a series given on the command line\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'dip_scanner <COMMAND> --help' for subcommand options.",
		env!("CARGO_PKG_VERSION")
	);
}

fn print_command_help(command: &str) -> Result<()> {
	match command {
		"scan" => {
			println!(
				"USAGE:\n  dip_scanner scan [OPTIONS]\n\nOPTIONS:\n  --config <path>    Default: {DEFAULT_CONFIG_PATH}"
			);
			Ok(())
		},
		"detect" => {
			println!(
				"USAGE:\n  dip_scanner detect --series <values> [OPTIONS]\n\nOPTIONS:\n  --series <values>                Required; comma-separated numbers or a JSON array\n  --start <usize> --end <usize>    Classify this segment instead of searching\n  --interval <usize>               Analysis horizon; long horizons use rolling windows\n  --json                           Print full metrics as JSON\n  --pre-window <usize>\n  --post-window <usize>\n  --min-width <usize>              Default: 3\n  --k <float>                      Default: 0.5\n  --min-abs-depth <float>          Default: 0\n  --no-recovery-check\n  --n0 <float>                     Default: 200\n  --smoothing-window <usize>       Default: 3\n  --min-prominence-factor <float>  Default: 0.3\n  --max-dips <usize>               Default: 50\n  --no-multi-scale\n  --scale-factors <list>           e.g. 1,2,4"
			);
			Ok(())
		},
		_ => bail!("unknown command '{command}'; expected one of: scan, detect"),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn args(raw: &[&str]) -> Vec<String> {
		raw.iter().map(ToString::to_string).collect()
	}

	#[test]
	fn test_scan_defaults_and_override() {
		assert_eq!(
			parse_args(&args(&["scan"])).unwrap(),
			Some(Command::Scan(ScanArgs { config: "config.toml".to_string() }))
		);
		assert_eq!(
			parse_args(&args(&["scan", "--config=jobs.toml"])).unwrap(),
			Some(Command::Scan(ScanArgs { config: "jobs.toml".to_string() }))
		);
	}

	#[test]
	fn test_detect_options() {
		let command = parse_args(&args(&[
			"detect",
			"--series",
			"10,10,2,10",
			"--min-width",
			"1",
			"--k=0.1",
			"--no-recovery-check",
			"--scale-factors",
			"1, 3",
			"--json",
			"--interval",
			"200",
		]))
		.unwrap();

		let Some(Command::Detect(detect)) = command else {
			panic!("expected detect command");
		};
		assert_eq!(detect.series, "10,10,2,10");
		assert!(detect.json);
		assert_eq!(detect.interval, Some(200));
		assert_eq!(detect.segment(), None);
		assert_eq!(detect.config.min_width, 1);
		assert_eq!(detect.config.k, 0.1);
		assert!(!detect.config.require_recovery);
		assert_eq!(detect.config.scale_factors, Some(vec![1, 3]));
	}

	#[test]
	fn test_detect_defaults() {
		let Some(Command::Detect(detect)) = parse_args(&args(&["detect", "--series", "1,2,3"])).unwrap() else {
			panic!("expected detect command");
		};

		assert_eq!(detect.config.min_width, 3);
		assert_eq!(detect.config.k, 0.5);
		assert!(detect.config.require_recovery);
		assert_eq!(detect.config.smoothing_window, DipConfig::default().smoothing_window);
	}

	#[test]
	fn test_detect_segment() {
		let Some(Command::Detect(detect)) =
			parse_args(&args(&["detect", "--series", "[1,2,3]", "--start", "0", "--end", "2"])).unwrap()
		else {
			panic!("expected detect command");
		};
		assert_eq!(detect.segment(), Some((0, 2)));
	}

	#[test]
	fn test_detect_errors() {
		assert!(parse_args(&args(&["detect"])).is_err());
		assert!(parse_args(&args(&["detect", "--series", "1,2", "--start", "1"])).is_err());
		assert!(parse_args(&args(&["detect", "--series", "1,2", "--k", "steep"])).is_err());
		assert!(parse_args(&args(&["detect", "--series", "1,2", "--json=yes"])).is_err());
		assert!(parse_args(&args(&["detect", "--series"])).is_err());
		assert!(parse_args(&args(&["detect", "positional"])).is_err());
		assert!(parse_args(&args(&["frobnicate"])).is_err());
	}

	#[test]
	fn test_help_and_version_print_nothing_to_run() {
		assert_eq!(parse_args(&args(&[])).unwrap(), None);
		assert_eq!(parse_args(&args(&["--version"])).unwrap(), None);
		assert_eq!(parse_args(&args(&["detect", "-h"])).unwrap(), None);
	}

	#[test]
	fn test_summary_lines() {
		let series = [10.0, 10.0, 10.0, 2.0, 10.0, 10.0, 10.0];
		let config = DipConfig { min_width: 1, k: 0.1, smoothing_window: 1, ..DipConfig::default() };
		let dips = dip_detector::find_all_dips(&series, &config);

		assert_eq!(format_dip_line(1, &dips[0]), "1. [3:3] depth=8.000 width=1 conf=1.000 [fast] scales=2");

		let narrow = dip_detector::detect_dip(&series, 3, 3, &DipConfig::default()).unwrap();
		assert_eq!(
			format_classification(&narrow),
			"is_dip=false depth=0.000 threshold=0.000 confidence=0.000 reason=width_below_min"
		);
	}
}
