use libmzscan::config::DEFAULT_CODE_WINDOW_LIMIT;
use libmzscan::{AnalysisError, AnalyzerConfig, MzAnalyzer};

use anyhow::Context;
use clap::error::ErrorKind;
use clap::Parser;
use log::LevelFilter;

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

/// Prints the header, relocation table and interrupt calls of a DOS MZ executable.
#[derive(Parser, Debug)]
#[command(name = "mzscan", version)]
struct Args {
	/// DOS executable to inspect.
	executable_file: PathBuf,
	/// Maximum number of bytes scanned from the start of the load image.
	#[arg(long, default_value_t = DEFAULT_CODE_WINDOW_LIMIT)]
	window: usize,
	/// Log what the analyser is doing to stderr.
	#[arg(short, long)]
	verbose: bool,
}

fn init_logger(verbose: bool) {
	let default_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };
	env_logger::Builder::new()
		.filter_level(default_level)
		.parse_default_env()
		.init();
}

fn run(args: &Args) -> anyhow::Result<()> {
	let analyzer = MzAnalyzer::new(AnalyzerConfig::with_code_window_limit(args.window));
	let stdout = std::io::stdout();
	let mut out = stdout.lock();
	analyzer.analyze_file(&args.executable_file, &mut out)
		.with_context(|| format!("Couldn't analyse {}", args.executable_file.display()))?;
	out.flush().context("Failed to flush report")?;
	Ok(())
}

fn main() -> ExitCode {
	let args = match Args::try_parse() {
		Ok(args) => args,
		Err(err) => {
			let _ = err.print();
			return match err.kind() {
				ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
				_ => ExitCode::from(1),
			};
		}
	};
	init_logger(args.verbose);

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			if let Some(AnalysisError::SignatureMismatch) = err.downcast_ref::<AnalysisError>() {
				println!("{}", AnalysisError::SignatureMismatch);
			} else {
				eprintln!("{:#}", err);
			}
			ExitCode::from(1)
		}
	}
}
