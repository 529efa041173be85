use crate::analysis_error::AnalysisError;
use crate::config::AnalyzerConfig;
use crate::exe_loader::{has_mz_signature, open_executable, MzHeader};
use crate::interrupt_scanner::{FunctionGuess, ScanPass, ANY_INTERRUPT_PASS, DOS_CALL_PASS};

use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

struct Report<'a, W: Write> {
	out: &'a mut W,
}

impl<'a, W: Write> Report<'a, W> {
	fn line(&mut self, args: std::fmt::Arguments) -> Result<(), AnalysisError> {
		self.out.write_fmt(args).and_then(|_| self.out.write_all(b"\n")).map_err(AnalysisError::Report)
	}

	fn text(&mut self, text: &str) -> Result<(), AnalysisError> {
		self.out.write_all(text.as_bytes()).map_err(AnalysisError::Report)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MzAnalyzer {
	pub config: AnalyzerConfig,
}

impl MzAnalyzer {
	pub fn new(config: AnalyzerConfig) -> MzAnalyzer {
		MzAnalyzer { config }
	}

	/// Opens `path`, checks its signature and writes the analysis to `out`. Nothing is written if
	/// the file cannot be opened or does not start with "MZ".
	pub fn analyze_file<W: Write>(&self, path: &Path, out: &mut W) -> Result<(), AnalysisError> {
		let mut file = open_executable(path)?;
		let is_mz = has_mz_signature(&mut file).map_err(|e| AnalysisError::Io { context: "signature", source: e })?;
		if !is_mz {
			return Err(AnalysisError::SignatureMismatch);
		}
		debug!("Analysing {}", path.display());
		self.analyze_stream(&mut file, out)
	}

	/// Writes the analysis of an MZ image to `out`. The signature is displayed, not checked. On
	/// failure everything reported before the failing section stays written.
	pub fn analyze_stream<StreamType, W>(&self, stream: &mut StreamType, out: &mut W) -> Result<(), AnalysisError>
		where StreamType: Read + Seek, W: Write
	{
		let mut report = Report { out };

		stream.seek(SeekFrom::Start(0)).map_err(|e| AnalysisError::Io { context: "header", source: e })?;
		let header = MzHeader::parse(stream)?;
		debug!("{:?}", header);

		report.line(format_args!("\n=== MZ EXECUTABLE ANALYSIS ===\n"))?;
		report.line(format_args!("Header Info:"))?;
		report.line(format_args!("------------"))?;
		report.text(&header.to_string())?;
		report.line(format_args!(""))?;

		let file_size = header.file_size()?;
		report.line(format_args!("Estimated file size: {} bytes\n", file_size))?;
		warn_on_size_mismatch(stream, file_size);

		if header.relocation_items > 0 {
			let entries = header.read_relocation_table(stream)?;
			report.line(format_args!("Relocation Table:"))?;
			report.line(format_args!("------------------"))?;
			for (index, entry) in entries.iter().enumerate() {
				report.line(format_args!("Entry #{} => Offset: 0x{:x}, Segment: 0x{:x}", index, entry.offset, entry.segment))?;
			}
			report.line(format_args!(""))?;
		}

		let window = header.code_window(self.config.code_window_limit)?;
		let code = header.extract_code(stream, window)?;

		report.line(format_args!("Code Analysis (looking for INT 21h calls):"))?;
		report.line(format_args!("------------------------------------------"))?;
		report_dos_calls(&mut report, &DOS_CALL_PASS, &code, window.start)?;

		report.line(format_args!("Extra: Scanning for DOS interrupt functions in raw code:"))?;
		report.line(format_args!("--------------------------------------------------"))?;
		report_interrupts(&mut report, &ANY_INTERRUPT_PASS, &code, window.start)?;

		Ok(())
	}
}

fn warn_on_size_mismatch<StreamType: Seek>(stream: &mut StreamType, file_size: usize) {
	match stream.seek(SeekFrom::End(0)) {
		Ok(actual) if actual != file_size as u64 => {
			warn!("Header estimates {} bytes but the file is {} bytes long", file_size, actual);
		}
		Ok(_) => {}
		Err(e) => debug!("Couldn't determine the real file length: {}", e),
	}
}

fn report_dos_calls<W: Write>(report: &mut Report<W>, pass: &ScanPass, code: &[u8], code_start: usize) -> Result<(), AnalysisError> {
	for site in pass.scan(code) {
		report.line(format_args!("Found INT {:x}h at offset 0x{:x}", site.interrupt, code_start + site.position))?;
		report.line(format_args!("  Surrounding bytes: {}", pass.render_context(code, &site)))?;
		if let Some(FunctionGuess::Known(function)) = site.function {
			report.line(format_args!("  MOV AH, 0x{:x} => {}\n", function.number, function.label))?;
		}
	}
	Ok(())
}

fn report_interrupts<W: Write>(report: &mut Report<W>, pass: &ScanPass, code: &[u8], code_start: usize) -> Result<(), AnalysisError> {
	for site in pass.scan(code) {
		report.line(format_args!("Found INT {:x}h at offset 0x{:x}", site.interrupt, code_start + site.position))?;
		report.line(format_args!("  Context: {}", pass.render_context(code, &site)))?;
		match site.function {
			Some(FunctionGuess::Known(function)) => report.line(format_args!("  Purpose: {}", function.label))?,
			Some(FunctionGuess::Unknown(number)) => report.line(format_args!("  Purpose: Unknown function (0x{:x})", number))?,
			Some(FunctionGuess::NoPrecedingByte) => report.line(format_args!("  Purpose: Unknown function (no preceding byte)"))?,
			None => {}
		}
		report.line(format_args!(""))?;
	}
	Ok(())
}
