use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
	#[error("Failed to open file: {}: {source}", .path.display())]
	Open {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("This file does not appear to be a valid MZ executable.")]
	SignatureMismatch,
	#[error("Truncated {section}: {detail}")]
	Parse {
		section: &'static str,
		detail: String,
	},
	#[error("Invalid file geometry: {0}")]
	Geometry(#[from] GeometryError),
	#[error("Failed to read {context}: {source}")]
	Io {
		context: &'static str,
		source: std::io::Error,
	},
	#[error("Failed to write report: {0}")]
	Report(#[source] std::io::Error),
}

impl AnalysisError {
	/// Turns a failed read into a `Parse` error when the stream simply ran out of bytes, since that
	/// means the fixed layout is truncated. Anything else is a genuine I/O failure.
	pub fn from_read(section: &'static str, what: String, err: std::io::Error) -> AnalysisError {
		if err.kind() == std::io::ErrorKind::UnexpectedEof {
			AnalysisError::Parse { section, detail: format!("ran out of bytes reading {}", what) }
		} else {
			AnalysisError::Io { context: section, source: err }
		}
	}
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
	#[error("header declares zero 512-byte blocks, so the file size would underflow")]
	NoBlocks,
	#[error("code starts at byte {code_start}, past the estimated end of file at byte {file_size}")]
	CodeStartBeyondEnd {
		code_start: usize,
		file_size: usize,
	},
}
