use crate::analysis_error::{AnalysisError, GeometryError};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

// https://wiki.osdev.org/MZ

pub const EXE_SIGNATURE: [u8; 2] = *b"MZ";
pub const EXE_PARAGRAPH_BYTES: usize = 16;
pub const EXE_BLOCK_BYTES: usize = 512;
pub const MZ_HEADER_BYTES: usize = 28;

/// The fixed part of an MZ header, exactly as it appears in the first 28 bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MzHeader {
	pub signature: u16,
	/// Bytes used in the last 512-byte block.
	pub last_block_bytes: u16,
	pub file_block_count: u16,
	pub relocation_items: u16,
	pub header_paragraph_count: u16,
	pub minimum_memory_paragraphs: u16,
	pub maximum_memory_paragraphs: u16,
	pub initial_ss: u16,
	pub initial_sp: u16,
	pub checksum: u16,
	pub initial_ip: u16,
	pub initial_cs: u16,
	/// Absolute file offset of the relocation table.
	pub relocation_table: u16,
	pub overlay: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationEntry {
	pub offset: u16,
	pub segment: u16,
}

/// The part of the load image that gets scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeWindow {
	pub start: usize,
	pub len: usize,
}

fn read_header_field<StreamType: Read>(stream: &mut StreamType, name: &str) -> Result<u16, AnalysisError> {
	stream.read_u16::<LittleEndian>().map_err(|e| AnalysisError::from_read("header", name.to_string(), e))
}

impl MzHeader {
	pub fn byte_size() -> usize {
		MZ_HEADER_BYTES
	}

	/// Decodes the header from the stream's current position.
	pub fn parse<StreamType: Read>(stream: &mut StreamType) -> Result<MzHeader, AnalysisError> {
		let signature = read_header_field(stream, "signature")?;
		let last_block_bytes = read_header_field(stream, "last_block_bytes")?;
		let file_block_count = read_header_field(stream, "file_block_count")?;
		let relocation_items = read_header_field(stream, "relocation_items")?;
		let header_paragraph_count = read_header_field(stream, "header_paragraph_count")?;
		let minimum_memory_paragraphs = read_header_field(stream, "minimum_memory_paragraphs")?;
		let maximum_memory_paragraphs = read_header_field(stream, "maximum_memory_paragraphs")?;
		let initial_ss = read_header_field(stream, "initial_ss")?;
		let initial_sp = read_header_field(stream, "initial_sp")?;
		let checksum = read_header_field(stream, "checksum")?;
		let initial_ip = read_header_field(stream, "initial_ip")?;
		let initial_cs = read_header_field(stream, "initial_cs")?;
		let relocation_table = read_header_field(stream, "relocation_table")?;
		let overlay = read_header_field(stream, "overlay")?;

		Ok(MzHeader {
			signature,
			last_block_bytes,
			file_block_count,
			relocation_items,
			header_paragraph_count,
			minimum_memory_paragraphs,
			maximum_memory_paragraphs,
			initial_ss,
			initial_sp,
			checksum,
			initial_ip,
			initial_cs,
			relocation_table,
			overlay,
		})
	}

	/// Estimated size of the file according to the header. `last_block_bytes` is added as is, a
	/// zero there is not treated as a full block.
	pub fn file_size(&self) -> Result<usize, GeometryError> {
		if self.file_block_count == 0 {
			return Err(GeometryError::NoBlocks);
		}
		Ok((self.file_block_count as usize - 1) * EXE_BLOCK_BYTES + self.last_block_bytes as usize)
	}

	pub fn code_start(&self) -> usize {
		self.header_paragraph_count as usize * EXE_PARAGRAPH_BYTES
	}

	pub fn code_window(&self, limit: usize) -> Result<CodeWindow, GeometryError> {
		let file_size = self.file_size()?;
		let start = self.code_start();
		if start > file_size {
			return Err(GeometryError::CodeStartBeyondEnd { code_start: start, file_size });
		}
		let len = std::cmp::min(file_size - start, limit);
		debug!("Code window: {} bytes from 0x{:x} (estimated file size {})", len, start, file_size);
		Ok(CodeWindow { start, len })
	}

	pub fn read_relocation_table<StreamType>(&self, stream: &mut StreamType) -> Result<Vec<RelocationEntry>, AnalysisError>
		where StreamType: Read + Seek
	{
		debug!("Reading {} relocation entries at 0x{:x}", self.relocation_items, self.relocation_table);
		stream.seek(SeekFrom::Start(self.relocation_table as u64))
			.map_err(|e| AnalysisError::Io { context: "relocation table", source: e })?;

		let mut entries = Vec::with_capacity(self.relocation_items as usize);
		for index in 0..self.relocation_items {
			let offset = stream.read_u16::<LittleEndian>()
				.map_err(|e| AnalysisError::from_read("relocation table", format!("offset of entry #{}", index), e))?;
			let segment = stream.read_u16::<LittleEndian>()
				.map_err(|e| AnalysisError::from_read("relocation table", format!("segment of entry #{}", index), e))?;
			entries.push(RelocationEntry { offset, segment });
		}
		Ok(entries)
	}

	/// Reads the bytes of `window`. If the file is physically shorter than the header claims, only
	/// the bytes that exist are returned.
	pub fn extract_code<StreamType>(&self, stream: &mut StreamType, window: CodeWindow) -> Result<Vec<u8>, AnalysisError>
		where StreamType: Read + Seek
	{
		stream.seek(SeekFrom::Start(window.start as u64))
			.map_err(|e| AnalysisError::Io { context: "code", source: e })?;
		let mut result = Vec::with_capacity(window.len);
		stream.take(window.len as u64).read_to_end(&mut result)
			.map_err(|e| AnalysisError::Io { context: "code", source: e })?;
		if result.len() < window.len {
			warn!("Code window truncated: wanted {} bytes at 0x{:x}, file only has {}", window.len, window.start, result.len());
		}
		Ok(result)
	}
}

// Address-like fields are shown in hex, counts and sizes in decimal.
impl std::fmt::Display for MzHeader {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "Signature: 0x{:x}", self.signature)?;
		writeln!(f, "Bytes on last page: {}", self.last_block_bytes)?;
		writeln!(f, "Total pages: {}", self.file_block_count)?;
		writeln!(f, "Relocations: {}", self.relocation_items)?;
		writeln!(f, "Header size (paragraphs): {}", self.header_paragraph_count)?;
		writeln!(f, "Min alloc: {} paragraphs", self.minimum_memory_paragraphs)?;
		writeln!(f, "Max alloc: {} paragraphs", self.maximum_memory_paragraphs)?;
		writeln!(f, "Initial SS: 0x{:x}", self.initial_ss)?;
		writeln!(f, "Initial SP: 0x{:x}", self.initial_sp)?;
		writeln!(f, "Checksum: {}", self.checksum)?;
		writeln!(f, "Initial IP: {}", self.initial_ip)?;
		writeln!(f, "Initial CS: {}", self.initial_cs)?;
		writeln!(f, "Relocation table offset: {}", self.relocation_table)?;
		writeln!(f, "Overlay number: 0x{:x}", self.overlay)
	}
}

/// Checks for the "MZ" magic at the stream's current position. A stream too short to hold the
/// magic is not an MZ executable.
pub fn has_mz_signature<StreamType: Read>(stream: &mut StreamType) -> Result<bool, std::io::Error> {
	let mut signature = [0u8; 2];
	let mut filled = 0;
	while filled < signature.len() {
		match stream.read(&mut signature[filled..]) {
			Ok(0) => return Ok(false),
			Ok(count) => filled += count,
			Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
			Err(e) => return Err(e),
		}
	}
	Ok(signature == EXE_SIGNATURE)
}

pub fn open_executable(path: &Path) -> Result<std::fs::File, AnalysisError> {
	std::fs::File::open(path).map_err(|e| AnalysisError::Open { path: path.to_path_buf(), source: e })
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;
	use test_log::test;

	fn header_bytes(fields: [u16; 14]) -> Vec<u8> {
		fields.iter().flat_map(|field| field.to_le_bytes().to_vec()).collect()
	}

	fn header_with(file_block_count: u16, last_block_bytes: u16, header_paragraph_count: u16) -> MzHeader {
		let bytes = header_bytes([0x5a4d, last_block_bytes, file_block_count, 0, header_paragraph_count, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
		MzHeader::parse(&mut Cursor::new(bytes)).unwrap()
	}

	#[test]
	fn parses_fields_in_order() {
		let bytes = header_bytes([0x5a4d, 100, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 0x1c, 12]);
		assert_eq!(bytes.len(), MzHeader::byte_size());
		let header = MzHeader::parse(&mut Cursor::new(bytes)).unwrap();
		assert_eq!(header, MzHeader {
			signature: 0x5a4d,
			last_block_bytes: 100,
			file_block_count: 2,
			relocation_items: 3,
			header_paragraph_count: 4,
			minimum_memory_paragraphs: 5,
			maximum_memory_paragraphs: 6,
			initial_ss: 7,
			initial_sp: 8,
			checksum: 9,
			initial_ip: 10,
			initial_cs: 11,
			relocation_table: 0x1c,
			overlay: 12,
		});
	}

	#[test]
	fn short_header_is_a_parse_error() {
		let mut bytes = header_bytes([0x5a4d, 100, 2, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
		bytes.truncate(27);
		match MzHeader::parse(&mut Cursor::new(bytes)) {
			Err(AnalysisError::Parse { section: "header", detail }) => assert!(detail.contains("overlay")),
			other => panic!("Expected a header parse error, got {:?}", other),
		}
	}

	#[test]
	fn file_size_counts_full_blocks_plus_last_block() {
		for &(blocks, last) in &[(1u16, 0u16), (1, 511), (2, 100), (5, 0), (0xffff, 0xffff)] {
			let header = header_with(blocks, last, 0);
			assert_eq!(header.file_size(), Ok((blocks as usize - 1) * 512 + last as usize));
		}
	}

	#[test]
	fn zero_blocks_is_a_geometry_error() {
		let header = header_with(0, 100, 2);
		assert_eq!(header.file_size(), Err(GeometryError::NoBlocks));
		assert_eq!(header.code_window(1024), Err(GeometryError::NoBlocks));
	}

	#[test]
	fn code_window_is_clamped_to_limit() {
		let header = header_with(4, 0, 2);
		assert_eq!(header.code_window(1024), Ok(CodeWindow { start: 32, len: 1024 }));
		assert_eq!(header.code_window(16), Ok(CodeWindow { start: 32, len: 16 }));

		let small = header_with(2, 100, 2);
		assert_eq!(small.code_window(1024), Ok(CodeWindow { start: 32, len: 580 }));
	}

	#[test]
	fn code_start_past_end_is_a_geometry_error() {
		let header = header_with(1, 20, 2);
		assert_eq!(header.code_window(1024), Err(GeometryError::CodeStartBeyondEnd { code_start: 32, file_size: 20 }));
		let exact = header_with(1, 32, 2);
		assert_eq!(exact.code_window(1024), Ok(CodeWindow { start: 32, len: 0 }));
	}

	#[test]
	fn reads_relocation_entries_at_table_offset() {
		let mut bytes = header_bytes([0x5a4d, 100, 2, 2, 4, 0, 0, 0, 0, 0, 0, 0, 0x20, 0]);
		bytes.resize(0x20, 0);
		bytes.extend_from_slice(&[0x34, 0x12, 0x00, 0x00, 0xcd, 0xab, 0x01, 0x00]);
		let mut stream = Cursor::new(bytes);
		let header = MzHeader::parse(&mut stream).unwrap();
		let entries = header.read_relocation_table(&mut stream).unwrap();
		assert_eq!(entries, vec![
			RelocationEntry { offset: 0x1234, segment: 0 },
			RelocationEntry { offset: 0xabcd, segment: 1 },
		]);
	}

	#[test]
	fn truncated_relocation_table_names_the_entry() {
		let mut bytes = header_bytes([0x5a4d, 100, 2, 2, 4, 0, 0, 0, 0, 0, 0, 0, 0x1c, 0]);
		bytes.extend_from_slice(&[0x34, 0x12, 0x00, 0x00, 0xcd, 0xab]);
		let mut stream = Cursor::new(bytes);
		let header = MzHeader::parse(&mut stream).unwrap();
		match header.read_relocation_table(&mut stream) {
			Err(AnalysisError::Parse { section: "relocation table", detail }) => assert!(detail.contains("entry #1")),
			other => panic!("Expected a relocation parse error, got {:?}", other),
		}
	}

	#[test]
	fn extract_code_stops_at_end_of_stream() {
		let mut bytes = header_bytes([0x5a4d, 100, 2, 0, 2, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
		bytes.resize(32, 0);
		bytes.extend_from_slice(&[0xb4, 0x09, 0xcd, 0x21]);
		let mut stream = Cursor::new(bytes);
		let header = MzHeader::parse(&mut stream).unwrap();
		let window = header.code_window(1024).unwrap();
		assert_eq!(header.extract_code(&mut stream, window).unwrap(), vec![0xb4, 0x09, 0xcd, 0x21]);
	}

	#[test]
	fn display_lists_every_field_once() {
		let bytes = header_bytes([0x5a4d, 100, 2, 3, 4, 5, 6, 0x1f, 0xfffe, 9, 10, 11, 0x1c, 0x12]);
		let header = MzHeader::parse(&mut Cursor::new(bytes)).unwrap();
		let text = header.to_string();
		let lines: Vec<&str> = text.lines().collect();
		assert_eq!(lines, vec![
			"Signature: 0x5a4d",
			"Bytes on last page: 100",
			"Total pages: 2",
			"Relocations: 3",
			"Header size (paragraphs): 4",
			"Min alloc: 5 paragraphs",
			"Max alloc: 6 paragraphs",
			"Initial SS: 0x1f",
			"Initial SP: 0xfffe",
			"Checksum: 9",
			"Initial IP: 10",
			"Initial CS: 11",
			"Relocation table offset: 28",
			"Overlay number: 0x12",
		]);
	}

	#[test]
	fn sniffs_signature() {
		assert!(has_mz_signature(&mut Cursor::new(b"MZ\x90\x00".to_vec())).unwrap());
		assert!(!has_mz_signature(&mut Cursor::new(b"ZM\x90\x00".to_vec())).unwrap());
		assert!(!has_mz_signature(&mut Cursor::new(b"mz".to_vec())).unwrap());
		assert!(!has_mz_signature(&mut Cursor::new(b"M".to_vec())).unwrap());
		assert!(!has_mz_signature(&mut Cursor::new(Vec::new())).unwrap());
	}

	#[test]
	fn missing_file_is_an_open_error() {
		let path = Path::new("/nonexistent/mzscan/NOFILE.EXE");
		assert!(matches!(open_executable(path), Err(AnalysisError::Open { .. })));
	}
}
