use crate::dos_functions::{DosFunction, DosFunctionTable};

use log::trace;

/// `INT imm8`
pub const INT_OPCODE: u8 = 0xcd;
/// `MOV AH, imm8`
pub const MOV_AH_IMM8_OPCODE: u8 = 0xb4;
pub const DOS_API_INTERRUPT: u8 = 0x21;

/// Where a pass looks for the DOS function number of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionProbe {
	/// Only a `MOV AH, imm8` ending right before the interrupt counts, and numbers missing from the
	/// table are not reported at all.
	MovAhImmediate,
	/// The byte right before the interrupt is taken as the function number, but only for the
	/// listed interrupts. Numbers missing from the table are reported as unknown.
	PrecedingByte { interrupts: &'static [u8] },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanPass {
	/// Only `INT` instructions with this number match. `None` matches every `INT`.
	pub interrupt: Option<u8>,
	pub context_before: usize,
	pub context_after: usize,
	/// Render the matched instruction as `[CD] [nn]` inside the context dump.
	pub mark_instruction: bool,
	pub probe: FunctionProbe,
	pub functions: DosFunctionTable,
}

/// INT 21h calls with a preceding `MOV AH, imm8`.
pub const DOS_CALL_PASS: ScanPass = ScanPass {
	interrupt: Some(DOS_API_INTERRUPT),
	context_before: 10,
	context_after: 9,
	mark_instruction: false,
	probe: FunctionProbe::MovAhImmediate,
	functions: DosFunctionTable::Common,
};

/// Every `INT` instruction, with a wider context.
pub const ANY_INTERRUPT_PASS: ScanPass = ScanPass {
	interrupt: None,
	context_before: 10,
	context_after: 10,
	mark_instruction: true,
	probe: FunctionProbe::PrecedingByte { interrupts: &[DOS_API_INTERRUPT, 0x3f] },
	functions: DosFunctionTable::Extended,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionGuess {
	Known(&'static DosFunction),
	Unknown(u8),
	/// The interrupt is the first byte of the code window.
	NoPrecedingByte,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterruptSite {
	/// Index of the `0xCD` byte within the code window.
	pub position: usize,
	pub interrupt: u8,
	pub function: Option<FunctionGuess>,
}

/// The byte `delta` positions away from `position`, or `None` if that falls outside `code`.
pub fn byte_at(code: &[u8], position: usize, delta: isize) -> Option<u8> {
	position.checked_add_signed(delta).and_then(|index| code.get(index).copied())
}

impl ScanPass {
	/// Matches are returned in ascending position order. An `INT` opcode in the last byte has no
	/// interrupt number and never matches.
	pub fn scan(&self, code: &[u8]) -> Vec<InterruptSite> {
		let mut sites = vec![];
		for (position, pair) in code.windows(2).enumerate() {
			if pair[0] != INT_OPCODE {
				continue;
			}
			let interrupt = pair[1];
			if let Some(wanted) = self.interrupt {
				if interrupt != wanted {
					continue;
				}
			}
			let function = self.probe_function(code, position, interrupt);
			trace!("INT 0x{:02x} at code position {} (function {:?})", interrupt, position, function);
			sites.push(InterruptSite { position, interrupt, function });
		}
		sites
	}

	fn probe_function(&self, code: &[u8], position: usize, interrupt: u8) -> Option<FunctionGuess> {
		match self.probe {
			FunctionProbe::MovAhImmediate => {
				if byte_at(code, position, -2)? != MOV_AH_IMM8_OPCODE {
					return None;
				}
				let number = byte_at(code, position, -1)?;
				self.functions.lookup(number).map(FunctionGuess::Known)
			}
			FunctionProbe::PrecedingByte { interrupts } => {
				if !interrupts.contains(&interrupt) {
					return None;
				}
				let guess = match byte_at(code, position, -1) {
					Some(number) => match self.functions.lookup(number) {
						Some(function) => FunctionGuess::Known(function),
						None => FunctionGuess::Unknown(number),
					},
					None => FunctionGuess::NoPrecedingByte,
				};
				Some(guess)
			}
		}
	}

	/// Hex dump of the bytes around `site`, leaving out anything outside the code window.
	pub fn render_context(&self, code: &[u8], site: &InterruptSite) -> String {
		let mut parts = vec![];
		for delta in -(self.context_before as isize) ..= self.context_after as isize {
			if let Some(byte) = byte_at(code, site.position, delta) {
				let rendered = match delta {
					0 if self.mark_instruction => "[CD]".to_string(),
					1 if self.mark_instruction => format!("[{:x}]", site.interrupt),
					_ => format!("{:02x}", byte),
				};
				parts.push(rendered);
			}
		}
		parts.join(" ")
	}
}
