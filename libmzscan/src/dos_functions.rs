// INT 21h function numbers, selected by the value in AH.
// http://spike.scu.edu.au/~barry/interrupts.html
// http://stanislavs.org/helppc/int_21.html

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosFunction {
	pub number: u8,
	pub label: &'static str,
}

const fn dos_fn(number: u8, label: &'static str) -> DosFunction {
	DosFunction { number, label }
}

/// The functions recognised after a `MOV AH, imm8` that directly precedes an `INT 21h`.
pub const COMMON_DOS_FUNCTIONS: [DosFunction; 12] = [
	dos_fn(0x00, "Program terminate"),
	dos_fn(0x01, "Char input with echo"),
	dos_fn(0x02, "Char output"),
	dos_fn(0x09, "Print string"),
	dos_fn(0x0a, "Buffered input"),
	dos_fn(0x3c, "Create file"),
	dos_fn(0x3d, "Open file"),
	dos_fn(0x3e, "Close file"),
	dos_fn(0x3f, "Read file"),
	dos_fn(0x40, "Write file"),
	dos_fn(0x41, "Delete file"),
	dos_fn(0x4c, "Exit program"),
];

/// Superset of `COMMON_DOS_FUNCTIONS` used when labelling every interrupt site in raw code.
pub const EXTENDED_DOS_FUNCTIONS: [DosFunction; 28] = [
	dos_fn(0x00, "Program terminate"),
	dos_fn(0x01, "Char input with echo"),
	dos_fn(0x02, "Char output"),
	dos_fn(0x09, "Print string"),
	dos_fn(0x0a, "Buffered input"),
	dos_fn(0x0c, "Get keystroke (no echo)"),
	dos_fn(0x10, "Set cursor position"),
	dos_fn(0x11, "Get current cursor position"),
	dos_fn(0x12, "Get video mode"),
	dos_fn(0x13, "Set video mode"),
	dos_fn(0x16, "Read keystroke (buffered)"),
	dos_fn(0x17, "Set default drive"),
	dos_fn(0x1a, "Get current disk drive"),
	dos_fn(0x1c, "Get disk free space"),
	dos_fn(0x1e, "Set file attributes"),
	dos_fn(0x1f, "Get file attributes"),
	dos_fn(0x25, "Set interrupt vector"),
	dos_fn(0x29, "Get system time"),
	dos_fn(0x2c, "Get system date"),
	dos_fn(0x2f, "Get drive parameter block"),
	dos_fn(0x30, "Terminate process"),
	dos_fn(0x3c, "Create file"),
	dos_fn(0x3d, "Open file"),
	dos_fn(0x3e, "Close file"),
	dos_fn(0x3f, "Read file"),
	dos_fn(0x40, "Write file"),
	dos_fn(0x41, "Delete file"),
	dos_fn(0x4c, "Exit program"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DosFunctionTable {
	Common,
	Extended,
}

impl DosFunctionTable {
	pub fn entries(&self) -> &'static [DosFunction] {
		match self {
			DosFunctionTable::Common => &COMMON_DOS_FUNCTIONS,
			DosFunctionTable::Extended => &EXTENDED_DOS_FUNCTIONS,
		}
	}

	pub fn lookup(&self, number: u8) -> Option<&'static DosFunction> {
		for function in self.entries() {
			if function.number == number {
				return Some(function);
			}
		}
		None
	}
}
