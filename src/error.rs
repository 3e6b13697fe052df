use std::io;

use failure::Fail;

#[derive(Debug, Fail)]
pub enum ProgramError {
	#[fail(display = "address 0x{:04x} out of device range", address)]
	OutOfRange {
		address: usize,
	},

	#[fail(display = "invalid address range 0x{:04x}-0x{:04x}: start is larger than end", start, end)]
	InvalidRange {
		start: usize,
		end: usize,
	},

	#[fail(display = "write at 0x{:04x} (data 0x{:02x}) timed out waiting for data polling", address, data)]
	TimedOut {
		address: usize,
		data: u8,
	},

	#[fail(display = "write at 0x{:04x} failed to verify: wrote 0x{:02x}, read back 0x{:02x}", address, data, read_back)]
	VerifyMismatch {
		address: usize,
		data: u8,
		read_back: u8,
	},

	#[fail(display = "short transfer at 0x{:04x}: {} of {} bytes transferred", address, transferred, requested)]
	ShortTransfer {
		address: usize,
		requested: usize,
		transferred: usize,
	},

	#[fail(display = "image of {} bytes doesn't fit into the {} bytes available on the device", size, available)]
	ImageTooLarge {
		size: usize,
		available: usize,
	},

	#[fail(display = "S-record checksum mismatch: record has 0x{:02x}, expected 0x{:02x}", found, expected)]
	ChecksumMismatch {
		found: u8,
		expected: u8,
	},

	#[fail(display = "I/O error: {}", _0)]
	Io(#[cause] io::Error),
}

impl From<io::Error> for ProgramError {
	fn from(e: io::Error) -> Self {
		ProgramError::Io(e)
	}
}
