/// Motorola S-records
///
/// `S<type><count><address><data...><checksum>`, all fields as hex pairs:
/// - count: number of bytes following (address + data + checksum)
/// - checksum: one's complement of the low byte of the sum over count,
///   address and data bytes
///
/// Record types:
/// - S0: header (vendor specific text)
/// - S1/S2/S3: data with 16/24/32-bit address
/// - S5/S6: record count
/// - S7/S8/S9: start address for 32/24/16-bit programs
///
/// The device only has a 16-bit address space, so only S1 records carry
/// data for it; all other records are skipped.

use std::fmt;
use std::io::{
	self,
	BufRead,
};

use failure::Fail;

use crate::ProgramError;

// address (2) + checksum (1)
const S1_OVERHEAD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Fail)]
pub enum RecordError {
	#[fail(display = "record doesn't start with 'S'")]
	MissingStart,
	#[fail(display = "record contains non-ASCII characters")]
	NotAscii,
	#[fail(display = "record too short")]
	TooShort,
	#[fail(display = "invalid hex digits at column {}", _0)]
	InvalidHex(usize),
	#[fail(display = "byte count {} too small for a data record", _0)]
	CountTooSmall(usize),
	#[fail(display = "byte count says {} hex digits follow, found {}", expected, found)]
	LengthMismatch {
		expected: usize,
		found: usize,
	},
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SRecord {
	pub address: u16,
	pub data: Vec<u8>,
	/// checksum as found in the record (not necessarily correct)
	pub checksum: u8,
}

impl SRecord {
	pub fn new(address: u16, data: Vec<u8>) -> Self {
		let mut record = SRecord {
			address,
			data,
			checksum: 0,
		};
		record.checksum = record.computed_checksum();
		record
	}

	pub fn computed_checksum(&self) -> u8 {
		let count = (self.data.len() + S1_OVERHEAD) as u8;
		let sum = self.data.iter().fold(
			count
				.wrapping_add((self.address >> 8) as u8)
				.wrapping_add(self.address as u8),
			|sum, &b| sum.wrapping_add(b),
		);
		!sum
	}

	pub fn is_checksum_valid(&self) -> bool {
		self.checksum == self.computed_checksum()
	}
}

/// Canonical S1 line, always with the correct checksum.
impl fmt::Display for SRecord {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "S1{:02X}{:04X}", self.data.len() + S1_OVERHEAD, self.address)?;
		for b in &self.data {
			write!(f, "{:02X}", b)?;
		}
		write!(f, "{:02X}", self.computed_checksum())
	}
}

fn hex_byte(line: &str, column: usize) -> Result<u8, RecordError> {
	let digits = line.get(column..column + 2).ok_or(RecordError::TooShort)?;
	if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(RecordError::InvalidHex(column));
	}
	u8::from_str_radix(digits, 16).map_err(|_| RecordError::InvalidHex(column))
}

/// Parse a single line; returns `None` for empty lines and all records
/// without data for a 16-bit address space.
pub fn parse_line(line: &str) -> Result<Option<SRecord>, RecordError> {
	let line = line.trim();
	if line.is_empty() {
		return Ok(None);
	}
	if !line.is_ascii() {
		return Err(RecordError::NotAscii);
	}
	if !line.starts_with('S') {
		return Err(RecordError::MissingStart);
	}
	if line.len() < 2 {
		return Err(RecordError::TooShort);
	}
	if &line[1..2] != "1" {
		return Ok(None);
	}

	let count = hex_byte(line, 2)? as usize;
	if count < S1_OVERHEAD {
		return Err(RecordError::CountTooSmall(count));
	}
	let expected = count * 2;
	let found = line.len() - 4;
	if expected != found {
		return Err(RecordError::LengthMismatch { expected, found });
	}

	let address = ((hex_byte(line, 4)? as u16) << 8) | (hex_byte(line, 6)? as u16);
	let data_len = count - S1_OVERHEAD;
	let mut data = Vec::with_capacity(data_len);
	for i in 0..data_len {
		data.push(hex_byte(line, 8 + 2 * i)?);
	}
	let checksum = hex_byte(line, 8 + 2 * data_len)?;

	Ok(Some(SRecord {
		address,
		data,
		checksum,
	}))
}

/// Iterator over the data records of an S-record file, with 1-based line
/// numbers.
pub struct Records<R> {
	lines: io::Lines<R>,
	line: usize,
}

impl<R: BufRead> Iterator for Records<R> {
	type Item = crate::AResult<(usize, SRecord)>;

	fn next(&mut self) -> Option<Self::Item> {
		loop {
			let text = self.lines.next()?;
			self.line += 1;
			let line = self.line;

			match with_context!(("S-record line {}", line), {
				let text = text.map_err(ProgramError::from)?;
				Ok(parse_line(&text)?)
			}) {
				Ok(Some(record)) => return Some(Ok((line, record))),
				Ok(None) => trace!("skipping S-record line {}", line),
				Err(e) => return Some(Err(e)),
			}
		}
	}
}

pub fn records<R: BufRead>(reader: R) -> Records<R> {
	Records {
		lines: reader.lines(),
		line: 0,
	}
}
