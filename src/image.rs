/// Transfers between the device and image files (raw binary or S-records)

use std::fs;
use std::io::{
	self,
	Read,
	Write,
};
use std::path::Path;

use failure::Error;

use crate::ProgramError;
use crate::parport::Port;
use crate::programmer::{
	BLOCK_SIZE,
	BlockTransfer,
	ChipSelect,
	DEVICE_SIZE,
	Programmer,
};
use crate::srec;

pub const DEFAULT_BINARY_FILE: &str = "data.bin";
pub const DEFAULT_SREC_FILE: &str = "data.srec";

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Format {
	Binary,
	SRecord,
}

impl Format {
	pub fn default_file(&self) -> &'static str {
		match self {
			Format::Binary => DEFAULT_BINARY_FILE,
			Format::SRecord => DEFAULT_SREC_FILE,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ChecksumPolicy {
	/// log mismatching records, program them anyway
	Warn,
	/// abort at the first mismatching record
	Strict,
}

/// Closed device address range `[start, end]`
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct AddressRange {
	start: usize,
	end: usize,
}

impl AddressRange {
	pub fn new(start: usize, end: usize) -> Result<Self, ProgramError> {
		if start >= DEVICE_SIZE {
			return Err(ProgramError::OutOfRange { address: start });
		}
		if end >= DEVICE_SIZE {
			return Err(ProgramError::OutOfRange { address: end });
		}
		if start > end {
			return Err(ProgramError::InvalidRange { start, end });
		}
		Ok(AddressRange { start, end })
	}

	pub fn full() -> Self {
		AddressRange {
			start: 0,
			end: DEVICE_SIZE - 1,
		}
	}

	pub fn start(&self) -> usize {
		self.start
	}

	pub fn end(&self) -> usize {
		self.end
	}

	pub fn len(&self) -> usize {
		self.end - self.start + 1
	}
}

/// Read `range` from the device into `out`, a buffer full at a time.
pub fn read_range<P, W>(programmer: &mut Programmer<P>, range: AddressRange, out: &mut W) -> crate::AResult<usize>
where
	P: Port,
	W: Write + ?Sized,
{
	// validates the address before touching anything else
	programmer.set_address(range.start(), ChipSelect::Inactive)?;

	let mut blocks = BlockTransfer::new(programmer);
	let mut address = range.start();
	let mut total = 0;
	while address <= range.end() {
		let count = (range.end() - address + 1).min(BLOCK_SIZE);
		let read = blocks.read_block(address, count)?;
		if read != count {
			return Err(ProgramError::ShortTransfer {
				address,
				requested: count,
				transferred: read,
			}.into());
		}

		with_context!("couldn't write image data", {
			out.write_all(blocks.buffer().as_slice()).map_err(ProgramError::from)?;
			Ok(())
		})?;

		total += read;
		address += read;
		info!("read {} bytes", total);
	}

	Ok(total)
}

/// Program `size` bytes from `input` starting at `start`.
///
/// Images that don't fit are rejected before anything is written.
pub fn write_binary<P, R>(programmer: &mut Programmer<P>, start: usize, input: &mut R, size: usize) -> crate::AResult<usize>
where
	P: Port,
	R: Read + ?Sized,
{
	if size > DEVICE_SIZE {
		return Err(ProgramError::ImageTooLarge { size, available: DEVICE_SIZE }.into());
	}
	if start >= DEVICE_SIZE {
		return Err(ProgramError::OutOfRange { address: start }.into());
	}
	if size > DEVICE_SIZE - start {
		return Err(ProgramError::ImageTooLarge { size, available: DEVICE_SIZE - start }.into());
	}

	let mut blocks = BlockTransfer::new(programmer);
	let mut address = start;
	let mut total = 0;
	while total < size {
		let count = (size - total).min(BLOCK_SIZE);
		let read = with_context!("couldn't read image data", {
			Ok(blocks.buffer_mut().fill_from(input, count).map_err(ProgramError::from)?)
		})?;
		ensure!(read == count, "image ended after {} of {} bytes", total + read, size);

		let written = blocks.write_block(address, read);
		if written != read {
			let short = ProgramError::ShortTransfer {
				address,
				requested: read,
				transferred: written,
			};
			return Err(match blocks.take_failure() {
				Some(cause) => Error::from(cause).context(short.to_string()).into(),
				None => short.into(),
			});
		}

		total += written;
		address += written;
		info!("{} bytes programmed", total);
	}

	Ok(total)
}

/// Program all S1 records from `input`; the first failing byte aborts the
/// whole file.
pub fn write_srecords<P, R>(programmer: &mut Programmer<P>, input: R, checksums: ChecksumPolicy) -> crate::AResult<usize>
where
	P: Port,
	R: io::BufRead,
{
	let mut total = 0;
	for record in srec::records(input) {
		let (line, record) = record?;

		if !record.is_checksum_valid() {
			let mismatch = ProgramError::ChecksumMismatch {
				found: record.checksum,
				expected: record.computed_checksum(),
			};
			match checksums {
				ChecksumPolicy::Strict => {
					let msg = format!("S-record line {}", line);
					return Err(Error::from(mismatch).context(msg).into());
				},
				ChecksumPolicy::Warn => {
					warn!("S-record line {}: {} (expected record: {})", line, mismatch, record);
				},
			}
		}

		for (offset, &data) in record.data.iter().enumerate() {
			let address = record.address as usize + offset;
			let result = programmer.write_byte(address, data)
				.and_then(|outcome| outcome.into_result(address, data));
			if let Err(e) = result {
				let msg = format!("S-record line {}: programming aborted after {} bytes", line, total);
				return Err(Error::from(e).context(msg).into());
			}
			total += 1;
		}

		debug!("S-record line {}: {} bytes at 0x{:04x}", line, record.data.len(), record.address);
		info!("{} bytes programmed", total);
	}

	Ok(total)
}

pub fn read_to_file<P: Port>(programmer: &mut Programmer<P>, range: AddressRange, path: &Path, format: Format) -> crate::AResult<usize> {
	ensure!(format == Format::Binary, "reading into S-record files is not supported");

	let file = with_context!(("couldn't open {:?} for writing", path),
		Ok(fs::File::create(path).map_err(ProgramError::from)?)
	)?;
	let mut out = io::BufWriter::new(file);
	let total = read_range(programmer, range, &mut out)?;
	with_context!(("couldn't write {:?}", path), {
		out.flush().map_err(ProgramError::from)?;
		out.get_ref().sync_all().map_err(ProgramError::from)?;
		Ok(())
	})?;

	Ok(total)
}

pub fn write_from_file<P: Port>(programmer: &mut Programmer<P>, start: usize, path: &Path, format: Format, checksums: ChecksumPolicy) -> crate::AResult<usize> {
	let file = with_context!(("couldn't open {:?} for reading", path),
		Ok(fs::File::open(path).map_err(ProgramError::from)?)
	)?;

	match format {
		Format::Binary => {
			let size = with_context!(("couldn't get size of {:?}", path),
				Ok(file.metadata().map_err(ProgramError::from)?.len())
			)?;
			if size > DEVICE_SIZE as u64 {
				return Err(ProgramError::ImageTooLarge { size: size as usize, available: DEVICE_SIZE }.into());
			}
			write_binary(programmer, start, &mut io::BufReader::new(file), size as usize)
		},
		Format::SRecord => {
			write_srecords(programmer, io::BufReader::new(file), checksums)
		},
	}
}
