use std::fmt;
use std::io::{
	self,
	Read,
};

use crate::ProgramError;
use crate::parport::Port;

use super::{
	BLOCK_SIZE,
	DEVICE_SIZE,
	Programmer,
};

pub struct TransferBuffer {
	data: [u8; BLOCK_SIZE],
	len: usize,
}

impl TransferBuffer {
	pub fn new() -> Self {
		TransferBuffer {
			data: [0u8; BLOCK_SIZE],
			len: 0,
		}
	}

	pub fn capacity(&self) -> usize {
		BLOCK_SIZE
	}

	pub fn len(&self) -> usize {
		self.len
	}

	pub fn is_empty(&self) -> bool {
		0 == self.len
	}

	pub fn as_slice(&self) -> &[u8] {
		&self.data[..self.len]
	}

	pub fn clear(&mut self) {
		self.len = 0;
	}

	/// Replace the contents with (at most a buffer full of) `data`; returns
	/// the number of bytes taken.
	pub fn load(&mut self, data: &[u8]) -> usize {
		let count = data.len().min(BLOCK_SIZE);
		self.data[..count].copy_from_slice(&data[..count]);
		self.len = count;
		count
	}

	/// Replace the contents with up to `count` bytes from `reader`; only
	/// returns less than `count` at end of input.
	pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R, count: usize) -> io::Result<usize> {
		assert!(count <= BLOCK_SIZE);
		self.len = 0;
		while self.len < count {
			match reader.read(&mut self.data[self.len..count]) {
				Ok(0) => break,
				Ok(n) => self.len += n,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
				Err(e) => return Err(e),
			}
		}
		Ok(self.len)
	}
}

impl Default for TransferBuffer {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for TransferBuffer {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		f.debug_struct("TransferBuffer")
			.field("len", &self.len)
			.finish()
	}
}

/// Moves blocks between the transfer buffer and the device.
///
/// Both directions stop early at the end of the device; the returned count
/// is the number of bytes actually transferred.
pub struct BlockTransfer<'a, P: Port + 'a> {
	programmer: &'a mut Programmer<P>,
	buffer: TransferBuffer,
	failure: Option<ProgramError>,
}

impl<'a, P: Port> BlockTransfer<'a, P> {
	pub fn new(programmer: &'a mut Programmer<P>) -> Self {
		BlockTransfer {
			programmer,
			buffer: TransferBuffer::new(),
			failure: None,
		}
	}

	pub fn buffer(&self) -> &TransferBuffer {
		&self.buffer
	}

	pub fn buffer_mut(&mut self) -> &mut TransferBuffer {
		&mut self.buffer
	}

	/// why the last `write_block` stopped early (unless it hit the end of the device)
	pub fn take_failure(&mut self) -> Option<ProgramError> {
		self.failure.take()
	}

	/// Read `count` bytes starting at `address` into the buffer.
	pub fn read_block(&mut self, address: usize, count: usize) -> Result<usize, ProgramError> {
		assert!(count <= BLOCK_SIZE);
		self.buffer.len = 0;
		for i in 0..count {
			if address + i >= DEVICE_SIZE {
				break;
			}
			self.buffer.data[i] = self.programmer.read_byte(address + i)?;
			self.buffer.len = i + 1;
		}
		Ok(self.buffer.len)
	}

	/// Write the first `count` buffered bytes starting at `address`; stops at
	/// the first byte that fails to program.
	pub fn write_block(&mut self, address: usize, count: usize) -> usize {
		assert!(count <= self.buffer.len);
		self.failure = None;
		let mut written = 0;
		for i in 0..count {
			if address + i >= DEVICE_SIZE {
				break;
			}
			let data = self.buffer.data[i];
			let result = self.programmer.write_byte(address + i, data)
				.and_then(|outcome| outcome.into_result(address + i, data));
			if let Err(e) = result {
				error!("block write stopped: {}", e);
				self.failure = Some(e);
				break;
			}
			written += 1;
		}
		written
	}
}
