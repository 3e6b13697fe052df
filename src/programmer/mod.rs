/// Programmer for 32K x 8 parallel EEPROMs (ATMEL 28C256 and compatibles)
/// attached to a PC parallel port.
///
/// The parallel port is narrower than the EEPROM bus, so the programmer board
/// has two latches for the address:
/// - low latch: A0..A7
/// - high latch: A8..A14, bit 7 drives /CS
///
/// Both are clocked through a 3-to-8 decoder (function bits F0..F2 in the
/// control register, gated by strobe), which also drives /WE, /OE and a
/// loopback line sensed on status bit 7.
///
/// Write completion uses data polling: while the internal write cycle runs,
/// reading the written address returns bit 7 inverted.

use std::ops::{
	Deref,
	DerefMut,
};
use std::time::Duration;

use crate::ProgramError;
use crate::parport::{
	Direction,
	Port,
};

mod block;
mod bus;
mod control;
#[cfg(test)]
pub(crate) mod sim;

pub use self::block::{
	BlockTransfer,
	TransferBuffer,
};

pub use self::control::{
	Control,
	Function,
	Status,
};

use self::bus::PortBusExt;
use self::control::{
	CONTROL_INIT,
	DATA_INIT,
};

pub const DEVICE_SIZE: usize = 0x8000;
pub const BLOCK_SIZE: usize = 1024;
/// erased cell value
pub const BLANK: u8 = 0xff;

const CHIP_SELECT_INACTIVE: u8 = 0x80;
const DATA_POLLING_BIT: u8 = 0x80;
const ERASE_PROGRESS_INTERVAL: usize = 1024;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum ChipSelect {
	/// /CS low, device responds to /WE and /OE
	Active,
	/// /CS high
	Inactive,
}

impl ChipSelect {
	fn apply(self, high_address: u8) -> u8 {
		match self {
			ChipSelect::Active => high_address & !CHIP_SELECT_INACTIVE,
			ChipSelect::Inactive => high_address | CHIP_SELECT_INACTIVE,
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Timing {
	/// delay after the /WE pulse before polling starts
	pub write_cycle_start: Duration,
	/// /OE active before sampling the data lines
	pub output_enable_settle: Duration,
	/// maximum number of read-backs waiting for data polling to finish.
	///
	/// This is only a rough timeout: the duration of a read-back depends on
	/// the port access time.
	pub poll_limit: usize,
	/// number of unverified writes during erase before pausing
	pub erase_batch: usize,
	/// pause after each erase batch, must cover the device's write cycle
	pub erase_pause: Duration,
}

impl Default for Timing {
	fn default() -> Self {
		Timing {
			write_cycle_start: Duration::from_millis(1),
			output_enable_settle: Duration::from_micros(10),
			poll_limit: 100, // typical write takes about 40 reads
			erase_batch: 64,
			erase_pause: Duration::from_millis(20),
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum WriteOutcome {
	Ok,
	/// bit 7 still inverted after `poll_limit` reads
	TimedOut,
	/// data polling finished, but the byte read back differs
	VerifyMismatch {
		read_back: u8,
	},
}

impl WriteOutcome {
	pub fn into_result(self, address: usize, data: u8) -> Result<(), ProgramError> {
		match self {
			WriteOutcome::Ok => Ok(()),
			WriteOutcome::TimedOut => Err(ProgramError::TimedOut { address, data }),
			WriteOutcome::VerifyMismatch { read_back } => Err(ProgramError::VerifyMismatch { address, data, read_back }),
		}
	}
}

pub struct Programmer<P: Port> {
	port: P,
	timing: Timing,
}

impl<P: Port> Programmer<P> {
	pub fn new(port: P, timing: Timing) -> Self {
		Programmer {
			port,
			timing,
		}
	}

	pub fn port(&self) -> &P {
		&self.port
	}

	pub fn port_mut(&mut self) -> &mut P {
		&mut self.port
	}

	pub fn timing(&self) -> &Timing {
		&self.timing
	}

	pub fn into_port(self) -> P {
		self.port
	}

	/// Reset data and control lines and deselect the device.
	pub fn initialize(&mut self) -> Result<(), ProgramError> {
		self.port.set_direction(Direction::Output);
		self.port.write_data(DATA_INIT);
		self.port.write_control(CONTROL_INIT);
		self.set_address(0, ChipSelect::Inactive)
	}

	/// Loopback test: status bit 7 must follow the strobe line while the
	/// loopback function is selected.
	pub fn is_ready(&mut self) -> bool {
		let mut control = self.port.control();
		control.set_function(Function::Loopback).set_strobe();
		self.port.control_write(control);

		let mut ready = false;
		if self.port.status().is_loopback() {
			control.clear_strobe();
			self.port.control_write(control);
			ready = !self.port.status().is_loopback();
		}

		self.port.write_control(CONTROL_INIT);
		ready
	}

	/// Initialize and verify the programmer is present.
	///
	/// The returned session parks the programmer when dropped.
	pub fn start_session(&mut self) -> crate::AResult<Session<P>> {
		self.initialize()?;
		ensure!(self.is_ready(), "programmer not detected (loopback test failed)");
		debug!("programmer ready");
		Ok(Session(self))
	}

	/// Select the loopback function, so neither latches nor the device see
	/// any strobe activity.
	pub fn park(&mut self) {
		self.port.select_function(Function::Loopback);
	}

	/// Latch `address` and chip select; afterwards the data lines still hold
	/// the high address byte and the high latch function is selected.
	pub fn set_address(&mut self, address: usize, chip_select: ChipSelect) -> Result<(), ProgramError> {
		if address >= DEVICE_SIZE {
			return Err(ProgramError::OutOfRange { address });
		}

		self.port.write_data(address as u8);
		self.port.select_function(Function::LowAddress);
		self.port.pulse_strobe();

		self.port.write_data(chip_select.apply((address >> 8) as u8));
		self.port.select_function(Function::HighAddress);
		self.port.pulse_strobe();

		Ok(())
	}

	/// Start a program cycle without waiting for it or verifying it.
	pub fn fast_write(&mut self, address: usize, data: u8) -> Result<(), ProgramError> {
		self.set_address(address, ChipSelect::Active)?;

		self.port.select_function(Function::WriteEnable);
		self.port.write_data(data);
		self.port.pulse_strobe();

		Ok(())
	}

	/// Program a byte, wait for completion through data polling and verify it.
	///
	/// Errors only for an invalid address; device failures are reported
	/// through the outcome.
	pub fn write_byte(&mut self, address: usize, data: u8) -> Result<WriteOutcome, ProgramError> {
		self.fast_write(address, data)?;
		self.port.delay(self.timing.write_cycle_start);
		self.set_address(address, ChipSelect::Inactive)?;

		for _ in 0..self.timing.poll_limit {
			let read_back = self.read_byte(address)?;
			if 0 != (read_back ^ data) & DATA_POLLING_BIT {
				continue;
			}
			if read_back != data {
				return Ok(WriteOutcome::VerifyMismatch { read_back });
			}
			return Ok(WriteOutcome::Ok);
		}

		Ok(WriteOutcome::TimedOut)
	}

	pub fn read_byte(&mut self, address: usize) -> Result<u8, ProgramError> {
		self.set_address(address, ChipSelect::Active)?;

		// release the data lines before the device starts driving them
		self.port.set_direction(Direction::Input);

		self.port.select_function(Function::OutputEnable);
		self.port.clear_strobe();
		self.port.delay(self.timing.output_enable_settle);
		let data = self.port.read_data();
		self.port.set_strobe();

		self.port.set_direction(Direction::Output);

		self.set_address(address, ChipSelect::Inactive)?;

		trace!("read 0x{:04x}: 0x{:02x}", address, data);
		Ok(data)
	}

	/// Write `BLANK` to every address, pausing after each batch so the
	/// device can finish its write cycles. Nothing is verified.
	pub fn erase(&mut self) -> Result<(), ProgramError> {
		let batch = self.timing.erase_batch;
		for address in 0..DEVICE_SIZE {
			self.fast_write(address, BLANK)?;

			if 0 != batch && 0 == (address + 1) % batch {
				self.port.delay(self.timing.erase_pause);
			}

			if 0 != address && 0 == address % ERASE_PROGRESS_INTERVAL {
				info!("erased {} bytes", address);
			}
		}

		self.set_address(0, ChipSelect::Inactive)
	}
}

pub struct Session<'a, P: Port + 'a>(&'a mut Programmer<P>);

impl<'a, P: Port> Drop for Session<'a, P> {
	fn drop(&mut self) {
		self.0.park();
	}
}

impl<'a, P: Port> Deref for Session<'a, P> {
	type Target = Programmer<P>;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl<'a, P: Port> DerefMut for Session<'a, P> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		&mut self.0
	}
}

#[cfg(test)]
mod test {
	use std::time::Duration;

	use super::*;
	use super::sim::SimProgrammer;

	fn programmer() -> Programmer<SimProgrammer> {
		let mut programmer = Programmer::new(SimProgrammer::new(), Timing::default());
		programmer.initialize().unwrap();
		programmer
	}

	#[test]
	fn set_address_latches() {
		let mut p = programmer();
		for &address in &[0x0000, 0x0001, 0x00ff, 0x0100, 0x1234, 0x7af0, DEVICE_SIZE - 1] {
			p.set_address(address, ChipSelect::Active).unwrap();
			assert_eq!(p.port().latched_address(), address);
			assert!(p.port().is_chip_selected());

			p.set_address(address, ChipSelect::Inactive).unwrap();
			assert_eq!(p.port().latched_address(), address);
			assert!(!p.port().is_chip_selected());
		}
	}

	#[test]
	fn set_address_leaves_high_latch_selected() {
		let mut p = programmer();
		p.set_address(0x1234, ChipSelect::Inactive).unwrap();
		assert_eq!(p.port_mut().read_data(), 0x92);
		assert_eq!(p.port().control().function(), Some(Function::HighAddress));
		assert!(p.port().control().is_strobe());
	}

	#[test]
	fn set_address_out_of_range() {
		let mut p = programmer();
		let writes = p.port().register_writes;
		for &address in &[DEVICE_SIZE, DEVICE_SIZE + 1, 0xffff, !0usize] {
			match p.set_address(address, ChipSelect::Active) {
				Err(ProgramError::OutOfRange { address: a }) => assert_eq!(a, address),
				r => panic!("expected OutOfRange for 0x{:x}, got {:?}", address, r),
			}
		}
		assert_eq!(p.port().register_writes, writes);
	}

	#[test]
	fn write_then_read() {
		let mut p = programmer();
		for &(address, data) in &[(0x0000, 0x00), (0x0001, 0xff), (0x4000, 0x80), (0x7fff, 0x7f), (0x1234, 0xa5)] {
			assert_eq!(p.write_byte(address, data).unwrap(), WriteOutcome::Ok);
			assert_eq!(p.read_byte(address).unwrap(), data);
		}
		assert!(!p.port().contention);
	}

	#[test]
	fn write_waits_for_data_polling() {
		let mut p = programmer();
		p.port_mut().busy_polls = 40;
		p.port_mut().output_reads = 0;
		assert_eq!(p.write_byte(0x0100, 0x55).unwrap(), WriteOutcome::Ok);
		// 40 reads with inverted bit 7, then the real data
		assert_eq!(p.port().output_reads, 41);
	}

	#[test]
	fn repeated_reads_are_stable() {
		let mut p = programmer();
		p.port_mut().memory[0x2222] = 0x3c;
		for _ in 0..5 {
			assert_eq!(p.read_byte(0x2222).unwrap(), 0x3c);
		}
	}

	#[test]
	fn read_byte_bus_discipline() {
		let mut p = programmer();
		p.read_byte(0x0042).unwrap();
		assert!(!p.port().contention);
		assert_eq!(p.port().direction(), Direction::Output);
		assert!(!p.port().is_chip_selected());
		assert_eq!(p.port().latched_address(), 0x0042);
		assert_eq!(p.port().delayed, Duration::from_micros(10));
	}

	#[test]
	fn write_times_out_after_poll_limit() {
		let mut p = programmer();
		p.port_mut().never_completes = true;
		p.port_mut().output_reads = 0;
		assert_eq!(p.write_byte(0x0010, 0x12).unwrap(), WriteOutcome::TimedOut);
		assert_eq!(p.port().output_reads, 100);

		let timing = Timing { poll_limit: 7, ..Timing::default() };
		let mut p = Programmer::new(SimProgrammer::new(), timing);
		p.initialize().unwrap();
		p.port_mut().never_completes = true;
		assert_eq!(p.write_byte(0x0010, 0x12).unwrap(), WriteOutcome::TimedOut);
		assert_eq!(p.port().output_reads, 7);
	}

	#[test]
	fn write_verify_mismatch() {
		let mut p = programmer();
		p.port_mut().stuck_low = 0x01;
		assert_eq!(p.write_byte(0x0200, 0xff).unwrap(), WriteOutcome::VerifyMismatch { read_back: 0xfe });
		assert_eq!(p.write_byte(0x0201, 0xfe).unwrap(), WriteOutcome::Ok);
	}

	#[test]
	fn write_out_of_range() {
		let mut p = programmer();
		assert!(p.write_byte(DEVICE_SIZE, 0x00).is_err());
		assert_eq!(p.port().program_cycles, 0);
		assert!(p.read_byte(DEVICE_SIZE).is_err());
	}

	#[test]
	fn outcome_into_result() {
		assert!(WriteOutcome::Ok.into_result(0, 0).is_ok());
		match WriteOutcome::TimedOut.into_result(0x10, 0x20) {
			Err(ProgramError::TimedOut { address: 0x10, data: 0x20 }) => (),
			r => panic!("unexpected {:?}", r),
		}
		match (WriteOutcome::VerifyMismatch { read_back: 0x21 }).into_result(0x10, 0x20) {
			Err(ProgramError::VerifyMismatch { address: 0x10, data: 0x20, read_back: 0x21 }) => (),
			r => panic!("unexpected {:?}", r),
		}
	}

	#[test]
	fn erase_blanks_device() {
		let mut p = programmer();
		for (address, cell) in p.port_mut().memory.iter_mut().enumerate() {
			*cell = address as u8;
		}
		p.erase().unwrap();

		assert_eq!(p.port().program_cycles, DEVICE_SIZE);
		assert_eq!(p.port().delayed, Duration::from_millis(20) * (DEVICE_SIZE / 64) as u32);
		assert!(!p.port().is_chip_selected());
		for address in 0..DEVICE_SIZE {
			assert_eq!(p.read_byte(address).unwrap(), BLANK, "address 0x{:04x} not blank", address);
		}
	}

	#[test]
	fn loopback_detects_programmer() {
		let mut p = programmer();
		assert!(p.is_ready());
		assert_eq!(p.port().control(), Control::init());

		let mut p = Programmer::new(SimProgrammer::disconnected(), Timing::default());
		p.initialize().unwrap();
		assert!(!p.is_ready());
	}

	#[test]
	fn session_parks_programmer() {
		let mut p = Programmer::new(SimProgrammer::new(), Timing::default());
		{
			let mut session = p.start_session().unwrap();
			session.write_byte(0x0000, 0x42).unwrap();
			assert_eq!(session.port().control().function(), Some(Function::HighAddress));
		}
		assert_eq!(p.port().control().function(), Some(Function::Loopback));
		assert_eq!(p.port().memory[0], 0x42);
	}

	#[test]
	fn session_requires_programmer() {
		let mut p = Programmer::new(SimProgrammer::disconnected(), Timing::default());
		assert!(p.start_session().is_err());
	}
}
