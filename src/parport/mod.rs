/// Raw register access to an IEEE-1284 parallel port.
///
/// The programmer only needs the three registers of a standard PC parallel
/// port and the direction switch for the (bidirectional) data lines:
/// - data: 8 bits, shared between address latches and the EEPROM data bus
/// - control: strobe + 3 function select bits
/// - status: bit 7 is used for the loopback presence test

use std::thread;
use std::time::{
	Duration,
	Instant,
};

mod id;
mod linux;
mod list;

pub use self::id::PortId;

pub use self::list::{
	PortInfo,
	list_all_ports,
};

// OS-specific. for now linux only.
pub use self::linux::{
	PpDev,
	open_port,
};

pub fn reliable_sleep(mut duration: Duration) {
	loop {
		let now = Instant::now();
		thread::sleep(duration);
		let elapsed = now.elapsed();
		if elapsed >= duration {
			return;
		}
		duration -= elapsed;
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Input,
	Output,
}

pub trait Port {
	fn read_data(&mut self) -> u8;
	fn write_data(&mut self, data: u8);
	fn read_control(&mut self) -> u8;
	fn write_control(&mut self, control: u8);
	fn read_status(&mut self) -> u8;
	fn set_direction(&mut self, direction: Direction);

	// block for (at least) `duration`
	fn delay(&mut self, duration: Duration) {
		reliable_sleep(duration);
	}
}

impl<'a, P: ?Sized + Port> Port for &'a mut P {
	fn read_data(&mut self) -> u8 {
		P::read_data(*self)
	}
	fn write_data(&mut self, data: u8) {
		P::write_data(*self, data)
	}
	fn read_control(&mut self) -> u8 {
		P::read_control(*self)
	}
	fn write_control(&mut self, control: u8) {
		P::write_control(*self, control)
	}
	fn read_status(&mut self) -> u8 {
		P::read_status(*self)
	}
	fn set_direction(&mut self, direction: Direction) {
		P::set_direction(*self, direction)
	}
	fn delay(&mut self, duration: Duration) {
		P::delay(*self, duration)
	}
}
