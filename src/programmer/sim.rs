/// Register level model of the programmer board with an EEPROM plugged in.
///
/// Models both address latches, the function decoder, the loopback test
/// output and the EEPROM including data polling. Faults can be injected
/// through the public fields.

use std::time::Duration;

use crate::parport::{
	Direction,
	Port,
};

use super::DEVICE_SIZE;
use super::control::{
	Control,
	Function,
};

// any delay at least this long completes a pending internal write cycle
const WRITE_CYCLE: Duration = Duration::from_millis(10);

const DATA_POLLING: u8 = 0x80;

#[derive(Clone, Copy, Debug)]
struct PendingWrite {
	data: u8,
	remaining_polls: usize,
}

pub struct SimProgrammer {
	pub memory: Vec<u8>,
	pub connected: bool,

	// reads returning inverted bit 7 after each program cycle
	pub busy_polls: usize,
	pub never_completes: bool,
	// bits that can't be programmed to 1
	pub stuck_low: u8,

	pub register_writes: usize,
	pub output_reads: usize,
	pub program_cycles: usize,
	pub contention: bool,
	pub delayed: Duration,

	data: u8,
	control: Control,
	direction: Direction,
	low_latch: u8,
	high_latch: u8,
	pending: Option<PendingWrite>,
}

impl SimProgrammer {
	pub fn new() -> Self {
		SimProgrammer {
			memory: vec![0x00; DEVICE_SIZE],
			connected: true,
			busy_polls: 3,
			never_completes: false,
			stuck_low: 0,
			register_writes: 0,
			output_reads: 0,
			program_cycles: 0,
			contention: false,
			delayed: Duration::from_millis(0),
			data: 0,
			control: Control::init(),
			direction: Direction::Output,
			low_latch: 0x00,
			high_latch: 0x80,
			pending: None,
		}
	}

	pub fn disconnected() -> Self {
		SimProgrammer {
			connected: false,
			..Self::new()
		}
	}

	pub fn latched_address(&self) -> usize {
		(((self.high_latch & 0x7f) as usize) << 8) | (self.low_latch as usize)
	}

	pub fn is_chip_selected(&self) -> bool {
		self.connected && 0 == self.high_latch & 0x80
	}

	pub fn control(&self) -> Control {
		self.control
	}

	pub fn direction(&self) -> Direction {
		self.direction
	}

	fn output_enabled(&self) -> bool {
		self.is_chip_selected()
			&& self.control.function() == Some(Function::OutputEnable)
			&& self.control.is_active()
	}

	fn check_contention(&mut self) {
		if self.output_enabled() && self.direction == Direction::Output {
			self.contention = true;
		}
	}

	fn device_output(&mut self) -> u8 {
		if let Some(mut pending) = self.pending.take() {
			if !self.never_completes {
				pending.remaining_polls -= 1;
			}
			if self.never_completes || pending.remaining_polls > 0 {
				self.pending = Some(pending);
			}
			return pending.data ^ DATA_POLLING;
		}
		self.memory[self.latched_address()]
	}

	fn program(&mut self) {
		let address = self.latched_address();
		self.memory[address] = self.data & !self.stuck_low;
		self.program_cycles += 1;
		self.pending = if self.never_completes || self.busy_polls > 0 {
			Some(PendingWrite {
				data: self.data,
				remaining_polls: self.busy_polls,
			})
		} else {
			None
		};
	}
}

impl Port for SimProgrammer {
	fn read_data(&mut self) -> u8 {
		match self.direction {
			Direction::Output => self.data,
			Direction::Input => {
				if self.output_enabled() {
					self.output_reads += 1;
					self.device_output()
				} else {
					0xff // pulled up
				}
			},
		}
	}

	fn write_data(&mut self, data: u8) {
		self.register_writes += 1;
		self.data = data;
	}

	fn read_control(&mut self) -> u8 {
		self.control.0
	}

	fn write_control(&mut self, control: u8) {
		self.register_writes += 1;
		let previous = self.control;
		self.control = Control(control);

		// rising edge on the decoder output that was selected during the pulse
		if previous.is_active() && self.control.is_strobe() {
			match previous.function() {
				Some(Function::LowAddress) => self.low_latch = self.data,
				Some(Function::HighAddress) => self.high_latch = self.data,
				Some(Function::WriteEnable) => {
					if self.is_chip_selected() && self.direction == Direction::Output {
						self.program();
					}
				},
				_ => (),
			}
		}

		self.check_contention();
	}

	fn read_status(&mut self) -> u8 {
		if self.connected && self.control.function() == Some(Function::Loopback) && self.control.is_strobe() {
			0x80
		} else {
			0x00
		}
	}

	fn set_direction(&mut self, direction: Direction) {
		self.direction = direction;
		self.check_contention();
	}

	fn delay(&mut self, duration: Duration) {
		self.delayed += duration;
		if duration >= WRITE_CYCLE && !self.never_completes {
			self.pending = None;
		}
	}
}
