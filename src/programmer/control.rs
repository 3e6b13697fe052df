use std::fmt;

// control register layout:
//   b0: strobe (function line active while cleared)
//   b1..b3: F0..F2, selects the function on the programmer's 3-to-8 decoder
//   b4..b7: not connected
const CONTROL_STROBE:        u8 = 0x01;
const CONTROL_FUNCTION_MASK: u8 = 0x0e;

/// control value after reset: strobe inactive, loopback function selected
pub const CONTROL_INIT: u8 = 0x0f;

/// data value after reset
pub const DATA_INIT: u8 = 0xff;

// status bit wired to the loopback function output
const STATUS_LOOPBACK: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Function {
	/// clock A0..A7 latch
	LowAddress,
	/// clock A8..A14 + /CS latch
	HighAddress,
	/// EEPROM /WE
	WriteEnable,
	/// EEPROM /OE
	OutputEnable,
	/// presence test, sensed on status bit 7
	Loopback,
}

impl Function {
	fn bits(self) -> u8 {
		match self {
			Function::LowAddress => 0x00,
			Function::HighAddress => 0x02,
			Function::WriteEnable => 0x04,
			Function::OutputEnable => 0x06,
			Function::Loopback => 0x0e,
		}
	}

	fn from_bits(v: u8) -> Option<Self> {
		match v & CONTROL_FUNCTION_MASK {
			0x00 => Some(Function::LowAddress),
			0x02 => Some(Function::HighAddress),
			0x04 => Some(Function::WriteEnable),
			0x06 => Some(Function::OutputEnable),
			0x0e => Some(Function::Loopback),
			_ => None, // decoder outputs not wired
		}
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Control(pub u8);

impl Control {
	pub fn init() -> Self {
		Control(CONTROL_INIT)
	}

	pub fn function(&self) -> Option<Function> {
		Function::from_bits(self.0)
	}

	pub fn set_function(&mut self, function: Function) -> &mut Self {
		self.0 = (self.0 & !CONTROL_FUNCTION_MASK) | function.bits();
		self
	}

	pub fn is_strobe(&self) -> bool {
		0 != self.0 & CONTROL_STROBE
	}
	pub fn set_strobe(&mut self) -> &mut Self {
		self.0 = self.0 | CONTROL_STROBE;
		self
	}
	pub fn clear_strobe(&mut self) -> &mut Self {
		self.0 = self.0 & !CONTROL_STROBE;
		self
	}

	/// whether the selected function line is driven (active low)
	pub fn is_active(&self) -> bool {
		!self.is_strobe()
	}
}

impl fmt::Display for Control {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl fmt::Debug for Control {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x} (function: {:?}", self.0, self.function())?;
		if self.is_strobe() { write!(f, " [STROBE]")?; }
		write!(f, ")")
	}
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Status(pub u8);

impl Status {
	pub fn is_loopback(&self) -> bool {
		0 != self.0 & STATUS_LOOPBACK
	}
}
