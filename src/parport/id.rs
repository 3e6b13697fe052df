use std::fmt;
use std::str;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PortId(pub u32);

impl PortId {
	pub fn device_path(&self) -> String {
		format!("/dev/{}", self)
	}

	pub(super) fn proc_file(&self, name: &str) -> String {
		format!("/proc/sys/dev/parport/{}/{}", self, name)
	}
}

impl fmt::Display for PortId {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "parport{}", self.0)
	}
}

impl str::FromStr for PortId {
	type Err = ::failure::Error;

	// accepts "0" and "parport0"
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let num_s = if s.starts_with("parport") { &s[7..] } else { s };

		ensure!(!num_s.is_empty(), "Missing port number in parallel port id: {:?}", s);
		ensure!(num_s.bytes().all(|b| b.is_ascii_digit()), "Invalid parallel port id: {:?}", s);

		let num = with_context!(("invalid parallel port number: {}", num_s),
			Ok(num_s.parse::<u32>()?)
		)?;

		Ok(PortId(num))
	}
}
