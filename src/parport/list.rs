use std::fmt;
use std::fs;
use std::io;

use super::PortId;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PortInfo {
	pub id: PortId,
	pub base_address: Option<u64>,
}

impl fmt::Display for PortInfo {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.base_address {
			Some(base) => write!(f, "{} at address 0x{:04x}", self.id, base),
			None => write!(f, "{} at unknown address", self.id),
		}
	}
}

// "base-addr" lists the base and the ECP base address (decimal), we only want the first
fn read_base_address(id: PortId) -> Option<u64> {
	let value = fs::read_to_string(id.proc_file("base-addr")).ok()?;
	value.split_whitespace().next()?.parse::<u64>().ok()
}

pub fn list_all_ports() -> io::Result<Vec<PortInfo>> {
	let mut list = Vec::new();
	for entry in fs::read_dir("/dev")? {
		let entry = entry?;
		let fname = match entry.file_name().into_string() {
			Ok(fname) => fname,
			Err(_) => continue, // Non-UTF8 names can't be parallel ports
		};
		if !fname.starts_with("parport") {
			continue;
		}
		let id = fname.parse::<PortId>().map_err(|e| {
			io::Error::new(io::ErrorKind::Other, format!("Invalid parallel port device name: {}", e))
		})?;
		list.push(PortInfo {
			id,
			base_address: read_base_address(id),
		});
	}
	list.sort();

	Ok(list)
}
