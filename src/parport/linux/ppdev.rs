use std::fs;
use std::io;
use std::os::unix::io::AsRawFd;

use libc::{
	c_int,
	c_uchar,
	c_ulong,
	ioctl,
};

use crate::parport::{
	Direction,
	Port,
	PortId,
};

// request numbers from <linux/ppdev.h>, generic _IOC layout
const PPRSTATUS:  c_ulong = 0x8001_7081; // _IOR('p', 0x81, unsigned char)
const PPRCONTROL: c_ulong = 0x8001_7083; // _IOR('p', 0x83, unsigned char)
const PPWCONTROL: c_ulong = 0x4001_7084; // _IOW('p', 0x84, unsigned char)
const PPRDATA:    c_ulong = 0x8001_7085; // _IOR('p', 0x85, unsigned char)
const PPWDATA:    c_ulong = 0x4001_7086; // _IOW('p', 0x86, unsigned char)
const PPCLAIM:    c_ulong = 0x0000_708b; // _IO('p', 0x8b)
const PPRELEASE:  c_ulong = 0x0000_708c; // _IO('p', 0x8c)
const PPDATADIR:  c_ulong = 0x4004_7090; // _IOW('p', 0x90, int)

// The PC port hardware inverts nStrobe, nAutoFd and nSelectIn (control bits
// 0, 1 and 3) and BUSY (status bit 7). ppdev hands out the raw registers,
// `Port` works with line levels.
const CONTROL_INVERTED: u8 = 0x0b;
const STATUS_INVERTED: u8 = 0x80;

fn control_to_register(control: u8) -> u8 {
	control ^ CONTROL_INVERTED
}

fn control_from_register(register: u8) -> u8 {
	register ^ CONTROL_INVERTED
}

fn status_from_register(register: u8) -> u8 {
	register ^ STATUS_INVERTED
}

#[derive(Debug)]
pub struct PpDev {
	file: fs::File,
	id: PortId,
}

impl Drop for PpDev {
	fn drop(&mut self) {
		let res = unsafe { ioctl(self.file.as_raw_fd(), PPRELEASE as _) };
		if -1 == res {
			error!("{}: Failed to release port: {}", self.id, io::Error::last_os_error());
		} else {
			debug!("{}: released", self.id);
		}
		// closing the file is left to fs::File
	}
}

impl PpDev {
	pub fn id(&self) -> PortId {
		self.id
	}

	// register ioctls only fail on a port we haven't claimed
	fn ioctl_read(&self, request: c_ulong, name: &str) -> u8 {
		let mut value: c_uchar = 0;
		let res = unsafe { ioctl(self.file.as_raw_fd(), request as _, &mut value as *mut c_uchar) };
		if -1 == res {
			panic!("{}: {} failed: {}", self.id, name, io::Error::last_os_error());
		}
		value
	}

	fn ioctl_write(&self, request: c_ulong, name: &str, value: u8) {
		let value: c_uchar = value;
		let res = unsafe { ioctl(self.file.as_raw_fd(), request as _, &value as *const c_uchar) };
		if -1 == res {
			panic!("{}: {} failed: {}", self.id, name, io::Error::last_os_error());
		}
	}
}

impl Port for PpDev {
	fn read_data(&mut self) -> u8 {
		self.ioctl_read(PPRDATA, "PPRDATA")
	}

	fn write_data(&mut self, data: u8) {
		self.ioctl_write(PPWDATA, "PPWDATA", data)
	}

	fn read_control(&mut self) -> u8 {
		control_from_register(self.ioctl_read(PPRCONTROL, "PPRCONTROL"))
	}

	fn write_control(&mut self, control: u8) {
		self.ioctl_write(PPWCONTROL, "PPWCONTROL", control_to_register(control))
	}

	fn read_status(&mut self) -> u8 {
		status_from_register(self.ioctl_read(PPRSTATUS, "PPRSTATUS"))
	}

	fn set_direction(&mut self, direction: Direction) {
		// non-zero: reverse (input) mode, line drivers disabled
		let mode: c_int = match direction {
			Direction::Input => 1,
			Direction::Output => 0,
		};
		let res = unsafe { ioctl(self.file.as_raw_fd(), PPDATADIR as _, &mode as *const c_int) };
		if -1 == res {
			panic!("{}: PPDATADIR failed: {}", self.id, io::Error::last_os_error());
		}
	}
}

// TODO: exclusive open (PPEXCL) once we know nothing else needs to share the port
pub fn inner_open(id: PortId, path: String) -> io::Result<PpDev> {
	let file = fs::OpenOptions::new()
		.read(true)
		.write(true)
		.open(path)?;

	let res = unsafe { ioctl(file.as_raw_fd(), PPCLAIM as _) };
	if -1 == res {
		return Err(io::Error::last_os_error());
	}
	debug!("{}: claimed", id);

	Ok(PpDev {
		file,
		id,
	})
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn control_line_levels() {
		// idle: strobe high, loopback selected (F0..F2 high)
		assert_eq!(control_to_register(0x0f), 0x04);
		// loopback with strobe low
		assert_eq!(control_to_register(0x0e), 0x05);
		// low address latch, strobe high: nAutoFd/nSelectIn low means register bits set
		assert_eq!(control_to_register(0x01), 0x0a);
		for value in 0..=0xffu8 {
			assert_eq!(control_from_register(control_to_register(value)), value);
		}
		// bit 2 (nInit) isn't inverted
		assert_eq!(control_to_register(0x04) & 0x04, 0x04);
	}

	#[test]
	fn status_line_levels() {
		// BUSY line high reads as 0 in the register
		assert_eq!(status_from_register(0x00), 0x80);
		assert_eq!(status_from_register(0x80), 0x00);
		assert_eq!(status_from_register(0x78), 0xf8);
	}
}
