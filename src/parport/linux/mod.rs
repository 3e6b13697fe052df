use std::io;

mod ppdev;

pub use self::ppdev::PpDev;

use super::PortId;

/// Open and claim `/dev/parportN`; dropping the handle releases the port again.
pub fn open_port(id: PortId) -> io::Result<PpDev> {
	ppdev::inner_open(id, id.device_path())
}
