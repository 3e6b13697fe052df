use crate::parport::Port;

use super::control::{
	Control,
	Function,
	Status,
};

/// Control line helpers; every change is a read-modify-write of the control
/// register, so bits not owned by the helper are left alone.
pub(super) trait PortBusExt: Port {
	fn control(&mut self) -> Control {
		Control(self.read_control())
	}

	fn status(&mut self) -> Status {
		Status(self.read_status())
	}

	fn control_write(&mut self, control: Control) {
		trace!("control write: {:?}", control);
		self.write_control(control.0);
	}

	fn select_function(&mut self, function: Function) {
		let mut control = self.control();
		control.set_function(function);
		self.control_write(control);
	}

	fn set_strobe(&mut self) {
		let mut control = self.control();
		control.set_strobe();
		self.control_write(control);
	}

	fn clear_strobe(&mut self) {
		let mut control = self.control();
		control.clear_strobe();
		self.control_write(control);
	}

	// latches clock on the rising edge, the EEPROM takes data on rising /WE
	fn pulse_strobe(&mut self) {
		self.set_strobe();
		self.clear_strobe();
		self.set_strobe();
	}
}
impl<P: Port + ?Sized> PortBusExt for P {}
