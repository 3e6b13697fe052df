#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod error;
pub mod image;
pub mod parport;
pub mod programmer;
pub mod srec;

pub use self::error::ProgramError;

/// Open and claim the parallel port, detect the programmer and run `f` on it.
///
/// The programmer is parked (loopback function selected) and the port
/// released again when `f` returns, whether it failed or not.
pub fn with_programmer<F, R>(id: parport::PortId, timing: programmer::Timing, f: F) -> AResult<R>
where
	F: FnOnce(&mut programmer::Programmer<parport::PpDev>) -> AResult<R>,
{
	let port = with_context!(("couldn't open parallel port {}", id),
		Ok(parport::open_port(id).map_err(ProgramError::from)?)
	)?;
	let mut programmer = programmer::Programmer::new(port, timing);
	let mut session = programmer.start_session()?;
	f(&mut *session)
}
