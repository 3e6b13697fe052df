#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate parport_eeprom_flash;
use parport_eeprom_flash::*;

use std::path::PathBuf;
use std::process::exit;

use parport_eeprom_flash::image::{
	AddressRange,
	ChecksumPolicy,
	Format,
};
use parport_eeprom_flash::parport::PortId;
use parport_eeprom_flash::programmer::{
	DEVICE_SIZE,
	Timing,
};

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<Option<T>>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => return Ok(None),
	};
	param.parse::<T>().map(Some).map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn parse_address(s: &str) -> AResult<usize> {
	let digits = if s.starts_with("0x") || s.starts_with("0X") {
		&s[2..]
	} else {
		s
	};
	ensure!(!digits.is_empty() && digits.bytes().all(|b| b.is_ascii_hexdigit()), "invalid hex address {:?}", s);
	Ok(usize::from_str_radix(digits, 16)?)
}

fn get_address(matches: &clap::ArgMatches, name: &str, default: usize) -> AResult<usize> {
	match matches.value_of(name) {
		Some(s) => parse_address(s).map_err(|e| {
			let msg = format!("invalid parameter {}: {}", name, e);
			e.context(msg).into()
		}),
		None => Ok(default),
	}
}

fn get_port(matches: &clap::ArgMatches) -> AResult<PortId> {
	Ok(get_param::<PortId>(matches, "port")?.unwrap_or(PortId(0)))
}

fn get_timing(matches: &clap::ArgMatches) -> AResult<Timing> {
	let mut timing = Timing::default();
	if let Some(polls) = get_param::<usize>(matches, "polls")? {
		ensure!(polls > 0, "invalid parameter polls: must be at least 1");
		timing.poll_limit = polls;
	}
	Ok(timing)
}

fn get_format(matches: &clap::ArgMatches) -> Format {
	if matches.is_present("srec") {
		Format::SRecord
	} else {
		Format::Binary
	}
}

fn get_file(matches: &clap::ArgMatches, format: Format) -> PathBuf {
	PathBuf::from(matches.value_of("FILE").unwrap_or_else(|| format.default_file()))
}

// S-records carry their own addresses
fn get_write_start(matches: &clap::ArgMatches, format: Format) -> AResult<usize> {
	match format {
		Format::Binary => {
			let start = get_address(matches, "start", 0)?;
			if start >= DEVICE_SIZE {
				return Err(ProgramError::OutOfRange { address: start }.into());
			}
			Ok(start)
		},
		Format::SRecord => {
			if matches.is_present("start") {
				warn!("--start is ignored for S-record files");
			}
			Ok(0)
		},
	}
}

fn list() -> AResult<()> {
	for port in parport::list_all_ports()? {
		println!("{}", port);
	}

	Ok(())
}

fn query(sub_m: &clap::ArgMatches) -> AResult<()> {
	let port = get_port(sub_m)?;

	let all = parport::list_all_ports()?;
	if all.is_empty() {
		warn!("no parallel ports found");
	}
	for info in &all {
		println!("{}", info);
	}

	with_programmer(port, Timing::default(), |_| Ok(()))?;
	println!("programmer detected on {}", port);

	Ok(())
}

fn read(sub_m: &clap::ArgMatches) -> AResult<()> {
	let port = get_port(sub_m)?;
	let format = get_format(sub_m);
	if format == Format::SRecord {
		bail!("reading into S-record files is not supported");
	}
	let path = get_file(sub_m, format);
	let start = get_address(sub_m, "start", 0)?;
	let end = get_address(sub_m, "end", DEVICE_SIZE - 1)?;
	let range = AddressRange::new(start, end)?;

	let total = with_programmer(port, get_timing(sub_m)?, |programmer| {
		image::read_to_file(programmer, range, &path, format)
	})?;
	info!("read {} bytes (0x{:04x}-0x{:04x}) into {:?}", total, range.start(), range.end(), path);

	Ok(())
}

fn write(sub_m: &clap::ArgMatches) -> AResult<()> {
	let port = get_port(sub_m)?;
	let format = get_format(sub_m);
	let path = get_file(sub_m, format);
	let start = get_write_start(sub_m, format)?;
	let checksums = if sub_m.is_present("strict") {
		ChecksumPolicy::Strict
	} else {
		ChecksumPolicy::Warn
	};
	if format == Format::Binary && sub_m.is_present("strict") {
		warn!("--strict only applies to S-record files");
	}

	let total = with_programmer(port, get_timing(sub_m)?, |programmer| {
		image::write_from_file(programmer, start, &path, format, checksums)
	})?;
	info!("programmed {} bytes from {:?}", total, path);

	Ok(())
}

fn erase(sub_m: &clap::ArgMatches) -> AResult<()> {
	let port = get_port(sub_m)?;

	with_programmer(port, get_timing(sub_m)?, |programmer| {
		Ok(programmer.erase()?)
	})?;
	info!("erased {} bytes", DEVICE_SIZE);

	Ok(())
}

fn app() -> clap::App<'static, 'static> {
	clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@subcommand list =>
			(about: "list parallel ports")
		)
		(@subcommand query =>
			(about: "list parallel ports and check for the programmer")
			(@arg port: -p --port +takes_value "parallel port to use (N or parportN, default 0)")
		)
		(@subcommand read =>
			(about: "read EEPROM into a binary file")
			(@arg port: -p --port +takes_value "parallel port to use (N or parportN, default 0)")
			(@arg binary: -b --binary "binary image file format (default)")
			(@arg srec: -t --srec conflicts_with[binary] "S-record file format (not supported for reading)")
			(@arg start: -s --start +takes_value "first address (hex, default 0)")
			(@arg end: -e --end +takes_value "last address (hex, default 7fff)")
			(@arg FILE: "image file (default: data.bin)")
		)
		(@subcommand write =>
			(about: "program EEPROM from a binary or S-record file")
			(@arg port: -p --port +takes_value "parallel port to use (N or parportN, default 0)")
			(@arg binary: -b --binary "binary image file format (default)")
			(@arg srec: -t --srec conflicts_with[binary] "S-record file format")
			(@arg start: -s --start +takes_value "address for binary images (hex, default 0)")
			(@arg polls: --polls +takes_value "maximum number of read-backs per written byte")
			(@arg strict: --strict "reject S-records with wrong checksums")
			(@arg FILE: "image file (default: data.bin or data.srec)")
		)
		(@subcommand erase =>
			(about: "erase EEPROM (fill with 0xff)")
			(@arg port: -p --port +takes_value "parallel port to use (N or parportN, default 0)")
		)
	)
}

fn main_app() -> AResult<()> {
	let matches = app().get_matches();

	match matches.subcommand() {
		("list", _) => {
			list()
		},
		("query", Some(sub_m)) => {
			query(sub_m)
		},
		("read", Some(sub_m)) => {
			read(sub_m)
		},
		("write", Some(sub_m)) => {
			write(sub_m)
		},
		("erase", Some(sub_m)) => {
			erase(sub_m)
		},
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn write_matches(args: &[&str]) -> clap::ArgMatches<'static> {
		let mut argv = vec!["parport-eeprom-flash", "write"];
		argv.extend_from_slice(args);
		let matches = app().get_matches_from_safe(argv).unwrap();
		matches.subcommand_matches("write").unwrap().clone()
	}

	#[test]
	fn write_start_address() {
		let m = write_matches(&["-s", "0x100"]);
		assert_eq!(get_write_start(&m, get_format(&m)).unwrap(), 0x100);

		let m = write_matches(&["--start", "8000"]);
		assert!(get_write_start(&m, get_format(&m)).is_err());

		let m = write_matches(&["-s", "zz"]);
		assert!(get_write_start(&m, get_format(&m)).is_err());
	}

	#[test]
	fn write_start_ignored_for_srecords() {
		let m = write_matches(&["-t", "-s", "8000"]);
		assert_eq!(get_format(&m), Format::SRecord);
		assert_eq!(get_write_start(&m, get_format(&m)).unwrap(), 0);
		assert_eq!(get_file(&m, get_format(&m)), PathBuf::from("data.srec"));
	}

	#[test]
	fn parse_hex_addresses() {
		assert_eq!(parse_address("7fff").unwrap(), 0x7fff);
		assert_eq!(parse_address("0X7AF0").unwrap(), 0x7af0);
		assert!(parse_address("0x").is_err());
		assert!(parse_address("+10").is_err());
	}
}
