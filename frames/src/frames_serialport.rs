use crate::frames::{ Error, FrameRead, FrameWrite };
use serialport::{ self, SerialPort, TTYPort };
use std::io::{ Read, Write };
use std::time::Duration;

impl From<serialport::Error> for Error {
	fn from(r: serialport::Error) -> Self {
		Error::SerialPort(r)
	}
}

///Open a CDC-ACM port 8-N-1 at the given baud with DTR/RTS asserted.
pub fn open_port(path: &str, baud: u32) -> Result<TTYPort, Error> {
	let mut port = serialport::new(path, baud).
		data_bits(serialport::DataBits::Eight).
		parity(serialport::Parity::None).
		stop_bits(serialport::StopBits::One).
		timeout(Duration::from_millis(100)).
		open_native()?;

	//NCP firmware ignores the host until both lines are up
	port.write_data_terminal_ready(true)?;
	port.write_request_to_send(true)?;

	Ok(port)
}

impl FrameRead for TTYPort {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
		if self.bytes_to_read()? == 0 {
			return Err(Error::WouldBlock)
		}

		match Read::read(self, buf) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(Error::WouldBlock),
			Err(e) => Err(Error::SerialPort(serialport::Error::from(e)))
		}
	}
}

impl FrameWrite for TTYPort {
	fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
		match Write::write(self, buf) {
			Ok(n) => Ok(n),
			Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Err(Error::WouldBlock),
			Err(e) => Err(Error::SerialPort(serialport::Error::from(e)))
		}
	}

	fn flush(&mut self) -> Result<(), Error> {
		match Write::flush(self) {
			Ok(()) => Ok(()),
			Err(e) => Err(Error::SerialPort(serialport::Error::from(e)))
		}
	}
}
