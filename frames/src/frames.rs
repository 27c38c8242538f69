#[derive(Debug)]
pub enum Error {
	Other(String),
	#[cfg(feature="serialport")]
	SerialPort(serialport::Error),
	WouldBlock,
	BufferNotEmpty,
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Other(s) => write!(f, "{}", s),
			#[cfg(feature="serialport")]
			Self::SerialPort(s) => s.fmt(f),
			Self::WouldBlock => write!(f, "Would block"),
			Self::BufferNotEmpty => write!(f, "Buffer not empty"),
		}
	}
}

impl std::error::Error for Error {}

impl Error {
	pub fn need_reset(&self) -> bool {
		match self {
			#[cfg(feature="serialport")]
			Self::SerialPort(_) => true,
			_ => false
		}
	}
}

//traits for non-blocking byte streams (SerialPort, in-memory test streams)

pub trait FrameRead {
	//read can return Err(WouldBlock) when there is no data to read
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;
}

pub trait FrameWrite {
	//write can return Err(WouldBlock) when the outgoing buffer is full
	fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;
	fn flush(&mut self) -> Result<(), Error>;
}

///Incremental buffer for assembling or draining one frame across poll ticks.
#[derive(Default, Debug)]
pub struct FrameBuffer {
	pub buf: Vec<u8>,
	bytes_to_go: usize
}

impl FrameBuffer {
	pub fn is_empty(&self) -> bool {
		self.bytes_to_go == 0 && self.buf.is_empty()
	}

	pub fn clear(&mut self) {
		self.buf.clear();
		self.bytes_to_go = 0;
	}

	///Queue raw frame bytes for nonblocking_write.
	pub fn push_bytes(&mut self, bytes: Vec<u8>) -> Result<(), Error> {
		if !self.is_empty() {
			return Err(Error::BufferNotEmpty);
		}

		self.bytes_to_go = bytes.len();
		self.buf = bytes;

		Ok(())
	}

	///Write as much of the queued frame as the stream accepts.
	///Returns true once the whole frame has been written.
	pub fn nonblocking_write<W: FrameWrite>(&mut self, w: &mut W) -> Result<bool, Error> {
		if self.bytes_to_go == 0 {
			return Ok(true);
		}

		let done = self.buf.len() - self.bytes_to_go;

		match w.write(&self.buf[done..]) {
			Ok(n) => {
				self.bytes_to_go -= n;

				if self.bytes_to_go == 0 {
					self.buf.clear();

					return Ok(true);
				}
			},
			Err(Error::WouldBlock) => {},
			Err(e) => { return Err(e); }
		}

		Ok(false)
	}
}

///A wire frame that can report how many more bytes it needs before it can be
///decoded. get_buffer_len may also discard garbage prefix bytes from the
///buffer while hunting for a frame boundary.
pub trait Frame {
	type Params: Sync;

	fn get_buffer_len(buf: &mut Vec<u8>, params: &Self::Params) -> Result<usize, Error>;
	fn from_buf(buf: &[u8], params: &Self::Params) -> Result<Self, Error> where Self: Sized;
	fn as_bytes(&self, params: &Self::Params, buf: &mut Vec<u8>) -> Result<(), Error>;

	///Poll-driven frame read: returns Ok(None) until a whole frame is buffered.
	fn nonblocking_read_frame<R: FrameRead>(r: &mut R, buf: &mut FrameBuffer, params: &Self::Params) -> Result<Option<Self>, Error> where Self: Sized
	{
		if buf.bytes_to_go != 0 {
			let len = buf.buf.len();

			match r.read(&mut buf.buf[len - buf.bytes_to_go..]) {
				Ok(b) => {
					buf.bytes_to_go -= b;

					if buf.bytes_to_go != 0 {
						//partial read, wait for the rest
						return Ok(None);
					}
				},
				Err(Error::WouldBlock) => { return Ok(None); },
				Err(e) => { return Err(e); }
			}
		}

		//whatever was promised has arrived, ask the codec what comes next
		buf.bytes_to_go = Self::get_buffer_len(&mut buf.buf, params)?;

		if buf.bytes_to_go == 0 {
			if buf.buf.is_empty() {
				//codec dropped everything as garbage
				return Ok(None);
			}

			let fr = Self::from_buf(&buf.buf, params);

			buf.buf.clear();

			return match fr {
				Ok(f) => Ok(Some(f)),
				Err(e) => Err(e)
			}
		}
		else {
			let len = buf.buf.len();
			buf.buf.resize(len + buf.bytes_to_go, 0);
		}

		Ok(None)
	}
}
