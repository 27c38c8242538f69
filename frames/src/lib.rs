pub mod frames;
pub use frames::{ Frame, Error, FrameRead, FrameWrite, FrameBuffer };

#[cfg(feature="serialport")]
pub mod frames_serialport;
#[cfg(feature="serialport")]
pub use frames_serialport::open_port;
