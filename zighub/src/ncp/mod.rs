//typed asynchronous api over the zboss ncp serial protocol

pub mod processor;
pub mod driver;

pub use driver::Ncp;
pub use processor::{ NcpFuture, ZclReadFuture };

use frames::{ FrameRead, FrameWrite };
use zigbee::hl;

#[derive(Debug)]
pub enum Error {
	Frames(frames::Error),
	Ll(zigbee::ll::Error),
	Hl(zigbee::hl::Error),
	Zdo(zigbee::zdo::Error),
	Aps(zigbee::aps::Error),
	Zcl(zigbee::zcl::Error),
	///Non-zero HL response status.
	Status { call: String, category: u8, code: u8 },
	Timeout { call: String },
	///LL ACK never arrived despite retransmissions.
	AckTimeout { call: String },
	///NCP reset while the request was in flight.
	Reset,
	Closed,
	BadResponse { call: String, what: &'static str },
	ReconnectFailed { what: &'static str },
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Frames(e) => e.fmt(f),
			Self::Ll(e) => e.fmt(f),
			Self::Hl(e) => e.fmt(f),
			Self::Zdo(e) => e.fmt(f),
			Self::Aps(e) => e.fmt(f),
			Self::Zcl(e) => e.fmt(f),
			Self::Status { call, category, code } =>
				write!(f, "{}: {}", call, hl::status_name(*category, *code)),
			Self::Timeout { call } => write!(f, "{}: response timeout", call),
			Self::AckTimeout { call } => write!(f, "{}: ll ack timeout after retries", call),
			Self::Reset => write!(f, "ncp reset: request cancelled"),
			Self::Closed => write!(f, "ncp closed"),
			Self::BadResponse { call, what } => write!(f, "{}: bad response: {}", call, what),
			Self::ReconnectFailed { what } => write!(f, "ncp did not recover after {}", what),
		}
	}
}

impl std::error::Error for Error {}

impl Error {
	pub fn is_benign_scan_result(&self) -> bool {
		matches!(self, Self::Status { category, code, .. }
			if *category == hl::STATUS_CAT_MAC && *code == hl::STATUS_MAC_NO_BEACON)
	}
}

impl From<frames::Error> for Error {
	fn from(e: frames::Error) -> Self {
		Error::Frames(e)
	}
}

impl From<zigbee::ll::Error> for Error {
	fn from(e: zigbee::ll::Error) -> Self {
		Error::Ll(e)
	}
}

impl From<zigbee::hl::Error> for Error {
	fn from(e: zigbee::hl::Error) -> Self {
		Error::Hl(e)
	}
}

impl From<zigbee::zdo::Error> for Error {
	fn from(e: zigbee::zdo::Error) -> Self {
		Error::Zdo(e)
	}
}

impl From<zigbee::aps::Error> for Error {
	fn from(e: zigbee::aps::Error) -> Self {
		Error::Aps(e)
	}
}

impl From<zigbee::zcl::Error> for Error {
	fn from(e: zigbee::zcl::Error) -> Self {
		Error::Zcl(e)
	}
}

///Byte stream the driver runs over: a serial port in production, an
///in-memory scripted stream in tests.
pub trait FrameStream: FrameRead + FrameWrite + Send {}

impl<T: FrameRead + FrameWrite + Send> FrameStream for T {}

impl FrameRead for Box<dyn FrameStream> {
	fn read(&mut self, buf: &mut [u8]) -> Result<usize, frames::Error> {
		(**self).read(buf)
	}
}

impl FrameWrite for Box<dyn FrameStream> {
	fn write(&mut self, buf: &[u8]) -> Result<usize, frames::Error> {
		(**self).write(buf)
	}

	fn flush(&mut self) -> Result<(), frames::Error> {
		(**self).flush()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOption {
	NoOption = 0x00,
	EraseNvram = 0x01,
	Factory = 0x02,
}

impl ResetOption {
	pub fn name(&self) -> &'static str {
		match self {
			Self::NoOption => "reset",
			Self::EraseNvram => "nvram erase",
			Self::Factory => "factory reset",
		}
	}
}

///Firmware/stack versions cached at init; the generated network key lives
///here too and never leaves through serialized surfaces.
#[derive(Debug, Clone, Default)]
pub struct NcpInfo {
	pub fw_version: u32,
	pub stack_version: String,
	pub protocol_version: u32,
	pub network_key: Option<[u8; 16]>,
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
	pub channel: u8,
	pub pan_id: u16,
	pub ext_pan_id: [u8; 8],
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkInfo {
	pub channel: u8,
	pub pan_id: u16,
	pub ext_pan_id: [u8; 8],
}

#[derive(Debug, Clone, Copy)]
pub struct NetworkScanResult {
	pub ext_pan_id: [u8; 8],
	pub pan_id: u16,
	pub update_id: u8,
	pub channel: u8,
	pub stack_profile: u8,
	pub permit_join: bool,
	pub router_capacity: bool,
	pub end_device_capacity: bool,
	pub lqi: u8,
	pub rssi: i8,
}

#[derive(Debug, Clone)]
pub struct SimpleDescriptor {
	pub endpoint: u8,
	pub profile_id: u16,
	pub device_id: u16,
	pub in_clusters: Vec<u16>,
	pub out_clusters: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct BindRequest {
	pub target_short_addr: u16,
	pub src_ieee: [u8; 8],
	pub src_ep: u8,
	pub cluster_id: u16,
	pub dst_ieee: [u8; 8],
	pub dst_ep: u8,
}

#[derive(Debug, Clone)]
pub struct ReadAttributesRequest {
	pub dst_addr: u16,
	pub dst_ep: u8,
	pub cluster_id: u16,
	pub attr_ids: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct WriteAttributesRequest {
	pub dst_addr: u16,
	pub dst_ep: u8,
	pub cluster_id: u16,
	pub records: Vec<zigbee::zcl::WriteRecord>,
}

#[derive(Debug, Clone)]
pub struct ClusterCommandRequest {
	pub dst_addr: u16,
	pub dst_ep: u8,
	pub cluster_id: u16,
	pub command_id: u8,
	pub payload: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct ConfigureReportingRequest {
	pub dst_addr: u16,
	pub dst_ep: u8,
	pub cluster_id: u16,
	pub attr_id: u16,
	pub data_type: u8,
	pub min_interval: u16,
	pub max_interval: u16,
	pub report_change: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceJoinedEvent {
	pub short_addr: u16,
	pub ieee: [u8; 8],
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceLeftEvent {
	pub short_addr: u16,
	pub ieee: [u8; 8],
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceAnnounceEvent {
	pub short_addr: u16,
	pub ieee: [u8; 8],
	pub capability: u8,
}

#[derive(Debug, Clone)]
pub struct AttributeReportEvent {
	pub src_addr: u16,
	pub src_ep: u8,
	pub cluster_id: u16,
	pub attr_id: u16,
	pub data_type: u8,
	pub value: Vec<u8>,
	pub lqi: u8,
	pub rssi: i8,
}

#[derive(Debug, Clone)]
pub struct ClusterCommandEvent {
	pub src_addr: u16,
	pub src_ep: u8,
	pub cluster_id: u16,
	pub command_id: u8,
	pub payload: Vec<u8>,
	pub lqi: u8,
	pub rssi: i8,
}

///Indication callbacks, dispatched synchronously from the protocol loop in
///arrival order. All methods default to no-ops so implementors pick what
///they care about.
pub trait NcpHandler: Send + Sync {
	fn on_device_joined(&self, _evt: DeviceJoinedEvent) {}
	fn on_device_left(&self, _evt: DeviceLeftEvent) {}
	fn on_device_announce(&self, _evt: DeviceAnnounceEvent) {}
	fn on_attribute_report(&self, _evt: AttributeReportEvent) {}
	fn on_cluster_command(&self, _evt: ClusterCommandEvent) {}
	fn on_nwk_addr_update(&self, _short_addr: u16) {}
	fn on_ncp_reset(&self) {}
}
