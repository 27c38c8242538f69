//zigbee device object payloads as carried by the zboss ncp api

use deku::{ self, prelude::* };

#[derive(Debug)]
pub enum Error {
	Deku(deku::DekuError),
	BufferTooSmall(&'static str),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Deku(e) => e.fmt(f),
			Self::BufferTooSmall(s) => write!(f, "buffer too small: {}", s),
		}
	}
}

impl std::error::Error for Error {}

impl From<deku::DekuError> for Error {
	fn from(e: deku::DekuError) -> Self {
		Error::Deku(e)
	}
}

//zdo device update status values
pub const DEV_UPDATE_SECURE_REJOIN: u8 = 0x00;
pub const DEV_UPDATE_UNSECURE_JOIN: u8 = 0x01;
pub const DEV_UPDATE_LEFT: u8 = 0x02;
pub const DEV_UPDATE_TC_REJOIN: u8 = 0x03;

pub fn dev_update_status_name(status: u8) -> &'static str {
	match status {
		DEV_UPDATE_SECURE_REJOIN => "secure_rejoin",
		DEV_UPDATE_UNSECURE_JOIN => "unsecure_join",
		DEV_UPDATE_LEFT => "left",
		DEV_UPDATE_TC_REJOIN => "tc_rejoin",
		_ => "unknown",
	}
}

//apsde destination address modes
pub const ADDR_MODE_SHORT: u8 = 0x02;
pub const ADDR_MODE_IEEE: u8 = 0x03;

#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct ActiveEpReq {
	pub nwk_addr: u16,
}

///Response payload: ep_count(1) + ep_list + nwk_addr(2).
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct ActiveEpRsp {
	pub count: u8,
	#[deku(count = "count")]
	pub endpoints: Vec<u8>,
	pub nwk_addr: u16,
}

#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct SimpleDescReq {
	pub nwk_addr: u16,
	pub endpoint: u8,
}

#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct SimpleDescRsp {
	pub endpoint: u8,
	pub profile_id: u16,
	pub device_id: u16,
	pub device_version: u8,
	pub in_count: u8,
	pub out_count: u8,
	#[deku(count = "in_count")]
	pub in_clusters: Vec<u16>,
	#[deku(count = "out_count")]
	pub out_clusters: Vec<u16>,
	pub nwk_addr: u16,
}

///ZDO_BIND_REQ / ZDO_UNBIND_REQ with a long destination address.
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct BindReq {
	pub target_addr: u16,
	pub src_ieee: [u8; 8],
	pub src_ep: u8,
	pub cluster_id: u16,
	#[deku(assert_eq = "0x03")]
	pub dst_addr_mode: u8,
	pub dst_ieee: [u8; 8],
	pub dst_ep: u8,
}

impl BindReq {
	pub fn new(target_addr: u16, src_ieee: [u8; 8], src_ep: u8, cluster_id: u16, dst_ieee: [u8; 8], dst_ep: u8) -> Self {
		Self {
			target_addr,
			src_ieee,
			src_ep,
			cluster_id,
			dst_addr_mode: ADDR_MODE_IEEE,
			dst_ieee,
			dst_ep,
		}
	}
}

///ZDO_MGMT_LEAVE_REQ; flags 0 means leave permanently, no rejoin.
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct MgmtLeaveReq {
	pub nwk_addr: u16,
	pub ieee: [u8; 8],
	pub flags: u8,
}

///ZDO_PERMIT_JOINING_REQ, addressed to the coordinator itself.
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct PermitJoinReq {
	pub dest_addr: u16,
	pub duration: u8,
	pub tc_significance: u8,
}

///ZDO_DEV_ANNCE_IND payload: nwk(2) + ieee(8) + capability(1).
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct DevAnnceInd {
	pub nwk_addr: u16,
	pub ieee: [u8; 8],
	pub capability: u8,
}

///ZDO_DEV_UPDATE_IND payload: ieee(8) + nwk(2) + status(1).
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct DevUpdateInd {
	pub ieee: [u8; 8],
	pub nwk_addr: u16,
	pub status: u8,
}

impl BindReq {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl MgmtLeaveReq {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl PermitJoinReq {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl ActiveEpReq {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl SimpleDescReq {
	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl ActiveEpRsp {
	pub fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Self::from_bytes((data, 0))?.1)
	}

	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl SimpleDescRsp {
	pub fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Self::from_bytes((data, 0))?.1)
	}

	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl DevAnnceInd {
	pub fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Self::from_bytes((data, 0))?.1)
	}

	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

impl DevUpdateInd {
	pub fn parse(data: &[u8]) -> Result<Self, Error> {
		Ok(Self::from_bytes((data, 0))?.1)
	}

	pub fn encode(&self) -> Result<Vec<u8>, Error> {
		Ok(DekuContainerWrite::to_bytes(self)?)
	}
}

///NWK_LEAVE_IND payload: ieee(8) + rejoin(1); some firmware omits the
///rejoin byte.
#[derive(Debug, Clone)]
pub struct NwkLeaveInd {
	pub ieee: [u8; 8],
	pub rejoin: bool,
}

impl NwkLeaveInd {
	pub fn from_buf(data: &[u8]) -> Result<Self, Error> {
		if data.len() < 8 {
			return Err(Error::BufferTooSmall("nwk leave ind"));
		}
		let mut ieee = [0u8; 8];
		ieee.copy_from_slice(&data[0..8]);
		Ok(Self {
			ieee,
			rejoin: data.len() > 8 && data[8] != 0,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bind_req_wire_layout() {
		let req = BindReq::new(0x1234, [1, 2, 3, 4, 5, 6, 7, 8], 1, 0x0006, [9, 9, 9, 9, 9, 9, 9, 9], 1);
		let bytes = req.to_bytes().unwrap();

		assert_eq!(bytes.len(), 23);
		assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x1234);
		assert_eq!(&bytes[2..10], &[1, 2, 3, 4, 5, 6, 7, 8]);
		assert_eq!(bytes[10], 1);
		assert_eq!(u16::from_le_bytes([bytes[11], bytes[12]]), 0x0006);
		assert_eq!(bytes[13], ADDR_MODE_IEEE);
		assert_eq!(bytes[22], 1);
	}

	#[test]
	fn simple_desc_rsp_parses_cluster_lists() {
		let mut raw: Vec<u8> = vec![
			0x01,	//endpoint
			0x04, 0x01,	//profile HA
			0x02, 0x04,	//device id
			0x00,	//device version
			0x02,	//in count
			0x01,	//out count
		];
		raw.extend_from_slice(&0x0000u16.to_le_bytes());
		raw.extend_from_slice(&0x0006u16.to_le_bytes());
		raw.extend_from_slice(&0x0019u16.to_le_bytes());
		raw.extend_from_slice(&0x1234u16.to_le_bytes());

		let (_, rsp) = SimpleDescRsp::from_bytes((&raw, 0)).unwrap();
		assert_eq!(rsp.endpoint, 1);
		assert_eq!(rsp.profile_id, 0x0104);
		assert_eq!(rsp.in_clusters, vec![0x0000, 0x0006]);
		assert_eq!(rsp.out_clusters, vec![0x0019]);
		assert_eq!(rsp.nwk_addr, 0x1234);
	}

	#[test]
	fn active_ep_rsp_round_trip() {
		let rsp = ActiveEpRsp { count: 2, endpoints: vec![1, 242], nwk_addr: 0xAABB };
		let bytes = rsp.to_bytes().unwrap();
		let (_, back) = ActiveEpRsp::from_bytes((&bytes, 0)).unwrap();
		assert_eq!(back.endpoints, vec![1, 242]);
		assert_eq!(back.nwk_addr, 0xAABB);
	}

	#[test]
	fn dev_update_ind_parses() {
		let mut raw = vec![0x4C, 0x3B, 0x2A, 0x01, 0x00, 0x8D, 0x15, 0x00];
		raw.extend_from_slice(&0x1234u16.to_le_bytes());
		raw.push(DEV_UPDATE_SECURE_REJOIN);

		let (_, ind) = DevUpdateInd::from_bytes((&raw, 0)).unwrap();
		assert_eq!(ind.nwk_addr, 0x1234);
		assert_eq!(ind.status, DEV_UPDATE_SECURE_REJOIN);
		assert_eq!(dev_update_status_name(ind.status), "secure_rejoin");
	}

	#[test]
	fn nwk_leave_ind_tolerates_missing_rejoin() {
		let ind = NwkLeaveInd::from_buf(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
		assert!(!ind.rejoin);

		let ind = NwkLeaveInd::from_buf(&[1, 2, 3, 4, 5, 6, 7, 8, 1]).unwrap();
		assert!(ind.rejoin);

		assert!(NwkLeaveInd::from_buf(&[1, 2, 3]).is_err());
	}
}
