//apsde data request/indication as framed by the zboss ncp api

use deku::{ self, prelude::* };
use crate::zcl;

#[derive(Debug)]
pub enum Error {
	Deku(deku::DekuError),
	Empty,
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Deku(e) => e.fmt(f),
			Self::Empty => write!(f, "apsde frame carries no data"),
		}
	}
}

impl std::error::Error for Error {}

impl From<deku::DekuError> for Error {
	fn from(e: deku::DekuError) -> Self {
		Error::Deku(e)
	}
}

//tx option bit 2: request aps ack
const TX_OPTION_ACK: u8 = 0x04;
const PARAM_LEN: u8 = 21;

///APSDE_DATA_REQ payload. The destination address field is an 8-byte union;
///short addressing uses the first two bytes and zero padding.
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct DataReq {
	pub param_len: u8,
	pub data_len: u16,
	#[deku(pad_bytes_after = "6")]
	pub dst_short: u16,
	pub profile_id: u16,
	pub cluster_id: u16,
	pub dst_endpoint: u8,
	pub src_endpoint: u8,
	pub radius: u8,
	pub dst_addr_mode: u8,
	pub tx_options: u8,
	pub use_alias: u8,
	pub alias_src_addr: u16,
	pub alias_seq: u8,
	#[deku(count = "data_len")]
	pub data: Vec<u8>,
}

///Build an APSDE_DATA_REQ for a unicast to a short address.
pub fn build_data_req(dst_short: u16, dst_endpoint: u8, src_endpoint: u8, cluster_id: u16, profile_id: u16, radius: u8, data: &[u8]) -> Vec<u8> {
	let req = DataReq {
		param_len: PARAM_LEN,
		data_len: data.len() as u16,
		dst_short,
		profile_id,
		cluster_id,
		dst_endpoint,
		src_endpoint,
		radius,
		dst_addr_mode: crate::zdo::ADDR_MODE_SHORT,
		tx_options: TX_OPTION_ACK,
		use_alias: 0,
		alias_src_addr: 0,
		alias_seq: 0,
		data: data.to_vec(),
	};
	//fixed-shape struct, serialization cannot fail
	req.to_bytes().expect("apsde data req encode")
}

///APSDE_DATA_IND fixed header (24 bytes) followed by the APS payload.
#[derive(Debug, DekuRead, DekuWrite, Clone)]
#[deku(endian = "little")]
pub struct DataInd {
	pub param_len: u8,
	pub data_len: u16,
	pub aps_fc: u8,
	pub src_nwk_addr: u16,
	pub dst_nwk_addr: u16,
	pub group_addr: u16,
	pub dst_endpoint: u8,
	pub src_endpoint: u8,
	pub cluster_id: u16,
	pub profile_id: u16,
	pub aps_counter: u8,
	pub src_mac_addr: u16,
	pub dst_mac_addr: u16,
	pub lqi: u8,
	pub rssi: i8,
	pub aps_key_attr: u8,
	#[deku(count = "data_len")]
	pub data: Vec<u8>,
}

impl DataInd {
	pub fn from_buf(data: &[u8]) -> Result<Self, Error> {
		let (_, ind) = Self::from_bytes((data, 0))?;
		if ind.data.is_empty() {
			return Err(Error::Empty);
		}
		Ok(ind)
	}
}

///Build a synthetic APSDE_DATA_IND payload; used by tests and mock NCPs.
pub fn build_data_ind(src_nwk_addr: u16, src_endpoint: u8, cluster_id: u16, lqi: u8, rssi: i8, data: &[u8]) -> Vec<u8> {
	let ind = DataInd {
		param_len: PARAM_LEN,
		data_len: data.len() as u16,
		aps_fc: 0,
		src_nwk_addr,
		dst_nwk_addr: 0,
		group_addr: 0,
		dst_endpoint: 1,
		src_endpoint,
		cluster_id,
		profile_id: zcl::PROFILE_HA,
		aps_counter: 0,
		src_mac_addr: 0,
		dst_mac_addr: 0,
		lqi,
		rssi,
		aps_key_attr: 0,
		data: data.to_vec(),
	};
	ind.to_bytes().expect("apsde data ind encode")
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn data_req_wire_layout() {
		let zcl_data = [0x10, 0x01, 0x00, 0x00, 0x00];
		let buf = build_data_req(0x1234, 1, 1, 0x0006, zcl::PROFILE_HA, 30, &zcl_data);

		assert_eq!(buf.len(), 24 + zcl_data.len());
		assert_eq!(buf[0], PARAM_LEN);
		assert_eq!(u16::from_le_bytes([buf[1], buf[2]]), zcl_data.len() as u16);
		assert_eq!(u16::from_le_bytes([buf[3], buf[4]]), 0x1234);
		//address union padding
		assert_eq!(&buf[5..11], &[0, 0, 0, 0, 0, 0]);
		assert_eq!(u16::from_le_bytes([buf[11], buf[12]]), zcl::PROFILE_HA);
		assert_eq!(u16::from_le_bytes([buf[13], buf[14]]), 0x0006);
		assert_eq!(buf[15], 1);
		assert_eq!(buf[16], 1);
		assert_eq!(buf[17], 30);
		assert_eq!(buf[18], crate::zdo::ADDR_MODE_SHORT);
		assert_eq!(buf[19], TX_OPTION_ACK);
		assert_eq!(&buf[24..], &zcl_data);
	}

	#[test]
	fn data_ind_round_trip() {
		let raw = build_data_ind(0x5678, 3, 0x0402, 180, -60, &[0xAA, 0xBB]);
		let ind = DataInd::from_buf(&raw).unwrap();

		assert_eq!(ind.src_nwk_addr, 0x5678);
		assert_eq!(ind.src_endpoint, 3);
		assert_eq!(ind.cluster_id, 0x0402);
		assert_eq!(ind.lqi, 180);
		assert_eq!(ind.rssi, -60);
		assert_eq!(ind.data, vec![0xAA, 0xBB]);
	}

	#[test]
	fn empty_data_ind_rejected() {
		let raw = build_data_ind(0x0001, 1, 0x0000, 0, 0, &[]);
		assert!(matches!(DataInd::from_buf(&raw), Err(Error::Empty)));
	}
}
