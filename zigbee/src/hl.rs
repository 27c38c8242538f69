//zboss ncp high-level layer: request/response/indication packets, call ids,
//status categories

#[derive(Debug)]
pub enum Error {
	TooShort { what: &'static str, have: usize },
	UnknownPacketType(u8),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::TooShort { what, have } => write!(f, "hl {} too short: {} bytes", what, have),
			Self::UnknownPacketType(t) => write!(f, "unknown hl packet type: {:#04x}", t),
		}
	}
}

impl std::error::Error for Error {}

pub const HL_VERSION: u8 = 0x00;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
	Request,
	Response,
	Indication,
}

impl PacketType {
	fn from_byte(b: u8) -> Result<Self, Error> {
		match b {
			0x00 => Ok(Self::Request),
			0x01 => Ok(Self::Response),
			0x02 => Ok(Self::Indication),
			t => Err(Error::UnknownPacketType(t)),
		}
	}
}

//call ids, from the wireshark zbncp dissector

//ncp management
pub const CMD_GET_MODULE_VERSION: u16 = 0x0001;
pub const CMD_NCP_RESET: u16 = 0x0002;
pub const CMD_SET_ZIGBEE_ROLE: u16 = 0x0005;
pub const CMD_SET_CHANNEL_MASK: u16 = 0x0007;
pub const CMD_GET_CHANNEL: u16 = 0x0008;
pub const CMD_GET_PAN_ID: u16 = 0x0009;
pub const CMD_SET_PAN_ID: u16 = 0x000A;
pub const CMD_GET_LOCAL_IEEE: u16 = 0x000B;
pub const CMD_SET_RX_ON_WHEN_IDLE: u16 = 0x0013;
pub const CMD_SET_ED_TIMEOUT: u16 = 0x0017;
pub const CMD_SET_NWK_KEY: u16 = 0x001B;
pub const CMD_GET_EXT_PAN_ID: u16 = 0x0023;
pub const CMD_NCP_RESET_IND: u16 = 0x002B;
pub const CMD_SET_TC_POLICY: u16 = 0x0032;
pub const CMD_SET_EXT_PAN_ID: u16 = 0x0033;
pub const CMD_SET_MAX_CHILDREN: u16 = 0x0034;

//af
pub const CMD_AF_SET_SIMPLE_DESC: u16 = 0x0101;

//zdo
pub const CMD_ZDO_SIMPLE_DESC_REQ: u16 = 0x0205;
pub const CMD_ZDO_ACTIVE_EP_REQ: u16 = 0x0206;
pub const CMD_ZDO_BIND_REQ: u16 = 0x0208;
pub const CMD_ZDO_UNBIND_REQ: u16 = 0x0209;
pub const CMD_ZDO_MGMT_LEAVE_REQ: u16 = 0x020A;
pub const CMD_ZDO_PERMIT_JOINING_REQ: u16 = 0x020B;
pub const CMD_ZDO_DEV_ANNCE_IND: u16 = 0x020C;
pub const CMD_ZDO_DEV_AUTHORIZED_IND: u16 = 0x0214;
pub const CMD_ZDO_DEV_UPDATE_IND: u16 = 0x0215;

//aps
pub const CMD_APSDE_DATA_REQ: u16 = 0x0301;
pub const CMD_APSDE_DATA_IND: u16 = 0x0306;

//nwk
pub const CMD_NWK_FORMATION: u16 = 0x0401;
pub const CMD_NWK_DISCOVERY: u16 = 0x0402;
pub const CMD_NWK_GET_IEEE_BY_SHORT: u16 = 0x0405;
pub const CMD_NWK_GET_SHORT_BY_IEEE: u16 = 0x0406;
pub const CMD_NWK_STARTED_IND: u16 = 0x0408;
pub const CMD_NWK_LEAVE_IND: u16 = 0x040B;
pub const CMD_NWK_ADDR_UPDATE_IND: u16 = 0x041C;
pub const CMD_NWK_START_WITHOUT_FORM: u16 = 0x041D;

//security indications, diagnostic only
pub const CMD_SECUR_TCLK_IND: u16 = 0x050E;
pub const CMD_SECUR_TCLK_EXCHANGE_FAIL_IND: u16 = 0x050F;

pub fn call_name(id: u16) -> String {
	let name = match id {
		CMD_GET_MODULE_VERSION => "GetModuleVersion",
		CMD_NCP_RESET => "NCPReset",
		CMD_SET_ZIGBEE_ROLE => "SetZigbeeRole",
		CMD_SET_CHANNEL_MASK => "SetChannelMask",
		CMD_GET_CHANNEL => "GetChannel",
		CMD_GET_PAN_ID => "GetPanID",
		CMD_SET_PAN_ID => "SetPanID",
		CMD_GET_LOCAL_IEEE => "GetLocalIEEE",
		CMD_SET_RX_ON_WHEN_IDLE => "SetRxOnWhenIdle",
		CMD_SET_ED_TIMEOUT => "SetEDTimeout",
		CMD_SET_NWK_KEY => "SetNwkKey",
		CMD_GET_EXT_PAN_ID => "GetExtPanID",
		CMD_NCP_RESET_IND => "NCPResetInd",
		CMD_SET_TC_POLICY => "SetTCPolicy",
		CMD_SET_EXT_PAN_ID => "SetExtPanID",
		CMD_SET_MAX_CHILDREN => "SetMaxChildren",
		CMD_AF_SET_SIMPLE_DESC => "AFSetSimpleDesc",
		CMD_ZDO_SIMPLE_DESC_REQ => "ZDO_SimpleDesc",
		CMD_ZDO_ACTIVE_EP_REQ => "ZDO_ActiveEP",
		CMD_ZDO_BIND_REQ => "ZDO_Bind",
		CMD_ZDO_UNBIND_REQ => "ZDO_Unbind",
		CMD_ZDO_MGMT_LEAVE_REQ => "ZDO_MgmtLeave",
		CMD_ZDO_PERMIT_JOINING_REQ => "ZDO_PermitJoin",
		CMD_ZDO_DEV_ANNCE_IND => "ZDO_DevAnnce",
		CMD_ZDO_DEV_AUTHORIZED_IND => "ZDO_DevAuthorized",
		CMD_ZDO_DEV_UPDATE_IND => "ZDO_DevUpdate",
		CMD_APSDE_DATA_REQ => "APSDE_DataReq",
		CMD_APSDE_DATA_IND => "APSDE_DataInd",
		CMD_NWK_FORMATION => "NwkFormation",
		CMD_NWK_DISCOVERY => "NwkDiscovery",
		CMD_NWK_GET_IEEE_BY_SHORT => "NwkGetIEEEByShort",
		CMD_NWK_GET_SHORT_BY_IEEE => "NwkGetShortByIEEE",
		CMD_NWK_STARTED_IND => "NwkStartedInd",
		CMD_NWK_LEAVE_IND => "NwkLeaveInd",
		CMD_NWK_ADDR_UPDATE_IND => "NwkAddrUpdateInd",
		CMD_NWK_START_WITHOUT_FORM => "NwkStartWithoutForm",
		CMD_SECUR_TCLK_IND => "SECUR_TCLK_IND",
		CMD_SECUR_TCLK_EXCHANGE_FAIL_IND => "SECUR_TCLK_EXCHANGE_FAILED_IND",
		_ => return format!("{:#06X}", id),
	};
	name.to_string()
}

//zigbee roles (ZC=0, ZR=1, ZED=2)
pub const ROLE_COORDINATOR: u8 = 0x00;

//trust center policy types for SET_TC_POLICY
pub const TC_POLICY_LINK_KEYS_REQUIRED: u16 = 0x0000;
pub const TC_POLICY_IC_REQUIRED: u16 = 0x0001;
pub const TC_POLICY_TC_REJOIN_ENABLED: u16 = 0x0002;
pub const TC_POLICY_IGNORE_TC_REJOIN: u16 = 0x0003;
pub const TC_POLICY_APS_INSECURE_JOIN: u16 = 0x0004;
pub const TC_POLICY_DISABLE_NWK_MGMT_CHAN_UPDATE: u16 = 0x0005;

//status categories
pub const STATUS_CAT_GENERIC: u8 = 0x00;
pub const STATUS_CAT_MAC: u8 = 0x02;
pub const STATUS_CAT_NWK: u8 = 0x03;
pub const STATUS_CAT_APS: u8 = 0x04;
pub const STATUS_CAT_ZDO: u8 = 0x05;
pub const STATUS_CAT_CBKE: u8 = 0x06;

//mac layer "no beacon": NwkDiscovery finished with zero networks
pub const STATUS_MAC_NO_BEACON: u8 = 0xEA;

pub fn status_name(cat: u8, code: u8) -> String {
	if cat == 0 && code == 0 {
		return "OK".to_string();
	}
	let cat_name = match cat {
		STATUS_CAT_MAC => "MAC",
		STATUS_CAT_NWK => "NWK",
		STATUS_CAT_APS => "APS",
		STATUS_CAT_ZDO => "ZDO",
		STATUS_CAT_CBKE => "CBKE",
		_ => "Generic",
	};
	format!("{}/{}({:#04X})", cat_name, code, code)
}

///A decoded HL packet. TSN is present for requests and responses, the status
///pair only for responses.
#[derive(Debug, Clone)]
pub struct HlPacket {
	pub packet_type: PacketType,
	pub call_id: u16,
	pub tsn: u8,
	pub status_cat: u8,
	pub status_code: u8,
	pub payload: Vec<u8>,
}

impl HlPacket {
	pub fn status_ok(&self) -> bool {
		self.status_cat == 0 && self.status_code == 0
	}
}

///Encode an HL request: version(1) + type(1) + call_id(2 LE) + tsn(1) + payload.
pub fn encode_request(call_id: u16, tsn: u8, payload: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(5 + payload.len());
	buf.push(HL_VERSION);
	buf.push(0x00);
	buf.extend_from_slice(&call_id.to_le_bytes());
	buf.push(tsn);
	buf.extend_from_slice(payload);
	buf
}

///Encode an HL response; only synthesized by tests and mock NCPs.
pub fn encode_response(call_id: u16, tsn: u8, status_cat: u8, status_code: u8, payload: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(7 + payload.len());
	buf.push(HL_VERSION);
	buf.push(0x01);
	buf.extend_from_slice(&call_id.to_le_bytes());
	buf.push(tsn);
	buf.push(status_cat);
	buf.push(status_code);
	buf.extend_from_slice(payload);
	buf
}

///Encode an HL indication; only synthesized by tests and mock NCPs.
pub fn encode_indication(call_id: u16, payload: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(4 + payload.len());
	buf.push(HL_VERSION);
	buf.push(0x02);
	buf.extend_from_slice(&call_id.to_le_bytes());
	buf.extend_from_slice(payload);
	buf
}

pub fn decode(data: &[u8]) -> Result<HlPacket, Error> {
	if data.len() < 4 {
		return Err(Error::TooShort { what: "packet", have: data.len() });
	}

	let packet_type = PacketType::from_byte(data[1])?;
	let call_id = u16::from_le_bytes([data[2], data[3]]);

	let mut p = HlPacket {
		packet_type,
		call_id,
		tsn: 0,
		status_cat: 0,
		status_code: 0,
		payload: Vec::new(),
	};

	let pos = match packet_type {
		PacketType::Request => {
			if data.len() < 5 {
				return Err(Error::TooShort { what: "request", have: data.len() });
			}
			p.tsn = data[4];
			5
		},
		PacketType::Response => {
			if data.len() < 7 {
				return Err(Error::TooShort { what: "response", have: data.len() });
			}
			p.tsn = data[4];
			p.status_cat = data[5];
			p.status_code = data[6];
			7
		},
		PacketType::Indication => 4,
	};

	if pos < data.len() {
		p.payload = data[pos..].to_vec();
	}

	Ok(p)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::ll;

	#[test]
	fn request_round_trip_through_ll() {
		let payload = [0xAA, 0xBB, 0xCC];
		let encoded = ll::encode_data(1, &encode_request(CMD_APSDE_DATA_REQ, 42, &payload));

		let frame = ll::decode(&encoded).unwrap();
		let packet = decode(&frame.body).unwrap();

		assert_eq!(packet.packet_type, PacketType::Request);
		assert_eq!(packet.call_id, CMD_APSDE_DATA_REQ);
		assert_eq!(packet.tsn, 42);
		assert_eq!(packet.payload, payload);
	}

	#[test]
	fn response_carries_status() {
		let raw = encode_response(CMD_NWK_DISCOVERY, 7, STATUS_CAT_MAC, STATUS_MAC_NO_BEACON, &[]);
		let packet = decode(&raw).unwrap();

		assert_eq!(packet.packet_type, PacketType::Response);
		assert_eq!(packet.tsn, 7);
		assert!(!packet.status_ok());
		assert_eq!(packet.status_cat, STATUS_CAT_MAC);
		assert_eq!(packet.status_code, STATUS_MAC_NO_BEACON);
	}

	#[test]
	fn indication_has_no_tsn() {
		let raw = encode_indication(CMD_NCP_RESET_IND, &[0x01]);
		let packet = decode(&raw).unwrap();

		assert_eq!(packet.packet_type, PacketType::Indication);
		assert_eq!(packet.payload, vec![0x01]);
	}

	#[test]
	fn truncated_response_rejected() {
		let raw = encode_response(CMD_GET_MODULE_VERSION, 1, 0, 0, &[]);
		assert!(decode(&raw[..5]).is_err());
	}

	#[test]
	fn unknown_packet_type_rejected() {
		assert!(matches!(decode(&[0x00, 0x07, 0x01, 0x00]), Err(Error::UnknownPacketType(0x07))));
	}

	#[test]
	fn status_names() {
		assert_eq!(status_name(0, 0), "OK");
		assert_eq!(status_name(STATUS_CAT_MAC, 0xEA), "MAC/234(0xEA)");
		assert!(status_name(STATUS_CAT_ZDO, 0x80).starts_with("ZDO/"));
	}
}
