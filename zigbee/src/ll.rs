//zboss ncp low-level link layer: signature, length, crc8 header, crc16 body,
//2-bit packet/ack sequences, header-only ack frames

use frames::{ self, Frame };

pub const SIG0: u8 = 0xDE;
pub const SIG1: u8 = 0xAD;
pub const HEADER_SIZE: usize = 7;	//sig(2) + size(2) + type(1) + flags(1) + crc8(1)
pub const BODY_CRC_SIZE: usize = 2;

//the only LL type used by the NCP serial API; ack vs data lives in flags
pub const LL_TYPE: u8 = 0x06;

pub const FLAG_ACK: u8 = 0x01;
pub const FLAG_RETRANSMIT: u8 = 0x02;
pub const FLAG_PKT_SEQ_MASK: u8 = 0x0C;
pub const FLAG_PKT_SEQ_SHIFT: u8 = 2;
pub const FLAG_ACK_SEQ_MASK: u8 = 0x30;
pub const FLAG_ACK_SEQ_SHIFT: u8 = 4;
pub const FLAG_FIRST_FRAG: u8 = 0x40;
pub const FLAG_LAST_FRAG: u8 = 0x80;

#[derive(Debug)]
pub enum Error {
	TooShort(usize),
	BadSignature(u8, u8),
	BadType(u8),
	Crc8Mismatch { got: u8, want: u8 },
	Crc16Mismatch { got: u16, want: u16 },
	Truncated { need: usize, have: usize },
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::TooShort(n) => write!(f, "ll frame too short: {} bytes", n),
			Self::BadSignature(a, b) => write!(f, "bad ll signature: {:#04x}{:02x}", a, b),
			Self::BadType(t) => write!(f, "unexpected ll type: {:#04x}", t),
			Self::Crc8Mismatch { got, want } => write!(f, "ll crc8 mismatch: got {:#04x}, want {:#04x}", got, want),
			Self::Crc16Mismatch { got, want } => write!(f, "body crc16 mismatch: got {:#06x}, want {:#06x}", got, want),
			Self::Truncated { need, have } => write!(f, "ll frame truncated: need {}, have {}", need, have),
		}
	}
}

impl std::error::Error for Error {}

impl From<Error> for frames::Error {
	fn from(r: Error) -> Self {
		frames::Error::Other(r.to_string())
	}
}

//crc-8 koopman variant: reflected poly 0xB2 (normal 0x4D), init 0xFF, xorout 0xFF

const fn build_crc8_table() -> [u8; 256] {
	let mut table = [0u8; 256];
	let mut i = 0;
	while i < 256 {
		let mut crc = i as u8;
		let mut bit = 0;
		while bit < 8 {
			crc = if crc & 1 != 0 { (crc >> 1) ^ 0xB2 } else { crc >> 1 };
			bit += 1;
		}
		table[i] = crc;
		i += 1;
	}
	table
}

const CRC8_TABLE: [u8; 256] = build_crc8_table();

pub fn crc8(data: &[u8]) -> u8 {
	let mut crc = 0xFFu8;
	for b in data {
		crc = CRC8_TABLE[(crc ^ b) as usize];
	}
	crc ^ 0xFF
}

//crc-16 reflected poly 0x8408, init 0x0000, xorout 0x0000

const fn build_crc16_table() -> [u16; 256] {
	let mut table = [0u16; 256];
	let mut i = 0;
	while i < 256 {
		let mut crc = i as u16;
		let mut bit = 0;
		while bit < 8 {
			crc = if crc & 1 != 0 { (crc >> 1) ^ 0x8408 } else { crc >> 1 };
			bit += 1;
		}
		table[i] = crc;
		i += 1;
	}
	table
}

const CRC16_TABLE: [u16; 256] = build_crc16_table();

pub fn crc16(data: &[u8]) -> u16 {
	let mut crc = 0u16;
	for b in data {
		crc = (crc >> 8) ^ CRC16_TABLE[((crc ^ *b as u16) & 0xFF) as usize];
	}
	crc
}

//flag helpers

pub fn pkt_seq(flags: u8) -> u8 {
	(flags >> FLAG_PKT_SEQ_SHIFT) & 0x03
}

pub fn ack_seq(flags: u8) -> u8 {
	(flags >> FLAG_ACK_SEQ_SHIFT) & 0x03
}

pub fn is_ack(flags: u8) -> bool {
	flags & FLAG_ACK != 0
}

pub fn is_retransmit(flags: u8) -> bool {
	flags & FLAG_RETRANSMIT != 0
}

///A decoded LL frame: ACKs carry no body, DATA frames carry the HL bytes
///(already CRC16-verified, prefix stripped).
#[derive(Debug, Clone)]
pub struct LlFrame {
	pub flags: u8,
	pub body: Vec<u8>,
}

impl LlFrame {
	pub fn is_ack(&self) -> bool {
		is_ack(self.flags)
	}

	pub fn pkt_seq(&self) -> u8 {
		pkt_seq(self.flags)
	}

	pub fn ack_seq(&self) -> u8 {
		ack_seq(self.flags)
	}
}

///Encode an HL payload into a single-fragment DATA frame.
pub fn encode_data(pkt_seq: u8, hl_data: &[u8]) -> Vec<u8> {
	let body_len = BODY_CRC_SIZE + hl_data.len();
	//size counts itself onward: size(2) + type(1) + flags(1) + crc8(1) + body
	let ll_size = (5 + body_len) as u16;

	let mut flags = FLAG_FIRST_FRAG | FLAG_LAST_FRAG;
	flags |= (pkt_seq << FLAG_PKT_SEQ_SHIFT) & FLAG_PKT_SEQ_MASK;

	let mut frame = Vec::with_capacity(2 + ll_size as usize);
	frame.push(SIG0);
	frame.push(SIG1);
	frame.extend_from_slice(&ll_size.to_le_bytes());
	frame.push(LL_TYPE);
	frame.push(flags);
	frame.push(crc8(&frame[2..6]));
	frame.extend_from_slice(&crc16(hl_data).to_le_bytes());
	frame.extend_from_slice(hl_data);

	frame
}

///Encode a header-only ACK frame.
pub fn encode_ack(ack_seq: u8) -> Vec<u8> {
	let mut frame = Vec::with_capacity(HEADER_SIZE);
	frame.push(SIG0);
	frame.push(SIG1);
	frame.extend_from_slice(&5u16.to_le_bytes());
	frame.push(LL_TYPE);
	frame.push(FLAG_ACK | ((ack_seq << FLAG_ACK_SEQ_SHIFT) & FLAG_ACK_SEQ_MASK));
	frame.push(crc8(&frame[2..6]));
	frame
}

///Flip the retransmit bit on an already-encoded DATA frame and fix its CRC8.
pub fn mark_retransmit(frame: &mut [u8]) {
	frame[5] |= FLAG_RETRANSMIT;
	frame[6] = crc8(&frame[2..6]);
}

pub fn decode(data: &[u8]) -> Result<LlFrame, Error> {
	if data.len() < HEADER_SIZE {
		return Err(Error::TooShort(data.len()));
	}
	if data[0] != SIG0 || data[1] != SIG1 {
		return Err(Error::BadSignature(data[0], data[1]));
	}

	let ll_size = u16::from_le_bytes([data[2], data[3]]) as usize;
	let ll_type = data[4];
	let flags = data[5];

	let want = crc8(&data[2..6]);
	if data[6] != want {
		return Err(Error::Crc8Mismatch { got: data[6], want });
	}

	if ll_type != LL_TYPE {
		return Err(Error::BadType(ll_type));
	}

	if ll_size + 2 > data.len() {
		return Err(Error::Truncated { need: ll_size + 2, have: data.len() });
	}

	//acks are header-only
	if is_ack(flags) {
		return Ok(LlFrame { flags, body: Vec::new() });
	}

	let body = &data[HEADER_SIZE..2 + ll_size];
	if body.len() < BODY_CRC_SIZE {
		return Err(Error::Truncated { need: BODY_CRC_SIZE, have: body.len() });
	}

	let body_crc = u16::from_le_bytes([body[0], body[1]]);
	let hl_data = &body[2..];
	let want = crc16(hl_data);
	if body_crc != want {
		return Err(Error::Crc16Mismatch { got: body_crc, want });
	}

	Ok(LlFrame { flags, body: hl_data.to_vec() })
}

impl Frame for LlFrame {
	type Params = ();

	///Resynchronizes on the DE AD signature, discarding garbage prefix bytes.
	fn get_buffer_len(buf: &mut Vec<u8>, _params: &()) -> Result<usize, frames::Error> {
		loop {
			match buf.len() {
				0 => return Ok(1),
				1 => {
					if buf[0] != SIG0 {
						buf.clear();
						return Ok(1);
					}
					return Ok(1);
				},
				_ => {
					if buf[0] != SIG0 || buf[1] != SIG1 {
						//shift one byte and hunt again
						buf.remove(0);
						continue;
					}
					break;
				}
			}
		}

		if buf.len() < 4 {
			return Ok(4 - buf.len());
		}

		let ll_size = u16::from_le_bytes([buf[2], buf[3]]) as usize;
		let total = 2 + ll_size;

		if total < HEADER_SIZE {
			//size field corrupt enough to be unusable, resync past the signature
			buf.remove(0);
			return Self::get_buffer_len(buf, &());
		}

		Ok(total.saturating_sub(buf.len()))
	}

	fn from_buf(buf: &[u8], _params: &()) -> Result<Self, frames::Error> {
		Ok(decode(buf)?)
	}

	fn as_bytes(&self, _params: &(), buf: &mut Vec<u8>) -> Result<(), frames::Error> {
		if self.is_ack() {
			buf.extend_from_slice(&encode_ack(self.ack_seq()));
		}
		else {
			buf.extend_from_slice(&encode_data(self.pkt_seq(), &self.body));
		}
		Ok(())
	}
}
