//zigbee cluster library: typed attribute values, frame builders, record parsers

use crate::value::Value;

//zcl data type ids
pub const TYPE_NODATA: u8 = 0x00;
pub const TYPE_DATA8: u8 = 0x08;
pub const TYPE_DATA16: u8 = 0x09;
pub const TYPE_DATA24: u8 = 0x0A;
pub const TYPE_DATA32: u8 = 0x0B;
pub const TYPE_DATA40: u8 = 0x0C;
pub const TYPE_DATA48: u8 = 0x0D;
pub const TYPE_DATA56: u8 = 0x0E;
pub const TYPE_DATA64: u8 = 0x0F;
pub const TYPE_BOOL: u8 = 0x10;
pub const TYPE_MAP8: u8 = 0x18;
pub const TYPE_MAP16: u8 = 0x19;
pub const TYPE_MAP24: u8 = 0x1A;
pub const TYPE_MAP32: u8 = 0x1B;
pub const TYPE_UINT8: u8 = 0x20;
pub const TYPE_UINT16: u8 = 0x21;
pub const TYPE_UINT24: u8 = 0x22;
pub const TYPE_UINT32: u8 = 0x23;
pub const TYPE_UINT40: u8 = 0x24;
pub const TYPE_UINT48: u8 = 0x25;
pub const TYPE_UINT56: u8 = 0x26;
pub const TYPE_UINT64: u8 = 0x27;
pub const TYPE_INT8: u8 = 0x28;
pub const TYPE_INT16: u8 = 0x29;
pub const TYPE_INT24: u8 = 0x2A;
pub const TYPE_INT32: u8 = 0x2B;
pub const TYPE_INT40: u8 = 0x2C;
pub const TYPE_INT48: u8 = 0x2D;
pub const TYPE_INT56: u8 = 0x2E;
pub const TYPE_INT64: u8 = 0x2F;
pub const TYPE_ENUM8: u8 = 0x30;
pub const TYPE_ENUM16: u8 = 0x31;
pub const TYPE_SEMI: u8 = 0x38;
pub const TYPE_SINGLE: u8 = 0x39;
pub const TYPE_DOUBLE: u8 = 0x3A;
pub const TYPE_OCTSTR: u8 = 0x41;
pub const TYPE_STRING: u8 = 0x42;
pub const TYPE_OCTSTR16: u8 = 0x43;
pub const TYPE_STRING16: u8 = 0x44;
pub const TYPE_TOD: u8 = 0xE0;
pub const TYPE_DATE: u8 = 0xE1;
pub const TYPE_UTC: u8 = 0xE2;
pub const TYPE_CLUSTER_ID: u8 = 0xE8;
pub const TYPE_ATTRIB_ID: u8 = 0xE9;
pub const TYPE_EUI64: u8 = 0xF0;

#[derive(Debug)]
pub enum Error {
	NotEnoughData { type_id: u8, need: usize, have: usize },
	UnknownType(u8),
	Overflow { type_id: u8, value: i128 },
	NegativeUnsigned { type_id: u8, value: i64 },
	BadValue { type_id: u8, what: &'static str },
	StringTooLong { type_id: u8, len: usize, max: usize },
	BufferTooSmall(&'static str),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::NotEnoughData { type_id, need, have } =>
				write!(f, "not enough data for type {:#04x}: need {}, have {}", type_id, need, have),
			Self::UnknownType(t) => write!(f, "unknown zcl type {:#04x}", t),
			Self::Overflow { type_id, value } =>
				write!(f, "value {} overflows {}", value, type_name(*type_id)),
			Self::NegativeUnsigned { type_id, value } =>
				write!(f, "negative value {} for unsigned {}", value, type_name(*type_id)),
			Self::BadValue { type_id, what } =>
				write!(f, "cannot convert {} to {}", what, type_name(*type_id)),
			Self::StringTooLong { type_id, len, max } =>
				write!(f, "{} of length {} exceeds max {}", type_name(*type_id), len, max),
			Self::BufferTooSmall(s) => write!(f, "buffer too small: {}", s),
		}
	}
}

impl std::error::Error for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSize {
	Fixed(usize),
	//1-byte length prefix (octstr, string)
	Var1,
	//2-byte length prefix (octstr16, string16)
	Var2,
	Unknown,
}

pub fn type_size(t: u8) -> TypeSize {
	match t {
		TYPE_NODATA => TypeSize::Fixed(0),
		TYPE_DATA8..=TYPE_DATA64 => TypeSize::Fixed((t - TYPE_DATA8) as usize + 1),
		TYPE_BOOL => TypeSize::Fixed(1),
		TYPE_MAP8 => TypeSize::Fixed(1),
		TYPE_MAP16 => TypeSize::Fixed(2),
		TYPE_MAP24 => TypeSize::Fixed(3),
		TYPE_MAP32 => TypeSize::Fixed(4),
		TYPE_UINT8..=TYPE_UINT64 => TypeSize::Fixed((t - TYPE_UINT8) as usize + 1),
		TYPE_INT8..=TYPE_INT64 => TypeSize::Fixed((t - TYPE_INT8) as usize + 1),
		TYPE_ENUM8 => TypeSize::Fixed(1),
		TYPE_ENUM16 => TypeSize::Fixed(2),
		TYPE_SEMI => TypeSize::Fixed(2),
		TYPE_SINGLE => TypeSize::Fixed(4),
		TYPE_DOUBLE => TypeSize::Fixed(8),
		TYPE_OCTSTR | TYPE_STRING => TypeSize::Var1,
		TYPE_OCTSTR16 | TYPE_STRING16 => TypeSize::Var2,
		TYPE_TOD | TYPE_DATE | TYPE_UTC => TypeSize::Fixed(4),
		TYPE_CLUSTER_ID | TYPE_ATTRIB_ID => TypeSize::Fixed(2),
		TYPE_EUI64 => TypeSize::Fixed(8),
		_ => TypeSize::Unknown,
	}
}

pub fn type_name(t: u8) -> &'static str {
	match t {
		TYPE_NODATA => "nodata",
		TYPE_DATA8 => "data8",
		TYPE_DATA16 => "data16",
		TYPE_DATA24 => "data24",
		TYPE_DATA32 => "data32",
		TYPE_DATA40 => "data40",
		TYPE_DATA48 => "data48",
		TYPE_DATA56 => "data56",
		TYPE_DATA64 => "data64",
		TYPE_BOOL => "bool",
		TYPE_MAP8 => "map8",
		TYPE_MAP16 => "map16",
		TYPE_MAP24 => "map24",
		TYPE_MAP32 => "map32",
		TYPE_UINT8 => "uint8",
		TYPE_UINT16 => "uint16",
		TYPE_UINT24 => "uint24",
		TYPE_UINT32 => "uint32",
		TYPE_UINT40 => "uint40",
		TYPE_UINT48 => "uint48",
		TYPE_UINT56 => "uint56",
		TYPE_UINT64 => "uint64",
		TYPE_INT8 => "int8",
		TYPE_INT16 => "int16",
		TYPE_INT24 => "int24",
		TYPE_INT32 => "int32",
		TYPE_INT40 => "int40",
		TYPE_INT48 => "int48",
		TYPE_INT56 => "int56",
		TYPE_INT64 => "int64",
		TYPE_ENUM8 => "enum8",
		TYPE_ENUM16 => "enum16",
		TYPE_SEMI => "float16",
		TYPE_SINGLE => "float32",
		TYPE_DOUBLE => "float64",
		TYPE_OCTSTR => "octstr",
		TYPE_STRING => "string",
		TYPE_OCTSTR16 => "octstr16",
		TYPE_STRING16 => "string16",
		TYPE_TOD => "ToD",
		TYPE_DATE => "Date",
		TYPE_UTC => "UTC",
		TYPE_CLUSTER_ID => "ClusterID",
		TYPE_ATTRIB_ID => "AttribID",
		TYPE_EUI64 => "EUI64",
		_ => "unknown",
	}
}

fn read_uint_le(data: &[u8], n: usize) -> u64 {
	let mut v = 0u64;
	for i in (0..n).rev() {
		v = (v << 8) | data[i] as u64;
	}
	v
}

fn write_uint_le(buf: &mut Vec<u8>, v: u64, n: usize) {
	for i in 0..n {
		buf.push((v >> (8 * i)) as u8);
	}
}

fn sign_extend(v: u64, n: usize) -> i64 {
	let bits = n * 8;
	let sign = 1u64 << (bits - 1);
	if v & sign != 0 {
		(v | !((1u64 << bits) - 1)) as i64
	}
	else {
		v as i64
	}
}

///One decoded ZCL attribute value. Variant names mirror the ZCL type table.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
	Nodata,
	Data8(u8),
	Data16(u16),
	Data24(u32),
	Data32(u32),
	Data40(u64),
	Data48(u64),
	Data56(u64),
	Data64(u64),
	Bool(bool),
	Map8(u8),
	Map16(u16),
	Map24(u32),
	Map32(u32),
	Uint8(u8),
	Uint16(u16),
	Uint24(u32),
	Uint32(u32),
	Uint40(u64),
	Uint48(u64),
	Uint56(u64),
	Uint64(u64),
	Int8(i8),
	Int16(i16),
	Int24(i32),
	Int32(i32),
	Int40(i64),
	Int48(i64),
	Int56(i64),
	Int64(i64),
	Enum8(u8),
	Enum16(u16),
	//float16 is carried as raw bits, nothing in the field reports real semi floats
	Semi(u16),
	Single(f32),
	Double(f64),
	Octstr(Vec<u8>),
	CharStr(String),
	Octstr16(Vec<u8>),
	String16(String),
	ToD(u32),
	Date(u32),
	Utc(u32),
	ClusterId(u16),
	AttribId(u16),
	Eui64([u8; 8]),
}

impl AttributeValue {
	pub fn type_id(&self) -> u8 {
		match self {
			Self::Nodata => TYPE_NODATA,
			Self::Data8(_) => TYPE_DATA8,
			Self::Data16(_) => TYPE_DATA16,
			Self::Data24(_) => TYPE_DATA24,
			Self::Data32(_) => TYPE_DATA32,
			Self::Data40(_) => TYPE_DATA40,
			Self::Data48(_) => TYPE_DATA48,
			Self::Data56(_) => TYPE_DATA56,
			Self::Data64(_) => TYPE_DATA64,
			Self::Bool(_) => TYPE_BOOL,
			Self::Map8(_) => TYPE_MAP8,
			Self::Map16(_) => TYPE_MAP16,
			Self::Map24(_) => TYPE_MAP24,
			Self::Map32(_) => TYPE_MAP32,
			Self::Uint8(_) => TYPE_UINT8,
			Self::Uint16(_) => TYPE_UINT16,
			Self::Uint24(_) => TYPE_UINT24,
			Self::Uint32(_) => TYPE_UINT32,
			Self::Uint40(_) => TYPE_UINT40,
			Self::Uint48(_) => TYPE_UINT48,
			Self::Uint56(_) => TYPE_UINT56,
			Self::Uint64(_) => TYPE_UINT64,
			Self::Int8(_) => TYPE_INT8,
			Self::Int16(_) => TYPE_INT16,
			Self::Int24(_) => TYPE_INT24,
			Self::Int32(_) => TYPE_INT32,
			Self::Int40(_) => TYPE_INT40,
			Self::Int48(_) => TYPE_INT48,
			Self::Int56(_) => TYPE_INT56,
			Self::Int64(_) => TYPE_INT64,
			Self::Enum8(_) => TYPE_ENUM8,
			Self::Enum16(_) => TYPE_ENUM16,
			Self::Semi(_) => TYPE_SEMI,
			Self::Single(_) => TYPE_SINGLE,
			Self::Double(_) => TYPE_DOUBLE,
			Self::Octstr(_) => TYPE_OCTSTR,
			Self::CharStr(_) => TYPE_STRING,
			Self::Octstr16(_) => TYPE_OCTSTR16,
			Self::String16(_) => TYPE_STRING16,
			Self::ToD(_) => TYPE_TOD,
			Self::Date(_) => TYPE_DATE,
			Self::Utc(_) => TYPE_UTC,
			Self::ClusterId(_) => TYPE_CLUSTER_ID,
			Self::AttribId(_) => TYPE_ATTRIB_ID,
			Self::Eui64(_) => TYPE_EUI64,
		}
	}

	///Decode a value of the given type, returning the value and bytes consumed.
	pub fn from_buf(t: u8, data: &[u8]) -> Result<(Self, usize), Error> {
		let size = match type_size(t) {
			TypeSize::Unknown => return Err(Error::UnknownType(t)),
			TypeSize::Var1 => {
				if data.is_empty() {
					return Err(Error::NotEnoughData { type_id: t, need: 1, have: 0 });
				}
				let len = data[0] as usize;
				//0xFF marks an invalid string
				if len == 0xFF {
					let v = if t == TYPE_STRING { Self::CharStr(String::new()) } else { Self::Octstr(Vec::new()) };
					return Ok((v, 1));
				}
				if data.len() < 1 + len {
					return Err(Error::NotEnoughData { type_id: t, need: 1 + len, have: data.len() });
				}
				let bytes = data[1..1 + len].to_vec();
				let v = if t == TYPE_STRING {
					Self::CharStr(String::from_utf8_lossy(&bytes).into_owned())
				} else {
					Self::Octstr(bytes)
				};
				return Ok((v, 1 + len));
			},
			TypeSize::Var2 => {
				if data.len() < 2 {
					return Err(Error::NotEnoughData { type_id: t, need: 2, have: data.len() });
				}
				let len = u16::from_le_bytes([data[0], data[1]]) as usize;
				if len == 0xFFFF {
					let v = if t == TYPE_STRING16 { Self::String16(String::new()) } else { Self::Octstr16(Vec::new()) };
					return Ok((v, 2));
				}
				if data.len() < 2 + len {
					return Err(Error::NotEnoughData { type_id: t, need: 2 + len, have: data.len() });
				}
				let bytes = data[2..2 + len].to_vec();
				let v = if t == TYPE_STRING16 {
					Self::String16(String::from_utf8_lossy(&bytes).into_owned())
				} else {
					Self::Octstr16(bytes)
				};
				return Ok((v, 2 + len));
			},
			TypeSize::Fixed(n) => n,
		};

		if data.len() < size {
			return Err(Error::NotEnoughData { type_id: t, need: size, have: data.len() });
		}

		let v = match t {
			TYPE_NODATA => Self::Nodata,
			TYPE_DATA8 => Self::Data8(data[0]),
			TYPE_DATA16 => Self::Data16(read_uint_le(data, 2) as u16),
			TYPE_DATA24 => Self::Data24(read_uint_le(data, 3) as u32),
			TYPE_DATA32 => Self::Data32(read_uint_le(data, 4) as u32),
			TYPE_DATA40 => Self::Data40(read_uint_le(data, 5)),
			TYPE_DATA48 => Self::Data48(read_uint_le(data, 6)),
			TYPE_DATA56 => Self::Data56(read_uint_le(data, 7)),
			TYPE_DATA64 => Self::Data64(read_uint_le(data, 8)),
			TYPE_BOOL => Self::Bool(data[0] != 0),
			TYPE_MAP8 => Self::Map8(data[0]),
			TYPE_MAP16 => Self::Map16(read_uint_le(data, 2) as u16),
			TYPE_MAP24 => Self::Map24(read_uint_le(data, 3) as u32),
			TYPE_MAP32 => Self::Map32(read_uint_le(data, 4) as u32),
			TYPE_UINT8 => Self::Uint8(data[0]),
			TYPE_UINT16 => Self::Uint16(read_uint_le(data, 2) as u16),
			TYPE_UINT24 => Self::Uint24(read_uint_le(data, 3) as u32),
			TYPE_UINT32 => Self::Uint32(read_uint_le(data, 4) as u32),
			TYPE_UINT40 => Self::Uint40(read_uint_le(data, 5)),
			TYPE_UINT48 => Self::Uint48(read_uint_le(data, 6)),
			TYPE_UINT56 => Self::Uint56(read_uint_le(data, 7)),
			TYPE_UINT64 => Self::Uint64(read_uint_le(data, 8)),
			TYPE_INT8 => Self::Int8(data[0] as i8),
			TYPE_INT16 => Self::Int16(read_uint_le(data, 2) as u16 as i16),
			TYPE_INT24 => Self::Int24(sign_extend(read_uint_le(data, 3), 3) as i32),
			TYPE_INT32 => Self::Int32(read_uint_le(data, 4) as u32 as i32),
			TYPE_INT40 => Self::Int40(sign_extend(read_uint_le(data, 5), 5)),
			TYPE_INT48 => Self::Int48(sign_extend(read_uint_le(data, 6), 6)),
			TYPE_INT56 => Self::Int56(sign_extend(read_uint_le(data, 7), 7)),
			TYPE_INT64 => Self::Int64(read_uint_le(data, 8) as i64),
			TYPE_ENUM8 => Self::Enum8(data[0]),
			TYPE_ENUM16 => Self::Enum16(read_uint_le(data, 2) as u16),
			TYPE_SEMI => Self::Semi(read_uint_le(data, 2) as u16),
			TYPE_SINGLE => Self::Single(f32::from_bits(read_uint_le(data, 4) as u32)),
			TYPE_DOUBLE => Self::Double(f64::from_bits(read_uint_le(data, 8))),
			TYPE_TOD => Self::ToD(read_uint_le(data, 4) as u32),
			TYPE_DATE => Self::Date(read_uint_le(data, 4) as u32),
			TYPE_UTC => Self::Utc(read_uint_le(data, 4) as u32),
			TYPE_CLUSTER_ID => Self::ClusterId(read_uint_le(data, 2) as u16),
			TYPE_ATTRIB_ID => Self::AttribId(read_uint_le(data, 2) as u16),
			TYPE_EUI64 => {
				let mut addr = [0u8; 8];
				addr.copy_from_slice(&data[..8]);
				Self::Eui64(addr)
			},
			_ => return Err(Error::UnknownType(t)),
		};

		Ok((v, size))
	}

	///Append the wire encoding of the value (no type byte).
	pub fn as_bytes(&self, buf: &mut Vec<u8>) {
		match self {
			Self::Nodata => {},
			Self::Data8(v) | Self::Map8(v) | Self::Uint8(v) | Self::Enum8(v) => buf.push(*v),
			Self::Data16(v) | Self::Map16(v) | Self::Uint16(v) | Self::Enum16(v)
			| Self::Semi(v) | Self::ClusterId(v) | Self::AttribId(v) => write_uint_le(buf, *v as u64, 2),
			Self::Data24(v) | Self::Map24(v) | Self::Uint24(v) => write_uint_le(buf, *v as u64, 3),
			Self::Data32(v) | Self::Map32(v) | Self::Uint32(v)
			| Self::ToD(v) | Self::Date(v) | Self::Utc(v) => write_uint_le(buf, *v as u64, 4),
			Self::Data40(v) | Self::Uint40(v) => write_uint_le(buf, *v, 5),
			Self::Data48(v) | Self::Uint48(v) => write_uint_le(buf, *v, 6),
			Self::Data56(v) | Self::Uint56(v) => write_uint_le(buf, *v, 7),
			Self::Data64(v) | Self::Uint64(v) => write_uint_le(buf, *v, 8),
			Self::Bool(v) => buf.push(*v as u8),
			Self::Int8(v) => buf.push(*v as u8),
			Self::Int16(v) => write_uint_le(buf, *v as u16 as u64, 2),
			Self::Int24(v) => write_uint_le(buf, *v as u32 as u64, 3),
			Self::Int32(v) => write_uint_le(buf, *v as u32 as u64, 4),
			Self::Int40(v) => write_uint_le(buf, *v as u64, 5),
			Self::Int48(v) => write_uint_le(buf, *v as u64, 6),
			Self::Int56(v) => write_uint_le(buf, *v as u64, 7),
			Self::Int64(v) => write_uint_le(buf, *v as u64, 8),
			Self::Single(v) => write_uint_le(buf, v.to_bits() as u64, 4),
			Self::Double(v) => write_uint_le(buf, v.to_bits(), 8),
			Self::Octstr(b) => {
				buf.push(b.len() as u8);
				buf.extend_from_slice(b);
			},
			Self::CharStr(s) => {
				buf.push(s.len() as u8);
				buf.extend_from_slice(s.as_bytes());
			},
			Self::Octstr16(b) => {
				buf.extend_from_slice(&(b.len() as u16).to_le_bytes());
				buf.extend_from_slice(b);
			},
			Self::String16(s) => {
				buf.extend_from_slice(&(s.len() as u16).to_le_bytes());
				buf.extend_from_slice(s.as_bytes());
			},
			Self::Eui64(a) => buf.extend_from_slice(a),
		}
	}

	///Dynamic view for event payloads and the property map. Nodata has none.
	pub fn to_value(&self) -> Option<Value> {
		Some(match self {
			Self::Nodata => return None,
			Self::Data8(v) | Self::Map8(v) | Self::Uint8(v) | Self::Enum8(v) => Value::Uint(*v as u64),
			Self::Data16(v) | Self::Map16(v) | Self::Uint16(v) | Self::Enum16(v)
			| Self::Semi(v) | Self::ClusterId(v) | Self::AttribId(v) => Value::Uint(*v as u64),
			Self::Data24(v) | Self::Map24(v) | Self::Uint24(v) => Value::Uint(*v as u64),
			Self::Data32(v) | Self::Map32(v) | Self::Uint32(v)
			| Self::ToD(v) | Self::Date(v) | Self::Utc(v) => Value::Uint(*v as u64),
			Self::Data40(v) | Self::Uint40(v) | Self::Data48(v) | Self::Uint48(v)
			| Self::Data56(v) | Self::Uint56(v) | Self::Data64(v) | Self::Uint64(v) => Value::Uint(*v),
			Self::Bool(v) => Value::Bool(*v),
			Self::Int8(v) => Value::Int(*v as i64),
			Self::Int16(v) => Value::Int(*v as i64),
			Self::Int24(v) | Self::Int32(v) => Value::Int(*v as i64),
			Self::Int40(v) | Self::Int48(v) | Self::Int56(v) | Self::Int64(v) => Value::Int(*v),
			Self::Single(v) => Value::Float(*v as f64),
			Self::Double(v) => Value::Float(*v),
			Self::Octstr(b) | Self::Octstr16(b) => Value::Bytes(b.clone()),
			Self::CharStr(s) | Self::String16(s) => Value::Str(s.clone()),
			Self::Eui64(a) => Value::Bytes(a.to_vec()),
		})
	}

	///Build a typed value from a dynamic one, with range checks.
	pub fn from_value(t: u8, v: &Value) -> Result<Self, Error> {
		fn to_u64(t: u8, v: &Value) -> Result<u64, Error> {
			match v {
				Value::Bool(b) => Ok(*b as u64),
				Value::Uint(n) => Ok(*n),
				Value::Int(n) => {
					if *n < 0 {
						return Err(Error::NegativeUnsigned { type_id: t, value: *n });
					}
					Ok(*n as u64)
				},
				Value::Float(x) => {
					if *x < 0.0 {
						return Err(Error::NegativeUnsigned { type_id: t, value: *x as i64 });
					}
					Ok(*x as u64)
				},
				_ => Err(Error::BadValue { type_id: t, what: "non-numeric value" }),
			}
		}

		fn to_i64(t: u8, v: &Value) -> Result<i64, Error> {
			match v {
				Value::Uint(n) => {
					if *n > i64::MAX as u64 {
						return Err(Error::Overflow { type_id: t, value: *n as i128 });
					}
					Ok(*n as i64)
				},
				Value::Int(n) => Ok(*n),
				Value::Float(x) => Ok(*x as i64),
				_ => Err(Error::BadValue { type_id: t, what: "non-numeric value" }),
			}
		}

		fn check_u(t: u8, v: u64, max: u64) -> Result<u64, Error> {
			if v > max {
				return Err(Error::Overflow { type_id: t, value: v as i128 });
			}
			Ok(v)
		}

		fn check_i(t: u8, v: i64, min: i64, max: i64) -> Result<i64, Error> {
			if v < min || v > max {
				return Err(Error::Overflow { type_id: t, value: v as i128 });
			}
			Ok(v)
		}

		Ok(match t {
			TYPE_NODATA => Self::Nodata,
			TYPE_BOOL => match v {
				Value::Bool(b) => Self::Bool(*b),
				Value::Uint(n) => Self::Bool(*n != 0),
				Value::Int(n) => Self::Bool(*n != 0),
				Value::Float(x) => Self::Bool(*x != 0.0),
				_ => return Err(Error::BadValue { type_id: t, what: "non-boolean value" }),
			},
			TYPE_DATA8 => Self::Data8(check_u(t, to_u64(t, v)?, 0xFF)? as u8),
			TYPE_DATA16 => Self::Data16(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_DATA24 => Self::Data24(check_u(t, to_u64(t, v)?, 0xFF_FFFF)? as u32),
			TYPE_DATA32 => Self::Data32(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_DATA40 => Self::Data40(check_u(t, to_u64(t, v)?, 0xFF_FFFF_FFFF)?),
			TYPE_DATA48 => Self::Data48(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF_FFFF)?),
			TYPE_DATA56 => Self::Data56(check_u(t, to_u64(t, v)?, 0xFF_FFFF_FFFF_FFFF)?),
			TYPE_DATA64 => Self::Data64(to_u64(t, v)?),
			TYPE_MAP8 => Self::Map8(check_u(t, to_u64(t, v)?, 0xFF)? as u8),
			TYPE_MAP16 => Self::Map16(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_MAP24 => Self::Map24(check_u(t, to_u64(t, v)?, 0xFF_FFFF)? as u32),
			TYPE_MAP32 => Self::Map32(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_UINT8 => Self::Uint8(check_u(t, to_u64(t, v)?, 0xFF)? as u8),
			TYPE_UINT16 => Self::Uint16(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_UINT24 => Self::Uint24(check_u(t, to_u64(t, v)?, 0xFF_FFFF)? as u32),
			TYPE_UINT32 => Self::Uint32(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_UINT40 => Self::Uint40(check_u(t, to_u64(t, v)?, 0xFF_FFFF_FFFF)?),
			TYPE_UINT48 => Self::Uint48(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF_FFFF)?),
			TYPE_UINT56 => Self::Uint56(check_u(t, to_u64(t, v)?, 0xFF_FFFF_FFFF_FFFF)?),
			TYPE_UINT64 => Self::Uint64(to_u64(t, v)?),
			TYPE_INT8 => Self::Int8(check_i(t, to_i64(t, v)?, i8::MIN as i64, i8::MAX as i64)? as i8),
			TYPE_INT16 => Self::Int16(check_i(t, to_i64(t, v)?, i16::MIN as i64, i16::MAX as i64)? as i16),
			TYPE_INT24 => Self::Int24(check_i(t, to_i64(t, v)?, -8_388_608, 8_388_607)? as i32),
			TYPE_INT32 => Self::Int32(check_i(t, to_i64(t, v)?, i32::MIN as i64, i32::MAX as i64)? as i32),
			TYPE_INT40 => Self::Int40(check_i(t, to_i64(t, v)?, -(1 << 39), (1 << 39) - 1)?),
			TYPE_INT48 => Self::Int48(check_i(t, to_i64(t, v)?, -(1 << 47), (1 << 47) - 1)?),
			TYPE_INT56 => Self::Int56(check_i(t, to_i64(t, v)?, -(1 << 55), (1 << 55) - 1)?),
			TYPE_INT64 => Self::Int64(to_i64(t, v)?),
			TYPE_ENUM8 => Self::Enum8(check_u(t, to_u64(t, v)?, 0xFF)? as u8),
			TYPE_ENUM16 => Self::Enum16(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			//raw float16 bits
			TYPE_SEMI => Self::Semi(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_SINGLE => match v {
				Value::Float(x) => Self::Single(*x as f32),
				Value::Int(n) => Self::Single(*n as f32),
				Value::Uint(n) => Self::Single(*n as f32),
				_ => return Err(Error::BadValue { type_id: t, what: "non-numeric value" }),
			},
			TYPE_DOUBLE => match v {
				Value::Float(x) => Self::Double(*x),
				Value::Int(n) => Self::Double(*n as f64),
				Value::Uint(n) => Self::Double(*n as f64),
				_ => return Err(Error::BadValue { type_id: t, what: "non-numeric value" }),
			},
			TYPE_TOD => Self::ToD(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_DATE => Self::Date(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_UTC => Self::Utc(check_u(t, to_u64(t, v)?, 0xFFFF_FFFF)? as u32),
			TYPE_CLUSTER_ID => Self::ClusterId(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_ATTRIB_ID => Self::AttribId(check_u(t, to_u64(t, v)?, 0xFFFF)? as u16),
			TYPE_EUI64 => match v {
				Value::Bytes(b) if b.len() == 8 => {
					let mut addr = [0u8; 8];
					addr.copy_from_slice(b);
					Self::Eui64(addr)
				},
				_ => return Err(Error::BadValue { type_id: t, what: "need exactly 8 bytes" }),
			},
			TYPE_STRING => match v {
				Value::Str(s) => {
					if s.len() > 254 {
						return Err(Error::StringTooLong { type_id: t, len: s.len(), max: 254 });
					}
					Self::CharStr(s.clone())
				},
				_ => return Err(Error::BadValue { type_id: t, what: "non-string value" }),
			},
			TYPE_OCTSTR => match v {
				Value::Bytes(b) => {
					if b.len() > 254 {
						return Err(Error::StringTooLong { type_id: t, len: b.len(), max: 254 });
					}
					Self::Octstr(b.clone())
				},
				_ => return Err(Error::BadValue { type_id: t, what: "non-bytes value" }),
			},
			TYPE_STRING16 => match v {
				Value::Str(s) => {
					if s.len() > 65534 {
						return Err(Error::StringTooLong { type_id: t, len: s.len(), max: 65534 });
					}
					Self::String16(s.clone())
				},
				_ => return Err(Error::BadValue { type_id: t, what: "non-string value" }),
			},
			TYPE_OCTSTR16 => match v {
				Value::Bytes(b) => {
					if b.len() > 65534 {
						return Err(Error::StringTooLong { type_id: t, len: b.len(), max: 65534 });
					}
					Self::Octstr16(b.clone())
				},
				_ => return Err(Error::BadValue { type_id: t, what: "non-bytes value" }),
			},
			_ => return Err(Error::UnknownType(t)),
		})
	}
}

///Decode a typed value, returning the dynamic view and bytes consumed.
pub fn decode(t: u8, data: &[u8]) -> Result<(Option<Value>, usize), Error> {
	let (av, consumed) = AttributeValue::from_buf(t, data)?;
	Ok((av.to_value(), consumed))
}

///Encode a dynamic value into wire bytes for the given type.
pub fn encode(t: u8, v: &Value) -> Result<Vec<u8>, Error> {
	let av = AttributeValue::from_value(t, v)?;
	let mut buf = Vec::new();
	av.as_bytes(&mut buf);
	Ok(buf)
}

//zcl frame control bits
pub const FRAME_TYPE_GLOBAL: u8 = 0x00;
pub const FRAME_TYPE_CLUSTER: u8 = 0x01;
pub const FLAG_MFR_SPECIFIC: u8 = 0x04;
pub const DIR_SERVER_TO_CLIENT: u8 = 0x08;
pub const DISABLE_DEFAULT_RESPONSE: u8 = 0x10;

//zcl global command ids
pub const CMD_READ_ATTRIBUTES: u8 = 0x00;
pub const CMD_READ_ATTRIBUTES_RSP: u8 = 0x01;
pub const CMD_WRITE_ATTRIBUTES: u8 = 0x02;
pub const CMD_CONFIGURE_REPORTING: u8 = 0x06;
pub const CMD_REPORT_ATTRIBUTES: u8 = 0x0A;

pub const PROFILE_HA: u16 = 0x0104;

///Parsed ZCL frame header: frame_control(1) [mfr_code(2 LE)] seq(1) cmd(1).
#[derive(Debug, Clone)]
pub struct ZclHeader {
	pub frame_control: u8,
	pub manufacturer_code: Option<u16>,
	pub sequence: u8,
	pub command_id: u8,
	pub header_len: usize,
}

impl ZclHeader {
	pub fn parse(data: &[u8]) -> Result<Self, Error> {
		if data.len() < 3 {
			return Err(Error::BufferTooSmall("zcl header"));
		}
		let frame_control = data[0];
		let mut pos = 1;
		let manufacturer_code = if frame_control & FLAG_MFR_SPECIFIC != 0 {
			if data.len() < 5 {
				return Err(Error::BufferTooSmall("zcl manufacturer code"));
			}
			let c = u16::from_le_bytes([data[1], data[2]]);
			pos += 2;
			Some(c)
		} else {
			None
		};
		let sequence = data[pos];
		let command_id = data[pos + 1];
		Ok(ZclHeader {
			frame_control,
			manufacturer_code,
			sequence,
			command_id,
			header_len: pos + 2,
		})
	}

	pub fn frame_type(&self) -> u8 {
		self.frame_control & 0x03
	}
}

//frame builders, all with default response disabled

pub fn build_read_attributes(seq: u8, attr_ids: &[u16]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(3 + attr_ids.len() * 2);
	buf.push(FRAME_TYPE_GLOBAL | DISABLE_DEFAULT_RESPONSE);
	buf.push(seq);
	buf.push(CMD_READ_ATTRIBUTES);
	for id in attr_ids {
		buf.extend_from_slice(&id.to_le_bytes());
	}
	buf
}

///A single attribute write: raw value bytes, already encoded for the type.
#[derive(Debug, Clone)]
pub struct WriteRecord {
	pub attr_id: u16,
	pub data_type: u8,
	pub value: Vec<u8>,
}

pub fn build_write_attributes(seq: u8, records: &[WriteRecord]) -> Vec<u8> {
	let mut buf = vec![
		FRAME_TYPE_GLOBAL | DISABLE_DEFAULT_RESPONSE,
		seq,
		CMD_WRITE_ATTRIBUTES,
	];
	for rec in records {
		buf.extend_from_slice(&rec.attr_id.to_le_bytes());
		buf.push(rec.data_type);
		buf.extend_from_slice(&rec.value);
	}
	buf
}

pub fn build_cluster_command(seq: u8, cmd_id: u8, payload: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(3 + payload.len());
	buf.push(FRAME_TYPE_CLUSTER | DISABLE_DEFAULT_RESPONSE);
	buf.push(seq);
	buf.push(cmd_id);
	buf.extend_from_slice(payload);
	buf
}

pub fn build_configure_reporting(seq: u8, attr_id: u16, data_type: u8, min_interval: u16, max_interval: u16, report_change: &[u8]) -> Vec<u8> {
	let mut buf = Vec::with_capacity(3 + 8 + report_change.len());
	buf.push(FRAME_TYPE_GLOBAL | DISABLE_DEFAULT_RESPONSE);
	buf.push(seq);
	buf.push(CMD_CONFIGURE_REPORTING);
	buf.push(0x00);	//direction: device sends reports
	buf.extend_from_slice(&attr_id.to_le_bytes());
	buf.push(data_type);
	buf.extend_from_slice(&min_interval.to_le_bytes());
	buf.extend_from_slice(&max_interval.to_le_bytes());
	buf.extend_from_slice(report_change);
	buf
}

///One Report Attributes record, value bytes raw (length prefix included for
///variable types).
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRecord {
	pub attr_id: u16,
	pub data_type: u8,
	pub value: Vec<u8>,
}

///Parse Report Attributes records: attr_id(2) + data_type(1) + value.
///An unknown type makes the value boundary unknowable, so parsing stops there
///and the records decoded so far are returned.
pub fn parse_attribute_reports(data: &[u8]) -> Vec<ReportRecord> {
	let mut reports = Vec::new();
	let mut pos = 0;

	while pos + 3 <= data.len() {
		let attr_id = u16::from_le_bytes([data[pos], data[pos + 1]]);
		let data_type = data[pos + 2];
		pos += 3;

		let value = match type_size(data_type) {
			TypeSize::Fixed(size) => {
				if pos + size > data.len() {
					return reports;
				}
				let v = data[pos..pos + size].to_vec();
				pos += size;
				v
			},
			TypeSize::Var1 => {
				if pos >= data.len() {
					return reports;
				}
				let vlen = data[pos] as usize;
				if pos + 1 + vlen > data.len() {
					return reports;
				}
				let v = data[pos..pos + 1 + vlen].to_vec();
				pos += 1 + vlen;
				v
			},
			TypeSize::Var2 => {
				if pos + 2 > data.len() {
					return reports;
				}
				let vlen = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
				if pos + 2 + vlen > data.len() {
					return reports;
				}
				let v = data[pos..pos + 2 + vlen].to_vec();
				pos += 2 + vlen;
				v
			},
			TypeSize::Unknown => {
				return reports;
			},
		};

		reports.push(ReportRecord { attr_id, data_type, value });
	}

	reports
}

///One Read Attributes Response record. value is raw wire bytes and empty when
///status is non-zero or the type was unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadAttributeRecord {
	pub attr_id: u16,
	pub status: u8,
	pub data_type: u8,
	pub value: Vec<u8>,
}

///Parse Read Attributes Response records: attr_id(2) + status(1) and, when
///status is zero, data_type(1) + value. An unknown type emits the record
///without a value and stops further parsing.
pub fn parse_read_attribute_responses(data: &[u8]) -> Vec<ReadAttributeRecord> {
	let mut results = Vec::new();
	let mut data = data;

	while data.len() >= 3 {
		let attr_id = u16::from_le_bytes([data[0], data[1]]);
		let status = data[2];
		data = &data[3..];

		let mut rec = ReadAttributeRecord { attr_id, status, data_type: 0, value: Vec::new() };
		if status != 0 {
			results.push(rec);
			continue;
		}
		if data.is_empty() {
			break;
		}
		rec.data_type = data[0];
		data = &data[1..];

		match type_size(rec.data_type) {
			TypeSize::Unknown => {
				results.push(rec);
				return results;
			},
			TypeSize::Fixed(size) => {
				if data.len() < size {
					results.push(rec);
					return results;
				}
				rec.value = data[..size].to_vec();
				data = &data[size..];
			},
			TypeSize::Var1 => {
				if data.is_empty() {
					results.push(rec);
					return results;
				}
				let vlen = data[0] as usize;
				if data.len() < 1 + vlen {
					results.push(rec);
					return results;
				}
				rec.value = data[..1 + vlen].to_vec();
				data = &data[1 + vlen..];
			},
			TypeSize::Var2 => {
				if data.len() < 2 {
					results.push(rec);
					return results;
				}
				let vlen = u16::from_le_bytes([data[0], data[1]]) as usize;
				if data.len() < 2 + vlen {
					results.push(rec);
					return results;
				}
				rec.value = data[..2 + vlen].to_vec();
				data = &data[2 + vlen..];
			},
		}
		results.push(rec);
	}

	results
}

#[cfg(test)]
mod tests {
	use super::*;

	fn round_trip(t: u8, v: Value) {
		let encoded = encode(t, &v).unwrap();
		let (decoded, consumed) = decode(t, &encoded).unwrap();
		assert_eq!(consumed, encoded.len(), "type {:#04x} consumed", t);
		assert_eq!(decoded, Some(v), "type {:#04x}", t);
	}

	#[test]
	fn round_trip_bool() {
		round_trip(TYPE_BOOL, Value::Bool(true));
		round_trip(TYPE_BOOL, Value::Bool(false));
	}

	#[test]
	fn round_trip_uints() {
		round_trip(TYPE_UINT8, Value::Uint(0xFF));
		round_trip(TYPE_UINT16, Value::Uint(0xFFFF));
		round_trip(TYPE_UINT24, Value::Uint(0xFF_FFFF));
		round_trip(TYPE_UINT32, Value::Uint(0xFFFF_FFFF));
		round_trip(TYPE_UINT40, Value::Uint(0xFF_FFFF_FFFF));
		round_trip(TYPE_UINT48, Value::Uint(0xFFFF_FFFF_FFFF));
		round_trip(TYPE_UINT64, Value::Uint(u64::MAX));
	}

	#[test]
	fn round_trip_ints() {
		round_trip(TYPE_INT8, Value::Int(-128));
		round_trip(TYPE_INT16, Value::Int(-32768));
		round_trip(TYPE_INT24, Value::Int(-8_388_608));
		round_trip(TYPE_INT24, Value::Int(8_388_607));
		round_trip(TYPE_INT32, Value::Int(i32::MIN as i64));
	}

	#[test]
	fn round_trip_floats() {
		round_trip(TYPE_SINGLE, Value::Float(22.5));
		round_trip(TYPE_DOUBLE, Value::Float(-1234.56789));
	}

	#[test]
	fn round_trip_eui64() {
		round_trip(TYPE_EUI64, Value::Bytes(vec![1, 2, 3, 4, 5, 6, 7, 8]));
	}

	#[test]
	fn round_trip_strings() {
		round_trip(TYPE_STRING, Value::Str("lumi.sensor_magnet.aq2".into()));
		round_trip(TYPE_STRING, Value::Str("x".repeat(254)));
		round_trip(TYPE_OCTSTR, Value::Bytes(vec![0u8; 254]));
		round_trip(TYPE_STRING16, Value::Str("y".repeat(300)));
		round_trip(TYPE_OCTSTR16, Value::Bytes(vec![0xAB; 65534]));
	}

	#[test]
	fn encode_overflow_rejected() {
		assert!(matches!(encode(TYPE_UINT8, &Value::Uint(256)), Err(Error::Overflow { .. })));
		assert!(matches!(encode(TYPE_INT8, &Value::Int(128)), Err(Error::Overflow { .. })));
		assert!(matches!(encode(TYPE_INT24, &Value::Int(8_388_608)), Err(Error::Overflow { .. })));
		assert!(matches!(encode(TYPE_UINT24, &Value::Uint(0x100_0000)), Err(Error::Overflow { .. })));
	}

	#[test]
	fn encode_negative_unsigned_rejected() {
		for t in [TYPE_UINT8, TYPE_UINT16, TYPE_UINT24, TYPE_UINT32, TYPE_UINT64] {
			assert!(matches!(encode(t, &Value::Int(-1)), Err(Error::NegativeUnsigned { .. })), "type {:#04x}", t);
		}
	}

	#[test]
	fn encode_string_too_long_rejected() {
		assert!(matches!(encode(TYPE_STRING, &Value::Str("x".repeat(255))), Err(Error::StringTooLong { .. })));
	}

	#[test]
	fn decode_truncated_fixed_rejected() {
		assert!(matches!(decode(TYPE_UINT32, &[1, 2, 3]), Err(Error::NotEnoughData { .. })));
		assert!(matches!(decode(TYPE_EUI64, &[1, 2, 3, 4]), Err(Error::NotEnoughData { .. })));
	}

	#[test]
	fn decode_truncated_string_rejected() {
		//length prefix promises 5, only 2 present
		assert!(matches!(decode(TYPE_STRING, &[5, b'a', b'b']), Err(Error::NotEnoughData { .. })));
		assert!(matches!(decode(TYPE_STRING16, &[5, 0, b'a']), Err(Error::NotEnoughData { .. })));
	}

	#[test]
	fn decode_int24_sign_extends() {
		let (v, consumed) = decode(TYPE_INT24, &[0xFF, 0xFF, 0xFF]).unwrap();
		assert_eq!(consumed, 3);
		assert_eq!(v, Some(Value::Int(-1)));

		let (v, _) = decode(TYPE_INT24, &[0x00, 0x00, 0x80]).unwrap();
		assert_eq!(v, Some(Value::Int(-8_388_608)));
	}

	#[test]
	fn decode_unknown_type_rejected() {
		assert!(matches!(decode(0x77, &[0x00]), Err(Error::UnknownType(0x77))));
	}

	#[test]
	fn build_read_attributes_layout() {
		let frame = build_read_attributes(5, &[0x0000, 0x0001]);
		assert_eq!(frame[0] & 0x03, FRAME_TYPE_GLOBAL);
		assert_eq!(frame[1], 5);
		assert_eq!(frame[2], CMD_READ_ATTRIBUTES);
		assert_eq!(u16::from_le_bytes([frame[3], frame[4]]), 0x0000);
		assert_eq!(u16::from_le_bytes([frame[5], frame[6]]), 0x0001);
	}

	#[test]
	fn build_write_attributes_layout() {
		let frame = build_write_attributes(10, &[WriteRecord { attr_id: 0x0100, data_type: TYPE_UINT8, value: vec![0x42] }]);
		assert_eq!(frame[2], CMD_WRITE_ATTRIBUTES);
		assert_eq!(u16::from_le_bytes([frame[3], frame[4]]), 0x0100);
		assert_eq!(frame[5], TYPE_UINT8);
		assert_eq!(frame[6], 0x42);
	}

	#[test]
	fn build_configure_reporting_layout() {
		let frame = build_configure_reporting(3, 0x0000, TYPE_INT16, 10, 300, &[0x01, 0x00]);
		assert_eq!(frame[2], CMD_CONFIGURE_REPORTING);
		assert_eq!(frame[3], 0x00);
		assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), 0x0000);
		assert_eq!(frame[6], TYPE_INT16);
		assert_eq!(u16::from_le_bytes([frame[7], frame[8]]), 10);
		assert_eq!(u16::from_le_bytes([frame[9], frame[10]]), 300);
		assert_eq!(&frame[11..], &[0x01, 0x00]);
	}

	#[test]
	fn build_cluster_command_layout() {
		let frame = build_cluster_command(7, 0x01, &[0xFF]);
		assert_eq!(frame[0] & 0x03, FRAME_TYPE_CLUSTER);
		assert_eq!(frame[2], 0x01);
		assert_eq!(frame[3], 0xFF);
	}

	#[test]
	fn reports_concatenation_parses_in_order() {
		let single_a = [0x00, 0x00, TYPE_UINT8, 0xAA];
		let single_b = [0x01, 0x00, TYPE_UINT8, 0xBB];
		let mut both = single_a.to_vec();
		both.extend_from_slice(&single_b);

		let a = parse_attribute_reports(&single_a);
		let b = parse_attribute_reports(&single_b);
		let joint = parse_attribute_reports(&both);

		assert_eq!(joint.len(), 2);
		assert_eq!(joint[0], a[0]);
		assert_eq!(joint[1], b[0]);
	}

	#[test]
	fn reports_string_then_fixed() {
		let data = [
			0x04, 0x00, TYPE_STRING, 0x03, b'A', b'B', b'C',
			0x00, 0x00, TYPE_UINT8, 0xFF,
		];
		let reports = parse_attribute_reports(&data);
		assert_eq!(reports.len(), 2);
		assert_eq!(reports[0].value, vec![0x03, b'A', b'B', b'C']);
		assert_eq!(reports[1].attr_id, 0x0000);
		assert_eq!(reports[1].value, vec![0xFF]);
	}

	#[test]
	fn reports_unknown_type_stops_parsing() {
		let data = [
			0x00, 0x00, TYPE_UINT8, 0x11,	//good
			0x01, 0x00, 0x77, 0x22,	//unknown type
			0x02, 0x00, TYPE_UINT8, 0x33,	//unreachable
		];
		let reports = parse_attribute_reports(&data);
		assert_eq!(reports.len(), 1);
		assert_eq!(reports[0].value, vec![0x11]);
	}

	#[test]
	fn read_responses_error_status_has_no_value() {
		let data = [
			0x04, 0x00, 0x86,	//UNSUPPORTED_ATTRIBUTE
			0x05, 0x00, 0x00, TYPE_STRING, 0x02, b'h', b'i',
		];
		let results = parse_read_attribute_responses(&data);
		assert_eq!(results.len(), 2);
		assert_eq!(results[0].status, 0x86);
		assert!(results[0].value.is_empty());
		assert_eq!(results[1].status, 0);
		assert_eq!(results[1].value, vec![0x02, b'h', b'i']);
	}

	#[test]
	fn read_responses_unknown_type_stops() {
		let data = [
			0x00, 0x00, 0x00, TYPE_UINT8, 0x42,
			0x01, 0x00, 0x00, 0x77, 0xAA,	//unknown type
			0x02, 0x00, 0x00, TYPE_UINT8, 0x43,
		];
		let results = parse_read_attribute_responses(&data);
		assert_eq!(results.len(), 2);
		assert_eq!(results[0].value, vec![0x42]);
		assert_eq!(results[1].data_type, 0x77);
		assert!(results[1].value.is_empty());
	}

	#[test]
	fn zcl_header_plain_and_mfr_specific() {
		let h = ZclHeader::parse(&[FRAME_TYPE_GLOBAL, 0x05, CMD_REPORT_ATTRIBUTES]).unwrap();
		assert_eq!(h.header_len, 3);
		assert_eq!(h.sequence, 0x05);
		assert_eq!(h.command_id, CMD_REPORT_ATTRIBUTES);
		assert!(h.manufacturer_code.is_none());

		let h = ZclHeader::parse(&[FRAME_TYPE_GLOBAL | FLAG_MFR_SPECIFIC, 0x5E, 0x11, 0x07, 0x0A]).unwrap();
		assert_eq!(h.header_len, 5);
		assert_eq!(h.manufacturer_code, Some(0x115E));
		assert_eq!(h.sequence, 0x07);
	}
}
