//dynamic decoded value as it appears in device properties and events

use serde::{ Serialize, Deserialize };

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
	Bool(bool),
	Uint(u64),
	Int(i64),
	Float(f64),
	Str(String),
	Bytes(Vec<u8>),
}

impl Value {
	///Numeric view used by vendor transforms; bools and strings are not numeric.
	pub fn as_i64(&self) -> Option<i64> {
		match self {
			Self::Uint(v) => Some(*v as i64),
			Self::Int(v) => Some(*v),
			Self::Float(v) => Some(*v as i64),
			_ => None
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::Str(s) => Some(s),
			_ => None
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Self::Bytes(b) => Some(b),
			_ => None
		}
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self { Self::Bool(v) }
}

impl From<u64> for Value {
	fn from(v: u64) -> Self { Self::Uint(v) }
}

impl From<i64> for Value {
	fn from(v: i64) -> Self { Self::Int(v) }
}

impl From<f64> for Value {
	fn from(v: f64) -> Self { Self::Float(v) }
}

impl From<&str> for Value {
	fn from(v: &str) -> Self { Self::Str(v.to_string()) }
}

impl From<String> for Value {
	fn from(v: String) -> Self { Self::Str(v) }
}

impl From<Vec<u8>> for Value {
	fn from(v: Vec<u8>) -> Self { Self::Bytes(v) }
}

impl core::fmt::Display for Value {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Bool(b) => write!(f, "{}", b),
			Self::Uint(v) => write!(f, "{}", v),
			Self::Int(v) => write!(f, "{}", v),
			Self::Float(v) => write!(f, "{}", v),
			Self::Str(s) => write!(f, "{}", s),
			Self::Bytes(b) => {
				for byte in b {
					write!(f, "{:02X}", byte)?;
				}
				Ok(())
			}
		}
	}
}
