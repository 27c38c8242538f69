//64-bit device identity; canonical form is 16 uppercase hex chars, wire form
//is the same 8 bytes as they appear in ncp payloads

use serde::{ Serialize, Serializer, Deserialize, Deserializer };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Ieee(pub [u8; 8]);

#[derive(Debug)]
pub struct ParseIeeeError(String);

impl core::fmt::Display for ParseIeeeError {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "bad ieee address: {}", self.0)
	}
}

impl std::error::Error for ParseIeeeError {}

impl Ieee {
	pub fn from_wire(bytes: [u8; 8]) -> Self {
		Self(bytes)
	}

	pub fn to_wire(self) -> [u8; 8] {
		self.0
	}

	pub fn is_zero(&self) -> bool {
		self.0 == [0u8; 8]
	}
}

impl core::fmt::Display for Ieee {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		for b in &self.0 {
			write!(f, "{:02X}", b)?;
		}
		Ok(())
	}
}

impl core::str::FromStr for Ieee {
	type Err = ParseIeeeError;

	///Accepts "DDDDDDDDDDDDDDDD" and "DD:DD:DD:DD:DD:DD:DD:DD".
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let cleaned: String = s.chars().filter(|c| *c != ':').collect();
		let bytes = hex::decode(&cleaned).map_err(|_| ParseIeeeError(s.to_string()))?;
		if bytes.len() != 8 {
			return Err(ParseIeeeError(s.to_string()));
		}
		let mut addr = [0u8; 8];
		addr.copy_from_slice(&bytes);
		Ok(Self(addr))
	}
}

impl Serialize for Ieee {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Ieee {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let s = String::deserialize(deserializer)?;
		s.parse().map_err(serde::de::Error::custom)
	}
}
