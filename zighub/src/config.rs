//json configuration with startup validation

use serde::Deserialize;
use crate::ieee::Ieee;

#[derive(Debug)]
pub enum Error {
	Io(std::io::Error),
	Json(serde_json::Error),
	Invalid(String),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Io(e) => e.fmt(f),
			Self::Json(e) => e.fmt(f),
			Self::Invalid(s) => write!(f, "invalid config: {}", s),
		}
	}
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
	fn from(e: std::io::Error) -> Self {
		Error::Io(e)
	}
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Error::Json(e)
	}
}

#[derive(Debug, Deserialize)]
pub struct Config {
	pub ncp: NcpConfig,
	pub network: NetworkConfig,
	#[serde(default)]
	pub store: StoreConfig,
	#[serde(default = "default_devices_dir")]
	pub devices_dir: String,
	#[serde(default)]
	pub log: LogConfig,
	#[serde(default)]
	pub interview: InterviewConfig,
}

#[derive(Debug, Deserialize)]
pub struct NcpConfig {
	pub port: String,
	#[serde(default = "default_baud")]
	pub baud: u32,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
	pub channel: u8,
	pub pan_id: u16,
	pub extended_pan_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
	#[serde(default = "default_store_path")]
	pub path: String,
}

impl Default for StoreConfig {
	fn default() -> Self {
		Self { path: default_store_path() }
	}
}

#[derive(Debug, Deserialize)]
pub struct LogConfig {
	#[serde(default = "default_log_level")]
	pub level: String,
	#[serde(default = "default_log_format")]
	pub format: String,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self { level: default_log_level(), format: default_log_format() }
	}
}

#[derive(Debug, Deserialize)]
pub struct InterviewConfig {
	///Upper bound of the random extra delay between interview attempts.
	#[serde(default = "default_retry_jitter_ms")]
	pub retry_jitter_ms: u64,
}

impl Default for InterviewConfig {
	fn default() -> Self {
		Self { retry_jitter_ms: default_retry_jitter_ms() }
	}
}

fn default_baud() -> u32 { 460_800 }
fn default_store_path() -> String { "zighub.db".to_string() }
fn default_devices_dir() -> String { "devices".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }
fn default_retry_jitter_ms() -> u64 { 3000 }

impl Config {
	pub fn load(path: &str) -> Result<Self, Error> {
		let data = std::fs::read_to_string(path)?;
		let cfg: Config = serde_json::from_str(&data)?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn validate(&self) -> Result<(), Error> {
		if self.ncp.port.is_empty() {
			return Err(Error::Invalid("ncp.port is required".to_string()));
		}
		if self.network.channel < 11 || self.network.channel > 26 {
			return Err(Error::Invalid(format!("network.channel must be 11-26, got {}", self.network.channel)));
		}
		if self.network.pan_id == 0x0000 || self.network.pan_id == 0xFFFF {
			return Err(Error::Invalid("network.pan_id must not be 0x0000 or 0xFFFF".to_string()));
		}
		if self.ext_pan_id().is_err() {
			return Err(Error::Invalid(format!("network.extended_pan_id {:?} is not 8 hex bytes", self.network.extended_pan_id)));
		}
		Ok(())
	}

	pub fn ext_pan_id(&self) -> Result<[u8; 8], Error> {
		let ieee: Ieee = self.network.extended_pan_id.parse()
			.map_err(|e: crate::ieee::ParseIeeeError| Error::Invalid(e.to_string()))?;
		Ok(ieee.to_wire())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn base() -> serde_json::Value {
		serde_json::json!({
			"ncp": { "port": "/dev/ttyACM0" },
			"network": { "channel": 15, "pan_id": 0x1A62, "extended_pan_id": "DD:CC:BB:AA:00:11:22:33" }
		})
	}

	fn parse(v: serde_json::Value) -> Result<Config, Error> {
		let cfg: Config = serde_json::from_value(v).map_err(Error::Json)?;
		cfg.validate()?;
		Ok(cfg)
	}

	#[test]
	fn defaults_applied() {
		let cfg = parse(base()).unwrap();
		assert_eq!(cfg.ncp.baud, 460_800);
		assert_eq!(cfg.store.path, "zighub.db");
		assert_eq!(cfg.devices_dir, "devices");
		assert_eq!(cfg.log.level, "info");
		assert_eq!(cfg.interview.retry_jitter_ms, 3000);
	}

	#[test]
	fn ext_pan_id_parses() {
		let cfg = parse(base()).unwrap();
		assert_eq!(cfg.ext_pan_id().unwrap(), [0xDD, 0xCC, 0xBB, 0xAA, 0x00, 0x11, 0x22, 0x33]);
	}

	#[test]
	fn bad_channel_rejected() {
		let mut v = base();
		v["network"]["channel"] = serde_json::json!(27);
		assert!(matches!(parse(v), Err(Error::Invalid(_))));

		let mut v = base();
		v["network"]["channel"] = serde_json::json!(10);
		assert!(matches!(parse(v), Err(Error::Invalid(_))));
	}

	#[test]
	fn bad_pan_id_rejected() {
		for pan in [0x0000u16, 0xFFFF] {
			let mut v = base();
			v["network"]["pan_id"] = serde_json::json!(pan);
			assert!(matches!(parse(v), Err(Error::Invalid(_))));
		}
	}

	#[test]
	fn empty_port_rejected() {
		let mut v = base();
		v["ncp"]["port"] = serde_json::json!("");
		assert!(matches!(parse(v), Err(Error::Invalid(_))));
	}

	#[test]
	fn bad_ext_pan_rejected() {
		let mut v = base();
		v["network"]["extended_pan_id"] = serde_json::json!("nope");
		assert!(matches!(parse(v), Err(Error::Invalid(_))));
	}
}
