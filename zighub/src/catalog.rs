//device definition catalog: per-model bind/reporting/property rules loaded
//from a directory of json files, plus cluster overlays for the registry

use std::collections::HashMap;
use std::path::Path;
use serde::Deserialize;
use tracing::info;
use zigbee::registry::{ ClusterDef, Registry };

#[derive(Debug)]
pub enum Error {
	Io(std::path::PathBuf, std::io::Error),
	Json(std::path::PathBuf, serde_json::Error),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Io(p, e) => write!(f, "read {}: {}", p.display(), e),
			Self::Json(p, e) => write!(f, "parse {}: {}", p.display(), e),
		}
	}
}

impl std::error::Error for Error {}

///A single named property extracted from a decoded vendor attribute.
#[derive(Debug, Clone, Deserialize)]
pub struct PropertyDef {
	pub tag: u8,
	pub name: String,
	#[serde(default)]
	pub transform: String,
}

///A proprietary attribute carrying multiple sub-values and the decoder that
///unpacks it ("xiaomi_tlv", "tuya_dp").
#[derive(Debug, Clone, Deserialize)]
pub struct PropertySpec {
	pub cluster: u16,
	#[serde(default)]
	pub attribute: u16,
	pub decoder: String,
	pub values: Vec<PropertyDef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReportingEntry {
	pub cluster: u16,
	pub attribute: u16,
	#[serde(rename = "type")]
	pub type_id: u8,
	pub min: u16,
	pub max: u16,
	#[serde(default)]
	pub change: u32,
}

impl ReportingEntry {
	///Reportable-change wire bytes: one byte when it fits, two LE otherwise.
	pub fn change_bytes(&self) -> Vec<u8> {
		if self.change > 255 {
			vec![self.change as u8, (self.change >> 8) as u8]
		}
		else {
			vec![self.change as u8]
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDefinition {
	#[serde(default)]
	pub manufacturer: String,
	pub model: String,
	#[serde(default)]
	pub friendly_name: String,
	#[serde(default)]
	pub bind: Vec<u16>,
	#[serde(default)]
	pub reporting: Vec<ReportingEntry>,
	#[serde(default)]
	pub properties: Vec<PropertySpec>,
}

///Models grouped under one manufacturer name.
#[derive(Debug, Clone, Deserialize)]
pub struct ManufacturerGroup {
	pub name: String,
	pub models: Vec<DeviceDefinition>,
}

#[derive(Debug, Deserialize)]
struct DeviceFile {
	#[serde(default)]
	clusters: Vec<ClusterDef>,
	#[serde(default)]
	devices: Vec<DeviceDefinition>,
	#[serde(default)]
	manufacturers: Vec<ManufacturerGroup>,
}

///Device definitions keyed by manufacturer + model.
#[derive(Default)]
pub struct DeviceDb {
	defs: HashMap<(String, String), DeviceDefinition>,
}

impl DeviceDb {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn add(&mut self, def: DeviceDefinition) {
		self.defs.insert((def.manufacturer.clone(), def.model.clone()), def);
	}

	pub fn lookup(&self, manufacturer: &str, model: &str) -> Option<&DeviceDefinition> {
		self.defs.get(&(manufacturer.to_string(), model.to_string()))
	}

	pub fn len(&self) -> usize {
		self.defs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.defs.is_empty()
	}
}

///Load every *.json file in dir: cluster overlays merge into the registry,
///device entries land in the returned db. A missing or empty directory is
///fine, it just yields an empty db.
pub fn load_device_dir<P: AsRef<Path>>(dir: P, registry: &Registry) -> Result<DeviceDb, Error> {
	let mut db = DeviceDb::new();

	let entries = match std::fs::read_dir(dir.as_ref()) {
		Ok(e) => e,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			info!(dir = %dir.as_ref().display(), "no device definition directory");
			return Ok(db);
		},
		Err(e) => return Err(Error::Io(dir.as_ref().to_path_buf(), e)),
	};

	let mut paths: Vec<_> = entries
		.filter_map(|e| e.ok())
		.map(|e| e.path())
		.filter(|p| p.extension().map_or(false, |ext| ext == "json"))
		.collect();
	paths.sort();

	for path in &paths {
		let data = std::fs::read_to_string(path).map_err(|e| Error::Io(path.clone(), e))?;
		let df: DeviceFile = serde_json::from_str(&data).map_err(|e| Error::Json(path.clone(), e))?;

		for c in &df.clusters {
			registry.register(c.clone());
		}
		let mut device_count = df.devices.len();
		for d in df.devices {
			db.add(d);
		}
		for mg in df.manufacturers {
			device_count += mg.models.len();
			for mut d in mg.models {
				d.manufacturer = mg.name.clone();
				db.add(d);
			}
		}

		info!(file = %path.display(), clusters = df.clusters.len(), devices = device_count, "loaded device file");
	}

	info!(files = paths.len(), devices = db.len(), "device database loaded");
	Ok(db)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{ AtomicU32, Ordering };

	static SEQ: AtomicU32 = AtomicU32::new(0);

	fn temp_dir() -> std::path::PathBuf {
		let dir = std::env::temp_dir().join(format!(
			"zighub-catalog-test-{}-{}",
			std::process::id(),
			SEQ.fetch_add(1, Ordering::SeqCst)
		));
		std::fs::create_dir_all(&dir).unwrap();
		dir
	}

	const AQARA_JSON: &str = r#"{
		"clusters": [
			{ "id": 0, "name": "Basic", "attributes": [
				{ "id": 65281, "name": "XiaomiReport", "type": 66, "access": 1 }
			]}
		],
		"manufacturers": [
			{ "name": "LUMI", "models": [
				{
					"model": "lumi.sensor_magnet.aq2",
					"friendly_name": "Aqara Door Sensor",
					"bind": [6],
					"reporting": [
						{ "cluster": 1, "attribute": 33, "type": 32, "min": 3600, "max": 14400, "change": 1 }
					],
					"properties": [
						{ "cluster": 0, "attribute": 65281, "decoder": "xiaomi_tlv", "values": [
							{ "tag": 1, "name": "battery_voltage" },
							{ "tag": 1, "name": "battery", "transform": "lumi_battery" },
							{ "tag": 100, "name": "contact" }
						]}
					]
				}
			]}
		]
	}"#;

	#[test]
	fn load_dir_merges_clusters_and_devices() {
		let dir = temp_dir();
		std::fs::write(dir.join("aqara.json"), AQARA_JSON).unwrap();

		let registry = Registry::new();
		registry.register(ClusterDef { id: 0, name: "Basic".into(), attributes: vec![], commands: vec![] });

		let db = load_device_dir(&dir, &registry).unwrap();
		assert_eq!(db.len(), 1);

		let def = db.lookup("LUMI", "lumi.sensor_magnet.aq2").unwrap();
		assert_eq!(def.friendly_name, "Aqara Door Sensor");
		assert_eq!(def.bind, vec![6]);
		assert_eq!(def.reporting.len(), 1);
		assert_eq!(def.properties[0].decoder, "xiaomi_tlv");
		assert_eq!(def.properties[0].values.len(), 3);

		//cluster overlay merged into the registry
		let basic = registry.get(0).unwrap();
		assert_eq!(basic.name, "Basic");
		assert_eq!(basic.find_attribute(65281).unwrap().name, "XiaomiReport");

		let _ = std::fs::remove_dir_all(dir);
	}

	#[test]
	fn missing_dir_yields_empty_db() {
		let registry = Registry::new();
		let db = load_device_dir("/definitely/not/a/real/dir", &registry).unwrap();
		assert!(db.is_empty());
	}

	#[test]
	fn unknown_model_lookup_is_none() {
		let db = DeviceDb::new();
		assert!(db.lookup("LUMI", "nonexistent").is_none());
	}

	#[test]
	fn change_bytes_width() {
		let small = ReportingEntry { cluster: 1, attribute: 33, type_id: 0x20, min: 0, max: 0, change: 5 };
		assert_eq!(small.change_bytes(), vec![5]);

		let wide = ReportingEntry { cluster: 0x0402, attribute: 0, type_id: 0x29, min: 0, max: 0, change: 300 };
		assert_eq!(wide.change_bytes(), vec![0x2C, 0x01]);
	}
}
