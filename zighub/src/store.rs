//transactional device/network persistence: one json file with two keyspaces,
//rewritten atomically on every mutation

use std::collections::BTreeMap;
use std::path::{ Path, PathBuf };
use std::sync::Mutex;
use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use zigbee::value::Value;
use crate::ieee::Ieee;

#[derive(Debug)]
pub enum Error {
	NotFound,
	Io(std::io::Error),
	Json(serde_json::Error),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::NotFound => write!(f, "not found"),
			Self::Io(e) => e.fmt(f),
			Self::Json(e) => e.fmt(f),
		}
	}
}

impl std::error::Error for Error {}

impl Error {
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound)
	}
}

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

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Endpoint {
	pub id: u8,
	pub profile_id: u16,
	pub device_id: u16,
	pub in_clusters: Vec<u16>,
	pub out_clusters: Vec<u16>,
}

impl Endpoint {
	pub fn has_in_cluster(&self, cluster: u16) -> bool {
		self.in_clusters.contains(&cluster)
	}

	pub fn has_out_cluster(&self, cluster: u16) -> bool {
		self.out_clusters.contains(&cluster)
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
	pub ieee_address: Ieee,
	pub short_address: u16,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub manufacturer: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub model: String,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub friendly_name: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub endpoints: Vec<Endpoint>,
	#[serde(default)]
	pub interviewed: bool,
	pub joined_at: DateTime<Utc>,
	pub last_seen: DateTime<Utc>,
	#[serde(default)]
	pub lqi: u8,
	#[serde(default)]
	pub rssi: i8,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	pub properties: BTreeMap<String, Value>,
}

impl Device {
	pub fn new(ieee: Ieee, short_address: u16) -> Self {
		let now = Utc::now();
		Self {
			ieee_address: ieee,
			short_address,
			manufacturer: String::new(),
			model: String::new(),
			friendly_name: String::new(),
			endpoints: Vec::new(),
			interviewed: false,
			joined_at: now,
			last_seen: now,
			lqi: 0,
			rssi: 0,
			properties: BTreeMap::new(),
		}
	}

	///Display name: friendly name, else "Manufacturer Model", else empty.
	pub fn display_name(&self) -> String {
		if !self.friendly_name.is_empty() {
			return self.friendly_name.clone();
		}
		match (self.manufacturer.is_empty(), self.model.is_empty()) {
			(false, false) => format!("{} {}", self.manufacturer, self.model),
			(false, true) => self.manufacturer.clone(),
			(true, false) => self.model.clone(),
			(true, true) => String::new(),
		}
	}
}

///Network state as exposed to callers; the key never serializes here.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NetworkState {
	pub channel: u8,
	pub pan_id: u16,
	pub ext_pan_id: String,
	#[serde(skip_serializing)]
	pub network_key: Option<String>,
	pub formed: bool,
}

//storage twin that persists the network key on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkStateStorage {
	channel: u8,
	pan_id: u16,
	ext_pan_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	network_key: Option<String>,
	formed: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DbFile {
	#[serde(default)]
	devices: BTreeMap<Ieee, Device>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	network: Option<NetworkStateStorage>,
}

pub struct Store {
	path: PathBuf,
	inner: Mutex<DbFile>,
}

impl Store {
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
		let path = path.as_ref().to_path_buf();
		let inner = match std::fs::read(&path) {
			Ok(data) => serde_json::from_slice(&data)?,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => DbFile::default(),
			Err(e) => return Err(Error::Io(e)),
		};
		Ok(Self { path, inner: Mutex::new(inner) })
	}

	//write-all-then-rename so a crash never leaves a half-written db
	fn flush(&self, db: &DbFile) -> Result<(), Error> {
		let data = serde_json::to_vec_pretty(db)?;
		let tmp = self.path.with_extension("tmp");
		std::fs::write(&tmp, data)?;
		std::fs::rename(&tmp, &self.path)?;
		Ok(())
	}

	pub fn save_device(&self, dev: &Device) -> Result<(), Error> {
		let mut db = self.inner.lock().unwrap();
		db.devices.insert(dev.ieee_address, dev.clone());
		self.flush(&db)
	}

	pub fn get_device(&self, ieee: Ieee) -> Result<Device, Error> {
		let db = self.inner.lock().unwrap();
		db.devices.get(&ieee).cloned().ok_or(Error::NotFound)
	}

	pub fn delete_device(&self, ieee: Ieee) -> Result<(), Error> {
		let mut db = self.inner.lock().unwrap();
		db.devices.remove(&ieee);
		self.flush(&db)
	}

	pub fn list_devices(&self) -> Result<Vec<Device>, Error> {
		let db = self.inner.lock().unwrap();
		Ok(db.devices.values().cloned().collect())
	}

	///Atomic read-modify-write under one lock acquisition.
	pub fn update_device<F: FnOnce(&mut Device)>(&self, ieee: Ieee, mutate: F) -> Result<(), Error> {
		let mut db = self.inner.lock().unwrap();
		let dev = db.devices.get_mut(&ieee).ok_or(Error::NotFound)?;
		mutate(dev);
		self.flush(&db)
	}

	pub fn save_network_state(&self, state: &NetworkState) -> Result<(), Error> {
		let mut db = self.inner.lock().unwrap();
		db.network = Some(NetworkStateStorage {
			channel: state.channel,
			pan_id: state.pan_id,
			ext_pan_id: state.ext_pan_id.clone(),
			network_key: state.network_key.clone(),
			formed: state.formed,
		});
		self.flush(&db)
	}

	pub fn get_network_state(&self) -> Result<NetworkState, Error> {
		let db = self.inner.lock().unwrap();
		let st = db.network.as_ref().ok_or(Error::NotFound)?;
		Ok(NetworkState {
			channel: st.channel,
			pan_id: st.pan_id,
			ext_pan_id: st.ext_pan_id.clone(),
			network_key: st.network_key.clone(),
			formed: st.formed,
		})
	}

	pub fn close(&self) -> Result<(), Error> {
		let db = self.inner.lock().unwrap();
		self.flush(&db)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{ AtomicU32, Ordering };

	static SEQ: AtomicU32 = AtomicU32::new(0);

	fn temp_store() -> (Store, PathBuf) {
		let path = std::env::temp_dir().join(format!(
			"zighub-store-test-{}-{}.json",
			std::process::id(),
			SEQ.fetch_add(1, Ordering::SeqCst)
		));
		let _ = std::fs::remove_file(&path);
		(Store::open(&path).unwrap(), path)
	}

	fn ieee(s: &str) -> Ieee {
		s.parse().unwrap()
	}

	#[test]
	fn save_get_delete_device() {
		let (store, path) = temp_store();
		let addr = ieee("00158D00012A3B4C");

		assert!(store.get_device(addr).unwrap_err().is_not_found());

		let mut dev = Device::new(addr, 0x1234);
		dev.model = "lumi.sensor_magnet.aq2".to_string();
		store.save_device(&dev).unwrap();

		let got = store.get_device(addr).unwrap();
		assert_eq!(got.short_address, 0x1234);
		assert_eq!(got.model, "lumi.sensor_magnet.aq2");

		store.delete_device(addr).unwrap();
		assert!(store.get_device(addr).unwrap_err().is_not_found());

		let _ = std::fs::remove_file(path);
	}

	#[test]
	fn persists_across_reopen() {
		let (store, path) = temp_store();
		let addr = ieee("AABBCCDD00112233");

		let mut dev = Device::new(addr, 0x0001);
		dev.properties.insert("on_off".to_string(), Value::Bool(true));
		dev.endpoints.push(Endpoint {
			id: 1,
			profile_id: 0x0104,
			device_id: 0x0402,
			in_clusters: vec![0x0000, 0x0006],
			out_clusters: vec![0x0019],
		});
		store.save_device(&dev).unwrap();
		store.close().unwrap();
		drop(store);

		let store = Store::open(&path).unwrap();
		let got = store.get_device(addr).unwrap();
		assert_eq!(got.properties["on_off"], Value::Bool(true));
		assert_eq!(got.endpoints.len(), 1);
		assert!(got.endpoints[0].has_in_cluster(0x0006));
		assert!(!got.endpoints[0].has_out_cluster(0x0006));

		let _ = std::fs::remove_file(path);
	}

	#[test]
	fn update_device_is_atomic_read_modify_write() {
		let (store, path) = temp_store();
		let addr = ieee("0000000000000001");

		store.save_device(&Device::new(addr, 1)).unwrap();
		store.update_device(addr, |d| {
			d.properties.insert("battery".to_string(), Value::Int(95));
			d.properties.insert("contact".to_string(), Value::Bool(false));
		}).unwrap();

		let got = store.get_device(addr).unwrap();
		assert_eq!(got.properties.len(), 2);

		assert!(store.update_device(ieee("00000000000000FF"), |_| {}).unwrap_err().is_not_found());

		let _ = std::fs::remove_file(path);
	}

	#[test]
	fn network_state_round_trip_hides_key_from_public_json() {
		let (store, path) = temp_store();

		assert!(store.get_network_state().unwrap_err().is_not_found());

		store.save_network_state(&NetworkState {
			channel: 15,
			pan_id: 0x1A62,
			ext_pan_id: "DDCCBBAA00112233".to_string(),
			network_key: Some("00112233445566778899AABBCCDDEEFF".to_string()),
			formed: true,
		}).unwrap();

		let st = store.get_network_state().unwrap();
		assert_eq!(st.channel, 15);
		assert!(st.formed);
		assert_eq!(st.network_key.as_deref(), Some("00112233445566778899AABBCCDDEEFF"));

		//the key must survive on disk (internal representation only)
		let raw = std::fs::read_to_string(&path).unwrap();
		assert!(raw.contains("network_key"));

		//but never cross the public serialization boundary
		let public = serde_json::to_string(&st).unwrap();
		assert!(!public.contains("network_key"));

		let _ = std::fs::remove_file(path);
	}

	#[test]
	fn display_name_preference() {
		let mut dev = Device::new(ieee("0000000000000002"), 2);
		assert_eq!(dev.display_name(), "");

		dev.manufacturer = "LUMI".to_string();
		dev.model = "lumi.sensor_magnet.aq2".to_string();
		assert_eq!(dev.display_name(), "LUMI lumi.sensor_magnet.aq2");

		dev.friendly_name = "Aqara Door Sensor".to_string();
		assert_eq!(dev.display_name(), "Aqara Door Sensor");
	}
}
