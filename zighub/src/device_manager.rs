//device lifecycle: join/leave/announce handling, the interview state machine,
//attribute report dispatch and property extraction

use std::collections::HashMap;
use std::sync::atomic::{ AtomicBool, AtomicU64, Ordering };
use std::sync::{ Arc, Mutex, RwLock };
use std::time::{ Duration, Instant };
use async_std::task::{ self, JoinHandle };
use chrono::Utc;
use rand::Rng;
use tracing::{ debug, error, info, warn };
use zigbee::registry::Registry;
use zigbee::value::Value;
use zigbee::{ tuya, vendor, zcl };
use crate::catalog::{ DeviceDb, DeviceDefinition, PropertySpec };
use crate::events::{ Event, EventBus, PropertySource };
use crate::ieee::Ieee;
use crate::ncp::{
	AttributeReportEvent, BindRequest, ClusterCommandEvent, ConfigureReportingRequest,
	DeviceAnnounceEvent, DeviceJoinedEvent, DeviceLeftEvent, Ncp, ReadAttributesRequest,
};
use crate::store::{ Device, Store };

const STEP_TIMEOUT: Duration = Duration::from_secs(5);
const INTERVIEW_DEADLINE: Duration = Duration::from_secs(180);
const INTERVIEW_ATTEMPTS: u32 = 3;
const RETRY_BASE_DELAY: Duration = Duration::from_secs(5);
const DEBOUNCE_WINDOW: Duration = Duration::from_secs(3);
const DEBOUNCE_CAP: usize = 50;
const DEBOUNCE_STALE: Duration = Duration::from_secs(60);
const MGMT_LEAVE_TIMEOUT: Duration = Duration::from_secs(10);

struct InterviewEntry {
	cancel: Arc<AtomicBool>,
	gen: u64,
}

pub struct DeviceManager {
	ncp: Arc<Ncp>,
	store: Arc<Store>,
	registry: Arc<Registry>,
	device_db: Arc<DeviceDb>,
	events: Arc<EventBus>,
	local_ieee: Arc<Mutex<Ieee>>,
	retry_jitter_ms: u64,

	interview_cancels: Mutex<HashMap<Ieee, InterviewEntry>>,
	interview_gen: AtomicU64,
	interview_handles: Mutex<HashMap<u64, JoinHandle<()>>>,

	//suppresses duplicate interviews from rapid announce bursts
	last_join: Mutex<HashMap<Ieee, Instant>>,

	//short -> ieee cache, rebuilt from the store on miss
	addr_index: RwLock<HashMap<u16, Ieee>>,
}

impl DeviceManager {
	pub fn new(
		ncp: Arc<Ncp>,
		store: Arc<Store>,
		registry: Arc<Registry>,
		device_db: Arc<DeviceDb>,
		events: Arc<EventBus>,
		local_ieee: Arc<Mutex<Ieee>>,
		retry_jitter_ms: u64,
	) -> Arc<Self> {
		let dm = Arc::new(Self {
			ncp,
			store,
			registry,
			device_db,
			events,
			local_ieee,
			retry_jitter_ms,
			interview_cancels: Mutex::new(HashMap::new()),
			interview_gen: AtomicU64::new(0),
			interview_handles: Mutex::new(HashMap::new()),
			last_join: Mutex::new(HashMap::new()),
			addr_index: RwLock::new(HashMap::new()),
		});
		dm.rebuild_addr_index();
		dm
	}

	//--- address index ---

	pub fn rebuild_addr_index(&self) {
		let devices = match self.store.list_devices() {
			Ok(d) => d,
			Err(e) => {
				error!(err = %e, "rebuild addr index");
				return;
			}
		};
		let mut index = self.addr_index.write().unwrap();
		index.clear();
		for d in devices {
			index.insert(d.short_address, d.ieee_address);
		}
	}

	fn update_addr_index(&self, ieee: Ieee, short_addr: u16) {
		self.addr_index.write().unwrap().insert(short_addr, ieee);
	}

	fn remove_from_addr_index_by_ieee(&self, ieee: Ieee) {
		let mut index = self.addr_index.write().unwrap();
		index.retain(|_, stored| *stored != ieee);
	}

	pub fn lookup_ieee(&self, short_addr: u16) -> Option<Ieee> {
		self.addr_index.read().unwrap().get(&short_addr).copied()
	}

	///Read-locked fast path; on miss rebuild from the store under the write
	///lock with a double-check. Covers rejoins that changed the short address.
	pub fn lookup_or_rebuild(&self, short_addr: u16) -> Option<Ieee> {
		if let Some(ieee) = self.lookup_ieee(short_addr) {
			return Some(ieee);
		}

		let mut index = self.addr_index.write().unwrap();
		if let Some(ieee) = index.get(&short_addr) {
			return Some(*ieee);
		}

		let devices = match self.store.list_devices() {
			Ok(d) => d,
			Err(e) => {
				error!(err = %e, "rebuild addr index for lookup");
				return None;
			}
		};
		index.clear();
		let mut found = None;
		for d in devices {
			index.insert(d.short_address, d.ieee_address);
			if d.short_address == short_addr {
				found = Some(d.ieee_address);
			}
		}
		found
	}

	///A device changed its short address; drop the cache so the next lookup
	///rebuilds it from the store.
	pub fn invalidate_addr_index(&self) {
		self.addr_index.write().unwrap().clear();
	}

	//--- join / leave / announce ---

	pub fn handle_join(&self, evt: DeviceJoinedEvent) {
		let ieee = Ieee::from_wire(evt.ieee);

		self.update_addr_index(ieee, evt.short_addr);

		//rejoin keeps interview data, only the address and last_seen move
		let dev = match self.store.get_device(ieee) {
			Ok(mut dev) => {
				dev.short_address = evt.short_addr;
				dev.last_seen = Utc::now();
				dev
			},
			Err(_) => Device::new(ieee, evt.short_addr),
		};

		info!(ieee = %ieee, short = %format_args!("{:#06X}", evt.short_addr), name = %dev.display_name(), "device joined");

		if let Err(e) = self.store.save_device(&dev) {
			error!(err = %e, ieee = %ieee, "save device");
			return;
		}

		self.events.emit(&Event::DeviceJoined { ieee, short_addr: evt.short_addr });

		//no interview yet: DevUpdateInd fires before the TC key exchange
		//finishes, the device cannot answer zdo requests until DevAnnceInd
	}

	pub fn handle_leave(&self, evt: DeviceLeftEvent) {
		let ieee = Ieee::from_wire(evt.ieee);
		let name = self.store.get_device(ieee).map(|d| d.display_name()).unwrap_or_default();
		info!(ieee = %ieee, name = %name, "device left");

		self.cancel_interview(ieee);

		self.last_join.lock().unwrap().remove(&ieee);

		//by ieee: NwkLeaveInd carries short=0
		self.remove_from_addr_index_by_ieee(ieee);

		match self.store.delete_device(ieee) {
			Ok(()) => info!(ieee = %ieee, name = %name, "device removed from store"),
			Err(e) => error!(err = %e, ieee = %ieee, "delete device on leave"),
		}

		self.events.emit(&Event::DeviceLeft { ieee });
	}

	pub fn handle_announce(self: Arc<Self>, evt: DeviceAnnounceEvent) {
		let ieee = Ieee::from_wire(evt.ieee);

		self.update_addr_index(ieee, evt.short_addr);

		let mut dev = match self.store.get_device(ieee) {
			Ok(dev) => dev,
			Err(e) if e.is_not_found() => Device::new(ieee, evt.short_addr),
			Err(e) => {
				//real db trouble, do not fabricate a fresh record over it
				error!(err = %e, ieee = %ieee, "get device on announce");
				return;
			}
		};
		dev.short_address = evt.short_addr;
		dev.last_seen = Utc::now();

		info!(ieee = %ieee, short = %format_args!("{:#06X}", evt.short_addr), name = %dev.display_name(), "device announce");

		if let Err(e) = self.store.save_device(&dev) {
			error!(err = %e, ieee = %ieee, "save device on announce");
		}

		self.events.emit(&Event::DeviceAnnounce { ieee, short_addr: evt.short_addr });

		//announce means the key exchange succeeded and zdo will work now
		if self.interview_cancels.lock().unwrap().contains_key(&ieee) {
			info!(ieee = %ieee, short = %format_args!("{:#06X}", evt.short_addr), "announce during interview, address updated");
			return;
		}

		{
			let mut last_join = self.last_join.lock().unwrap();
			if let Some(last) = last_join.get(&ieee) {
				if last.elapsed() < DEBOUNCE_WINDOW {
					debug!(ieee = %ieee, "duplicate announce, interview already started");
					return;
				}
			}
			last_join.insert(ieee, Instant::now());
			if last_join.len() > DEBOUNCE_CAP {
				last_join.retain(|_, t| t.elapsed() <= DEBOUNCE_STALE);
			}
		}

		self.spawn_interview(ieee);
	}

	//--- interview ---

	pub fn spawn_interview(self: Arc<Self>, ieee: Ieee) {
		let dm = self.clone();
		let gen = self.interview_gen.fetch_add(1, Ordering::SeqCst) + 1;
		let handle = task::spawn(async move {
			dm.interview(ieee, gen).await;
		});
		self.interview_handles.lock().unwrap().insert(gen, handle);
	}

	fn cancel_interview(&self, ieee: Ieee) {
		let mut cancels = self.interview_cancels.lock().unwrap();
		if let Some(entry) = cancels.remove(&ieee) {
			entry.cancel.store(true, Ordering::SeqCst);
		}
	}

	///Cancel everything in flight and wait for the workers to finish.
	pub async fn cancel_all_interviews(&self) {
		{
			let mut cancels = self.interview_cancels.lock().unwrap();
			for (_, entry) in cancels.drain() {
				entry.cancel.store(true, Ordering::SeqCst);
			}
		}
		let handles: Vec<JoinHandle<()>> = {
			let mut h = self.interview_handles.lock().unwrap();
			h.drain().map(|(_, handle)| handle).collect()
		};
		for handle in handles {
			handle.await;
		}
	}

	async fn interview(self: Arc<Self>, ieee: Ieee, gen: u64) {
		let cancel = Arc::new(AtomicBool::new(false));
		{
			let mut cancels = self.interview_cancels.lock().unwrap();
			//a newer interview pre-empts the old one
			if let Some(prev) = cancels.insert(ieee, InterviewEntry { cancel: cancel.clone(), gen }) {
				prev.cancel.store(true, Ordering::SeqCst);
			}
		}

		let deadline = Instant::now() + INTERVIEW_DEADLINE;
		self.run_interview(ieee, &cancel, deadline).await;

		{
			let mut cancels = self.interview_cancels.lock().unwrap();
			if cancels.get(&ieee).map_or(false, |e| e.gen == gen) {
				cancels.remove(&ieee);
			}
		}
		self.interview_handles.lock().unwrap().remove(&gen);
	}

	fn step_timeout(deadline: Instant) -> Duration {
		deadline.saturating_duration_since(Instant::now()).min(STEP_TIMEOUT)
	}

	async fn run_interview(&self, ieee: Ieee, cancel: &AtomicBool, deadline: Instant) {
		for attempt in 1..=INTERVIEW_ATTEMPTS {
			if cancel.load(Ordering::SeqCst) || Instant::now() >= deadline {
				return;
			}

			//re-read each attempt so a rejoin-changed short address is used
			let mut dev = match self.store.get_device(ieee) {
				Ok(dev) => dev,
				Err(_) => {
					error!(ieee = %ieee, "interview: device not found");
					return;
				}
			};

			let name = dev.display_name();
			info!(ieee = %ieee, name = %name, short = %format_args!("{:#06X}", dev.short_address), attempt, "starting interview");

			let endpoints = match self.ncp.active_endpoints(dev.short_address, Self::step_timeout(deadline)).await {
				Ok(eps) => eps,
				Err(e) => {
					//sleepy devices miss the first request regularly
					warn!(err = %e, ieee = %ieee, name = %name, attempt, "interview: active endpoints failed");
					if Instant::now() >= deadline || cancel.load(Ordering::SeqCst) {
						return;
					}
					if attempt < INTERVIEW_ATTEMPTS {
						let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=self.retry_jitter_ms));
						let delay = RETRY_BASE_DELAY + jitter;
						info!(ieee = %ieee, delay = ?delay, "interview: will retry");
						if !self.cancellable_sleep(delay, cancel, deadline).await {
							return;
						}
					}
					continue;
				}
			};

			//model and manufacturer first so logs carry the real name
			if let Some(ep0) = endpoints.first() {
				self.read_basic_attributes(&mut dev, *ep0, deadline).await;
			}

			let def = self.device_db.lookup(&dev.manufacturer, &dev.model);

			if let Some(def) = def {
				if !def.friendly_name.is_empty() {
					dev.friendly_name = def.friendly_name.clone();
				}
			}
			if dev.friendly_name.is_empty() && !dev.model.is_empty() {
				dev.friendly_name = dev.model.clone();
			}
			let name = dev.display_name();

			dev.endpoints.clear();
			for ep in &endpoints {
				if cancel.load(Ordering::SeqCst) || Instant::now() >= deadline {
					return;
				}
				match self.ncp.simple_descriptor(dev.short_address, *ep, Self::step_timeout(deadline)).await {
					Ok(sd) => {
						info!(
							ieee = %ieee, name = %name, ep = sd.endpoint,
							profile = %format_args!("{:#06X}", sd.profile_id),
							device = %format_args!("{:#06X}", sd.device_id),
							in_clusters = sd.in_clusters.len(),
							out_clusters = sd.out_clusters.len(),
							"endpoint discovered"
						);
						dev.endpoints.push(crate::store::Endpoint {
							id: sd.endpoint,
							profile_id: sd.profile_id,
							device_id: sd.device_id,
							in_clusters: sd.in_clusters,
							out_clusters: sd.out_clusters,
						});
					},
					Err(e) => {
						warn!(err = %e, ieee = %ieee, name = %name, ep, "interview: simple descriptor");
					}
				}
			}

			//bind and configure reporting while the device is still awake
			match def {
				Some(def) => self.configure_device(&dev, def, deadline).await,
				None => {
					info!(
						ieee = %ieee, name = %name,
						manufacturer = %dev.manufacturer, model = %dev.model,
						"no device definition found, skipping configure"
					);
				}
			}

			dev.interviewed = true;
			if let Err(e) = self.store.save_device(&dev) {
				error!(err = %e, ieee = %ieee, name = %name, "interview: save");
			}
			info!(ieee = %ieee, name = %name, endpoints = dev.endpoints.len(), attempt, "interview complete");
			return;
		}

		error!(ieee = %ieee, attempts = INTERVIEW_ATTEMPTS, "interview failed after retries");
	}

	///Sleep in small slices so cancellation and the deadline stay responsive.
	///Returns false when interrupted.
	async fn cancellable_sleep(&self, total: Duration, cancel: &AtomicBool, deadline: Instant) -> bool {
		let until = Instant::now() + total;
		while Instant::now() < until {
			if cancel.load(Ordering::SeqCst) || Instant::now() >= deadline {
				return false;
			}
			let left = until.saturating_duration_since(Instant::now());
			task::sleep(left.min(Duration::from_millis(100))).await;
		}
		true
	}

	async fn read_basic_attributes(&self, dev: &mut Device, endpoint: u8, deadline: Instant) {
		let results = match self.ncp.read_attributes(ReadAttributesRequest {
			dst_addr: dev.short_address,
			dst_ep: endpoint,
			cluster_id: 0x0000,
			attr_ids: vec![0x0004, 0x0005],
		}, Self::step_timeout(deadline)).await {
			Ok(r) => r,
			Err(e) => {
				warn!(err = %e, "read basic attributes");
				return;
			}
		};

		for r in results {
			if r.status != 0 || r.value.is_empty() {
				continue;
			}
			let Ok((Some(val), _)) = zcl::decode(r.data_type, &r.value) else { continue; };
			if let Value::Str(s) = val {
				match r.attr_id {
					0x0004 => dev.manufacturer = s,
					0x0005 => dev.model = s,
					_ => {}
				}
			}
		}
	}

	async fn configure_device(&self, dev: &Device, def: &DeviceDefinition, deadline: Instant) {
		if dev.endpoints.is_empty() {
			return;
		}
		let name = dev.display_name();
		let coord_ieee = self.local_ieee.lock().unwrap().to_wire();
		let dev_ieee = dev.ieee_address.to_wire();

		for ep in &dev.endpoints {
			//bindings only for clusters the endpoint actually emits
			for cluster in &def.bind {
				if !ep.has_out_cluster(*cluster) {
					continue;
				}
				let result = self.ncp.bind(BindRequest {
					target_short_addr: dev.short_address,
					src_ieee: dev_ieee,
					src_ep: ep.id,
					cluster_id: *cluster,
					dst_ieee: coord_ieee,
					dst_ep: 1,
				}, Self::step_timeout(deadline)).await;
				match result {
					Ok(()) => info!(name = %name, ep = ep.id, cluster = %format_args!("{:#06X}", cluster), "bound cluster"),
					Err(e) => warn!(err = %e, name = %name, ep = ep.id, cluster = %format_args!("{:#06X}", cluster), "configure: bind"),
				}
			}

			for r in &def.reporting {
				if !ep.has_in_cluster(r.cluster) {
					continue;
				}
				let result = self.ncp.configure_reporting(ConfigureReportingRequest {
					dst_addr: dev.short_address,
					dst_ep: ep.id,
					cluster_id: r.cluster,
					attr_id: r.attribute,
					data_type: r.type_id,
					min_interval: r.min,
					max_interval: r.max,
					report_change: r.change_bytes(),
				}, Self::step_timeout(deadline)).await;
				match result {
					Ok(()) => info!(
						name = %name, ep = ep.id,
						cluster = %format_args!("{:#06X}", r.cluster),
						attr = %format_args!("{:#06X}", r.attribute),
						"configured reporting"
					),
					Err(e) => warn!(
						err = %e, name = %name, ep = ep.id,
						cluster = %format_args!("{:#06X}", r.cluster),
						attr = %format_args!("{:#06X}", r.attribute),
						"configure: reporting"
					),
				}
			}
		}
	}

	//--- attribute reports ---

	pub fn handle_attribute_report(&self, evt: AttributeReportEvent) {
		let ieee = self.lookup_or_rebuild(evt.src_addr);

		let decoded = if evt.value.is_empty() {
			None
		}
		else {
			match zcl::decode(evt.data_type, &evt.value) {
				Ok((v, _)) => v,
				//keep the raw hex around rather than dropping the report
				Err(_) => Some(Value::Str(hex::encode_upper(&evt.value))),
			}
		};

		let mut cluster_name = format!("{:#06X}", evt.cluster_id);
		let mut attr_name = format!("{:#06X}", evt.attr_id);
		if let Some(cluster) = self.registry.get(evt.cluster_id) {
			cluster_name = cluster.name.clone();
			if let Some(attr) = cluster.find_attribute(evt.attr_id) {
				attr_name = attr.name.clone();
			}
		}

		let mut dev = None;
		if let Some(ieee) = ieee {
			if let Ok(mut d) = self.store.get_device(ieee) {
				d.last_seen = Utc::now();
				if evt.lqi > 0 {
					d.lqi = evt.lqi;
					d.rssi = evt.rssi;
				}
				if let Err(e) = self.store.save_device(&d) {
					error!(err = %e, ieee = %ieee, "save device last_seen");
				}
				dev = Some(d);
			}
		}

		info!(
			ieee = %ieee.map(|i| i.to_string()).unwrap_or_default(),
			name = %dev.as_ref().map(|d| d.display_name()).unwrap_or_default(),
			cluster = %cluster_name,
			attr = %attr_name,
			value = %decoded.as_ref().map(|v| v.to_string()).unwrap_or_default(),
			"attribute report"
		);

		self.events.emit(&Event::AttributeReport {
			ieee,
			short_addr: evt.src_addr,
			endpoint: evt.src_ep,
			cluster_id: evt.cluster_id,
			cluster_name,
			attr_id: evt.attr_id,
			attr_name,
			value: decoded.clone(),
		});

		self.emit_standard_property(ieee, dev.as_mut(), &evt, decoded.as_ref());

		if let (Some(ieee), Some(dev)) = (ieee, dev.as_ref()) {
			self.process_properties(ieee, dev, evt.cluster_id, evt.attr_id, decoded.as_ref());
		}
	}

	fn emit_standard_property(&self, ieee: Option<Ieee>, dev: Option<&mut Device>, evt: &AttributeReportEvent, decoded: Option<&Value>) {
		let (Some(ieee), Some(decoded)) = (ieee, decoded) else { return; };
		let Some(prop_name) = standard_property(evt.cluster_id, evt.attr_id) else { return; };

		if let Some(dev) = dev {
			dev.properties.insert(prop_name.to_string(), decoded.clone());
			if let Err(e) = self.store.save_device(dev) {
				error!(err = %e, ieee = %ieee, "save standard property");
			}
		}

		self.events.emit(&Event::PropertyUpdate {
			ieee,
			property: prop_name.to_string(),
			value: decoded.clone(),
			source: None,
		});
	}

	fn extract_custom_properties(&self, ieee: Ieee, dev: &Device, ps: &PropertySpec, decoded_map: &std::collections::BTreeMap<u8, Value>, with_attribute: bool, collected: &mut Vec<(String, Value)>) {
		for v in &ps.values {
			let Some(raw) = decoded_map.get(&v.tag) else { continue; };
			let value = if v.transform.is_empty() {
				raw.clone()
			}
			else {
				vendor::apply_transform(&v.transform, raw)
			};

			collected.push((v.name.clone(), value.clone()));

			self.events.emit(&Event::PropertyUpdate {
				ieee,
				property: v.name.clone(),
				value: value.clone(),
				source: Some(PropertySource {
					cluster: ps.cluster,
					attribute: if with_attribute { Some(ps.attribute) } else { None },
					decoder: ps.decoder.clone(),
					tag: v.tag,
				}),
			});

			info!(ieee = %ieee, name = %dev.display_name(), property = %v.name, value = %value, "property update");
		}
	}

	fn persist_properties(&self, ieee: Ieee, collected: Vec<(String, Value)>) {
		if collected.is_empty() {
			return;
		}
		//all writes from one report land in a single transaction
		if let Err(e) = self.store.update_device(ieee, |d| {
			for (name, value) in collected {
				d.properties.insert(name, value);
			}
		}) {
			error!(err = %e, ieee = %ieee, "save device properties");
		}
	}

	fn process_properties(&self, ieee: Ieee, dev: &Device, cluster_id: u16, attr_id: u16, decoded: Option<&Value>) {
		if dev.manufacturer.is_empty() || dev.model.is_empty() {
			return;
		}
		let Some(def) = self.device_db.lookup(&dev.manufacturer, &dev.model) else { return; };
		if def.properties.is_empty() {
			return;
		}

		let mut collected = Vec::new();
		for ps in &def.properties {
			if ps.cluster != cluster_id || ps.attribute != attr_id {
				continue;
			}

			match ps.decoder.as_str() {
				"xiaomi_tlv" => {
					let raw = match decoded {
						Some(Value::Bytes(b)) => b.clone(),
						Some(Value::Str(s)) => s.as_bytes().to_vec(),
						other => {
							warn!(ieee = %ieee, decoder = %ps.decoder, got = ?other, "property decoder expects bytes or string");
							continue;
						}
					};
					let tlv = match vendor::decode_xiaomi_tlv(&raw) {
						Ok(m) => m,
						Err(e) => {
							warn!(err = %e, ieee = %ieee, "xiaomi tlv decode failed");
							continue;
						}
					};
					self.extract_custom_properties(ieee, dev, ps, &tlv, true, &mut collected);
				},
				other => {
					warn!(ieee = %ieee, decoder = %other, "unknown property decoder");
				}
			}
		}

		self.persist_properties(ieee, collected);
	}

	//--- cluster commands ---

	pub fn handle_cluster_command(&self, evt: ClusterCommandEvent) {
		let ieee = self.lookup_or_rebuild(evt.src_addr);

		debug!(
			ieee = %ieee.map(|i| i.to_string()).unwrap_or_default(),
			short = %format_args!("{:#06X}", evt.src_addr),
			cluster = %format_args!("{:#06X}", evt.cluster_id),
			cmd = %format_args!("{:#04X}", evt.command_id),
			"cluster command"
		);

		self.events.emit(&Event::ClusterCommand {
			ieee,
			short_addr: evt.src_addr,
			endpoint: evt.src_ep,
			cluster_id: evt.cluster_id,
			command_id: evt.command_id,
			payload: evt.payload.clone(),
		});

		let Some(ieee) = ieee else { return; };
		let Ok(dev) = self.store.get_device(ieee) else { return; };
		if dev.manufacturer.is_empty() || dev.model.is_empty() {
			return;
		}
		let Some(def) = self.device_db.lookup(&dev.manufacturer, &dev.model) else { return; };

		let mut collected = Vec::new();
		for ps in &def.properties {
			if ps.cluster != evt.cluster_id || ps.decoder != "tuya_dp" {
				continue;
			}

			let dps = match tuya::decode_dps(&evt.payload) {
				Ok(m) => m,
				Err(e) => {
					warn!(err = %e, ieee = %ieee, "tuya dp decode failed");
					continue;
				}
			};
			self.extract_custom_properties(ieee, &dev, ps, &dps, false, &mut collected);
		}

		self.persist_properties(ieee, collected);
	}

	//--- external management ---

	///Kick a device off the network and forget it.
	pub async fn remove_device(&self, ieee: Ieee) -> Result<(), crate::store::Error> {
		self.cancel_interview(ieee);

		if let Ok(dev) = self.store.get_device(ieee) {
			match self.ncp.mgmt_leave(dev.short_address, ieee.to_wire(), MGMT_LEAVE_TIMEOUT).await {
				Ok(()) => info!(ieee = %ieee, name = %dev.display_name(), "device removed from network"),
				Err(e) => warn!(err = %e, ieee = %ieee, name = %dev.display_name(), "mgmt leave request failed"),
			}
		}

		self.remove_from_addr_index_by_ieee(ieee);
		self.store.delete_device(ieee)
	}

	pub fn list_devices(&self) -> Result<Vec<Device>, crate::store::Error> {
		self.store.list_devices()
	}

	pub fn get_device(&self, ieee: Ieee) -> Result<Device, crate::store::Error> {
		self.store.get_device(ieee)
	}

	pub fn interviewing(&self, ieee: Ieee) -> bool {
		self.interview_cancels.lock().unwrap().contains_key(&ieee)
	}
}

//well-known cluster/attribute pairs exposed as flat property names
fn standard_property(cluster_id: u16, attr_id: u16) -> Option<&'static str> {
	Some(match (cluster_id, attr_id) {
		(0x0006, 0x0000) => "on_off",
		(0x0008, 0x0000) => "brightness",
		(0x0300, 0x0000) => "hue",
		(0x0300, 0x0001) => "saturation",
		(0x0402, 0x0000) => "temperature",
		(0x0403, 0x0000) => "pressure",
		(0x0405, 0x0000) => "humidity",
		(0x0406, 0x0000) => "occupancy",
		(0x0400, 0x0000) => "illuminance",
		(0x0001, 0x0021) => "battery",
		(0x0500, 0x0002) => "zone_status",
		(0x0B04, 0x050B) => "power",
		(0x0702, 0x0000) => "energy",
		(0x000C, 0x0055) => "analog_value",
		(0x0012, 0x0055) => "multistate_value",
		_ => return None,
	})
}
