//coordinator facade: lifecycle, resume-vs-form decision, indication wiring
//and the management conveniences exposed to external callers

use std::sync::{ Arc, Mutex };
use std::time::Duration;
use serde::Serialize;
use tracing::{ info, warn };
use zigbee::registry::Registry;
use zigbee::value::Value;
use zigbee::zcl;
use crate::catalog::DeviceDb;
use crate::device_manager::DeviceManager;
use crate::events::{ Event, EventBus };
use crate::ieee::Ieee;
use crate::ncp::{
	self, AttributeReportEvent, ClusterCommandEvent, ClusterCommandRequest,
	ConfigureReportingRequest, DeviceAnnounceEvent, DeviceJoinedEvent, DeviceLeftEvent,
	Ncp, NcpHandler, NetworkScanResult, ReadAttributesRequest, ResetOption,
	WriteAttributesRequest,
};
use crate::store::{ NetworkState, Store };

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub enum Error {
	Ncp(ncp::Error),
	Store(crate::store::Error),
	Zcl(zigbee::zcl::Error),
	BadAddress(crate::ieee::ParseIeeeError),
}

impl core::fmt::Display for Error {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		match self {
			Self::Ncp(e) => e.fmt(f),
			Self::Store(e) => e.fmt(f),
			Self::Zcl(e) => e.fmt(f),
			Self::BadAddress(e) => e.fmt(f),
		}
	}
}

impl std::error::Error for Error {}

impl From<ncp::Error> for Error {
	fn from(e: ncp::Error) -> Self {
		Error::Ncp(e)
	}
}

impl From<crate::store::Error> for Error {
	fn from(e: crate::store::Error) -> Self {
		Error::Store(e)
	}
}

impl From<zigbee::zcl::Error> for Error {
	fn from(e: zigbee::zcl::Error) -> Self {
		Error::Zcl(e)
	}
}

impl From<crate::ieee::ParseIeeeError> for Error {
	fn from(e: crate::ieee::ParseIeeeError) -> Self {
		Error::BadAddress(e)
	}
}

///Network parameters the coordinator is configured for.
#[derive(Debug, Clone, Copy)]
pub struct Config {
	pub channel: u8,
	pub pan_id: u16,
	pub ext_pan_id: [u8; 8],
}

///Port details, carried for display purposes only.
#[derive(Debug, Clone)]
pub struct NcpPortConfig {
	pub port: String,
	pub baud: u32,
}

///One decoded attribute read result with registry names attached.
#[derive(Debug, Clone, Serialize)]
pub struct AttributeResult {
	pub attr_id: u16,
	pub attr_name: String,
	pub type_id: u8,
	pub type_name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub value: Option<Value>,
	pub status: u8,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

pub struct Coordinator {
	ncp: Arc<Ncp>,
	store: Arc<Store>,
	registry: Arc<Registry>,
	events: Arc<EventBus>,
	devices: Arc<DeviceManager>,
	config: Config,
	ncp_config: NcpPortConfig,
	local_ieee: Arc<Mutex<Ieee>>,
}

//ncp indications route straight into the device manager
struct Indications {
	devices: Arc<DeviceManager>,
}

impl NcpHandler for Indications {
	fn on_device_joined(&self, evt: DeviceJoinedEvent) {
		self.devices.handle_join(evt);
	}

	fn on_device_left(&self, evt: DeviceLeftEvent) {
		self.devices.handle_leave(evt);
	}

	fn on_device_announce(&self, evt: DeviceAnnounceEvent) {
		self.devices.clone().handle_announce(evt);
	}

	fn on_attribute_report(&self, evt: AttributeReportEvent) {
		self.devices.handle_attribute_report(evt);
	}

	fn on_cluster_command(&self, evt: ClusterCommandEvent) {
		self.devices.handle_cluster_command(evt);
	}

	fn on_nwk_addr_update(&self, _short_addr: u16) {
		self.devices.invalidate_addr_index();
	}
}

impl Coordinator {
	pub fn new(
		ncp: Arc<Ncp>,
		store: Arc<Store>,
		registry: Arc<Registry>,
		device_db: Arc<DeviceDb>,
		events: Arc<EventBus>,
		config: Config,
		ncp_config: NcpPortConfig,
		retry_jitter_ms: u64,
	) -> Arc<Self> {
		let local_ieee = Arc::new(Mutex::new(Ieee::default()));
		let devices = DeviceManager::new(
			ncp.clone(),
			store.clone(),
			registry.clone(),
			device_db,
			events.clone(),
			local_ieee.clone(),
			retry_jitter_ms,
		);

		ncp.set_handler(Arc::new(Indications { devices: devices.clone() }));

		Arc::new(Self {
			ncp,
			store,
			registry,
			events,
			devices,
			config,
			ncp_config,
			local_ieee,
		})
	}

	///Bring the network up: resume the persisted network when its parameters
	///still match the configuration, otherwise form a fresh one (re-forming
	///generates a new network key and orphans every paired device, so resume
	///is always preferred).
	pub async fn start(&self) -> Result<(), Error> {
		info!("initializing ncp");

		if self.can_resume_network() {
			info!("resuming existing network");
			//soft reset gets the ll protocol state back in sync without
			//touching nvram
			self.ncp.reset(ResetOption::NoOption).await?;
			self.ncp.init().await?;
			match self.ncp.start_network().await {
				Ok(()) => {
					self.cache_local_ieee().await;
					info!(
						channel = self.config.channel,
						pan_id = %format_args!("{:#06X}", self.config.pan_id),
						"network resumed"
					);
					self.events.emit(&Event::NetworkState { state: "started".to_string() });
					return Ok(());
				},
				Err(e) => {
					warn!(err = %e, "network resume failed, re-forming");
				}
			}
		}

		let ncp_cfg = ncp::NetworkConfig {
			channel: self.config.channel,
			pan_id: self.config.pan_id,
			ext_pan_id: self.config.ext_pan_id,
		};

		info!("forming new network");
		self.ncp.reset(ResetOption::NoOption).await?;
		self.ncp.init().await?;
		if let Err(e) = self.ncp.form_network(ncp_cfg).await {
			//stale nvram state can make formation fail, wipe and retry once
			warn!(err = %e, "formation failed, trying factory reset");
			self.ncp.factory_reset().await?;
			self.ncp.init().await?;
			self.ncp.form_network(ncp_cfg).await?;
		}
		self.ncp.start_network().await?;

		self.save_network_state();
		self.cache_local_ieee().await;
		info!(
			channel = self.config.channel,
			pan_id = %format_args!("{:#06X}", self.config.pan_id),
			"network formed"
		);
		self.events.emit(&Event::NetworkState { state: "started".to_string() });
		Ok(())
	}

	///Cancel in-flight interviews, wait for the workers, release the port.
	pub async fn stop(&self) {
		self.devices.cancel_all_interviews().await;
		self.ncp.close();
	}

	fn can_resume_network(&self) -> bool {
		let Ok(state) = self.store.get_network_state() else { return false; };
		state.formed
			&& state.channel == self.config.channel
			&& state.pan_id == self.config.pan_id
			&& state.ext_pan_id == hex::encode_upper(self.config.ext_pan_id)
	}

	fn save_network_state(&self) {
		let network_key = self.ncp.ncp_info().network_key.map(hex::encode_upper);
		if let Err(e) = self.store.save_network_state(&NetworkState {
			channel: self.config.channel,
			pan_id: self.config.pan_id,
			ext_pan_id: hex::encode_upper(self.config.ext_pan_id),
			network_key,
			formed: true,
		}) {
			tracing::error!(err = %e, "save network state");
		}
	}

	async fn cache_local_ieee(&self) {
		match self.ncp.get_local_ieee().await {
			Ok(ieee) => {
				let ieee = Ieee::from_wire(ieee);
				*self.local_ieee.lock().unwrap() = ieee;
				info!(ieee = %ieee, "coordinator ieee");
			},
			Err(e) => {
				warn!(err = %e, "get coordinator ieee");
			}
		}
	}

	pub fn local_ieee(&self) -> Ieee {
		*self.local_ieee.lock().unwrap()
	}

	pub fn devices(&self) -> &Arc<DeviceManager> {
		&self.devices
	}

	pub fn events(&self) -> &Arc<EventBus> {
		&self.events
	}

	pub fn store(&self) -> &Arc<Store> {
		&self.store
	}

	pub fn registry(&self) -> &Arc<Registry> {
		&self.registry
	}

	pub fn ncp(&self) -> &Arc<Ncp> {
		&self.ncp
	}

	//--- management operations ---

	pub async fn permit_join(&self, duration: u8) -> Result<(), Error> {
		self.ncp.permit_join(duration).await?;
		info!(duration, "permit join");
		self.events.emit(&Event::PermitJoin { duration });
		Ok(())
	}

	pub async fn network_scan(&self) -> Result<Vec<NetworkScanResult>, Error> {
		Ok(self.ncp.network_scan().await?)
	}

	pub async fn remove_device(&self, ieee: Ieee) -> Result<(), Error> {
		Ok(self.devices.remove_device(ieee).await?)
	}

	///Read and decode attributes, resolving names through the registry.
	pub async fn read_attributes(&self, short_addr: u16, endpoint: u8, cluster_id: u16, attr_ids: Vec<u16>) -> Result<Vec<AttributeResult>, Error> {
		let responses = self.ncp.read_attributes(ReadAttributesRequest {
			dst_addr: short_addr,
			dst_ep: endpoint,
			cluster_id,
			attr_ids,
		}, DEFAULT_TIMEOUT).await?;

		let cluster = self.registry.get(cluster_id);
		let mut results = Vec::with_capacity(responses.len());
		for r in responses {
			let mut result = AttributeResult {
				attr_id: r.attr_id,
				attr_name: String::new(),
				type_id: r.data_type,
				type_name: zcl::type_name(r.data_type).to_string(),
				value: None,
				status: r.status,
				error: None,
			};
			if let Some(cluster) = &cluster {
				if let Some(attr) = cluster.find_attribute(r.attr_id) {
					result.attr_name = attr.name.clone();
				}
			}
			if result.attr_name.is_empty() {
				result.attr_name = format!("{:#06X}", r.attr_id);
			}
			if r.status != 0 {
				result.error = Some(format!("status {:#04X}", r.status));
			}
			else if !r.value.is_empty() {
				match zcl::decode(r.data_type, &r.value) {
					Ok((v, _)) => result.value = v,
					Err(e) => result.error = Some(e.to_string()),
				}
			}
			results.push(result);
		}
		Ok(results)
	}

	pub async fn write_attribute(&self, short_addr: u16, endpoint: u8, cluster_id: u16, attr_id: u16, data_type: u8, value: &Value) -> Result<(), Error> {
		let encoded = zcl::encode(data_type, value)?;
		Ok(self.ncp.write_attributes(WriteAttributesRequest {
			dst_addr: short_addr,
			dst_ep: endpoint,
			cluster_id,
			records: vec![zcl::WriteRecord { attr_id, data_type, value: encoded }],
		}, DEFAULT_TIMEOUT).await?)
	}

	pub async fn send_cluster_command(&self, short_addr: u16, endpoint: u8, cluster_id: u16, command_id: u8, payload: Vec<u8>) -> Result<(), Error> {
		Ok(self.ncp.send_command(ClusterCommandRequest {
			dst_addr: short_addr,
			dst_ep: endpoint,
			cluster_id,
			command_id,
			payload,
		}, DEFAULT_TIMEOUT).await?)
	}

	pub async fn configure_reporting(&self, short_addr: u16, endpoint: u8, cluster_id: u16, attr_id: u16, data_type: u8, min_interval: u16, max_interval: u16, reportable_change: Vec<u8>) -> Result<(), Error> {
		Ok(self.ncp.configure_reporting(ConfigureReportingRequest {
			dst_addr: short_addr,
			dst_ep: endpoint,
			cluster_id,
			attr_id,
			data_type,
			min_interval,
			max_interval,
			report_change: reportable_change,
		}, DEFAULT_TIMEOUT).await?)
	}

	pub async fn bind(&self, target_short_addr: u16, src_ieee: &str, src_ep: u8, cluster_id: u16, dst_ieee: &str, dst_ep: u8) -> Result<(), Error> {
		let src: Ieee = src_ieee.parse()?;
		let dst: Ieee = dst_ieee.parse()?;
		Ok(self.ncp.bind(ncp::BindRequest {
			target_short_addr,
			src_ieee: src.to_wire(),
			src_ep,
			cluster_id,
			dst_ieee: dst.to_wire(),
			dst_ep,
		}, DEFAULT_TIMEOUT).await?)
	}

	pub async fn unbind(&self, target_short_addr: u16, src_ieee: &str, src_ep: u8, cluster_id: u16, dst_ieee: &str, dst_ep: u8) -> Result<(), Error> {
		let src: Ieee = src_ieee.parse()?;
		let dst: Ieee = dst_ieee.parse()?;
		Ok(self.ncp.unbind(ncp::BindRequest {
			target_short_addr,
			src_ieee: src.to_wire(),
			src_ep,
			cluster_id,
			dst_ieee: dst.to_wire(),
			dst_ep,
		}, DEFAULT_TIMEOUT).await?)
	}

	///Summary for status surfaces; never includes key material. Radio state
	///is read live from the ncp; a field it could not answer falls back to
	///the configured value, all three failing is an error.
	pub async fn network_info(&self) -> Result<serde_json::Value, Error> {
		let live = self.ncp.network_info().await?;
		let channel = if live.channel != 0 { live.channel } else { self.config.channel };
		let pan_id = if live.pan_id != 0 { live.pan_id } else { self.config.pan_id };
		let ext_pan_id = if live.ext_pan_id != [0u8; 8] { live.ext_pan_id } else { self.config.ext_pan_id };

		let info = self.ncp.ncp_info();
		Ok(serde_json::json!({
			"channel": channel,
			"pan_id": format!("{:#06X}", pan_id),
			"ext_pan_id": hex::encode_upper(ext_pan_id),
			"port": self.ncp_config.port,
			"baud": self.ncp_config.baud,
			"coordinator_ieee": self.local_ieee().to_string(),
			"fw_version": info.fw_version,
			"stack_version": info.stack_version,
			"protocol_version": info.protocol_version,
		}))
	}
}
