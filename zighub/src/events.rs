//in-process pub/sub fanning coordinator events out to sinks (mqtt bridge,
//scripting, websocket broadcaster); emission is synchronous on the caller

use std::collections::{ BTreeMap, HashMap };
use std::panic::{ catch_unwind, AssertUnwindSafe };
use std::sync::{ Arc, RwLock };
use serde::Serialize;
use tracing::error;
use zigbee::value::Value;
use crate::ieee::Ieee;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	DeviceJoined,
	DeviceLeft,
	DeviceAnnounce,
	AttributeReport,
	ClusterCommand,
	PropertyUpdate,
	NetworkState,
	PermitJoin,
}

impl EventKind {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::DeviceJoined => "device_joined",
			Self::DeviceLeft => "device_left",
			Self::DeviceAnnounce => "device_announce",
			Self::AttributeReport => "attribute_report",
			Self::ClusterCommand => "cluster_command",
			Self::PropertyUpdate => "property_update",
			Self::NetworkState => "network_state",
			Self::PermitJoin => "permit_join",
		}
	}
}

///Where a custom property value came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySource {
	pub cluster: u16,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub attribute: Option<u16>,
	pub decoder: String,
	pub tag: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Event {
	DeviceJoined {
		ieee: Ieee,
		short_addr: u16,
	},
	DeviceLeft {
		ieee: Ieee,
	},
	DeviceAnnounce {
		ieee: Ieee,
		short_addr: u16,
	},
	AttributeReport {
		#[serde(skip_serializing_if = "Option::is_none")]
		ieee: Option<Ieee>,
		short_addr: u16,
		endpoint: u8,
		cluster_id: u16,
		cluster_name: String,
		attr_id: u16,
		attr_name: String,
		#[serde(skip_serializing_if = "Option::is_none")]
		value: Option<Value>,
	},
	ClusterCommand {
		#[serde(skip_serializing_if = "Option::is_none")]
		ieee: Option<Ieee>,
		short_addr: u16,
		endpoint: u8,
		cluster_id: u16,
		command_id: u8,
		#[serde(with = "hex::serde")]
		payload: Vec<u8>,
	},
	PropertyUpdate {
		ieee: Ieee,
		property: String,
		value: Value,
		#[serde(skip_serializing_if = "Option::is_none")]
		source: Option<PropertySource>,
	},
	NetworkState {
		state: String,
	},
	PermitJoin {
		duration: u8,
	},
}

impl Event {
	pub fn kind(&self) -> EventKind {
		match self {
			Self::DeviceJoined { .. } => EventKind::DeviceJoined,
			Self::DeviceLeft { .. } => EventKind::DeviceLeft,
			Self::DeviceAnnounce { .. } => EventKind::DeviceAnnounce,
			Self::AttributeReport { .. } => EventKind::AttributeReport,
			Self::ClusterCommand { .. } => EventKind::ClusterCommand,
			Self::PropertyUpdate { .. } => EventKind::PropertyUpdate,
			Self::NetworkState { .. } => EventKind::NetworkState,
			Self::PermitJoin { .. } => EventKind::PermitJoin,
		}
	}
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Default)]
struct Registrations {
	//BTreeMap keeps registration order for deterministic delivery
	handlers: HashMap<EventKind, BTreeMap<u64, Handler>>,
	all_handlers: BTreeMap<u64, Handler>,
	next_id: u64,
}

///Synchronous pub/sub with panic isolation per handler.
pub struct EventBus {
	inner: Arc<RwLock<Registrations>>,
}

///Handle returned by on/on_all; unsubscribing is idempotent and safe to call
///from inside a handler.
#[derive(Clone)]
pub struct Subscription {
	inner: Arc<RwLock<Registrations>>,
	kind: Option<EventKind>,
	id: u64,
}

impl Subscription {
	pub fn unsubscribe(&self) {
		let mut regs = self.inner.write().unwrap();
		match self.kind {
			Some(kind) => {
				if let Some(m) = regs.handlers.get_mut(&kind) {
					m.remove(&self.id);
				}
			},
			None => {
				regs.all_handlers.remove(&self.id);
			}
		}
	}
}

impl Default for EventBus {
	fn default() -> Self {
		Self::new()
	}
}

impl EventBus {
	pub fn new() -> Self {
		Self { inner: Arc::new(RwLock::new(Registrations::default())) }
	}

	pub fn on<F: Fn(&Event) + Send + Sync + 'static>(&self, kind: EventKind, handler: F) -> Subscription {
		let mut regs = self.inner.write().unwrap();
		let id = regs.next_id;
		regs.next_id += 1;
		regs.handlers.entry(kind).or_default().insert(id, Arc::new(handler));
		Subscription { inner: self.inner.clone(), kind: Some(kind), id }
	}

	pub fn on_all<F: Fn(&Event) + Send + Sync + 'static>(&self, handler: F) -> Subscription {
		let mut regs = self.inner.write().unwrap();
		let id = regs.next_id;
		regs.next_id += 1;
		regs.all_handlers.insert(id, Arc::new(handler));
		Subscription { inner: self.inner.clone(), kind: None, id }
	}

	///Run every matching handler on the caller's thread, in registration
	///order, typed handlers before wildcards. The handler list is snapshotted
	///up front, so handlers may unsubscribe anything mid-emission.
	pub fn emit(&self, event: &Event) {
		let snapshot: Vec<Handler> = {
			let regs = self.inner.read().unwrap();
			let typed = regs.handlers.get(&event.kind());
			let mut v = Vec::with_capacity(typed.map_or(0, |m| m.len()) + regs.all_handlers.len());
			if let Some(m) = typed {
				v.extend(m.values().cloned());
			}
			v.extend(regs.all_handlers.values().cloned());
			v
		};

		for handler in snapshot {
			if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(event))) {
				let msg = panic.downcast_ref::<&str>().map(|s| s.to_string())
					.or_else(|| panic.downcast_ref::<String>().cloned())
					.unwrap_or_else(|| "unknown panic".to_string());
				error!(event = event.kind().as_str(), panic = %msg, "event handler panicked");
			}
		}
	}
}
