//cluster definition catalog: static tables merged with user json overlays

use std::collections::HashMap;
use std::sync::RwLock;
use serde::{ Serialize, Deserialize };

pub const ACCESS_READ: u8 = 0x01;
pub const ACCESS_WRITE: u8 = 0x02;
pub const ACCESS_REPORT: u8 = 0x04;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDef {
	pub id: u16,
	pub name: String,
	#[serde(rename = "type")]
	pub type_id: u8,
	//bitmask: 1=read, 2=write, 4=reportable
	#[serde(default)]
	pub access: u8,
}

impl AttributeDef {
	pub fn is_readable(&self) -> bool {
		self.access & ACCESS_READ != 0
	}

	pub fn is_writable(&self) -> bool {
		self.access & ACCESS_WRITE != 0
	}

	pub fn is_reportable(&self) -> bool {
		self.access & ACCESS_REPORT != 0
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandDirection {
	#[serde(rename = "toServer")]
	ToServer,
	#[serde(rename = "toClient")]
	ToClient,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDef {
	pub id: u8,
	pub name: String,
	pub direction: CommandDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterDef {
	pub id: u16,
	pub name: String,
	#[serde(default)]
	pub attributes: Vec<AttributeDef>,
	#[serde(default)]
	pub commands: Vec<CommandDef>,
}

impl ClusterDef {
	pub fn find_attribute(&self, id: u16) -> Option<&AttributeDef> {
		self.attributes.iter().find(|a| a.id == id)
	}

	pub fn find_command(&self, id: u8, direction: CommandDirection) -> Option<&CommandDef> {
		self.commands.iter().find(|c| c.id == id && c.direction == direction)
	}

	///Overlay merge: new attributes and commands are appended, existing ids
	///are never overridden.
	pub fn merge(&mut self, other: &ClusterDef) {
		for attr in &other.attributes {
			if self.find_attribute(attr.id).is_none() {
				self.attributes.push(attr.clone());
			}
		}
		for cmd in &other.commands {
			if self.find_command(cmd.id, cmd.direction).is_none() {
				self.commands.push(cmd.clone());
			}
		}
	}
}

///All known cluster definitions, static tables plus overlays.
pub struct Registry {
	clusters: RwLock<HashMap<u16, ClusterDef>>,
}

impl Default for Registry {
	fn default() -> Self {
		Self::new()
	}
}

impl Registry {
	pub fn new() -> Self {
		Self { clusters: RwLock::new(HashMap::new()) }
	}

	pub fn register(&self, c: ClusterDef) {
		let mut clusters = self.clusters.write().unwrap();
		match clusters.get_mut(&c.id) {
			Some(existing) => existing.merge(&c),
			None => { clusters.insert(c.id, c); }
		}
	}

	///Returns a clone; callers may modify their copy freely.
	pub fn get(&self, id: u16) -> Option<ClusterDef> {
		self.clusters.read().unwrap().get(&id).cloned()
	}

	pub fn all(&self) -> Vec<ClusterDef> {
		let mut v: Vec<ClusterDef> = self.clusters.read().unwrap().values().cloned().collect();
		v.sort_by_key(|c| c.id);
		v
	}

	pub fn len(&self) -> usize {
		self.clusters.read().unwrap().len()
	}

	pub fn is_empty(&self) -> bool {
		self.clusters.read().unwrap().is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::zcl;

	fn on_off() -> ClusterDef {
		ClusterDef {
			id: 0x0006,
			name: "On/Off".into(),
			attributes: vec![AttributeDef { id: 0x0000, name: "OnOff".into(), type_id: zcl::TYPE_BOOL, access: ACCESS_READ | ACCESS_REPORT }],
			commands: vec![CommandDef { id: 0x01, name: "On".into(), direction: CommandDirection::ToServer }],
		}
	}

	#[test]
	fn register_and_get() {
		let r = Registry::new();
		r.register(on_off());

		let c = r.get(0x0006).unwrap();
		assert_eq!(c.name, "On/Off");
		assert!(c.find_attribute(0x0000).unwrap().is_reportable());
		assert!(r.get(0x9999).is_none());
	}

	#[test]
	fn merge_adds_but_never_shadows() {
		let r = Registry::new();
		r.register(on_off());

		r.register(ClusterDef {
			id: 0x0006,
			name: "Custom".into(),
			attributes: vec![
				//same id, different name: must not replace
				AttributeDef { id: 0x0000, name: "Hijacked".into(), type_id: zcl::TYPE_UINT8, access: 0 },
				AttributeDef { id: 0x8001, name: "VendorMode".into(), type_id: zcl::TYPE_ENUM8, access: ACCESS_READ },
			],
			commands: vec![],
		});

		let c = r.get(0x0006).unwrap();
		assert_eq!(c.name, "On/Off");
		assert_eq!(c.find_attribute(0x0000).unwrap().name, "OnOff");
		assert_eq!(c.find_attribute(0x8001).unwrap().name, "VendorMode");
		assert_eq!(c.attributes.len(), 2);
	}

	#[test]
	fn get_returns_independent_clone() {
		let r = Registry::new();
		r.register(on_off());

		let mut c = r.get(0x0006).unwrap();
		c.name = "scribbled".into();
		assert_eq!(r.get(0x0006).unwrap().name, "On/Off");
	}

	#[test]
	fn command_lookup_respects_direction() {
		let r = Registry::new();
		r.register(on_off());

		let c = r.get(0x0006).unwrap();
		assert!(c.find_command(0x01, CommandDirection::ToServer).is_some());
		assert!(c.find_command(0x01, CommandDirection::ToClient).is_none());
	}
}
