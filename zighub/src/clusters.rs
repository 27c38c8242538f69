//static zcl cluster tables; pure data consumed by the registry

use zigbee::registry::{
	AttributeDef, ClusterDef, CommandDef, CommandDirection,
	ACCESS_READ, ACCESS_WRITE, ACCESS_REPORT,
};
use zigbee::zcl;

const RW: u8 = ACCESS_READ | ACCESS_WRITE;
const RP: u8 = ACCESS_READ | ACCESS_REPORT;
const RWP: u8 = ACCESS_READ | ACCESS_WRITE | ACCESS_REPORT;

fn attr(id: u16, name: &str, type_id: u8, access: u8) -> AttributeDef {
	AttributeDef { id, name: name.to_string(), type_id, access }
}

fn to_server(id: u8, name: &str) -> CommandDef {
	CommandDef { id, name: name.to_string(), direction: CommandDirection::ToServer }
}

fn to_client(id: u8, name: &str) -> CommandDef {
	CommandDef { id, name: name.to_string(), direction: CommandDirection::ToClient }
}

fn cluster(id: u16, name: &str, attributes: Vec<AttributeDef>, commands: Vec<CommandDef>) -> ClusterDef {
	ClusterDef { id, name: name.to_string(), attributes, commands }
}

///Every standard cluster definition shipped with the daemon. User overlays
///from the devices directory merge on top of these.
pub fn standard_clusters() -> Vec<ClusterDef> {
	vec![
		cluster(0x0000, "Basic", vec![
			attr(0x0000, "ZCLVersion", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0001, "ApplicationVersion", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0002, "StackVersion", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0003, "HWVersion", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0004, "ManufacturerName", zcl::TYPE_STRING, ACCESS_READ),
			attr(0x0005, "ModelIdentifier", zcl::TYPE_STRING, ACCESS_READ),
			attr(0x0006, "DateCode", zcl::TYPE_STRING, ACCESS_READ),
			attr(0x0007, "PowerSource", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x4000, "SWBuildID", zcl::TYPE_STRING, ACCESS_READ),
		], vec![
			to_server(0x00, "ResetToFactoryDefaults"),
		]),
		cluster(0x0001, "Power Configuration", vec![
			attr(0x0020, "BatteryVoltage", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0021, "BatteryPercentageRemaining", zcl::TYPE_UINT8, RP),
			attr(0x0034, "BatteryRatedVoltage", zcl::TYPE_UINT8, RW),
		], vec![]),
		cluster(0x0002, "Device Temperature Configuration", vec![
			attr(0x0000, "CurrentTemperature", zcl::TYPE_INT16, ACCESS_READ),
			attr(0x0001, "MinTempExperienced", zcl::TYPE_INT16, ACCESS_READ),
			attr(0x0002, "MaxTempExperienced", zcl::TYPE_INT16, ACCESS_READ),
		], vec![]),
		cluster(0x0003, "Identify", vec![
			attr(0x0000, "IdentifyTime", zcl::TYPE_UINT16, RW),
		], vec![
			to_server(0x00, "Identify"),
			to_server(0x01, "IdentifyQuery"),
			to_client(0x00, "IdentifyQueryResponse"),
		]),
		cluster(0x0004, "Groups", vec![
			attr(0x0000, "NameSupport", zcl::TYPE_MAP8, ACCESS_READ),
		], vec![
			to_server(0x00, "AddGroup"),
			to_server(0x01, "ViewGroup"),
			to_server(0x02, "GetGroupMembership"),
			to_server(0x03, "RemoveGroup"),
			to_server(0x04, "RemoveAllGroups"),
		]),
		cluster(0x0005, "Scenes", vec![
			attr(0x0000, "SceneCount", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0001, "CurrentScene", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0002, "CurrentGroup", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0003, "SceneValid", zcl::TYPE_BOOL, ACCESS_READ),
		], vec![
			to_server(0x00, "AddScene"),
			to_server(0x01, "ViewScene"),
			to_server(0x02, "RemoveScene"),
			to_server(0x05, "RecallScene"),
		]),
		cluster(0x0006, "On/Off", vec![
			attr(0x0000, "OnOff", zcl::TYPE_BOOL, RP),
			attr(0x4000, "GlobalSceneControl", zcl::TYPE_BOOL, ACCESS_READ),
			attr(0x4001, "OnTime", zcl::TYPE_UINT16, RW),
			attr(0x4002, "OffWaitTime", zcl::TYPE_UINT16, RW),
		], vec![
			to_server(0x00, "Off"),
			to_server(0x01, "On"),
			to_server(0x02, "Toggle"),
			to_server(0x40, "OffWithEffect"),
			to_server(0x41, "OnWithRecallGlobalScene"),
			to_server(0x42, "OnWithTimedOff"),
		]),
		cluster(0x0007, "On/Off Switch Configuration", vec![
			attr(0x0000, "SwitchType", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0010, "SwitchActions", zcl::TYPE_ENUM8, RW),
		], vec![]),
		cluster(0x0008, "Level Control", vec![
			attr(0x0000, "CurrentLevel", zcl::TYPE_UINT8, RP),
			attr(0x0001, "RemainingTime", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0010, "OnOffTransitionTime", zcl::TYPE_UINT16, RW),
			attr(0x0011, "OnLevel", zcl::TYPE_UINT8, RW),
		], vec![
			to_server(0x00, "MoveToLevel"),
			to_server(0x01, "Move"),
			to_server(0x02, "Step"),
			to_server(0x03, "Stop"),
			to_server(0x04, "MoveToLevelWithOnOff"),
			to_server(0x05, "MoveWithOnOff"),
			to_server(0x06, "StepWithOnOff"),
			to_server(0x07, "StopWithOnOff"),
		]),
		cluster(0x0009, "Alarms", vec![
			attr(0x0000, "AlarmCount", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![
			to_server(0x00, "ResetAlarm"),
			to_server(0x01, "ResetAllAlarms"),
			to_client(0x00, "Alarm"),
		]),
		cluster(0x000A, "Time", vec![
			attr(0x0000, "Time", zcl::TYPE_UTC, RW),
			attr(0x0001, "TimeStatus", zcl::TYPE_MAP8, RW),
			attr(0x0002, "TimeZone", zcl::TYPE_INT32, RW),
		], vec![]),
		cluster(0x000B, "RSSI Location", vec![
			attr(0x0000, "LocationType", zcl::TYPE_DATA8, ACCESS_READ),
			attr(0x0001, "LocationMethod", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0003, "QualityMeasure", zcl::TYPE_UINT8, ACCESS_READ),
		], vec![]),
		cluster(0x000C, "Analog Input (Basic)", vec![
			attr(0x001C, "Description", zcl::TYPE_STRING, RW),
			attr(0x0041, "MaxPresentValue", zcl::TYPE_SINGLE, RW),
			attr(0x0045, "MinPresentValue", zcl::TYPE_SINGLE, RW),
			attr(0x0051, "OutOfService", zcl::TYPE_BOOL, RW),
			attr(0x0055, "PresentValue", zcl::TYPE_SINGLE, RWP),
			attr(0x006F, "StatusFlags", zcl::TYPE_MAP8, RP),
		], vec![]),
		cluster(0x0012, "Multistate Input (Basic)", vec![
			attr(0x000E, "StateText", zcl::TYPE_STRING, RW),
			attr(0x004A, "NumberOfStates", zcl::TYPE_UINT16, RW),
			attr(0x0051, "OutOfService", zcl::TYPE_BOOL, RW),
			attr(0x0055, "PresentValue", zcl::TYPE_UINT16, RWP),
			attr(0x006F, "StatusFlags", zcl::TYPE_MAP8, RP),
		], vec![]),
		cluster(0x000F, "Binary Input (Basic)", vec![
			attr(0x0004, "ActiveText", zcl::TYPE_STRING, RW),
			attr(0x002E, "InactiveText", zcl::TYPE_STRING, RW),
			attr(0x0051, "OutOfService", zcl::TYPE_BOOL, RW),
			attr(0x0055, "PresentValue", zcl::TYPE_BOOL, RWP),
			attr(0x006F, "StatusFlags", zcl::TYPE_MAP8, RP),
		], vec![]),
		cluster(0x0014, "Multistate Value (Basic)", vec![
			attr(0x004A, "NumberOfStates", zcl::TYPE_UINT16, RW),
			attr(0x0051, "OutOfService", zcl::TYPE_BOOL, RW),
			attr(0x0055, "PresentValue", zcl::TYPE_UINT16, RWP),
			attr(0x006F, "StatusFlags", zcl::TYPE_MAP8, RP),
		], vec![]),
		cluster(0x0015, "Commissioning", vec![
			attr(0x0000, "ShortAddress", zcl::TYPE_UINT16, RW),
			attr(0x0001, "ExtendedPANId", zcl::TYPE_EUI64, RW),
			attr(0x0002, "PanId", zcl::TYPE_UINT16, RW),
			attr(0x0003, "ChannelMask", zcl::TYPE_MAP32, RW),
		], vec![
			to_server(0x00, "RestartDevice"),
			to_server(0x03, "ResetStartupParameters"),
		]),
		cluster(0x0019, "OTA Upgrade", vec![
			attr(0x0000, "UpgradeServerID", zcl::TYPE_EUI64, ACCESS_READ),
			attr(0x0002, "CurrentFileVersion", zcl::TYPE_UINT32, ACCESS_READ),
			attr(0x0006, "ImageUpgradeStatus", zcl::TYPE_ENUM8, ACCESS_READ),
		], vec![
			to_client(0x00, "ImageNotify"),
			to_server(0x01, "QueryNextImageRequest"),
			to_client(0x02, "QueryNextImageResponse"),
		]),
		cluster(0x0020, "Poll Control", vec![
			attr(0x0000, "CheckinInterval", zcl::TYPE_UINT32, RW),
			attr(0x0001, "LongPollInterval", zcl::TYPE_UINT32, ACCESS_READ),
			attr(0x0002, "ShortPollInterval", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![
			to_client(0x00, "CheckIn"),
		]),
		cluster(0x0021, "Green Power", vec![
			attr(0x0000, "MaxSinkTableEntries", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0005, "CommunicationMode", zcl::TYPE_MAP8, RW),
			attr(0x0016, "SharedSecurityKeyType", zcl::TYPE_MAP8, RW),
		], vec![]),
		cluster(0x0100, "Shade Configuration", vec![
			attr(0x0000, "PhysicalClosedLimit", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0010, "Status", zcl::TYPE_MAP8, RW),
			attr(0x0011, "ClosedLimit", zcl::TYPE_UINT16, RW),
			attr(0x0012, "Mode", zcl::TYPE_ENUM8, RW),
		], vec![]),
		cluster(0x0101, "Door Lock", vec![
			attr(0x0000, "LockState", zcl::TYPE_ENUM8, RP),
			attr(0x0001, "LockType", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0002, "ActuatorEnabled", zcl::TYPE_BOOL, ACCESS_READ),
		], vec![
			to_server(0x00, "LockDoor"),
			to_server(0x01, "UnlockDoor"),
		]),
		cluster(0x0102, "Window Covering", vec![
			attr(0x0000, "WindowCoveringType", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0008, "CurrentPositionLiftPercentage", zcl::TYPE_UINT8, RP),
			attr(0x0009, "CurrentPositionTiltPercentage", zcl::TYPE_UINT8, RP),
		], vec![
			to_server(0x00, "UpOpen"),
			to_server(0x01, "DownClose"),
			to_server(0x02, "Stop"),
			to_server(0x05, "GoToLiftPercentage"),
		]),
		cluster(0x0103, "Barrier Control", vec![
			attr(0x0001, "MovingState", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0002, "SafetyStatus", zcl::TYPE_MAP16, ACCESS_READ),
			attr(0x000A, "BarrierPosition", zcl::TYPE_UINT8, RP),
		], vec![
			to_server(0x00, "GoToPercent"),
			to_server(0x01, "Stop"),
		]),
		cluster(0x0200, "Pump Configuration and Control", vec![
			attr(0x0000, "MaxPressure", zcl::TYPE_INT16, ACCESS_READ),
			attr(0x0001, "MaxSpeed", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0011, "EffectiveControlMode", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0020, "OperationMode", zcl::TYPE_ENUM8, RW),
		], vec![]),
		cluster(0x0201, "Thermostat", vec![
			attr(0x0000, "LocalTemperature", zcl::TYPE_INT16, RP),
			attr(0x0011, "OccupiedCoolingSetpoint", zcl::TYPE_INT16, RW),
			attr(0x0012, "OccupiedHeatingSetpoint", zcl::TYPE_INT16, RW),
			attr(0x001C, "SystemMode", zcl::TYPE_ENUM8, RW),
		], vec![
			to_server(0x00, "SetpointRaiseLower"),
		]),
		cluster(0x0202, "Fan Control", vec![
			attr(0x0000, "FanMode", zcl::TYPE_ENUM8, RW),
			attr(0x0001, "FanModeSequence", zcl::TYPE_ENUM8, RW),
		], vec![]),
		cluster(0x0204, "Thermostat User Interface Configuration", vec![
			attr(0x0000, "TemperatureDisplayMode", zcl::TYPE_ENUM8, RW),
			attr(0x0001, "KeypadLockout", zcl::TYPE_ENUM8, RW),
		], vec![]),
		cluster(0x0300, "Color Control", vec![
			attr(0x0000, "CurrentHue", zcl::TYPE_UINT8, RP),
			attr(0x0001, "CurrentSaturation", zcl::TYPE_UINT8, RP),
			attr(0x0003, "CurrentX", zcl::TYPE_UINT16, RP),
			attr(0x0004, "CurrentY", zcl::TYPE_UINT16, RP),
			attr(0x0007, "ColorTemperatureMireds", zcl::TYPE_UINT16, RP),
			attr(0x0008, "ColorMode", zcl::TYPE_ENUM8, ACCESS_READ),
		], vec![
			to_server(0x00, "MoveToHue"),
			to_server(0x03, "MoveToSaturation"),
			to_server(0x06, "MoveToHueAndSaturation"),
			to_server(0x07, "MoveToColor"),
			to_server(0x0A, "MoveToColorTemperature"),
		]),
		cluster(0x0301, "Ballast Configuration", vec![
			attr(0x0000, "PhysicalMinLevel", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0001, "PhysicalMaxLevel", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x0010, "MinLevel", zcl::TYPE_UINT8, RW),
			attr(0x0011, "MaxLevel", zcl::TYPE_UINT8, RW),
		], vec![]),
		cluster(0x0400, "Illuminance Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_UINT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![]),
		cluster(0x0402, "Temperature Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_INT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_INT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_INT16, ACCESS_READ),
		], vec![]),
		cluster(0x0403, "Pressure Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_INT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_INT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_INT16, ACCESS_READ),
		], vec![]),
		cluster(0x0405, "Relative Humidity Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_UINT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![]),
		cluster(0x0406, "Occupancy Sensing", vec![
			attr(0x0000, "Occupancy", zcl::TYPE_MAP8, RP),
			attr(0x0001, "OccupancySensorType", zcl::TYPE_ENUM8, ACCESS_READ),
		], vec![]),
		cluster(0x0404, "Flow Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_UINT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![]),
		cluster(0x0408, "Soil Moisture Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_UINT16, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![]),
		cluster(0x040D, "Carbon Dioxide Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_SINGLE, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_SINGLE, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_SINGLE, ACCESS_READ),
		], vec![]),
		cluster(0x042A, "PM2.5 Measurement", vec![
			attr(0x0000, "MeasuredValue", zcl::TYPE_SINGLE, RP),
			attr(0x0001, "MinMeasuredValue", zcl::TYPE_SINGLE, ACCESS_READ),
			attr(0x0002, "MaxMeasuredValue", zcl::TYPE_SINGLE, ACCESS_READ),
		], vec![]),
		cluster(0x0500, "IAS Zone", vec![
			attr(0x0000, "ZoneState", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0001, "ZoneType", zcl::TYPE_ENUM16, ACCESS_READ),
			attr(0x0002, "ZoneStatus", zcl::TYPE_MAP16, RP),
			attr(0x0010, "IASCIEAddress", zcl::TYPE_EUI64, RW),
		], vec![
			to_client(0x00, "ZoneStatusChangeNotification"),
			to_client(0x01, "ZoneEnrollRequest"),
			to_server(0x00, "ZoneEnrollResponse"),
		]),
		cluster(0x0501, "IAS ACE", vec![], vec![
			to_server(0x00, "Arm"),
			to_server(0x02, "Emergency"),
			to_server(0x03, "Fire"),
			to_server(0x04, "Panic"),
			to_client(0x00, "ArmResponse"),
		]),
		cluster(0x0502, "IAS WD", vec![
			attr(0x0000, "MaxDuration", zcl::TYPE_UINT16, RW),
		], vec![
			to_server(0x00, "StartWarning"),
			to_server(0x01, "Squawk"),
		]),
		cluster(0x0702, "Metering", vec![
			attr(0x0000, "CurrentSummationDelivered", zcl::TYPE_UINT48, RP),
			attr(0x0300, "UnitOfMeasure", zcl::TYPE_ENUM8, ACCESS_READ),
			attr(0x0301, "Multiplier", zcl::TYPE_UINT24, ACCESS_READ),
			attr(0x0302, "Divisor", zcl::TYPE_UINT24, ACCESS_READ),
		], vec![]),
		cluster(0x0B04, "Electrical Measurement", vec![
			attr(0x0505, "RMSVoltage", zcl::TYPE_UINT16, RP),
			attr(0x0508, "RMSCurrent", zcl::TYPE_UINT16, RP),
			attr(0x050B, "ActivePower", zcl::TYPE_INT16, RP),
			attr(0x0600, "ACVoltageMultiplier", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x0601, "ACVoltageDivisor", zcl::TYPE_UINT16, ACCESS_READ),
		], vec![]),
		cluster(0x0B00, "Appliance Identification", vec![
			attr(0x0000, "BasicIdentification", zcl::TYPE_UINT48, ACCESS_READ),
			attr(0x0010, "CompanyName", zcl::TYPE_STRING, ACCESS_READ),
			attr(0x0012, "BrandName", zcl::TYPE_STRING, ACCESS_READ),
		], vec![]),
		cluster(0x0B01, "Meter Identification", vec![
			attr(0x0000, "CompanyName", zcl::TYPE_STRING, ACCESS_READ),
			attr(0x0001, "MeterTypeID", zcl::TYPE_UINT16, ACCESS_READ),
			attr(0x000C, "POD", zcl::TYPE_STRING, ACCESS_READ),
		], vec![]),
		cluster(0x0B05, "Diagnostics", vec![
			attr(0x011C, "LastMessageLQI", zcl::TYPE_UINT8, ACCESS_READ),
			attr(0x011D, "LastMessageRSSI", zcl::TYPE_INT8, ACCESS_READ),
		], vec![]),
		cluster(0x1000, "Touchlink Commissioning", vec![], vec![
			to_server(0x00, "ScanRequest"),
			to_server(0x06, "IdentifyRequest"),
			to_server(0x07, "ResetToFactoryNewRequest"),
			to_client(0x01, "ScanResponse"),
		]),
	]
}

#[cfg(test)]
mod tests {
	use super::*;
	use zigbee::registry::Registry;

	#[test]
	fn tables_register_cleanly() {
		let registry = Registry::new();
		for c in standard_clusters() {
			registry.register(c);
		}

		assert!(registry.len() >= 40);

		let on_off = registry.get(0x0006).unwrap();
		assert_eq!(on_off.name, "On/Off");
		assert_eq!(on_off.find_attribute(0x0000).unwrap().name, "OnOff");

		let power = registry.get(0x0001).unwrap();
		assert_eq!(power.find_attribute(0x0021).unwrap().name, "BatteryPercentageRemaining");

		let electrical = registry.get(0x0B04).unwrap();
		assert_eq!(electrical.find_attribute(0x050B).unwrap().name, "ActivePower");
	}

	#[test]
	fn cluster_ids_unique() {
		let defs = standard_clusters();
		let mut ids: Vec<u16> = defs.iter().map(|c| c.id).collect();
		ids.sort_unstable();
		ids.dedup();
		assert_eq!(ids.len(), defs.len());
	}
}
