//manufacturer-proprietary payload decoders and the value transforms applied
//to their output

use std::collections::BTreeMap;
use crate::value::Value;
use crate::zcl;

///Decode the Xiaomi/Aqara TLV format: a concatenation of
///tag(1) + zcl_type(1) + value(per type) entries.
pub fn decode_xiaomi_tlv(data: &[u8]) -> Result<BTreeMap<u8, Value>, zcl::Error> {
	let mut result = BTreeMap::new();
	let mut pos = 0;

	while pos < data.len() {
		if pos + 2 > data.len() {
			break;	//trailing byte, not a full entry
		}
		let tag = data[pos];
		let type_id = data[pos + 1];
		pos += 2;

		let (val, consumed) = zcl::decode(type_id, &data[pos..])?;
		if let Some(val) = val {
			result.insert(tag, val);
		}
		pos += consumed;
	}

	Ok(result)
}

///Apply a named transform; unknown names and inapplicable values pass through.
pub fn apply_transform(name: &str, value: &Value) -> Value {
	match name {
		"lumi_battery" => lumi_battery(value),
		"minus_one" => minus_one(value),
		"lumi_trigger" => lumi_trigger(value),
		"bool_invert" => bool_invert(value),
		"divide_10" => divide_n(value, 10),
		"divide_100" => divide_n(value, 100),
		_ => value.clone(),
	}
}

//battery millivolts to percent: 2850 mV = 0%, 3000 mV = 100%, clamped
fn lumi_battery(value: &Value) -> Value {
	let Some(mv) = value.as_i64() else { return value.clone(); };
	let pct = (mv - 2850) as f64 / 150.0 * 100.0;
	Value::Int(pct.clamp(0.0, 100.0) as i64)
}

fn minus_one(value: &Value) -> Value {
	let Some(n) = value.as_i64() else { return value.clone(); };
	Value::Int(n - 1)
}

//low 16 bits carry the trigger count, offset by one
fn lumi_trigger(value: &Value) -> Value {
	let Some(n) = value.as_i64() else { return value.clone(); };
	Value::Int((n & 0xFFFF) - 1)
}

fn bool_invert(value: &Value) -> Value {
	match value {
		Value::Bool(b) => Value::Bool(!b),
		Value::Uint(n) => Value::Bool(*n == 0),
		Value::Int(n) => Value::Bool(*n == 0),
		_ => value.clone(),
	}
}

fn divide_n(value: &Value, n: i64) -> Value {
	let Some(v) = value.as_i64() else { return value.clone(); };
	Value::Float(v as f64 / n as f64)
}
