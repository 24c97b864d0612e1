use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::property::SoftCriteria;

/// Structured criteria bag attached to a lead.
///
/// Canonical keys are `price`, `district`, `roomNumber` and `area`. The data
/// that reaches us from older producers still uses `preferredPrice` and
/// `rooms`, so reads accept both spellings; writes always emit the canonical
/// key. Numeric values may arrive as JSON numbers or as numeric strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Requirement(pub Map<String, Value>);
impl Requirement {
	pub const KEY_AREA: &'static str = "area";
	pub const KEY_DISTRICT: &'static str = "district";
	pub const KEY_PRICE: &'static str = "price";
	pub const KEY_ROOMS: &'static str = "roomNumber";

	pub fn new(map: Map<String, Value>) -> Self {
		Self(map)
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn contains(&self, key: &str) -> bool {
		self.0.contains_key(key) || alias_of(key).is_some_and(|alias| self.0.contains_key(alias))
	}

	pub fn insert(&mut self, key: &str, value: Value) {
		self.0.insert(key.to_string(), value);
	}

	pub fn target_price(&self) -> Option<i64> {
		self.integer(Self::KEY_PRICE)
	}

	pub fn target_rooms(&self) -> Option<i32> {
		self.integer(Self::KEY_ROOMS).map(|rooms| rooms as i32)
	}

	pub fn target_area(&self) -> Option<f64> {
		self.float(Self::KEY_AREA)
	}

	pub fn target_district(&self) -> Option<String> {
		self.lookup(Self::KEY_DISTRICT)
			.and_then(Value::as_str)
			.map(str::trim)
			.filter(|district| !district.is_empty())
			.map(ToString::to_string)
	}

	pub fn preferred_districts(&self) -> Vec<String> {
		self.lookup("preferredDistricts")
			.and_then(Value::as_array)
			.map(|districts| {
				districts
					.iter()
					.filter_map(Value::as_str)
					.map(ToString::to_string)
					.collect::<Vec<_>>()
			})
			.unwrap_or_default()
	}

	/// Soft ranking criteria carried by this requirement, or `None` when the
	/// bag holds nothing the ranker can use.
	pub fn soft_criteria(&self) -> Option<SoftCriteria> {
		let criteria = SoftCriteria {
			target_price: self.target_price(),
			target_district: self.target_district(),
			target_rooms: self.target_rooms(),
			target_area: self.target_area(),
			preferred_districts: self.preferred_districts(),
		};

		if criteria.target_price.is_none()
			&& criteria.target_district.is_none()
			&& criteria.target_rooms.is_none()
			&& criteria.target_area.is_none()
			&& criteria.preferred_districts.is_empty()
		{
			return None;
		}

		Some(criteria)
	}

	fn lookup(&self, key: &str) -> Option<&Value> {
		if let Some(value) = self.0.get(key) {
			return Some(value);
		}

		alias_of(key).and_then(|alias| self.0.get(alias))
	}

	fn integer(&self, key: &str) -> Option<i64> {
		match self.lookup(key)? {
			Value::Number(number) =>
				number.as_i64().or_else(|| number.as_f64().map(|value| value as i64)),
			Value::String(raw) => raw.trim().parse().ok(),
			_ => None,
		}
	}

	fn float(&self, key: &str) -> Option<f64> {
		match self.lookup(key)? {
			Value::Number(number) => number.as_f64(),
			Value::String(raw) => raw.trim().parse().ok(),
			_ => None,
		}
	}
}

fn alias_of(key: &str) -> Option<&'static str> {
	match key {
		Requirement::KEY_PRICE => Some("preferredPrice"),
		Requirement::KEY_ROOMS => Some("rooms"),
		_ => None,
	}
}
