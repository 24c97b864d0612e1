use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Property {
	pub property_id: Uuid,
	pub title: String,
	pub description: String,
	pub address: String,
	pub city: Option<String>,
	pub property_type: PropertyType,
	pub area: Option<f64>,
	pub price: Option<i64>,
	pub rooms: Option<i32>,
	pub status: PropertyStatus,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub embedding: Option<Vec<f32>>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
	Apartment,
	House,
	Commercial,
	Land,
}
impl PropertyType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Apartment => "APARTMENT",
			Self::House => "HOUSE",
			Self::Commercial => "COMMERCIAL",
			Self::Land => "LAND",
		}
	}
}
impl FromStr for PropertyType {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"APARTMENT" => Ok(Self::Apartment),
			"HOUSE" => Ok(Self::House),
			"COMMERCIAL" => Ok(Self::Commercial),
			"LAND" => Ok(Self::Land),
			other => Err(Error::InvalidPropertyType(other.to_string())),
		}
	}
}

// Statuses persist as exactly these strings. Prefixed protobuf-style values
// must fail decoding instead of being silently coerced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyStatus {
	New,
	Published,
	Sold,
	Deleted,
}
impl PropertyStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::New => "NEW",
			Self::Published => "PUBLISHED",
			Self::Sold => "SOLD",
			Self::Deleted => "DELETED",
		}
	}
}
impl FromStr for PropertyStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"NEW" => Ok(Self::New),
			"PUBLISHED" => Ok(Self::Published),
			"SOLD" => Ok(Self::Sold),
			"DELETED" => Ok(Self::Deleted),
			other => Err(Error::InvalidPropertyStatus(other.to_string())),
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewProperty {
	pub title: String,
	#[serde(default)]
	pub description: String,
	pub address: String,
	#[serde(default)]
	pub city: Option<String>,
	pub property_type: PropertyType,
	#[serde(default)]
	pub area: Option<f64>,
	#[serde(default)]
	pub price: Option<i64>,
	#[serde(default)]
	pub rooms: Option<i32>,
	pub status: PropertyStatus,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PropertyPatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub address: Option<String>,
	pub city: Option<String>,
	pub property_type: Option<PropertyType>,
	pub area: Option<f64>,
	pub price: Option<i64>,
	pub rooms: Option<i32>,
	pub status: Option<PropertyStatus>,
	pub owner_user_id: Option<Uuid>,
}
impl PropertyPatch {
	pub fn is_empty(&self) -> bool {
		self.title.is_none()
			&& self.description.is_none()
			&& self.address.is_none()
			&& self.city.is_none()
			&& self.property_type.is_none()
			&& self.area.is_none()
			&& self.price.is_none()
			&& self.rooms.is_none()
			&& self.status.is_none()
			&& self.owner_user_id.is_none()
	}

	pub fn touches_embedding(&self) -> bool {
		self.title.is_some()
			|| self.description.is_some()
			|| self.address.is_some()
			|| self.city.is_some()
			|| self.area.is_some()
			|| self.price.is_some()
			|| self.rooms.is_some()
	}
}

/// A property returned by a search, carrying the primary similarity and the
/// weighted component scores filled in by the ranking stage.
#[derive(Clone, Debug, Serialize)]
pub struct MatchedProperty {
	pub property: Property,
	/// Cosine similarity in [0, 1]; blended with the reranker score when the
	/// reranker ran.
	pub similarity: f64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub total_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub district_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rooms_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub area_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub semantic_score: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub match_explanation: Option<String>,
}
impl MatchedProperty {
	pub fn new(property: Property, similarity: f64) -> Self {
		Self {
			property,
			similarity,
			total_score: None,
			price_score: None,
			district_score: None,
			rooms_score: None,
			area_score: None,
			semantic_score: None,
			match_explanation: None,
		}
	}
}

/// Per-lead ranking weights. Construct through [`MatchWeights::new`] or call
/// [`MatchWeights::normalize`] after arithmetic; ranking assumes the
/// components sum to 1 within 1e-2.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchWeights {
	pub price: f64,
	pub district: f64,
	pub rooms: f64,
	pub area: f64,
	pub semantic: f64,
}
impl MatchWeights {
	pub fn new(price: f64, district: f64, rooms: f64, area: f64, semantic: f64) -> Self {
		Self { price, district, rooms, area, semantic }.normalize()
	}

	pub fn normalize(self) -> Self {
		let total = self.price + self.district + self.rooms + self.area + self.semantic;

		if !total.is_finite() || total <= 0.0 {
			return Self::default();
		}

		Self {
			price: self.price / total,
			district: self.district / total,
			rooms: self.rooms / total,
			area: self.area / total,
			semantic: self.semantic / total,
		}
	}

	pub fn sum(self) -> f64 {
		self.price + self.district + self.rooms + self.area + self.semantic
	}
}
impl Default for MatchWeights {
	fn default() -> Self {
		Self { price: 0.30, district: 0.25, rooms: 0.20, area: 0.10, semantic: 0.15 }
	}
}

/// Preferences that shape the weighted score but never exclude a candidate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftCriteria {
	pub target_price: Option<i64>,
	pub target_district: Option<String>,
	pub target_rooms: Option<i32>,
	pub target_area: Option<f64>,
	#[serde(default)]
	pub preferred_districts: Vec<String>,
}

/// Conjunctive pre-filters; a candidate failing any of them never reaches
/// ranking.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HardFilters {
	pub city: Option<String>,
	pub property_type: Option<PropertyType>,
	pub min_rooms: Option<i32>,
	pub max_rooms: Option<i32>,
	pub min_price: Option<i64>,
	pub max_price: Option<i64>,
}
impl HardFilters {
	/// Builds the hard filters for a lead: exact city and property type,
	/// rooms widened by ±1 (floored at 1) and price by ±20%.
	pub fn from_lead_signals(
		city: Option<String>,
		property_type: Option<PropertyType>,
		criteria: Option<&SoftCriteria>,
	) -> Self {
		let mut filters = Self { city, property_type, ..Self::default() };

		if let Some(criteria) = criteria {
			if let Some(rooms) = criteria.target_rooms {
				filters.min_rooms = Some((rooms - 1).max(1));
				filters.max_rooms = Some(rooms + 1);
			}
			if let Some(price) = criteria.target_price {
				filters.min_price = Some((price as f64 * 0.8) as i64);
				filters.max_price = Some((price as f64 * 1.2) as i64);
			}
		}

		filters
	}

	pub fn is_empty(&self) -> bool {
		self.city.is_none()
			&& self.property_type.is_none()
			&& self.min_rooms.is_none()
			&& self.max_rooms.is_none()
			&& self.min_price.is_none()
			&& self.max_price.is_none()
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct WeightPreset {
	pub id: &'static str,
	pub name: &'static str,
	pub description: &'static str,
	pub weights: MatchWeights,
}

pub fn weight_presets() -> Vec<WeightPreset> {
	vec![
		WeightPreset {
			id: "balanced",
			name: "Сбалансированный",
			description: "Равномерное распределение",
			weights: MatchWeights {
				price: 0.25,
				district: 0.25,
				rooms: 0.20,
				area: 0.15,
				semantic: 0.15,
			},
		},
		WeightPreset {
			id: "budget_first",
			name: "Бюджет важнее",
			description: "Приоритет на цену",
			weights: MatchWeights {
				price: 0.45,
				district: 0.20,
				rooms: 0.15,
				area: 0.10,
				semantic: 0.10,
			},
		},
		WeightPreset {
			id: "location_first",
			name: "Локация важнее",
			description: "Приоритет на район",
			weights: MatchWeights {
				price: 0.20,
				district: 0.40,
				rooms: 0.15,
				area: 0.10,
				semantic: 0.15,
			},
		},
		WeightPreset {
			id: "family",
			name: "Для семьи",
			description: "Комнаты и площадь",
			weights: MatchWeights {
				price: 0.20,
				district: 0.20,
				rooms: 0.30,
				area: 0.20,
				semantic: 0.10,
			},
		},
		WeightPreset {
			id: "semantic",
			name: "Умный поиск",
			description: "Приоритет на семантику",
			weights: MatchWeights {
				price: 0.15,
				district: 0.15,
				rooms: 0.15,
				area: 0.10,
				semantic: 0.45,
			},
		},
	]
}

pub fn preset_by_id(id: &str) -> Option<WeightPreset> {
	weight_presets().into_iter().find(|preset| preset.id == id)
}

pub fn preset_for_lead_type(lead_type: &str) -> WeightPreset {
	let id = match lead_type {
		"budget_oriented" | "investor" => "budget_first",
		"location_oriented" => "location_first",
		"family_oriented" => "family",
		"luxury" => "semantic",
		_ => "balanced",
	};

	preset_by_id(id).unwrap_or_else(|| WeightPreset {
		id: "balanced",
		name: "Сбалансированный",
		description: "Равномерное распределение",
		weights: MatchWeights::default(),
	})
}
