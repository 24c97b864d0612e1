use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result, property::PropertyType, requirement::Requirement};

/// A buyer's request. Created without an embedding; the indexing pipeline is
/// the only writer of the `embedding` column.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lead {
	pub lead_id: Uuid,
	pub title: String,
	pub description: String,
	pub requirement: Requirement,
	pub contact_name: String,
	pub contact_phone: String,
	pub contact_email: Option<String>,
	pub city: Option<String>,
	pub property_type: Option<PropertyType>,
	pub status: LeadStatus,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
	#[serde(skip_serializing_if = "Option::is_none", default)]
	pub embedding: Option<Vec<f32>>,
	#[serde(with = "crate::time_serde")]
	pub created_at: OffsetDateTime,
	#[serde(with = "crate::time_serde")]
	pub updated_at: OffsetDateTime,
}
impl Lead {
	/// Free text the retrieval and rerank stages see for this lead.
	pub fn search_text(&self) -> String {
		format!("{} {}", self.title, self.description).trim().to_string()
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
	New,
	Published,
	Purchased,
	Deleted,
}
impl LeadStatus {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::New => "NEW",
			Self::Published => "PUBLISHED",
			Self::Purchased => "PURCHASED",
			Self::Deleted => "DELETED",
		}
	}
}
impl FromStr for LeadStatus {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"NEW" => Ok(Self::New),
			"PUBLISHED" => Ok(Self::Published),
			"PURCHASED" => Ok(Self::Purchased),
			"DELETED" => Ok(Self::Deleted),
			other => Err(Error::InvalidLeadStatus(other.to_string())),
		}
	}
}

/// Creation payload; the row is persisted first and indexing follows in the
/// background.
#[derive(Clone, Debug, Deserialize)]
pub struct NewLead {
	pub title: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub requirement: Requirement,
	pub contact_name: String,
	pub contact_phone: String,
	#[serde(default)]
	pub contact_email: Option<String>,
	#[serde(default)]
	pub city: Option<String>,
	#[serde(default)]
	pub property_type: Option<PropertyType>,
	pub status: LeadStatus,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
}

/// Partial update; only present fields reach the SQL `SET` list.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LeadPatch {
	pub title: Option<String>,
	pub description: Option<String>,
	pub requirement: Option<Requirement>,
	pub contact_name: Option<String>,
	pub contact_phone: Option<String>,
	pub contact_email: Option<String>,
	pub city: Option<String>,
	pub property_type: Option<PropertyType>,
	pub status: Option<LeadStatus>,
	pub owner_user_id: Option<Uuid>,
}
impl LeadPatch {
	pub fn is_empty(&self) -> bool {
		self.title.is_none()
			&& self.description.is_none()
			&& self.requirement.is_none()
			&& self.contact_name.is_none()
			&& self.contact_phone.is_none()
			&& self.contact_email.is_none()
			&& self.city.is_none()
			&& self.property_type.is_none()
			&& self.status.is_none()
			&& self.owner_user_id.is_none()
	}

	/// Whether this patch can change what the embedding represents.
	pub fn touches_embedding(&self) -> bool {
		self.title.is_some()
			|| self.description.is_some()
			|| self.requirement.is_some()
			|| self.city.is_some()
	}
}
