use serde_json::Value;
use sqlx::FromRow;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use leadex_domain::{Lead, Property, Requirement};

use crate::{Result, vector};

/// Column order shared by every lead SELECT; `embedding::text` keeps the
/// vector readable without a driver-side pgvector type.
pub const LEAD_COLUMNS: &str = "\
lead_id, title, description, requirement, contact_name, contact_phone, contact_email, city, \
property_type, status, owner_user_id, created_user_id, embedding::text AS embedding, created_at, \
updated_at";

/// Listing variant: page scans never need the vector.
pub const LEAD_LIST_COLUMNS: &str = "\
lead_id, title, description, requirement, contact_name, contact_phone, contact_email, city, \
property_type, status, owner_user_id, created_user_id, NULL::text AS embedding, created_at, \
updated_at";

pub const PROPERTY_COLUMNS: &str = "\
property_id, title, description, address, city, property_type, area, price, rooms, status, \
owner_user_id, created_user_id, embedding::text AS embedding, created_at, updated_at";

pub const PROPERTY_LIST_COLUMNS: &str = "\
property_id, title, description, address, city, property_type, area, price, rooms, status, \
owner_user_id, created_user_id, NULL::text AS embedding, created_at, updated_at";

#[derive(Debug, FromRow)]
pub struct LeadRow {
	pub lead_id: Uuid,
	pub title: String,
	pub description: String,
	pub requirement: Value,
	pub contact_name: String,
	pub contact_phone: String,
	pub contact_email: Option<String>,
	pub city: Option<String>,
	pub property_type: Option<String>,
	pub status: String,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
	pub embedding: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl LeadRow {
	pub fn into_domain(self) -> Result<Lead> {
		let property_type = self
			.property_type
			.as_deref()
			.filter(|raw| !raw.is_empty())
			.map(str::parse)
			.transpose()?;
		let requirement = match self.requirement {
			Value::Object(map) => Requirement::new(map),
			_ => Requirement::default(),
		};

		Ok(Lead {
			lead_id: self.lead_id,
			title: self.title,
			description: self.description,
			requirement,
			contact_name: self.contact_name,
			contact_phone: self.contact_phone,
			contact_email: self.contact_email,
			city: self.city,
			property_type,
			status: self.status.parse()?,
			owner_user_id: self.owner_user_id,
			created_user_id: self.created_user_id,
			embedding: decode_embedding(self.embedding.as_deref(), self.lead_id),
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}

#[derive(Debug, FromRow)]
pub struct PropertyRow {
	pub property_id: Uuid,
	pub title: String,
	pub description: String,
	pub address: String,
	pub city: Option<String>,
	pub property_type: String,
	pub area: Option<f64>,
	pub price: Option<i64>,
	pub rooms: Option<i32>,
	pub status: String,
	pub owner_user_id: Uuid,
	pub created_user_id: Uuid,
	pub embedding: Option<String>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl PropertyRow {
	pub fn into_domain(self) -> Result<Property> {
		Ok(Property {
			property_id: self.property_id,
			title: self.title,
			description: self.description,
			address: self.address,
			city: self.city,
			property_type: self.property_type.parse()?,
			area: self.area,
			price: self.price,
			rooms: self.rooms,
			status: self.status.parse()?,
			owner_user_id: self.owner_user_id,
			created_user_id: self.created_user_id,
			embedding: decode_embedding(self.embedding.as_deref(), self.property_id),
			created_at: self.created_at,
			updated_at: self.updated_at,
		})
	}
}

#[derive(Debug, FromRow)]
pub struct MatchedPropertyRow {
	#[sqlx(flatten)]
	pub property: PropertyRow,
	pub similarity: f64,
}

fn decode_embedding(raw: Option<&str>, entity_id: Uuid) -> Option<Vec<f32>> {
	let raw = raw.filter(|raw| !raw.is_empty())?;

	match vector::parse_pg_vector(raw) {
		Ok(vec) => Some(vec),
		Err(err) => {
			warn!(entity_id = %entity_id, error = %err, "Failed to parse stored embedding.");

			None
		},
	}
}
