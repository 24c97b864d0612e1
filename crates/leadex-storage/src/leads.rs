use serde_json::Value;
use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use leadex_domain::{Lead, LeadPatch, LeadStatus, NewLead, Page, PaginationParams};

use crate::{
	Error, Result,
	db::Db,
	models::{LEAD_COLUMNS, LEAD_LIST_COLUMNS, LeadRow},
	pagination, vector,
};

const ORDERABLE_COLUMNS: &[&str] = &["created_at", "updated_at", "title"];

#[derive(Clone, Debug, Default)]
pub struct LeadFilter {
	pub status: Option<LeadStatus>,
	pub city: Option<String>,
	pub owner_user_id: Option<Uuid>,
	pub created_user_id: Option<Uuid>,
	pub pagination: PaginationParams,
}

#[derive(Clone)]
pub struct LeadRepository {
	pool: PgPool,
}
impl LeadRepository {
	pub fn new(db: &Db) -> Self {
		Self { pool: db.pool.clone() }
	}

	/// Inserts the lead without an embedding; indexing owns that column.
	pub async fn create(&self, lead: &NewLead) -> Result<Uuid> {
		let requirement = Value::Object(lead.requirement.0.clone());
		let (lead_id,): (Uuid,) = sqlx::query_as(
			"\
INSERT INTO leads (
	title,
	description,
	requirement,
	contact_name,
	contact_phone,
	contact_email,
	city,
	property_type,
	status,
	owner_user_id,
	created_user_id
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
RETURNING lead_id",
		)
		.bind(&lead.title)
		.bind(&lead.description)
		.bind(requirement)
		.bind(&lead.contact_name)
		.bind(&lead.contact_phone)
		.bind(&lead.contact_email)
		.bind(&lead.city)
		.bind(lead.property_type.map(|property_type| property_type.as_str()))
		.bind(lead.status.as_str())
		.bind(lead.owner_user_id)
		.bind(lead.created_user_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(lead_id)
	}

	pub async fn get(&self, lead_id: Uuid) -> Result<Lead> {
		let row: Option<LeadRow> =
			sqlx::query_as(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE lead_id = $1"))
				.bind(lead_id)
				.fetch_optional(&self.pool)
				.await?;

		row.ok_or_else(|| Error::NotFound(format!("Lead {lead_id}.")))?.into_domain()
	}

	pub async fn update(&self, lead_id: Uuid, patch: &LeadPatch) -> Result<()> {
		if patch.is_empty() {
			return Err(Error::InvalidArgument("Lead patch carries no fields.".to_string()));
		}

		let mut builder = QueryBuilder::new("UPDATE leads SET ");
		let mut set = builder.separated(", ");

		if let Some(title) = &patch.title {
			set.push("title = ").push_bind_unseparated(title);
		}
		if let Some(description) = &patch.description {
			set.push("description = ").push_bind_unseparated(description);
		}
		if let Some(requirement) = &patch.requirement {
			set.push("requirement = ")
				.push_bind_unseparated(Value::Object(requirement.0.clone()));
		}
		if let Some(contact_name) = &patch.contact_name {
			set.push("contact_name = ").push_bind_unseparated(contact_name);
		}
		if let Some(contact_phone) = &patch.contact_phone {
			set.push("contact_phone = ").push_bind_unseparated(contact_phone);
		}
		if let Some(contact_email) = &patch.contact_email {
			set.push("contact_email = ").push_bind_unseparated(contact_email);
		}
		if let Some(city) = &patch.city {
			set.push("city = ").push_bind_unseparated(city);
		}
		if let Some(property_type) = patch.property_type {
			set.push("property_type = ").push_bind_unseparated(property_type.as_str());
		}
		if let Some(status) = patch.status {
			set.push("status = ").push_bind_unseparated(status.as_str());
		}
		if let Some(owner_user_id) = patch.owner_user_id {
			set.push("owner_user_id = ").push_bind_unseparated(owner_user_id);
		}

		set.push("updated_at = NOW()");
		builder.push(" WHERE lead_id = ");
		builder.push_bind(lead_id);

		let result = builder.build().execute(&self.pool).await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("Lead {lead_id}.")));
		}

		Ok(())
	}

	pub async fn list(&self, filter: &LeadFilter) -> Result<Page<Lead>> {
		let pagination = pagination::resolve(&filter.pagination, ORDERABLE_COLUMNS);

		// Total count runs against the base predicates, without the cursor.
		let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM leads WHERE TRUE");

		push_filters(&mut count_builder, filter);

		let total_count: i64 =
			count_builder.build_query_scalar().fetch_one(&self.pool).await?;

		let mut builder =
			QueryBuilder::new(format!("SELECT {LEAD_LIST_COLUMNS} FROM leads WHERE TRUE"));

		push_filters(&mut builder, filter);
		pagination::push_keyset(&mut builder, "lead_id", &pagination);
		pagination::push_order_and_limit(&mut builder, "lead_id", &pagination);

		let rows: Vec<LeadRow> = builder.build_query_as().fetch_all(&self.pool).await?;
		let mut leads =
			rows.into_iter().map(LeadRow::into_domain).collect::<Result<Vec<_>>>()?;
		let has_more = leads.len() > pagination.page_size as usize;

		if has_more {
			leads.truncate(pagination.page_size as usize);
		}

		let next_page_token = if has_more {
			leads.last().map(|lead| {
				let order_value = match pagination.order_by {
					"updated_at" => pagination::timestamp_token_value(lead.updated_at),
					"title" => Some(lead.title.clone()),
					_ => None,
				};

				pagination::next_token(
					pagination.order_by,
					lead.lead_id,
					lead.created_at,
					order_value,
				)
			})
		} else {
			None
		};

		Ok(Page { items: leads, next_page_token, total_count: total_count as i32, has_more })
	}

	/// Idempotent embedding write; refreshes the modification timestamp so
	/// read-after-reindex observes the change.
	pub async fn update_embedding(&self, lead_id: Uuid, embedding: &[f32]) -> Result<()> {
		let result = sqlx::query(
			"UPDATE leads SET embedding = $1::vector, updated_at = NOW() WHERE lead_id = $2",
		)
		.bind(vector::vector_to_pg(embedding))
		.bind(lead_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("Lead {lead_id}.")));
		}

		Ok(())
	}
}

fn push_filters(builder: &mut QueryBuilder<'_, sqlx::Postgres>, filter: &LeadFilter) {
	if let Some(status) = filter.status {
		builder.push(" AND status = ");
		builder.push_bind(status.as_str());
	}
	if let Some(city) = &filter.city {
		builder.push(" AND LOWER(city) = LOWER(");
		builder.push_bind(city.clone());
		builder.push(")");
	}
	if let Some(owner_user_id) = filter.owner_user_id {
		builder.push(" AND owner_user_id = ");
		builder.push_bind(owner_user_id);
	}
	if let Some(created_user_id) = filter.created_user_id {
		builder.push(" AND created_user_id = ");
		builder.push_bind(created_user_id);
	}
}
