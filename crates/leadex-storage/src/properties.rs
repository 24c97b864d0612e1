use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use leadex_domain::{
	HardFilters, MatchedProperty, NewProperty, Page, PaginationParams, Property, PropertyPatch,
	PropertyStatus, PropertyType,
};

use crate::{
	Error, Result,
	db::Db,
	models::{MatchedPropertyRow, PROPERTY_COLUMNS, PROPERTY_LIST_COLUMNS, PropertyRow},
	pagination, vector,
};

const ORDERABLE_COLUMNS: &[&str] = &["created_at", "updated_at", "title", "price"];
// Classic RRF constant and per-branch candidate multiplier.
const RRF_K: i32 = 60;
const RRF_BRANCH_FACTOR: i64 = 2;

/// Soft predicates a caller may add on top of the hard filters. These narrow
/// the result set but are not derived from the lead.
#[derive(Clone, Debug, Default)]
pub struct PropertyFilter {
	pub status: Option<PropertyStatus>,
	pub city: Option<String>,
	pub property_type: Option<PropertyType>,
	pub min_rooms: Option<i32>,
	pub max_rooms: Option<i32>,
	pub min_price: Option<i64>,
	pub max_price: Option<i64>,
	pub owner_user_id: Option<Uuid>,
	pub created_user_id: Option<Uuid>,
	pub pagination: PaginationParams,
}

pub struct HybridSearchParams<'a> {
	pub lead_embedding: &'a [f32],
	pub search_query: &'a str,
	pub vector_weight: f64,
	pub fulltext_weight: f64,
	pub filter: &'a PropertyFilter,
	pub hard_filters: &'a HardFilters,
	pub limit: i64,
}

#[derive(Clone)]
pub struct PropertyRepository {
	pool: PgPool,
}
impl PropertyRepository {
	pub fn new(db: &Db) -> Self {
		Self { pool: db.pool.clone() }
	}

	pub async fn create(&self, property: &NewProperty) -> Result<Uuid> {
		let (property_id,): (Uuid,) = sqlx::query_as(
			"\
INSERT INTO properties (
	title,
	description,
	address,
	city,
	property_type,
	area,
	price,
	rooms,
	status,
	owner_user_id,
	created_user_id
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
RETURNING property_id",
		)
		.bind(&property.title)
		.bind(&property.description)
		.bind(&property.address)
		.bind(&property.city)
		.bind(property.property_type.as_str())
		.bind(property.area)
		.bind(property.price)
		.bind(property.rooms)
		.bind(property.status.as_str())
		.bind(property.owner_user_id)
		.bind(property.created_user_id)
		.fetch_one(&self.pool)
		.await?;

		Ok(property_id)
	}

	pub async fn get(&self, property_id: Uuid) -> Result<Property> {
		let row: Option<PropertyRow> = sqlx::query_as(&format!(
			"SELECT {PROPERTY_COLUMNS} FROM properties WHERE property_id = $1"
		))
		.bind(property_id)
		.fetch_optional(&self.pool)
		.await?;

		row.ok_or_else(|| Error::NotFound(format!("Property {property_id}.")))?.into_domain()
	}

	pub async fn update(&self, property_id: Uuid, patch: &PropertyPatch) -> Result<()> {
		if patch.is_empty() {
			return Err(Error::InvalidArgument("Property patch carries no fields.".to_string()));
		}

		let mut builder = QueryBuilder::new("UPDATE properties SET ");
		let mut set = builder.separated(", ");

		if let Some(title) = &patch.title {
			set.push("title = ").push_bind_unseparated(title);
		}
		if let Some(description) = &patch.description {
			set.push("description = ").push_bind_unseparated(description);
		}
		if let Some(address) = &patch.address {
			set.push("address = ").push_bind_unseparated(address);
		}
		if let Some(city) = &patch.city {
			set.push("city = ").push_bind_unseparated(city);
		}
		if let Some(property_type) = patch.property_type {
			set.push("property_type = ").push_bind_unseparated(property_type.as_str());
		}
		if let Some(area) = patch.area {
			set.push("area = ").push_bind_unseparated(area);
		}
		if let Some(price) = patch.price {
			set.push("price = ").push_bind_unseparated(price);
		}
		if let Some(rooms) = patch.rooms {
			set.push("rooms = ").push_bind_unseparated(rooms);
		}
		if let Some(status) = patch.status {
			set.push("status = ").push_bind_unseparated(status.as_str());
		}
		if let Some(owner_user_id) = patch.owner_user_id {
			set.push("owner_user_id = ").push_bind_unseparated(owner_user_id);
		}

		set.push("updated_at = NOW()");
		builder.push(" WHERE property_id = ");
		builder.push_bind(property_id);

		let result = builder.build().execute(&self.pool).await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("Property {property_id}.")));
		}

		Ok(())
	}

	pub async fn list(&self, filter: &PropertyFilter) -> Result<Page<Property>> {
		let pagination = pagination::resolve(&filter.pagination, ORDERABLE_COLUMNS);
		let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM properties WHERE TRUE");

		push_soft_filters(&mut count_builder, filter, None);

		let total_count: i64 =
			count_builder.build_query_scalar().fetch_one(&self.pool).await?;

		let mut builder = QueryBuilder::new(format!(
			"SELECT {PROPERTY_LIST_COLUMNS} FROM properties WHERE TRUE"
		));

		push_soft_filters(&mut builder, filter, None);
		pagination::push_keyset(&mut builder, "property_id", &pagination);
		pagination::push_order_and_limit(&mut builder, "property_id", &pagination);

		let rows: Vec<PropertyRow> = builder.build_query_as().fetch_all(&self.pool).await?;
		let mut properties =
			rows.into_iter().map(PropertyRow::into_domain).collect::<Result<Vec<_>>>()?;
		let has_more = properties.len() > pagination.page_size as usize;

		if has_more {
			properties.truncate(pagination.page_size as usize);
		}

		let next_page_token = if has_more {
			properties.last().map(|property| {
				let order_value = match pagination.order_by {
					"updated_at" => pagination::timestamp_token_value(property.updated_at),
					"title" => Some(property.title.clone()),
					"price" => property.price.map(|price| price.to_string()),
					_ => None,
				};

				pagination::next_token(
					pagination.order_by,
					property.property_id,
					property.created_at,
					order_value,
				)
			})
		} else {
			None
		};

		Ok(Page { items: properties, next_page_token, total_count: total_count as i32, has_more })
	}

	pub async fn update_embedding(&self, property_id: Uuid, embedding: &[f32]) -> Result<()> {
		let result = sqlx::query(
			"\
UPDATE properties SET embedding = $1::vector, updated_at = NOW() WHERE property_id = $2",
		)
		.bind(vector::vector_to_pg(embedding))
		.bind(property_id)
		.execute(&self.pool)
		.await?;

		if result.rows_affected() == 0 {
			return Err(Error::NotFound(format!("Property {property_id}.")));
		}

		Ok(())
	}

	/// Dense retrieval ordered by cosine distance, with the hard filters
	/// enforced in the WHERE clause so excluded candidates never reach
	/// ranking.
	pub async fn match_vector_with_hard_filters(
		&self,
		lead_embedding: &[f32],
		filter: &PropertyFilter,
		hard_filters: &HardFilters,
		limit: i64,
	) -> Result<Vec<MatchedProperty>> {
		let vec_text = vector::vector_to_pg(lead_embedding);
		let mut builder = QueryBuilder::new(format!(
			"SELECT {PROPERTY_COLUMNS}, 1 - (embedding <=> "
		));

		builder.push_bind(vec_text.clone());
		builder.push("::vector) AS similarity FROM properties WHERE embedding IS NOT NULL");

		push_hard_filters(&mut builder, hard_filters);
		push_soft_filters(&mut builder, filter, Some(hard_filters));

		builder.push(" ORDER BY embedding <=> ");
		builder.push_bind(vec_text);
		builder.push("::vector LIMIT ");
		builder.push_bind(limit);

		let rows: Vec<MatchedPropertyRow> =
			builder.build_query_as().fetch_all(&self.pool).await?;

		rows.into_iter().map(into_matched).collect()
	}

	/// Sparse retrieval over the trigger-maintained Russian tsvector. The
	/// reported similarity is the `ts_rank` value.
	pub async fn fulltext_search(
		&self,
		query: &str,
		filter: &PropertyFilter,
		limit: i64,
	) -> Result<Vec<MatchedProperty>> {
		let mut builder = QueryBuilder::new(format!(
			"SELECT {PROPERTY_COLUMNS}, ts_rank(search_vector, plainto_tsquery('russian', "
		));

		builder.push_bind(query.to_string());
		builder.push(
			"))::float8 AS similarity FROM properties \
			 WHERE search_vector @@ plainto_tsquery('russian', ",
		);
		builder.push_bind(query.to_string());
		builder.push(")");

		push_soft_filters(&mut builder, filter, None);

		builder.push(" ORDER BY similarity DESC LIMIT ");
		builder.push_bind(limit);

		let rows: Vec<MatchedPropertyRow> =
			builder.build_query_as().fetch_all(&self.pool).await?;

		rows.into_iter().map(into_matched).collect()
	}

	/// Reciprocal Rank Fusion of the dense and sparse branches. Each branch
	/// is capped at `2 * limit` candidates and contributes
	/// `weight / (60 + rank)`; a candidate missing from a branch contributes
	/// zero there. An empty query or a zero full-text weight degenerates to
	/// the pure vector match and skips the fusion SQL entirely.
	pub async fn hybrid_search(
		&self,
		params: HybridSearchParams<'_>,
	) -> Result<Vec<MatchedProperty>> {
		let query = params.search_query.trim();

		if query.is_empty() || params.fulltext_weight <= 0.0 {
			return self
				.match_vector_with_hard_filters(
					params.lead_embedding,
					params.filter,
					params.hard_filters,
					params.limit,
				)
				.await;
		}

		let vec_text = vector::vector_to_pg(params.lead_embedding);
		let branch_limit = params.limit * RRF_BRANCH_FACTOR;
		let mut builder = QueryBuilder::new(
			"WITH vector_candidates AS (\
			 SELECT property_id, ROW_NUMBER() OVER (ORDER BY embedding <=> ",
		);

		builder.push_bind(vec_text.clone());
		builder.push("::vector) AS rank FROM properties WHERE embedding IS NOT NULL");
		push_hard_filters(&mut builder, params.hard_filters);
		push_soft_filters(&mut builder, params.filter, Some(params.hard_filters));
		builder.push(" ORDER BY embedding <=> ");
		builder.push_bind(vec_text.clone());
		builder.push("::vector LIMIT ");
		builder.push_bind(branch_limit);

		// The full-text branch deliberately skips the embedding IS NOT NULL
		// guard: rows without a vector are reachable only through it.
		builder.push(
			"), fulltext_candidates AS (\
			 SELECT property_id, ROW_NUMBER() OVER (ORDER BY \
			 ts_rank(search_vector, plainto_tsquery('russian', ",
		);
		builder.push_bind(query.to_string());
		builder
			.push(")) DESC) AS rank FROM properties WHERE search_vector @@ plainto_tsquery('russian', ");
		builder.push_bind(query.to_string());
		builder.push(")");
		push_hard_filters(&mut builder, params.hard_filters);
		push_soft_filters(&mut builder, params.filter, Some(params.hard_filters));
		builder.push(" ORDER BY rank LIMIT ");
		builder.push_bind(branch_limit);

		builder.push(
			"), fused AS (\
			 SELECT property_id, COALESCE(",
		);
		builder.push_bind(params.vector_weight);
		builder.push(&format!(" / ({RRF_K} + v.rank), 0) + COALESCE("));
		builder.push_bind(params.fulltext_weight);
		builder.push(&format!(
			" / ({RRF_K} + f.rank), 0) AS rrf_score \
			 FROM vector_candidates v FULL OUTER JOIN fulltext_candidates f USING (property_id))"
		));

		builder.push(&format!(
			" SELECT {columns}, COALESCE(1 - (p.embedding <=> ",
			columns = prefixed_property_columns("p")
		));
		builder.push_bind(vec_text);
		builder.push(
			"::vector), 0)::float8 AS similarity \
			 FROM fused JOIN properties p USING (property_id) \
			 ORDER BY fused.rrf_score DESC LIMIT ",
		);
		builder.push_bind(params.limit);

		let rows: Vec<MatchedPropertyRow> =
			builder.build_query_as().fetch_all(&self.pool).await?;

		rows.into_iter().map(into_matched).collect()
	}
}

fn into_matched(row: MatchedPropertyRow) -> Result<MatchedProperty> {
	Ok(MatchedProperty::new(row.property.into_domain()?, row.similarity))
}

fn prefixed_property_columns(alias: &str) -> String {
	format!(
		"{alias}.property_id, {alias}.title, {alias}.description, {alias}.address, {alias}.city, \
		 {alias}.property_type, {alias}.area, {alias}.price, {alias}.rooms, {alias}.status, \
		 {alias}.owner_user_id, {alias}.created_user_id, {alias}.embedding::text AS embedding, \
		 {alias}.created_at, {alias}.updated_at"
	)
}

/// Hard predicates derived from the lead. Range checks are NULL-permissive:
/// a property missing the attribute passes, a present value must lie in
/// range.
fn push_hard_filters(builder: &mut QueryBuilder<'_, Postgres>, hard_filters: &HardFilters) {
	if let Some(city) = hard_filters.city.as_ref().filter(|city| !city.is_empty()) {
		builder.push(" AND LOWER(city) = LOWER(");
		builder.push_bind(city.clone());
		builder.push(")");
	}
	if let Some(property_type) = hard_filters.property_type {
		builder.push(" AND property_type = ");
		builder.push_bind(property_type.as_str());
	}
	if let Some(min_rooms) = hard_filters.min_rooms {
		builder.push(" AND (rooms >= ");
		builder.push_bind(min_rooms);
		builder.push(" OR rooms IS NULL)");
	}
	if let Some(max_rooms) = hard_filters.max_rooms {
		builder.push(" AND (rooms <= ");
		builder.push_bind(max_rooms);
		builder.push(" OR rooms IS NULL)");
	}
	if let Some(min_price) = hard_filters.min_price {
		builder.push(" AND (price >= ");
		builder.push_bind(min_price);
		builder.push(" OR price IS NULL)");
	}
	if let Some(max_price) = hard_filters.max_price {
		builder.push(" AND (price <= ");
		builder.push_bind(max_price);
		builder.push(" OR price IS NULL)");
	}
}

/// Caller-supplied soft predicates. Fields already constrained by a hard
/// filter are skipped so the two never conflict.
fn push_soft_filters(
	builder: &mut QueryBuilder<'_, Postgres>,
	filter: &PropertyFilter,
	hard_filters: Option<&HardFilters>,
) {
	let hard = hard_filters.cloned().unwrap_or_default();

	if let Some(status) = filter.status {
		builder.push(" AND status = ");
		builder.push_bind(status.as_str());
	}
	if let Some(city) = &filter.city
		&& hard.city.is_none()
	{
		builder.push(" AND LOWER(city) = LOWER(");
		builder.push_bind(city.clone());
		builder.push(")");
	}
	if let Some(property_type) = filter.property_type
		&& hard.property_type.is_none()
	{
		builder.push(" AND property_type = ");
		builder.push_bind(property_type.as_str());
	}
	if let Some(min_rooms) = filter.min_rooms
		&& hard.min_rooms.is_none()
	{
		builder.push(" AND rooms >= ");
		builder.push_bind(min_rooms);
	}
	if let Some(max_rooms) = filter.max_rooms
		&& hard.max_rooms.is_none()
	{
		builder.push(" AND rooms <= ");
		builder.push_bind(max_rooms);
	}
	if let Some(min_price) = filter.min_price
		&& hard.min_price.is_none()
	{
		builder.push(" AND price >= ");
		builder.push_bind(min_price);
	}
	if let Some(max_price) = filter.max_price
		&& hard.max_price.is_none()
	{
		builder.push(" AND price <= ");
		builder.push_bind(max_price);
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
