use axum::{
	Json, Router,
	extract::{Path, Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use leadex_domain::{
	Lead, LeadPatch, LeadStatus, MatchedProperty, NewLead, NewProperty, OrderDirection, Page,
	PaginationParams, Property, PropertyPatch, PropertyStatus, PropertyType, WeightPreset,
	weight_presets,
};
use leadex_providers::{llm, metrics};
use leadex_service::{Error as ServiceError, clarification::ClarificationResult};
use leadex_storage::{leads::LeadFilter, properties::PropertyFilter};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/leads", post(create_lead).get(list_leads))
		.route("/v1/leads/{id}", get(get_lead).patch(update_lead))
		.route("/v1/leads/{id}/reindex", post(reindex_lead))
		.route("/v1/leads/{id}/match", post(match_lead))
		.route("/v1/leads/{id}/clarification", post(clarification_questions))
		.route("/v1/leads/{id}/clarification/answers", post(apply_clarification_answers))
		.route("/v1/properties", post(create_property).get(list_properties))
		.route("/v1/properties/{id}", get(get_property).patch(update_property))
		.route("/v1/properties/{id}/reindex", post(reindex_property))
		.route("/v1/properties/{id}/generate-listing", post(generate_listing))
		.route("/v1/properties/{id}/enrich-description", post(enrich_description))
		.route("/v1/weights/presets", get(presets))
		.route("/v1/ai/metrics", get(ai_metrics))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

#[derive(Debug, Deserialize)]
struct ListQuery {
	status: Option<String>,
	city: Option<String>,
	property_type: Option<PropertyType>,
	owner_user_id: Option<Uuid>,
	created_user_id: Option<Uuid>,
	page_size: Option<i32>,
	page_token: Option<String>,
	order_by: Option<String>,
	order_direction: Option<OrderDirection>,
}
impl ListQuery {
	fn pagination(&self) -> PaginationParams {
		PaginationParams {
			page_size: self.page_size,
			page_token: self.page_token.clone(),
			order_by: self.order_by.clone(),
			order_direction: self.order_direction,
		}
	}
}

/// Soft constraints a caller may add to the advanced match; everything
/// lead-derived (city, rooms, price tolerances) is synthesized server-side.
#[derive(Debug, Default, Deserialize)]
struct MatchRequest {
	#[serde(default)]
	limit: Option<i64>,
	status: Option<PropertyStatus>,
	property_type: Option<PropertyType>,
	min_rooms: Option<i32>,
	max_rooms: Option<i32>,
	min_price: Option<i64>,
	max_price: Option<i64>,
}

async fn create_lead(
	State(state): State<AppState>,
	Json(payload): Json<NewLead>,
) -> Result<Json<Lead>, ApiError> {
	Ok(Json(state.service.create_lead(payload).await?))
}

async fn get_lead(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<Lead>, ApiError> {
	Ok(Json(state.service.get_lead(id).await?))
}

async fn update_lead(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<LeadPatch>,
) -> Result<Json<Lead>, ApiError> {
	Ok(Json(state.service.update_lead(id, payload).await?))
}

async fn list_leads(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<Page<Lead>>, ApiError> {
	let status = query
		.status
		.as_deref()
		.map(str::parse::<LeadStatus>)
		.transpose()
		.map_err(|err| ApiError::bad_request(err.to_string()))?;
	let filter = LeadFilter {
		status,
		city: query.city.clone(),
		owner_user_id: query.owner_user_id,
		created_user_id: query.created_user_id,
		pagination: query.pagination(),
	};

	Ok(Json(state.service.list_leads(filter).await?))
}

async fn reindex_lead(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.service.reindex_lead(id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn match_lead(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<MatchRequest>,
) -> Result<Json<Vec<MatchedProperty>>, ApiError> {
	let filter = PropertyFilter {
		status: payload.status,
		property_type: payload.property_type,
		min_rooms: payload.min_rooms,
		max_rooms: payload.max_rooms,
		min_price: payload.min_price,
		max_price: payload.max_price,
		..PropertyFilter::default()
	};
	let matches =
		state.service.match_advanced(id, filter, payload.limit.unwrap_or(0)).await?;

	Ok(Json(matches))
}

async fn clarification_questions(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<ClarificationResult>, ApiError> {
	Ok(Json(state.service.clarification_questions(id).await?))
}

async fn apply_clarification_answers(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(answers): Json<Map<String, Value>>,
) -> Result<Json<Lead>, ApiError> {
	Ok(Json(state.service.apply_clarification_answers(id, answers).await?))
}

async fn create_property(
	State(state): State<AppState>,
	Json(payload): Json<NewProperty>,
) -> Result<Json<Property>, ApiError> {
	Ok(Json(state.service.create_property(payload).await?))
}

async fn get_property(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<Property>, ApiError> {
	Ok(Json(state.service.get_property(id).await?))
}

async fn update_property(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
	Json(payload): Json<PropertyPatch>,
) -> Result<Json<Property>, ApiError> {
	Ok(Json(state.service.update_property(id, payload).await?))
}

async fn list_properties(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<Page<Property>>, ApiError> {
	let status = query
		.status
		.as_deref()
		.map(str::parse::<PropertyStatus>)
		.transpose()
		.map_err(|err| ApiError::bad_request(err.to_string()))?;
	let filter = PropertyFilter {
		status,
		city: query.city.clone(),
		property_type: query.property_type,
		owner_user_id: query.owner_user_id,
		created_user_id: query.created_user_id,
		pagination: query.pagination(),
		..PropertyFilter::default()
	};

	Ok(Json(state.service.list_properties(filter).await?))
}

async fn reindex_property(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
	state.service.reindex_property(id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn generate_listing(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<llm::GenerateListingResponse>, ApiError> {
	Ok(Json(state.service.generate_listing_content(id).await?))
}

async fn enrich_description(
	State(state): State<AppState>,
	Path(id): Path<Uuid>,
) -> Result<Json<llm::EnrichDescriptionResponse>, ApiError> {
	Ok(Json(state.service.enrich_description(id).await?))
}

async fn presets() -> Json<Vec<WeightPreset>> {
	Json(weight_presets())
}

async fn ai_metrics() -> Json<metrics::Snapshot> {
	Json(metrics::global().snapshot())
}

struct ApiError {
	status: StatusCode,
	message: String,
}
impl ApiError {
	fn bad_request(message: String) -> Self {
		Self { status: StatusCode::BAD_REQUEST, message }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let status = match &err {
			ServiceError::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
			ServiceError::NotFound { .. } | ServiceError::NotIndexed { .. } =>
				StatusCode::NOT_FOUND,
			ServiceError::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
			ServiceError::Provider { .. } | ServiceError::Storage { .. } =>
				StatusCode::INTERNAL_SERVER_ERROR,
		};

		Self { status, message: err.to_string() }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		(self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
	}
}
