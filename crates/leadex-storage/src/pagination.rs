use sqlx::{Postgres, QueryBuilder};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tracing::warn;
use uuid::Uuid;

use leadex_domain::{OrderDirection, PageCursor, PaginationParams, normalize_page_size};

pub(crate) struct ResolvedPagination {
	pub page_size: i32,
	pub order_by: &'static str,
	pub direction: OrderDirection,
	pub cursor: Option<PageCursor>,
}

/// Normalizes the caller's pagination input. The order column is validated
/// against a whitelist and a malformed cursor degrades to "from the start"
/// with a warning, never an error.
pub(crate) fn resolve(params: &PaginationParams, allowed: &[&'static str]) -> ResolvedPagination {
	let page_size = normalize_page_size(params.page_size);
	let order_by = params
		.order_by
		.as_deref()
		.and_then(|requested| allowed.iter().find(|column| **column == requested))
		.copied()
		.unwrap_or("created_at");
	let direction = params.order_direction.unwrap_or_default();
	let cursor = match params.page_token.as_deref() {
		None | Some("") => None,
		Some(token) => match PageCursor::decode(token) {
			Ok(cursor) => cursor,
			Err(err) => {
				warn!(error = %err, "Failed to decode page cursor. Starting from the beginning.");

				None
			},
		},
	};

	ResolvedPagination { page_size, order_by, direction, cursor }
}

enum OrderKey {
	Timestamp(OffsetDateTime),
	Text(String),
	Integer(i64),
}

fn cursor_order_key(order_by: &str, cursor: &PageCursor) -> Option<OrderKey> {
	match order_by {
		"created_at" => Some(OrderKey::Timestamp(cursor.last_created_at)),
		"updated_at" => cursor
			.last_value
			.as_deref()
			.and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
			.map(OrderKey::Timestamp),
		"price" =>
			cursor.last_value.as_deref().and_then(|raw| raw.parse().ok()).map(OrderKey::Integer),
		_ => cursor.last_value.clone().map(OrderKey::Text),
	}
}

/// Appends the keyset predicate `(order_col, id) < (value, id)` (reversed
/// for ascending order). A cursor that carries no usable value for the order
/// column is ignored, matching the malformed-token behavior.
pub(crate) fn push_keyset(
	builder: &mut QueryBuilder<'_, Postgres>,
	id_column: &str,
	pagination: &ResolvedPagination,
) {
	let Some(cursor) = pagination.cursor.as_ref() else {
		return;
	};
	let Some(key) = cursor_order_key(pagination.order_by, cursor) else {
		warn!(
			order_by = pagination.order_by,
			"Page cursor carries no value for the order column. Starting from the beginning."
		);

		return;
	};
	let comparison = match pagination.direction {
		OrderDirection::Desc => " < (",
		OrderDirection::Asc => " > (",
	};

	builder.push(format!(" AND ({}, {id_column})", pagination.order_by));
	builder.push(comparison);

	match key {
		OrderKey::Timestamp(ts) => {
			builder.push_bind(ts);
		},
		OrderKey::Text(text) => {
			builder.push_bind(text);
		},
		OrderKey::Integer(value) => {
			builder.push_bind(value);
		},
	}

	builder.push(", ");
	builder.push_bind(cursor.last_id);
	builder.push(")");
}

pub(crate) fn push_order_and_limit(
	builder: &mut QueryBuilder<'_, Postgres>,
	id_column: &str,
	pagination: &ResolvedPagination,
) {
	let direction = pagination.direction.as_sql();

	builder.push(format!(
		" ORDER BY {order} {direction}, {id_column} {direction} LIMIT ",
		order = pagination.order_by,
	));
	// Over-fetch one row to derive has_more.
	builder.push_bind(pagination.page_size as i64 + 1);
}

/// Token pointing at the last returned row. `last_value` carries the order
/// column's value whenever it is not `created_at`.
pub(crate) fn next_token(
	order_by: &str,
	last_id: Uuid,
	created_at: OffsetDateTime,
	order_value: Option<String>,
) -> String {
	PageCursor {
		last_id,
		last_created_at: created_at,
		last_value: if order_by == "created_at" { None } else { order_value },
	}
	.encode()
}

pub(crate) fn timestamp_token_value(ts: OffsetDateTime) -> Option<String> {
	ts.format(&Rfc3339).ok()
}
