use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Error, Result};

pub const DEFAULT_PAGE_SIZE: i32 = 20;
pub const MAX_PAGE_SIZE: i32 = 10_000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderDirection {
	Asc,
	#[default]
	Desc,
}
impl OrderDirection {
	pub fn as_sql(self) -> &'static str {
		match self {
			Self::Asc => "ASC",
			Self::Desc => "DESC",
		}
	}

	pub fn parse(raw: &str) -> Self {
		if raw.eq_ignore_ascii_case("asc") { Self::Asc } else { Self::Desc }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaginationParams {
	pub page_size: Option<i32>,
	pub page_token: Option<String>,
	pub order_by: Option<String>,
	pub order_direction: Option<OrderDirection>,
}

/// Last-seen position of a keyset scan; opaque to clients as a base64-URL
/// JSON token. A cursor only identifies a position under the same
/// `(order_by, order_direction)` it was produced with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
	#[serde(rename = "id")]
	pub last_id: Uuid,
	#[serde(rename = "ca", with = "crate::time_serde")]
	pub last_created_at: OffsetDateTime,
	#[serde(rename = "v", skip_serializing_if = "Option::is_none", default)]
	pub last_value: Option<String>,
}
impl PageCursor {
	pub fn encode(&self) -> String {
		let json = serde_json::to_vec(self).unwrap_or_default();

		URL_SAFE.encode(json)
	}

	/// `Ok(None)` for an empty token; malformed tokens are an error the
	/// caller downgrades to "from the start".
	pub fn decode(token: &str) -> Result<Option<Self>> {
		if token.is_empty() {
			return Ok(None);
		}

		let bytes =
			URL_SAFE.decode(token).map_err(|err| Error::InvalidCursor(err.to_string()))?;
		let cursor = serde_json::from_slice(&bytes)
			.map_err(|err| Error::InvalidCursor(err.to_string()))?;

		Ok(Some(cursor))
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
	pub items: Vec<T>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub next_page_token: Option<String>,
	pub total_count: i32,
	pub has_more: bool,
}

pub fn normalize_page_size(size: Option<i32>) -> i32 {
	match size {
		Some(size) if size > 0 => size.min(MAX_PAGE_SIZE),
		_ => DEFAULT_PAGE_SIZE,
	}
}
