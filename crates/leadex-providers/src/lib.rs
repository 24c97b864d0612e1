pub mod embedding;
pub mod llm;
pub mod metrics;
pub mod rerank;

mod error;

pub use error::{Error, Result};

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};

const BODY_TAIL_CHARS: usize = 256;

pub(crate) fn http_client(timeout_ms: u64) -> Result<Client> {
	Ok(Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?)
}

pub(crate) fn with_auth(builder: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
	match api_key {
		Some(key) if !key.is_empty() => builder.bearer_auth(key),
		_ => builder,
	}
}

/// Resolves a non-2xx response into an error carrying the status and the
/// tail of the body, which is where upstream services put the reason.
pub(crate) async fn ensure_success(response: Response) -> Result<Response> {
	let status = response.status();

	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();

	Err(Error::Status { status: status.as_u16(), body_tail: body_tail(&body) })
}

pub(crate) fn body_tail(body: &str) -> String {
	let count = body.chars().count();

	if count <= BODY_TAIL_CHARS {
		return body.to_string();
	}

	body.chars().skip(count - BODY_TAIL_CHARS).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn body_tail_keeps_short_bodies() {
		assert_eq!(body_tail("short"), "short");
	}

	#[test]
	fn body_tail_truncates_from_the_front() {
		let long = "x".repeat(300) + "tail";
		let tail = body_tail(&long);

		assert_eq!(tail.chars().count(), BODY_TAIL_CHARS);
		assert!(tail.ends_with("tail"));
	}
}
