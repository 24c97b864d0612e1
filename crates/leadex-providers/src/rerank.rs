use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use leadex_config::RerankerConfig;

use crate::{
	Error, Result,
	metrics::{self, ServiceKind},
};

/// Cross-encoder reranker client. The disabled variant preserves the input
/// order with monotonically decreasing synthetic scores, which makes the
/// blend downstream a no-op reordering.
pub struct RerankerClient {
	cfg: RerankerConfig,
	http: Option<Client>,
}
impl RerankerClient {
	pub fn new(cfg: RerankerConfig) -> Result<Self> {
		let http = if cfg.enabled { Some(crate::http_client(cfg.timeout_ms)?) } else { None };

		Ok(Self { cfg, http })
	}

	pub fn is_enabled(&self) -> bool {
		self.http.is_some()
	}

	pub async fn rerank(
		&self,
		query: &str,
		documents: &[String],
		top_n: usize,
	) -> Result<Vec<RerankResult>> {
		let Some(http) = &self.http else {
			return Ok(documents
				.iter()
				.enumerate()
				.map(|(index, _)| RerankResult {
					index,
					relevance_score: 1.0 - index as f64 * 0.01,
				})
				.collect());
		};
		let body = RerankRequest {
			model: self.cfg.model.clone(),
			query: query.to_string(),
			documents: documents.to_vec(),
			top_n,
		};
		let url = format!("{}/rerank", self.cfg.base_url);
		let timer = metrics::global().start(ServiceKind::Reranker);
		let result = async {
			let builder = crate::with_auth(http.post(url), self.cfg.api_key.as_deref());
			let response = crate::ensure_success(builder.json(&body).send().await?).await?;
			let json: Value = response.json().await?;

			parse_rerank_response(&json, documents.len())
		}
		.await;

		timer.stop(result.is_ok(), 0);

		result
	}
}

/// One reranked document. Only the index is trusted; bodies echoed by the
/// service are ignored.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RerankResult {
	pub index: usize,
	pub relevance_score: f64,
}

#[derive(Clone, Debug, Serialize)]
struct RerankRequest {
	model: String,
	query: String,
	documents: Vec<String>,
	top_n: usize,
}

fn parse_rerank_response(json: &Value, document_count: usize) -> Result<Vec<RerankResult>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(Value::as_array)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Rerank response is missing the results array.".to_string(),
		})?;
	let mut parsed = Vec::with_capacity(results.len());

	for item in results {
		let index = item.get("index").and_then(Value::as_u64).ok_or_else(|| {
			Error::InvalidResponse { message: "Rerank result is missing the index.".to_string() }
		})? as usize;
		let relevance_score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(Value::as_f64)
			.ok_or_else(|| Error::InvalidResponse {
				message: "Rerank result is missing the score.".to_string(),
			})?;

		if index < document_count {
			parsed.push(RerankResult { index, relevance_score });
		}
	}

	Ok(parsed)
}
