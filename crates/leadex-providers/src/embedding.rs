use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use leadex_config::EmbedderConfig;

use crate::{
	Error, Result,
	metrics::{self, ServiceKind},
};

/// Client for the text-preparation + embedding service. When disabled it
/// produces a zero vector of the configured dimension so ingestion keeps
/// working end to end; such rows stay reachable through the full-text branch.
pub struct EmbedderClient {
	cfg: EmbedderConfig,
	http: Option<Client>,
}
impl EmbedderClient {
	pub fn new(cfg: EmbedderConfig) -> Result<Self> {
		let http = if cfg.enabled { Some(crate::http_client(cfg.timeout_ms)?) } else { None };

		Ok(Self { cfg, http })
	}

	pub fn is_enabled(&self) -> bool {
		self.http.is_some()
	}

	pub fn dimensions(&self) -> usize {
		self.cfg.dimensions as usize
	}

	pub async fn prepare_and_embed(&self, request: &EmbedRequest) -> Result<EmbedResponse> {
		let Some(http) = &self.http else {
			return Ok(EmbedResponse {
				embedding: vec![0.0; self.dimensions()],
				dimensions: self.dimensions(),
				prepared_text: String::new(),
			});
		};
		let timer = metrics::global().start(ServiceKind::Embedding);
		let result = self.post(http, "/prepare-and-embed", request).await;

		timer.stop(result.is_ok(), 0);

		let response: EmbedResponse = result?;

		self.check_dimensions(response.embedding.len())?;

		Ok(response)
	}

	/// Foreground variant used by explicit reindex; echoes the entity id so
	/// logs on both sides correlate.
	pub async fn reindex(&self, request: &ReindexRequest) -> Result<ReindexResponse> {
		let Some(http) = &self.http else {
			return Ok(ReindexResponse {
				entity_id: request.entity_id.clone(),
				entity_type: request.entity_type.clone(),
				embedding: vec![0.0; self.dimensions()],
				prepared_text: String::new(),
			});
		};
		let timer = metrics::global().start(ServiceKind::Embedding);
		let result = self.post(http, "/reindex", request).await;

		timer.stop(result.is_ok(), 0);

		let response: ReindexResponse = result?;

		self.check_dimensions(response.embedding.len())?;

		Ok(response)
	}

	async fn post<Req, Resp>(&self, http: &Client, path: &str, request: &Req) -> Result<Resp>
	where
		Req: Serialize,
		Resp: serde::de::DeserializeOwned,
	{
		let url = format!("{}{path}", self.cfg.base_url);
		let builder = crate::with_auth(http.post(url), self.cfg.api_key.as_deref());
		let response = crate::ensure_success(builder.json(request).send().await?).await?;

		Ok(response.json().await?)
	}

	fn check_dimensions(&self, got: usize) -> Result<()> {
		if got != self.dimensions() {
			return Err(Error::InvalidResponse {
				message: format!(
					"Embedding dimension {got} does not match configured {}.",
					self.cfg.dimensions
				),
			});
		}

		Ok(())
	}
}

/// Raw fields of an entity; the service owns tokenization and feature
/// concatenation.
#[derive(Clone, Debug, Default, Serialize)]
pub struct EmbedRequest {
	#[serde(skip_serializing_if = "String::is_empty")]
	pub title: String,
	#[serde(skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub requirement: Option<Map<String, Value>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub price: Option<i64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub district: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub rooms: Option<i32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub area: Option<f64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbedResponse {
	pub embedding: Vec<f64>,
	#[serde(default)]
	pub dimensions: usize,
	#[serde(default)]
	pub prepared_text: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct ReindexRequest {
	pub entity_id: String,
	pub entity_type: String,
	#[serde(flatten)]
	pub fields: EmbedRequest,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReindexResponse {
	pub entity_id: String,
	#[serde(default)]
	pub entity_type: String,
	pub embedding: Vec<f64>,
	#[serde(default)]
	pub prepared_text: String,
}

pub fn to_storage_vector(embedding: &[f64]) -> Vec<f32> {
	embedding.iter().map(|value| *value as f32).collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn disabled_client(dimensions: u32) -> EmbedderClient {
		EmbedderClient::new(EmbedderConfig {
			enabled: false,
			base_url: String::new(),
			api_key: None,
			dimensions,
			timeout_ms: 1_000,
		})
		.expect("disabled client construction cannot fail")
	}

	#[tokio::test]
	async fn disabled_client_returns_zero_vector() {
		let client = disabled_client(8);
		let response = client
			.prepare_and_embed(&EmbedRequest::default())
			.await
			.expect("disabled embed cannot fail");

		assert!(!client.is_enabled());
		assert_eq!(response.embedding.len(), 8);
		assert!(response.embedding.iter().all(|value| *value == 0.0));
		assert!(response.prepared_text.is_empty());
	}

	#[tokio::test]
	async fn disabled_reindex_echoes_entity() {
		let client = disabled_client(4);
		let response = client
			.reindex(&ReindexRequest {
				entity_id: "42".to_string(),
				entity_type: "lead".to_string(),
				fields: EmbedRequest::default(),
			})
			.await
			.expect("disabled reindex cannot fail");

		assert_eq!(response.entity_id, "42");
		assert_eq!(response.embedding.len(), 4);
	}

	#[test]
	fn storage_vector_narrows() {
		assert_eq!(to_storage_vector(&[1.0, 0.5]), vec![1.0f32, 0.5f32]);
	}
}
