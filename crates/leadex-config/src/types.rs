use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub indexing: Indexing,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedder: EmbedderConfig,
	pub llm: LlmConfig,
	pub reranker: RerankerConfig,
}

/// Embedding service. The service owns text preparation; we only ship raw
/// fields and receive a vector of `dimensions` floats back.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbedderConfig {
	pub enabled: bool,
	pub base_url: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub dimensions: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
	pub enabled: bool,
	pub base_url: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub model: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RerankerConfig {
	pub enabled: bool,
	pub base_url: String,
	#[serde(default)]
	pub api_key: Option<String>,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default = "default_reranker_top_n")]
	pub top_n: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	/// Fuse dense and full-text retrieval; off means pure vector match.
	pub hybrid_enabled: bool,
	pub vector_weight: f64,
	pub fulltext_weight: f64,
	pub use_reranker: bool,
	pub reranker_candidates: u32,
	/// Pick per-lead weights through the analyzer instead of the defaults.
	pub dynamic_weights_enabled: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			hybrid_enabled: true,
			vector_weight: 0.7,
			fulltext_weight: 0.3,
			use_reranker: false,
			reranker_candidates: 50,
			dynamic_weights_enabled: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Indexing {
	pub workers: usize,
	pub queue_capacity: usize,
}
impl Default for Indexing {
	fn default() -> Self {
		Self { workers: 2, queue_capacity: 256 }
	}
}

fn default_reranker_top_n() -> u32 {
	10
}
