mod types;

use std::{fs, path::Path};

use color_eyre::eyre;

pub use types::{
	Config, EmbedderConfig, Indexing, LlmConfig, Postgres, Providers, RerankerConfig, Search,
	Service, Storage,
};

pub fn load(path: &Path) -> color_eyre::Result<Config> {
	let raw = fs::read_to_string(path)?;
	let cfg: Config = toml::from_str(&raw)?;

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> color_eyre::Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(eyre::eyre!("service.http_bind must be non-empty."));
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(eyre::eyre!("storage.postgres.dsn must be non-empty."));
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(eyre::eyre!("storage.postgres.pool_max_conns must be greater than zero."));
	}
	if cfg.providers.embedder.dimensions == 0 {
		return Err(eyre::eyre!("providers.embedder.dimensions must be greater than zero."));
	}

	for (label, base_url, enabled) in [
		("embedder", &cfg.providers.embedder.base_url, cfg.providers.embedder.enabled),
		("llm", &cfg.providers.llm.base_url, cfg.providers.llm.enabled),
		("reranker", &cfg.providers.reranker.base_url, cfg.providers.reranker.enabled),
	] {
		if enabled && base_url.trim().is_empty() {
			return Err(eyre::eyre!("providers.{label}.base_url must be non-empty when enabled."));
		}
	}

	for (label, weight) in [
		("search.vector_weight", cfg.search.vector_weight),
		("search.fulltext_weight", cfg.search.fulltext_weight),
	] {
		if !weight.is_finite() || weight < 0.0 {
			return Err(eyre::eyre!("{label} must be a non-negative finite number."));
		}
	}

	if cfg.search.vector_weight + cfg.search.fulltext_weight <= 0.0 {
		return Err(eyre::eyre!(
			"search.vector_weight and search.fulltext_weight must not both be zero."
		));
	}
	if cfg.search.reranker_candidates == 0 {
		return Err(eyre::eyre!("search.reranker_candidates must be greater than zero."));
	}
	if cfg.indexing.workers == 0 {
		return Err(eyre::eyre!("indexing.workers must be greater than zero."));
	}
	if cfg.indexing.queue_capacity == 0 {
		return Err(eyre::eyre!("indexing.queue_capacity must be greater than zero."));
	}

	Ok(())
}
