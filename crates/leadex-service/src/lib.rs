pub mod clarification;
pub mod indexer;
pub mod matching;
pub mod weights;

mod enrichment;
mod error;
mod leads;
mod properties;

pub use self::error::{Error, Result};

use std::sync::Arc;

use leadex_config::Config;
use leadex_providers::{
	embedding::EmbedderClient, llm::LlmClient, rerank::RerankerClient,
};
use leadex_storage::{db::Db, leads::LeadRepository, properties::PropertyRepository};

use crate::{
	clarification::ClarificationAgent,
	indexer::Indexer,
	weights::WeightsAnalyzer,
};

/// The matching core behind the transport layer. One instance per process;
/// cheap to share behind an `Arc`.
pub struct ExchangeService {
	pub cfg: Arc<Config>,
	pub leads: LeadRepository,
	pub properties: PropertyRepository,
	pub embedder: Arc<EmbedderClient>,
	pub llm: Arc<LlmClient>,
	pub reranker: Arc<RerankerClient>,
	pub(crate) weights_analyzer: WeightsAnalyzer,
	pub(crate) clarification_agent: ClarificationAgent,
	indexer: Indexer,
}
impl ExchangeService {
	pub fn new(cfg: Config, db: Db) -> Result<Self> {
		let cfg = Arc::new(cfg);
		let embedder = Arc::new(
			EmbedderClient::new(cfg.providers.embedder.clone())
				.map_err(|err| Error::Provider { message: err.to_string() })?,
		);
		let llm = Arc::new(
			LlmClient::new(cfg.providers.llm.clone())
				.map_err(|err| Error::Provider { message: err.to_string() })?,
		);
		let reranker = Arc::new(
			RerankerClient::new(cfg.providers.reranker.clone())
				.map_err(|err| Error::Provider { message: err.to_string() })?,
		);
		let leads = LeadRepository::new(&db);
		let properties = PropertyRepository::new(&db);
		let indexer = Indexer::spawn(
			&cfg.indexing,
			leads.clone(),
			properties.clone(),
			embedder.clone(),
		);
		let weights_analyzer =
			WeightsAnalyzer::new(llm.clone(), cfg.search.dynamic_weights_enabled);
		let clarification_agent = ClarificationAgent::new(llm.clone());

		Ok(Self {
			cfg,
			leads,
			properties,
			embedder,
			llm,
			reranker,
			weights_analyzer,
			clarification_agent,
			indexer,
		})
	}

	pub fn indexer(&self) -> &Indexer {
		&self.indexer
	}

	/// Stops accepting indexing work and drains the queue.
	pub async fn shutdown(&self) {
		self.indexer.shutdown().await;
	}
}
