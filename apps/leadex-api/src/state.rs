use std::sync::Arc;

use leadex_service::ExchangeService;
use leadex_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ExchangeService>,
}
impl AppState {
	pub async fn new(config: leadex_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres)
			.await
			.map_err(|err| color_eyre::eyre::eyre!(err.to_string()))?;

		db.ensure_schema(config.providers.embedder.dimensions)
			.await
			.map_err(|err| color_eyre::eyre::eyre!(err.to_string()))?;

		let service = ExchangeService::new(config, db)
			.map_err(|err| color_eyre::eyre::eyre!(err.to_string()))?;

		Ok(Self { service: Arc::new(service) })
	}
}
