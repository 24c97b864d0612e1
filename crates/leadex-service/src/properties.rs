use tracing::info;
use uuid::Uuid;

use leadex_domain::{NewProperty, Page, Property, PropertyPatch};
use leadex_providers::embedding::{ReindexRequest, to_storage_vector};
use leadex_storage::properties::PropertyFilter;

use crate::{
	Error, ExchangeService, Result,
	indexer::{EntityKind, EntityRef},
};

impl ExchangeService {
	pub async fn create_property(&self, property: NewProperty) -> Result<Property> {
		if property.title.trim().is_empty() {
			return Err(Error::InvalidArgument {
				message: "Property title is required.".to_string(),
			});
		}
		if property.address.trim().is_empty() {
			return Err(Error::InvalidArgument {
				message: "Property address is required.".to_string(),
			});
		}

		let property_id = self.properties.create(&property).await?;

		info!(property_id = %property_id, "Property created.");
		self.indexer().schedule(EntityRef { kind: EntityKind::Property, id: property_id });

		Ok(self.properties.get(property_id).await?)
	}

	pub async fn get_property(&self, property_id: Uuid) -> Result<Property> {
		Ok(self.properties.get(property_id).await?)
	}

	pub async fn update_property(
		&self,
		property_id: Uuid,
		patch: PropertyPatch,
	) -> Result<Property> {
		self.properties.update(property_id, &patch).await?;

		let property = self.properties.get(property_id).await?;

		if patch.touches_embedding() {
			self.indexer().schedule(EntityRef { kind: EntityKind::Property, id: property_id });
		}

		Ok(property)
	}

	pub async fn list_properties(&self, filter: PropertyFilter) -> Result<Page<Property>> {
		Ok(self.properties.list(&filter).await?)
	}

	pub async fn reindex_property(&self, property_id: Uuid) -> Result<()> {
		if !self.embedder.is_enabled() {
			return Err(Error::Unavailable {
				message: "Reindex requires the embedding service.".to_string(),
			});
		}

		let property = self.properties.get(property_id).await?;
		let response = self
			.embedder
			.reindex(&ReindexRequest {
				entity_id: property_id.to_string(),
				entity_type: EntityKind::Property.as_str().to_string(),
				fields: crate::indexer::property_embed_fields(&property),
			})
			.await?;

		self.properties
			.update_embedding(property_id, &to_storage_vector(&response.embedding))
			.await?;
		info!(property_id = %property_id, "Property reindexed.");

		Ok(())
	}
}
