use serde_json::Map;
use uuid::Uuid;

use leadex_providers::llm::{
	EnrichDescriptionRequest, EnrichDescriptionResponse, GenerateListingRequest,
	GenerateListingResponse,
};

use crate::{Error, ExchangeService, Result};

impl ExchangeService {
	/// LLM-generated listing title and description. This feature has no
	/// heuristic fallback, so a disabled LLM is `Unavailable`.
	pub async fn generate_listing_content(
		&self,
		property_id: Uuid,
	) -> Result<GenerateListingResponse> {
		if !self.llm.is_enabled() {
			return Err(Error::Unavailable {
				message: "Listing generation requires the LLM service.".to_string(),
			});
		}

		let property = self.properties.get(property_id).await?;
		let request = GenerateListingRequest {
			property_type: property.property_type.as_str().to_string(),
			address: property.address.clone(),
			city: property.city.clone().unwrap_or_default(),
			price: property.price,
			rooms: property.rooms,
			area: property.area,
			existing_title: Some(property.title.clone()).filter(|title| !title.is_empty()),
			existing_description: Some(property.description.clone())
				.filter(|description| !description.is_empty()),
		};

		Ok(self.llm.generate_listing(&request).await?)
	}

	pub async fn enrich_description(
		&self,
		property_id: Uuid,
	) -> Result<EnrichDescriptionResponse> {
		if !self.llm.is_enabled() {
			return Err(Error::Unavailable {
				message: "Description enrichment requires the LLM service.".to_string(),
			});
		}

		let property = self.properties.get(property_id).await?;
		let mut structured_data = Map::new();

		structured_data
			.insert("property_type".to_string(), property.property_type.as_str().into());
		structured_data.insert("address".to_string(), property.address.clone().into());

		if let Some(city) = property.city.clone() {
			structured_data.insert("city".to_string(), city.into());
		}
		if let Some(price) = property.price {
			structured_data.insert("price".to_string(), price.into());
		}
		if let Some(rooms) = property.rooms {
			structured_data.insert("rooms".to_string(), rooms.into());
		}
		if let Some(area) = property.area {
			structured_data.insert("area".to_string(), area.into());
		}

		let request = EnrichDescriptionRequest {
			current_description: property.description.clone(),
			structured_data,
		};

		Ok(self.llm.enrich_description(&request).await?)
	}
}
