use serde_json::{Map, Value};
use tracing::info;
use uuid::Uuid;

use leadex_domain::{Lead, LeadPatch, NewLead, Page};
use leadex_providers::embedding::{ReindexRequest, to_storage_vector};
use leadex_storage::leads::LeadFilter;

use crate::{
	Error, ExchangeService, Result,
	clarification::{self, ClarificationResult},
	indexer::{EntityKind, EntityRef},
};

impl ExchangeService {
	/// Persists the lead and schedules background embedding; the write never
	/// waits on the embedder.
	pub async fn create_lead(&self, lead: NewLead) -> Result<Lead> {
		if lead.title.trim().is_empty() {
			return Err(Error::InvalidArgument { message: "Lead title is required.".to_string() });
		}
		if lead.contact_name.trim().is_empty() || lead.contact_phone.trim().is_empty() {
			return Err(Error::InvalidArgument {
				message: "Lead contact name and phone are required.".to_string(),
			});
		}

		let lead_id = self.leads.create(&lead).await?;

		info!(lead_id = %lead_id, "Lead created.");
		self.indexer().schedule(EntityRef { kind: EntityKind::Lead, id: lead_id });

		Ok(self.leads.get(lead_id).await?)
	}

	pub async fn get_lead(&self, lead_id: Uuid) -> Result<Lead> {
		Ok(self.leads.get(lead_id).await?)
	}

	pub async fn update_lead(&self, lead_id: Uuid, patch: LeadPatch) -> Result<Lead> {
		self.leads.update(lead_id, &patch).await?;

		let lead = self.leads.get(lead_id).await?;

		if patch.touches_embedding() {
			self.indexer().schedule(EntityRef { kind: EntityKind::Lead, id: lead_id });
		}

		Ok(lead)
	}

	pub async fn list_leads(&self, filter: LeadFilter) -> Result<Page<Lead>> {
		Ok(self.leads.list(&filter).await?)
	}

	/// Synchronous foreground reindex: runs in the caller's context and
	/// surfaces embedder and storage failures.
	pub async fn reindex_lead(&self, lead_id: Uuid) -> Result<()> {
		if !self.embedder.is_enabled() {
			return Err(Error::Unavailable {
				message: "Reindex requires the embedding service.".to_string(),
			});
		}

		let lead = self.leads.get(lead_id).await?;
		let response = self
			.embedder
			.reindex(&ReindexRequest {
				entity_id: lead_id.to_string(),
				entity_type: EntityKind::Lead.as_str().to_string(),
				fields: crate::indexer::lead_embed_fields(&lead),
			})
			.await?;

		self.leads.update_embedding(lead_id, &to_storage_vector(&response.embedding)).await?;
		info!(lead_id = %lead_id, "Lead reindexed.");

		Ok(())
	}

	/// Clarification questions for an under-specified lead. Falls back to
	/// template questions when the LLM is unavailable, so this never fails
	/// for lack of a model.
	pub async fn clarification_questions(&self, lead_id: Uuid) -> Result<ClarificationResult> {
		let lead = self.leads.get(lead_id).await?;

		Ok(self.clarification_agent.analyze(&lead).await)
	}

	/// Applies `{field: value}` answers to the lead's requirement and
	/// schedules re-embedding through the regular update path.
	pub async fn apply_clarification_answers(
		&self,
		lead_id: Uuid,
		answers: Map<String, Value>,
	) -> Result<Lead> {
		if answers.is_empty() {
			return Err(Error::InvalidArgument {
				message: "Clarification answers are empty.".to_string(),
			});
		}

		let lead = self.leads.get(lead_id).await?;
		let requirement = clarification::apply_answers(&lead, &answers);

		self.update_lead(lead_id, LeadPatch { requirement: Some(requirement), ..LeadPatch::default() })
			.await
	}
}
