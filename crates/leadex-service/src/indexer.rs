use std::{
	collections::HashMap,
	sync::{Arc, Mutex},
};

use tokio::{
	sync::{Mutex as AsyncMutex, mpsc},
	task::JoinHandle,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use leadex_domain::{Lead, Property};
use leadex_providers::embedding::{EmbedRequest, EmbedderClient, to_storage_vector};
use leadex_storage::{Error as StorageError, leads::LeadRepository, properties::PropertyRepository};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
	Lead,
	Property,
}
impl EntityKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Lead => "lead",
			Self::Property => "property",
		}
	}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef {
	pub kind: EntityKind,
	pub id: Uuid,
}

/// Background embedding pipeline: a bounded queue drained by a fixed pool of
/// workers. At most one pass per entity is in flight; scheduling an entity
/// that is already pending only marks it dirty, and the worker re-reads the
/// row right before embedding, so the pass that completes last always
/// reflects the newest snapshot (last write wins).
pub struct Indexer {
	embedder_enabled: bool,
	tx: Mutex<Option<mpsc::Sender<EntityRef>>>,
	pending: Arc<Mutex<HashMap<EntityRef, PendingState>>>,
	workers: Mutex<Vec<JoinHandle<()>>>,
}

#[derive(Clone, Copy, Debug, Default)]
struct PendingState {
	dirty: bool,
}

#[derive(Clone)]
struct WorkerContext {
	leads: LeadRepository,
	properties: PropertyRepository,
	embedder: Arc<EmbedderClient>,
	pending: Arc<Mutex<HashMap<EntityRef, PendingState>>>,
	requeue: mpsc::WeakSender<EntityRef>,
}

impl Indexer {
	pub fn spawn(
		cfg: &leadex_config::Indexing,
		leads: LeadRepository,
		properties: PropertyRepository,
		embedder: Arc<EmbedderClient>,
	) -> Self {
		let (tx, rx) = mpsc::channel::<EntityRef>(cfg.queue_capacity);
		let rx = Arc::new(AsyncMutex::new(rx));
		let pending = Arc::new(Mutex::new(HashMap::new()));
		let context = WorkerContext {
			leads,
			properties,
			embedder,
			pending: pending.clone(),
			requeue: tx.downgrade(),
		};
		let workers = (0..cfg.workers.max(1))
			.map(|_| {
				let rx = rx.clone();
				let context = context.clone();

				tokio::spawn(async move {
					loop {
						let entity = { rx.lock().await.recv().await };
						let Some(entity) = entity else {
							break;
						};

						run_pass(&context, entity).await;
						finish_pass(&context, entity);
					}
				})
			})
			.collect();

		Self {
			embedder_enabled: context.embedder.is_enabled(),
			tx: Mutex::new(Some(tx)),
			pending,
			workers: Mutex::new(workers),
		}
	}

	/// Requests (re)embedding of an entity. Coalesces with an inflight or
	/// queued pass for the same entity; never blocks the caller. With the
	/// embedder disabled nothing is scheduled: the row keeps no embedding
	/// and stays reachable through the full-text branch.
	pub fn schedule(&self, entity: EntityRef) {
		if !self.embedder_enabled {
			debug!(entity_id = %entity.id, "Embedder is disabled. Skipping indexing.");

			return;
		}

		{
			let mut pending = self.pending.lock().unwrap_or_else(|err| err.into_inner());

			if let Some(state) = pending.get_mut(&entity) {
				state.dirty = true;

				return;
			}

			pending.insert(entity, PendingState::default());
		}

		let tx = self.tx.lock().unwrap_or_else(|err| err.into_inner()).clone();
		let Some(tx) = tx else {
			self.forget(entity);
			warn!(entity_id = %entity.id, "Indexer is shut down. Dropping the indexing request.");

			return;
		};

		if let Err(err) = tx.try_send(entity) {
			self.forget(entity);
			warn!(
				entity_id = %entity.id,
				error = %err,
				"Indexing queue is full. A later mutation or explicit reindex will retry."
			);
		}
	}

	/// Closes the queue and waits for the workers to drain it. In-flight
	/// passes finish; nothing new is accepted.
	pub async fn shutdown(&self) {
		self.tx.lock().unwrap_or_else(|err| err.into_inner()).take();

		let workers =
			std::mem::take(&mut *self.workers.lock().unwrap_or_else(|err| err.into_inner()));

		for worker in workers {
			if let Err(err) = worker.await {
				error!(error = %err, "Indexing worker terminated abnormally.");
			}
		}
	}

	fn forget(&self, entity: EntityRef) {
		self.pending.lock().unwrap_or_else(|err| err.into_inner()).remove(&entity);
	}
}

async fn run_pass(context: &WorkerContext, entity: EntityRef) {
	if let Err(err) = embed_entity(context, entity).await {
		// The row keeps its previous (possibly stale) embedding; a later
		// mutation or explicit reindex retries.
		error!(
			entity = entity.kind.as_str(),
			entity_id = %entity.id,
			error = %err,
			"Background indexing failed."
		);
	}
}

/// Clears the pending entry, or re-enqueues one more pass when the entity
/// was mutated while this pass ran.
fn finish_pass(context: &WorkerContext, entity: EntityRef) {
	let rerun = {
		let mut pending = context.pending.lock().unwrap_or_else(|err| err.into_inner());

		match pending.get_mut(&entity) {
			Some(state) if state.dirty => {
				state.dirty = false;

				true
			},
			_ => {
				pending.remove(&entity);

				false
			},
		}
	};

	if !rerun {
		return;
	}

	let requeued = context
		.requeue
		.upgrade()
		.map(|tx| tx.try_send(entity).is_ok())
		.unwrap_or(false);

	if !requeued {
		context.pending.lock().unwrap_or_else(|err| err.into_inner()).remove(&entity);
		warn!(
			entity_id = %entity.id,
			"Could not requeue a dirty entity. A later mutation will retry."
		);
	}
}

async fn embed_entity(
	context: &WorkerContext,
	entity: EntityRef,
) -> Result<(), crate::Error> {
	match entity.kind {
		EntityKind::Lead => {
			let lead = match context.leads.get(entity.id).await {
				Ok(lead) => lead,
				Err(StorageError::NotFound(_)) => {
					info!(lead_id = %entity.id, "Lead vanished before indexing. Skipping.");

					return Ok(());
				},
				Err(err) => return Err(err.into()),
			};
			let response = context.embedder.prepare_and_embed(&lead_embed_fields(&lead)).await?;

			context
				.leads
				.update_embedding(entity.id, &to_storage_vector(&response.embedding))
				.await?;
			info!(lead_id = %entity.id, "Lead embedding updated.");
		},
		EntityKind::Property => {
			let property = match context.properties.get(entity.id).await {
				Ok(property) => property,
				Err(StorageError::NotFound(_)) => {
					info!(property_id = %entity.id, "Property vanished before indexing. Skipping.");

					return Ok(());
				},
				Err(err) => return Err(err.into()),
			};
			let response =
				context.embedder.prepare_and_embed(&property_embed_fields(&property)).await?;

			context
				.properties
				.update_embedding(entity.id, &to_storage_vector(&response.embedding))
				.await?;
			info!(property_id = %entity.id, "Property embedding updated.");
		},
	}

	Ok(())
}

pub(crate) fn lead_embed_fields(lead: &Lead) -> EmbedRequest {
	EmbedRequest {
		title: lead.title.clone(),
		description: lead.description.clone(),
		requirement: (!lead.requirement.is_empty()).then(|| lead.requirement.0.clone()),
		price: lead.requirement.target_price(),
		district: lead.requirement.target_district(),
		rooms: lead.requirement.target_rooms(),
		area: lead.requirement.target_area(),
		address: None,
	}
}

pub(crate) fn property_embed_fields(property: &Property) -> EmbedRequest {
	EmbedRequest {
		title: property.title.clone(),
		description: property.description.clone(),
		requirement: None,
		price: property.price,
		district: None,
		rooms: property.rooms,
		area: property.area,
		address: Some(property.address.clone()),
	}
}
