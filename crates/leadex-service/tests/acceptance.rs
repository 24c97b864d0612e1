//! End-to-end matching scenarios against a real Postgres. Each test
//! provisions a throwaway database and skips silently unless
//! `LEADEX_PG_DSN` is set.

use std::collections::HashMap;

use serde_json::json;
use uuid::Uuid;

use leadex_config::{
	Config, EmbedderConfig, Indexing, LlmConfig, Postgres, Providers, RerankerConfig, Search,
	Service,
};
use leadex_domain::{LeadStatus, NewLead, NewProperty, PropertyStatus, PropertyType};
use leadex_providers::metrics;
use leadex_service::{Error, ExchangeService};
use leadex_storage::{db::Db, properties::PropertyFilter};
use leadex_testkit::TestDatabase;

const DIM: u32 = 8;

async fn test_db() -> Option<TestDatabase> {
	let Some(base_dsn) = leadex_testkit::env_dsn() else {
		eprintln!("Skipping: set LEADEX_PG_DSN to run Postgres acceptance tests.");

		return None;
	};
	let db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");

	Some(db)
}

fn test_config(dsn: &str, mutate: impl FnOnce(&mut Config)) -> Config {
	let mut cfg = Config {
		service: Service {
			http_bind: "127.0.0.1:0".to_string(),
			log_level: "warn".to_string(),
		},
		storage: leadex_config::Storage {
			postgres: Postgres { dsn: dsn.to_string(), pool_max_conns: 4 },
		},
		providers: Providers {
			embedder: EmbedderConfig {
				enabled: false,
				base_url: String::new(),
				api_key: None,
				dimensions: DIM,
				timeout_ms: 1_000,
			},
			llm: LlmConfig {
				enabled: false,
				base_url: String::new(),
				api_key: None,
				model: "gpt-4o-mini".to_string(),
				timeout_ms: 1_000,
			},
			reranker: RerankerConfig {
				enabled: false,
				base_url: String::new(),
				api_key: None,
				model: "jina-reranker-v2-base-multilingual".to_string(),
				timeout_ms: 1_000,
				top_n: 10,
			},
		},
		search: Search::default(),
		indexing: Indexing::default(),
	};

	mutate(&mut cfg);

	cfg
}

async fn make_service(
	test: &TestDatabase,
	mutate: impl FnOnce(&mut Config),
) -> ExchangeService {
	let cfg = test_config(test.dsn(), mutate);
	let db = Db::connect(&cfg.storage.postgres)
		.await
		.expect("Failed to connect to the test database.");

	db.ensure_schema(DIM).await.expect("Failed to apply the schema.");

	ExchangeService::new(cfg, db).expect("Service construction must succeed.")
}

fn unit_vector(axis: usize) -> Vec<f32> {
	let mut vec = vec![0.0; DIM as usize];

	vec[axis] = 1.0;

	vec
}

fn new_lead(city: Option<&str>, requirement: serde_json::Value) -> NewLead {
	NewLead {
		title: "2-комнатная квартира у метро".to_string(),
		description: "Ищу квартиру рядом с метро, тихий двор, хорошая инфраструктура"
			.to_string(),
		requirement: serde_json::from_value(requirement)
			.expect("The requirement fixture must deserialize."),
		contact_name: "Мария Белова".to_string(),
		contact_phone: "+79998889900".to_string(),
		contact_email: None,
		city: city.map(ToString::to_string),
		property_type: None,
		status: LeadStatus::Published,
		owner_user_id: Uuid::new_v4(),
		created_user_id: Uuid::new_v4(),
	}
}

fn new_property(city: &str, price: Option<i64>, rooms: Option<i32>) -> NewProperty {
	NewProperty {
		title: format!("Квартира, {city}"),
		description: "Светлая квартира, рядом метро".to_string(),
		address: format!("{city}, Главная улица, 1"),
		city: Some(city.to_string()),
		property_type: PropertyType::Apartment,
		area: Some(60.0),
		price,
		rooms,
		status: PropertyStatus::Published,
		owner_user_id: Uuid::new_v4(),
		created_user_id: Uuid::new_v4(),
	}
}

#[tokio::test]
async fn match_without_embedding_is_not_indexed() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |_| {}).await;
	let lead = service
		.create_lead(new_lead(Some("Москва"), json!({})))
		.await
		.expect("Lead creation must succeed.");
	let result = service.match_advanced(lead.lead_id, PropertyFilter::default(), 5).await;

	assert!(matches!(result, Err(Error::NotIndexed { .. })));

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn city_hard_filter_survives_the_whole_pipeline() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |cfg| {
		// Pure vector path keeps the scenario focused on the filter.
		cfg.search.hybrid_enabled = false;
	})
	.await;
	let lead = service
		.create_lead(new_lead(Some("Москва"), json!({ "roomNumber": 2, "price": 10_000_000 })))
		.await
		.expect("Lead creation must succeed.");

	service
		.leads
		.update_embedding(lead.lead_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let moscow = service
		.create_property(new_property("Москва", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");
	let spb = service
		.create_property(new_property("Санкт-Петербург", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");

	// Identical embeddings: semantic similarity cannot separate them.
	service
		.properties
		.update_embedding(moscow.property_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");
	service
		.properties
		.update_embedding(spb.property_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let matches = service
		.match_advanced(lead.lead_id, PropertyFilter::default(), 10)
		.await
		.expect("Matching must succeed.");

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].property.property_id, moscow.property_id);

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn room_tolerance_filters_and_scores() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |cfg| {
		cfg.search.hybrid_enabled = false;
	})
	.await;
	let lead = service
		.create_lead(new_lead(Some("Москва"), json!({ "roomNumber": 3 })))
		.await
		.expect("Lead creation must succeed.");

	service
		.leads
		.update_embedding(lead.lead_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let mut by_rooms = HashMap::new();

	for rooms in [3, 4, 5] {
		let property = service
			.create_property(new_property("Москва", Some(10_000_000), Some(rooms)))
			.await
			.expect("Property creation must succeed.");

		service
			.properties
			.update_embedding(property.property_id, &unit_vector(0))
			.await
			.expect("Embedding must persist.");
		by_rooms.insert(rooms, property.property_id);
	}

	let matches = service
		.match_advanced(lead.lead_id, PropertyFilter::default(), 10)
		.await
		.expect("Matching must succeed.");
	let ids = matches.iter().map(|m| m.property.property_id).collect::<Vec<_>>();

	// Target 3 → hard range [2, 4]: 4 passes, 5 is excluded.
	assert!(ids.contains(&by_rooms[&3]));
	assert!(ids.contains(&by_rooms[&4]));
	assert!(!ids.contains(&by_rooms[&5]));

	let score_of = |rooms: i32| {
		matches
			.iter()
			.find(|m| m.property.property_id == by_rooms[&rooms])
			.and_then(|m| m.rooms_score)
			.expect("The rooms score must be filled in.")
	};

	assert!((score_of(3) - 1.0).abs() < 1e-9);
	assert!((score_of(4) - 0.6).abs() < 1e-9);

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn reranker_failure_keeps_retrieval_order_and_counts() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |cfg| {
		cfg.search.hybrid_enabled = false;
		cfg.search.use_reranker = true;
		// Nothing listens here; every call fails fast.
		cfg.providers.reranker.enabled = true;
		cfg.providers.reranker.base_url = "http://127.0.0.1:9".to_string();
		cfg.providers.reranker.timeout_ms = 500;
	})
	.await;
	let lead = service
		.create_lead(new_lead(Some("Москва"), json!({})))
		.await
		.expect("Lead creation must succeed.");

	service
		.leads
		.update_embedding(lead.lead_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let near = service
		.create_property(new_property("Москва", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");
	let far = service
		.create_property(new_property("Москва", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");

	service
		.properties
		.update_embedding(near.property_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let mut off_axis = vec![0.0; DIM as usize];

	off_axis[0] = 0.6;
	off_axis[1] = 0.8;
	service
		.properties
		.update_embedding(far.property_id, &off_axis)
		.await
		.expect("Embedding must persist.");

	let errors_before = metrics::global().snapshot().reranker.errors_total;
	let matches = service
		.match_advanced(lead.lead_id, PropertyFilter::default(), 10)
		.await
		.expect("A reranker outage must not fail the search.");
	let errors_after = metrics::global().snapshot().reranker.errors_total;

	// The search degrades to the retrieval order instead of failing.
	assert_eq!(matches.len(), 2);
	assert_eq!(matches[0].property.property_id, near.property_id);
	assert!(errors_after > errors_before, "The reranker error must be counted.");

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn clarification_round_trip_updates_the_requirement() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |_| {}).await;
	let mut draft = new_lead(None, json!({}));

	draft.title = "Квартира".to_string();
	draft.description = "хочу купить".to_string();

	let lead = service.create_lead(draft).await.expect("Lead creation must succeed.");
	let clarification = service
		.clarification_questions(lead.lead_id)
		.await
		.expect("Clarification must succeed.");

	assert!(clarification.needs_clarification);
	assert_eq!(clarification.priority, "high");
	assert!(clarification.lead_quality_score < 0.3);
	assert!(
		clarification
			.questions
			.iter()
			.any(|q| q.field == "price" && q.importance == "required")
	);

	let mut answers = serde_json::Map::new();

	answers.insert("price".to_string(), json!("10-15 млн ₽"));
	answers.insert("roomNumber".to_string(), json!("3 комнаты"));

	let updated = service
		.apply_clarification_answers(lead.lead_id, answers)
		.await
		.expect("Applying answers must succeed.");

	assert_eq!(updated.requirement.target_price(), Some(12_500_000));
	assert_eq!(updated.requirement.target_rooms(), Some(3));

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn llm_only_features_are_unavailable_without_the_llm() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |_| {}).await;
	let property = service
		.create_property(new_property("Москва", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");
	let listing = service.generate_listing_content(property.property_id).await;
	let enrichment = service.enrich_description(property.property_id).await;

	assert!(matches!(listing, Err(Error::Unavailable { .. })));
	assert!(matches!(enrichment, Err(Error::Unavailable { .. })));

	// Reindex is likewise an embedder-only operation.
	let reindex = service.reindex_property(property.property_id).await;

	assert!(matches!(reindex, Err(Error::Unavailable { .. })));

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}

#[tokio::test]
async fn hybrid_search_reaches_unembedded_properties() {
	let Some(test) = test_db().await else {
		return;
	};
	let service = make_service(&test, |_| {}).await;
	let mut draft = new_lead(Some("Москва"), json!({}));

	// plainto_tsquery ANDs every lexeme, so the query stays short enough for
	// the full-text branch to actually match.
	draft.title = "Уютная квартира".to_string();
	draft.description = String::new();

	let lead = service.create_lead(draft).await.expect("Lead creation must succeed.");

	service
		.leads
		.update_embedding(lead.lead_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let mut unembedded = new_property("Москва", Some(10_000_000), Some(2));

	unembedded.title = "Уютная квартира рядом с метро".to_string();

	let unembedded = service
		.create_property(unembedded)
		.await
		.expect("Property creation must succeed.");
	let embedded = service
		.create_property(new_property("Москва", Some(10_000_000), Some(2)))
		.await
		.expect("Property creation must succeed.");

	service
		.properties
		.update_embedding(embedded.property_id, &unit_vector(0))
		.await
		.expect("Embedding must persist.");

	let matches = service
		.match_advanced(lead.lead_id, PropertyFilter::default(), 10)
		.await
		.expect("Matching must succeed.");
	let ids = matches.iter().map(|m| m.property.property_id).collect::<Vec<_>>();

	assert!(ids.contains(&embedded.property_id));
	assert!(
		ids.contains(&unembedded.property_id),
		"A full-text-only property must be reachable through hybrid search."
	);

	service.shutdown().await;
	test.cleanup().await.expect("Cleanup must succeed.");
}
