use std::cmp::Ordering;

use tracing::{debug, info, warn};
use uuid::Uuid;

use leadex_domain::{
	HardFilters, Lead, MatchWeights, MatchedProperty, SoftCriteria, city,
};
use leadex_storage::properties::{HybridSearchParams, PropertyFilter};

use crate::{Error, ExchangeService, Result};

const MIN_CANDIDATES: i64 = 50;
const MAX_CANDIDATES: i64 = 100;
const DEFAULT_LIMIT: i64 = 10;

impl ExchangeService {
	/// Advanced matching: hard-filter synthesis, hybrid retrieval, optional
	/// cross-encoder rerank and adaptive weighted re-ranking.
	///
	/// The weighted stage only reorders the retrieved candidates; membership
	/// is fixed by retrieval and the hard filters. An empty candidate set is
	/// an empty result, never an error, and the city filter is never
	/// relaxed.
	pub async fn match_advanced(
		&self,
		lead_id: Uuid,
		filter: PropertyFilter,
		limit: i64,
	) -> Result<Vec<MatchedProperty>> {
		let limit = if limit <= 0 { DEFAULT_LIMIT } else { limit };
		let lead = self.leads.get(lead_id).await?;
		let Some(embedding) =
			lead.embedding.as_deref().filter(|embedding| !embedding.is_empty())
		else {
			return Err(Error::NotIndexed { lead_id });
		};

		let (weights, criteria) = if self.cfg.search.dynamic_weights_enabled {
			let analysis = self.weights_analyzer.analyze(&lead).await;

			debug!(
				lead_id = %lead_id,
				lead_type = analysis.lead_type,
				confidence = analysis.confidence,
				used_llm = analysis.used_llm,
				"Using dynamic match weights."
			);

			let criteria =
				analysis.criteria.or_else(|| lead.requirement.soft_criteria());

			(analysis.weights, criteria)
		} else {
			(MatchWeights::default(), lead.requirement.soft_criteria())
		};

		let hard_filters = build_hard_filters(&lead, criteria.as_ref());
		let candidate_limit = candidate_limit(self.cfg.search.reranker_candidates, limit);
		let search_text = lead.search_text();

		let mut matches = if self.cfg.search.hybrid_enabled && !search_text.is_empty() {
			self.properties
				.hybrid_search(HybridSearchParams {
					lead_embedding: embedding,
					search_query: &search_text,
					vector_weight: self.cfg.search.vector_weight,
					fulltext_weight: self.cfg.search.fulltext_weight,
					filter: &filter,
					hard_filters: &hard_filters,
					limit: candidate_limit,
				})
				.await?
		} else {
			self.properties
				.match_vector_with_hard_filters(embedding, &filter, &hard_filters, candidate_limit)
				.await?
		};

		if self.cfg.search.use_reranker && self.reranker.is_enabled() && !matches.is_empty() {
			match self.apply_reranker(&lead, &matches, limit as usize).await {
				Ok(reranked) => matches = reranked,
				Err(err) => {
					warn!(
						lead_id = %lead_id,
						error = %err,
						"Reranker failed. Keeping the retrieval order."
					);
				},
			}
		}

		rank_matches(&mut matches, weights, criteria.as_ref());
		matches.truncate(limit as usize);

		info!(
			lead_id = %lead_id,
			results = matches.len(),
			hybrid = self.cfg.search.hybrid_enabled,
			reranker = self.cfg.search.use_reranker,
			"Advanced matching completed."
		);

		Ok(matches)
	}

	/// Feeds the candidates through the cross-encoder and blends its
	/// relevance into the similarity as the arithmetic mean. The returned
	/// order is the reranker's; only indices it echoes are trusted.
	async fn apply_reranker(
		&self,
		lead: &Lead,
		candidates: &[MatchedProperty],
		top_n: usize,
	) -> Result<Vec<MatchedProperty>> {
		let query = format!("{}. {}", lead.title, lead.description);
		let documents = candidates
			.iter()
			.map(|candidate| {
				format!("{}. {}", candidate.property.title, candidate.property.description)
			})
			.collect::<Vec<_>>();
		let results = self.reranker.rerank(&query, &documents, top_n).await?;
		let mut reranked = Vec::with_capacity(results.len());

		for result in results {
			let Some(candidate) = candidates.get(result.index) else {
				continue;
			};
			let mut candidate = candidate.clone();

			candidate.similarity = (candidate.similarity + result.relevance_score) / 2.0;
			reranked.push(candidate);
		}

		debug!(
			input_candidates = candidates.len(),
			output_candidates = reranked.len(),
			"Reranker applied."
		);

		Ok(reranked)
	}
}

/// City comes from the lead itself, falling back to parsing its description;
/// rooms and price ranges come from the soft criteria with the ±1 / ±20%
/// tolerances.
fn build_hard_filters(lead: &Lead, criteria: Option<&SoftCriteria>) -> HardFilters {
	let lead_city = lead
		.city
		.as_deref()
		.map(str::trim)
		.filter(|value| !value.is_empty())
		.map(city::normalize_city)
		.or_else(|| {
			city::extract_city_from_address(&lead.description)
				.map(|extracted| city::normalize_city(&extracted))
		});

	HardFilters::from_lead_signals(lead_city, lead.property_type, criteria)
}

/// `C = max(cfg, 5·k, 50)` capped at 100.
fn candidate_limit(reranker_candidates: u32, limit: i64) -> i64 {
	(reranker_candidates as i64).max(limit * 5).max(MIN_CANDIDATES).min(MAX_CANDIDATES)
}

/// Scores every candidate and stable-sorts by the weighted total, leaving
/// the membership untouched.
fn rank_matches(
	matches: &mut [MatchedProperty],
	weights: MatchWeights,
	criteria: Option<&SoftCriteria>,
) {
	for matched in matches.iter_mut() {
		compute_scores(matched, weights, criteria);
	}

	matches.sort_by(|a, b| {
		let a = a.total_score.unwrap_or(0.0);
		let b = b.total_score.unwrap_or(0.0);

		b.partial_cmp(&a).unwrap_or(Ordering::Equal)
	});
}

fn compute_scores(
	matched: &mut MatchedProperty,
	weights: MatchWeights,
	criteria: Option<&SoftCriteria>,
) {
	let property = &matched.property;
	let semantic = semantic_score(matched.similarity);
	let price = price_score(property.price, criteria);
	let district = district_score(&property.address, criteria);
	let rooms = rooms_score(property.rooms, criteria);
	let area = area_score(property.area, criteria);
	let total = weights.price * price
		+ weights.district * district
		+ weights.rooms * rooms
		+ weights.area * area
		+ weights.semantic * semantic;

	matched.total_score = Some(total);
	matched.price_score = Some(price);
	matched.district_score = Some(district);
	matched.rooms_score = Some(rooms);
	matched.area_score = Some(area);
	matched.semantic_score = Some(semantic);
	matched.match_explanation = Some(build_explanation(matched));
}

/// Cosine similarity is already in [0, 1] for related texts; a negative
/// value is shifted into range instead of clamped to zero.
fn semantic_score(similarity: f64) -> f64 {
	if similarity < 0.0 { (similarity + 1.0) / 2.0 } else { similarity }
}

/// 1.0 at the target, 0.7 at a 20% deviation, then a gentler slope down to
/// zero. Missing data on either side is neutral (0.5).
fn price_score(price: Option<i64>, criteria: Option<&SoftCriteria>) -> f64 {
	let (Some(price), Some(target)) =
		(price, criteria.and_then(|criteria| criteria.target_price))
	else {
		return 0.5;
	};

	if target == 0 {
		return 0.5;
	}

	let deviation = (price as f64 - target as f64).abs() / target as f64 * 100.0;

	if deviation <= 20.0 {
		1.0 - (deviation / 20.0) * 0.3
	} else {
		(0.7 - (deviation - 20.0) / 100.0 * 0.7).max(0.0)
	}
}

fn district_score(address: &str, criteria: Option<&SoftCriteria>) -> f64 {
	let Some(criteria) = criteria else {
		return 0.3;
	};

	if address.is_empty() {
		return 0.3;
	}

	let address_lower = address.to_lowercase();

	if let Some(target) = criteria.target_district.as_deref()
		&& address_lower.contains(&target.to_lowercase())
	{
		return 1.0;
	}

	if criteria
		.preferred_districts
		.iter()
		.any(|district| address_lower.contains(&district.to_lowercase()))
	{
		return 0.7;
	}

	0.3
}

fn rooms_score(rooms: Option<i32>, criteria: Option<&SoftCriteria>) -> f64 {
	let (Some(rooms), Some(target)) =
		(rooms, criteria.and_then(|criteria| criteria.target_rooms))
	else {
		return 0.5;
	};

	match (rooms - target).abs() {
		0 => 1.0,
		1 => 0.6,
		2 => 0.3,
		_ => 0.1,
	}
}

fn area_score(area: Option<f64>, criteria: Option<&SoftCriteria>) -> f64 {
	let (Some(area), Some(target)) =
		(area, criteria.and_then(|criteria| criteria.target_area))
	else {
		return 0.5;
	};

	if target == 0.0 {
		return 0.5;
	}

	let deviation = (area - target).abs() / target * 100.0;

	if deviation <= 15.0 {
		1.0 - (deviation / 15.0) * 0.3
	} else {
		(0.7 - (deviation - 15.0) / 50.0 * 0.7).max(0.0)
	}
}

/// Human-readable summary of the component scores. Deterministic: the same
/// scores and property fields always produce the same string.
fn build_explanation(matched: &MatchedProperty) -> String {
	let property = &matched.property;
	let mut parts = Vec::new();

	if matched.price_score.unwrap_or_default() >= 0.7
		&& let Some(price) = property.price
	{
		parts.push(format!("цена {price}₽ подходит"));
	}
	if matched.district_score.unwrap_or_default() >= 0.7 {
		parts.push("район подходит".to_string());
	}
	if matched.rooms_score.unwrap_or_default() >= 0.7
		&& let Some(rooms) = property.rooms
	{
		parts.push(format!("{rooms} комн."));
	}
	if matched.area_score.unwrap_or_default() >= 0.7
		&& let Some(area) = property.area
	{
		parts.push(format!("{area:.0} м²"));
	}
	if matched.semantic_score.unwrap_or_default() >= 0.6 {
		parts.push("описание соответствует".to_string());
	}

	if parts.is_empty() {
		return "частичное совпадение".to_string();
	}

	parts.join("; ")
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;
	use uuid::Uuid;

	use leadex_domain::{Property, PropertyStatus, PropertyType};

	use super::*;

	fn criteria() -> SoftCriteria {
		SoftCriteria {
			target_price: Some(10_000_000),
			target_district: Some("Центральный".to_string()),
			target_rooms: Some(3),
			target_area: Some(80.0),
			preferred_districts: vec!["Петроградский".to_string()],
		}
	}

	fn property(price: Option<i64>, rooms: Option<i32>, area: Option<f64>) -> Property {
		Property {
			property_id: Uuid::new_v4(),
			title: "Квартира".to_string(),
			description: "Описание".to_string(),
			address: "Санкт-Петербург, Центральный район".to_string(),
			city: Some("Санкт-Петербург".to_string()),
			property_type: PropertyType::Apartment,
			area,
			price,
			rooms,
			status: PropertyStatus::Published,
			owner_user_id: Uuid::new_v4(),
			created_user_id: Uuid::new_v4(),
			embedding: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
			updated_at: OffsetDateTime::UNIX_EPOCH,
		}
	}

	#[test]
	fn price_score_boundaries() {
		let criteria = criteria();

		// Exact target.
		assert!((price_score(Some(10_000_000), Some(&criteria)) - 1.0).abs() < 1e-9);
		// 20% deviation sits exactly at 0.7.
		assert!((price_score(Some(12_000_000), Some(&criteria)) - 0.7).abs() < 1e-9);
		assert!((price_score(Some(8_000_000), Some(&criteria)) - 0.7).abs() < 1e-9);
		// Missing data is neutral.
		assert!((price_score(None, Some(&criteria)) - 0.5).abs() < 1e-9);
		assert!((price_score(Some(10_000_000), None) - 0.5).abs() < 1e-9);
	}

	#[test]
	fn price_score_is_monotonically_non_increasing() {
		let criteria = criteria();
		let mut previous = f64::INFINITY;

		for price in (10_000_000..=30_000_000).step_by(500_000) {
			let score = price_score(Some(price), Some(&criteria));

			assert!(score <= previous + 1e-12, "score must not increase with deviation");
			assert!((0.0..=1.0).contains(&score));

			previous = score;
		}
	}

	#[test]
	fn rooms_score_mapping_is_fixed() {
		let criteria = criteria();

		assert_eq!(rooms_score(Some(3), Some(&criteria)), 1.0);
		assert_eq!(rooms_score(Some(4), Some(&criteria)), 0.6);
		assert_eq!(rooms_score(Some(2), Some(&criteria)), 0.6);
		assert_eq!(rooms_score(Some(5), Some(&criteria)), 0.3);
		assert_eq!(rooms_score(Some(7), Some(&criteria)), 0.1);
		assert_eq!(rooms_score(None, Some(&criteria)), 0.5);
	}

	#[test]
	fn district_score_prefers_target_over_preferred() {
		let criteria = criteria();

		assert_eq!(district_score("СПб, Центральный район, д. 1", Some(&criteria)), 1.0);
		assert_eq!(district_score("СПб, Петроградский район, д. 1", Some(&criteria)), 0.7);
		assert_eq!(district_score("СПб, Московский район, д. 1", Some(&criteria)), 0.3);
		assert_eq!(district_score("", Some(&criteria)), 0.3);
		assert_eq!(district_score("любой адрес", None), 0.3);
	}

	#[test]
	fn area_score_boundaries() {
		let criteria = criteria();

		assert!((area_score(Some(80.0), Some(&criteria)) - 1.0).abs() < 1e-9);
		assert!((area_score(Some(92.0), Some(&criteria)) - 0.7).abs() < 1e-9);
		assert!((area_score(None, Some(&criteria)) - 0.5).abs() < 1e-9);
	}

	#[test]
	fn semantic_score_shifts_negative_cosine() {
		assert_eq!(semantic_score(0.8), 0.8);
		assert_eq!(semantic_score(-1.0), 0.0);
		assert_eq!(semantic_score(-0.5), 0.25);
	}

	#[test]
	fn candidate_limit_is_clamped() {
		assert_eq!(candidate_limit(50, 10), 50);
		assert_eq!(candidate_limit(50, 15), 75);
		assert_eq!(candidate_limit(10, 2), 50);
		assert_eq!(candidate_limit(500, 10), 100);
		assert_eq!(candidate_limit(50, 30), 100);
	}

	#[test]
	fn ranking_reorders_without_changing_membership() {
		let criteria = criteria();
		let mut matches = vec![
			MatchedProperty::new(property(Some(30_000_000), Some(7), Some(200.0)), 0.2),
			MatchedProperty::new(property(Some(10_000_000), Some(3), Some(80.0)), 0.9),
		];
		let ids = {
			let mut ids =
				matches.iter().map(|m| m.property.property_id).collect::<Vec<_>>();

			ids.sort();

			ids
		};

		rank_matches(&mut matches, MatchWeights::default(), Some(&criteria));

		let mut ranked_ids =
			matches.iter().map(|m| m.property.property_id).collect::<Vec<_>>();

		ranked_ids.sort();

		assert_eq!(ids, ranked_ids, "ranking must never change membership");
		assert!(
			matches[0].total_score.unwrap_or_default()
				>= matches[1].total_score.unwrap_or_default()
		);
		assert!((matches[0].total_score.unwrap() - matches[0].price_score.unwrap() * 0.30
			- matches[0].district_score.unwrap() * 0.25
			- matches[0].rooms_score.unwrap() * 0.20
			- matches[0].area_score.unwrap() * 0.10
			- matches[0].semantic_score.unwrap() * 0.15)
			.abs() < 1e-9);
	}

	#[test]
	fn explanation_is_deterministic() {
		let criteria = criteria();
		let mut matched =
			MatchedProperty::new(property(Some(10_000_000), Some(3), Some(80.0)), 0.9);

		compute_scores(&mut matched, MatchWeights::default(), Some(&criteria));

		let explanation = matched.match_explanation.clone().expect("explanation is filled in");

		assert_eq!(
			explanation,
			"цена 10000000₽ подходит; район подходит; 3 комн.; 80 м²; описание соответствует"
		);

		let mut again =
			MatchedProperty::new(property(Some(10_000_000), Some(3), Some(80.0)), 0.9);

		compute_scores(&mut again, MatchWeights::default(), Some(&criteria));

		assert_eq!(again.match_explanation.as_deref(), Some(explanation.as_str()));
	}

	#[test]
	fn weak_match_reads_as_partial() {
		let criteria = criteria();
		let mut matched =
			MatchedProperty::new(property(Some(30_000_000), Some(7), Some(300.0)), 0.1);

		compute_scores(&mut matched, MatchWeights::default(), Some(&criteria));

		assert_eq!(matched.match_explanation.as_deref(), Some("частичное совпадение"));
	}

	#[test]
	fn hard_filter_synthesis_falls_back_to_description_city() {
		use leadex_domain::{LeadStatus, Requirement};

		let lead = Lead {
			lead_id: Uuid::new_v4(),
			title: "Квартира".to_string(),
			description: "Ищу квартиру в Санкт-Петербурге рядом с метро".to_string(),
			requirement: Requirement::default(),
			contact_name: "Иван".to_string(),
			contact_phone: "+79990000000".to_string(),
			contact_email: None,
			city: None,
			property_type: None,
			status: LeadStatus::Published,
			owner_user_id: Uuid::new_v4(),
			created_user_id: Uuid::new_v4(),
			embedding: None,
			created_at: OffsetDateTime::UNIX_EPOCH,
			updated_at: OffsetDateTime::UNIX_EPOCH,
		};
		let filters = build_hard_filters(&lead, None);

		assert_eq!(filters.city.as_deref(), Some("Санкт-Петербург"));
	}
}
