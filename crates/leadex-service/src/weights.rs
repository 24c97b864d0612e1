use std::sync::Arc;

use tracing::{info, warn};

use leadex_domain::{Lead, MatchWeights, Requirement, SoftCriteria};
use leadex_providers::llm::{AnalyzeLeadRequest, LlmClient};

use crate::Result;

const BUDGET_KEYWORDS: &[&str] =
	&["бюджет", "недорого", "дешево", "эконом", "до ", "не более", "максимум"];
const LOCATION_KEYWORDS: &[&str] =
	&["район", "рядом с", "около", "центр", "метро", "улица", "жк", "жилой комплекс"];
const FAMILY_KEYWORDS: &[&str] =
	&["семья", "дети", "школ", "детский сад", "площадка", "большая", "просторн"];
const INVESTOR_KEYWORDS: &[&str] = &["инвест", "аренд", "доход", "окупаем", "сдавать", "бизнес"];
const LUXURY_KEYWORDS: &[&str] = &["элит", "премиум", "люкс", "пентхаус", "вид", "панорам", "террас"];

const SHORT_DESCRIPTION_CHARS: usize = 30;
const DETAILED_DESCRIPTION_CHARS: usize = 100;

/// Picks per-lead ranking weights: the LLM when it is enabled and answers,
/// keyword heuristics otherwise. Analysis never fails the caller.
pub struct WeightsAnalyzer {
	llm: Arc<LlmClient>,
	dynamic_weights_enabled: bool,
}

#[derive(Clone, Debug)]
pub struct LeadAnalysis {
	pub weights: MatchWeights,
	pub criteria: Option<SoftCriteria>,
	pub lead_type: String,
	pub confidence: f64,
	pub explanation: String,
	pub used_llm: bool,
}

impl WeightsAnalyzer {
	pub fn new(llm: Arc<LlmClient>, dynamic_weights_enabled: bool) -> Self {
		Self { llm, dynamic_weights_enabled }
	}

	pub async fn analyze(&self, lead: &Lead) -> LeadAnalysis {
		if !self.dynamic_weights_enabled {
			return self.heuristic(lead);
		}

		if self.llm.is_enabled() {
			match self.llm_analysis(lead).await {
				Ok(analysis) => {
					info!(
						lead_id = %lead.lead_id,
						lead_type = analysis.lead_type,
						confidence = analysis.confidence,
						"LLM lead analysis completed."
					);

					return analysis;
				},
				Err(err) => {
					warn!(
						lead_id = %lead.lead_id,
						error = %err,
						"LLM lead analysis failed. Falling back to the heuristic."
					);
				},
			}
		}

		self.heuristic(lead)
	}

	async fn llm_analysis(&self, lead: &Lead) -> Result<LeadAnalysis> {
		let request = AnalyzeLeadRequest {
			title: lead.title.clone(),
			description: lead.description.clone(),
			requirement: (!lead.requirement.is_empty()).then(|| lead.requirement.0.clone()),
		};
		let response = self.llm.analyze_lead_intent(&request).await?;
		let recommended = response.recommended_weights;
		// LLM weights are taken as-is and then normalized.
		let weights = MatchWeights {
			price: recommended.price,
			district: recommended.district,
			rooms: recommended.rooms,
			area: recommended.area,
			semantic: recommended.semantic,
		}
		.normalize();
		let criteria = (!response.extracted_criteria.is_empty()).then(|| {
			let extracted = response.extracted_criteria;

			SoftCriteria {
				target_price: extracted.target_price,
				target_district: extracted.target_district,
				target_rooms: extracted.target_rooms,
				target_area: extracted.target_area,
				preferred_districts: extracted.preferred_districts,
			}
		});

		Ok(LeadAnalysis {
			weights,
			criteria,
			lead_type: response.lead_type,
			confidence: response.confidence,
			explanation: response.explanation,
			used_llm: true,
		})
	}

	fn heuristic(&self, lead: &Lead) -> LeadAnalysis {
		let text = format!("{} {}", lead.title, lead.description).to_lowercase();
		let (lead_type, weights) = detect_lead_type(&text);
		let criteria = lead.requirement.soft_criteria();
		let weights = adjust_weights(weights, lead, criteria.as_ref());
		let mut analysis = LeadAnalysis {
			weights,
			criteria,
			lead_type: lead_type.to_string(),
			confidence: 0.5,
			explanation: String::new(),
			used_llm: false,
		};

		analysis.explanation = heuristic_explanation(&analysis);

		analysis
	}
}

fn count_keywords(text: &str, keywords: &[&str]) -> usize {
	keywords.iter().filter(|keyword| text.contains(*keyword)).count()
}

/// The highest-scoring keyword family selects a fixed preset; zero matches
/// mean a balanced lead.
fn detect_lead_type(text: &str) -> (&'static str, MatchWeights) {
	let budget = count_keywords(text, BUDGET_KEYWORDS);
	let location = count_keywords(text, LOCATION_KEYWORDS);
	let family = count_keywords(text, FAMILY_KEYWORDS);
	let investor = count_keywords(text, INVESTOR_KEYWORDS);
	let luxury = count_keywords(text, LUXURY_KEYWORDS);

	let mut max_score = budget;
	let mut lead_type = "budget_oriented";
	let mut weights =
		MatchWeights { price: 0.45, district: 0.20, rooms: 0.15, area: 0.10, semantic: 0.10 };

	if location > max_score {
		max_score = location;
		lead_type = "location_oriented";
		weights =
			MatchWeights { price: 0.20, district: 0.40, rooms: 0.15, area: 0.10, semantic: 0.15 };
	}
	if family > max_score {
		max_score = family;
		lead_type = "family_oriented";
		weights =
			MatchWeights { price: 0.20, district: 0.20, rooms: 0.30, area: 0.20, semantic: 0.10 };
	}
	if investor > max_score {
		max_score = investor;
		lead_type = "investor";
		weights =
			MatchWeights { price: 0.35, district: 0.30, rooms: 0.10, area: 0.10, semantic: 0.15 };
	}
	if luxury > max_score {
		max_score = luxury;
		lead_type = "luxury";
		weights =
			MatchWeights { price: 0.10, district: 0.25, rooms: 0.15, area: 0.20, semantic: 0.30 };
	}

	if max_score == 0 {
		return ("balanced", MatchWeights::default());
	}

	(lead_type, weights)
}

/// Multiplicative boosts for signals the lead actually carries, renormalized
/// at the end.
fn adjust_weights(
	mut weights: MatchWeights,
	lead: &Lead,
	criteria: Option<&SoftCriteria>,
) -> MatchWeights {
	if lead.city.as_deref().is_some_and(|city| !city.is_empty()) {
		weights.district *= 1.2;
	}
	if let Some(criteria) = criteria {
		if criteria.target_price.is_some() {
			weights.price *= 1.2;
		}
		if criteria.target_district.is_some() {
			weights.district *= 1.3;
		}
	}
	if lead.description.chars().count() > DETAILED_DESCRIPTION_CHARS {
		weights.semantic *= 1.3;
	}

	weights.normalize()
}

fn heuristic_explanation(analysis: &LeadAnalysis) -> String {
	let mut parts = vec![match analysis.lead_type.as_str() {
		"budget_oriented" => "Клиент ориентирован на бюджет".to_string(),
		"location_oriented" => "Локация — приоритет".to_string(),
		"family_oriented" => "Запрос для семьи (важны комнаты и площадь)".to_string(),
		"investor" => "Инвестиционный запрос".to_string(),
		"luxury" => "Премиум-сегмент".to_string(),
		_ => "Сбалансированный запрос".to_string(),
	}];

	if let Some(criteria) = analysis.criteria.as_ref() {
		if let Some(price) = criteria.target_price {
			parts.push(format!("бюджет ~{price}₽"));
		}
		if let Some(district) = criteria.target_district.as_deref() {
			parts.push(format!("район: {district}"));
		}
		if let Some(rooms) = criteria.target_rooms {
			parts.push(format!("{rooms} комн."));
		}
	}

	parts.join("; ")
}

/// A short lead carries too little structured signal to match against and
/// triggers the clarification flow. Thresholds count characters, not bytes.
pub fn is_short_lead(lead: &Lead) -> bool {
	if lead.description.chars().count() < SHORT_DESCRIPTION_CHARS {
		return true;
	}
	if lead.requirement.is_empty() {
		return true;
	}

	!lead.requirement.contains(Requirement::KEY_PRICE)
		&& !lead.requirement.contains(Requirement::KEY_ROOMS)
}

pub fn missing_fields(lead: &Lead) -> Vec<String> {
	let mut missing = Vec::new();

	if lead.city.as_deref().map(str::trim).unwrap_or_default().is_empty() {
		missing.push("city".to_string());
	}

	if lead.requirement.is_empty() {
		for field in ["price", "roomNumber", "area", "district"] {
			missing.push(field.to_string());
		}

		return missing;
	}

	for key in
		[Requirement::KEY_PRICE, Requirement::KEY_ROOMS, Requirement::KEY_AREA, Requirement::KEY_DISTRICT]
	{
		if !lead.requirement.contains(key) {
			missing.push(key.to_string());
		}
	}

	missing
}

#[cfg(test)]
mod tests {
	use time::OffsetDateTime;
	use uuid::Uuid;

	use leadex_config::LlmConfig;
	use leadex_domain::LeadStatus;

	use super::*;

	fn lead(title: &str, description: &str, requirement: serde_json::Value) -> Lead {
		Lead {
			lead_id: Uuid::new_v4(),
			title: title.to_string(),
			description: description.to_string(),
			requirement: serde_json::from_value(requirement)
				.expect("requirement fixture must deserialize"),
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
		}
	}

	fn analyzer(dynamic: bool) -> WeightsAnalyzer {
		let llm = LlmClient::new(LlmConfig {
			enabled: false,
			base_url: String::new(),
			api_key: None,
			model: String::new(),
			timeout_ms: 1_000,
		})
		.expect("disabled client construction cannot fail");

		WeightsAnalyzer::new(Arc::new(llm), dynamic)
	}

	#[tokio::test]
	async fn budget_keywords_select_the_budget_preset() {
		let lead = lead("Ищу квартиру недорого", "Бюджет до 5 млн", serde_json::json!({}));
		let analysis = analyzer(true).analyze(&lead).await;

		assert_eq!(analysis.lead_type, "budget_oriented");
		assert!(analysis.weights.price >= 0.3);
		assert!(!analysis.used_llm);
		assert!((analysis.weights.sum() - 1.0).abs() < 1e-2);
	}

	#[tokio::test]
	async fn family_keywords_select_the_family_preset() {
		let lead = lead(
			"Квартира для семьи",
			"Нужна просторная квартира, рядом школа и детский сад, у нас дети",
			serde_json::json!({}),
		);
		let analysis = analyzer(true).analyze(&lead).await;

		assert_eq!(analysis.lead_type, "family_oriented");
		assert!(analysis.weights.rooms >= 0.25);
	}

	#[tokio::test]
	async fn no_keywords_mean_balanced() {
		let lead = lead("Помещение", "Есть помещение в хорошем состоянии, звоните в любое время", serde_json::json!({}));
		let analysis = analyzer(true).analyze(&lead).await;

		assert_eq!(analysis.lead_type, "balanced");
	}

	#[tokio::test]
	async fn dynamic_weights_off_still_extracts_criteria() {
		let lead = lead(
			"Трёшка",
			"Хочу трёхкомнатную квартиру в центре города, желательно поближе к метро",
			serde_json::json!({ "roomNumber": 3, "price": 9_000_000 }),
		);
		let analysis = analyzer(false).analyze(&lead).await;
		let criteria = analysis.criteria.expect("requirement carries criteria");

		assert_eq!(criteria.target_rooms, Some(3));
		assert_eq!(criteria.target_price, Some(9_000_000));
	}

	#[tokio::test]
	async fn price_criterion_boosts_the_price_weight() {
		let with_price = lead(
			"Квартира",
			"Очень длинное описание без ключевых слов из словарей типов лидов вообще",
			serde_json::json!({ "price": 5_000_000 }),
		);
		let without_price = lead(
			"Квартира",
			"Очень длинное описание без ключевых слов из словарей типов лидов вообще",
			serde_json::json!({ "area": 40.0 }),
		);
		let analyzer = analyzer(true);
		let boosted = analyzer.analyze(&with_price).await;
		let plain = analyzer.analyze(&without_price).await;

		assert!(boosted.weights.price > plain.weights.price);
	}

	#[test]
	fn short_lead_detection() {
		assert!(is_short_lead(&lead("Квартира", "хочу купить", serde_json::json!({}))));
		assert!(is_short_lead(&lead(
			"Квартира",
			"Описание достаточно длинное, чтобы пройти порог тридцати символов",
			serde_json::json!({})
		)));
		assert!(is_short_lead(&lead(
			"Квартира",
			"Описание достаточно длинное, чтобы пройти порог тридцати символов",
			serde_json::json!({ "district": "Центральный" })
		)));
		assert!(!is_short_lead(&lead(
			"Квартира",
			"Описание достаточно длинное, чтобы пройти порог тридцати символов",
			serde_json::json!({ "price": 5_000_000 })
		)));
	}

	#[test]
	fn missing_fields_cover_empty_requirements() {
		let lead = lead("Квартира", "хочу купить", serde_json::json!({}));
		let missing = missing_fields(&lead);

		assert_eq!(missing, vec!["city", "price", "roomNumber", "area", "district"]);
	}

	#[test]
	fn missing_fields_respect_aliases() {
		let mut fixture = lead(
			"Квартира",
			"хочу купить",
			serde_json::json!({ "preferredPrice": "8000000", "rooms": 2 }),
		);

		fixture.city = Some("Москва".to_string());

		let missing = missing_fields(&fixture);

		assert_eq!(missing, vec!["area", "district"]);
	}
}
