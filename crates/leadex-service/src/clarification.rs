use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use leadex_domain::{Lead, Requirement};
use leadex_providers::llm::{ClarificationRequest, LlmClient};

use crate::weights::{is_short_lead, missing_fields};

const MAX_QUESTIONS: usize = 5;
const CRITICAL_FIELDS: &[&str] = &["price", "city", "roomNumber"];

/// Detects under-specified leads, produces clarification questions and folds
/// the answers back into the lead's requirement bag.
pub struct ClarificationAgent {
	llm: Arc<LlmClient>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ClarificationResult {
	pub needs_clarification: bool,
	pub questions: Vec<Question>,
	pub priority: String,
	pub missing_fields: Vec<String>,
	pub lead_quality_score: f64,
}

#[derive(Clone, Debug, Serialize)]
pub struct Question {
	pub field: String,
	pub question: String,
	pub question_type: String,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub suggested_options: Vec<String>,
	pub importance: String,
}

impl ClarificationAgent {
	pub fn new(llm: Arc<LlmClient>) -> Self {
		Self { llm }
	}

	pub async fn analyze(&self, lead: &Lead) -> ClarificationResult {
		let missing = missing_fields(lead);
		let quality = lead_quality_score(lead, missing.len());
		let needs_clarification = is_short_lead(lead) || missing.len() >= 3;

		if !needs_clarification {
			return ClarificationResult {
				needs_clarification,
				questions: Vec::new(),
				priority: "low".to_string(),
				missing_fields: missing,
				lead_quality_score: quality,
			};
		}

		let priority = priority(&missing, quality);
		let questions = if self.llm.is_enabled() {
			match self.llm_questions(lead, &missing).await {
				Ok(questions) => questions,
				Err(err) => {
					warn!(
						lead_id = %lead.lead_id,
						error = %err,
						"LLM question generation failed. Using the template fallback."
					);

					fallback_questions(&missing)
				},
			}
		} else {
			fallback_questions(&missing)
		};

		info!(
			lead_id = %lead.lead_id,
			questions = questions.len(),
			priority,
			"Clarification analysis completed."
		);

		ClarificationResult {
			needs_clarification,
			questions,
			priority,
			missing_fields: missing,
			lead_quality_score: quality,
		}
	}

	async fn llm_questions(
		&self,
		lead: &Lead,
		missing: &[String],
	) -> crate::Result<Vec<Question>> {
		let request = ClarificationRequest {
			title: lead.title.clone(),
			description: lead.description.clone(),
			requirement: (!lead.requirement.is_empty()).then(|| lead.requirement.0.clone()),
			missing_fields: missing.to_vec(),
		};
		let response = self.llm.generate_clarification_questions(&request).await?;

		Ok(response
			.questions
			.into_iter()
			.map(|question| Question {
				field: question.field,
				question: question.question,
				question_type: question.question_type,
				suggested_options: question.suggested_options,
				importance: question.importance,
			})
			.collect())
	}
}

/// [0, 1] score of how much signal the lead carries.
pub fn lead_quality_score(lead: &Lead, missing_count: usize) -> f64 {
	let description_chars = lead.description.chars().count();
	let mut score = 1.0 - missing_count as f64 * 0.15;

	if description_chars < 30 {
		score -= 0.2;
	} else if description_chars < 50 {
		score -= 0.1;
	}
	if lead.city.as_deref().map(str::trim).unwrap_or_default().is_empty() {
		score -= 0.15;
	}
	if description_chars > 150 {
		score += 0.1;
	}

	score.clamp(0.0, 1.0)
}

fn priority(missing: &[String], quality: f64) -> String {
	let critical_missing =
		missing.iter().filter(|field| CRITICAL_FIELDS.contains(&field.as_str())).count();

	if quality < 0.3 || critical_missing >= 2 {
		return "high".to_string();
	}
	if quality < 0.6 || critical_missing >= 1 {
		return "medium".to_string();
	}

	"low".to_string()
}

fn template_for(field: &str) -> Option<Question> {
	let question = match field {
		"price" => Question {
			field: "price".to_string(),
			question: "Какой у вас примерный бюджет на покупку?".to_string(),
			question_type: "range".to_string(),
			suggested_options: vec![
				"до 5 млн ₽".to_string(),
				"5-10 млн ₽".to_string(),
				"10-15 млн ₽".to_string(),
				"15-25 млн ₽".to_string(),
				"от 25 млн ₽".to_string(),
			],
			importance: "required".to_string(),
		},
		"roomNumber" => Question {
			field: "roomNumber".to_string(),
			question: "Сколько комнат вам нужно?".to_string(),
			question_type: "choice".to_string(),
			suggested_options: vec![
				"Студия".to_string(),
				"1 комната".to_string(),
				"2 комнаты".to_string(),
				"3 комнаты".to_string(),
				"4+ комнаты".to_string(),
			],
			importance: "required".to_string(),
		},
		"city" => Question {
			field: "city".to_string(),
			question: "В каком городе вы ищете недвижимость?".to_string(),
			question_type: "open".to_string(),
			suggested_options: Vec::new(),
			importance: "required".to_string(),
		},
		"district" => Question {
			field: "district".to_string(),
			question: "Какой район или районы вы рассматриваете?".to_string(),
			question_type: "open".to_string(),
			suggested_options: vec![
				"Центральный".to_string(),
				"Спальный район".to_string(),
				"Новостройки".to_string(),
				"Рядом с метро".to_string(),
				"Любой".to_string(),
			],
			importance: "recommended".to_string(),
		},
		"area" => Question {
			field: "area".to_string(),
			question: "Какая минимальная площадь вас интересует?".to_string(),
			question_type: "range".to_string(),
			suggested_options: vec![
				"до 40 м²".to_string(),
				"40-60 м²".to_string(),
				"60-80 м²".to_string(),
				"80-100 м²".to_string(),
				"от 100 м²".to_string(),
			],
			importance: "recommended".to_string(),
		},
		_ => return None,
	};

	Some(question)
}

/// Fixed template table used when the LLM is unavailable: required
/// questions first, then recommended, capped at five.
fn fallback_questions(missing: &[String]) -> Vec<Question> {
	let mut questions = Vec::new();

	for importance in ["required", "recommended"] {
		for field in missing {
			if let Some(question) = template_for(field)
				&& question.importance == importance
			{
				questions.push(question);
			}
		}
	}

	questions.truncate(MAX_QUESTIONS);

	questions
}

/// Merges `{field: value}` answers into the requirement bag. Textual range
/// answers resolve through closed lookup tables; anything unrecognized
/// passes through as the raw string.
pub fn apply_answers(lead: &Lead, answers: &Map<String, Value>) -> Requirement {
	let mut requirement = lead.requirement.clone();

	for (field, value) in answers {
		match field.as_str() {
			"price" => match value {
				Value::String(raw) => match parse_price_range(raw) {
					Some(price) => requirement.insert(Requirement::KEY_PRICE, price.into()),
					None => requirement.insert(Requirement::KEY_PRICE, value.clone()),
				},
				Value::Number(number) =>
					if let Some(price) = number.as_f64() {
						requirement.insert(Requirement::KEY_PRICE, (price as i64).into());
					},
				_ => {},
			},
			"roomNumber" => match value {
				Value::String(raw) => match parse_rooms(raw) {
					Some(rooms) => requirement.insert(Requirement::KEY_ROOMS, rooms.into()),
					None => requirement.insert(Requirement::KEY_ROOMS, value.clone()),
				},
				Value::Number(number) =>
					if let Some(rooms) = number.as_f64() {
						requirement.insert(Requirement::KEY_ROOMS, (rooms as i64).into());
					},
				_ => {},
			},
			"area" => match value {
				Value::String(raw) => match parse_area(raw) {
					Some(area) => requirement.insert(Requirement::KEY_AREA, area.into()),
					None => requirement.insert(Requirement::KEY_AREA, value.clone()),
				},
				Value::Number(number) =>
					if let Some(area) = number.as_f64() {
						requirement.insert(Requirement::KEY_AREA, area.into());
					},
				_ => {},
			},
			"district" =>
				if let Value::String(district) = value
					&& !district.is_empty() && district != "Любой"
				{
					requirement.insert(Requirement::KEY_DISTRICT, value.clone());
				},
			_ => requirement.insert(field, value.clone()),
		}
	}

	requirement
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
	haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn parse_price_range(text: &str) -> Option<i64> {
	const PRICE_RANGES: &[(&str, i64)] = &[
		("до 5 млн", 5_000_000),
		("5-10 млн", 7_500_000),
		("10-15 млн", 12_500_000),
		("15-25 млн", 20_000_000),
		("от 25 млн", 30_000_000),
	];

	PRICE_RANGES
		.iter()
		.find(|(pattern, _)| contains_ignore_case(text, pattern))
		.map(|(_, price)| *price)
}

fn parse_rooms(text: &str) -> Option<i64> {
	const ROOM_PATTERNS: &[(&str, i64)] =
		&[("1 комнат", 1), ("2 комнат", 2), ("3 комнат", 3), ("4+ комнат", 4), ("4 комнат", 4)];

	ROOM_PATTERNS
		.iter()
		.find(|(pattern, _)| contains_ignore_case(text, pattern))
		.map(|(_, rooms)| *rooms)
}

fn parse_area(text: &str) -> Option<f64> {
	const AREA_RANGES: &[(&str, f64)] =
		&[("до 40", 35.0), ("40-60", 50.0), ("60-80", 70.0), ("80-100", 90.0), ("от 100", 120.0)];

	AREA_RANGES
		.iter()
		.find(|(pattern, _)| contains_ignore_case(text, pattern))
		.map(|(_, area)| *area)
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

	fn agent() -> ClarificationAgent {
		let llm = LlmClient::new(LlmConfig {
			enabled: false,
			base_url: String::new(),
			api_key: None,
			model: String::new(),
			timeout_ms: 1_000,
		})
		.expect("disabled client construction cannot fail");

		ClarificationAgent::new(Arc::new(llm))
	}

	#[tokio::test]
	async fn short_lead_triggers_high_priority_clarification() {
		let fixture = lead("Квартира", "хочу купить", serde_json::json!({}));
		let result = agent().analyze(&fixture).await;

		assert!(result.needs_clarification);
		assert_eq!(result.priority, "high");
		assert!(result.lead_quality_score < 0.3);
		assert!(
			result
				.questions
				.iter()
				.any(|question| question.field == "price" && question.importance == "required")
		);
	}

	#[tokio::test]
	async fn complete_lead_needs_no_clarification() {
		let mut fixture = lead(
			"Трёхкомнатная квартира в центре",
			"Ищу просторную трёхкомнатную квартиру в центре, рядом с метро и парком",
			serde_json::json!({ "price": 12_000_000, "roomNumber": 3, "area": 75.0, "district": "Центральный" }),
		);

		fixture.city = Some("Москва".to_string());

		let result = agent().analyze(&fixture).await;

		assert!(!result.needs_clarification);
		assert_eq!(result.priority, "low");
		assert!(result.questions.is_empty());
	}

	#[tokio::test]
	async fn required_questions_come_first_and_are_capped() {
		let fixture = lead("Квартира", "хочу купить", serde_json::json!({}));
		let result = agent().analyze(&fixture).await;

		assert!(result.questions.len() <= 5);

		let first_recommended = result
			.questions
			.iter()
			.position(|question| question.importance == "recommended")
			.unwrap_or(result.questions.len());

		assert!(
			result.questions[..first_recommended]
				.iter()
				.all(|question| question.importance == "required")
		);
		assert!(
			result.questions[first_recommended..]
				.iter()
				.all(|question| question.importance == "recommended")
		);
	}

	#[test]
	fn quality_score_rewards_detail() {
		let sparse = lead("Квартира", "хочу купить", serde_json::json!({}));
		let detailed = lead(
			"Трёхкомнатная квартира",
			&"Подробное описание запроса. ".repeat(8),
			serde_json::json!({ "price": 1, "roomNumber": 2, "area": 3, "district": "Х" }),
		);
		let sparse_score = lead_quality_score(&sparse, missing_fields(&sparse).len());
		let detailed_score = lead_quality_score(&detailed, missing_fields(&detailed).len());

		assert!(detailed_score > sparse_score);
		assert!((0.0..=1.0).contains(&sparse_score));
		assert!((0.0..=1.0).contains(&detailed_score));
	}

	#[test]
	fn answers_resolve_through_lookup_tables() {
		let fixture = lead("Квартира", "хочу купить", serde_json::json!({}));
		let mut answers = Map::new();

		answers.insert("price".to_string(), Value::String("10-15 млн ₽".to_string()));
		answers.insert("roomNumber".to_string(), Value::String("3 комнаты".to_string()));
		answers.insert("area".to_string(), Value::String("60-80 м²".to_string()));
		answers.insert("district".to_string(), Value::String("Центральный".to_string()));

		let requirement = apply_answers(&fixture, &answers);

		assert_eq!(requirement.target_price(), Some(12_500_000));
		assert_eq!(requirement.target_rooms(), Some(3));
		assert_eq!(requirement.target_area(), Some(70.0));
		assert_eq!(requirement.target_district().as_deref(), Some("Центральный"));
	}

	#[test]
	fn unknown_textual_answers_pass_through() {
		let fixture = lead("Квартира", "хочу купить", serde_json::json!({}));
		let mut answers = Map::new();

		answers.insert("price".to_string(), Value::String("сколько не жалко".to_string()));
		answers.insert("parking".to_string(), Value::String("обязательно".to_string()));
		answers.insert("district".to_string(), Value::String("Любой".to_string()));

		let requirement = apply_answers(&fixture, &answers);

		assert_eq!(
			requirement.0.get("price"),
			Some(&Value::String("сколько не жалко".to_string()))
		);
		assert_eq!(
			requirement.0.get("parking"),
			Some(&Value::String("обязательно".to_string()))
		);
		assert!(requirement.0.get("district").is_none());
	}

	#[test]
	fn numeric_answers_apply_directly() {
		let fixture = lead("Квартира", "хочу купить", serde_json::json!({}));
		let mut answers = Map::new();

		answers.insert("price".to_string(), serde_json::json!(6_500_000));
		answers.insert("roomNumber".to_string(), serde_json::json!(2));

		let requirement = apply_answers(&fixture, &answers);

		assert_eq!(requirement.target_price(), Some(6_500_000));
		assert_eq!(requirement.target_rooms(), Some(2));
	}
}
