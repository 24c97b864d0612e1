use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use leadex_config::LlmConfig;

use crate::{
	Error, Result,
	metrics::{self, ServiceKind},
};

const LISTING_SYSTEM_PROMPT: &str = "Ты — эксперт по недвижимости. Создавай привлекательные, \
	информативные и точные заголовки и описания для объектов недвижимости. Ответ давай строго в \
	формате JSON.";
const ANALYZE_SYSTEM_PROMPT: &str = "Ты — AI-аналитик запросов на недвижимость. Анализируй текст \
	лида и определяй:\n1. Приоритеты клиента (бюджет, локация, размер и т.д.)\n2. Рекомендованные \
	веса для поиска (сумма = 1.0)\n3. Извлечённые критерии поиска\n4. Тип лида (budget_oriented, \
	location_oriented, family_oriented, investor, luxury, first_time_buyer)\nОтвет строго в \
	формате JSON.";
const CLARIFICATION_SYSTEM_PROMPT: &str = "Ты — AI-ассистент риелтора. Генерируй релевантные \
	уточняющие вопросы для клиентов, чтобы лучше понять их потребности. Вопросы должны быть \
	вежливыми, конкретными и помогать найти идеальный объект недвижимости. Ответ строго в \
	формате JSON.";
const ENRICH_SYSTEM_PROMPT: &str = "Ты — эксперт по созданию описаний недвижимости. Обогащай \
	существующие описания, добавляя релевантную информацию из структурированных данных. \
	Сохраняй стиль оригинального описания. Ответ строго в формате JSON.";

/// Chat-completion client with one fixed system prompt per task and a
/// JSON-only response contract. Disabled variant echoes the input with zero
/// confidence and never invents content.
pub struct LlmClient {
	cfg: LlmConfig,
	http: Option<Client>,
}
impl LlmClient {
	pub fn new(cfg: LlmConfig) -> Result<Self> {
		let http = if cfg.enabled { Some(crate::http_client(cfg.timeout_ms)?) } else { None };

		Ok(Self { cfg, http })
	}

	pub fn is_enabled(&self) -> bool {
		self.http.is_some()
	}

	pub async fn generate_listing(
		&self,
		request: &GenerateListingRequest,
	) -> Result<GenerateListingResponse> {
		if self.http.is_none() {
			return Ok(GenerateListingResponse {
				title: request.existing_title.clone().unwrap_or_default(),
				description: request.existing_description.clone().unwrap_or_default(),
				keywords: Vec::new(),
				confidence: 0.0,
			});
		}

		let content =
			self.chat(LISTING_SYSTEM_PROMPT, build_listing_prompt(request), 0.7, 500).await?;

		parse_task_json(&content)
	}

	pub async fn analyze_lead_intent(
		&self,
		request: &AnalyzeLeadRequest,
	) -> Result<AnalyzeLeadResponse> {
		if self.http.is_none() {
			return Ok(AnalyzeLeadResponse {
				recommended_weights: WeightRecommendation::default(),
				extracted_criteria: ExtractedCriteria::default(),
				lead_type: "unknown".to_string(),
				confidence: 0.0,
				explanation: "LLM service disabled".to_string(),
			});
		}

		let content =
			self.chat(ANALYZE_SYSTEM_PROMPT, build_analyze_prompt(request), 0.3, 800).await?;

		parse_task_json(&content)
	}

	pub async fn generate_clarification_questions(
		&self,
		request: &ClarificationRequest,
	) -> Result<ClarificationResponse> {
		if self.http.is_none() {
			return Ok(ClarificationResponse {
				questions: Vec::new(),
				priority: "low".to_string(),
			});
		}

		let content = self
			.chat(CLARIFICATION_SYSTEM_PROMPT, build_clarification_prompt(request), 0.5, 600)
			.await?;

		parse_task_json(&content)
	}

	pub async fn enrich_description(
		&self,
		request: &EnrichDescriptionRequest,
	) -> Result<EnrichDescriptionResponse> {
		if self.http.is_none() {
			return Ok(EnrichDescriptionResponse {
				enriched_description: request.current_description.clone(),
				added_features: Vec::new(),
				confidence: 0.0,
			});
		}

		let content =
			self.chat(ENRICH_SYSTEM_PROMPT, build_enrich_prompt(request), 0.6, 800).await?;

		parse_task_json(&content)
	}

	async fn chat(
		&self,
		system: &str,
		user: String,
		temperature: f64,
		max_tokens: u32,
	) -> Result<String> {
		let http = self.http.as_ref().ok_or_else(|| Error::InvalidResponse {
			message: "LLM client is disabled.".to_string(),
		})?;
		let body = ChatCompletionRequest {
			model: self.cfg.model.clone(),
			messages: vec![
				ChatMessage { role: "system".to_string(), content: system.to_string() },
				ChatMessage { role: "user".to_string(), content: user },
			],
			temperature,
			max_tokens,
		};
		let url = format!("{}/chat/completions", self.cfg.base_url);
		let timer = metrics::global().start(ServiceKind::Llm);
		let result = async {
			let builder = crate::with_auth(http.post(url), self.cfg.api_key.as_deref());
			let response = crate::ensure_success(builder.json(&body).send().await?).await?;
			let completion: ChatCompletionResponse = response.json().await?;

			Ok::<_, Error>(completion)
		}
		.await;

		match result {
			Ok(completion) => {
				let tokens =
					completion.usage.as_ref().map(|usage| usage.total_tokens).unwrap_or(0);

				timer.stop(true, tokens);

				completion
					.choices
					.into_iter()
					.next()
					.map(|choice| choice.message.content)
					.ok_or_else(|| Error::InvalidResponse {
						message: "Chat completion carries no choices.".to_string(),
					})
			},
			Err(err) => {
				timer.stop(false, 0);

				Err(err)
			},
		}
	}
}

fn build_listing_prompt(request: &GenerateListingRequest) -> String {
	let mut prompt = String::from(
		"Создай привлекательный заголовок и описание для объекта недвижимости:\n\n",
	);

	prompt.push_str(&format!("Тип: {}\n", request.property_type));
	prompt.push_str(&format!("Адрес: {}\n", request.address));
	prompt.push_str(&format!("Город: {}\n", request.city));

	if let Some(price) = request.price {
		prompt.push_str(&format!("Цена: {price} руб.\n"));
	}
	if let Some(rooms) = request.rooms {
		prompt.push_str(&format!("Комнат: {rooms}\n"));
	}
	if let Some(area) = request.area {
		prompt.push_str(&format!("Площадь: {area:.1} м²\n"));
	}
	if let Some(title) = request.existing_title.as_deref() {
		prompt.push_str(&format!("\nТекущий заголовок (улучши): {title}\n"));
	}
	if let Some(description) = request.existing_description.as_deref() {
		prompt.push_str(&format!("Текущее описание (улучши): {description}\n"));
	}

	prompt.push_str(
		"\nОтвет в формате JSON: {\"title\": \"...\", \"description\": \"...\", \
		 \"keywords\": [...], \"confidence\": 0.9}",
	);

	prompt
}

fn build_analyze_prompt(request: &AnalyzeLeadRequest) -> String {
	let mut prompt = String::from("Проанализируй запрос клиента на недвижимость:\n\n");

	prompt.push_str(&format!("Заголовок: {}\n", request.title));
	prompt.push_str(&format!("Описание: {}\n", request.description));

	if let Some(requirement) = request.requirement.as_ref()
		&& let Ok(json) = serde_json::to_string(requirement)
	{
		prompt.push_str(&format!("Требования: {json}\n"));
	}

	prompt.push_str(
		"\nОпредели:\n1. recommended_weights — веса для поиска (price, district, rooms, area, \
		 semantic), сумма = 1.0\n2. extracted_criteria — извлечённые критерии (target_price, \
		 target_district, target_rooms, target_area, preferred_districts)\n3. lead_type — тип \
		 клиента\n4. confidence — уверенность анализа (0-1)\n5. explanation — краткое \
		 объяснение\n\nОтвет в формате JSON.",
	);

	prompt
}

fn build_clarification_prompt(request: &ClarificationRequest) -> String {
	let mut prompt =
		String::from("Клиент оставил запрос на недвижимость с недостаточной информацией:\n\n");

	prompt.push_str(&format!("Заголовок: {}\n", request.title));
	prompt.push_str(&format!("Описание: {}\n", request.description));

	if !request.missing_fields.is_empty() {
		prompt.push_str(&format!(
			"Незаполненные поля: {}\n",
			request.missing_fields.join(", ")
		));
	}

	prompt.push_str(
		"\nСгенерируй уточняющие вопросы в формате JSON:\n{\n  \"questions\": [\n    {\n      \
		 \"field\": \"price\",\n      \"question\": \"Какой у вас примерный бюджет?\",\n      \
		 \"question_type\": \"range\",\n      \"suggested_options\": [\"до 5 млн\", \"5-10 млн\", \
		 \"10-15 млн\", \"от 15 млн\"],\n      \"importance\": \"required\"\n    }\n  ],\n  \
		 \"priority\": \"high\"\n}",
	);

	prompt
}

fn build_enrich_prompt(request: &EnrichDescriptionRequest) -> String {
	let mut prompt = String::from("Обогати описание объекта недвижимости:\n\n");

	prompt.push_str(&format!("Текущее описание: {}\n", request.current_description));

	if let Ok(json) = serde_json::to_string(&request.structured_data) {
		prompt.push_str(&format!("Структурированные данные: {json}\n"));
	}

	prompt.push_str(
		"\nОтвет в формате JSON:\n{\n  \"enriched_description\": \"...\",\n  \"added_features\": \
		 [\"...\"],\n  \"confidence\": 0.9\n}",
	);

	prompt
}

/// Models occasionally wrap the JSON in prose. Keep the span between the
/// first `{` and the last `}` before decoding.
fn extract_json(text: &str) -> &str {
	let Some(start) = text.find('{') else {
		return text;
	};
	let Some(end) = text.rfind('}') else {
		return text;
	};

	if end > start { &text[start..=end] } else { text }
}

fn parse_task_json<T>(content: &str) -> Result<T>
where
	T: serde::de::DeserializeOwned,
{
	serde_json::from_str(extract_json(content))
		.map_err(|err| Error::Parse { message: err.to_string() })
}

#[derive(Clone, Debug, Serialize)]
struct ChatCompletionRequest {
	model: String,
	messages: Vec<ChatMessage>,
	temperature: f64,
	max_tokens: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ChatMessage {
	role: String,
	content: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatCompletionResponse {
	choices: Vec<ChatChoice>,
	#[serde(default)]
	usage: Option<ChatUsage>,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatChoice {
	message: ChatMessage,
}

#[derive(Clone, Debug, Deserialize)]
struct ChatUsage {
	#[serde(default)]
	total_tokens: i64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct GenerateListingRequest {
	pub property_type: String,
	pub address: String,
	pub city: String,
	pub price: Option<i64>,
	pub rooms: Option<i32>,
	pub area: Option<f64>,
	pub existing_title: Option<String>,
	pub existing_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GenerateListingResponse {
	pub title: String,
	pub description: String,
	#[serde(default)]
	pub keywords: Vec<String>,
	#[serde(default)]
	pub confidence: f64,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct AnalyzeLeadRequest {
	pub title: String,
	pub description: String,
	pub requirement: Option<Map<String, Value>>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnalyzeLeadResponse {
	pub recommended_weights: WeightRecommendation,
	#[serde(default)]
	pub extracted_criteria: ExtractedCriteria,
	#[serde(default)]
	pub lead_type: String,
	#[serde(default)]
	pub confidence: f64,
	#[serde(default)]
	pub explanation: String,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct WeightRecommendation {
	pub price: f64,
	pub district: f64,
	pub rooms: f64,
	pub area: f64,
	pub semantic: f64,
}
impl Default for WeightRecommendation {
	fn default() -> Self {
		Self { price: 0.30, district: 0.25, rooms: 0.20, area: 0.10, semantic: 0.15 }
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ExtractedCriteria {
	pub target_price: Option<i64>,
	pub target_district: Option<String>,
	pub target_rooms: Option<i32>,
	pub target_area: Option<f64>,
	#[serde(default)]
	pub preferred_districts: Vec<String>,
}
impl ExtractedCriteria {
	pub fn is_empty(&self) -> bool {
		self.target_price.is_none()
			&& self.target_district.is_none()
			&& self.target_rooms.is_none()
			&& self.target_area.is_none()
			&& self.preferred_districts.is_empty()
	}
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ClarificationRequest {
	pub title: String,
	pub description: String,
	pub requirement: Option<Map<String, Value>>,
	pub missing_fields: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClarificationResponse {
	#[serde(default)]
	pub questions: Vec<ClarificationQuestion>,
	#[serde(default)]
	pub priority: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClarificationQuestion {
	pub field: String,
	pub question: String,
	#[serde(default)]
	pub question_type: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub suggested_options: Vec<String>,
	#[serde(default)]
	pub importance: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct EnrichDescriptionRequest {
	pub current_description: String,
	pub structured_data: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct EnrichDescriptionResponse {
	pub enriched_description: String,
	#[serde(default)]
	pub added_features: Vec<String>,
	#[serde(default)]
	pub confidence: f64,
}
