use std::sync::LazyLock;

use regex::Regex;

/// Closed list of cities the matcher recognizes without parsing.
pub const KNOWN_CITIES: &[&str] = &[
	"Москва",
	"Санкт-Петербург",
	"Новосибирск",
	"Екатеринбург",
	"Казань",
	"Нижний Новгород",
	"Челябинск",
	"Самара",
	"Омск",
	"Ростов-на-Дону",
	"Уфа",
	"Красноярск",
	"Воронеж",
	"Пермь",
	"Волгоград",
	"Краснодар",
	"Саратов",
	"Тюмень",
	"Тольятти",
	"Ижевск",
	"Барнаул",
	"Ульяновск",
	"Иркутск",
	"Хабаровск",
	"Ярославль",
	"Владивосток",
	"Махачкала",
	"Томск",
	"Оренбург",
	"Кемерово",
	"Новокузнецк",
	"Рязань",
	"Астрахань",
	"Набережные Челны",
	"Пенза",
	"Липецк",
	"Киров",
	"Чебоксары",
	"Тула",
	"Калининград",
	"Сочи",
	"Севастополь",
	"Симферополь",
	"Moscow",
	"Saint Petersburg",
	"St. Petersburg",
];

static CITY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
	[
		// "г. Название"
		r"(?i)г\.\s*([А-Яа-яЁё-]+)",
		// "город Название"
		r"(?i)город\s+([А-Яа-яЁё-]+)",
		// city at the head of the address, up to the first comma
		r"^([А-Яа-яЁё-]+),",
	]
	.iter()
	.map(|pattern| Regex::new(pattern).expect("city pattern must compile"))
	.collect()
});

/// Tries the known-city list first, then the pattern fallbacks. Returns the
/// canonical spelling for list hits and the raw capture otherwise.
pub fn extract_city_from_address(address: &str) -> Option<String> {
	if address.is_empty() {
		return None;
	}

	let address_lower = address.to_lowercase();

	for city in KNOWN_CITIES {
		if address_lower.contains(&city.to_lowercase()) {
			return Some((*city).to_string());
		}
	}

	for pattern in CITY_PATTERNS.iter() {
		if let Some(captures) = pattern.captures(address)
			&& let Some(city) = captures.get(1)
		{
			let city = city.as_str().trim();

			if city.chars().count() >= 3 {
				return Some(city.to_string());
			}
		}
	}

	None
}

/// Canonical spelling for a city name: slang and abbreviations map onto the
/// full name, anything else gets its first letter capitalized.
pub fn normalize_city(city: &str) -> String {
	let city = city.trim();
	let normalized = match city.to_lowercase().as_str() {
		"спб" | "питер" | "санкт петербург" | "saint petersburg" | "st. petersburg" =>
			Some("Санкт-Петербург"),
		"мск" | "moscow" => Some("Москва"),
		"нск" => Some("Новосибирск"),
		"екб" => Some("Екатеринбург"),
		"ростов" => Some("Ростов-на-Дону"),
		"нижний" => Some("Нижний Новгород"),
		_ => None,
	};

	if let Some(normalized) = normalized {
		return normalized.to_string();
	}

	let mut chars = city.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Equality of the normalized spellings, case-insensitively.
pub fn cities_match(a: &str, b: &str) -> bool {
	if a.is_empty() || b.is_empty() {
		return false;
	}

	normalize_city(a).to_lowercase() == normalize_city(b).to_lowercase()
}
