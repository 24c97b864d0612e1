use std::str::FromStr;

use leadex_domain::{
	HardFilters, MatchWeights, PropertyStatus, Requirement, SoftCriteria, city, preset_by_id,
	preset_for_lead_type, weight_presets,
};

#[test]
fn normalized_weights_sum_to_one() {
	let cases = [
		MatchWeights { price: 0.5, district: 0.5, rooms: 0.5, area: 0.5, semantic: 0.5 },
		MatchWeights { price: 3.0, district: 0.0, rooms: 0.0, area: 0.0, semantic: 1.0 },
		MatchWeights::default(),
		MatchWeights::new(10.0, 1.0, 1.0, 1.0, 1.0),
	];

	for weights in cases {
		let normalized = weights.normalize();

		assert!(
			(normalized.sum() - 1.0).abs() < 1e-2,
			"weights {normalized:?} must sum to 1, got {}",
			normalized.sum()
		);
	}
}

#[test]
fn degenerate_weights_fall_back_to_defaults() {
	let zero = MatchWeights { price: 0.0, district: 0.0, rooms: 0.0, area: 0.0, semantic: 0.0 };

	assert_eq!(zero.normalize(), MatchWeights::default());

	let negative =
		MatchWeights { price: -1.0, district: 0.0, rooms: 0.0, area: 0.0, semantic: 0.5 };

	assert_eq!(negative.normalize(), MatchWeights::default());
}

#[test]
fn every_preset_is_normalized() {
	let presets = weight_presets();

	assert_eq!(presets.len(), 5);

	for preset in presets {
		assert!(
			(preset.weights.sum() - 1.0).abs() < 1e-2,
			"preset {} must carry normalized weights",
			preset.id
		);
	}

	assert!(preset_by_id("balanced").is_some());
	assert!(preset_by_id("nope").is_none());
	assert_eq!(preset_for_lead_type("budget_oriented").id, "budget_first");
	assert_eq!(preset_for_lead_type("investor").id, "budget_first");
	assert_eq!(preset_for_lead_type("luxury").id, "semantic");
	assert_eq!(preset_for_lead_type("unknown").id, "balanced");
}

#[test]
fn hard_filters_apply_tolerances() {
	let criteria = SoftCriteria {
		target_price: Some(10_000_000),
		target_rooms: Some(3),
		..SoftCriteria::default()
	};
	let filters = HardFilters::from_lead_signals(Some("Москва".to_string()), None, Some(&criteria));

	assert_eq!(filters.city.as_deref(), Some("Москва"));
	assert_eq!(filters.min_rooms, Some(2));
	assert_eq!(filters.max_rooms, Some(4));
	assert_eq!(filters.min_price, Some(8_000_000));
	assert_eq!(filters.max_price, Some(12_000_000));
}

#[test]
fn hard_filters_floor_rooms_at_one() {
	let criteria = SoftCriteria { target_rooms: Some(1), ..SoftCriteria::default() };
	let filters = HardFilters::from_lead_signals(None, None, Some(&criteria));

	assert_eq!(filters.min_rooms, Some(1));
	assert_eq!(filters.max_rooms, Some(2));
	assert!(filters.min_price.is_none());
}

#[test]
fn city_matching_is_stable_under_normalization() {
	// NormalizeCity is idempotent, so matching normalized forms must agree
	// with matching the raw inputs.
	let pairs = [("спб", "Санкт-Петербург"), ("Питер", "спб"), ("Москва", "Казань")];

	for (a, b) in pairs {
		let raw = city::cities_match(a, b);
		let normalized = city::cities_match(&city::normalize_city(a), &city::normalize_city(b));

		assert_eq!(raw, normalized, "cities_match must agree for ({a}, {b})");
	}

	assert!(city::cities_match("спб", "Санкт-Петербург"));
}

#[test]
fn status_decoding_rejects_prefixed_forms() {
	assert_eq!(PropertyStatus::from_str("NEW").expect("canonical status"), PropertyStatus::New);
	assert!(PropertyStatus::from_str("PROPERTY_STATUS_NEW").is_err());
	assert!(PropertyStatus::from_str("new").is_err());
}

#[test]
fn requirement_aliases_produce_identical_criteria() {
	let canonical: Requirement =
		serde_json::from_value(serde_json::json!({ "price": 8_000_000, "roomNumber": 2 }))
			.expect("canonical requirement must deserialize");
	let aliased: Requirement =
		serde_json::from_value(serde_json::json!({ "preferredPrice": 8_000_000, "rooms": 2 }))
			.expect("aliased requirement must deserialize");

	assert_eq!(canonical.soft_criteria(), aliased.soft_criteria());
}
