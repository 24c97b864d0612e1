pub mod city;
pub mod cursor;
pub mod lead;
pub mod property;
pub mod requirement;
pub mod time_serde;

mod error;

pub use self::{
	cursor::{
		DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OrderDirection, Page, PageCursor, PaginationParams,
		normalize_page_size,
	},
	error::Error,
	lead::{Lead, LeadPatch, LeadStatus, NewLead},
	property::{
		HardFilters, MatchWeights, MatchedProperty, NewProperty, Property, PropertyPatch,
		PropertyStatus, PropertyType, SoftCriteria, WeightPreset, preset_by_id,
		preset_for_lead_type, weight_presets,
	},
	requirement::Requirement,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;
