#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid lead status: {0}")]
	InvalidLeadStatus(String),
	#[error("Invalid property status: {0}")]
	InvalidPropertyStatus(String),
	#[error("Invalid property type: {0}")]
	InvalidPropertyType(String),
	#[error("Invalid page cursor: {0}")]
	InvalidCursor(String),
}
