use uuid::Uuid;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid argument: {message}")]
	InvalidArgument { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Lead {lead_id} is not indexed yet.")]
	NotIndexed { lead_id: Uuid },
	#[error("Unavailable: {message}")]
	Unavailable { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<leadex_storage::Error> for Error {
	fn from(err: leadex_storage::Error) -> Self {
		match err {
			leadex_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			leadex_storage::Error::InvalidArgument(message) => Self::InvalidArgument { message },
			leadex_storage::Error::NotFound(message) => Self::NotFound { message },
		}
	}
}

impl From<leadex_providers::Error> for Error {
	fn from(err: leadex_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
