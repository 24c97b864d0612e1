#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Not found: {0}")]
	NotFound(String),
}
impl From<leadex_domain::Error> for Error {
	fn from(err: leadex_domain::Error) -> Self {
		Self::InvalidArgument(err.to_string())
	}
}
