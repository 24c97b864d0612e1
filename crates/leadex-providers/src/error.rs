pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Http(#[from] reqwest::Error),
	#[error("Unexpected status {status}: {body_tail}")]
	Status { status: u16, body_tail: String },
	#[error("Invalid response: {message}")]
	InvalidResponse { message: String },
	#[error("Model output is not the expected JSON: {message}")]
	Parse { message: String },
}
