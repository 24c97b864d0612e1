pub mod db;
pub mod leads;
pub mod models;
pub mod properties;
pub mod schema;
pub mod vector;

mod error;
mod pagination;

pub use error::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;
