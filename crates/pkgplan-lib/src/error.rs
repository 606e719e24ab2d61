//! Library error type.

pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
	#[error("reqwest error: {0}")]
	Reqwest(#[from] reqwest::Error),
	#[error("IO error: {0}")]
	IO(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	SerdeJSON(#[from] serde_json::Error),
	#[error("worker task failed: {0}")]
	Join(#[from] tokio::task::JoinError),
	#[error("parsing error: {0}")]
	Parse(String),
	#[error("registry error: {0}")]
	Registry(String),
	/// The registry refused a search because it would match too many packages.
	#[error("registry query matches too many packages")]
	QueryTooBroad,
	#[error("repository oracle error: {0}")]
	Oracle(String),
	/// Nothing in the repositories or the registry can satisfy `name`.
	#[error("`{name}` could not be found, required by {}", required_by.join(", "))]
	Unresolvable {
		name: String,
		required_by: Vec<String>,
	},
	#[error("operation cancelled")]
	Cancelled,
}

impl Error {
	/// Errors which the planner can work around by falling back to locally known data.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Error::Reqwest(_) | Error::Registry(_) | Error::QueryTooBroad | Error::SerdeJSON(_) | Error::Join(_))
	}
}
