//! Error types for `stratus-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The addressed row does not exist.
  #[error("resource not found")]
  NotFound,

  /// A declared reference named a parent row that does not exist. Carries
  /// the parent table name for logging; the API reports a generic message.
  #[error("referenced resource not found in {0}")]
  ReferenceNotFound(&'static str),

  /// A uniqueness or dependency rule blocked the write. Carries the table
  /// involved for logging.
  #[error("conflicting state in {0}")]
  Conflict(&'static str),

  /// The caller supplied a document the operation cannot accept.
  #[error("{0}")]
  Invalid(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// The storage engine failed in a way the caller cannot act on.
  #[error("storage error: {0}")]
  Storage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
