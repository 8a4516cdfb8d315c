//! Error types for the HTTP layer.
//!
//! Every error renders as a `{"message": …, "type": …}` JSON body, the
//! shape provider SDKs parse. Store errors are folded in through
//! [`Error::domain`] and [`Error::create`]: the two differ only in how a
//! conflict reads, because a duplicate key on insert and a blocked delete
//! both surface as [`stratus_core::Error::Conflict`].

use axum::{
  Json,
  http::{Method, StatusCode},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The request carried no `X-Auth-Token` header (or an empty one).
  #[error("missing or empty X-Auth-Token")]
  Unauthorized,

  /// The request body was not a JSON object.
  #[error("invalid json")]
  InvalidJson,

  /// The body parsed, but the operation cannot accept it.
  #[error("{0}")]
  Invalid(String),

  #[error("resource not found")]
  NotFound,

  /// A document named a parent resource that does not exist.
  #[error("referenced resource not found")]
  ReferenceNotFound,

  /// `/mock/state/{service}` for a service with no tables.
  #[error("unknown service")]
  UnknownService,

  #[error("resource already exists")]
  AlreadyExists,

  #[error("cannot delete: dependents exist")]
  DeleteConflict,

  /// Catch-all for routes the real APIs expose but this server does not
  /// implement. The message names the method and path so provider logs
  /// show exactly what was missed.
  #[error("not implemented: {method} {path}")]
  NotImplemented { method: Method, path: String },

  /// The storage backend failed; details go to the log, not the client.
  #[error("internal server error")]
  Internal(#[source] stratus_core::Error),
}

impl Error {
  /// Map a store error on a read, update, or delete path. A conflict here
  /// means a delete was blocked by dependents.
  pub fn domain(err: stratus_core::Error) -> Self {
    match err {
      stratus_core::Error::NotFound => Error::NotFound,
      stratus_core::Error::ReferenceNotFound(_) => Error::ReferenceNotFound,
      stratus_core::Error::Conflict(_) => Error::DeleteConflict,
      stratus_core::Error::Invalid(msg) => Error::Invalid(msg),
      other => Error::Internal(other),
    }
  }

  /// Map a store error on an insert path. A conflict here means the key
  /// is already taken.
  pub fn create(err: stratus_core::Error) -> Self {
    match err {
      stratus_core::Error::NotFound
      | stratus_core::Error::ReferenceNotFound(_) => Error::ReferenceNotFound,
      stratus_core::Error::Conflict(_) => Error::AlreadyExists,
      stratus_core::Error::Invalid(msg) => Error::Invalid(msg),
      other => Error::Internal(other),
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    if let Error::Internal(ref source) = self {
      tracing::error!(error = %source, "request failed on a storage error");
    }

    let (status, kind) = match &self {
      Error::Unauthorized => {
        (StatusCode::UNAUTHORIZED, "denied_authentication")
      }
      Error::InvalidJson | Error::Invalid(_) => {
        (StatusCode::BAD_REQUEST, "invalid_argument")
      }
      Error::NotFound | Error::ReferenceNotFound | Error::UnknownService => {
        (StatusCode::NOT_FOUND, "not_found")
      }
      Error::AlreadyExists | Error::DeleteConflict => {
        (StatusCode::CONFLICT, "conflict")
      }
      Error::NotImplemented { .. } => {
        (StatusCode::NOT_IMPLEMENTED, "not_implemented")
      }
      Error::Internal(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
      }
    };

    let body = Json(json!({ "message": self.to_string(), "type": kind }));
    (status, body).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn create_conflicts_read_as_already_exists() {
    let err = Error::create(stratus_core::Error::Conflict("servers"));
    assert_eq!(err.to_string(), "resource already exists");
  }

  #[test]
  fn domain_conflicts_read_as_blocked_delete() {
    let err = Error::domain(stratus_core::Error::Conflict("vpcs"));
    assert_eq!(err.to_string(), "cannot delete: dependents exist");
  }

  #[test]
  fn reference_errors_lose_the_table_name() {
    let err = Error::create(stratus_core::Error::ReferenceNotFound("vpcs"));
    assert_eq!(err.to_string(), "referenced resource not found");
  }
}
