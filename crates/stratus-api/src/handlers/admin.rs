//! State inspection and reset, outside any mocked service.
//!
//! Test harnesses call `/mock/reset` between cases and read
//! `/mock/state` (or `/mock/state/{service}`) to assert on stored
//! resources without going through the per-service read paths. These
//! routes skip auth so a harness can reset even when it is exercising
//! authentication failures.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use serde_json::{Map, Value};
use stratus_core::{catalog::TABLES, store::ResourceStore};

use crate::{AppState, error::Error};

pub async fn reset<S>(
  State(state): State<AppState<S>>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state.store.reset().await.map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

/// Every table of every service, grouped by service name.
pub async fn full_state<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut services = Map::new();
  for table in TABLES {
    let rows = state
      .store
      .list(table, None)
      .await
      .map_err(Error::domain)?
      .into_iter()
      .map(Value::Object)
      .collect();
    let service = services
      .entry(table.service.to_owned())
      .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(map) = service {
      map.insert(table.state_key.to_owned(), Value::Array(rows));
    }
  }
  Ok(Json(Value::Object(services)))
}

/// One service's tables. The service name must own at least one table in
/// the catalog; route aliases (`block`, `account`) are not services.
pub async fn service_state<S>(
  State(state): State<AppState<S>>,
  Path(service): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let tables: Vec<_> =
    TABLES.iter().filter(|t| t.service == service).collect();
  if tables.is_empty() {
    return Err(Error::UnknownService);
  }

  let mut body = Map::new();
  for table in tables {
    let rows = state
      .store
      .list(table, None)
      .await
      .map_err(Error::domain)?
      .into_iter()
      .map(Value::Object)
      .collect();
    body.insert(table.state_key.to_owned(), Value::Array(rows));
  }
  Ok(Json(Value::Object(body)))
}
