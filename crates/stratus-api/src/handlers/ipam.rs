//! IPAM service: a read-only projection of private-NIC addresses.
//!
//! Providers resolve NIC `private_ips` through IPAM queries instead of
//! reading the NIC, so this answers those queries from the stored NIC
//! document. Everything else, including a vanished NIC, is an empty
//! list rather than an error.

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use stratus_core::{catalog::PRIVATE_NICS, store::ResourceStore};

use crate::{AppState, error::Error, payload};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new().route("/ips", get(list_ips::<S>))
}

#[derive(Deserialize)]
struct IpQuery {
  resource_id:   Option<String>,
  resource_type: Option<String>,
}

async fn list_ips<S>(
  State(state): State<AppState<S>>,
  Path(_region): Path<String>,
  Query(query): Query<IpQuery>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let resource_id = query.resource_id.as_deref().unwrap_or_default();
  let resource_type = query.resource_type.as_deref().unwrap_or_default();
  if resource_type != "instance_private_nic" || resource_id.is_empty() {
    return Ok(payload::list_values("ips", Vec::new()));
  }

  let nic = state
    .store
    .get(&PRIVATE_NICS, &[resource_id])
    .await
    .map_err(Error::domain)?;
  let Some(nic) = nic else {
    return Ok(payload::list_values("ips", Vec::new()));
  };

  let private_ips = nic
    .get("private_ips")
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default();
  let ips: Vec<Value> = private_ips
    .iter()
    .filter_map(Value::as_object)
    .map(|ip| {
      json!({
        "id": ip.get("id").cloned().unwrap_or(Value::Null),
        "address": ip.get("address").and_then(Value::as_str).unwrap_or(""),
        "resource": { "id": resource_id, "type": resource_type },
      })
    })
    .collect();
  Ok(payload::list_values("ips", ips))
}
