//! DNS service: synthetic zone listings and persisted records.
//!
//! Zones are not stored. The list endpoint fabricates an active zone for
//! whatever domain the caller asks about, so any zone "exists"; only the
//! records under a zone live in the store.

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{Value, json};
use stratus_core::{
  catalog::DOMAIN_RECORDS, document::Document, generate, store::ResourceStore,
};

use crate::{AppState, error::Error, payload};

const NAMESERVERS: [&str; 2] =
  ["ns0.dom.cloud.example", "ns1.dom.cloud.example"];

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/dns-zones", get(list_zones))
    .route(
      "/dns-zones/{dns_zone}/records",
      get(list_records::<S>).patch(patch_records::<S>),
    )
}

#[derive(Deserialize)]
struct ZoneQuery {
  domain:   Option<String>,
  dns_zone: Option<String>,
}

fn zone(domain: &str, subdomain: &str) -> Value {
  json!({
    "domain": domain,
    "subdomain": subdomain,
    "ns": NAMESERVERS,
    "ns_default": NAMESERVERS,
    "ns_master": [],
    "status": "active",
    "project_id": generate::ZERO_UUID,
  })
}

async fn list_zones(Query(query): Query<ZoneQuery>) -> Json<Value> {
  let domain = query.domain.as_deref().filter(|d| !d.is_empty());
  let mut zones = vec![zone(domain.unwrap_or("example.com"), "")];
  // A dns_zone like "sub.example.com" also surfaces as a subdomain zone.
  if let Some(dns_zone) = query.dns_zone.as_deref() {
    if let Some((subdomain, parent)) = dns_zone.split_once('.') {
      zones.push(zone(parent, subdomain));
    }
  }
  payload::list_values("dns_zones", zones)
}

async fn list_records<S>(
  State(state): State<AppState<S>>,
  Path(dns_zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let records = state
    .store
    .list(&DOMAIN_RECORDS, Some(("dns_zone", &dns_zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("records", records))
}

/// Applies a batch of record changes and answers with the zone's full
/// record set afterwards.
async fn patch_records<S>(
  State(state): State<AppState<S>>,
  Path(dns_zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let changes = decoded
    .get("changes")
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default();

  for change in changes {
    let Value::Object(change) = change else {
      continue;
    };
    if let Some(add) = change.get("add").and_then(Value::as_object) {
      let records = add
        .get("records")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
      for record in records {
        let Value::Object(mut record) = record else {
          continue;
        };
        record.insert("dns_zone".to_owned(), Value::String(dns_zone.clone()));
        record.insert("id".to_owned(), Value::String(generate::new_id()));
        state
          .store
          .insert(&DOMAIN_RECORDS, record)
          .await
          .map_err(Error::create)?;
      }
    }
    if let Some(del) = change.get("delete").and_then(Value::as_object) {
      if let Some(id) = del.get("id").and_then(Value::as_str) {
        if !id.is_empty() {
          // Deleting an already-gone record is not an error here.
          let _ = state.store.delete(&DOMAIN_RECORDS, &[id]).await;
        }
      }
    }
  }

  let records: Vec<Document> = state
    .store
    .list(&DOMAIN_RECORDS, Some(("dns_zone", &dns_zone)))
    .await
    .map_err(Error::domain)?;
  Ok(Json(json!({ "records": records })))
}
