//! VPC service: VPCs and the private networks inside them.
//!
//! Mounted twice, once per API generation prefix, since providers moved
//! from v1 to v2 without changing any of the payloads this mock cares
//! about. Private networks answer with fully-formed subnet objects even
//! when the caller only supplied a CIDR string.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{PRIVATE_NETWORKS, VPCS},
  generate,
  store::ResourceStore,
};

use crate::{AppState, error::Error, handlers::fetch, payload};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/vpcs", post(create_vpc::<S>).get(list_vpcs::<S>))
    .route("/vpcs/{vpc_id}", get(get_vpc::<S>).delete(delete_vpc::<S>))
    .route(
      "/private-networks",
      post(create_private_network::<S>).get(list_private_networks::<S>),
    )
    .route(
      "/private-networks/{pn_id}",
      get(get_private_network::<S>).delete(delete_private_network::<S>),
    )
}

// ─── VPCs ────────────────────────────────────────────────────────────────────

async fn create_vpc<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));
  doc.insert("region".to_owned(), Value::String(region));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&VPCS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_vpcs<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&VPCS, Some(("region", &region)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("vpcs", items))
}

async fn get_vpc<S>(
  State(state): State<AppState<S>>,
  Path((_region, vpc_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &VPCS, &[&vpc_id]).await?;
  Ok(payload::bare(doc))
}

async fn delete_vpc<S>(
  State(state): State<AppState<S>>,
  Path((_region, vpc_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&VPCS, &[&vpc_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Private networks ────────────────────────────────────────────────────────

async fn create_private_network<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now.clone()));
  doc.insert("region".to_owned(), Value::String(region));

  // Callers hand the subnet over in one of two shapes (an ipv4_subnet
  // object or a bare CIDR list); the stored form is always a list of
  // subnet objects.
  let mut subnet = "172.16.0.0/22".to_owned();
  if let Some(Value::Object(v4)) = doc.get("ipv4_subnet") {
    if let Some(Value::String(cidr)) = v4.get("subnet") {
      subnet = cidr.clone();
    }
  } else if let Some(Value::Array(existing)) = doc.get("subnets") {
    if let Some(Value::String(cidr)) = existing.first() {
      subnet = cidr.clone();
    }
  }
  doc.insert(
    "subnets".to_owned(),
    json!([{
      "id": generate::new_id(),
      "subnet": subnet,
      "created_at": now.clone(),
      "updated_at": now,
    }]),
  );

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&PRIVATE_NETWORKS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_private_networks<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&PRIVATE_NETWORKS, Some(("region", &region)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("private_networks", items))
}

async fn get_private_network<S>(
  State(state): State<AppState<S>>,
  Path((_region, pn_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &PRIVATE_NETWORKS, &[&pn_id]).await?;
  Ok(payload::bare(doc))
}

async fn delete_private_network<S>(
  State(state): State<AppState<S>>,
  Path((_region, pn_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&PRIVATE_NETWORKS, &[&pn_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
