//! Managed database service: instances, databases, users, privileges,
//! ACLs, settings, and a mock TLS certificate.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post, put},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{
    PRIVATE_NETWORKS, RDB_DATABASES, RDB_INSTANCES, RDB_PRIVILEGES, RDB_USERS,
  },
  document::{self, Document},
  generate,
  store::ResourceStore,
};

use crate::{
  AppState,
  error::Error,
  handlers::{fetch, merge_update},
  payload,
};

/// Static PEM blob served for every instance; providers store it opaquely.
const MOCK_CERTIFICATE: &str = "-----BEGIN CERTIFICATE-----\n\
MIIBszCCAVmgAwIBAgIUTW9jayBSREIgQ2VydGlmaWNhdGUwCgYIKoZIzj0EAwIw\n\
JDEiMCAGA1UEAwwZbW9jay1yZGItaW5zdGFuY2UuaW50ZXJuYWwwHhcNMjQwMTAx\n\
MDAwMDAwWhcNMzQwMTAxMDAwMDAwWjAkMSIwIAYDVQQDDBltb2NrLXJkYi1pbnN0\n\
YW5jZS5pbnRlcm5hbDBZMBMGByqGSM49AgEGCCqGSM49AwEHA0IABG1vY2tleWJ5\n\
dGVzbW9ja2tleWJ5dGVzbW9ja2tleWJ5dGVzbW9ja2tleWJ5dGVzbW9ja2tleWJ5\n\
dGVzbW9jamNDAKBggqhkjOPQQDAgNIADBFAiEAbW9jay1zaWduYXR1cmUtYnl0\n\
ZXMtbm90LXJlYWwCIG1vY2stc2lnbmF0dXJlLWJ5dGVzLW5vdC1yZWFs\n\
-----END CERTIFICATE-----\n";

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route(
      "/instances",
      post(create_instance::<S>).get(list_instances::<S>),
    )
    .route(
      "/instances/{instance_id}",
      get(get_instance::<S>)
        .patch(update_instance::<S>)
        .delete(delete_instance::<S>),
    )
    .route("/instances/{instance_id}/certificate", get(get_certificate::<S>))
    .route(
      "/instances/{instance_id}/databases",
      post(create_database::<S>).get(list_databases::<S>),
    )
    .route(
      "/instances/{instance_id}/databases/{name}",
      axum::routing::delete(delete_database::<S>),
    )
    .route(
      "/instances/{instance_id}/users",
      post(create_user::<S>).get(list_users::<S>),
    )
    .route(
      "/instances/{instance_id}/users/{name}",
      axum::routing::delete(delete_user::<S>),
    )
    .route(
      "/instances/{instance_id}/privileges",
      get(list_privileges::<S>).put(set_privileges::<S>),
    )
    .route(
      "/instances/{instance_id}/acls",
      get(list_acls::<S>).put(set_acls::<S>),
    )
    .route("/instances/{instance_id}/settings", put(set_settings::<S>))
}

// ─── Endpoint synthesis ──────────────────────────────────────────────────────

fn port_for_engine(engine: Option<&Value>) -> u16 {
  let engine = engine.and_then(Value::as_str).unwrap_or_default();
  if engine.to_lowercase().contains("mysql") { 3306 } else { 5432 }
}

/// Turn a caller's `init_endpoints` into concrete endpoint objects.
///
/// An absent or empty list means a public endpoint. A non-empty list must
/// lead with a private-network entry naming the network id; anything else
/// is rejected rather than silently downgraded to public.
fn endpoints_from_init(init: &Value, port: u16) -> Result<Vec<Value>, Error> {
  let entries = match init.as_array() {
    Some(entries) if !entries.is_empty() => entries,
    _ => {
      return Ok(vec![json!({ "ip": generate::public_ip(), "port": port })]);
    }
  };
  let entry = entries[0]
    .as_object()
    .ok_or_else(|| Error::Invalid("invalid init_endpoints".to_owned()))?;
  let pn = entry
    .get("private_network")
    .and_then(Value::as_object)
    .ok_or_else(|| Error::Invalid("invalid init_endpoints".to_owned()))?;
  let pn_id = document::non_blank_str(pn, "id")
    .or_else(|| document::non_blank_str(pn, "private_network_id"))
    .ok_or_else(|| Error::Invalid("invalid init_endpoints".to_owned()))?;
  Ok(vec![json!({
    "ip": generate::private_ip(),
    "port": port,
    "private_network": { "id": pn_id },
  })])
}

// ─── Instances ───────────────────────────────────────────────────────────────

async fn create_instance<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;

  if let Some(init) = doc.remove("init_endpoints") {
    let port = port_for_engine(doc.get("engine"));
    let endpoints = endpoints_from_init(&init, port)?;
    let pn_id = endpoints
      .first()
      .and_then(|endpoint| endpoint.get("private_network"))
      .and_then(|pn| pn.get("id"))
      .and_then(Value::as_str)
      .map(str::to_owned);
    if let Some(pn_id) = pn_id {
      let exists = state
        .store
        .get(&PRIVATE_NETWORKS, &[&pn_id])
        .await
        .map_err(Error::domain)?
        .is_some();
      if !exists {
        return Err(Error::ReferenceNotFound);
      }
    }
    doc.insert("endpoints".to_owned(), Value::Array(endpoints));
  }

  doc.insert("region".to_owned(), Value::String(region));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("created_at".to_owned(), Value::String(generate::now_stamp()));

  let port = port_for_engine(doc.get("engine"));
  for (key, default) in [
    (
      "endpoints",
      json!([{ "ip": generate::public_ip(), "port": port }]),
    ),
    ("volume", json!({ "type": "lssd", "size": 10000000000u64 })),
    (
      "backup_schedule",
      json!({ "disabled": false, "frequency": 24, "retention": 7 }),
    ),
    ("backup_same_region", json!(false)),
    ("encryption", json!({ "enabled": false })),
    ("settings", json!([])),
    ("init_settings", json!([])),
    (
      "logs_policy",
      json!({ "max_age_retention": 30, "total_disk_retention": null }),
    ),
    ("tags", json!([])),
    ("upgradable_version", json!([])),
    ("organization_id", json!(generate::ZERO_UUID)),
    ("project_id", json!(generate::ZERO_UUID)),
    ("read_replicas", json!([])),
    ("maintenances", json!([])),
  ] {
    doc.entry(key).or_insert(default);
  }

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&RDB_INSTANCES, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_instances<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&RDB_INSTANCES, Some(("region", &region)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("instances", items))
}

async fn get_instance<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &RDB_INSTANCES, &[&instance_id]).await?;
  Ok(payload::bare(doc))
}

async fn update_instance<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc = merge_update(
    state.store.as_ref(),
    &RDB_INSTANCES,
    &[&instance_id],
    patch,
    true,
  )
  .await?;
  Ok(payload::bare(doc))
}

/// Databases, users, and privileges all block the delete until removed.
async fn delete_instance<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&RDB_INSTANCES, &[&instance_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

async fn get_certificate<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &RDB_INSTANCES, &[&instance_id]).await?;
  Ok(Json(json!({
    "certificate": {
      "name": "certificate",
      "content_type": "application/octet-stream",
      "content": MOCK_CERTIFICATE,
    }
  })))
}

// ─── Databases and users ─────────────────────────────────────────────────────

async fn create_database<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let name = doc
    .get("name")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_owned();
  doc.insert("instance_id".to_owned(), Value::String(instance_id));
  doc.insert("name".to_owned(), Value::String(name));
  state
    .store
    .insert(&RDB_DATABASES, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_databases<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&RDB_DATABASES, Some(("instance_id", &instance_id)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("databases", items))
}

async fn delete_database<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id, name)): Path<(String, String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&RDB_DATABASES, &[&instance_id, &name])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

async fn create_user<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let name = doc
    .get("name")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_owned();
  doc.insert("instance_id".to_owned(), Value::String(instance_id));
  doc.insert("name".to_owned(), Value::String(name));
  state
    .store
    .insert(&RDB_USERS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_users<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&RDB_USERS, Some(("instance_id", &instance_id)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("users", items))
}

async fn delete_user<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id, name)): Path<(String, String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&RDB_USERS, &[&instance_id, &name])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Privileges ──────────────────────────────────────────────────────────────

async fn list_privileges<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&RDB_PRIVILEGES, Some(("instance_id", &instance_id)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("privileges", items))
}

/// PUT replaces the whole privilege set for the instance.
async fn set_privileges<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let entries = decoded
    .get("privileges")
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default();

  state
    .store
    .delete_matching(&RDB_PRIVILEGES, "instance_id", &instance_id)
    .await
    .map_err(Error::domain)?;

  let mut stored = Vec::with_capacity(entries.len());
  for entry in entries {
    let Value::Object(mut privilege) = entry else {
      continue;
    };
    let user_name = privilege
      .get("user_name")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned();
    let database_name = privilege
      .get("database_name")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned();
    privilege
      .insert("instance_id".to_owned(), Value::String(instance_id.clone()));
    privilege.insert("user_name".to_owned(), Value::String(user_name));
    privilege
      .insert("database_name".to_owned(), Value::String(database_name));
    state
      .store
      .insert(&RDB_PRIVILEGES, privilege.clone())
      .await
      .map_err(Error::create)?;
    stored.push(privilege);
  }
  Ok(payload::list("privileges", stored))
}

// ─── ACLs and settings ───────────────────────────────────────────────────────

async fn list_acls<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &RDB_INSTANCES, &[&instance_id]).await?;
  let rules = doc
    .get("acl_rules")
    .and_then(Value::as_array)
    .cloned()
    .unwrap_or_default();
  Ok(payload::list_values("rules", rules))
}

async fn set_acls<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let rules = decoded.get("rules").cloned().unwrap_or_else(|| json!([]));
  let mut patch = Document::new();
  patch.insert("acl_rules".to_owned(), rules.clone());
  merge_update(
    state.store.as_ref(),
    &RDB_INSTANCES,
    &[&instance_id],
    patch,
    true,
  )
  .await?;
  Ok(Json(json!({ "rules": rules })))
}

async fn set_settings<S>(
  State(state): State<AppState<S>>,
  Path((_region, instance_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let settings =
    decoded.get("settings").cloned().unwrap_or_else(|| json!([]));
  let mut patch = Document::new();
  patch.insert("settings".to_owned(), settings.clone());
  merge_update(
    state.store.as_ref(),
    &RDB_INSTANCES,
    &[&instance_id],
    patch,
    true,
  )
  .await?;
  Ok(Json(json!({ "settings": settings })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn engine_picks_the_port() {
    assert_eq!(port_for_engine(Some(&json!("PostgreSQL-15"))), 5432);
    assert_eq!(port_for_engine(Some(&json!("MySQL-8"))), 3306);
    assert_eq!(port_for_engine(Some(&json!("mysql"))), 3306);
    assert_eq!(port_for_engine(None), 5432);
  }

  #[test]
  fn absent_init_endpoints_produce_a_public_endpoint() {
    for init in [Value::Null, json!([]), json!("bogus")] {
      let endpoints = endpoints_from_init(&init, 5432).unwrap();
      assert_eq!(endpoints.len(), 1);
      assert_eq!(endpoints[0]["port"], 5432);
      assert!(endpoints[0]["ip"].as_str().unwrap().starts_with("198.18."));
      assert!(endpoints[0].get("private_network").is_none());
    }
  }

  #[test]
  fn private_network_init_endpoint_keeps_the_network_id() {
    let init = json!([{ "private_network": { "id": "pn-123" } }]);
    let endpoints = endpoints_from_init(&init, 3306).unwrap();
    assert_eq!(endpoints[0]["private_network"]["id"], "pn-123");
    assert_eq!(endpoints[0]["port"], 3306);
    assert!(endpoints[0]["ip"].as_str().unwrap().starts_with("10."));
  }

  #[test]
  fn long_form_private_network_key_is_accepted() {
    let init = json!([{ "private_network": { "private_network_id": "pn-9" } }]);
    let endpoints = endpoints_from_init(&init, 5432).unwrap();
    assert_eq!(endpoints[0]["private_network"]["id"], "pn-9");
  }

  #[test]
  fn malformed_init_endpoints_are_rejected() {
    for init in [
      json!(["not-a-map"]),
      json!([{ "no_private_network": true }]),
      json!([{ "private_network": {} }]),
      json!([{ "private_network": { "id": "  " } }]),
    ] {
      assert!(endpoints_from_init(&init, 5432).is_err());
    }
  }
}
