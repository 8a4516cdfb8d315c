//! IAM service: applications, API keys, policies, and SSH keys.
//!
//! API keys are the one table keyed by access key instead of UUID, and
//! the one place a field is write-only: the secret key comes back on
//! create and is withheld from every later read.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{IAM_API_KEYS, IAM_APPLICATIONS, IAM_POLICIES, IAM_SSH_KEYS},
  generate,
  store::ResourceStore,
};

use crate::{AppState, error::Error, handlers::fetch, payload};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route(
      "/applications",
      post(create_application::<S>).get(list_applications::<S>),
    )
    .route(
      "/applications/{application_id}",
      get(get_application::<S>).delete(delete_application::<S>),
    )
    .route("/api-keys", post(create_api_key::<S>).get(list_api_keys::<S>))
    .route(
      "/api-keys/{access_key}",
      get(get_api_key::<S>).delete(delete_api_key::<S>),
    )
    .route("/policies", post(create_policy::<S>).get(list_policies::<S>))
    .route(
      "/policies/{policy_id}",
      get(get_policy::<S>).delete(delete_policy::<S>),
    )
    .route("/rules", get(list_rules))
    .merge(ssh_key_routes::<S>())
}

/// SSH-key routes on their own so the legacy account-service prefix can
/// mount the same handlers.
pub fn ssh_key_routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/ssh-keys", post(create_ssh_key::<S>).get(list_ssh_keys::<S>))
    .route(
      "/ssh-keys/{ssh_key_id}",
      get(get_ssh_key::<S>).delete(delete_ssh_key::<S>),
    )
}

// ─── Applications ────────────────────────────────────────────────────────────

async fn create_application<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&IAM_APPLICATIONS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_applications<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&IAM_APPLICATIONS, None)
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("applications", items))
}

async fn get_application<S>(
  State(state): State<AppState<S>>,
  Path(application_id): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc =
    fetch(state.store.as_ref(), &IAM_APPLICATIONS, &[&application_id])
      .await?;
  Ok(payload::bare(doc))
}

/// Blocked while API keys or policies still reference the application.
async fn delete_application<S>(
  State(state): State<AppState<S>>,
  Path(application_id): Path<String>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&IAM_APPLICATIONS, &[&application_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── API keys ────────────────────────────────────────────────────────────────

async fn create_api_key<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;

  let application_id = doc
    .get("application_id")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .trim()
    .to_owned();
  let user_id = doc
    .get("user_id")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .trim()
    .to_owned();
  if application_id.is_empty() == user_id.is_empty() {
    return Err(Error::Invalid(
      "either application_id or user_id must be provided (mutually \
       exclusive)"
        .to_owned(),
    ));
  }
  if application_id.is_empty() {
    doc.remove("application_id");
  }

  let now = generate::now_stamp();
  doc.insert(
    "access_key".to_owned(),
    Value::String(format!("STR{}", generate::alphanumeric(17))),
  );
  doc.insert("secret_key".to_owned(), Value::String(generate::new_id()));
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  state
    .store
    .insert(&IAM_API_KEYS, doc.clone())
    .await
    .map_err(Error::create)?;
  // The create response is the only one that carries the secret key.
  Ok(payload::bare(doc))
}

async fn list_api_keys<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&IAM_API_KEYS, None)
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("api_keys", items))
}

async fn get_api_key<S>(
  State(state): State<AppState<S>>,
  Path(access_key): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &IAM_API_KEYS, &[&access_key]).await?;
  Ok(payload::bare(doc))
}

async fn delete_api_key<S>(
  State(state): State<AppState<S>>,
  Path(access_key): Path<String>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&IAM_API_KEYS, &[&access_key])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Policies ────────────────────────────────────────────────────────────────

async fn create_policy<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let blank = doc
    .get("application_id")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .trim()
    .is_empty();
  if blank {
    doc.remove("application_id");
  }
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&IAM_POLICIES, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_policies<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&IAM_POLICIES, None)
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("policies", items))
}

async fn get_policy<S>(
  State(state): State<AppState<S>>,
  Path(policy_id): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &IAM_POLICIES, &[&policy_id]).await?;
  Ok(payload::bare(doc))
}

async fn delete_policy<S>(
  State(state): State<AppState<S>>,
  Path(policy_id): Path<String>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&IAM_POLICIES, &[&policy_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

/// Policy rules are not modelled; resource reads poll this and expect an
/// empty set.
async fn list_rules() -> Json<Value> {
  Json(json!({ "rules": [], "total_count": 0 }))
}

// ─── SSH keys ────────────────────────────────────────────────────────────────

async fn create_ssh_key<S>(
  State(state): State<AppState<S>>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));
  doc.insert(
    "fingerprint".to_owned(),
    Value::String(format!("256 SHA256:{}", generate::alphanumeric(32))),
  );
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&IAM_SSH_KEYS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_ssh_keys<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&IAM_SSH_KEYS, None)
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("ssh_keys", items))
}

async fn get_ssh_key<S>(
  State(state): State<AppState<S>>,
  Path(ssh_key_id): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &IAM_SSH_KEYS, &[&ssh_key_id]).await?;
  Ok(payload::bare(doc))
}

async fn delete_ssh_key<S>(
  State(state): State<AppState<S>>,
  Path(ssh_key_id): Path<String>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&IAM_SSH_KEYS, &[&ssh_key_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
