//! Managed Redis service: single-node clusters with one generated
//! private endpoint.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{catalog::REDIS_CLUSTERS, generate, store::ResourceStore};

use crate::{
  AppState,
  error::Error,
  handlers::{fetch, merge_update},
  payload,
};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/clusters", post(create_cluster::<S>).get(list_clusters::<S>))
    .route(
      "/clusters/{cluster_id}",
      get(get_cluster::<S>)
        .patch(update_cluster::<S>)
        .delete(delete_cluster::<S>),
    )
}

async fn create_cluster<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  doc.insert("zone".to_owned(), Value::String(zone));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("cluster_size".to_owned(), json!(1));
  doc.insert("tls_enabled".to_owned(), Value::Bool(false));
  doc.insert("organization_id".to_owned(), json!(generate::ZERO_UUID));
  doc.insert("project_id".to_owned(), json!(generate::ZERO_UUID));
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  for (key, default) in [
    ("tags", json!([])),
    ("acl_rules", json!([])),
    (
      "endpoints",
      json!([{
        "id": generate::new_id(),
        "ips": [generate::private_ip()],
        "port": 6379,
      }]),
    ),
    ("public_network", json!([])),
    ("settings", json!({})),
    ("user_name", json!("default")),
  ] {
    doc.entry(key).or_insert(default);
  }

  state
    .store
    .insert(&REDIS_CLUSTERS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_clusters<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&REDIS_CLUSTERS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("clusters", items))
}

async fn get_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_zone, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc =
    fetch(state.store.as_ref(), &REDIS_CLUSTERS, &[&cluster_id]).await?;
  Ok(payload::bare(doc))
}

async fn update_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_zone, cluster_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc = merge_update(
    state.store.as_ref(),
    &REDIS_CLUSTERS,
    &[&cluster_id],
    patch,
    true,
  )
  .await?;
  Ok(payload::bare(doc))
}

async fn delete_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_zone, cluster_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&REDIS_CLUSTERS, &[&cluster_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
