//! Container registry service: namespaces with a synthesized pull
//! endpoint.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::REGISTRY_NAMESPACES, generate, store::ResourceStore,
};

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
    .route(
      "/namespaces",
      post(create_namespace::<S>).get(list_namespaces::<S>),
    )
    .route(
      "/namespaces/{namespace_id}",
      get(get_namespace::<S>)
        .patch(update_namespace::<S>)
        .delete(delete_namespace::<S>),
    )
}

async fn create_namespace<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  let name = doc
    .get("name")
    .and_then(Value::as_str)
    .unwrap_or_default()
    .to_owned();
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  doc.insert("region".to_owned(), Value::String(region.clone()));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert(
    "endpoint".to_owned(),
    Value::String(format!("rg.{region}.cloud.example/{name}")),
  );
  doc.insert("image_count".to_owned(), json!(0));
  doc.insert("size".to_owned(), json!(0));
  doc.insert("is_public".to_owned(), Value::Bool(false));
  doc.insert("organization_id".to_owned(), json!(generate::ZERO_UUID));
  doc.insert("project_id".to_owned(), json!(generate::ZERO_UUID));
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  state
    .store
    .insert(&REGISTRY_NAMESPACES, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_namespaces<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&REGISTRY_NAMESPACES, Some(("region", &region)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("namespaces", items))
}

async fn get_namespace<S>(
  State(state): State<AppState<S>>,
  Path((_region, namespace_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc =
    fetch(state.store.as_ref(), &REGISTRY_NAMESPACES, &[&namespace_id])
      .await?;
  Ok(payload::bare(doc))
}

async fn update_namespace<S>(
  State(state): State<AppState<S>>,
  Path((_region, namespace_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc = merge_update(
    state.store.as_ref(),
    &REGISTRY_NAMESPACES,
    &[&namespace_id],
    patch,
    true,
  )
  .await?;
  Ok(payload::bare(doc))
}

async fn delete_namespace<S>(
  State(state): State<AppState<S>>,
  Path((_region, namespace_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&REGISTRY_NAMESPACES, &[&namespace_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
