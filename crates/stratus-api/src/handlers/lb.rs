//! Load balancer service: LBs, flexible LB IPs, frontends, backends, and
//! private-network attachments.
//!
//! Frontend, backend, and attachment responses embed the owning LB
//! object (and the frontend's backend reference) because provider SDKs
//! dereference them without nil checks. The embeds are computed on every
//! response from the current parent rows, never stored, so they cannot
//! go stale when the LB is renamed between calls.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, post},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{LB_BACKENDS, LB_FRONTENDS, LB_IPS, LB_PRIVATE_NETWORKS, LBS},
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

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/lbs", post(create_lb::<S>).get(list_lbs::<S>))
    .route(
      "/lbs/{lb_id}",
      get(get_lb::<S>).patch(update_lb::<S>).delete(delete_lb::<S>),
    )
    .route(
      "/lbs/{lb_id}/frontends",
      post(create_lb_frontend::<S>).get(list_lb_frontends::<S>),
    )
    .route(
      "/lbs/{lb_id}/backends",
      post(create_lb_backend::<S>).get(list_lb_backends::<S>),
    )
    .route(
      "/lbs/{lb_id}/private-networks",
      post(attach_private_network::<S>).get(list_attachments::<S>),
    )
    .route(
      "/lbs/{lb_id}/private-networks/{pn_id}",
      axum::routing::delete(detach_private_network::<S>),
    )
    // Alternate attach spelling used by older SDK generations.
    .route(
      "/lbs/{lb_id}/attach-private-network",
      post(attach_private_network::<S>),
    )
    .route(
      "/frontends",
      post(create_frontend::<S>).get(list_frontends::<S>),
    )
    .route(
      "/frontends/{frontend_id}",
      get(get_frontend::<S>)
        .put(update_frontend::<S>)
        .delete(delete_frontend::<S>),
    )
    .route("/frontends/{frontend_id}/acls", get(list_frontend_acls::<S>))
    .route("/backends", post(create_backend::<S>).get(list_backends::<S>))
    .route(
      "/backends/{backend_id}",
      get(get_backend::<S>)
        .put(update_backend::<S>)
        .delete(delete_backend::<S>),
    )
    .route("/ips", post(create_lb_ip::<S>).get(list_lb_ips::<S>))
    .route(
      "/ips/{ip_id}",
      get(get_lb_ip::<S>).delete(delete_lb_ip::<S>),
    )
}

// ─── Embeds ──────────────────────────────────────────────────────────────────

/// Add the owning LB object under `lb`, when the document names one that
/// still exists.
async fn embed_lb<S: ResourceStore>(
  store: &S,
  doc: &mut Document,
) -> Result<(), Error> {
  let Some(lb_id) = document::non_blank_str(doc, "lb_id").map(str::to_owned)
  else {
    return Ok(());
  };
  let lb = store.get(&LBS, &[&lb_id]).await.map_err(Error::domain)?;
  if let Some(lb) = lb {
    doc.insert("lb".to_owned(), Value::Object(lb));
  }
  Ok(())
}

/// Frontends also carry a thin `backend` object mirroring `backend_id`.
fn embed_backend_ref(doc: &mut Document) {
  if let Some(backend_id) =
    document::non_blank_str(doc, "backend_id").map(str::to_owned)
  {
    doc.insert("backend".to_owned(), json!({"id": backend_id}));
  }
}

/// Drop any embeds a caller echoed back; only the flat ids persist.
fn strip_embeds(doc: &mut Document) {
  doc.remove("lb");
  doc.remove("backend");
}

// ─── LBs ─────────────────────────────────────────────────────────────────────

async fn create_lb<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("zone".to_owned(), Value::String(zone.clone()));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("created_at".to_owned(), Value::String(generate::now_stamp()));
  let id = generate::new_id();
  doc.insert("id".to_owned(), Value::String(id.clone()));
  // Each LB carries one generated flexible IP of its own.
  doc.insert(
    "ip".to_owned(),
    json!([{
      "id": generate::new_id(),
      "ip_address": generate::public_ip(),
      "lb_id": id,
      "reverse": "",
      "organization_id": generate::ZERO_UUID,
      "project_id": generate::ZERO_UUID,
      "zone": zone,
      "region": generate::region_of(&zone),
    }]),
  );
  state
    .store
    .insert(&LBS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_lbs<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LBS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("lbs", items))
}

async fn get_lb<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &LBS, &[&lb_id]).await?;
  Ok(payload::bare(doc))
}

async fn update_lb<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc =
    merge_update(state.store.as_ref(), &LBS, &[&lb_id], patch, false).await?;
  Ok(payload::bare(doc))
}

/// Frontends and backends block the delete (the provider removes them
/// explicitly); private-network attachments go down with the LB.
async fn delete_lb<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&LBS, &[&lb_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Frontends ───────────────────────────────────────────────────────────────

async fn create_frontend_doc<S: ResourceStore>(
  store: &S,
  mut doc: Document,
) -> Result<Document, Error> {
  strip_embeds(&mut doc);
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  store
    .insert(&LB_FRONTENDS, doc.clone())
    .await
    .map_err(Error::create)?;
  embed_lb(store, &mut doc).await?;
  embed_backend_ref(&mut doc);
  Ok(doc)
}

async fn create_frontend<S>(
  State(state): State<AppState<S>>,
  Path(_zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = payload::decode(&body)?;
  let doc = create_frontend_doc(state.store.as_ref(), doc).await?;
  Ok(payload::bare(doc))
}

/// Nested create; the URL wins over any `lb_id` in the body.
async fn create_lb_frontend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("lb_id".to_owned(), Value::String(lb_id));
  let doc = create_frontend_doc(state.store.as_ref(), doc).await?;
  Ok(payload::bare(doc))
}

async fn enrich_frontends<S: ResourceStore>(
  store: &S,
  items: Vec<Document>,
) -> Result<Vec<Document>, Error> {
  let mut out = Vec::with_capacity(items.len());
  for mut doc in items {
    embed_lb(store, &mut doc).await?;
    embed_backend_ref(&mut doc);
    out.push(doc);
  }
  Ok(out)
}

async fn list_frontends<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_FRONTENDS, None)
    .await
    .map_err(Error::domain)?;
  let items = enrich_frontends(state.store.as_ref(), items).await?;
  Ok(payload::list("frontends", items))
}

async fn list_lb_frontends<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_FRONTENDS, Some(("lb_id", &lb_id)))
    .await
    .map_err(Error::domain)?;
  let items = enrich_frontends(state.store.as_ref(), items).await?;
  Ok(payload::list("frontends", items))
}

async fn get_frontend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, frontend_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc =
    fetch(state.store.as_ref(), &LB_FRONTENDS, &[&frontend_id]).await?;
  embed_lb(state.store.as_ref(), &mut doc).await?;
  embed_backend_ref(&mut doc);
  Ok(payload::bare(doc))
}

async fn update_frontend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, frontend_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut patch = payload::decode(&body)?;
  strip_embeds(&mut patch);
  let mut doc = merge_update(
    state.store.as_ref(),
    &LB_FRONTENDS,
    &[&frontend_id],
    patch,
    false,
  )
  .await?;
  embed_lb(state.store.as_ref(), &mut doc).await?;
  embed_backend_ref(&mut doc);
  Ok(payload::bare(doc))
}

async fn delete_frontend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, frontend_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&LB_FRONTENDS, &[&frontend_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

/// ACLs are not modelled; providers only ever poll this list to confirm
/// emptiness after a create.
async fn list_frontend_acls<S>(
  State(state): State<AppState<S>>,
  Path((_zone, frontend_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &LB_FRONTENDS, &[&frontend_id]).await?;
  Ok(payload::list_values("acls", Vec::new()))
}

// ─── Backends ────────────────────────────────────────────────────────────────

async fn create_backend_doc<S: ResourceStore>(
  store: &S,
  mut doc: Document,
) -> Result<Document, Error> {
  strip_embeds(&mut doc);
  let now = generate::now_stamp();
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  for (key, default) in [
    ("timeout_server", "5m"),
    ("timeout_connect", "5s"),
    ("timeout_tunnel", "15m"),
    ("timeout_queue", "0s"),
    ("on_marked_down_action", "none"),
  ] {
    doc
      .entry(key)
      .or_insert_with(|| Value::String(default.to_owned()));
  }
  if !doc.contains_key("health_check") {
    let port = doc.get("forward_port").cloned().unwrap_or(Value::Null);
    doc.insert(
      "health_check".to_owned(),
      json!({
        "port": port,
        "check_delay": "60s",
        "check_timeout": "30s",
        "check_max_retries": 3,
        "transient_check_delay": "0.5s",
        "tcp_config": {},
      }),
    );
  }

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  store
    .insert(&LB_BACKENDS, doc.clone())
    .await
    .map_err(Error::create)?;
  embed_lb(store, &mut doc).await?;
  Ok(doc)
}

async fn create_backend<S>(
  State(state): State<AppState<S>>,
  Path(_zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = payload::decode(&body)?;
  let doc = create_backend_doc(state.store.as_ref(), doc).await?;
  Ok(payload::bare(doc))
}

async fn create_lb_backend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("lb_id".to_owned(), Value::String(lb_id));
  let doc = create_backend_doc(state.store.as_ref(), doc).await?;
  Ok(payload::bare(doc))
}

async fn enrich_backends<S: ResourceStore>(
  store: &S,
  items: Vec<Document>,
) -> Result<Vec<Document>, Error> {
  let mut out = Vec::with_capacity(items.len());
  for mut doc in items {
    embed_lb(store, &mut doc).await?;
    out.push(doc);
  }
  Ok(out)
}

async fn list_backends<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_BACKENDS, None)
    .await
    .map_err(Error::domain)?;
  let items = enrich_backends(state.store.as_ref(), items).await?;
  Ok(payload::list("backends", items))
}

async fn list_lb_backends<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_BACKENDS, Some(("lb_id", &lb_id)))
    .await
    .map_err(Error::domain)?;
  let items = enrich_backends(state.store.as_ref(), items).await?;
  Ok(payload::list("backends", items))
}

async fn get_backend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, backend_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc =
    fetch(state.store.as_ref(), &LB_BACKENDS, &[&backend_id]).await?;
  embed_lb(state.store.as_ref(), &mut doc).await?;
  Ok(payload::bare(doc))
}

async fn update_backend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, backend_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut patch = payload::decode(&body)?;
  strip_embeds(&mut patch);
  let mut doc = merge_update(
    state.store.as_ref(),
    &LB_BACKENDS,
    &[&backend_id],
    patch,
    false,
  )
  .await?;
  embed_lb(state.store.as_ref(), &mut doc).await?;
  Ok(payload::bare(doc))
}

async fn delete_backend<S>(
  State(state): State<AppState<S>>,
  Path((_zone, backend_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&LB_BACKENDS, &[&backend_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Private-network attachments ─────────────────────────────────────────────

async fn attach_private_network<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let pn_id = document::non_blank_str(&decoded, "private_network_id")
    .unwrap_or_default()
    .to_owned();

  let now = generate::now_stamp();
  let mut doc = Document::new();
  doc.insert("lb_id".to_owned(), Value::String(lb_id));
  doc.insert("private_network_id".to_owned(), Value::String(pn_id));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("ip_address".to_owned(), json!([generate::private_ip()]));
  doc.insert("dhcp_config".to_owned(), json!({}));
  doc.insert("static_config".to_owned(), Value::Null);
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  state
    .store
    .insert(&LB_PRIVATE_NETWORKS, doc.clone())
    .await
    .map_err(Error::create)?;
  embed_lb(state.store.as_ref(), &mut doc).await?;
  Ok(payload::bare(doc))
}

async fn list_attachments<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_PRIVATE_NETWORKS, Some(("lb_id", &lb_id)))
    .await
    .map_err(Error::domain)?;
  let mut out = Vec::with_capacity(items.len());
  for mut doc in items {
    embed_lb(state.store.as_ref(), &mut doc).await?;
    out.push(doc);
  }
  // Historical singular key, kept for SDK compatibility.
  Ok(payload::list("private_network", out))
}

async fn detach_private_network<S>(
  State(state): State<AppState<S>>,
  Path((_zone, lb_id, pn_id)): Path<(String, String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&LB_PRIVATE_NETWORKS, &[&lb_id, &pn_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── LB flexible IPs ─────────────────────────────────────────────────────────

async fn create_lb_ip<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("zone".to_owned(), Value::String(zone.clone()));
  doc.insert("ip_address".to_owned(), Value::String(generate::public_ip()));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("lb_id".to_owned(), Value::Null);
  doc.insert("reverse".to_owned(), Value::String(String::new()));
  doc.insert(
    "organization_id".to_owned(),
    Value::String(generate::ZERO_UUID.to_owned()),
  );
  doc.insert(
    "project_id".to_owned(),
    Value::String(generate::ZERO_UUID.to_owned()),
  );
  doc.insert(
    "region".to_owned(),
    Value::String(generate::region_of(&zone)),
  );
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&LB_IPS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_lb_ips<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&LB_IPS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("ips", items))
}

async fn get_lb_ip<S>(
  State(state): State<AppState<S>>,
  Path((_zone, ip_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &LB_IPS, &[&ip_id]).await?;
  Ok(payload::bare(doc))
}

async fn delete_lb_ip<S>(
  State(state): State<AppState<S>>,
  Path((_zone, ip_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&LB_IPS, &[&ip_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
