//! Compute instance service: servers, IPs, security groups, private NICs,
//! and the read-only volume views.
//!
//! This is the service with the heaviest response enrichment. Server
//! creation normalizes the polymorphic `security_group` and `image`
//! inputs, resolves flexible IP ids to address objects, and injects a
//! default root volume, because provider SDKs dereference all of these
//! without nil checks.

use axum::{
  Json, Router,
  extract::{Path, State},
  http::StatusCode,
  routing::{get, patch, post, put},
};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{IPS, PRIVATE_NICS, SECURITY_GROUPS, SERVERS},
  document::{self, Document},
  generate,
  store::ResourceStore,
};
use uuid::Uuid;

use crate::{
  AppState,
  error::Error,
  handlers::{fetch, marketplace::local_image_id, merge_update},
  payload,
};

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/products/servers", get(products))
    .route("/servers", post(create_server::<S>).get(list_servers::<S>))
    .route(
      "/servers/{server_id}",
      get(get_server::<S>).delete(delete_server::<S>),
    )
    .route("/servers/{server_id}/action", post(server_action::<S>))
    .route("/servers/{server_id}/user_data", get(list_user_data::<S>))
    .route(
      "/servers/{server_id}/user_data/{key}",
      patch(set_user_data::<S>),
    )
    .route(
      "/servers/{server_id}/private_nics",
      post(create_private_nic::<S>).get(list_private_nics::<S>),
    )
    .route(
      "/servers/{server_id}/private_nics/{nic_id}",
      get(get_private_nic::<S>).delete(delete_private_nic::<S>),
    )
    .route("/ips", post(create_ip::<S>).get(list_ips::<S>))
    .route("/ips/{ip_id}", get(get_ip::<S>).delete(delete_ip::<S>))
    .route(
      "/security_groups",
      post(create_security_group::<S>).get(list_security_groups::<S>),
    )
    .route(
      "/security_groups/{sg_id}",
      get(get_security_group::<S>)
        .patch(update_security_group::<S>)
        .delete(delete_security_group::<S>),
    )
    .route(
      "/security_groups/{sg_id}/rules",
      put(put_security_group_rules::<S>).get(get_security_group_rules::<S>),
    )
    .merge(volume_routes())
}

/// Volume reads live under the instance API and, aliased, under the
/// block-storage API prefix. Same handlers both times.
pub fn volume_routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/volumes/{volume_id}", get(get_volume::<S>).delete(delete_volume))
}

// ─── Products ────────────────────────────────────────────────────────────────

fn product(
  monthly: f64,
  hourly: f64,
  ncpus: u32,
  ram: u64,
  max_volume: u64,
) -> Value {
  json!({
    "monthly_price": monthly,
    "hourly_price": hourly,
    "ncpus": ncpus,
    "ram": ram,
    "arch": "x86_64",
    "volume_type": "l_ssd",
    "default_volume_type": "l_ssd",
    "volumes_constraint": {"min_size": 0, "max_size": max_volume},
    "per_volume_constraint": {
      "l_ssd": {"min_size": 0, "max_size": max_volume},
    },
  })
}

/// Fixed commercial-type table covering everything the development and
/// general-purpose ranges offer.
async fn products() -> Json<Value> {
  Json(json!({
    "servers": {
      "DEV1-S":  product(11.99, 0.018, 2, 2_147_483_648, 20_000_000_000),
      "DEV1-M":  product(23.99, 0.036, 3, 4_294_967_296, 40_000_000_000),
      "DEV1-L":  product(35.99, 0.054, 4, 8_589_934_592, 80_000_000_000),
      "GP1-XS":  product(39.99, 0.06, 4, 8_589_934_592, 150_000_000_000),
      "GP1-S":   product(59.99, 0.09, 8, 17_179_869_184, 300_000_000_000),
      "GP1-M":   product(119.99, 0.18, 16, 34_359_738_368, 600_000_000_000),
      "GP1-L":   product(239.99, 0.36, 32, 68_719_476_736, 600_000_000_000),
      "GP1-XL":  product(479.99, 0.72, 48, 137_438_953_472, 800_000_000_000),
    },
  }))
}

// ─── Input normalization ─────────────────────────────────────────────────────

/// Collapse the polymorphic `security_group` input to one shape: either a
/// `{id, name}` object plus a matching `security_group_id`, or an
/// explicit null with no id at all. The field accepts a bare id string,
/// an object, null, or garbage; a bare `security_group_id` with no
/// `security_group` key is promoted to the object form.
fn normalize_security_group(doc: &mut Document) {
  if let Some(raw) = doc.get("security_group").cloned() {
    let id = match &raw {
      Value::String(s) => s.trim().to_owned(),
      Value::Object(obj) => match obj.get("id") {
        Some(Value::String(s)) => s.trim().to_owned(),
        _ => String::new(),
      },
      _ => String::new(),
    };
    if id.is_empty() {
      doc.insert("security_group".to_owned(), Value::Null);
      doc.remove("security_group_id");
      return;
    }
    let embed = match raw {
      Value::Object(mut obj) => {
        obj.entry("name").or_insert_with(|| Value::String(String::new()));
        Value::Object(obj)
      }
      _ => json!({"id": id, "name": ""}),
    };
    doc.insert("security_group".to_owned(), embed);
    doc.insert("security_group_id".to_owned(), Value::String(id));
    return;
  }

  if let Some(id) = document::non_blank_str(doc, "security_group_id") {
    let id = id.trim().to_owned();
    doc.insert("security_group".to_owned(), json!({"id": id, "name": ""}));
    doc.insert("security_group_id".to_owned(), Value::String(id));
    return;
  }

  doc.insert("security_group".to_owned(), Value::Null);
  doc.remove("security_group_id");
}

/// Expand a string `image` reference into the image object the SDK
/// expects. A marketplace label resolves to the deterministic local
/// image id for this zone; anything already shaped like a UUID is kept.
fn normalize_image(doc: &mut Document, zone: &str) {
  let Some(image_ref) = document::non_blank_str(doc, "image") else {
    return;
  };
  let image_ref = image_ref.trim().to_owned();

  let image_id = if Uuid::parse_str(&image_ref).is_ok() {
    image_ref.clone()
  } else {
    local_image_id(&image_ref, zone, "instance_sbs")
  };

  doc.insert(
    "image".to_owned(),
    json!({
      "id": image_id,
      "name": image_ref,
      "arch": "x86_64",
      "default_bootscript": {},
      "from_server": "",
      "organization": "",
      "public": false,
      "root_volume": {},
      "extra_volumes": {},
    }),
  );
}

// ─── Servers ─────────────────────────────────────────────────────────────────

async fn create_server<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  normalize_security_group(&mut doc);
  normalize_image(&mut doc, &zone);

  let now = generate::now_stamp();
  doc.insert("zone".to_owned(), Value::String(zone.clone()));
  doc.insert("state".to_owned(), Value::String("running".to_owned()));
  doc.insert("creation_date".to_owned(), Value::String(now.clone()));
  doc.insert("modification_date".to_owned(), Value::String(now));

  // Resolve flexible IP ids to address objects; anything unresolvable
  // drops out, leaving the empty default.
  let mut resolved = Vec::new();
  if let Some(Value::Array(raw_ips)) = doc.get("public_ips") {
    for raw in raw_ips.clone() {
      let Value::String(ip_id) = raw else { continue };
      if ip_id.is_empty() {
        continue;
      }
      if let Some(ip) = state
        .store
        .get(&IPS, &[&ip_id])
        .await
        .map_err(Error::domain)?
      {
        resolved.push(json!({
          "id": ip_id,
          "address": ip.get("address").cloned().unwrap_or(Value::Null),
          "dynamic": false,
        }));
      }
    }
  }
  if resolved.is_empty() {
    doc.insert("public_ips".to_owned(), json!([]));
    doc.insert("public_ip".to_owned(), Value::Null);
  } else {
    doc.insert("public_ip".to_owned(), resolved[0].clone());
    doc.insert("public_ips".to_owned(), Value::Array(resolved));
  }

  // Every server gets a fresh root volume; caller-supplied volumes are
  // not stored, matching an API that provisions boot volumes itself.
  let name = document::non_blank_str(&doc, "name")
    .map(str::trim)
    .unwrap_or("server")
    .to_owned();
  doc.insert(
    "volumes".to_owned(),
    json!({
      "0": {
        "id": generate::new_id(),
        "name": format!("{name}-vol-0"),
        "size": 20_000_000_000u64,
        "volume_type": "l_ssd",
        "state": "available",
        "boot": true,
        "zone": zone,
      },
    }),
  );

  // SDKs dereference security_group.id without a nil check, so an absent
  // embed still becomes an object.
  if !matches!(doc.get("security_group"), Some(Value::Object(_))) {
    let sg_id = document::non_blank_str(&doc, "security_group_id")
      .map(str::to_owned)
      .unwrap_or_else(generate::new_id);
    doc.insert(
      "security_group".to_owned(),
      json!({"id": sg_id, "name": "default"}),
    );
  }

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&SERVERS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::wrap("server", doc))
}

async fn list_servers<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&SERVERS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("servers", items))
}

async fn get_server<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &SERVERS, &[&server_id]).await?;
  Ok(payload::wrap("server", doc))
}

async fn delete_server<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&SERVERS, &[&server_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

/// Power actions always succeed immediately; `terminate` also deletes
/// the server the way the real control plane tears it down.
async fn server_action<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &SERVERS, &[&server_id]).await?;
  let doc = payload::decode(&body)?;
  let action = document::non_blank_str(&doc, "action").unwrap_or_default();

  if action == "terminate" {
    state
      .store
      .delete(&SERVERS, &[&server_id])
      .await
      .map_err(Error::domain)?;
  }

  Ok(Json(json!({
    "task": {
      "id": generate::new_id(),
      "description": action,
      "progress": 100,
      "status": "success",
    },
  })))
}

async fn list_user_data<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &SERVERS, &[&server_id]).await?;
  Ok(Json(json!({"user_data": []})))
}

/// User data is accepted and discarded; only the server check matters.
/// The body is raw cloud-init payload, not JSON, so it is never decoded.
async fn set_user_data<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id, _key)): Path<(String, String, String)>,
  _body: Bytes,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &SERVERS, &[&server_id]).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Volumes ─────────────────────────────────────────────────────────────────

/// Volumes only exist embedded in server documents; the volume API is a
/// read-through view over them.
async fn get_volume<S>(
  State(state): State<AppState<S>>,
  Path((zone, volume_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let servers = state
    .store
    .list(&SERVERS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  for server in servers {
    let Some(Value::Object(volumes)) = server.get("volumes") else {
      continue;
    };
    for vol in volumes.values() {
      let Value::Object(vol) = vol else { continue };
      if vol.get("id") == Some(&Value::String(volume_id.clone())) {
        return Ok(payload::wrap("volume", vol.clone()));
      }
    }
  }
  Err(Error::NotFound)
}

/// Deleting a volume is a no-op that reports success; volumes disappear
/// with their server.
async fn delete_volume() -> StatusCode {
  StatusCode::NO_CONTENT
}

// ─── Flexible IPs ────────────────────────────────────────────────────────────

async fn create_ip<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("zone".to_owned(), Value::String(zone));
  doc.insert("address".to_owned(), Value::String(generate::public_ip()));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&IPS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::wrap("ip", doc))
}

async fn list_ips<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&IPS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("ips", items))
}

async fn get_ip<S>(
  State(state): State<AppState<S>>,
  Path((_zone, ip_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &IPS, &[&ip_id]).await?;
  Ok(payload::wrap("ip", doc))
}

async fn delete_ip<S>(
  State(state): State<AppState<S>>,
  Path((_zone, ip_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&IPS, &[&ip_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Security groups ─────────────────────────────────────────────────────────

async fn create_security_group<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("zone".to_owned(), Value::String(zone));
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&SECURITY_GROUPS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::wrap("security_group", doc))
}

async fn list_security_groups<S>(
  State(state): State<AppState<S>>,
  Path(zone): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&SECURITY_GROUPS, Some(("zone", &zone)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("security_groups", items))
}

async fn get_security_group<S>(
  State(state): State<AppState<S>>,
  Path((_zone, sg_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &SECURITY_GROUPS, &[&sg_id]).await?;
  Ok(payload::wrap("security_group", doc))
}

async fn update_security_group<S>(
  State(state): State<AppState<S>>,
  Path((_zone, sg_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc = merge_update(
    state.store.as_ref(),
    &SECURITY_GROUPS,
    &[&sg_id],
    patch,
    false,
  )
  .await?;
  Ok(payload::wrap("security_group", doc))
}

async fn delete_security_group<S>(
  State(state): State<AppState<S>>,
  Path((_zone, sg_id)): Path<(String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&SECURITY_GROUPS, &[&sg_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}

/// Replace the whole rule set. The rules value is stored verbatim on the
/// group document and echoed back without a count.
async fn put_security_group_rules<S>(
  State(state): State<AppState<S>>,
  Path((_zone, sg_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let decoded = payload::decode(&body)?;
  let rules = decoded
    .get("rules")
    .cloned()
    .unwrap_or(Value::Object(decoded));

  let mut doc = fetch(state.store.as_ref(), &SECURITY_GROUPS, &[&sg_id]).await?;
  doc.insert("rules".to_owned(), rules.clone());
  state
    .store
    .replace(&SECURITY_GROUPS, &[&sg_id], doc)
    .await
    .map_err(Error::domain)?;
  Ok(Json(json!({"rules": rules})))
}

async fn get_security_group_rules<S>(
  State(state): State<AppState<S>>,
  Path((_zone, sg_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &SECURITY_GROUPS, &[&sg_id]).await?;
  let rules = match doc.get("rules") {
    Some(Value::Array(rules)) => rules.clone(),
    _ => Vec::new(),
  };
  Ok(payload::list_values("rules", rules))
}

// ─── Private NICs ────────────────────────────────────────────────────────────

async fn create_private_nic<S>(
  State(state): State<AppState<S>>,
  Path((zone, server_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  doc.insert("server_id".to_owned(), Value::String(server_id));
  doc.insert("zone".to_owned(), Value::String(zone));
  doc.insert("state".to_owned(), Value::String("available".to_owned()));
  doc.insert(
    "private_ips".to_owned(),
    json!([{"id": generate::new_id(), "address": generate::private_ip()}]),
  );
  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&PRIVATE_NICS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::wrap("private_nic", doc))
}

async fn list_private_nics<S>(
  State(state): State<AppState<S>>,
  Path((_zone, server_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&PRIVATE_NICS, Some(("server_id", &server_id)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("private_nics", items))
}

async fn get_private_nic<S>(
  State(state): State<AppState<S>>,
  Path((_zone, _server_id, nic_id)): Path<(String, String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &PRIVATE_NICS, &[&nic_id]).await?;
  Ok(payload::wrap("private_nic", doc))
}

async fn delete_private_nic<S>(
  State(state): State<AppState<S>>,
  Path((_zone, _server_id, nic_id)): Path<(String, String, String)>,
) -> Result<StatusCode, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  state
    .store
    .delete(&PRIVATE_NICS, &[&nic_id])
    .await
    .map_err(Error::domain)?;
  Ok(StatusCode::NO_CONTENT)
}
