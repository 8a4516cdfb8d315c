//! Managed Kubernetes service: clusters, node pools, synthesized nodes,
//! and a parseable mock kubeconfig.

use axum::{
  Json, Router,
  extract::{Path, State},
  routing::{get, post},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use serde_json::{Value, json};
use stratus_core::{
  catalog::{K8S_CLUSTERS, K8S_POOLS},
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
    .route("/versions", get(list_versions))
    .route("/clusters", post(create_cluster::<S>).get(list_clusters::<S>))
    .route(
      "/clusters/{cluster_id}",
      get(get_cluster::<S>)
        .patch(update_cluster::<S>)
        .delete(delete_cluster::<S>),
    )
    .route("/clusters/{cluster_id}/kubeconfig", get(get_kubeconfig::<S>))
    .route(
      "/clusters/{cluster_id}/pools",
      post(create_pool::<S>).get(list_pools::<S>),
    )
    .route("/clusters/{cluster_id}/nodes", get(list_nodes::<S>))
    .route(
      "/pools/{pool_id}",
      get(get_pool::<S>).patch(update_pool::<S>).delete(delete_pool::<S>),
    )
}

// ─── Versions ────────────────────────────────────────────────────────────────

async fn list_versions() -> Json<Value> {
  let versions: Vec<Value> = ["1.31.2", "1.30.6", "1.29.10", "1.28.15"]
    .iter()
    .map(|name| {
      json!({
        "name": name,
        "label": format!("Kubernetes {name}"),
        "available_cnis": ["cilium", "calico", "kilo", "flannel"],
        "available_container_runtimes": ["containerd"],
        "available_feature_gates": [],
        "available_kubelet_args": {},
      })
    })
    .collect();
  Json(json!({ "versions": versions }))
}

// ─── Clusters ────────────────────────────────────────────────────────────────

async fn create_cluster<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("region".to_owned(), Value::String(region));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  // Fields cluster resource reads dereference without nil checks.
  for (key, default) in [
    (
      "cluster_url",
      json!("https://mock-k8s-apiserver.cloud.example:6443"),
    ),
    ("wildcard_dns", json!("*.mock-k8s.cloud.example")),
    (
      "open_id_connect_config",
      json!({
        "issuer_url": "",
        "client_id": "",
        "username_claim": "",
        "username_prefix": "",
        "groups_claim": [],
        "groups_prefix": "",
        "required_claim": [],
      }),
    ),
    (
      "auto_upgrade",
      json!({
        "enable": false,
        "maintenance_window": { "day": "any", "start_hour": 0 },
      }),
    ),
    (
      "autoscaler_config",
      json!({
        "scale_down_disabled": false,
        "scale_down_delay_after_add": "10m",
        "estimator": "binpacking",
        "expander": "random",
        "ignore_daemonsets_utilization": false,
        "balance_similar_node_groups": false,
        "expendable_pods_priority_cutoff": -10,
        "scale_down_unneeded_time": "10m",
        "scale_down_utilization_threshold": 0.5,
        "max_graceful_termination_sec": 600,
      }),
    ),
    ("feature_gates", json!([])),
    ("admission_plugins", json!([])),
    ("apiserver_cert_sans", json!([])),
    ("tags", json!([])),
    ("organization_id", json!(generate::ZERO_UUID)),
    ("project_id", json!(generate::ZERO_UUID)),
  ] {
    doc.entry(key).or_insert(default);
  }

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&K8S_CLUSTERS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_clusters<S>(
  State(state): State<AppState<S>>,
  Path(region): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&K8S_CLUSTERS, Some(("region", &region)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("clusters", items))
}

async fn get_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_region, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &K8S_CLUSTERS, &[&cluster_id]).await?;
  Ok(payload::bare(doc))
}

async fn update_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_region, cluster_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc = merge_update(
    state.store.as_ref(),
    &K8S_CLUSTERS,
    &[&cluster_id],
    patch,
    true,
  )
  .await?;
  Ok(payload::bare(doc))
}

/// Deletes return the final object in status `deleting` so pollers see a
/// terminal transition instead of an instant 404.
async fn delete_cluster<S>(
  State(state): State<AppState<S>>,
  Path((_region, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc =
    fetch(state.store.as_ref(), &K8S_CLUSTERS, &[&cluster_id]).await?;
  state
    .store
    .delete(&K8S_CLUSTERS, &[&cluster_id])
    .await
    .map_err(Error::domain)?;
  doc.insert("status".to_owned(), Value::String("deleting".to_owned()));
  Ok(payload::bare(doc))
}

async fn get_kubeconfig<S>(
  State(state): State<AppState<S>>,
  Path((_region, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  fetch(state.store.as_ref(), &K8S_CLUSTERS, &[&cluster_id]).await?;
  // Minimal kubeconfig the provider can parse into a client config.
  let config = r"apiVersion: v1
clusters:
- cluster:
    server: https://mock-k8s-apiserver.cloud.example:6443
  name: mock
contexts:
- context:
    cluster: mock
    user: mock
  name: mock
current-context: mock
kind: Config
users:
- name: mock
  user:
    token: mock-token
";
  Ok(Json(json!({
    "name": "kubeconfig",
    "content_type": "application/octet-stream",
    "content": STANDARD.encode(config),
  })))
}

// ─── Pools ───────────────────────────────────────────────────────────────────

async fn create_pool<S>(
  State(state): State<AppState<S>>,
  Path((region, cluster_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = payload::decode(&body)?;
  let now = generate::now_stamp();
  doc.insert("region".to_owned(), Value::String(region.clone()));
  doc.insert("cluster_id".to_owned(), Value::String(cluster_id));
  doc.insert("status".to_owned(), Value::String("ready".to_owned()));
  doc.insert("created_at".to_owned(), Value::String(now.clone()));
  doc.insert("updated_at".to_owned(), Value::String(now));

  for (key, default) in [
    ("version", json!("1.31.2")),
    ("tags", json!([])),
    ("upgrade_policy", json!({ "max_unavailable": 1, "max_surge": 0 })),
    ("nodes", json!([])),
    ("root_volume_type", json!("l_ssd")),
    ("root_volume_size", json!(20000000000u64)),
    ("zone", json!(format!("{region}-1"))),
  ] {
    doc.entry(key).or_insert(default);
  }

  doc.insert("id".to_owned(), Value::String(generate::new_id()));
  state
    .store
    .insert(&K8S_POOLS, doc.clone())
    .await
    .map_err(Error::create)?;
  Ok(payload::bare(doc))
}

async fn list_pools<S>(
  State(state): State<AppState<S>>,
  Path((_region, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let items = state
    .store
    .list(&K8S_POOLS, Some(("cluster_id", &cluster_id)))
    .await
    .map_err(Error::domain)?;
  Ok(payload::list("pools", items))
}

async fn get_pool<S>(
  State(state): State<AppState<S>>,
  Path((_region, pool_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let doc = fetch(state.store.as_ref(), &K8S_POOLS, &[&pool_id]).await?;
  Ok(payload::bare(doc))
}

async fn update_pool<S>(
  State(state): State<AppState<S>>,
  Path((_region, pool_id)): Path<(String, String)>,
  body: Bytes,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let patch = payload::decode(&body)?;
  let doc =
    merge_update(state.store.as_ref(), &K8S_POOLS, &[&pool_id], patch, true)
      .await?;
  Ok(payload::bare(doc))
}

async fn delete_pool<S>(
  State(state): State<AppState<S>>,
  Path((_region, pool_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut doc = fetch(state.store.as_ref(), &K8S_POOLS, &[&pool_id]).await?;
  state
    .store
    .delete(&K8S_POOLS, &[&pool_id])
    .await
    .map_err(Error::domain)?;
  doc.insert("status".to_owned(), Value::String("deleting".to_owned()));
  Ok(payload::bare(doc))
}

// ─── Nodes ───────────────────────────────────────────────────────────────────

/// Nodes are synthesized from pools on demand; one node per unit of pool
/// size, minimum one.
async fn list_nodes<S>(
  State(state): State<AppState<S>>,
  Path((region, cluster_id)): Path<(String, String)>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let pools = state
    .store
    .list(&K8S_POOLS, Some(("cluster_id", &cluster_id)))
    .await
    .map_err(Error::domain)?;

  let mut nodes = Vec::new();
  for pool in &pools {
    let pool_id = pool.get("id").and_then(Value::as_str).unwrap_or_default();
    let pool_name =
      pool.get("name").and_then(Value::as_str).unwrap_or_default();
    let size = pool
      .get("size")
      .and_then(Value::as_f64)
      .map(|n| n as usize)
      .unwrap_or(0)
      .max(1);
    for i in 0..size {
      nodes.push(json!({
        "id": generate::new_id(),
        "pool_id": pool_id,
        "cluster_id": cluster_id,
        "region": region,
        "name": format!("{pool_name}-node-{i}"),
        "status": "ready",
        "public_ip_v4": null,
        "public_ip_v6": null,
        "conditions": {},
        "created_at": pool.get("created_at").cloned().unwrap_or(Value::Null),
        "updated_at": pool.get("updated_at").cloned().unwrap_or(Value::Null),
      }));
    }
  }
  Ok(payload::list_values("nodes", nodes))
}
