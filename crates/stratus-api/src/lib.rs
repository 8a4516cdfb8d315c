//! HTTP surface of the mock cloud control plane.
//!
//! Exposes an axum [`Router`] with one façade per cloud service, all
//! backed by any [`ResourceStore`]. Paths, payload shapes, and error
//! bodies track the real cloud APIs closely enough that an unmodified
//! Terraform provider can run against it.

pub mod error;
pub mod handlers;
pub mod payload;

pub use error::Error;

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::Request,
  middleware::{self, Next},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use stratus_core::store::ResourceStore;
use tower_http::trace::TraceLayer;

use handlers::{
  admin, domain, iam, instance, ipam, k8s, lb, marketplace, rdb, redis,
  registry, vpc,
};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from flags, `config.toml`,
/// and the environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:    String,
  pub port:    u16,
  /// SQLite database path; `:memory:` keeps all state in process.
  pub db_path: String,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S: ResourceStore> {
  pub store: Arc<S>,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full mock control-plane router.
///
/// Admin routes under `/mock` skip auth so test harnesses can reset and
/// inspect state without credentials. Everything else sits behind the
/// token check, and unmatched paths fall through to a logging 501 so
/// provider logs name exactly which real API call the mock is missing.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let admin = Router::new()
    .route("/mock/reset", post(admin::reset::<S>))
    .route("/mock/state", get(admin::full_state::<S>))
    .route("/mock/state/{service}", get(admin::service_state::<S>));

  let services = Router::new()
    .nest("/instance/v1/zones/{zone}", instance::routes::<S>())
    .nest("/block/v1alpha1/zones/{zone}", instance::volume_routes::<S>())
    .nest("/marketplace/v2", marketplace::routes::<S>())
    .nest("/vpc/v1/regions/{region}", vpc::routes::<S>())
    .nest("/vpc/v2/regions/{region}", vpc::routes::<S>())
    .nest("/lb/v1/zones/{zone}", lb::routes::<S>())
    .nest("/k8s/v1/regions/{region}", k8s::routes::<S>())
    .nest("/rdb/v1/regions/{region}", rdb::routes::<S>())
    .nest("/redis/v1/zones/{zone}", redis::routes::<S>())
    .nest("/registry/v1/regions/{region}", registry::routes::<S>())
    .nest("/iam/v1alpha1", iam::routes::<S>())
    .nest("/account/v2alpha1", iam::ssh_key_routes::<S>())
    .nest("/domain/v2beta1", domain::routes::<S>())
    .nest("/ipam/v1/regions/{region}", ipam::routes::<S>())
    .route_layer(middleware::from_fn(require_auth_token));

  Router::new()
    .merge(admin)
    .merge(services)
    .fallback(unimplemented)
    .method_not_allowed_fallback(unimplemented)
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

/// Catch-all router for provider path discovery: log every request with
/// its headers and answer `{"ok": true}`.
pub fn echo_router() -> Router {
  Router::new().fallback(echo)
}

// ─── Middleware and fallbacks ────────────────────────────────────────────────

/// Reject requests without an `X-Auth-Token` header. Any non-empty value
/// passes; the mock authenticates presence, not validity.
async fn require_auth_token(req: Request, next: Next) -> Response {
  let token = req
    .headers()
    .get("x-auth-token")
    .and_then(|value| value.to_str().ok())
    .unwrap_or("");
  if token.is_empty() {
    return Error::Unauthorized.into_response();
  }
  next.run(req).await
}

async fn unimplemented(req: Request) -> Error {
  let method = req.method().clone();
  let path = req.uri().path().to_owned();
  tracing::warn!(%method, %path, "unimplemented route");
  Error::NotImplemented { method, path }
}

async fn echo(req: Request) -> Json<Value> {
  let mut headers: Vec<(String, String)> = req
    .headers()
    .iter()
    .map(|(name, value)| {
      (
        name.to_string(),
        String::from_utf8_lossy(value.as_bytes()).into_owned(),
      )
    })
    .collect();
  headers.sort();
  tracing::info!(
    method = %req.method(),
    path = req.uri().path(),
    ?headers,
    "echo",
  );
  Json(json!({ "ok": true }))
}
