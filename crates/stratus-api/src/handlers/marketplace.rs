//! Marketplace image catalog.
//!
//! The catalog is synthetic but stable: image ids are derived (UUID v5)
//! from the label, zone, and type, so the same query always returns the
//! same ids without anything being stored. Server creation reuses
//! [`local_image_id`] to resolve image labels to these ids.

use axum::{
  Json, Router,
  extract::{Path, Query, State},
  routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};
use stratus_core::store::ResourceStore;
use uuid::Uuid;

use crate::{AppState, error::Error};

const LABELS: [&str; 4] =
  ["ubuntu_noble", "ubuntu_jammy", "debian_bookworm", "centos_stream_9"];

const ZONES: [&str; 3] = ["fr-par-1", "nl-ams-1", "pl-waw-1"];

const TYPES: [&str; 2] = ["instance_sbs", "instance_local"];

const COMPATIBLE_COMMERCIAL_TYPES: [&str; 6] =
  ["DEV1-S", "DEV1-M", "DEV1-L", "GP1-XS", "GP1-S", "GP1-M"];

pub fn routes<S>() -> Router<AppState<S>>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  Router::new()
    .route("/local-images", get(list_local_images::<S>))
    .route("/local-images/{local_image_id}", get(get_local_image::<S>))
}

/// Deterministic image id for a (label, zone, type) triple.
pub(crate) fn local_image_id(
  label: &str,
  zone: &str,
  image_type: &str,
) -> String {
  let name = format!("{label}|{zone}|{image_type}");
  Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn image(id: String, zone: &str, label: &str, image_type: &str) -> Value {
  json!({
    "id": id,
    "compatible_commercial_types": COMPATIBLE_COMMERCIAL_TYPES,
    "arch": "x86_64",
    "zone": zone,
    "label": label,
    "type": image_type,
  })
}

#[derive(Deserialize)]
struct ImageFilter {
  image_label: Option<String>,
  zone:        Option<String>,
  #[serde(rename = "type")]
  image_type:  Option<String>,
}

impl ImageFilter {
  /// A filter value counts only when it is non-blank after trimming.
  fn wants(field: &Option<String>, candidate: &str) -> bool {
    match field.as_deref().map(str::trim) {
      Some(want) if !want.is_empty() => want == candidate,
      _ => true,
    }
  }
}

async fn list_local_images<S>(
  State(_state): State<AppState<S>>,
  Query(filter): Query<ImageFilter>,
) -> Json<Value>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  let mut out = Vec::new();
  for label in LABELS {
    if !ImageFilter::wants(&filter.image_label, label) {
      continue;
    }
    for zone in ZONES {
      if !ImageFilter::wants(&filter.zone, zone) {
        continue;
      }
      for image_type in TYPES {
        if !ImageFilter::wants(&filter.image_type, image_type) {
          continue;
        }
        out.push(image(
          local_image_id(label, zone, image_type),
          zone,
          label,
          image_type,
        ));
      }
    }
  }

  let count = out.len();
  Json(json!({"local_images": out, "total_count": count}))
}

async fn get_local_image<S>(
  State(_state): State<AppState<S>>,
  Path(id): Path<String>,
) -> Result<Json<Value>, Error>
where
  S: ResourceStore + Clone + Send + Sync + 'static,
{
  for label in LABELS {
    for zone in ZONES {
      for image_type in TYPES {
        let candidate = local_image_id(label, zone, image_type);
        if candidate == id {
          return Ok(Json(image(candidate, zone, label, image_type)));
        }
      }
    }
  }
  Err(Error::NotFound)
}
