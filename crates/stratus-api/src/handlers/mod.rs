//! Request handlers, one module per mocked service.
//!
//! Handlers stay thin: decode the body, let the service module add its
//! derived fields, call the store, pick the envelope. Everything a module
//! adds beyond that is the response enrichment the real API is known for
//! (embedded parent objects, synthetic defaults, normalized inputs).

pub mod admin;
pub mod domain;
pub mod iam;
pub mod instance;
pub mod ipam;
pub mod k8s;
pub mod lb;
pub mod marketplace;
pub mod rdb;
pub mod redis;
pub mod registry;
pub mod vpc;

use serde_json::Value;
use stratus_core::{
  catalog::Table,
  document::{self, Document},
  generate,
  store::ResourceStore,
};

use crate::error::Error;

/// Fetch one document by key, turning an absent row into a 404.
pub(crate) async fn fetch<S: ResourceStore>(
  store: &S,
  table: &'static Table,
  key: &[&str],
) -> Result<Document, Error> {
  store
    .get(table, key)
    .await
    .map_err(Error::domain)?
    .ok_or(Error::NotFound)
}

/// Merge a patch into a stored document and persist the result.
///
/// `id` is immutable everywhere; `stamp` refreshes `updated_at` on the
/// services that maintain one.
pub(crate) async fn merge_update<S: ResourceStore>(
  store: &S,
  table: &'static Table,
  key: &[&str],
  patch: Document,
  stamp: bool,
) -> Result<Document, Error> {
  let mut doc = fetch(store, table, key).await?;
  document::merge_patch(&mut doc, patch, &["id"]);
  if stamp {
    doc.insert("updated_at".to_owned(), Value::String(generate::now_stamp()));
  }
  store
    .replace(table, key, doc.clone())
    .await
    .map_err(Error::domain)?;
  Ok(doc)
}
