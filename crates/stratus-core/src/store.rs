//! The `ResourceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `stratus-store-sqlite`).
//! The HTTP layer depends on this abstraction, not on any concrete backend.
//!
//! Unlike a typed repository there is one set of operations for every
//! resource kind; the [`Table`] declaration passed to each call decides
//! key extraction, reference checking, and delete behaviour.

use std::future::Future;

use crate::{Result, catalog::Table, document::Document};

/// Abstraction over a Stratus resource store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
///
/// Errors are reported through [`crate::Error`] so callers can map
/// not-found, missing-parent, and conflict outcomes to distinct API
/// responses regardless of backend.
pub trait ResourceStore: Send + Sync {
  /// Insert a document as a new row.
  ///
  /// Key, scope, and reference columns are extracted from the document
  /// per the table declaration. Bound references are checked against the
  /// parent table first; a missing parent fails the insert with
  /// [`crate::Error::ReferenceNotFound`], and an existing row under the
  /// same key fails it with [`crate::Error::Conflict`].
  fn insert(
    &self,
    table: &'static Table,
    doc: Document,
  ) -> impl Future<Output = Result<()>> + Send + '_;

  /// Fetch one document by primary key, with redacted fields stripped.
  /// Returns `None` if the row does not exist.
  fn get<'a>(
    &'a self,
    table: &'static Table,
    key: &'a [&'a str],
  ) -> impl Future<Output = Result<Option<Document>>> + Send + 'a;

  /// List documents, optionally filtered on one promoted column.
  fn list<'a>(
    &'a self,
    table: &'static Table,
    filter: Option<(&'static str, &'a str)>,
  ) -> impl Future<Output = Result<Vec<Document>>> + Send + 'a;

  /// Replace the stored document of an existing row. The promoted columns
  /// keep their insert-time values; only the document changes.
  fn replace<'a>(
    &'a self,
    table: &'static Table,
    key: &'a [&'a str],
    doc: Document,
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Delete one row by primary key, applying the declared delete policies
  /// to child rows: children under `Reject` block the delete with
  /// [`crate::Error::Conflict`] before any other effect, `Cascade`
  /// children are removed, and `Nullify` children have their reference
  /// column and declared document fields nulled.
  fn delete<'a>(
    &'a self,
    table: &'static Table,
    key: &'a [&'a str],
  ) -> impl Future<Output = Result<()>> + Send + 'a;

  /// Delete every row whose `column` equals `value`; returns how many
  /// rows went away. No delete policies apply — callers use this for
  /// wholesale replacement of dependent sets.
  fn delete_matching<'a>(
    &'a self,
    table: &'static Table,
    column: &'static str,
    value: &'a str,
  ) -> impl Future<Output = Result<usize>> + Send + 'a;

  /// Remove every row of every table.
  fn reset(&self) -> impl Future<Output = Result<()>> + Send + '_;
}
