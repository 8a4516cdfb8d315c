//! SQLite backend for the Stratus resource store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The schema is generated
//! from the resource catalog: one table per declared resource kind, each
//! holding a JSON document plus its promoted key/scope/reference columns.

mod schema;
mod store;

pub use store::SqliteStore;

#[cfg(test)]
mod tests;
