//! [`SqliteStore`] — the SQLite implementation of [`ResourceStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;

use stratus_core::{
  Error, Result,
  catalog::{self, DeletePolicy, Reference, Table},
  document::{self, Document},
  store::ResourceStore,
};

use crate::schema;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Stratus resource store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(|e| Error::Storage(e.to_string()))?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(|e| Error::Storage(e.to_string()))?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .call(|conn| {
        conn.execute_batch(&schema::schema_sql())?;
        Ok(())
      })
      .await
  }

  /// Run `f` on the connection thread, folding engine failures into
  /// [`Error::Storage`]. Domain outcomes (missing parent, duplicate key,
  /// blocked delete) travel through `T`, never through error strings.
  async fn call<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut rusqlite::Connection) -> tokio_rusqlite::Result<T>
      + Send
      + 'static,
  {
    self
      .conn
      .call(f)
      .await
      .map_err(|e| Error::Storage(e.to_string()))
  }
}

// ─── Row extraction ──────────────────────────────────────────────────────────

/// The document's string under `key`; missing or non-string values come
/// back as the empty string. Key and scope columns always bind.
fn text_field(doc: &Document, key: &str) -> String {
  match doc.get(key) {
    Some(serde_json::Value::String(s)) => s.clone(),
    _ => String::new(),
  }
}

fn key_from_doc(table: &Table, doc: &Document) -> Vec<String> {
  table.key.iter().map(|col| text_field(doc, col)).collect()
}

/// `id = ?1` / `instance_id = ?1 AND name = ?2` — parameters numbered in
/// key-column order.
fn key_clause(key: &[&str]) -> String {
  key
    .iter()
    .enumerate()
    .map(|(i, col)| format!("{col} = ?{}", i + 1))
    .collect::<Vec<_>>()
    .join(" AND ")
}

/// UPDATE statement nulling a child's reference column, in both the
/// column and the stored JSON (the declared clear fields too).
fn nullify_sql(child: &str, reference: &Reference) -> String {
  let mut fields = vec![reference.column];
  fields.extend(reference.clear_fields);
  let sets = fields
    .iter()
    .map(|field| format!("'$.{field}', json('null')"))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "UPDATE {child} SET {column} = NULL, doc = json_set(doc, {sets}) \
     WHERE {column} = ?1",
    column = reference.column,
  )
}

// ─── Write outcomes ──────────────────────────────────────────────────────────

enum InsertOutcome {
  Inserted,
  MissingParent(&'static str),
  DuplicateKey,
}

enum DeleteOutcome {
  Deleted,
  Missing,
  Blocked(&'static str),
}

// ─── ResourceStore impl ──────────────────────────────────────────────────────

impl ResourceStore for SqliteStore {
  async fn insert(&self, table: &'static Table, doc: Document) -> Result<()> {
    let key_vals = key_from_doc(table, &doc);

    // A bound reference both lands in its column and gets checked against
    // the parent table. Required references bind even when blank, so the
    // check fails; optional ones bind NULL and skip the check.
    let mut ref_vals: Vec<Option<String>> =
      Vec::with_capacity(table.references.len());
    for reference in table.references {
      let val = match document::non_blank_str(&doc, reference.column) {
        Some(s) => Some(s.to_owned()),
        None if reference.required => Some(String::new()),
        None => None,
      };
      ref_vals.push(val);
    }

    let mut parent_checks: Vec<(&'static str, &'static str, String)> =
      Vec::new();
    for (reference, val) in table.references.iter().zip(&ref_vals) {
      let (Some(parent), Some(val)) = (catalog::find(reference.parent), val)
      else {
        continue;
      };
      parent_checks.push((parent.name, parent.key[0], val.clone()));
    }

    // Promoted columns in insert order, deduplicated — composite keys can
    // overlap with scope and reference columns.
    let mut cols: Vec<(&'static str, Option<String>)> = Vec::new();
    for (i, &col) in table.key.iter().enumerate() {
      cols.push((col, Some(key_vals[i].clone())));
    }
    if let Some(scope) = table.scope {
      if !cols.iter().any(|(name, _)| *name == scope) {
        cols.push((scope, Some(text_field(&doc, scope))));
      }
    }
    for (reference, val) in table.references.iter().zip(&ref_vals) {
      if !cols.iter().any(|(name, _)| *name == reference.column) {
        cols.push((reference.column, val.clone()));
      }
    }

    let json = serde_json::to_string(&doc)?;
    let exists_sql = format!(
      "SELECT 1 FROM {} WHERE {} LIMIT 1",
      table.name,
      key_clause(table.key)
    );
    let names = cols
      .iter()
      .map(|(name, _)| *name)
      .chain(std::iter::once("doc"))
      .collect::<Vec<_>>()
      .join(", ");
    let placeholders = (1..=cols.len() + 1)
      .map(|i| format!("?{i}"))
      .collect::<Vec<_>>()
      .join(", ");
    let insert_sql =
      format!("INSERT INTO {} ({names}) VALUES ({placeholders})", table.name);

    let outcome = self
      .call(move |conn| {
        for (parent, key_col, value) in &parent_checks {
          let sql =
            format!("SELECT 1 FROM {parent} WHERE {key_col} = ?1 LIMIT 1");
          let found = conn
            .query_row(&sql, rusqlite::params![value], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
          if !found {
            return Ok(InsertOutcome::MissingParent(parent));
          }
        }

        let taken = conn
          .query_row(
            &exists_sql,
            rusqlite::params_from_iter(key_vals.iter()),
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(InsertOutcome::DuplicateKey);
        }

        let mut params: Vec<Option<String>> =
          cols.into_iter().map(|(_, val)| val).collect();
        params.push(Some(json));
        conn.execute(&insert_sql, rusqlite::params_from_iter(params))?;
        Ok(InsertOutcome::Inserted)
      })
      .await?;

    match outcome {
      InsertOutcome::Inserted => Ok(()),
      InsertOutcome::MissingParent(parent) => {
        Err(Error::ReferenceNotFound(parent))
      }
      InsertOutcome::DuplicateKey => Err(Error::Conflict(table.name)),
    }
  }

  async fn get(
    &self,
    table: &'static Table,
    key: &[&str],
  ) -> Result<Option<Document>> {
    let sql = format!(
      "SELECT doc FROM {} WHERE {}",
      table.name,
      key_clause(table.key)
    );
    let key: Vec<String> = key.iter().map(|k| (*k).to_owned()).collect();

    let raw: Option<String> = self
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params_from_iter(key.iter()), |row| {
              row.get(0)
            })
            .optional()?,
        )
      })
      .await?;

    match raw {
      Some(json) => {
        let mut doc: Document = serde_json::from_str(&json)?;
        document::redact(&mut doc, table.redact);
        Ok(Some(doc))
      }
      None => Ok(None),
    }
  }

  async fn list(
    &self,
    table: &'static Table,
    filter: Option<(&'static str, &str)>,
  ) -> Result<Vec<Document>> {
    let (sql, param) = match filter {
      Some((column, value)) => (
        format!("SELECT doc FROM {} WHERE {column} = ?1", table.name),
        Some(value.to_owned()),
      ),
      None => (format!("SELECT doc FROM {}", table.name), None),
    };

    let raws: Vec<String> = self
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = match &param {
          Some(value) => stmt
            .query_map(rusqlite::params![value], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
          None => stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        };
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|json| {
        let mut doc: Document = serde_json::from_str(&json)?;
        document::redact(&mut doc, table.redact);
        Ok(doc)
      })
      .collect()
  }

  async fn replace(
    &self,
    table: &'static Table,
    key: &[&str],
    doc: Document,
  ) -> Result<()> {
    let json = serde_json::to_string(&doc)?;
    let sql = format!(
      "UPDATE {} SET doc = ?{} WHERE {}",
      table.name,
      table.key.len() + 1,
      key_clause(table.key)
    );
    let mut params: Vec<String> =
      key.iter().map(|k| (*k).to_owned()).collect();
    params.push(json);

    let affected = self
      .call(move |conn| {
        Ok(conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?)
      })
      .await?;

    if affected == 0 {
      return Err(Error::NotFound);
    }
    Ok(())
  }

  async fn delete(&self, table: &'static Table, key: &[&str]) -> Result<()> {
    // Children are matched on the parent's sole key column value.
    let parent_key = key.first().map(|k| (*k).to_owned()).unwrap_or_default();
    let inbound: Vec<(&'static Table, &'static Reference)> =
      catalog::inbound(table).collect();
    let key_vals: Vec<String> = key.iter().map(|k| (*k).to_owned()).collect();
    let exists_sql = format!(
      "SELECT 1 FROM {} WHERE {} LIMIT 1",
      table.name,
      key_clause(table.key)
    );
    let delete_sql =
      format!("DELETE FROM {} WHERE {}", table.name, key_clause(table.key));

    let outcome = self
      .call(move |conn| {
        let tx = conn.transaction()?;

        let found = tx
          .query_row(
            &exists_sql,
            rusqlite::params_from_iter(key_vals.iter()),
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !found {
          return Ok(DeleteOutcome::Missing);
        }

        // Reject checks run before any side effect, so a blocked delete
        // leaves every table untouched.
        for (child, reference) in &inbound {
          if reference.on_parent_delete != DeletePolicy::Reject {
            continue;
          }
          let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            child.name, reference.column
          );
          let blocked = tx
            .query_row(&sql, rusqlite::params![parent_key], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
          if blocked {
            return Ok(DeleteOutcome::Blocked(child.name));
          }
        }

        for (child, reference) in &inbound {
          match reference.on_parent_delete {
            DeletePolicy::Reject => {}
            DeletePolicy::Cascade => {
              let sql = format!(
                "DELETE FROM {} WHERE {} = ?1",
                child.name, reference.column
              );
              tx.execute(&sql, rusqlite::params![parent_key])?;
            }
            DeletePolicy::Nullify => {
              let sql = nullify_sql(child.name, reference);
              tx.execute(&sql, rusqlite::params![parent_key])?;
            }
          }
        }

        tx.execute(&delete_sql, rusqlite::params_from_iter(key_vals.iter()))?;
        tx.commit()?;
        Ok(DeleteOutcome::Deleted)
      })
      .await?;

    match outcome {
      DeleteOutcome::Deleted => Ok(()),
      DeleteOutcome::Missing => Err(Error::NotFound),
      DeleteOutcome::Blocked(child) => Err(Error::Conflict(child)),
    }
  }

  async fn delete_matching(
    &self,
    table: &'static Table,
    column: &'static str,
    value: &str,
  ) -> Result<usize> {
    let sql = format!("DELETE FROM {} WHERE {column} = ?1", table.name);
    let value = value.to_owned();
    self
      .call(move |conn| Ok(conn.execute(&sql, rusqlite::params![value])?))
      .await
  }

  async fn reset(&self) -> Result<()> {
    self
      .call(|conn| {
        let tx = conn.transaction()?;
        for table in catalog::TABLES {
          tx.execute(&format!("DELETE FROM {}", table.name), [])?;
        }
        tx.commit()?;
        Ok(())
      })
      .await
  }
}
