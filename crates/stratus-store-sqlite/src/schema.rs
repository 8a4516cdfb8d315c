//! Schema generation for the SQLite store.
//!
//! The DDL is derived from the resource catalog: each table gets its
//! promoted key/scope/reference columns as TEXT plus a `doc` column
//! holding the JSON document. Referential behaviour is deliberately not
//! expressed as SQL constraints — the store applies the catalog's delete
//! policies itself, so a policy change never needs a migration.

use stratus_core::catalog::{self, Table};

/// Columns promoted out of the document for `table`, in DDL order: key
/// columns, then the scope column, then reference columns, deduplicated.
pub fn promoted_columns(table: &Table) -> Vec<&'static str> {
  let mut cols: Vec<&'static str> = Vec::new();
  for &col in table.key {
    if !cols.contains(&col) {
      cols.push(col);
    }
  }
  if let Some(scope) = table.scope {
    if !cols.contains(&scope) {
      cols.push(scope);
    }
  }
  for reference in table.references {
    if !cols.contains(&reference.column) {
      cols.push(reference.column);
    }
  }
  cols
}

/// Full schema DDL for every catalog table; idempotent thanks to
/// `CREATE TABLE IF NOT EXISTS`.
pub fn schema_sql() -> String {
  let mut sql = String::from("PRAGMA journal_mode = WAL;\n");

  for table in catalog::TABLES {
    sql.push('\n');
    sql.push_str(&create_table(table));
    for index in indexes(table) {
      sql.push_str(&index);
    }
  }

  sql.push_str("\nPRAGMA user_version = 1;\n");
  sql
}

fn create_table(table: &Table) -> String {
  let cols = promoted_columns(table);
  let width = cols
    .iter()
    .map(|c| c.len())
    .chain([3])
    .max()
    .unwrap_or(3);

  let mut out = format!("CREATE TABLE IF NOT EXISTS {} (\n", table.name);
  for col in &cols {
    let constraint = if table.key.contains(col) { " NOT NULL" } else { "" };
    out.push_str(&format!("    {col:<width$} TEXT{constraint},\n"));
  }
  out.push_str(&format!("    {:<width$} TEXT NOT NULL,\n", "doc"));
  out.push_str(&format!("    PRIMARY KEY ({})\n);\n", table.key.join(", ")));
  out
}

fn indexes(table: &Table) -> Vec<String> {
  // The primary key index already covers lookups on the leading key
  // column; every other promoted column gets its own index.
  promoted_columns(table)
    .into_iter()
    .filter(|col| *col != table.key[0])
    .map(|col| {
      format!(
        "CREATE INDEX IF NOT EXISTS {table}_{col}_idx ON {table}({col});\n",
        table = table.name,
      )
    })
    .collect()
}
