//! Request decoding and the response envelopes shared by every service.

use axum::Json;
use bytes::Bytes;
use serde_json::{Map, Value};
use stratus_core::document::Document;

use crate::error::Error;

/// Decode a request body into a document.
///
/// Anything that is not a JSON object is rejected, except a literal
/// `null`, which reads as an empty document. An empty body is not valid
/// JSON and is rejected too; callers that take no body skip decoding
/// entirely.
pub fn decode(body: &Bytes) -> Result<Document, Error> {
  let value: Value =
    serde_json::from_slice(body).map_err(|_| Error::InvalidJson)?;
  match value {
    Value::Object(map) => Ok(map),
    Value::Null => Ok(Document::new()),
    _ => Err(Error::InvalidJson),
  }
}

/// `{"<key>": <doc>}` — the single-resource envelope.
pub fn wrap(key: &str, doc: Document) -> Json<Value> {
  let mut body = Map::new();
  body.insert(key.to_owned(), Value::Object(doc));
  Json(Value::Object(body))
}

/// A bare document body, for services whose resources have no envelope.
pub fn bare(doc: Document) -> Json<Value> {
  Json(Value::Object(doc))
}

/// `{"<key>": [...], "total_count": n}` — the collection envelope.
pub fn list(key: &str, items: Vec<Document>) -> Json<Value> {
  let values = items.into_iter().map(Value::Object).collect();
  list_values(key, values)
}

/// [`list`] for items that are not plain documents.
pub fn list_values(key: &str, items: Vec<Value>) -> Json<Value> {
  let count = items.len();
  let mut body = Map::new();
  body.insert(key.to_owned(), Value::Array(items));
  body.insert("total_count".to_owned(), Value::from(count));
  Json(Value::Object(body))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decode_accepts_objects_and_null() {
    let doc = decode(&Bytes::from_static(b"{\"name\": \"x\"}")).unwrap();
    assert_eq!(doc.get("name"), Some(&Value::from("x")));
    assert!(decode(&Bytes::from_static(b"null")).unwrap().is_empty());
  }

  #[test]
  fn decode_rejects_non_objects_and_garbage() {
    for body in [&b"[]"[..], b"\"s\"", b"7", b"", b"{not json"] {
      assert!(decode(&Bytes::copy_from_slice(body)).is_err());
    }
  }

  #[test]
  fn list_counts_items() {
    let Json(value) = list("vpcs", vec![Document::new(), Document::new()]);
    assert_eq!(value["total_count"], Value::from(2));
    assert_eq!(value["vpcs"].as_array().unwrap().len(), 2);
  }
}
