//! The schemaless resource document and the handful of operations the rest
//! of the system performs on it.
//!
//! A resource is a JSON object, stored verbatim and echoed back verbatim.
//! Façades add derived fields before the document lands; nothing in here
//! validates shape beyond "it is an object".

use serde_json::{Map, Value};

/// A resource document. Key order is preserved end to end, so responses
/// read the way the caller (or the enrichment code) wrote them.
pub type Document = Map<String, Value>;

/// The string under `key`, if it is present, a string, and contains at
/// least one non-whitespace character.
pub fn non_blank_str<'a>(doc: &'a Document, key: &str) -> Option<&'a str> {
  match doc.get(key) {
    Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
    _ => None,
  }
}

/// Shallow merge of `patch` into `doc`, skipping the keys listed in
/// `immutable`. Values are replaced wholesale; nested objects are not
/// merged recursively.
pub fn merge_patch(doc: &mut Document, patch: Document, immutable: &[&str]) {
  for (key, value) in patch {
    if immutable.iter().any(|k| *k == key) {
      continue;
    }
    doc.insert(key, value);
  }
}

/// Remove the named fields from `doc`. Used to strip secrets out of read
/// paths; create responses keep them because the façade echoes its own
/// copy, not a stored one.
pub fn redact(doc: &mut Document, fields: &[&str]) {
  for field in fields {
    doc.remove(*field);
  }
}
