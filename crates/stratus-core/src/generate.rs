//! Generators for identifiers, timestamps, and synthetic network values.
//!
//! Generated addresses are shaped like the real thing but can never reach
//! production infrastructure: public addresses come from the RFC 2544
//! benchmarking block (198.18.0.0/15) and private ones from 10.0.0.0/8.

use chrono::{SecondsFormat, Utc};
use rand_core::{OsRng, RngCore as _};
use uuid::Uuid;

/// The all-zero UUID used for organization and project ownership fields.
pub const ZERO_UUID: &str = "00000000-0000-0000-0000-000000000000";

const ALPHANUMERIC: &[u8] =
  b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Fresh random identifier (hyphenated UUID v4).
pub fn new_id() -> String {
  Uuid::new_v4().to_string()
}

/// Current UTC time in RFC 3339 with whole-second precision.
pub fn now_stamp() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Synthetic public IPv4 address. Octets stay in 1..=254.
pub fn public_ip() -> String {
  let b = *Uuid::new_v4().as_bytes();
  format!("198.18.{}.{}", b[0] % 254 + 1, b[1] % 254 + 1)
}

/// Synthetic private IPv4 address in 10.0.0.0/8.
pub fn private_ip() -> String {
  let b = *Uuid::new_v4().as_bytes();
  format!("10.{}.{}.{}", b[0] % 254 + 1, b[1] % 254 + 1, b[2] % 254 + 1)
}

/// Random alphanumeric string of length `len`.
pub fn alphanumeric(len: usize) -> String {
  let mut bytes = vec![0u8; len];
  OsRng.fill_bytes(&mut bytes);
  bytes
    .into_iter()
    .map(|b| ALPHANUMERIC[b as usize % ALPHANUMERIC.len()] as char)
    .collect()
}

/// Region prefix of a zone name: "fr-par-1" becomes "fr-par". Names with
/// fewer than two dash-separated segments come back unchanged.
pub fn region_of(zone: &str) -> String {
  let mut parts = zone.splitn(3, '-');
  match (parts.next(), parts.next()) {
    (Some(country), Some(city)) => format!("{country}-{city}"),
    _ => zone.to_owned(),
  }
}
