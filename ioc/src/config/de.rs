// Custom deserialization helpers for the raw document structs.

use serde::{Deserialize, Deserializer};

/// Distinguishes an explicit `null` from a missing key.
///
/// Paired with `#[serde(default)]`: a missing key stays `None`, while a key
/// present with `null` becomes `Some(Null)`.
pub(crate) fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de>,
{
  T::deserialize(deserializer).map(Some)
}
