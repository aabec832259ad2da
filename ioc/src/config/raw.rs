// Serde mirror of a container document. Nodes stay as `serde_json::Value`
// until processing so each one can be reported with its own path.

use super::de::present;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// A parsed container document, before any component is built.
#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct Document {
  /// Document-scoped type names, checked before the class registry.
  #[serde(default)]
  pub type_aliases: IndexMap<String, String>,
  #[serde(default)]
  pub components: IndexMap<String, JsonValue>,
}

// --- Directive nodes ---

#[derive(Debug, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub(crate) struct DirectiveRaw {
  // Base directives: exactly one group must be present.
  #[serde(default, deserialize_with = "present")]
  pub value: Option<JsonValue>,
  #[serde(default, rename = "ref")]
  pub reference: Option<String>,
  #[serde(default)]
  pub constructor: Option<String>,
  #[serde(default, rename = "type")]
  pub type_name: Option<String>,
  #[serde(default, deserialize_with = "present")]
  pub instance: Option<JsonValue>,
  #[serde(default)]
  pub factory: Option<String>,
  #[serde(default)]
  pub parameters: Option<Vec<JsonValue>>,
  #[serde(default)]
  pub list: Option<Vec<JsonValue>>,
  #[serde(default)]
  pub set: Option<Vec<JsonValue>>,
  #[serde(default)]
  pub map: Option<MapRaw>,
  #[serde(default, rename = "if", deserialize_with = "present")]
  pub condition: Option<JsonValue>,
  #[serde(default, deserialize_with = "present")]
  pub then: Option<JsonValue>,
  #[serde(default, rename = "else", deserialize_with = "present")]
  pub otherwise: Option<JsonValue>,
  #[serde(default)]
  pub custom: Option<String>,

  // Modifiers
  #[serde(default)]
  pub locals: IndexMap<String, JsonValue>,
  #[serde(default)]
  pub properties: IndexMap<String, JsonValue>,
  #[serde(default)]
  pub setters: IndexMap<String, Vec<JsonValue>>,
  #[serde(default)]
  pub post_processors: Vec<String>,
  #[serde(default)]
  pub singleton: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub(crate) enum MapRaw {
  Keyed(IndexMap<String, JsonValue>),
  Entries(Vec<EntryRaw>),
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct EntryRaw {
  pub key: JsonValue,
  pub value: JsonValue,
}
