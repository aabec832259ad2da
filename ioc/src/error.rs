use crate::container::Lookup;
use thiserror::Error;

/// Boxed error produced by a member body, preserved as the `source` of an
/// [`Error::Invocation`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The main error type for the `trellis_ioc` library.
#[derive(Debug, Error)]
pub enum Error {
  #[error("Cannot register component '{id}': {reason}")]
  Registration { id: String, reason: String },

  #[error("No component registered for {0}")]
  NotFound(Lookup),

  #[error("Ambiguous {what}: {} candidates match ({})", .candidates.len(), .candidates.join(", "))]
  Ambiguous {
    what: String,
    candidates: Vec<String>,
  },

  #[error("No overload of '{member}' accepts ({args})")]
  NoMatchingMember { member: String, args: String },

  #[error("Invocation of '{member}' failed: {source}")]
  Invocation {
    member: String,
    #[source]
    source: BoxError,
  },

  #[error("Type mismatch: expected {expected}, found {found}")]
  TypeMismatch { expected: String, found: String },

  #[error("The container owning component '{0}' has been dropped")]
  ContainerDropped(String),

  #[error("Failed to parse container document: {0}")]
  Parse(#[from] serde_json::Error),

  #[cfg(feature = "yaml")]
  #[error("Failed to parse container document: {0}")]
  Yaml(#[from] serde_yaml::Error),

  #[error("Invalid component definition at '{path}': {message}")]
  InvalidDefinition { path: String, message: String },

  #[error("Unknown type: {0}")]
  UnknownType(String),

  #[error("{0}")]
  Message(String),
}

impl Error {
  /// Creates a free-form error, typically returned from a member body.
  pub fn msg(message: impl std::fmt::Display) -> Self {
    Error::Message(message.to_string())
  }

  pub(crate) fn mismatch(expected: impl std::fmt::Display, found: impl std::fmt::Display) -> Self {
    Error::TypeMismatch {
      expected: expected.to_string(),
      found: found.to_string(),
    }
  }
}

/// A specialized `Result` type for `trellis_ioc` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
