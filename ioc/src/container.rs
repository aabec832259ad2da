//! The main `Container` struct and its associated methods.

use crate::component::Component;
use crate::core::{InferenceGuard, ResolutionGuard, DEFAULT_MAX_DEPTH};
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// What a caller asks the container for: a component id or a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
  Id(String),
  Type(Type),
}

impl fmt::Display for Lookup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Lookup::Id(id) => write!(f, "id '{id}'"),
      Lookup::Type(ty) => write!(f, "type '{ty}'"),
    }
  }
}

impl From<&str> for Lookup {
  fn from(id: &str) -> Self {
    Lookup::Id(id.to_owned())
  }
}
impl From<String> for Lookup {
  fn from(id: String) -> Self {
    Lookup::Id(id)
  }
}
impl From<&String> for Lookup {
  fn from(id: &String) -> Self {
    Lookup::Id(id.clone())
  }
}
impl From<Type> for Lookup {
  fn from(ty: Type) -> Self {
    Lookup::Type(ty)
  }
}
impl From<&Type> for Lookup {
  fn from(ty: &Type) -> Self {
    Lookup::Type(ty.clone())
  }
}

pub(crate) struct Registry {
  components: DashMap<String, Component>,
  max_depth: usize,
}

impl Registry {
  fn lookup(&self, id: &str) -> Option<Component> {
    // Clone out of the map so no shard lock is held while producing.
    self.components.get(id).map(|c| c.value().clone())
  }

  pub(crate) fn resolve(&self, id: &str) -> Result<Value> {
    let component = self
      .lookup(id)
      .ok_or_else(|| Error::NotFound(Lookup::Id(id.to_owned())))?;
    let _guard = ResolutionGuard::enter(id, self.max_depth);
    trace!(id, "Resolving component");
    component.produce()
  }

  pub(crate) fn declared_type(&self, id: &str) -> Option<Type> {
    let component = self.lookup(id)?;
    let _guard = InferenceGuard::enter(self as *const Self as usize, id)?;
    component.declared_type()
  }

  fn resolve_type(&self, ty: &Type) -> Result<Value> {
    let ids: Vec<String> = self.components.iter().map(|e| e.key().clone()).collect();
    let mut matches: Vec<String> = ids
      .into_iter()
      .filter(|id| {
        self
          .declared_type(id)
          .is_some_and(|declared| declared != Type::null() && declared.is_subtype_of(ty))
      })
      .collect();
    matches.sort();

    match matches.as_slice() {
      [] => Err(Error::NotFound(Lookup::Type(ty.clone()))),
      [id] => {
        trace!(ty = %ty, id = %id, "Resolved type to component");
        self.resolve(id)
      }
      _ => Err(Error::Ambiguous {
        what: format!("lookup of type '{ty}'"),
        candidates: matches,
      }),
    }
  }
}

/// The Inversion of Control (IoC) container.
///
/// Holds the root components registered under unique ids. It is thread-safe
/// and cheap to clone; clones share the same registry. Components are only
/// built when requested, through [`get_component`](Container::get_component).
#[derive(Clone)]
pub struct Container {
  inner: Arc<Registry>,
}

impl Default for Container {
  fn default() -> Self {
    Self::with_max_depth(DEFAULT_MAX_DEPTH)
  }
}

impl Container {
  /// Creates a new, empty `Container`.
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates an empty container that panics once resolutions nest deeper than `max_depth`.
  pub fn with_max_depth(max_depth: usize) -> Self {
    Self {
      inner: Arc::new(Registry {
        components: DashMap::new(),
        max_depth,
      }),
    }
  }

  pub(crate) fn downgrade(&self) -> Weak<Registry> {
    Arc::downgrade(&self.inner)
  }

  // --- Registration ---

  /// Registers `component` as the root component for `id`.
  ///
  /// Fails if `id` is empty or already registered, or if `component` is `None`.
  /// An existing registration is never replaced.
  pub fn add_component(&self, id: impl Into<String>, component: impl Into<Option<Component>>) -> Result<()> {
    let id = id.into();
    let component = component.into().ok_or_else(|| Error::Registration {
      id: id.clone(),
      reason: "component is absent".to_owned(),
    })?;
    if id.is_empty() {
      return Err(Error::Registration {
        id,
        reason: "id must not be empty".to_owned(),
      });
    }

    match self.inner.components.entry(id) {
      Entry::Occupied(entry) => Err(Error::Registration {
        id: entry.key().clone(),
        reason: "id is already registered".to_owned(),
      }),
      Entry::Vacant(entry) => {
        debug!(id = %entry.key(), component = ?component, "Registered component");
        entry.insert(component);
        Ok(())
      }
    }
  }

  // --- Resolution ---

  /// Produces the component registered under an id, or the single component
  /// whose declared type is assignable to a type.
  ///
  /// ```
  /// use trellis_ioc::{Component, Container, Type, Value};
  ///
  /// let container = Container::new();
  /// container.add_component("greeting", Component::value("hello")).unwrap();
  ///
  /// assert_eq!(container.get_component("greeting").unwrap(), Value::from("hello"));
  /// assert_eq!(container.get_component(Type::string()).unwrap(), Value::from("hello"));
  /// ```
  pub fn get_component(&self, lookup: impl Into<Lookup>) -> Result<Value> {
    match lookup.into() {
      Lookup::Id(id) => self.inner.resolve(&id),
      Lookup::Type(ty) => self.inner.resolve_type(&ty),
    }
  }

  /// The component registered under `id`, without producing it.
  pub fn lookup(&self, id: &str) -> Option<Component> {
    self.inner.lookup(id)
  }

  /// The declared type of the component registered under `id`, without producing it.
  pub fn declared_type(&self, id: &str) -> Option<Type> {
    self.inner.declared_type(id)
  }

  /// A component deferring to whatever gets registered under `id`.
  pub fn reference(&self, id: impl Into<String>) -> Component {
    Component::reference(self, id)
  }

  pub fn contains(&self, id: &str) -> bool {
    self.inner.components.contains_key(id)
  }

  /// The registered ids, sorted.
  pub fn ids(&self) -> Vec<String> {
    let mut ids: Vec<String> = self.inner.components.iter().map(|e| e.key().clone()).collect();
    ids.sort();
    ids
  }

  pub fn len(&self) -> usize {
    self.inner.components.len()
  }

  pub fn is_empty(&self) -> bool {
    self.inner.components.is_empty()
  }
}

impl fmt::Debug for Container {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Container")
      .field("ids", &self.ids())
      .field("max_depth", &self.inner.max_depth)
      .finish()
  }
}
