//! Dynamic values produced by components.

use crate::class::Class;
use crate::types::Type;
use indexmap::{IndexMap, IndexSet};
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A value produced by a [`Component`](crate::Component).
///
/// Scalars are stored inline; strings, collections and objects are shared
/// behind an `Arc`, so cloning a `Value` never copies its contents and
/// [`Value::ptr_eq`] can tell a replayed singleton from a fresh instance.
#[derive(Clone, Default)]
pub enum Value {
  #[default]
  Null,
  Bool(bool),
  Int(i64),
  Float(f64),
  Str(Arc<str>),
  List(Arc<Vec<Value>>),
  Set(Arc<IndexSet<Value>>),
  Map(Arc<IndexMap<Value, Value>>),
  Object(Object),
}

impl Value {
  pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
    Value::List(Arc::new(items.into_iter().collect()))
  }

  pub fn set(items: impl IntoIterator<Item = Value>) -> Self {
    Value::Set(Arc::new(items.into_iter().collect()))
  }

  pub fn map(entries: impl IntoIterator<Item = (Value, Value)>) -> Self {
    Value::Map(Arc::new(entries.into_iter().collect()))
  }

  /// The runtime type of this value.
  pub fn type_of(&self) -> Type {
    match self {
      Value::Null => Type::null(),
      Value::Bool(_) => Type::bool(),
      Value::Int(_) => Type::int(),
      Value::Float(_) => Type::float(),
      Value::Str(_) => Type::string(),
      Value::List(_) => Type::list(),
      Value::Set(_) => Type::set(),
      Value::Map(_) => Type::map(),
      Value::Object(o) => o.ty().clone(),
    }
  }

  /// Reference identity: `true` when both values are the very same instance.
  ///
  /// Scalars have no identity and compare by value.
  pub fn ptr_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
      (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
      (Value::Set(a), Value::Set(b)) => Arc::ptr_eq(a, b),
      (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
      (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
      (a, b) => a == b,
    }
  }

  pub fn is_null(&self) -> bool {
    matches!(self, Value::Null)
  }

  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Value::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_int(&self) -> Option<i64> {
    match self {
      Value::Int(i) => Some(*i),
      _ => None,
    }
  }

  /// Returns the value as a float, widening integers.
  pub fn as_float(&self) -> Option<f64> {
    match self {
      Value::Float(f) => Some(*f),
      Value::Int(i) => Some(*i as f64),
      _ => None,
    }
  }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Value::Str(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_list(&self) -> Option<&Arc<Vec<Value>>> {
    match self {
      Value::List(l) => Some(l),
      _ => None,
    }
  }

  pub fn as_set(&self) -> Option<&Arc<IndexSet<Value>>> {
    match self {
      Value::Set(s) => Some(s),
      _ => None,
    }
  }

  pub fn as_map(&self) -> Option<&Arc<IndexMap<Value, Value>>> {
    match self {
      Value::Map(m) => Some(m),
      _ => None,
    }
  }

  pub fn as_object(&self) -> Option<&Object> {
    match self {
      Value::Object(o) => Some(o),
      _ => None,
    }
  }
}

impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Null, Value::Null) => true,
      (Value::Bool(a), Value::Bool(b)) => a == b,
      (Value::Int(a), Value::Int(b)) => a == b,
      (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
      (Value::Str(a), Value::Str(b)) => a == b,
      (Value::List(a), Value::List(b)) => a == b,
      (Value::Set(a), Value::Set(b)) => a == b,
      (Value::Map(a), Value::Map(b)) => a == b,
      (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
      _ => false,
    }
  }
}

impl Eq for Value {}

impl Hash for Value {
  fn hash<H: Hasher>(&self, state: &mut H) {
    std::mem::discriminant(self).hash(state);
    match self {
      Value::Null => {}
      Value::Bool(b) => b.hash(state),
      Value::Int(i) => i.hash(state),
      Value::Float(f) => f.to_bits().hash(state),
      Value::Str(s) => s.hash(state),
      Value::List(l) => l.hash(state),
      // Set and map equality ignores order, so only the size may be hashed.
      Value::Set(s) => s.len().hash(state),
      Value::Map(m) => m.len().hash(state),
      Value::Object(o) => (Arc::as_ptr(&o.data) as *const () as usize).hash(state),
    }
  }
}

impl fmt::Debug for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Null => f.write_str("Null"),
      Value::Bool(b) => write!(f, "Bool({b})"),
      Value::Int(i) => write!(f, "Int({i})"),
      Value::Float(x) => write!(f, "Float({x:?})"),
      Value::Str(s) => write!(f, "Str({s:?})"),
      Value::List(l) => f.debug_list().entries(l.iter()).finish(),
      Value::Set(s) => f.debug_set().entries(s.iter()).finish(),
      Value::Map(m) => f.debug_map().entries(m.iter()).finish(),
      Value::Object(o) => fmt::Debug::fmt(o, f),
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn join<'a>(f: &mut fmt::Formatter<'_>, items: impl Iterator<Item = &'a Value>) -> fmt::Result {
      for (i, item) in items.enumerate() {
        if i > 0 {
          f.write_str(", ")?;
        }
        write!(f, "{item}")?;
      }
      Ok(())
    }

    match self {
      Value::Null => f.write_str("null"),
      Value::Bool(b) => write!(f, "{b}"),
      Value::Int(i) => write!(f, "{i}"),
      Value::Float(x) => write!(f, "{x}"),
      Value::Str(s) => f.write_str(s),
      Value::List(l) => {
        f.write_str("[")?;
        join(f, l.iter())?;
        f.write_str("]")
      }
      Value::Set(s) => {
        f.write_str("[")?;
        join(f, s.iter())?;
        f.write_str("]")
      }
      Value::Map(m) => {
        f.write_str("{")?;
        for (i, (k, v)) in m.iter().enumerate() {
          if i > 0 {
            f.write_str(", ")?;
          }
          write!(f, "{k}={v}")?;
        }
        f.write_str("}")
      }
      Value::Object(o) => write!(f, "{}@{:p}", o.ty(), Arc::as_ptr(&o.data)),
    }
  }
}

impl From<bool> for Value {
  fn from(b: bool) -> Self {
    Value::Bool(b)
  }
}
impl From<i32> for Value {
  fn from(i: i32) -> Self {
    Value::Int(i64::from(i))
  }
}
impl From<i64> for Value {
  fn from(i: i64) -> Self {
    Value::Int(i)
  }
}
impl From<f64> for Value {
  fn from(f: f64) -> Self {
    Value::Float(f)
  }
}
impl From<&str> for Value {
  fn from(s: &str) -> Self {
    Value::Str(Arc::from(s))
  }
}
impl From<String> for Value {
  fn from(s: String) -> Self {
    Value::Str(Arc::from(s))
  }
}
impl From<Vec<Value>> for Value {
  fn from(items: Vec<Value>) -> Self {
    Value::List(Arc::new(items))
  }
}
impl From<Object> for Value {
  fn from(o: Object) -> Self {
    Value::Object(o)
  }
}
impl<T: Into<Value>> From<Option<T>> for Value {
  fn from(v: Option<T>) -> Self {
    v.map_or(Value::Null, Into::into)
  }
}

/// An instance of a user [`Class`], shared and mutable in place.
///
/// Property and setter injection mutate the object behind the lock and hand
/// back the same `Object`, so every holder observes the injected state.
#[derive(Clone)]
pub struct Object {
  class: Arc<Class>,
  data: Arc<RwLock<Box<dyn Any + Send + Sync>>>,
}

impl Object {
  pub fn new<T: Any + Send + Sync>(class: Arc<Class>, value: T) -> Self {
    Self {
      class,
      data: Arc::new(RwLock::new(Box::new(value))),
    }
  }

  pub fn class(&self) -> &Arc<Class> {
    &self.class
  }

  pub fn ty(&self) -> &Type {
    self.class.ty()
  }

  pub fn is<T: Any>(&self) -> bool {
    (**self.data.read()).is::<T>()
  }

  /// Borrows the inner value as `T`, or `None` if it holds another type.
  pub fn read<T: Any>(&self) -> Option<MappedRwLockReadGuard<'_, T>> {
    RwLockReadGuard::try_map(self.data.read(), |data| (**data).downcast_ref::<T>()).ok()
  }

  /// Mutably borrows the inner value as `T`, or `None` if it holds another type.
  pub fn write<T: Any>(&self) -> Option<MappedRwLockWriteGuard<'_, T>> {
    RwLockWriteGuard::try_map(self.data.write(), |data| (**data).downcast_mut::<T>()).ok()
  }

  pub fn ptr_eq(&self, other: &Object) -> bool {
    Arc::ptr_eq(&self.data, &other.data)
  }
}

impl fmt::Debug for Object {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Object({}@{:p})", self.ty(), Arc::as_ptr(&self.data))
  }
}
