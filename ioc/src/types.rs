//! Type descriptors used for overload matching and type-based lookup.

use crate::class::Class;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Kind {
  Null,
  Bool,
  Int,
  Float,
  Str,
  List,
  Set,
  Map,
  Any,
  Class,
}

impl Kind {
  /// Scalars cannot hold `null`.
  fn is_scalar(self) -> bool {
    matches!(self, Kind::Bool | Kind::Int | Kind::Float)
  }
}

struct TypeInfo {
  name: String,
  kind: Kind,
  supertypes: Vec<Type>,
  class: RwLock<Weak<Class>>,
}

/// Describes the shape of a [`Value`](crate::Value).
///
/// A `Type` is a cheap handle. Two types are equal when they have the same
/// name, so a type may be declared once and cloned wherever it is needed.
/// Classes attach themselves to their type when built, which lets a type
/// answer questions about its members without holding the class alive.
#[derive(Clone)]
pub struct Type(Arc<TypeInfo>);

struct BuiltinTypes {
  null: Type,
  bool: Type,
  int: Type,
  float: Type,
  string: Type,
  list: Type,
  set: Type,
  map: Type,
  any: Type,
}

static BUILTIN_TYPES: Lazy<BuiltinTypes> = Lazy::new(|| BuiltinTypes {
  null: Type::builtin("null", Kind::Null),
  bool: Type::builtin("bool", Kind::Bool),
  int: Type::builtin("int", Kind::Int),
  float: Type::builtin("float", Kind::Float),
  string: Type::builtin("string", Kind::Str),
  list: Type::builtin("list", Kind::List),
  set: Type::builtin("set", Kind::Set),
  map: Type::builtin("map", Kind::Map),
  any: Type::builtin("any", Kind::Any),
});

impl Type {
  fn builtin(name: &str, kind: Kind) -> Self {
    Type(Arc::new(TypeInfo {
      name: name.to_owned(),
      kind,
      supertypes: Vec::new(),
      class: RwLock::new(Weak::new()),
    }))
  }

  /// Declares a new class type extending (or implementing) `supertypes`.
  ///
  /// Supertypes drive assignability and type lookup. Members declared on a
  /// supertype's class are found for instances of this type too, but they can
  /// only run when the instance holds the same Rust type the supertype's
  /// [`ClassBuilder`](crate::ClassBuilder) was declared with. Otherwise the
  /// call fails with [`Error::TypeMismatch`](crate::Error::TypeMismatch).
  pub fn new(name: impl Into<String>, supertypes: impl IntoIterator<Item = Type>) -> Self {
    Type(Arc::new(TypeInfo {
      name: name.into(),
      kind: Kind::Class,
      supertypes: supertypes.into_iter().collect(),
      class: RwLock::new(Weak::new()),
    }))
  }

  /// Declares a member-less type, used purely as a lookup key for its implementors.
  pub fn interface(name: impl Into<String>) -> Self {
    Type::new(name, [])
  }

  pub fn null() -> Self {
    BUILTIN_TYPES.null.clone()
  }
  pub fn bool() -> Self {
    BUILTIN_TYPES.bool.clone()
  }
  pub fn int() -> Self {
    BUILTIN_TYPES.int.clone()
  }
  pub fn float() -> Self {
    BUILTIN_TYPES.float.clone()
  }
  pub fn string() -> Self {
    BUILTIN_TYPES.string.clone()
  }
  pub fn list() -> Self {
    BUILTIN_TYPES.list.clone()
  }
  pub fn set() -> Self {
    BUILTIN_TYPES.set.clone()
  }
  pub fn map() -> Self {
    BUILTIN_TYPES.map.clone()
  }
  /// The top type: every value is assignable to it.
  pub fn any() -> Self {
    BUILTIN_TYPES.any.clone()
  }

  pub(crate) fn builtins() -> [Type; 9] {
    let b = &*BUILTIN_TYPES;
    [
      b.null.clone(),
      b.bool.clone(),
      b.int.clone(),
      b.float.clone(),
      b.string.clone(),
      b.list.clone(),
      b.set.clone(),
      b.map.clone(),
      b.any.clone(),
    ]
  }

  pub fn name(&self) -> &str {
    &self.0.name
  }

  pub fn supertypes(&self) -> &[Type] {
    &self.0.supertypes
  }

  pub(crate) fn kind(&self) -> Kind {
    self.0.kind
  }

  /// The class describing this type's members, if one has been built and is still alive.
  pub fn class(&self) -> Option<Arc<Class>> {
    if self.0.kind != Kind::Class {
      crate::builtins::ensure_loaded();
    }
    self.0.class.read().upgrade()
  }

  /// Links the type to its most recently built class.
  pub(crate) fn attach_class(&self, class: &Arc<Class>) {
    *self.0.class.write() = Arc::downgrade(class);
  }

  /// Returns `true` when a value of type `other` may be used where `self` is expected.
  ///
  /// Covers identity, the `any` top type, `null` for non-scalar types,
  /// `int -> float` widening and (transitive) declared supertypes.
  pub fn is_assignable_from(&self, other: &Type) -> bool {
    if self == other {
      return true;
    }
    match (self.kind(), other.kind()) {
      (Kind::Any, _) => true,
      (target, Kind::Null) => !target.is_scalar(),
      (Kind::Float, Kind::Int) => true,
      _ => other.supertypes().iter().any(|s| self.is_assignable_from(s)),
    }
  }

  /// Returns `true` when `self` is `ancestor`, `ancestor` is `any`, or `self`
  /// (transitively) declares `ancestor` as a supertype.
  ///
  /// Unlike [`is_assignable_from`](Type::is_assignable_from) there is no
  /// numeric widening and no `null` rule: an `int` is not a `float`.
  pub fn is_subtype_of(&self, ancestor: &Type) -> bool {
    self == ancestor
      || ancestor.kind() == Kind::Any
      || self.supertypes().iter().any(|s| s.is_subtype_of(ancestor))
  }
}

impl PartialEq for Type {
  fn eq(&self, other: &Self) -> bool {
    Arc::ptr_eq(&self.0, &other.0) || (self.0.kind == other.0.kind && self.0.name == other.0.name)
  }
}

impl Eq for Type {}

impl Hash for Type {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.0.name.hash(state);
  }
}

impl fmt::Debug for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Type({})", self.0.name)
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0.name)
  }
}
