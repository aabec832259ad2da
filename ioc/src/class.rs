//! Classes: the registry of callable signatures behind every invocation.
//!
//! Rust has no runtime reflection, so each type that components may construct
//! or call into is described up front with a [`ClassBuilder`]. The builder
//! records constructors, static members, instance methods and properties,
//! each with the parameter types used for overload selection and the return
//! type used for declared-type inference.

use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::{Object, Value};
use dashmap::DashMap;
use indexmap::{IndexMap, IndexSet};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

pub(crate) type StaticFn = Arc<dyn Fn(&Arc<Class>, &Args<'_>) -> Result<Value> + Send + Sync>;
pub(crate) type MethodFn = Arc<dyn Fn(&Value, &Args<'_>) -> Result<Value> + Send + Sync>;

/// Parameter and return types of a single member.
#[derive(Debug, Clone)]
pub struct Signature {
  params: Vec<Type>,
  variadic: Option<Type>,
  returns: Type,
}

impl Signature {
  pub fn new(params: &[Type], returns: Type) -> Self {
    Self {
      params: params.to_vec(),
      variadic: None,
      returns,
    }
  }

  /// Accepts any number of trailing arguments assignable to `rest`.
  pub fn variadic(params: &[Type], rest: Type, returns: Type) -> Self {
    Self {
      params: params.to_vec(),
      variadic: Some(rest),
      returns,
    }
  }

  pub fn params(&self) -> &[Type] {
    &self.params
  }

  pub fn rest(&self) -> Option<&Type> {
    self.variadic.as_ref()
  }

  pub fn returns(&self) -> &Type {
    &self.returns
  }

  pub fn accepts_arity(&self, arity: usize) -> bool {
    match self.variadic {
      Some(_) => arity >= self.params.len(),
      None => arity == self.params.len(),
    }
  }

  /// Parameter type expected at position `index`, following the variadic tail.
  pub(crate) fn param_at(&self, index: usize) -> Option<&Type> {
    self.params.get(index).or(self.variadic.as_ref())
  }
}

impl fmt::Display for Signature {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in self.params.iter().enumerate() {
      if i > 0 {
        f.write_str(", ")?;
      }
      write!(f, "{p}")?;
    }
    if let Some(rest) = &self.variadic {
      if !self.params.is_empty() {
        f.write_str(", ")?;
      }
      write!(f, "{rest}...")?;
    }
    write!(f, ") -> {}", self.returns)
  }
}

pub(crate) struct Member<F> {
  pub(crate) signature: Signature,
  pub(crate) body: F,
}

/// The members of one type, built by [`ClassBuilder`].
pub struct Class {
  ty: Type,
  pub(crate) constructors: Vec<Member<StaticFn>>,
  pub(crate) statics: HashMap<String, Vec<Member<StaticFn>>>,
  pub(crate) methods: HashMap<String, Vec<Member<MethodFn>>>,
  pub(crate) properties: HashMap<String, Member<MethodFn>>,
}

impl Class {
  pub fn ty(&self) -> &Type {
    &self.ty
  }

  pub fn name(&self) -> &str {
    self.ty.name()
  }

  pub fn has_property(&self, name: &str) -> bool {
    self.properties.contains_key(name)
  }

  /// Wraps `value` as an instance of this class.
  pub fn instantiate<T: Any + Send + Sync>(self: &Arc<Self>, value: T) -> Value {
    Value::Object(Object::new(self.clone(), value))
  }
}

impl fmt::Debug for Class {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Class")
      .field("name", &self.ty.name())
      .field("constructors", &self.constructors.len())
      .field("statics", &self.statics.keys().collect::<Vec<_>>())
      .field("methods", &self.methods.keys().collect::<Vec<_>>())
      .field("properties", &self.properties.keys().collect::<Vec<_>>())
      .finish()
  }
}

/// Describes the members of a Rust type `T` so components can build and call it.
///
/// Methods and properties downcast their receiver to `T`. A subtype declared
/// with a different Rust type inherits their lookup but not their use: calling
/// an inherited member on it fails with [`Error::TypeMismatch`]. Subtypes that
/// should share members either reuse `T` or declare the members again.
///
/// ```
/// use trellis_ioc::{ClassBuilder, Type, Value};
///
/// #[derive(Default)]
/// struct Counter { count: i64 }
///
/// let counter = ClassBuilder::<Counter>::named("Counter")
///   .constructor(&[], |_| Ok(Counter::default()))
///   .property("count", Type::int(), |c, args| {
///     c.count = args.int(0)?;
///     Ok(())
///   })
///   .method("get", &[], Type::int(), |c, _| Ok(Value::Int(c.count)))
///   .build();
///
/// assert_eq!(counter.name(), "Counter");
/// ```
pub struct ClassBuilder<T> {
  ty: Type,
  constructors: Vec<Member<StaticFn>>,
  statics: HashMap<String, Vec<Member<StaticFn>>>,
  methods: HashMap<String, Vec<Member<MethodFn>>>,
  properties: HashMap<String, Member<MethodFn>>,
  _marker: PhantomData<fn() -> T>,
}

impl<T> ClassBuilder<T> {
  /// Starts describing the members of `ty`.
  pub fn new(ty: &Type) -> Self {
    Self {
      ty: ty.clone(),
      constructors: Vec::new(),
      statics: HashMap::new(),
      methods: HashMap::new(),
      properties: HashMap::new(),
      _marker: PhantomData,
    }
  }

  /// Starts describing a fresh type named `name` with no supertypes.
  pub fn named(name: impl Into<String>) -> Self {
    Self::new(&Type::new(name, []))
  }

  /// The type being described, usable in member signatures that refer to it.
  pub fn ty(&self) -> &Type {
    &self.ty
  }

  // --- Untyped members (built-ins and hand-rolled values) ---

  pub(crate) fn raw_constructor(mut self, signature: Signature, body: StaticFn) -> Self {
    self.constructors.push(Member { signature, body });
    self
  }

  pub(crate) fn raw_static(mut self, name: &str, signature: Signature, body: StaticFn) -> Self {
    self
      .statics
      .entry(name.to_owned())
      .or_default()
      .push(Member { signature, body });
    self
  }

  pub(crate) fn raw_method(mut self, name: &str, signature: Signature, body: MethodFn) -> Self {
    self
      .methods
      .entry(name.to_owned())
      .or_default()
      .push(Member { signature, body });
    self
  }

  /// Registers a static member returning an arbitrary value.
  pub fn static_method<F>(self, name: &str, params: &[Type], returns: Type, f: F) -> Self
  where
    F: Fn(&Args<'_>) -> Result<Value> + Send + Sync + 'static,
  {
    self.raw_static(name, Signature::new(params, returns), Arc::new(move |_: &Arc<Class>, args: &Args<'_>| f(args)))
  }

  /// Registers a variadic static member; trailing arguments must be assignable to `rest`.
  pub fn static_variadic<F>(self, name: &str, params: &[Type], rest: Type, returns: Type, f: F) -> Self
  where
    F: Fn(&Args<'_>) -> Result<Value> + Send + Sync + 'static,
  {
    self.raw_static(
      name,
      Signature::variadic(params, rest, returns),
      Arc::new(move |_: &Arc<Class>, args: &Args<'_>| f(args)),
    )
  }

  pub fn build(self) -> Arc<Class> {
    let class = Arc::new(Class {
      ty: self.ty,
      constructors: self.constructors,
      statics: self.statics,
      methods: self.methods,
      properties: self.properties,
    });
    class.ty.attach_class(&class);
    debug!(class = %class.ty, "Built class");
    class
  }
}

impl<T: Any + Send + Sync> ClassBuilder<T> {
  /// Registers a constructor producing a new `T`.
  pub fn constructor<F>(self, params: &[Type], f: F) -> Self
  where
    F: Fn(&Args<'_>) -> Result<T> + Send + Sync + 'static,
  {
    let returns = self.ty.clone();
    self.raw_constructor(
      Signature::new(params, returns),
      Arc::new(move |class: &Arc<Class>, args: &Args<'_>| Ok(class.instantiate(f(args)?))),
    )
  }

  /// Registers a static factory producing a new `T`.
  pub fn factory<F>(self, name: &str, params: &[Type], f: F) -> Self
  where
    F: Fn(&Args<'_>) -> Result<T> + Send + Sync + 'static,
  {
    let returns = self.ty.clone();
    self.raw_static(
      name,
      Signature::new(params, returns),
      Arc::new(move |class: &Arc<Class>, args: &Args<'_>| Ok(class.instantiate(f(args)?))),
    )
  }

  /// Registers an instance method. The receiver is borrowed mutably for the call.
  pub fn method<F>(self, name: &str, params: &[Type], returns: Type, f: F) -> Self
  where
    F: Fn(&mut T, &Args<'_>) -> Result<Value> + Send + Sync + 'static,
  {
    let ty = self.ty.clone();
    self.raw_method(
      name,
      Signature::new(params, returns),
      Arc::new(move |receiver: &Value, args: &Args<'_>| {
        with_receiver(&ty, receiver, |this: &mut T| f(this, args))
      }),
    )
  }

  /// Registers a writable property. The setter receives a single argument of type `ty`.
  pub fn property<F>(mut self, name: &str, ty: Type, f: F) -> Self
  where
    F: Fn(&mut T, &Args<'_>) -> Result<()> + Send + Sync + 'static,
  {
    let owner = self.ty.clone();
    let body: MethodFn = Arc::new(move |receiver: &Value, args: &Args<'_>| {
      with_receiver(&owner, receiver, |this: &mut T| f(this, args))?;
      Ok(Value::Null)
    });
    self.properties.insert(
      name.to_owned(),
      Member {
        signature: Signature::new(&[ty], Type::null()),
        body,
      },
    );
    self
  }
}

fn with_receiver<T: Any, R>(owner: &Type, receiver: &Value, f: impl FnOnce(&mut T) -> Result<R>) -> Result<R> {
  let mut guard = receiver
    .as_object()
    .and_then(|o| o.write::<T>())
    .ok_or_else(|| Error::mismatch(owner, receiver.type_of()))?;
  f(&mut *guard)
}

/// Positional arguments handed to a member body, already checked against its signature.
pub struct Args<'a> {
  member: &'a str,
  values: &'a [Value],
}

impl<'a> Args<'a> {
  pub(crate) fn new(member: &'a str, values: &'a [Value]) -> Self {
    Self { member, values }
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  pub fn as_slice(&self) -> &'a [Value] {
    self.values
  }

  pub fn iter(&self) -> std::slice::Iter<'a, Value> {
    self.values.iter()
  }

  pub fn get(&self, index: usize) -> Result<&'a Value> {
    self.values.get(index).ok_or_else(|| {
      Error::msg(format!(
        "'{}' expected an argument at position {index}, got {}",
        self.member,
        self.values.len()
      ))
    })
  }

  fn typed<R>(&self, index: usize, expected: &str, pick: impl FnOnce(&'a Value) -> Option<R>) -> Result<R> {
    let value = self.get(index)?;
    pick(value).ok_or_else(|| {
      Error::mismatch(
        format!("{expected} at argument {index} of '{}'", self.member),
        value.type_of(),
      )
    })
  }

  pub fn bool(&self, index: usize) -> Result<bool> {
    self.typed(index, "bool", Value::as_bool)
  }

  pub fn int(&self, index: usize) -> Result<i64> {
    self.typed(index, "int", Value::as_int)
  }

  /// Reads a float, widening an integer argument.
  pub fn float(&self, index: usize) -> Result<f64> {
    self.typed(index, "float", Value::as_float)
  }

  pub fn str(&self, index: usize) -> Result<&'a str> {
    self.typed(index, "string", Value::as_str)
  }

  pub fn string(&self, index: usize) -> Result<String> {
    self.str(index).map(str::to_owned)
  }

  pub fn list(&self, index: usize) -> Result<&'a Arc<Vec<Value>>> {
    self.typed(index, "list", Value::as_list)
  }

  pub fn set(&self, index: usize) -> Result<&'a Arc<IndexSet<Value>>> {
    self.typed(index, "set", Value::as_set)
  }

  pub fn map(&self, index: usize) -> Result<&'a Arc<IndexMap<Value, Value>>> {
    self.typed(index, "map", Value::as_map)
  }

  pub fn object(&self, index: usize) -> Result<&'a Object> {
    self.typed(index, "object", Value::as_object)
  }
}

/// A concurrent name → class table, pre-loaded with the built-in classes.
///
/// The document factory resolves the type names it meets through this registry.
pub struct ClassRegistry {
  classes: DashMap<String, Arc<Class>>,
  aliases: DashMap<String, String>,
}

impl Default for ClassRegistry {
  fn default() -> Self {
    let registry = Self {
      classes: DashMap::new(),
      aliases: DashMap::new(),
    };
    for ty in Type::builtins() {
      if let Some(class) = ty.class() {
        registry.classes.insert(ty.name().to_owned(), class);
      }
    }
    registry
  }
}

impl ClassRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Registers `class` under its type name, replacing any previous class of that name.
  pub fn register(&self, class: Arc<Class>) {
    debug!(class = %class.ty(), "Registered class");
    self.classes.insert(class.name().to_owned(), class);
  }

  /// Makes `alias` resolve to the class registered as `target`.
  pub fn register_alias(&self, alias: impl Into<String>, target: impl Into<String>) {
    self.aliases.insert(alias.into(), target.into());
  }

  pub fn get(&self, name: &str) -> Option<Arc<Class>> {
    let resolved = self.aliases.get(name).map(|a| a.value().clone());
    let name = resolved.as_deref().unwrap_or(name);
    self.classes.get(name).map(|c| c.value().clone())
  }

  pub fn contains(&self, name: &str) -> bool {
    self.get(name).is_some()
  }
}
