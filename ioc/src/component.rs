//! Components: lazy, composable recipes for values.

use crate::class::Class;
use crate::container::{Container, Registry};
use crate::core::SingletonCell;
use crate::error::{Error, Result};
use crate::invoke;
use crate::types::Type;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::sync::{Arc, Weak};

/// A user-supplied recipe, for values none of the built-in variants can express.
pub trait CustomComponent: Send + Sync {
  fn produce(&self) -> Result<Value>;

  /// The type [`produce`](CustomComponent::produce) would return, if known without producing.
  fn declared_type(&self) -> Option<Type> {
    None
  }
}

/// A hook run on a freshly built object before it is handed out.
///
/// Post-processors work in place: the object keeps its identity and type.
pub trait PostProcessor: Send + Sync {
  fn process(&self, object: &Value) -> Result<()>;
}

impl<F> PostProcessor for F
where
  F: Fn(&Value) -> Result<()> + Send + Sync,
{
  fn process(&self, object: &Value) -> Result<()> {
    self(object)
  }
}

type TransformFn = Arc<dyn Fn(Value) -> Result<Value> + Send + Sync>;

enum Mapper {
  Transform { f: TransformFn, output: Option<Type> },
  Property { name: String, value: Component },
  Setter { name: String, args: Vec<Component> },
  PostProcess(Arc<dyn PostProcessor>),
}

impl Mapper {
  /// Injections mutate the object in place and hand back the same reference.
  fn is_injection(&self) -> bool {
    !matches!(self, Mapper::Transform { .. })
  }

  fn apply(&self, object: Value) -> Result<Value> {
    match self {
      Mapper::Transform { f, .. } => f(object),
      Mapper::Property { name, value } => {
        invoke::set_property(&object, name, value.produce()?)?;
        Ok(object)
      }
      Mapper::Setter { name, args } => {
        let args = produce_all(args)?;
        invoke::call_method(&object, name, &args)?;
        Ok(object)
      }
      Mapper::PostProcess(processor) => {
        processor.process(&object)?;
        Ok(object)
      }
    }
  }
}

enum Node {
  Value(Value),
  Construct {
    class: Arc<Class>,
    args: Vec<Component>,
  },
  Static {
    class: Arc<Class>,
    name: String,
    args: Vec<Component>,
  },
  Instance {
    instance: Component,
    name: String,
    args: Vec<Component>,
  },
  Mapped {
    inner: Component,
    mapper: Mapper,
  },
  Singleton {
    inner: Component,
    cell: SingletonCell,
  },
  Reference {
    registry: Weak<Registry>,
    id: String,
  },
  Conditional {
    condition: Component,
    then: Component,
    otherwise: Component,
  },
  List(Vec<Component>),
  Set(Vec<Component>),
  Map(Vec<(Component, Component)>),
  Custom(Arc<dyn CustomComponent>),
}

/// A lazy recipe for a [`Value`].
///
/// A component never builds anything until [`produce`](Component::produce) is
/// called, and can always report the type it would build through
/// [`declared_type`](Component::declared_type). Cloning a component is cheap
/// and shares the recipe, including the cache of a singleton.
#[derive(Clone)]
pub struct Component(Arc<Node>);

fn produce_all(components: &[Component]) -> Result<Vec<Value>> {
  components.iter().map(Component::produce).collect()
}

impl Component {
  fn new(node: Node) -> Self {
    Component(Arc::new(node))
  }

  // --- Leaves and invocations ---

  /// Always produces `value` itself.
  pub fn value(value: impl Into<Value>) -> Self {
    Self::new(Node::Value(value.into()))
  }

  /// Invokes the constructor of `class` matching the produced `params`.
  pub fn constructor(class: &Arc<Class>, params: impl IntoIterator<Item = Component>) -> Self {
    Self::new(Node::Construct {
      class: class.clone(),
      args: params.into_iter().collect(),
    })
  }

  /// Invokes the static member `name` of `class` matching the produced `params`.
  pub fn static_factory(
    class: &Arc<Class>,
    name: impl Into<String>,
    params: impl IntoIterator<Item = Component>,
  ) -> Self {
    Self::new(Node::Static {
      class: class.clone(),
      name: name.into(),
      args: params.into_iter().collect(),
    })
  }

  /// Invokes the method `name` on the value produced by `instance`.
  pub fn instance_factory(
    instance: Component,
    name: impl Into<String>,
    params: impl IntoIterator<Item = Component>,
  ) -> Self {
    Self::new(Node::Instance {
      instance,
      name: name.into(),
      args: params.into_iter().collect(),
    })
  }

  /// Defers to the component registered as `id` in `container`.
  ///
  /// The id need not be registered yet; it is looked up on every production.
  /// The reference does not keep the container alive.
  pub fn reference(container: &Container, id: impl Into<String>) -> Self {
    Self::new(Node::Reference {
      registry: container.downgrade(),
      id: id.into(),
    })
  }

  /// Produces `then` or `otherwise` depending on the boolean produced by `condition`.
  pub fn conditional(condition: Component, then: Component, otherwise: Component) -> Self {
    Self::new(Node::Conditional {
      condition,
      then,
      otherwise,
    })
  }

  // --- Aggregates ---

  pub fn list_of(items: impl IntoIterator<Item = Component>) -> Self {
    Self::new(Node::List(items.into_iter().collect()))
  }

  pub fn set_of(items: impl IntoIterator<Item = Component>) -> Self {
    Self::new(Node::Set(items.into_iter().collect()))
  }

  /// Builds a map whose keys are produced by components too.
  ///
  /// Entries are evaluated in order; when two keys come out equal the later
  /// value wins.
  pub fn map_of(entries: impl IntoIterator<Item = (Component, Component)>) -> Self {
    Self::new(Node::Map(entries.into_iter().collect()))
  }

  pub fn custom(custom: impl CustomComponent + 'static) -> Self {
    Self::custom_shared(Arc::new(custom))
  }

  pub fn custom_shared(custom: Arc<dyn CustomComponent>) -> Self {
    Self::new(Node::Custom(custom))
  }

  // --- Combinators ---

  /// Transforms the produced value. The declared type is assumed unchanged.
  pub fn map<F>(self, f: F) -> Self
  where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
  {
    self.mapped(Mapper::Transform {
      f: Arc::new(f),
      output: None,
    })
  }

  /// Transforms the produced value into one of type `output`.
  pub fn map_as<F>(self, output: Type, f: F) -> Self
  where
    F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
  {
    self.mapped(Mapper::Transform {
      f: Arc::new(f),
      output: Some(output),
    })
  }

  /// Assigns the property `name` of the produced object.
  pub fn set_property(self, name: impl Into<String>, value: Component) -> Self {
    self.mapped(Mapper::Property {
      name: name.into(),
      value,
    })
  }

  /// Calls the setter-style method `name` on the produced object, keeping the object.
  pub fn invoke_setter(self, name: impl Into<String>, params: impl IntoIterator<Item = Component>) -> Self {
    self.mapped(Mapper::Setter {
      name: name.into(),
      args: params.into_iter().collect(),
    })
  }

  pub fn post_process(self, processor: impl PostProcessor + 'static) -> Self {
    self.post_process_shared(Arc::new(processor))
  }

  pub fn post_process_shared(self, processor: Arc<dyn PostProcessor>) -> Self {
    self.mapped(Mapper::PostProcess(processor))
  }

  /// Caches the first produced value and replays it on every later production.
  pub fn singleton(self) -> Self {
    Self::new(Node::Singleton {
      inner: self,
      cell: SingletonCell::new(),
    })
  }

  fn mapped(self, mapper: Mapper) -> Self {
    Self::new(Node::Mapped { inner: self, mapper })
  }

  pub fn is_singleton(&self) -> bool {
    matches!(*self.0, Node::Singleton { .. })
  }

  // --- The component contract ---

  /// Builds the value this component describes.
  pub fn produce(&self) -> Result<Value> {
    match &*self.0 {
      Node::Value(value) => Ok(value.clone()),
      Node::Construct { class, args } => invoke::construct(class, &produce_all(args)?),
      Node::Static { class, name, args } => invoke::call_static(class, name, &produce_all(args)?),
      Node::Instance { instance, name, args } => {
        let target = instance.produce()?;
        invoke::call_method(&target, name, &produce_all(args)?)
      }
      Node::Mapped { inner, mapper } => mapper.apply(inner.produce()?),
      Node::Singleton { inner, cell } => produce_singleton(inner, cell),
      Node::Reference { registry, id } => registry
        .upgrade()
        .ok_or_else(|| Error::ContainerDropped(id.clone()))?
        .resolve(id),
      Node::Conditional {
        condition,
        then,
        otherwise,
      } => match condition.produce()? {
        Value::Bool(true) => then.produce(),
        Value::Bool(false) => otherwise.produce(),
        other => Err(Error::mismatch("bool condition", other.type_of())),
      },
      Node::List(items) => Ok(Value::List(Arc::new(produce_all(items)?))),
      Node::Set(items) => {
        let mut set = IndexSet::with_capacity(items.len());
        for item in items {
          set.insert(item.produce()?);
        }
        Ok(Value::Set(Arc::new(set)))
      }
      Node::Map(entries) => {
        let mut map = IndexMap::with_capacity(entries.len());
        for (key, value) in entries {
          let key = key.produce()?;
          map.insert(key, value.produce()?);
        }
        Ok(Value::Map(Arc::new(map)))
      }
      Node::Custom(custom) => custom.produce(),
    }
  }

  /// The type [`produce`](Component::produce) would return, derived without building anything.
  ///
  /// `None` means the type cannot be determined statically, e.g. overloads
  /// with different return types or branches of different types.
  pub fn declared_type(&self) -> Option<Type> {
    match &*self.0 {
      Node::Value(value) => Some(value.type_of()),
      Node::Construct { class, .. } => Some(class.ty().clone()),
      Node::Static { class, name, args } => invoke::static_return_type(class, name, args.len()),
      Node::Instance { instance, name, args } => {
        invoke::method_return_type(&instance.declared_type()?, name, args.len())
      }
      Node::Mapped {
        mapper: Mapper::Transform {
          output: Some(output), ..
        },
        ..
      } => Some(output.clone()),
      Node::Mapped { inner, .. } | Node::Singleton { inner, .. } => inner.declared_type(),
      Node::Reference { registry, id } => registry.upgrade()?.declared_type(id),
      Node::Conditional { then, otherwise, .. } => {
        let ty = then.declared_type()?;
        (otherwise.declared_type()? == ty).then_some(ty)
      }
      Node::List(_) => Some(Type::list()),
      Node::Set(_) => Some(Type::set()),
      Node::Map(_) => Some(Type::map()),
      Node::Custom(custom) => custom.declared_type(),
    }
  }
}

/// Splits the singleton's recipe into the construction core and the in-place
/// injections stacked on top of it, so the core object can be exposed to
/// setter cycles while the injections run.
fn produce_singleton(inner: &Component, cell: &SingletonCell) -> Result<Value> {
  if let Some(value) = cell.get() {
    return Ok(value.clone());
  }

  let mut core = inner;
  let mut injections = Vec::new();
  while let Node::Mapped { inner, mapper } = &*core.0 {
    if !mapper.is_injection() {
      break;
    }
    injections.push(mapper);
    core = inner;
  }

  cell.get_or_build(
    || core.produce(),
    |object| {
      injections
        .iter()
        .rev()
        .try_fold(object, |object, mapper| mapper.apply(object))
    },
  )
}

impl fmt::Debug for Component {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &*self.0 {
      Node::Value(value) => write!(f, "Value({value:?})"),
      Node::Construct { class, args } => write!(f, "Constructor({}, {} args)", class.name(), args.len()),
      Node::Static { class, name, args } => {
        write!(f, "StaticFactory({}::{name}, {} args)", class.name(), args.len())
      }
      Node::Instance { instance, name, args } => {
        write!(f, "InstanceFactory({instance:?}.{name}, {} args)", args.len())
      }
      Node::Mapped { inner, mapper } => match mapper {
        Mapper::Transform { .. } => write!(f, "Map({inner:?})"),
        Mapper::Property { name, .. } => write!(f, "SetProperty({inner:?}.{name})"),
        Mapper::Setter { name, .. } => write!(f, "InvokeSetter({inner:?}.{name})"),
        Mapper::PostProcess(_) => write!(f, "PostProcess({inner:?})"),
      },
      Node::Singleton { inner, .. } => write!(f, "Singleton({inner:?})"),
      Node::Reference { id, .. } => write!(f, "Reference({id})"),
      Node::Conditional { .. } => f.write_str("Conditional"),
      Node::List(items) => write!(f, "List({} items)", items.len()),
      Node::Set(items) => write!(f, "Set({} items)", items.len()),
      Node::Map(entries) => write!(f, "Map({} entries)", entries.len()),
      Node::Custom(_) => f.write_str("Custom"),
    }
  }
}
