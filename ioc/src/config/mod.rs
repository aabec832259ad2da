//! Container documents: JSON or YAML descriptions of a set of components.
//!
//! A document maps ids to nodes. Scalars and arrays stand for themselves;
//! objects are directives (`constructor`, `ref`, `if`, ...) optionally carrying
//! modifiers (`properties`, `setters`, `postProcessors`, `singleton`, `locals`).
//! Documents are parsed into a [`Document`] first and then processed into
//! components by a [`ContainerFactory`].

mod de;
mod processed;
mod raw;

pub use raw::Document;

use crate::class::ClassRegistry;
use crate::component::{CustomComponent, PostProcessor};
use crate::container::Container;
use crate::error::Result;
use processed::DocumentProcessor;
use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use tracing::debug;

/// Builds containers from documents.
///
/// Type names in a document resolve through the factory's [`ClassRegistry`];
/// `custom` and `postProcessors` names resolve through what was registered
/// with [`with_custom`](Self::with_custom) and
/// [`with_post_processor`](Self::with_post_processor).
///
/// ```
/// use std::sync::Arc;
/// use trellis_ioc::{ClassRegistry, ContainerFactory, Value};
///
/// let factory = ContainerFactory::new(Arc::new(ClassRegistry::new()));
/// let container = factory
///   .from_json_str(r#"{ "components": { "greeting": { "constructor": "string", "parameters": ["hi"] } } }"#)
///   .unwrap();
/// assert_eq!(container.get_component("greeting").unwrap(), Value::from("hi"));
/// ```
#[derive(Clone)]
pub struct ContainerFactory {
  pub(crate) classes: Arc<ClassRegistry>,
  pub(crate) customs: HashMap<String, Arc<dyn CustomComponent>>,
  pub(crate) post_processors: HashMap<String, Arc<dyn PostProcessor>>,
}

impl ContainerFactory {
  pub fn new(classes: Arc<ClassRegistry>) -> Self {
    Self {
      classes,
      customs: HashMap::new(),
      post_processors: HashMap::new(),
    }
  }

  /// Makes `{"custom": name}` produce through `custom`.
  pub fn with_custom(mut self, name: impl Into<String>, custom: impl CustomComponent + 'static) -> Self {
    self.customs.insert(name.into(), Arc::new(custom));
    self
  }

  /// Makes `name` usable in a node's `postProcessors` list.
  pub fn with_post_processor(mut self, name: impl Into<String>, processor: impl PostProcessor + 'static) -> Self {
    self.post_processors.insert(name.into(), Arc::new(processor));
    self
  }

  pub fn classes(&self) -> &Arc<ClassRegistry> {
    &self.classes
  }

  pub fn from_json_str(&self, json: &str) -> Result<Container> {
    let document: Document = serde_json::from_str(json)?;
    self.create(&document)
  }

  pub fn from_json_reader(&self, reader: impl Read) -> Result<Container> {
    let document: Document = serde_json::from_reader(reader)?;
    self.create(&document)
  }

  #[cfg(feature = "yaml")]
  pub fn from_yaml_str(&self, yaml: &str) -> Result<Container> {
    let document: Document = serde_yaml::from_str(yaml)?;
    self.create(&document)
  }

  /// Builds a fresh container holding every component of `document`.
  pub fn create(&self, document: &Document) -> Result<Container> {
    let container = Container::new();
    self.populate(&container, document)?;
    Ok(container)
  }

  /// Registers every component of `document` into an existing container.
  ///
  /// All nodes are processed before anything is registered, so a faulty
  /// document leaves `container` untouched unless an id is already taken.
  pub fn populate(&self, container: &Container, document: &Document) -> Result<()> {
    let components = DocumentProcessor::new(self, container, document).components(document)?;
    let count = components.len();
    for (id, component) in components {
      container.add_component(id, component)?;
    }
    debug!(components = count, aliases = document.type_aliases.len(), "Loaded container document");
    Ok(())
  }
}
