// Turns raw document nodes into components.

use super::raw::{DirectiveRaw, Document, EntryRaw, MapRaw};
use super::ContainerFactory;
use crate::class::Class;
use crate::component::Component;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::value::Value;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Base directive keys, in the order they are reported on conflicts.
const BASES: [&str; 10] = [
  "value",
  "ref",
  "constructor",
  "type",
  "instance",
  "list",
  "set",
  "map",
  "if",
  "custom",
];

pub(crate) struct DocumentProcessor<'a> {
  factory: &'a ContainerFactory,
  container: &'a Container,
  aliases: &'a IndexMap<String, String>,
  // Innermost `locals` block last.
  scopes: Vec<IndexMap<String, Component>>,
}

impl<'a> DocumentProcessor<'a> {
  pub(crate) fn new(factory: &'a ContainerFactory, container: &'a Container, document: &'a Document) -> Self {
    Self {
      factory,
      container,
      aliases: &document.type_aliases,
      scopes: Vec::new(),
    }
  }

  /// Builds every root component of `document`, in document order.
  pub(crate) fn components(&mut self, document: &Document) -> Result<Vec<(String, Component)>> {
    document
      .components
      .iter()
      .map(|(id, node)| {
        let component = self.node(&format!("components.{id}"), node)?;
        Ok((id.clone(), component))
      })
      .collect()
  }

  fn node(&mut self, path: &str, node: &JsonValue) -> Result<Component> {
    match node {
      JsonValue::Array(items) => Ok(Component::list_of(self.nodes(path, items)?)),
      JsonValue::Object(_) => {
        let directive: DirectiveRaw = serde_json::from_value(node.clone()).map_err(|e| invalid(path, e))?;
        self.directive(path, directive)
      }
      scalar => literal(path, scalar).map(Component::value),
    }
  }

  fn nodes(&mut self, path: &str, nodes: &[JsonValue]) -> Result<Vec<Component>> {
    nodes
      .iter()
      .enumerate()
      .map(|(i, node)| self.node(&format!("{path}[{i}]"), node))
      .collect()
  }

  fn directive(&mut self, path: &str, raw: DirectiveRaw) -> Result<Component> {
    if raw.locals.is_empty() {
      return self.modified(path, raw);
    }

    self.scopes.push(IndexMap::new());
    let result = self.scoped(path, raw);
    self.scopes.pop();
    result
  }

  fn scoped(&mut self, path: &str, mut raw: DirectiveRaw) -> Result<Component> {
    let locals = std::mem::take(&mut raw.locals);
    for (id, node) in &locals {
      let component = self.node(&format!("{path}.locals.{id}"), node)?;
      if let Some(scope) = self.scopes.last_mut() {
        scope.insert(id.clone(), component);
      }
    }
    self.modified(path, raw)
  }

  fn modified(&mut self, path: &str, mut raw: DirectiveRaw) -> Result<Component> {
    let properties = std::mem::take(&mut raw.properties);
    let setters = std::mem::take(&mut raw.setters);
    let post_processors = std::mem::take(&mut raw.post_processors);
    let singleton = raw.singleton;

    let mut component = self.base(path, raw)?;

    for (name, node) in &properties {
      let value = self.node(&format!("{path}.properties.{name}"), node)?;
      component = component.set_property(name.clone(), value);
    }
    for (name, params) in &setters {
      let params = self.nodes(&format!("{path}.setters.{name}"), params)?;
      component = component.invoke_setter(name.clone(), params);
    }
    for (i, name) in post_processors.iter().enumerate() {
      let processor = self.factory.post_processors.get(name).ok_or_else(|| {
        invalid(
          &format!("{path}.postProcessors[{i}]"),
          format!("no post-processor registered as '{name}'"),
        )
      })?;
      component = component.post_process_shared(processor.clone());
    }
    if singleton {
      component = component.singleton();
    }
    Ok(component)
  }

  fn base(&mut self, path: &str, raw: DirectiveRaw) -> Result<Component> {
    let present = [
      raw.value.is_some(),
      raw.reference.is_some(),
      raw.constructor.is_some(),
      raw.type_name.is_some(),
      raw.instance.is_some(),
      raw.list.is_some(),
      raw.set.is_some(),
      raw.map.is_some(),
      raw.condition.is_some(),
      raw.custom.is_some(),
    ];
    let found: Vec<&str> = BASES
      .iter()
      .zip(present)
      .filter_map(|(key, is_present)| is_present.then_some(*key))
      .collect();
    let base = match found.as_slice() {
      [] => return Err(invalid(path, "node has no directive")),
      [one] => *one,
      many => return Err(invalid(path, format!("conflicting directives: {}", many.join(", ")))),
    };

    let takes_factory = matches!(base, "type" | "instance");
    if raw.factory.is_some() && !takes_factory {
      return Err(invalid(path, format!("'factory' cannot be combined with '{base}'")));
    }
    if raw.parameters.is_some() && !(takes_factory || base == "constructor") {
      return Err(invalid(path, format!("'parameters' cannot be combined with '{base}'")));
    }
    if (raw.then.is_some() || raw.otherwise.is_some()) && base != "if" {
      return Err(invalid(path, "'then' and 'else' require 'if'"));
    }

    let parameters = raw.parameters.unwrap_or_default();
    match base {
      "value" => literal(&format!("{path}.value"), raw.value.as_ref().unwrap_or(&JsonValue::Null)).map(Component::value),
      "ref" => Ok(self.reference(raw.reference.unwrap_or_default())),
      "constructor" => {
        let class = self.class(&raw.constructor.unwrap_or_default())?;
        let params = self.nodes(&format!("{path}.parameters"), &parameters)?;
        Ok(Component::constructor(&class, params))
      }
      "type" => {
        let class = self.class(&raw.type_name.unwrap_or_default())?;
        let factory = raw.factory.ok_or_else(|| invalid(path, "'type' requires 'factory'"))?;
        let params = self.nodes(&format!("{path}.parameters"), &parameters)?;
        Ok(Component::static_factory(&class, factory, params))
      }
      "instance" => {
        let factory = raw.factory.ok_or_else(|| invalid(path, "'instance' requires 'factory'"))?;
        let instance = self.node(&format!("{path}.instance"), raw.instance.as_ref().unwrap_or(&JsonValue::Null))?;
        let params = self.nodes(&format!("{path}.parameters"), &parameters)?;
        Ok(Component::instance_factory(instance, factory, params))
      }
      "list" => Ok(Component::list_of(self.nodes(&format!("{path}.list"), &raw.list.unwrap_or_default())?)),
      "set" => Ok(Component::set_of(self.nodes(&format!("{path}.set"), &raw.set.unwrap_or_default())?)),
      "map" => match raw.map {
        Some(map) => self.map(&format!("{path}.map"), map),
        None => Ok(Component::map_of([])),
      },
      "if" => {
        let (Some(then), Some(otherwise)) = (raw.then.as_ref(), raw.otherwise.as_ref()) else {
          return Err(invalid(path, "'if' requires both 'then' and 'else'"));
        };
        let condition = self.node(&format!("{path}.if"), raw.condition.as_ref().unwrap_or(&JsonValue::Null))?;
        let then = self.node(&format!("{path}.then"), then)?;
        let otherwise = self.node(&format!("{path}.else"), otherwise)?;
        Ok(Component::conditional(condition, then, otherwise))
      }
      _ => {
        let name = raw.custom.unwrap_or_default();
        let custom = self
          .factory
          .customs
          .get(&name)
          .ok_or_else(|| invalid(&format!("{path}.custom"), format!("no custom component registered as '{name}'")))?;
        Ok(Component::custom_shared(custom.clone()))
      }
    }
  }

  fn map(&mut self, path: &str, map: MapRaw) -> Result<Component> {
    let entries = match map {
      MapRaw::Keyed(entries) => entries
        .iter()
        .map(|(key, node)| {
          let value = self.node(&format!("{path}.{key}"), node)?;
          Ok((Component::value(key.as_str()), value))
        })
        .collect::<Result<Vec<_>>>()?,
      MapRaw::Entries(entries) => entries
        .iter()
        .enumerate()
        .map(|(i, EntryRaw { key, value })| {
          let key = self.node(&format!("{path}[{i}].key"), key)?;
          let value = self.node(&format!("{path}[{i}].value"), value)?;
          Ok((key, value))
        })
        .collect::<Result<Vec<_>>>()?,
    };
    Ok(Component::map_of(entries))
  }

  fn reference(&self, id: String) -> Component {
    self
      .scopes
      .iter()
      .rev()
      .find_map(|scope| scope.get(&id).cloned())
      .unwrap_or_else(|| self.container.reference(id))
  }

  fn class(&self, name: &str) -> Result<Arc<Class>> {
    let resolved = self.aliases.get(name).map(String::as_str).unwrap_or(name);
    self
      .factory
      .classes
      .get(resolved)
      .ok_or_else(|| Error::UnknownType(name.to_owned()))
  }
}

/// Converts a JSON literal into a value. Objects become string-keyed maps.
fn literal(path: &str, json: &JsonValue) -> Result<Value> {
  Ok(match json {
    JsonValue::Null => Value::Null,
    JsonValue::Bool(b) => Value::Bool(*b),
    JsonValue::Number(n) => match (n.as_i64(), n.as_f64()) {
      (Some(i), _) => Value::Int(i),
      (None, Some(f)) => Value::Float(f),
      (None, None) => return Err(invalid(path, format!("number {n} is out of range"))),
    },
    JsonValue::String(s) => Value::from(s.as_str()),
    JsonValue::Array(items) => Value::list(
      items
        .iter()
        .enumerate()
        .map(|(i, item)| literal(&format!("{path}[{i}]"), item))
        .collect::<Result<Vec<_>>>()?,
    ),
    JsonValue::Object(entries) => Value::map(
      entries
        .iter()
        .map(|(key, item)| Ok((Value::from(key.as_str()), literal(&format!("{path}.{key}"), item)?)))
        .collect::<Result<Vec<_>>>()?,
    ),
  })
}

fn invalid(path: &str, message: impl ToString) -> Error {
  Error::InvalidDefinition {
    path: path.to_owned(),
    message: message.to_string(),
  }
}
