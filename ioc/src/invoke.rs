//! The invocation primitive: overload selection and execution of class members.
//!
//! A member is applicable when its arity matches the argument count (a
//! variadic tail accepts any surplus) and every parameter type is assignable
//! from the runtime type of the corresponding argument. Among several
//! applicable members the unique most specific one wins; otherwise the call
//! is ambiguous.

use crate::class::{Args, Class, Member, Signature};
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use std::sync::Arc;
use tracing::trace;

/// Runs the constructor of `class` matching `args`.
pub fn construct(class: &Arc<Class>, args: &[Value]) -> Result<Value> {
  let qualified = format!("{}::new", class.name());
  let member = select(&qualified, class.constructors.iter(), args)?;
  trace!(member = %qualified, args = args.len(), "Invoking constructor");
  run(qualified, |name| (member.body)(class, &Args::new(name, args)))
}

/// Runs the static member `name` of `class` matching `args`.
pub fn call_static(class: &Arc<Class>, name: &str, args: &[Value]) -> Result<Value> {
  let qualified = format!("{}::{name}", class.name());
  let candidates = class.statics.get(name).into_iter().flatten();
  let member = select(&qualified, candidates, args)?;
  trace!(member = %qualified, args = args.len(), "Invoking static member");
  run(qualified, |n| (member.body)(class, &Args::new(n, args)))
}

/// Runs the instance method `name` on `receiver` matching `args`.
///
/// Methods are looked up on the receiver's class first, then on the classes of
/// its supertypes; a supertype member with the same parameter list as one
/// already found is treated as overridden.
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
  let classes = hierarchy(receiver_class(receiver)?);
  let qualified = format!("{}::{name}", classes[0].name());
  let mut candidates: Vec<&Member<_>> = Vec::new();
  for class in &classes {
    for member in class.methods.get(name).into_iter().flatten() {
      if !candidates.iter().any(|c| c.signature.params() == member.signature.params()) {
        candidates.push(member);
      }
    }
  }
  let member = select(&qualified, candidates, args)?;
  trace!(member = %qualified, args = args.len(), "Invoking method");
  run(qualified, |n| (member.body)(receiver, &Args::new(n, args)))
}

/// Assigns the property `name` of `receiver`.
pub fn set_property(receiver: &Value, name: &str, value: Value) -> Result<()> {
  let classes = hierarchy(receiver_class(receiver)?);
  let qualified = format!("{}.{name}", classes[0].name());
  let property = classes
    .iter()
    .find_map(|c| c.properties.get(name))
    .ok_or_else(|| Error::NoMatchingMember {
      member: qualified.clone(),
      args: value.type_of().to_string(),
    })?;
  let args = [value];
  let member = select(&qualified, [property], &args)?;
  trace!(property = %qualified, "Setting property");
  run(qualified, |n| (member.body)(receiver, &Args::new(n, &args))).map(drop)
}

/// Return type shared by every static `name` overload of `class` accepting `arity` arguments.
pub fn static_return_type(class: &Class, name: &str, arity: usize) -> Option<Type> {
  common_return(
    class
      .statics
      .get(name)
      .into_iter()
      .flatten()
      .map(|m| &m.signature),
    arity,
  )
}

/// Return type shared by every `name` method overload reachable from `ty` accepting `arity` arguments.
pub fn method_return_type(ty: &Type, name: &str, arity: usize) -> Option<Type> {
  let classes = hierarchy(ty.class()?);
  common_return(
    classes
      .iter()
      .flat_map(|c| c.methods.get(name).into_iter().flatten())
      .map(|m| &m.signature),
    arity,
  )
}

fn common_return<'s>(signatures: impl Iterator<Item = &'s Signature>, arity: usize) -> Option<Type> {
  let mut returns = signatures.filter(|s| s.accepts_arity(arity)).map(Signature::returns);
  let first = returns.next()?.clone();
  returns.all(|r| *r == first).then_some(first)
}

fn receiver_class(receiver: &Value) -> Result<Arc<Class>> {
  match receiver {
    Value::Object(o) => Ok(o.class().clone()),
    other => {
      let ty = other.type_of();
      ty.class()
        .ok_or_else(|| Error::msg(format!("type '{ty}' has no class")))
    }
  }
}

/// The class followed by the classes of its transitive supertypes, nearest first.
fn hierarchy(class: Arc<Class>) -> Vec<Arc<Class>> {
  let mut classes = vec![class];
  let mut next = 0;
  while next < classes.len() {
    let supertypes = classes[next].ty().supertypes().to_vec();
    for ty in supertypes {
      if let Some(class) = ty.class() {
        if !classes.iter().any(|c| c.ty() == class.ty()) {
          classes.push(class);
        }
      }
    }
    next += 1;
  }
  classes
}

fn run(qualified: String, call: impl FnOnce(&str) -> Result<Value>) -> Result<Value> {
  call(&qualified).map_err(|source| Error::Invocation {
    member: qualified,
    source: Box::new(source),
  })
}

fn describe(types: &[Type]) -> String {
  types.iter().map(Type::to_string).collect::<Vec<_>>().join(", ")
}

fn is_applicable(signature: &Signature, arg_types: &[Type]) -> bool {
  signature.accepts_arity(arg_types.len())
    && arg_types
      .iter()
      .enumerate()
      .all(|(i, arg)| signature.param_at(i).is_some_and(|p| p.is_assignable_from(arg)))
}

/// `true` when every argument list accepted by `a` is also accepted by `b`.
fn at_least_as_specific(a: &Signature, b: &Signature) -> bool {
  match (a.rest(), b.rest()) {
    (None, Some(_)) => return true,
    (Some(_), None) => return false,
    _ => {}
  }
  let width = a.params().len().max(b.params().len()) + 1;
  (0..width).all(|i| match (a.param_at(i), b.param_at(i)) {
    (Some(pa), Some(pb)) => pb.is_assignable_from(pa),
    _ => true,
  })
}

fn select<'m, F: 'm>(
  qualified: &str,
  candidates: impl IntoIterator<Item = &'m Member<F>>,
  args: &[Value],
) -> Result<&'m Member<F>> {
  let arg_types: Vec<Type> = args.iter().map(Value::type_of).collect();
  let applicable: Vec<&Member<F>> = candidates
    .into_iter()
    .filter(|m| is_applicable(&m.signature, &arg_types))
    .collect();

  match applicable.as_slice() {
    [] => Err(Error::NoMatchingMember {
      member: qualified.to_owned(),
      args: describe(&arg_types),
    }),
    [only] => Ok(*only),
    many => many
      .iter()
      .copied()
      .find(|a| {
        many.iter().all(|b| {
          std::ptr::eq(*a, *b)
            || (at_least_as_specific(&a.signature, &b.signature)
              && !at_least_as_specific(&b.signature, &a.signature))
        })
      })
      .ok_or_else(|| Error::Ambiguous {
        what: format!("call to '{qualified}' with ({})", describe(&arg_types)),
        candidates: many.iter().map(|m| m.signature.to_string()).collect(),
      }),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::class::ClassBuilder;

  struct Point {
    x: f64,
    y: f64,
  }

  fn point_class() -> Arc<Class> {
    ClassBuilder::<Point>::named("Point")
      .constructor(&[], |_| Ok(Point { x: 0.0, y: 0.0 }))
      .constructor(&[Type::float(), Type::float()], |args| {
        Ok(Point {
          x: args.float(0)?,
          y: args.float(1)?,
        })
      })
      .constructor(&[Type::int(), Type::int()], |args| {
        Ok(Point {
          x: args.int(0)? as f64 * 10.0,
          y: args.int(1)? as f64 * 10.0,
        })
      })
      .method("sum", &[], Type::float(), |p, _| Ok(Value::Float(p.x + p.y)))
      .static_method("label", &[Type::any()], Type::string(), |_| Ok(Value::from("any")))
      .static_method("label", &[Type::string()], Type::string(), |_| Ok(Value::from("string")))
      .static_method("pick", &[Type::int(), Type::any()], Type::string(), |_| Ok(Value::from("a")))
      .static_method("pick", &[Type::any(), Type::int()], Type::string(), |_| Ok(Value::from("b")))
      .property("x", Type::float(), |p, args| {
        p.x = args.float(0)?;
        Ok(())
      })
      .build()
  }

  fn sum(value: &Value) -> f64 {
    call_method(value, "sum", &[]).unwrap().as_float().unwrap()
  }

  #[test]
  fn exact_overload_beats_widening() {
    let class = point_class();
    let p = construct(&class, &[Value::from(1), Value::from(2)]).unwrap();
    assert_eq!(sum(&p), 30.0);

    let p = construct(&class, &[Value::from(1), Value::from(2.5)]).unwrap();
    assert_eq!(sum(&p), 3.5);
  }

  #[test]
  fn most_specific_static_wins() {
    let class = point_class();
    let label = call_static(&class, "label", &[Value::from("x")]).unwrap();
    assert_eq!(label.as_str(), Some("string"));
    let label = call_static(&class, "label", &[Value::from(1)]).unwrap();
    assert_eq!(label.as_str(), Some("any"));
  }

  #[test]
  fn incomparable_overloads_are_ambiguous() {
    let class = point_class();
    let err = call_static(&class, "pick", &[Value::from(1), Value::from(2)]).unwrap_err();
    assert!(matches!(err, Error::Ambiguous { .. }), "{err}");
  }

  #[test]
  fn arity_mismatch_finds_nothing() {
    let class = point_class();
    let err = construct(&class, &[Value::from(1)]).unwrap_err();
    assert!(matches!(err, Error::NoMatchingMember { .. }), "{err}");
  }

  #[test]
  fn property_assignment_mutates_in_place() {
    let class = point_class();
    let p = construct(&class, &[]).unwrap();
    set_property(&p, "x", Value::from(4)).unwrap();
    assert_eq!(sum(&p), 4.0);

    let err = set_property(&p, "x", Value::from("four")).unwrap_err();
    assert!(matches!(err, Error::NoMatchingMember { .. }), "{err}");
  }

  #[test]
  fn member_failures_are_wrapped() {
    let s = Value::from("abc");
    let err = call_method(&s, "substring", &[Value::from(5)]).unwrap_err();
    assert!(matches!(err, Error::Invocation { ref member, .. } if member == "string::substring"), "{err}");
  }

  #[test]
  fn inherited_methods_need_the_same_rust_type() {
    let base = point_class();
    let square = ClassBuilder::<Point>::new(&Type::new("Square", [base.ty().clone()]))
      .constructor(&[], |_| Ok(Point { x: 2.0, y: 2.0 }))
      .build();
    struct Tag;
    let tag = ClassBuilder::<Tag>::new(&Type::new("Tag", [base.ty().clone()]))
      .constructor(&[], |_| Ok(Tag))
      .build();

    let s = construct(&square, &[]).unwrap();
    assert_eq!(sum(&s), 4.0);

    let t = construct(&tag, &[]).unwrap();
    let err = call_method(&t, "sum", &[]).unwrap_err();
    match err {
      Error::Invocation { member, source } => {
        assert_eq!(member, "Tag::sum");
        assert!(
          matches!(source.downcast_ref::<Error>(), Some(Error::TypeMismatch { .. })),
          "{source}"
        );
      }
      other => panic!("expected an invocation failure, got {other}"),
    }
  }

  #[test]
  fn variadic_list_factory() {
    let list = Type::list().class().unwrap();
    let value = call_static(&list, "of", &[Value::from(1), Value::from(2), Value::from(3)]).unwrap();
    assert_eq!(value, Value::list([Value::from(1), Value::from(2), Value::from(3)]));
  }

  #[test]
  fn ambiguous_returns_are_indeterminate() {
    let class = point_class();
    assert_eq!(static_return_type(&class, "label", 1), Some(Type::string()));
    assert_eq!(method_return_type(class.ty(), "sum", 0), Some(Type::float()));
    assert_eq!(method_return_type(&Type::string(), "substring", 1), Some(Type::string()));
    assert_eq!(method_return_type(&Type::string(), "missing", 0), None);
  }
}
