//! Members of the built-in value types.

use crate::class::{Args, Class, ClassBuilder, Signature};
use crate::error::{Error, Result};
use crate::types::Type;
use crate::value::Value;
use indexmap::{IndexMap, IndexSet};
use once_cell::sync::Lazy;
use std::sync::Arc;

// Keeps the built-in classes alive; types only hold weak links to them.
static BUILTIN_CLASSES: Lazy<Vec<Arc<Class>>> = Lazy::new(|| {
  vec![
    ClassBuilder::<()>::new(&Type::null()).build(),
    ClassBuilder::<()>::new(&Type::any()).build(),
    bool_class(),
    int_class(),
    float_class(),
    string_class(),
    list_class(),
    set_class(),
    map_class(),
  ]
});

pub(crate) fn ensure_loaded() {
  Lazy::force(&BUILTIN_CLASSES);
}

type Builder = ClassBuilder<()>;

fn ctor(b: Builder, params: &[Type], f: impl Fn(&Args<'_>) -> Result<Value> + Send + Sync + 'static) -> Builder {
  let returns = b.ty().clone();
  b.raw_constructor(
    Signature::new(params, returns),
    Arc::new(move |_: &Arc<Class>, args: &Args<'_>| f(args)),
  )
}

fn method(
  b: Builder,
  name: &str,
  params: &[Type],
  returns: Type,
  f: impl Fn(&Value, &Args<'_>) -> Result<Value> + Send + Sync + 'static,
) -> Builder {
  b.raw_method(
    name,
    Signature::new(params, returns),
    Arc::new(move |receiver: &Value, args: &Args<'_>| f(receiver, args)),
  )
}

fn receiver<'v, R>(value: &'v Value, expected: Type, pick: impl FnOnce(&'v Value) -> Option<R>) -> Result<R> {
  pick(value).ok_or_else(|| Error::mismatch(expected, value.type_of()))
}

fn index(i: i64, len: usize) -> Result<usize> {
  usize::try_from(i)
    .ok()
    .filter(|&i| i <= len)
    .ok_or_else(|| Error::msg(format!("index {i} out of range for length {len}")))
}

fn bool_class() -> Arc<Class> {
  ClassBuilder::<()>::new(&Type::bool())
    .static_method("parse", &[Type::string()], Type::bool(), |args| {
      let s = args.str(0)?;
      s.trim()
        .parse::<bool>()
        .map(Value::Bool)
        .map_err(|e| Error::msg(format!("cannot parse '{s}' as bool: {e}")))
    })
    .build()
}

fn int_class() -> Arc<Class> {
  fn parse(args: &Args<'_>) -> Result<Value> {
    let s = args.str(0)?;
    s.trim()
      .parse::<i64>()
      .map(Value::Int)
      .map_err(|e| Error::msg(format!("cannot parse '{s}' as int: {e}")))
  }

  ClassBuilder::<()>::new(&Type::int())
    .static_method("parse", &[Type::string()], Type::int(), parse)
    .static_method("valueOf", &[Type::string()], Type::int(), parse)
    .static_method("valueOf", &[Type::int()], Type::int(), |args| Ok(Value::Int(args.int(0)?)))
    .build()
}

fn float_class() -> Arc<Class> {
  ClassBuilder::<()>::new(&Type::float())
    .static_method("parse", &[Type::string()], Type::float(), |args| {
      let s = args.str(0)?;
      s.trim()
        .parse::<f64>()
        .map(Value::Float)
        .map_err(|e| Error::msg(format!("cannot parse '{s}' as float: {e}")))
    })
    .static_method("valueOf", &[Type::float()], Type::float(), |args| Ok(Value::Float(args.float(0)?)))
    .build()
}

fn string_class() -> Arc<Class> {
  fn this(v: &Value) -> Result<&str> {
    receiver(v, Type::string(), Value::as_str)
  }

  let b = ClassBuilder::<()>::new(&Type::string());
  let b = ctor(b, &[], |_| Ok(Value::from("")));
  let b = ctor(b, &[Type::string()], |args| Ok(Value::from(args.str(0)?)));
  let b = b.static_method("valueOf", &[Type::any()], Type::string(), |args| {
    Ok(Value::from(args.get(0)?.to_string()))
  });
  let b = method(b, "length", &[], Type::int(), |v, _| {
    Ok(Value::Int(this(v)?.chars().count() as i64))
  });
  let b = method(b, "isEmpty", &[], Type::bool(), |v, _| Ok(Value::Bool(this(v)?.is_empty())));
  let b = method(b, "toUpperCase", &[], Type::string(), |v, _| Ok(Value::from(this(v)?.to_uppercase())));
  let b = method(b, "toLowerCase", &[], Type::string(), |v, _| Ok(Value::from(this(v)?.to_lowercase())));
  let b = method(b, "trim", &[], Type::string(), |v, _| Ok(Value::from(this(v)?.trim())));
  let b = method(b, "concat", &[Type::string()], Type::string(), |v, args| {
    Ok(Value::from(format!("{}{}", this(v)?, args.str(0)?)))
  });
  let b = method(b, "contains", &[Type::string()], Type::bool(), |v, args| {
    Ok(Value::Bool(this(v)?.contains(args.str(0)?)))
  });
  let b = method(b, "startsWith", &[Type::string()], Type::bool(), |v, args| {
    Ok(Value::Bool(this(v)?.starts_with(args.str(0)?)))
  });
  let b = method(b, "charAt", &[Type::int()], Type::string(), |v, args| {
    let s = this(v)?;
    let i = args.int(0)?;
    usize::try_from(i)
      .ok()
      .and_then(|i| s.chars().nth(i))
      .map(|c| Value::from(c.to_string()))
      .ok_or_else(|| Error::msg(format!("index {i} out of range for '{s}'")))
  });
  let b = method(b, "substring", &[Type::int()], Type::string(), |v, args| {
    let s = this(v)?;
    let chars: Vec<char> = s.chars().collect();
    let begin = index(args.int(0)?, chars.len())?;
    Ok(Value::from(chars[begin..].iter().collect::<String>()))
  });
  let b = method(b, "substring", &[Type::int(), Type::int()], Type::string(), |v, args| {
    let s = this(v)?;
    let chars: Vec<char> = s.chars().collect();
    let begin = index(args.int(0)?, chars.len())?;
    let end = index(args.int(1)?, chars.len())?;
    if begin > end {
      return Err(Error::msg(format!("substring range {begin}..{end} is reversed")));
    }
    Ok(Value::from(chars[begin..end].iter().collect::<String>()))
  });
  b.build()
}

fn list_class() -> Arc<Class> {
  fn this(v: &Value) -> Result<&Arc<Vec<Value>>> {
    receiver(v, Type::list(), Value::as_list)
  }

  let b = ClassBuilder::<()>::new(&Type::list());
  let b = ctor(b, &[], |_| Ok(Value::list([])));
  let b = ctor(b, &[Type::list()], |args| Ok(Value::list(args.list(0)?.iter().cloned())));
  let b = ctor(b, &[Type::set()], |args| Ok(Value::list(args.set(0)?.iter().cloned())));
  let b = b.static_variadic("of", &[], Type::any(), Type::list(), |args| {
    Ok(Value::list(args.iter().cloned()))
  });
  let b = method(b, "size", &[], Type::int(), |v, _| Ok(Value::Int(this(v)?.len() as i64)));
  let b = method(b, "isEmpty", &[], Type::bool(), |v, _| Ok(Value::Bool(this(v)?.is_empty())));
  let b = method(b, "contains", &[Type::any()], Type::bool(), |v, args| {
    Ok(Value::Bool(this(v)?.contains(args.get(0)?)))
  });
  let b = method(b, "get", &[Type::int()], Type::any(), |v, args| {
    let list = this(v)?;
    let i = args.int(0)?;
    usize::try_from(i)
      .ok()
      .and_then(|i| list.get(i))
      .cloned()
      .ok_or_else(|| Error::msg(format!("index {i} out of range for length {}", list.len())))
  });
  b.build()
}

fn set_class() -> Arc<Class> {
  fn this(v: &Value) -> Result<&Arc<IndexSet<Value>>> {
    receiver(v, Type::set(), Value::as_set)
  }

  let b = ClassBuilder::<()>::new(&Type::set());
  let b = ctor(b, &[], |_| Ok(Value::set([])));
  let b = ctor(b, &[Type::list()], |args| Ok(Value::set(args.list(0)?.iter().cloned())));
  let b = ctor(b, &[Type::set()], |args| Ok(Value::set(args.set(0)?.iter().cloned())));
  let b = b.static_variadic("of", &[], Type::any(), Type::set(), |args| {
    Ok(Value::set(args.iter().cloned()))
  });
  let b = method(b, "size", &[], Type::int(), |v, _| Ok(Value::Int(this(v)?.len() as i64)));
  let b = method(b, "isEmpty", &[], Type::bool(), |v, _| Ok(Value::Bool(this(v)?.is_empty())));
  let b = method(b, "contains", &[Type::any()], Type::bool(), |v, args| {
    Ok(Value::Bool(this(v)?.contains(args.get(0)?)))
  });
  b.build()
}

fn map_class() -> Arc<Class> {
  fn this(v: &Value) -> Result<&Arc<IndexMap<Value, Value>>> {
    receiver(v, Type::map(), Value::as_map)
  }

  let b = ClassBuilder::<()>::new(&Type::map());
  let b = ctor(b, &[], |_| Ok(Value::map([])));
  let b = ctor(b, &[Type::map()], |args| {
    Ok(Value::map(args.map(0)?.iter().map(|(k, v)| (k.clone(), v.clone()))))
  });
  // map.of(k1, v1, k2, v2, ...)
  let b = b.static_variadic("of", &[], Type::any(), Type::map(), |args| {
    let values = args.as_slice();
    if values.len() % 2 != 0 {
      return Err(Error::msg(format!(
        "map.of expects key/value pairs, got {} arguments",
        values.len()
      )));
    }
    Ok(Value::map(
      values.chunks_exact(2).map(|pair| (pair[0].clone(), pair[1].clone())),
    ))
  });
  let b = method(b, "size", &[], Type::int(), |v, _| Ok(Value::Int(this(v)?.len() as i64)));
  let b = method(b, "isEmpty", &[], Type::bool(), |v, _| Ok(Value::Bool(this(v)?.is_empty())));
  let b = method(b, "containsKey", &[Type::any()], Type::bool(), |v, args| {
    Ok(Value::Bool(this(v)?.contains_key(args.get(0)?)))
  });
  let b = method(b, "get", &[Type::any()], Type::any(), |v, args| {
    Ok(this(v)?.get(args.get(0)?).cloned().unwrap_or_default())
  });
  b.build()
}
