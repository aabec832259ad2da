use pretty_assertions::assert_eq;
use std::sync::Arc;
use trellis_ioc::{Class, ClassBuilder, Component, Container, Error, Lookup, Type, Value};

// --- Test Fixtures ---

#[derive(Debug, Default)]
struct Student {
  id: i64,
  name: String,
  scores: Vec<i64>,
}

fn student_class() -> Arc<Class> {
  ClassBuilder::<Student>::named("Student")
    .constructor(&[], |_| Ok(Student::default()))
    .constructor(&[Type::int(), Type::string()], |args| {
      Ok(Student {
        id: args.int(0)?,
        name: args.string(1)?,
        scores: Vec::new(),
      })
    })
    .factory("create", &[Type::int(), Type::string(), Type::list()], |args| {
      let scores = args.list(2)?.iter().filter_map(Value::as_int).collect();
      Ok(Student {
        id: args.int(0)?,
        name: args.string(1)?,
        scores,
      })
    })
    .property("name", Type::string(), |s, args| {
      s.name = args.string(0)?;
      Ok(())
    })
    .method("setId", &[Type::int()], Type::null(), |s, args| {
      s.id = args.int(0)?;
      Ok(Value::Null)
    })
    .method("getName", &[], Type::string(), |s, _| Ok(Value::from(s.name.as_str())))
    .build()
}

fn read_student(value: &Value) -> (i64, String, Vec<i64>) {
  let object = value.as_object().expect("an object");
  let student = object.read::<Student>().expect("a Student");
  (student.id, student.name.clone(), student.scores.clone())
}

// --- Basic Tests ---

#[test]
fn test_constructor_and_static_factory_components() {
  // Arrange
  let list = Type::list().class().unwrap();
  let string = Type::string().class().unwrap();
  let container = Container::new();
  container
    .add_component("c1", Component::constructor(&string, [Component::value("hello")]))
    .unwrap();
  container
    .add_component(
      "c2",
      Component::static_factory(&list, "of", [1, 2, 3].map(Component::value)),
    )
    .unwrap();

  // Act
  let c1 = container.get_component("c1").unwrap();
  let c2 = container.get_component("c2").unwrap();

  // Assert
  assert_eq!(c1, Value::from("hello"));
  assert_eq!(c2, Value::list([Value::from(1), Value::from(2), Value::from(3)]));
}

#[test]
fn test_missing_component_is_not_found() {
  let container = Container::new();

  let err = container.get_component("c3").unwrap_err();

  assert!(matches!(err, Error::NotFound(Lookup::Id(ref id)) if id == "c3"), "{err}");
}

#[test]
fn test_absent_component_is_rejected() {
  let container = Container::new();

  let err = container.add_component("c3", None::<Component>).unwrap_err();

  assert!(matches!(err, Error::Registration { ref id, .. } if id == "c3"), "{err}");
  assert!(!container.contains("c3"));
}

#[test]
fn test_duplicate_registration_keeps_the_first() {
  // Arrange
  let container = Container::new();
  container.add_component("answer", Component::value(42)).unwrap();

  // Act
  let err = container.add_component("answer", Component::value(7)).unwrap_err();

  // Assert
  assert!(matches!(err, Error::Registration { .. }), "{err}");
  assert_eq!(container.get_component("answer").unwrap(), Value::from(42));
  assert_eq!(container.len(), 1);
}

#[test]
fn test_empty_id_is_rejected() {
  let container = Container::new();
  assert!(container.add_component("", Component::value(1)).is_err());
  assert!(container.is_empty());
}

#[test]
fn test_constructor_with_parameters() {
  let student = student_class();
  let component = Component::constructor(&student, [Component::value(1001), Component::value("XiaoMing")]);

  let value = component.produce().unwrap();

  assert_eq!(read_student(&value), (1001, "XiaoMing".to_owned(), vec![]));
  assert_eq!(value.type_of(), *student.ty());
}

#[test]
fn test_user_static_factory() {
  let student = student_class();
  let component = Component::static_factory(
    &student,
    "create",
    [
      Component::value(1),
      Component::value("XiaoHong"),
      Component::list_of([Component::value(90), Component::value(85)]),
    ],
  );

  let value = component.produce().unwrap();

  assert_eq!(read_student(&value), (1, "XiaoHong".to_owned(), vec![90, 85]));
  assert_eq!(component.declared_type(), Some(student.ty().clone()));
}

#[test]
fn test_property_and_setter_injection() {
  // Arrange
  let student = student_class();
  let component = Component::constructor(&student, [])
    .set_property("name", Component::value("XiaoGang"))
    .invoke_setter("setId", [Component::value(7)]);

  // Act
  let value = component.produce().unwrap();

  // Assert
  assert_eq!(read_student(&value), (7, "XiaoGang".to_owned(), vec![]));
  assert_eq!(component.declared_type(), Some(student.ty().clone()));
}

#[test]
fn test_instance_factory_calls_a_method() {
  let component = Component::instance_factory(Component::value("hello world"), "substring", [Component::value(6)]);

  assert_eq!(component.produce().unwrap(), Value::from("world"));
  assert_eq!(component.declared_type(), Some(Type::string()));
}

#[test]
fn test_singleton_returns_the_same_instance() {
  // Arrange
  let student = student_class();
  let container = Container::new();
  container
    .add_component("transient", Component::constructor(&student, []))
    .unwrap();
  container
    .add_component("shared", Component::constructor(&student, []).singleton())
    .unwrap();

  // Act
  let t1 = container.get_component("transient").unwrap();
  let t2 = container.get_component("transient").unwrap();
  let s1 = container.get_component("shared").unwrap();
  let s2 = container.get_component("shared").unwrap();

  // Assert
  assert!(!t1.ptr_eq(&t2));
  assert_ne!(t1, t2);
  assert!(s1.ptr_eq(&s2));
  assert_eq!(s1, s2);
  assert!(container.lookup("shared").unwrap().is_singleton());
}

#[test]
fn test_map_transforms_the_value() {
  let component = Component::value(20).map(|v| Ok(Value::Int(v.as_int().unwrap_or_default() + 1)));
  let renamed = Component::value(3).map_as(Type::string(), |v| Ok(Value::from(v.to_string())));

  assert_eq!(component.produce().unwrap(), Value::from(21));
  assert_eq!(renamed.produce().unwrap(), Value::from("3"));
  assert_eq!(renamed.declared_type(), Some(Type::string()));
}

#[test]
fn test_collections() {
  let list = Component::list_of([Component::value(1), Component::value("two")]);
  let set = Component::set_of([Component::value(1), Component::value(1), Component::value(2)]);

  assert_eq!(list.produce().unwrap(), Value::list([Value::from(1), Value::from("two")]));
  assert_eq!(set.produce().unwrap(), Value::set([Value::from(1), Value::from(2)]));
  assert_eq!(set.declared_type(), Some(Type::set()));
}

#[test]
fn test_map_with_equal_keys_keeps_the_later_value() {
  let map = Component::map_of([
    (Component::value("k"), Component::value(1)),
    (Component::value("other"), Component::value(2)),
    (Component::value("k"), Component::value(3)),
  ]);

  let value = map.produce().unwrap();

  let entries = value.as_map().unwrap();
  assert_eq!(entries.len(), 2);
  assert_eq!(entries.get(&Value::from("k")), Some(&Value::from(3)));
}

#[test]
fn test_conditional() {
  let pick = |flag: bool| Component::conditional(Component::value(flag), Component::value("yes"), Component::value("no"));

  assert_eq!(pick(true).produce().unwrap(), Value::from("yes"));
  assert_eq!(pick(false).produce().unwrap(), Value::from("no"));
  assert_eq!(pick(true).declared_type(), Some(Type::string()));

  let mixed = Component::conditional(Component::value(true), Component::value(1), Component::value("one"));
  assert_eq!(mixed.declared_type(), None);
}

#[test]
fn test_non_boolean_condition_is_a_type_mismatch() {
  let component = Component::conditional(Component::value(1), Component::value("yes"), Component::value("no"));

  let err = component.produce().unwrap_err();

  assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
}

#[test]
fn test_ids_are_sorted() {
  let container = Container::new();
  for id in ["b", "c", "a"] {
    container.add_component(id, Component::value(id)).unwrap();
  }

  assert_eq!(container.ids(), vec!["a", "b", "c"]);
}
