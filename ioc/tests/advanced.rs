use pretty_assertions::assert_eq;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use trellis_ioc::{Class, ClassBuilder, Component, Container, CustomComponent, Error, Lookup, Type, Value};

// --- Test Fixtures ---

/// Holds whatever its constructor was given.
struct Holder {
  inner: Value,
}

fn holder_class() -> Arc<Class> {
  ClassBuilder::<Holder>::named("Holder")
    .constructor(&[Type::any()], |args| Ok(Holder { inner: args.get(0)?.clone() }))
    .build()
}

/// Refers to a peer assigned after construction.
struct Peer {
  name: String,
  peer: Value,
}

fn peer_class() -> Arc<Class> {
  ClassBuilder::<Peer>::named("Peer")
    .constructor(&[Type::string()], |args| {
      Ok(Peer {
        name: args.string(0)?,
        peer: Value::Null,
      })
    })
    .method("setPeer", &[Type::any()], Type::null(), |p, args| {
      p.peer = args.get(0)?.clone();
      Ok(Value::Null)
    })
    .build()
}

fn peer_of(value: &Value) -> (String, Value) {
  let peer = value.as_object().unwrap().read::<Peer>().unwrap();
  (peer.name.clone(), peer.peer.clone())
}

// --- Advanced Tests ---

#[test]
fn test_concurrent_singleton_construction_runs_once() {
  // Arrange
  static CONSTRUCTIONS: AtomicUsize = AtomicUsize::new(0);

  struct Slow;
  let slow = ClassBuilder::<Slow>::named("Slow")
    .constructor(&[], |_| {
      CONSTRUCTIONS.fetch_add(1, Ordering::SeqCst);
      thread::sleep(Duration::from_millis(20));
      Ok(Slow)
    })
    .build();
  let container = Container::new();
  container
    .add_component("slow", Component::constructor(&slow, []).singleton())
    .unwrap();

  // Act
  let container = &container;
  let values: Vec<Value> = thread::scope(|s| {
    let handles: Vec<_> = (0..20)
      .map(|_| s.spawn(move || container.get_component("slow").unwrap()))
      .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
  });

  // Assert
  assert_eq!(CONSTRUCTIONS.load(Ordering::SeqCst), 1);
  assert!(values.iter().all(|v| v.ptr_eq(&values[0])));
}

#[test]
fn test_failed_singleton_construction_is_retried() {
  static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

  struct Flaky;
  let flaky = ClassBuilder::<Flaky>::named("Flaky")
    .constructor(&[], |_| {
      if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
        return Err(Error::msg("not yet"));
      }
      Ok(Flaky)
    })
    .build();
  let component = Component::constructor(&flaky, []).singleton();

  let err = component.produce().unwrap_err();
  assert!(matches!(err, Error::Invocation { ref member, .. } if member == "Flaky::new"), "{err}");

  let first = component.produce().unwrap();
  let second = component.produce().unwrap();
  assert!(first.ptr_eq(&second));
  assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
}

#[test]
fn test_singletons_may_refer_to_each_other_through_setters() {
  // Arrange: a -> b -> a, wired after construction.
  let peer = peer_class();
  let container = Container::new();
  let a = Component::constructor(&peer, [Component::value("a")])
    .invoke_setter("setPeer", [container.reference("b")])
    .singleton();
  let b = Component::constructor(&peer, [Component::value("b")])
    .invoke_setter("setPeer", [container.reference("a")])
    .singleton();
  container.add_component("a", a).unwrap();
  container.add_component("b", b).unwrap();

  // Act
  let a = container.get_component("a").unwrap();
  let b = container.get_component("b").unwrap();

  // Assert
  let (a_name, a_peer) = peer_of(&a);
  let (b_name, b_peer) = peer_of(&b);
  assert_eq!(a_name, "a");
  assert_eq!(b_name, "b");
  assert!(a_peer.ptr_eq(&b));
  assert!(b_peer.ptr_eq(&a));
}

#[test]
#[should_panic(expected = "Circular dependency detected")]
fn test_singleton_constructor_cycle_panics() {
  let holder = holder_class();
  let container = Container::new();
  container
    .add_component(
      "circular_a",
      Component::constructor(&holder, [container.reference("circular_b")]).singleton(),
    )
    .unwrap();
  container
    .add_component(
      "circular_b",
      Component::constructor(&holder, [container.reference("circular_a")]).singleton(),
    )
    .unwrap();

  let _ = container.get_component("circular_a");
}

#[test]
#[should_panic(expected = "Resolution depth limit exceeded")]
fn test_transient_constructor_cycle_hits_the_depth_limit() {
  let holder = holder_class();
  let container = Container::with_max_depth(16);
  container
    .add_component("a", Component::constructor(&holder, [container.reference("b")]))
    .unwrap();
  container
    .add_component("b", Component::constructor(&holder, [container.reference("a")]))
    .unwrap();

  let _ = container.get_component("a");
}

#[test]
#[should_panic(expected = "Resolution depth limit exceeded")]
fn test_transient_cycle_panics_at_the_default_depth() {
  let holder = holder_class();
  let container = Container::new();
  container
    .add_component("a", Component::constructor(&holder, [container.reference("b")]))
    .unwrap();
  container
    .add_component("b", Component::constructor(&holder, [container.reference("a")]))
    .unwrap();

  let _ = container.get_component("a");
}

#[test]
fn test_singleton_may_resolve_another_singleton_on_a_spawned_thread() {
  // Arrange: building "pool" waits on a thread that builds "worker".
  struct Worker;
  struct Pool {
    worker: Value,
  }

  let container = Container::new();
  let worker = ClassBuilder::<Worker>::named("Worker")
    .constructor(&[], |_| Ok(Worker))
    .build();
  let pool = {
    let container = container.clone();
    ClassBuilder::<Pool>::named("Pool")
      .constructor(&[], move |_| {
        let container = container.clone();
        let worker = thread::spawn(move || container.get_component("worker"))
          .join()
          .map_err(|_| Error::msg("worker thread panicked"))??;
        Ok(Pool { worker })
      })
      .build()
  };
  container
    .add_component("worker", Component::constructor(&worker, []).singleton())
    .unwrap();
  container
    .add_component("pool", Component::constructor(&pool, []).singleton())
    .unwrap();

  // Act
  let (tx, rx) = mpsc::channel();
  let resolver = container.clone();
  thread::spawn(move || {
    let _ = tx.send(resolver.get_component("pool").map(|pool| (pool, resolver.get_component("worker"))));
  });
  let (pool, worker) = rx
    .recv_timeout(Duration::from_secs(5))
    .expect("resolving 'pool' deadlocked")
    .unwrap();

  // Assert
  let held = pool.as_object().unwrap().read::<Pool>().unwrap().worker.clone();
  assert!(held.ptr_eq(&worker.unwrap()));
}

#[test]
fn test_setter_cycle_built_from_two_threads_at_once() {
  // Arrange: both constructors linger so each thread owns one end of the cycle.
  struct SlowPeer {
    peer: Value,
  }
  let slow_peer = ClassBuilder::<SlowPeer>::named("SlowPeer")
    .constructor(&[], |_| {
      thread::sleep(Duration::from_millis(50));
      Ok(SlowPeer { peer: Value::Null })
    })
    .method("setPeer", &[Type::any()], Type::null(), |p, args| {
      p.peer = args.get(0)?.clone();
      Ok(Value::Null)
    })
    .build();
  let container = Container::new();
  container
    .add_component(
      "left",
      Component::constructor(&slow_peer, [])
        .invoke_setter("setPeer", [container.reference("right")])
        .singleton(),
    )
    .unwrap();
  container
    .add_component(
      "right",
      Component::constructor(&slow_peer, [])
        .invoke_setter("setPeer", [container.reference("left")])
        .singleton(),
    )
    .unwrap();

  // Act
  let (tx, rx) = mpsc::channel();
  for id in ["left", "right"] {
    let container = container.clone();
    let tx = tx.clone();
    thread::spawn(move || {
      let _ = tx.send((id, container.get_component(id)));
    });
  }
  let mut produced = Vec::new();
  for _ in 0..2 {
    let (id, value) = rx
      .recv_timeout(Duration::from_secs(5))
      .expect("concurrent setter cycle deadlocked");
    produced.push((id, value.unwrap()));
  }

  // Assert
  let left = container.get_component("left").unwrap();
  let right = container.get_component("right").unwrap();
  for (id, value) in &produced {
    let expected = if *id == "left" { &left } else { &right };
    assert!(value.ptr_eq(expected));
  }
  let peer_of = |v: &Value| v.as_object().unwrap().read::<SlowPeer>().unwrap().peer.clone();
  assert!(peer_of(&left).ptr_eq(&right));
  assert!(peer_of(&right).ptr_eq(&left));
}

#[test]
fn test_lookup_by_interface() {
  // Arrange
  let user_dao = Type::interface("UserDao");
  let user_service = Type::interface("UserService");

  struct UserDaoImpl;
  struct UserServiceImpl {
    dao: Value,
  }

  let dao_impl = ClassBuilder::<UserDaoImpl>::new(&Type::new("UserDaoImpl", [user_dao.clone()]))
    .constructor(&[], |_| Ok(UserDaoImpl))
    .method("find", &[Type::int()], Type::string(), |_, args| {
      Ok(Value::from(format!("user-{}", args.int(0)?)))
    })
    .build();
  let service_impl = ClassBuilder::<UserServiceImpl>::new(&Type::new("UserServiceImpl", [user_service.clone()]))
    .constructor(&[user_dao.clone()], |args| Ok(UserServiceImpl { dao: args.get(0)?.clone() }))
    .build();

  let container = Container::new();
  container.add_component("name", Component::value("unrelated")).unwrap();
  container
    .add_component(
      "userService",
      Component::constructor(&service_impl, [container.reference("userDao")]).singleton(),
    )
    .unwrap();
  container
    .add_component("userDao", Component::constructor(&dao_impl, []).singleton())
    .unwrap();

  // Act
  let service = container.get_component(&user_service).unwrap();
  let dao = container.get_component(&user_dao).unwrap();

  // Assert
  let held = service.as_object().unwrap().read::<UserServiceImpl>().unwrap().dao.clone();
  assert!(held.ptr_eq(&dao));
  assert_eq!(
    trellis_ioc::invoke::call_method(&dao, "find", &[Value::from(7)]).unwrap(),
    Value::from("user-7")
  );
  assert_eq!(container.declared_type("userService"), Some(service_impl.ty().clone()));
}

#[test]
fn test_type_lookup_reports_missing_and_ambiguous() {
  let user_dao = Type::interface("UserDao");
  struct Dao;
  let dao_impl = ClassBuilder::<Dao>::new(&Type::new("DaoImpl", [user_dao.clone()]))
    .constructor(&[], |_| Ok(Dao))
    .build();

  let container = Container::new();
  assert!(matches!(
    container.get_component(&user_dao).unwrap_err(),
    Error::NotFound(Lookup::Type(_))
  ));

  container
    .add_component("userDao", Component::constructor(&dao_impl, []))
    .unwrap();
  container
    .add_component("backupDao", Component::constructor(&dao_impl, []))
    .unwrap();

  match container.get_component(&user_dao).unwrap_err() {
    Error::Ambiguous { candidates, .. } => assert_eq!(candidates, vec!["backupDao", "userDao"]),
    other => panic!("expected an ambiguity, got {other}"),
  }
}

#[test]
fn test_type_lookup_ignores_numeric_widening() {
  let container = Container::new();
  container.add_component("count", Component::value(3)).unwrap();
  container.add_component("ratio", Component::value(0.5)).unwrap();

  assert_eq!(container.get_component(Type::float()).unwrap(), Value::from(0.5));
  assert_eq!(container.get_component(Type::int()).unwrap(), Value::from(3));
}

#[test]
fn test_type_lookup_constructs_only_the_match() {
  // Arrange
  static BUILT: AtomicUsize = AtomicUsize::new(0);

  let service = Type::interface("Service");
  struct Counted;
  let counted = ClassBuilder::<Counted>::named("Counted")
    .constructor(&[], |_| {
      BUILT.fetch_add(1, Ordering::SeqCst);
      Ok(Counted)
    })
    .method("label", &[], Type::string(), |_, _| Ok(Value::from("counted")))
    .build();
  let service_impl = ClassBuilder::<Counted>::new(&Type::new("ServiceImpl", [service.clone()]))
    .constructor(&[], |_| {
      BUILT.fetch_add(1, Ordering::SeqCst);
      Ok(Counted)
    })
    .build();

  let container = Container::new();
  container
    .add_component("single", Component::constructor(&counted, []).singleton())
    .unwrap();
  container
    .add_component("transient", Component::constructor(&counted, []))
    .unwrap();
  container.add_component("first", container.reference("second")).unwrap();
  container.add_component("second", container.reference("single")).unwrap();
  container
    .add_component(
      "label",
      Component::instance_factory(container.reference("first"), "label", []),
    )
    .unwrap();
  container
    .add_component("service", Component::constructor(&service_impl, []))
    .unwrap();

  // Act
  let declared: Vec<Option<Type>> = ["single", "transient", "first", "second", "label", "service"]
    .into_iter()
    .map(|id| container.declared_type(id))
    .collect();
  let built_by_inference = BUILT.load(Ordering::SeqCst);
  let found = container.get_component(&service).unwrap();

  // Assert
  assert_eq!(
    declared,
    vec![
      Some(counted.ty().clone()),
      Some(counted.ty().clone()),
      Some(counted.ty().clone()),
      Some(counted.ty().clone()),
      Some(Type::string()),
      Some(service_impl.ty().clone()),
    ]
  );
  assert_eq!(built_by_inference, 0);
  assert_eq!(BUILT.load(Ordering::SeqCst), 1);
  assert_eq!(found.type_of(), service_impl.ty().clone());
}

#[test]
fn test_reference_into_another_container_with_the_same_id() {
  let other = Container::new();
  other.add_component("x", Component::value("from other")).unwrap();
  let container = Container::new();
  container.add_component("x", other.reference("x")).unwrap();

  assert_eq!(container.declared_type("x"), Some(Type::string()));
  assert_eq!(container.get_component(Type::string()).unwrap(), Value::from("from other"));
}

#[test]
fn test_references_may_precede_their_target() {
  let container = Container::new();
  container
    .add_component(
      "shout",
      Component::instance_factory(container.reference("name"), "toUpperCase", []),
    )
    .unwrap();

  assert!(matches!(
    container.get_component("shout").unwrap_err(),
    Error::NotFound(Lookup::Id(ref id)) if id == "name"
  ));

  container.add_component("name", Component::value("alice")).unwrap();
  assert_eq!(container.get_component("shout").unwrap(), Value::from("ALICE"));
  assert_eq!(container.declared_type("shout"), Some(Type::string()));
}

#[test]
fn test_self_reference_has_no_declared_type() {
  let container = Container::new();
  container
    .add_component("loop", Component::list_of([]).map(Ok))
    .unwrap();
  container.add_component("self", container.reference("self")).unwrap();

  assert_eq!(container.declared_type("self"), None);
  assert_eq!(container.declared_type("loop"), Some(Type::list()));
}

#[test]
fn test_post_processors_run_in_place() {
  // Arrange
  let holder = holder_class();
  let component = Component::constructor(&holder, [Component::value(1)]).post_process(|object: &Value| -> trellis_ioc::Result<()> {
    let mut holder = object
      .as_object()
      .and_then(|o| o.write::<Holder>())
      .ok_or_else(|| Error::msg("not a holder"))?;
    holder.inner = Value::from(2);
    Ok(())
  });

  // Act
  let value = component.produce().unwrap();

  // Assert
  assert_eq!(value.as_object().unwrap().read::<Holder>().unwrap().inner, Value::from(2));
  assert_eq!(component.declared_type(), Some(holder.ty().clone()));
}

#[test]
fn test_custom_component() {
  struct Answer;
  impl CustomComponent for Answer {
    fn produce(&self) -> trellis_ioc::Result<Value> {
      Ok(Value::Int(42))
    }

    fn declared_type(&self) -> Option<Type> {
      Some(Type::int())
    }
  }

  let container = Container::new();
  container.add_component("answer", Component::custom(Answer)).unwrap();

  assert_eq!(container.get_component("answer").unwrap(), Value::from(42));
  assert_eq!(container.get_component(Type::int()).unwrap(), Value::from(42));
  assert!(matches!(
    container.get_component(Type::float()).unwrap_err(),
    Error::NotFound(Lookup::Type(_))
  ));
}

#[test]
fn test_reference_outliving_its_container() {
  let reference = {
    let container = Container::new();
    container.add_component("x", Component::value(1)).unwrap();
    container.reference("x")
  };

  let err = reference.produce().unwrap_err();

  assert!(matches!(err, Error::ContainerDropped(ref id) if id == "x"), "{err}");
}

#[test]
fn test_concurrent_registration_and_resolution() {
  // Arrange
  let container = Container::new();
  container
    .add_component("common", Component::value(42).singleton())
    .unwrap();

  // Act
  thread::scope(|s| {
    for i in 0..10_i64 {
      let container = &container;
      s.spawn(move || {
        container
          .add_component(format!("thread_{i}"), Component::value(i))
          .unwrap();
        for _ in 0..100 {
          assert_eq!(container.get_component("common").unwrap(), Value::from(42));
        }
        assert_eq!(container.get_component(format!("thread_{i}")).unwrap(), Value::from(i));
      });
    }
  });

  // Assert
  assert_eq!(container.len(), 11);
  assert_eq!(container.get_component("thread_5").unwrap(), Value::from(5_i64));
}
