use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::EnvFilter;
use trellis_ioc::{ClassBuilder, Component, Container, Type, Value};

// A simple service that gets a unique ID upon creation.
struct RequestTracker {
  id: usize,
}

// A global, thread-safe counter to generate unique IDs.
static ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

fn tracker_id(value: &Value) -> usize {
  value
    .as_object()
    .and_then(|o| o.read::<RequestTracker>().map(|t| t.id))
    .unwrap_or(usize::MAX)
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let tracker = ClassBuilder::<RequestTracker>::named("RequestTracker")
    .constructor(&[], |_| {
      println!("Creating RequestTracker...");
      Ok(RequestTracker {
        id: ID_COUNTER.fetch_add(1, Ordering::SeqCst),
      })
    })
    .method("id", &[], Type::int(), |t, _| Ok(Value::Int(t.id as i64)))
    .build();

  let container = Container::new();
  // --- Singleton Registration ---
  // The constructor runs once, on first request.
  container
    .add_component("singleton_tracker", Component::constructor(&tracker, []).singleton())
    .unwrap();
  // --- Transient Registration ---
  // The constructor runs on every request.
  container
    .add_component("transient_tracker", Component::constructor(&tracker, []))
    .unwrap();

  println!("--- Resolving Singletons ---");
  let s1 = container.get_component("singleton_tracker").unwrap();
  let s2 = container.get_component("singleton_tracker").unwrap();
  println!("Singleton 1 ID: {}, Singleton 2 ID: {}", tracker_id(&s1), tracker_id(&s2));
  assert_eq!(tracker_id(&s1), 0);
  assert!(s1.ptr_eq(&s2), "Singleton instances should be identical");

  println!("--- Resolving Transients ---");
  let t1 = container.get_component("transient_tracker").unwrap();
  let t2 = container.get_component("transient_tracker").unwrap();
  println!("Transient 1 ID: {}, Transient 2 ID: {}", tracker_id(&t1), tracker_id(&t2));
  assert_eq!(tracker_id(&t1), 1);
  assert_eq!(tracker_id(&t2), 2);
  assert!(!t1.ptr_eq(&t2), "Transient instances should be different");

  // Components compose: call a method on whatever the singleton produces.
  let id = Component::instance_factory(container.reference("singleton_tracker"), "id", []);
  println!("Singleton ID through an instance factory: {}", id.produce().unwrap());
}
