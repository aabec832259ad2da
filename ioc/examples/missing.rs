use tracing_subscriber::EnvFilter;
use trellis_ioc::{Component, Container, Error, Type};

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let container = Container::new();

  println!("Attempting to resolve a component that was never registered...");
  match container.get_component("unregistered") {
    Err(Error::NotFound(lookup)) => println!("Correctly received not-found for {lookup}."),
    other => panic!("Should not have found the component: {other:?}"),
  }

  println!("\nRegistering two strings, then asking for 'the' string...");
  container.add_component("first", Component::value("a")).unwrap();
  container.add_component("second", Component::value("b")).unwrap();
  match container.get_component(Type::string()) {
    Err(Error::Ambiguous { candidates, .. }) => println!("Ambiguous, candidates: {candidates:?}"),
    other => panic!("Expected an ambiguity: {other:?}"),
  }

  println!("\nRegistering an absent component...");
  let err = container.add_component("absent", None::<Component>).unwrap_err();
  println!("Rejected: {err}");
}
