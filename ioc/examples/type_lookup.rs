use tracing_subscriber::EnvFilter;
use trellis_ioc::{invoke, ClassBuilder, Component, Container, Type, Value};

// Interface-style types carry no members; implementations list them as supertypes.
struct EnglishGreeter;
struct SpanishGreeter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let greeter = Type::interface("Greeter");
  let english = ClassBuilder::<EnglishGreeter>::new(&Type::new("EnglishGreeter", [greeter.clone()]))
    .constructor(&[], |_| Ok(EnglishGreeter))
    .method("greet", &[], Type::string(), |_, _| Ok(Value::from("Hello!")))
    .build();
  let spanish = ClassBuilder::<SpanishGreeter>::new(&Type::new("SpanishGreeter", [greeter.clone()]))
    .constructor(&[], |_| Ok(SpanishGreeter))
    .method("greet", &[], Type::string(), |_, _| Ok(Value::from("¡Hola!")))
    .build();

  let container = Container::new();
  container
    .add_component("english", Component::constructor(&english, []).singleton())
    .unwrap();

  // Resolve by the interface instead of the id.
  let service = container.get_component(&greeter).unwrap();
  println!("{}", invoke::call_method(&service, "greet", &[]).unwrap());

  // A second implementation makes the interface lookup ambiguous; ids still work.
  container
    .add_component("spanish", Component::constructor(&spanish, []).singleton())
    .unwrap();
  assert!(container.get_component(&greeter).is_err());
  let service = container.get_component("spanish").unwrap();
  println!("{}", invoke::call_method(&service, "greet", &[]).unwrap());
}
