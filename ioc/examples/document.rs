use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use trellis_ioc::{ClassBuilder, ClassRegistry, ContainerFactory, Type, Value};

#[derive(Debug, Default)]
struct Student {
  id: i64,
  name: String,
}

const DOCUMENT: &str = r#"{
  "typeAliases": { "S": "Student" },
  "components": {
    "prefix": "Student #",
    "student": {
      "constructor": "S",
      "properties": { "id": 1001, "name": "XiaoMing" },
      "singleton": true
    },
    "label": {
      "instance": { "ref": "prefix" },
      "factory": "concat",
      "parameters": [{ "type": "string", "factory": "valueOf", "parameters": [1001] }]
    },
    "greeting": {
      "if": { "instance": { "ref": "label" }, "factory": "isEmpty" },
      "then": "nobody",
      "else": { "ref": "label" }
    }
  }
}"#;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .init();

  let classes = ClassRegistry::new();
  classes.register(
    ClassBuilder::<Student>::named("Student")
      .constructor(&[], |_| Ok(Student::default()))
      .property("id", Type::int(), |s, args| {
        s.id = args.int(0)?;
        Ok(())
      })
      .property("name", Type::string(), |s, args| {
        s.name = args.string(0)?;
        Ok(())
      })
      .build(),
  );

  let container = ContainerFactory::new(Arc::new(classes))
    .from_json_str(DOCUMENT)
    .unwrap();
  println!("Loaded components: {:?}", container.ids());

  let student = container.get_component("student").unwrap();
  if let Some(s) = student.as_object().and_then(|o| o.read::<Student>()) {
    println!("student = {s:?}");
  }
  let greeting = container.get_component("greeting").unwrap();
  println!("greeting = {greeting}");
  assert_eq!(greeting, Value::from("Student #1001"));
}
