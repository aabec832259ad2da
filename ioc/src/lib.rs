//! # Trellis IoC
//!
//! A thread-safe, lazily-evaluated Inversion of Control (IoC) container for Rust.
//!
//! Values are described by [`Component`]s: small recipes that construct objects,
//! call factories, refer to other components, branch on conditions, aggregate
//! collections and inject properties. A [`Container`] maps ids to root
//! components and produces them on demand, by id or by declared type.
//!
//! ## Core Concepts
//!
//! - **Value**: the dynamic result of producing a component. Plain data (ints,
//!   strings, lists, ...) or an [`Object`] wrapping any Rust type.
//! - **Class**: the callable surface of a type (constructors, static factories,
//!   methods, properties), registered explicitly with a [`ClassBuilder`].
//! - **Component**: an immutable recipe. Nothing runs until it is produced.
//! - **Container**: the id registry. Components may refer to ids registered later.
//! - **Documents**: JSON or YAML descriptions of a container, loaded through a
//!   [`ContainerFactory`].
//!
//! ## Quick Start
//!
//! ```
//! use trellis_ioc::{ClassBuilder, Component, Container, Type, Value};
//!
//! struct Greeter {
//!   message: String,
//! }
//!
//! let greeter = ClassBuilder::<Greeter>::named("Greeter")
//!   .constructor(&[Type::string()], |args| Ok(Greeter { message: args.string(0)? }))
//!   .method("greet", &[], Type::string(), |g, _| Ok(Value::from(g.message.as_str())))
//!   .build();
//!
//! let container = Container::new();
//! container.add_component("message", Component::value("Hello, World!")).unwrap();
//! container
//!   .add_component(
//!     "greeter",
//!     Component::constructor(&greeter, [container.reference("message")]).singleton(),
//!   )
//!   .unwrap();
//!
//! let greeting = Component::instance_factory(container.reference("greeter"), "greet", []);
//! assert_eq!(greeting.produce().unwrap(), Value::from("Hello, World!"));
//!
//! let first = container.get_component("greeter").unwrap();
//! let second = container.get_component(greeter.ty()).unwrap();
//! assert!(first.ptr_eq(&second));
//! ```

mod builtins;
mod class;
mod component;
pub mod config;
mod container;
mod core;
mod error;
pub mod invoke;
mod types;
mod value;

pub use class::{Args, Class, ClassBuilder, ClassRegistry, Signature};
pub use component::{Component, CustomComponent, PostProcessor};
pub use config::{ContainerFactory, Document};
pub use container::{Container, Lookup};
pub use crate::core::DEFAULT_MAX_DEPTH;
pub use error::{BoxError, Error, Result};
pub use types::Type;
pub use value::{Object, Value};
