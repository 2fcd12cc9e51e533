//! StyletIoC: a runtime dependency injection container.
//!
//! Services are declared on a [`Builder`], which produces a thread-safe
//! [`Container`]. The container supports:
//! - transient, singleton and per-container lifecycles ([`Scope`])
//! - keyed bindings and multi-bindings resolved as ordered lists
//! - weak bindings that give way to explicit ones
//! - constructor injection with automatic constructor selection, and
//!   member injection into existing values ([`Container::build_up`])
//! - lazy handles ([`Func`]) and generated abstract factories
//! - runtime generics: open bindings closed on demand ([`GenericDefinition`])
//! - child containers that inherit bindings but own their singletons
//!
//! Logging goes through `tracing` when the `tracing` feature is enabled.

pub mod abstract_factory;
pub mod builder;
pub mod builder_upper;
pub mod catalog;
pub mod constructor;
pub mod container;
pub mod creator;
pub mod error;
pub mod func;
pub mod generic;
pub mod global;
pub mod injectable;
pub mod instance;
pub mod macros;
pub mod module;
pub mod registration;
pub mod registration_collection;
pub mod resolve_guard;
pub mod scope;
pub mod service_type;
pub mod unbound_generic;

pub use abstract_factory::*;
pub use builder::*;
pub use builder_upper::*;
pub use catalog::*;
pub use constructor::*;
pub use container::*;
pub use creator::*;
pub use error::*;
pub use func::*;
pub use generic::*;
pub use injectable::*;
pub use instance::*;
pub use module::*;
pub use registration::*;
pub use registration_collection::*;
pub use resolve_guard::*;
pub use scope::*;
pub use service_type::*;
pub use unbound_generic::*;
