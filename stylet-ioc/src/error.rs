//! Error types for the StyletIoC container.
//!
//! A single lightweight error model is shared by the builder, the container
//! and the creators. It describes failures that occur while declaring
//! bindings, selecting constructors, generating abstract factories and
//! resolving services.
//!
//! # Design
//!
//! - `ErrorKind` captures the error category and is meant for programmatic
//!   handling.
//! - `Error` stores the category and a human-readable message naming the
//!   offending service, key, implementation or parameter.
//!
//! The helper constructors on `Error` keep call sites concise and the
//! messages consistent.
//!
//! # Feature Flags
//!
//! - `tracing`: logs errors when they are created.
//! - `debug`: enables extra diagnostic formatting in `Display`.
//!
//! # Examples
//!
//! ```
//! use stylet_ioc::{Error, ErrorKind};
//!
//! let err = Error::no_registration("dyn app::Logger", None);
//! assert_eq!(err.kind, ErrorKind::Registration);
//! assert!(err.message.contains("dyn app::Logger"));
//! ```

use core::fmt;

#[cfg(feature = "tracing")]
use tracing::{error, warn};

/// Error categories for the container.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub enum ErrorKind {
    /// A binding is structurally invalid, or a lookup found zero or several
    /// registrations where exactly one was required.
    Registration,
    /// No constructor could be chosen for a concrete type, or the preferred
    /// constructor has parameters that cannot be satisfied.
    ConstructorSelection,
    /// An abstract factory declaration has an unsupported shape.
    FactoryCreation,
    /// The container was used after it was disposed.
    DisposedAccess,
    /// An erased instance did not have the requested Rust type.
    TypeMismatch,
    /// A service (indirectly) requires itself while being constructed.
    CircularDependency,
}

/// Container error structure.
///
/// `kind` enables programmatic handling, while `message` is human-readable.
#[derive(Clone)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

fn describe_key(key: Option<&str>) -> String {
    match key {
        Some(key) => format!("key '{}'", key),
        None => "no key".to_string(),
    }
}

impl Error {
    /// Creates a new error with the given kind and message.
    ///
    /// If the `tracing` feature is enabled, the error is logged right away:
    /// registration problems as warnings, everything else as errors.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let error = Self {
            kind,
            message: message.into(),
        };

        #[cfg(feature = "tracing")]
        if kind == ErrorKind::Registration {
            warn!("{}", error);
        } else {
            error!("{}", error);
        }

        error
    }

    /// No registration exists for the requested service and key.
    pub fn no_registration(service: &str, key: Option<&str>) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!(
                "No registrations found for service {} with {}",
                service,
                describe_key(key)
            ),
        )
    }

    /// More than one registration exists where exactly one was required.
    pub fn ambiguous_registration(service: &str, key: Option<&str>, count: usize) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!(
                "Found {} registrations for service {} with {}; expected exactly one. \
                 Use get_all to resolve all of them",
                count,
                service,
                describe_key(key)
            ),
        )
    }

    /// The same implementation was registered twice for one service and key.
    pub fn duplicate_registration(service: &str, key: Option<&str>, implementation: &str) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!(
                "Multiple registrations for service {} with {} and implementation {}",
                service,
                describe_key(key),
                describe_implementation(implementation)
            ),
        )
    }

    /// An implementation cannot stand in for the service it was bound to.
    pub fn not_implemented(service: &str, implementation: &str) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!(
                "Type {} does not implement service {}",
                implementation, service
            ),
        )
    }

    /// A binding was declared in a way that is never valid.
    pub fn invalid_binding(service: &str, reason: &str) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!("Invalid binding for service {}: {}", service, reason),
        )
    }

    /// Open generic service and implementation disagree on arity.
    pub fn generic_arity_mismatch(
        service: &str,
        service_arity: usize,
        implementation: &str,
        implementation_arity: usize,
    ) -> Self {
        Self::new(
            ErrorKind::Registration,
            format!(
                "Open generic service {} has {} type parameter(s) but implementation {} has {}",
                service, service_arity, implementation, implementation_arity
            ),
        )
    }

    /// No constructor of a type qualified.
    pub fn no_constructor(implementation: &str, details: &str) -> Self {
        Self::new(
            ErrorKind::ConstructorSelection,
            format!(
                "Unable to find a constructor for type {} which we can call: {}",
                implementation, details
            ),
        )
    }

    /// Several constructors carry the preferred marker.
    pub fn multiple_preferred_constructors(implementation: &str) -> Self {
        Self::new(
            ErrorKind::ConstructorSelection,
            format!(
                "Found more than one constructor marked as preferred on type {}",
                implementation
            ),
        )
    }

    /// The preferred constructor has a parameter the container cannot satisfy.
    pub fn unresolvable_parameter(
        implementation: &str,
        constructor: &str,
        parameter: &str,
        service: &str,
        key: Option<&str>,
    ) -> Self {
        Self::new(
            ErrorKind::ConstructorSelection,
            format!(
                "Found a preferred constructor {}::{} but its parameter '{}' ({} with {}) \
                 cannot be resolved and has no default value",
                implementation,
                constructor,
                parameter,
                service,
                describe_key(key)
            ),
        )
    }

    /// An abstract factory declaration failed validation.
    pub fn factory_creation(interface: &str, reason: &str) -> Self {
        Self::new(
            ErrorKind::FactoryCreation,
            format!("Unable to create abstract factory {}: {}", interface, reason),
        )
    }

    /// The container has already been disposed.
    pub fn disposed(operation: &str) -> Self {
        Self::new(
            ErrorKind::DisposedAccess,
            format!("Cannot {}: the container has been disposed", operation),
        )
    }

    /// An erased instance failed to downcast.
    pub fn type_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorKind::TypeMismatch,
            format!(
                "Type mismatch: requested {} but the instance is {}",
                expected, actual
            ),
        )
    }

    /// Circular dependency detected in the resolution chain.
    pub fn circular_dependency(dependency_chain: &[&str]) -> Self {
        Self::new(
            ErrorKind::CircularDependency,
            format!(
                "Circular dependency detected: {}",
                dependency_chain.join(" -> ")
            ),
        )
    }
}

fn describe_implementation(implementation: &str) -> &str {
    if implementation.is_empty() {
        "<factory>"
    } else {
        implementation
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        #[cfg(feature = "debug")]
        {
            write!(f, "({:?}) - {}", self.kind, self.message)
        }
        #[cfg(not(feature = "debug"))]
        {
            write!(f, "{}", self.message)
        }
    }
}

#[cfg(feature = "debug")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_registration_names_service_and_key() {
        let err = Error::no_registration("dyn app::Foo", Some("primary"));
        assert_eq!(err.kind, ErrorKind::Registration);
        assert!(err.message.contains("dyn app::Foo"));
        assert!(err.message.contains("'primary'"));
    }

    #[test]
    fn ambiguous_registration_reports_count() {
        let err = Error::ambiguous_registration("Foo", None, 3);
        assert_eq!(err.kind, ErrorKind::Registration);
        assert!(err.message.contains("Found 3 registrations"));
        assert!(err.message.contains("no key"));
    }

    #[test]
    fn unresolvable_parameter_names_parameter() {
        let err = Error::unresolvable_parameter("app::Svc", "new", "logger", "dyn app::Log", None);
        assert_eq!(err.kind, ErrorKind::ConstructorSelection);
        assert!(err.message.contains("app::Svc::new"));
        assert!(err.message.contains("'logger'"));
    }

    #[test]
    fn circular_dependency_error() {
        let chain = ["A", "B", "A"];
        let err = Error::circular_dependency(&chain);
        assert_eq!(err.kind, ErrorKind::CircularDependency);
        assert!(err.message.contains("A -> B -> A"));
    }

    #[test]
    fn display_trait() {
        let err = Error::disposed("resolve services");
        let s = format!("{}", err);
        #[cfg(feature = "debug")]
        assert!(s.contains("DisposedAccess"));
        assert!(s.contains("disposed"));
    }

    #[test]
    fn factory_duplicate_uses_placeholder() {
        let err = Error::duplicate_registration("Foo", None, "");
        assert!(err.message.contains("<factory>"));
    }
}
