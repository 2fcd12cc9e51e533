//! Runtime type identities used as registration keys.
//!
//! [`ServiceType`] describes what is being requested: a plain Rust type, a
//! closed or open runtime generic, or one of the two synthesized shapes
//! ("many of T" and "a factory of T"). [`ServiceKey`] pairs it with the
//! optional string key a binding was declared under.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::generic::{GenericArgs, GenericDefinition};

/// Type name and type id of a closed Rust type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub type_name: &'static str,
}

impl TypeInfo {
    pub fn of<T: ?Sized + 'static>() -> TypeInfo {
        TypeInfo {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// A generic definition closed over concrete arguments, e.g. `IValidator<String>`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GenericType {
    pub definition: &'static GenericDefinition,
    pub args: GenericArgs,
}

impl GenericType {
    pub fn new(definition: &'static GenericDefinition, args: Vec<ServiceType>) -> Self {
        Self {
            definition,
            args: GenericArgs::new(args),
        }
    }
}

/// Identity of something that can be requested from the container.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum ServiceType {
    /// A closed Rust type, usually `dyn Trait` or a concrete struct.
    Type(TypeInfo),
    /// A closed instantiation of a runtime generic definition.
    Generic(GenericType),
    /// An open generic definition such as `IValidator<>`.
    OpenGeneric(&'static GenericDefinition),
    /// Every registration of the inner service, in registration order.
    Many(Box<ServiceType>),
    /// A lazy handle resolving the inner service on each call.
    Func(Box<ServiceType>),
}

impl ServiceType {
    pub fn of<S: ?Sized + 'static>() -> Self {
        ServiceType::Type(TypeInfo::of::<S>())
    }

    pub fn generic(definition: &'static GenericDefinition, args: Vec<ServiceType>) -> Self {
        ServiceType::Generic(GenericType::new(definition, args))
    }

    pub fn open(definition: &'static GenericDefinition) -> Self {
        ServiceType::OpenGeneric(definition)
    }

    pub fn many(element: ServiceType) -> Self {
        ServiceType::Many(Box::new(element))
    }

    pub fn func(service: ServiceType) -> Self {
        ServiceType::Func(Box::new(service))
    }

    pub fn is_open_generic(&self) -> bool {
        matches!(self, ServiceType::OpenGeneric(_))
    }

    /// True for shapes that only exist through synthesis.
    pub fn is_synthesized(&self) -> bool {
        matches!(self, ServiceType::Many(_) | ServiceType::Func(_))
    }

    /// Erased Rust type instances of this service are stored as.
    pub fn storage_type(&self) -> Option<TypeInfo> {
        match self {
            ServiceType::Type(info) => Some(*info),
            ServiceType::Generic(generic) => Some(generic.definition.base()),
            ServiceType::OpenGeneric(_) | ServiceType::Many(_) | ServiceType::Func(_) => None,
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceType::Type(info) => f.write_str(info.type_name),
            ServiceType::Generic(generic) => {
                write!(f, "{}<", generic.definition.name())?;
                for (index, arg) in generic.args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            ServiceType::OpenGeneric(definition) => {
                write!(f, "{}<{}>", definition.name(), definition.params().join(", "))
            }
            ServiceType::Many(element) => write!(f, "Many<{}>", element),
            ServiceType::Func(service) => write!(f, "Func<{}>", service),
        }
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A service type together with the key it was registered under.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceKey {
    pub service: ServiceType,
    pub key: Option<Arc<str>>,
}

impl ServiceKey {
    pub fn new(service: ServiceType, key: Option<&str>) -> Self {
        Self {
            service,
            key: key.map(Arc::from),
        }
    }

    pub fn of<S: ?Sized + 'static>(key: Option<&str>) -> Self {
        Self::new(ServiceType::of::<S>(), key)
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Same key, different service type.
    pub fn with_service(&self, service: &ServiceType) -> Self {
        Self {
            service: service.clone(),
            key: self.key.clone(),
        }
    }

    pub(crate) fn service_name(&self) -> String {
        self.service.to_string()
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{} (key '{}')", self.service, key),
            None => write!(f, "{}", self.service),
        }
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Marker: Send + Sync {}

    static LIST: GenericDefinition = GenericDefinition::new("IList", &["T"], TypeInfo::of::<dyn Marker>);

    #[test]
    fn type_info_equality_follows_type_id() {
        assert!(TypeInfo::of::<u32>() == TypeInfo::of::<u32>());
        assert!(TypeInfo::of::<u32>() != TypeInfo::of::<u64>());
        assert_eq!(TypeInfo::of::<dyn Marker>().to_string(), std::any::type_name::<dyn Marker>());
    }

    #[test]
    fn keys_are_structural() {
        let a = ServiceKey::of::<u32>(Some("port"));
        let b = ServiceKey::new(ServiceType::of::<u32>(), Some("port"));
        let c = ServiceKey::of::<u32>(None);
        assert!(a == b);
        assert!(a != c);
        assert_eq!(a.key(), Some("port"));
        assert_eq!(c.key(), None);
    }

    #[test]
    fn display_renders_shapes() {
        let closed = ServiceType::generic(&LIST, vec![ServiceType::of::<String>()]);
        assert_eq!(closed.to_string(), "IList<alloc::string::String>");
        assert_eq!(ServiceType::open(&LIST).to_string(), "IList<T>");
        assert_eq!(ServiceType::many(ServiceType::of::<u8>()).to_string(), "Many<u8>");
        assert_eq!(ServiceType::func(ServiceType::of::<u8>()).to_string(), "Func<u8>");
        assert_eq!(ServiceKey::of::<u8>(Some("k")).to_string(), "u8 (key 'k')");
    }

    #[test]
    fn storage_type_of_generic_is_definition_base() {
        let closed = ServiceType::generic(&LIST, vec![ServiceType::of::<String>()]);
        assert!(closed.storage_type() == Some(TypeInfo::of::<dyn Marker>()));
        assert!(ServiceType::open(&LIST).storage_type().is_none());
        assert!(ServiceType::many(closed).is_synthesized());
    }
}
