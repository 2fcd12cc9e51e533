//! Runtime generics.
//!
//! Rust generics are monomorphised at compile time, so services like
//! `IValidator<T>` that must be closed on demand are described with static
//! tables instead. A [`GenericDefinition`] names the definition and its type
//! parameters; a [`GenericImplementation`] lists which definitions it
//! implements and how its own parameters map onto theirs, using
//! [`TypePattern`]s. When a closed service like `IValidator<String>` is
//! requested, the pattern is unified against the requested arguments to
//! recover the implementation's arguments.
//!
//! All instances of a generic definition are stored as one erased Rust type,
//! its `base` (typically a `dyn Trait`), so a closed generic service is
//! downcast exactly like a plain one.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::constructor::ConstructorPlan;
use crate::error::Error;
use crate::instance::Instance;
use crate::service_type::{GenericType, ServiceType, TypeInfo};

/// A generic definition such as `IValidator<T>`.
pub struct GenericDefinition {
    name: &'static str,
    params: &'static [&'static str],
    base: fn() -> TypeInfo,
}

impl GenericDefinition {
    pub const fn new(name: &'static str, params: &'static [&'static str], base: fn() -> TypeInfo) -> Self {
        Self { name, params, base }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn params(&self) -> &'static [&'static str] {
        self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Rust type every closed instance of this definition is stored as.
    pub fn base(&self) -> TypeInfo {
        (self.base)()
    }
}

impl PartialEq for GenericDefinition {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other) || (self.name == other.name && self.base() == other.base())
    }
}

impl Eq for GenericDefinition {}

impl Hash for GenericDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.base().hash(state);
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for GenericDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<{}>", self.name, self.params.join(", "))
    }
}

/// Closed type arguments of a generic.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct GenericArgs(Arc<[ServiceType]>);

impl GenericArgs {
    pub fn new(args: Vec<ServiceType>) -> Self {
        Self(args.into())
    }

    pub fn get(&self, index: usize) -> Option<&ServiceType> {
        self.0.get(index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ServiceType> {
        self.0.iter()
    }
}

impl fmt::Display for GenericArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, arg) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", arg)?;
        }
        Ok(())
    }
}

/// Shape of one type argument, in terms of an implementation's parameters.
pub enum TypePattern {
    /// One of the implementation's own type parameters.
    Param(&'static str),
    /// A fixed closed type.
    Type(fn() -> TypeInfo),
    /// A generic closed over further patterns.
    Generic(&'static GenericDefinition, &'static [TypePattern]),
}

type Bindings = Vec<(&'static str, ServiceType)>;

impl TypePattern {
    fn unify(&self, actual: &ServiceType, bindings: &mut Bindings) -> bool {
        match self {
            TypePattern::Param(name) => match bindings.iter().find(|(bound, _)| bound == name) {
                Some((_, existing)) => existing == actual,
                None => {
                    bindings.push((*name, actual.clone()));
                    true
                }
            },
            TypePattern::Type(info) => *actual == ServiceType::Type(info()),
            TypePattern::Generic(definition, patterns) => match actual {
                ServiceType::Generic(generic) => {
                    generic.definition == *definition
                        && generic.args.len() == patterns.len()
                        && patterns
                            .iter()
                            .zip(generic.args.iter())
                            .all(|(pattern, arg)| pattern.unify(arg, bindings))
                }
                _ => false,
            },
        }
    }

    fn mentions(&self, param: &str) -> bool {
        match self {
            TypePattern::Param(name) => *name == param,
            TypePattern::Type(_) => false,
            TypePattern::Generic(_, patterns) => patterns.iter().any(|p| p.mentions(param)),
        }
    }
}

/// One service definition a generic implementation can stand in for.
pub struct GenericInterface {
    pub service: &'static GenericDefinition,
    /// The service's arguments written in terms of the implementation's parameters.
    pub args: &'static [TypePattern],
    /// Converts an instance stored as the implementation's base into the
    /// service's base.
    pub upcast: fn(Instance) -> Result<Instance, Error>,
}

/// A generic concrete type, e.g. `Validator<T>: IValidator<T>`.
pub struct GenericImplementation {
    pub definition: GenericDefinition,
    pub implements: &'static [GenericInterface],
    /// Constructors of the implementation closed over the given arguments.
    pub constructors: fn(&GenericArgs) -> Vec<ConstructorPlan>,
}

/// An implementation closed for one requested service.
pub(crate) struct ClosedImplementation {
    pub(crate) implementation: GenericType,
    pub(crate) upcast: fn(Instance) -> Result<Instance, Error>,
    pub(crate) constructors: Vec<ConstructorPlan>,
}

impl GenericImplementation {
    pub fn name(&self) -> &'static str {
        self.definition.name()
    }

    fn interface_for(&self, service: &GenericDefinition) -> Option<&GenericInterface> {
        self.implements.iter().find(|interface| interface.service == service)
    }

    pub fn implements_definition(&self, service: &GenericDefinition) -> bool {
        self.interface_for(service).is_some()
    }

    /// Checks that binding the open `service` to this implementation can
    /// ever produce a closed type.
    pub(crate) fn check_open_binding(&self, service: &'static GenericDefinition) -> Result<(), Error> {
        let service_name = ServiceType::open(service).to_string();
        let interface = self
            .interface_for(service)
            .ok_or_else(|| Error::not_implemented(&service_name, self.name()))?;

        if service.arity() != self.definition.arity() {
            return Err(Error::generic_arity_mismatch(
                &service_name,
                service.arity(),
                self.name(),
                self.definition.arity(),
            ));
        }
        if interface.args.len() != service.arity() {
            return Err(Error::invalid_binding(
                &service_name,
                &format!("{} declares the wrong number of service arguments", self.name()),
            ));
        }
        if let Some(param) = self
            .definition
            .params()
            .iter()
            .find(|param| !interface.args.iter().any(|pattern| pattern.mentions(param)))
        {
            return Err(Error::invalid_binding(
                &service_name,
                &format!(
                    "type parameter {} of {} cannot be inferred from the service",
                    param,
                    self.name()
                ),
            ));
        }
        Ok(())
    }

    /// Unifies the requested arguments against the declared pattern and
    /// returns the implementation's own arguments.
    fn infer_args(&self, service: &GenericType) -> Option<(&GenericInterface, Vec<ServiceType>)> {
        let interface = self.interface_for(service.definition)?;
        if interface.args.len() != service.args.len() {
            return None;
        }

        let mut bindings = Bindings::new();
        for (pattern, arg) in interface.args.iter().zip(service.args.iter()) {
            if !pattern.unify(arg, &mut bindings) {
                return None;
            }
        }

        let args = self
            .definition
            .params()
            .iter()
            .map(|param| {
                bindings
                    .iter()
                    .find(|(name, _)| name == param)
                    .map(|(_, bound)| bound.clone())
            })
            .collect::<Option<Vec<_>>>()?;
        Some((interface, args))
    }

    /// True if this implementation can be closed for `service`.
    pub fn can_close(&self, service: &GenericType) -> bool {
        self.infer_args(service).is_some()
    }

    /// Closes this implementation for `service`, or `None` if the requested
    /// arguments do not fit its declared pattern.
    pub(crate) fn close(&'static self, service: &GenericType) -> Option<ClosedImplementation> {
        let (interface, args) = self.infer_args(service)?;
        let implementation = GenericType::new(&self.definition, args);
        let constructors = (self.constructors)(&implementation.args);
        Some(ClosedImplementation {
            implementation,
            upcast: interface.upcast,
            constructors,
        })
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for GenericImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericImplementation")
            .field("definition", &self.definition)
            .field(
                "implements",
                &self.implements.iter().map(|i| i.service.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Shape: Send + Sync {}
    trait Pair: Send + Sync {}

    fn same(instance: Instance) -> Result<Instance, Error> {
        Ok(instance)
    }

    fn no_constructors(_: &GenericArgs) -> Vec<ConstructorPlan> {
        Vec::new()
    }

    static SHAPE: GenericDefinition = GenericDefinition::new("IShape", &["T"], TypeInfo::of::<dyn Shape>);
    static PAIR: GenericDefinition = GenericDefinition::new("IPair", &["K", "V"], TypeInfo::of::<dyn Pair>);

    static SQUARE: GenericImplementation = GenericImplementation {
        definition: GenericDefinition::new("Square", &["T"], TypeInfo::of::<dyn Shape>),
        implements: &[GenericInterface {
            service: &SHAPE,
            args: &[TypePattern::Param("T")],
            upcast: same,
        }],
        constructors: no_constructors,
    };

    // Only implements IPair<K, K>.
    static SYMMETRIC: GenericImplementation = GenericImplementation {
        definition: GenericDefinition::new("Symmetric", &["K"], TypeInfo::of::<dyn Pair>),
        implements: &[GenericInterface {
            service: &PAIR,
            args: &[TypePattern::Param("K"), TypePattern::Param("K")],
            upcast: same,
        }],
        constructors: no_constructors,
    };

    static KEYED: GenericImplementation = GenericImplementation {
        definition: GenericDefinition::new("Keyed", &["V"], TypeInfo::of::<dyn Pair>),
        implements: &[GenericInterface {
            service: &PAIR,
            args: &[TypePattern::Type(TypeInfo::of::<String>), TypePattern::Param("V")],
            upcast: same,
        }],
        constructors: no_constructors,
    };

    static LOOSE: GenericImplementation = GenericImplementation {
        definition: GenericDefinition::new("Loose", &["T", "U"], TypeInfo::of::<dyn Pair>),
        implements: &[GenericInterface {
            service: &PAIR,
            args: &[TypePattern::Param("T"), TypePattern::Param("T")],
            upcast: same,
        }],
        constructors: no_constructors,
    };

    fn closed(definition: &'static GenericDefinition, args: Vec<ServiceType>) -> GenericType {
        GenericType::new(definition, args)
    }

    #[test]
    fn closes_over_requested_argument() {
        let service = closed(&SHAPE, vec![ServiceType::of::<u32>()]);
        let result = SQUARE.close(&service).expect("closes");
        assert_eq!(ServiceType::Generic(result.implementation).to_string(), "Square<u32>");
    }

    #[test]
    fn repeated_parameter_must_agree() {
        let agree = closed(&PAIR, vec![ServiceType::of::<u8>(), ServiceType::of::<u8>()]);
        let differ = closed(&PAIR, vec![ServiceType::of::<u8>(), ServiceType::of::<u16>()]);
        assert!(SYMMETRIC.close(&agree).is_some());
        assert!(SYMMETRIC.close(&differ).is_none());
        assert!(SYMMETRIC.can_close(&agree));
        assert!(!SYMMETRIC.can_close(&differ));
    }

    #[test]
    fn fixed_argument_must_match() {
        let matching = closed(&PAIR, vec![ServiceType::of::<String>(), ServiceType::of::<u8>()]);
        let other = closed(&PAIR, vec![ServiceType::of::<u8>(), ServiceType::of::<u8>()]);
        assert!(KEYED.close(&matching).is_some());
        assert!(KEYED.close(&other).is_none());
    }

    #[test]
    fn open_binding_checks() {
        assert!(SQUARE.check_open_binding(&SHAPE).is_ok());

        let err = SQUARE.check_open_binding(&PAIR).unwrap_err();
        assert!(err.message.contains("does not implement"));

        let err = SYMMETRIC.check_open_binding(&PAIR).unwrap_err();
        assert!(err.message.contains("has 2 type parameter(s)"));

        let err = LOOSE.check_open_binding(&PAIR).unwrap_err();
        assert!(err.message.contains("type parameter U"));
    }

    #[test]
    fn definitions_compare_by_name_and_base() {
        assert!(SHAPE == SHAPE);
        assert!(SHAPE != PAIR);
        assert!(SQUARE.implements_definition(&SHAPE));
        assert!(!SQUARE.implements_definition(&PAIR));
    }
}
