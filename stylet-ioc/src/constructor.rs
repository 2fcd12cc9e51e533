//! Constructor descriptions.
//!
//! Rust has no runtime reflection over constructors, so an [`Injectable`]
//! type lists its constructors explicitly: a name, the ordered
//! [`Parameter`]s the container should resolve, and a closure that receives
//! the resolved values through [`Arguments`] and returns the value.
//!
//! ```
//! use std::sync::Arc;
//! use stylet_ioc::{Component, Constructor, Injectable, Parameter};
//!
//! trait Clock: Send + Sync {}
//!
//! struct Scheduler {
//!     clock: Option<Arc<dyn Clock>>,
//! }
//!
//! impl Component for Scheduler {}
//!
//! impl Injectable for Scheduler {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![
//!             Constructor::new("new", |args| Ok(Scheduler { clock: args.next_optional()? }))
//!                 .param(Parameter::of::<dyn Clock>("clock").with_default()),
//!         ]
//!     }
//! }
//! ```
//!
//! [`Injectable`]: crate::Injectable

use std::sync::Arc;

use crate::container::Container;
use crate::error::{Error, ErrorKind};
use crate::func::Func;
use crate::injectable::Component;
use crate::instance::Instance;
use crate::service_type::{ServiceKey, ServiceType};

/// One constructor parameter: what to resolve and under which key.
#[derive(Clone)]
pub struct Parameter {
    name: &'static str,
    service: ServiceType,
    key: Option<String>,
    has_default: bool,
}

impl Parameter {
    /// A single service of type `S`.
    pub fn of<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self::service(name, ServiceType::of::<S>())
    }

    /// Every registration of `S`.
    pub fn all<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self::service(name, ServiceType::many(ServiceType::of::<S>()))
    }

    /// A lazy handle to `S`.
    pub fn func<S: ?Sized + 'static>(name: &'static str) -> Self {
        Self::service(name, ServiceType::func(ServiceType::of::<S>()))
    }

    /// Any service type, including closed runtime generics.
    pub fn service(name: &'static str, service: ServiceType) -> Self {
        Self {
            name,
            service,
            key: None,
            has_default: false,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The parameter may be left unresolved; the constructor then receives
    /// `None` and uses its own default.
    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn service_type(&self) -> &ServiceType {
        &self.service
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn has_default(&self) -> bool {
        self.has_default
    }

    pub(crate) fn service_key(&self) -> ServiceKey {
        ServiceKey::new(self.service.clone(), self.key.as_deref())
    }
}

/// Resolved constructor arguments, consumed in parameter order.
pub struct Arguments<'a> {
    values: std::vec::IntoIter<(&'static str, Option<Instance>)>,
    context: &'a Container,
}

impl<'a> Arguments<'a> {
    pub(crate) fn new(values: Vec<(&'static str, Option<Instance>)>, context: &'a Container) -> Self {
        Self {
            values: values.into_iter(),
            context,
        }
    }

    /// The container performing the construction.
    pub fn context(&self) -> &'a Container {
        self.context
    }

    /// Next argument as an erased instance. `None` means a defaulted
    /// parameter the container could not resolve.
    pub fn next_instance(&mut self) -> Result<Option<Instance>, Error> {
        self.values
            .next()
            .map(|(_, value)| value)
            .ok_or_else(|| Error::new(ErrorKind::ConstructorSelection, "Constructor read more arguments than it declares"))
    }

    pub fn next<S: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<S>, Error> {
        let name = self.peek_name();
        match self.next_instance()? {
            Some(instance) => instance.downcast::<S>(),
            None => Err(Error::new(
                ErrorKind::ConstructorSelection,
                format!("Parameter '{}' was not resolved; read it with next_optional", name),
            )),
        }
    }

    pub fn next_optional<S: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<S>>, Error> {
        self.next_instance()?
            .map(|instance| instance.downcast::<S>())
            .transpose()
    }

    pub fn next_all<S: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<S>>, Error> {
        match self.next_instance()? {
            Some(instance) => instance.as_list()?.downcast_all::<S>(),
            None => Ok(Vec::new()),
        }
    }

    pub fn next_func<S: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Func<S>, Error> {
        let name = self.peek_name();
        match self.next_instance()? {
            Some(instance) => Func::from_instance(&instance),
            None => Err(Error::new(
                ErrorKind::ConstructorSelection,
                format!("Parameter '{}' was not resolved", name),
            )),
        }
    }

    fn peek_name(&self) -> &'static str {
        self.values.as_slice().first().map(|(name, _)| *name).unwrap_or("<none>")
    }
}

type Build<T> = Arc<dyn Fn(&mut Arguments<'_>) -> Result<T, Error> + Send + Sync>;

/// A constructor of `T`.
pub struct Constructor<T> {
    name: &'static str,
    preferred: bool,
    params: Vec<Parameter>,
    build: Build<T>,
}

impl<T: Component> Constructor<T> {
    pub fn new<F>(name: &'static str, build: F) -> Self
    where
        F: Fn(&mut Arguments<'_>) -> Result<T, Error> + Send + Sync + 'static,
    {
        Self {
            name,
            preferred: false,
            params: Vec::new(),
            build: Arc::new(build),
        }
    }

    pub fn param(mut self, parameter: Parameter) -> Self {
        self.params.push(parameter);
        self
    }

    /// Marks this constructor as the one to use, bypassing selection.
    pub fn preferred(mut self) -> Self {
        self.preferred = true;
        self
    }

    /// Erases the constructed type. The plan builds the value, injects its
    /// members and captures its disposal hook.
    pub fn into_plan(self) -> ConstructorPlan {
        let build = self.build;
        ConstructorPlan {
            name: self.name,
            preferred: self.preferred,
            params: self.params,
            build: Arc::new(move |args: &mut Arguments<'_>| {
                let value = build(args)?;
                complete(value, args.context())
            }),
        }
    }
}

/// Injects the members of a freshly produced component and captures its
/// disposal hook.
pub(crate) fn complete<T: Component>(mut value: T, context: &Container) -> Result<Instance, Error> {
    context.build_up(&mut value)?;
    let value = Arc::new(value);
    let instance = Instance::new(value.clone());
    if value.as_disposable().is_none() {
        return Ok(instance);
    }
    Ok(instance.with_release(Arc::new(move || {
        if let Some(disposable) = value.as_disposable() {
            disposable.dispose();
        }
    })))
}

/// A type-erased constructor, ready for selection.
#[derive(Clone)]
pub struct ConstructorPlan {
    name: &'static str,
    preferred: bool,
    params: Vec<Parameter>,
    build: Build<Instance>,
}

impl ConstructorPlan {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_preferred(&self) -> bool {
        self.preferred
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub(crate) fn invoke(&self, args: &mut Arguments<'_>) -> Result<Instance, Error> {
        (self.build)(args)
    }
}

impl<T: Component> From<Constructor<T>> for ConstructorPlan {
    fn from(constructor: Constructor<T>) -> Self {
        constructor.into_plan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    struct Port(u16);

    impl Component for Port {}

    #[test]
    fn parameter_shapes() {
        let single = Parameter::of::<Port>("port").with_key("admin");
        assert_eq!(single.name(), "port");
        assert_eq!(single.key(), Some("admin"));
        assert!(!single.has_default());
        assert!(single.service_key() == ServiceKey::of::<Port>(Some("admin")));

        let all = Parameter::all::<Port>("ports").with_default();
        assert!(all.has_default());
        assert!(*all.service_type() == ServiceType::many(ServiceType::of::<Port>()));

        let func = Parameter::func::<Port>("factory");
        assert!(*func.service_type() == ServiceType::func(ServiceType::of::<Port>()));
    }

    #[test]
    fn arguments_are_consumed_in_order() {
        let container = Builder::new().build_container().unwrap();
        let values = vec![
            ("first", Some(Instance::new(Arc::new(1u8)))),
            ("second", None),
            ("third", Some(Instance::list(vec![Instance::new(Arc::new(3u8))]))),
        ];
        let mut args = Arguments::new(values, &container);
        assert_eq!(*args.next::<u8>().unwrap(), 1);
        assert!(args.next_optional::<u8>().unwrap().is_none());
        assert_eq!(args.next_all::<u8>().unwrap().len(), 1);
        assert!(args.next_instance().is_err());
    }

    #[test]
    fn missing_required_argument_names_parameter() {
        let container = Builder::new().build_container().unwrap();
        let mut args = Arguments::new(vec![("logger", None)], &container);
        let err = args.next::<u8>().err().expect("missing");
        assert!(err.message.contains("'logger'"));
    }

    #[test]
    fn plan_builds_and_keeps_metadata() {
        let container = Builder::new().build_container().unwrap();
        let plan = Constructor::new("with_port", |args| Ok(Port(*args.next::<u16>()?)))
            .param(Parameter::of::<u16>("port"))
            .preferred()
            .into_plan();
        assert_eq!(plan.name(), "with_port");
        assert!(plan.is_preferred());
        assert_eq!(plan.params().len(), 1);

        let mut args = Arguments::new(vec![("port", Some(Instance::new(Arc::new(8080u16))))], &container);
        let instance = plan.invoke(&mut args).unwrap();
        assert_eq!(instance.downcast::<Port>().unwrap().0, 8080);
        assert!(!instance.is_disposable());
    }
}
