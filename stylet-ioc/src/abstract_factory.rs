//! Abstract factories: traits whose implementation the container provides.
//!
//! An abstract factory is a trait of methods that each return a service,
//! optionally taking one `&str` key. The [`abstract_factory!`] macro declares
//! such a trait and generates its implementation on top of
//! [`FactoryProxy`], which forwards every call to the container:
//!
//! ```
//! use std::sync::Arc;
//! use stylet_ioc::{abstract_factory, Builder, Component, Constructor, Error, Injectable};
//!
//! struct Report;
//! impl Component for Report {}
//! impl Injectable for Report {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |_| Ok(Report))]
//!     }
//! }
//!
//! abstract_factory! {
//!     pub trait ReportFactory {
//!         fn create(&self) -> Result<Arc<Report>, Error>;
//!     }
//! }
//!
//! let mut builder = Builder::new();
//! builder.bind::<Report>().to_self();
//! builder.bind::<dyn ReportFactory>().to_abstract_factory().unwrap();
//! let container = builder.build_container().unwrap();
//!
//! let factory = container.get::<dyn ReportFactory>(None).unwrap();
//! assert!(factory.create().is_ok());
//! ```
//!
//! [`abstract_factory!`]: crate::abstract_factory

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::{Container, WeakContainer};
use crate::error::Error;
use crate::func::Func;
use crate::service_type::{ServiceType, TypeInfo};

/// A parameter of a factory method.
#[derive(Clone)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct FactoryParameter {
    pub name: &'static str,
    pub type_name: &'static str,
}

/// One method of an abstract factory.
#[derive(Clone)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct FactoryMethod {
    pub name: &'static str,
    pub parameters: Vec<FactoryParameter>,
    /// `None` for a method that returns nothing.
    pub returns: Option<ServiceType>,
    /// Key used when the method takes no key argument.
    pub key: Option<&'static str>,
}

impl FactoryMethod {
    pub fn new(name: &'static str, returns: Option<ServiceType>) -> Self {
        Self {
            name,
            parameters: Vec::new(),
            returns,
            key: None,
        }
    }

    pub fn with_key(mut self, key: &'static str) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_parameter(mut self, name: &'static str, type_name: &'static str) -> Self {
        self.parameters.push(FactoryParameter { name, type_name });
        self
    }
}

impl fmt::Display for FactoryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parameters: Vec<String> = self
            .parameters
            .iter()
            .map(|parameter| format!("{}: {}", parameter.name, parameter.type_name))
            .collect();
        write!(f, "{}({})", self.name, parameters.join(", "))
    }
}

/// The shape of an abstract factory trait.
#[derive(Clone)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct FactoryDescriptor {
    pub interface: TypeInfo,
    pub methods: Vec<FactoryMethod>,
}

impl FactoryDescriptor {
    pub fn new(interface: TypeInfo, methods: Vec<FactoryMethod>) -> Self {
        Self { interface, methods }
    }

    /// Checks the shape: a trait object with at least one method, each
    /// returning a service and taking at most one `&str` key.
    pub fn validate(&self) -> Result<(), Error> {
        let interface = self.interface.type_name;
        if !interface.starts_with("dyn ") {
            return Err(Error::factory_creation(interface, "only trait objects can be abstract factories"));
        }
        if self.methods.is_empty() {
            return Err(Error::factory_creation(interface, "it declares no methods"));
        }
        for method in &self.methods {
            if method.parameters.len() > 1 {
                return Err(Error::factory_creation(
                    interface,
                    &format!("method {} takes more than one parameter", method),
                ));
            }
            if let Some(parameter) = method.parameters.iter().find(|parameter| parameter.type_name != "&str") {
                return Err(Error::factory_creation(
                    interface,
                    &format!(
                        "parameter {} of method {} must be a &str key, not {}",
                        parameter.name, method.name, parameter.type_name
                    ),
                ));
            }
            if method.returns.is_none() {
                return Err(Error::factory_creation(
                    interface,
                    &format!("method {} returns nothing", method),
                ));
            }
        }
        Ok(())
    }
}

/// A trait object the container can implement.
///
/// Normally implemented by [`abstract_factory!`](crate::abstract_factory).
pub trait AbstractFactory: Send + Sync + 'static {
    fn descriptor() -> FactoryDescriptor;

    /// The generated implementation, forwarding to `context`.
    fn create(context: Container) -> Arc<Self>;
}

/// A return type an abstract factory method may have.
pub trait FactoryOutput {
    fn service() -> ServiceType;

    fn produce(context: &Container, key: Option<&str>) -> Self;

    /// The value returned when the container is gone.
    fn failed(err: Error) -> Self;
}

impl<S: ?Sized + Send + Sync + 'static> FactoryOutput for Result<Arc<S>, Error> {
    fn service() -> ServiceType {
        ServiceType::of::<S>()
    }

    fn produce(context: &Container, key: Option<&str>) -> Self {
        context.get_type_or_all(&Self::service(), key)?.downcast::<S>()
    }

    fn failed(err: Error) -> Self {
        Err(err)
    }
}

impl<S: ?Sized + Send + Sync + 'static> FactoryOutput for Result<Vec<Arc<S>>, Error> {
    fn service() -> ServiceType {
        ServiceType::many(ServiceType::of::<S>())
    }

    fn produce(context: &Container, key: Option<&str>) -> Self {
        context.get_type_or_all(&Self::service(), key)?.as_list()?.downcast_all::<S>()
    }

    fn failed(err: Error) -> Self {
        Err(err)
    }
}

impl<S: ?Sized + Send + Sync + 'static> FactoryOutput for Result<Func<S>, Error> {
    fn service() -> ServiceType {
        ServiceType::func(ServiceType::of::<S>())
    }

    fn produce(context: &Container, key: Option<&str>) -> Self {
        Func::from_instance(&context.get_type_or_all(&Self::service(), key)?)
    }

    fn failed(err: Error) -> Self {
        Err(err)
    }
}

/// The generated implementation of an abstract factory `F`.
///
/// Holds its container weakly, so a factory cached as a singleton does not
/// keep the container alive.
pub struct FactoryProxy<F: ?Sized> {
    context: WeakContainer,
    _factory: PhantomData<fn() -> Box<F>>,
}

impl<F: ?Sized> FactoryProxy<F> {
    pub fn new(context: Container) -> Self {
        Self {
            context: context.downgrade(),
            _factory: PhantomData,
        }
    }

    pub fn invoke<R: FactoryOutput>(&self, key: Option<&str>) -> R {
        match self.context.upgrade() {
            Ok(context) => R::produce(&context, key),
            Err(err) => R::failed(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::constructor::Constructor;
    use crate::error::ErrorKind;
    use crate::injectable::{Component, Injectable};

    trait Widget: Send + Sync {
        fn label(&self) -> &'static str;
    }

    struct Button;
    struct Slider;

    impl Widget for Button {
        fn label(&self) -> &'static str {
            "button"
        }
    }

    impl Widget for Slider {
        fn label(&self) -> &'static str {
            "slider"
        }
    }

    impl Component for Button {}
    impl Component for Slider {}

    impl Injectable for Button {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Button))]
        }
    }

    impl Injectable for Slider {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Slider))]
        }
    }

    crate::implements!(Button: dyn Widget);
    crate::implements!(Slider: dyn Widget);

    crate::abstract_factory! {
        trait WidgetFactory {
            fn default_widget(&self) -> Result<Arc<dyn Widget>, Error>;
            #[key = "slider"]
            fn slider(&self) -> Result<Arc<dyn Widget>, Error>;
            fn by_name(&self, name: &str) -> Result<Arc<dyn Widget>, Error>;
            fn every(&self) -> Result<Vec<Arc<dyn Widget>>, Error>;
            fn lazy(&self) -> Result<Func<dyn Widget>, Error>;
        }
    }

    fn container() -> Container {
        let mut builder = Builder::new();
        builder.bind::<dyn Widget>().to::<Button>();
        builder.bind::<dyn Widget>().to::<Slider>().with_key("slider");
        builder.bind::<dyn WidgetFactory>().to_abstract_factory().unwrap();
        builder.build_container().unwrap()
    }

    #[test]
    fn methods_resolve_through_the_container() {
        let container = container();
        let factory = container.get::<dyn WidgetFactory>(None).unwrap();
        assert_eq!(factory.default_widget().unwrap().label(), "button");
        assert_eq!(factory.slider().unwrap().label(), "slider");
        assert_eq!(factory.by_name("slider").unwrap().label(), "slider");
        assert_eq!(factory.every().unwrap().len(), 1);
        assert_eq!(factory.lazy().unwrap().call().unwrap().label(), "button");
        assert_eq!(factory.by_name("missing").err().expect("unknown key").kind, ErrorKind::Registration);
    }

    #[test]
    fn factory_does_not_keep_its_container_alive() {
        let factory = container().get::<dyn WidgetFactory>(None).unwrap();
        let err = factory.default_widget().err().expect("container dropped");
        assert_eq!(err.kind, ErrorKind::DisposedAccess);
    }

    #[test]
    fn descriptor_lists_methods_and_keys() {
        let descriptor = <dyn WidgetFactory as AbstractFactory>::descriptor();
        assert_eq!(descriptor.methods.len(), 5);
        assert_eq!(descriptor.methods[1].key, Some("slider"));
        assert_eq!(descriptor.methods[2].parameters.len(), 1);
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn invalid_shapes_are_rejected() {
        let interface = TypeInfo::of::<dyn Widget>();

        let empty = FactoryDescriptor::new(interface, Vec::new());
        assert_eq!(empty.validate().unwrap_err().kind, ErrorKind::FactoryCreation);

        let void = FactoryDescriptor::new(interface, vec![FactoryMethod::new("make", None)]);
        assert!(void.validate().unwrap_err().message.contains("returns nothing"));

        let two_keys = FactoryDescriptor::new(
            interface,
            vec![
                FactoryMethod::new("make", Some(ServiceType::of::<dyn Widget>()))
                    .with_parameter("a", "&str")
                    .with_parameter("b", "&str"),
            ],
        );
        assert!(two_keys.validate().is_err());

        let not_a_key = FactoryDescriptor::new(
            interface,
            vec![FactoryMethod::new("make", Some(ServiceType::of::<dyn Widget>())).with_parameter("n", "u32")],
        );
        assert!(not_a_key.validate().unwrap_err().message.contains("must be a &str key"));

        let concrete = FactoryDescriptor::new(
            TypeInfo::of::<Button>(),
            vec![FactoryMethod::new("make", Some(ServiceType::of::<dyn Widget>()))],
        );
        assert!(concrete.validate().unwrap_err().message.contains("trait objects"));
    }
}
