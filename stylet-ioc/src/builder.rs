//! Fluent configuration of a container.
//!
//! A [`Builder`] collects bindings, then [`Builder::build_container`] turns
//! them into registrations. Bindings are declared through
//! [`Builder::bind`] (a Rust service type) or [`Builder::bind_service`] (an
//! erased [`ServiceType`], needed for runtime generics), and tuned through
//! the returned [`BuilderBinding`]:
//!
//! ```
//! use std::sync::Arc;
//! use stylet_ioc::{Builder, Component, Constructor, Injectable, implements};
//!
//! trait Greeter: Send + Sync {
//!     fn greet(&self) -> String;
//! }
//!
//! struct English;
//!
//! impl Greeter for English {
//!     fn greet(&self) -> String {
//!         "hello".to_string()
//!     }
//! }
//!
//! impl Component for English {}
//!
//! impl Injectable for English {
//!     fn constructors() -> Vec<Constructor<Self>> {
//!         vec![Constructor::new("new", |_| Ok(English))]
//!     }
//! }
//!
//! implements!(English: dyn Greeter);
//!
//! let mut builder = Builder::new();
//! builder.bind::<dyn Greeter>().to::<English>().in_singleton_scope();
//! let container = builder.build_container().unwrap();
//! assert_eq!(container.get::<dyn Greeter>(None).unwrap().greet(), "hello");
//! ```
//!
//! The builder is a single-threaded startup tool; the container it
//! produces is the thread-safe part.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::{debug, info, trace, warn};

use crate::abstract_factory::AbstractFactory;
use crate::catalog::TypeCatalog;
use crate::constructor::complete;
use crate::container::Container;
use crate::creator::{AbstractFactoryCreator, Creator, FactoryCreator, InstanceCreator, TypeCreator};
use crate::error::Error;
use crate::generic::{GenericDefinition, GenericImplementation};
use crate::injectable::{upcast, Component, Disposable, Implements, Injectable};
use crate::instance::Instance;
use crate::module::Module;
use crate::registration::Registration;
use crate::scope::Scope;
use crate::service_type::{ServiceKey, ServiceType};
use crate::unbound_generic::UnboundGeneric;

/// What a binding produces its service from.
enum BindingTarget {
    Creator(Arc<dyn Creator>),
    Unbound(&'static GenericDefinition, &'static GenericImplementation),
}

impl BindingTarget {
    fn implementation(&self) -> ServiceType {
        match self {
            BindingTarget::Creator(creator) => creator.implementation().clone(),
            &BindingTarget::Unbound(_, implementation) => ServiceType::open(&implementation.definition),
        }
    }
}

/// One declared binding, as returned by the `to_*` methods.
pub struct BuilderBinding {
    service: ServiceType,
    key: Option<String>,
    scope: Scope,
    weak: bool,
    targets: Vec<BindingTarget>,
}

impl BuilderBinding {
    fn new(service: ServiceType, targets: Vec<BindingTarget>) -> Self {
        Self {
            service,
            key: None,
            scope: Scope::Transient,
            weak: false,
            targets,
        }
    }

    /// One instance per container, created on first request.
    pub fn in_singleton_scope(&mut self) -> &mut Self {
        self.scope = Scope::Singleton;
        self
    }

    /// One instance per container; children get their own.
    pub fn in_per_container_scope(&mut self) -> &mut Self {
        self.scope = Scope::PerContainer;
        self
    }

    pub fn in_scope(&mut self, scope: Scope) -> &mut Self {
        self.scope = scope;
        self
    }

    pub fn with_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.key = Some(key.into());
        self
    }

    /// Marks the binding as a fallback: it is dropped if any strong binding
    /// exists for the same service and key.
    pub fn as_weak_binding(&mut self) -> &mut Self {
        self.weak = true;
        self
    }

    pub fn service(&self) -> &ServiceType {
        &self.service
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// Implementation types this binding registers.
    pub fn implementations(&self) -> Vec<ServiceType> {
        self.targets.iter().map(BindingTarget::implementation).collect()
    }

    fn service_key(&self) -> ServiceKey {
        ServiceKey::new(self.service.clone(), self.key.as_deref())
    }
}

/// Collects bindings and builds containers from them.
pub struct Builder {
    bindings: Vec<BuilderBinding>,
    parent: Option<Container>,
    loaded_modules: HashSet<TypeId>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Self {
        Self {
            bindings: Vec::new(),
            parent: None,
            loaded_modules: HashSet::new(),
        }
    }

    pub(crate) fn child_of(parent: Container) -> Self {
        Self {
            parent: Some(parent),
            ..Self::new()
        }
    }

    fn push(&mut self, binding: BuilderBinding) -> &mut BuilderBinding {
        #[cfg(feature = "tracing")]
        trace!("Declared binding for {} ({} target(s))", binding.service, binding.targets.len());

        let index = self.bindings.len();
        self.bindings.push(binding);
        &mut self.bindings[index]
    }

    /// Starts a binding for the Rust service type `S`.
    pub fn bind<S: ?Sized + Send + Sync + 'static>(&mut self) -> BindTo<'_, S> {
        BindTo {
            builder: self,
            _service: PhantomData,
        }
    }

    /// Starts a binding for an erased service type.
    pub fn bind_service(&mut self, service: ServiceType) -> BindService<'_> {
        BindService { builder: self, service }
    }

    /// Starts a binding for an open runtime generic, e.g. `IValidator<>`.
    pub fn bind_generic(&mut self, definition: &'static GenericDefinition) -> BindService<'_> {
        self.bind_service(ServiceType::open(definition))
    }

    /// Self-binds every type in the catalogs as a weak binding, so explicit
    /// bindings win.
    pub fn autobind(&mut self, catalogs: &[&TypeCatalog]) -> &mut Self {
        for catalog in catalogs {
            #[cfg(feature = "tracing")]
            debug!("Autobinding {} type(s) from catalog {}", catalog.len(), catalog.name());

            for entry in catalog.concrete() {
                self.push(BuilderBinding::new(
                    entry.implementation().clone(),
                    vec![BindingTarget::Creator(entry.self_creator())],
                ))
                .as_weak_binding();
            }

            for &implementation in catalog.generic() {
                let definition = &implementation.definition;
                if !implementation.implements_definition(definition) {
                    #[cfg(feature = "tracing")]
                    trace!("Not autobinding {}: it does not list itself as a service", implementation.name());
                    continue;
                }
                match implementation.check_open_binding(definition) {
                    Ok(()) => {
                        self.push(BuilderBinding::new(
                            ServiceType::open(definition),
                            vec![BindingTarget::Unbound(definition, implementation)],
                        ))
                        .as_weak_binding();
                    }
                    Err(_err) => {
                        #[cfg(feature = "tracing")]
                        warn!("Not autobinding {}: {}", implementation.name(), _err.message);
                    }
                }
            }
        }
        self
    }

    /// Loads a module, after every module it imports. Each module type is
    /// loaded at most once per builder.
    pub fn add_module(&mut self, module: &dyn Module) -> &mut Self {
        let type_id = module.type_id();
        if !self.loaded_modules.insert(type_id) {
            #[cfg(feature = "tracing")]
            debug!("Module already loaded, skipping");
            return self;
        }

        let imports = module.imports();
        #[cfg(feature = "tracing")]
        if !imports.is_empty() {
            debug!("Module has {} import(s), loading them first", imports.len());
        }
        for import in &imports {
            self.add_module(import.as_ref());
        }

        module.load(self);
        self
    }

    pub fn add_modules(&mut self, modules: &[&dyn Module]) -> &mut Self {
        for module in modules {
            self.add_module(*module);
        }
        self
    }

    /// Registers every surviving binding into a new container.
    ///
    /// Bindings are grouped by service and key. Within a group, weak
    /// bindings are dropped if a strong one exists. Two strong bindings of
    /// the same implementation fail; weak duplicates keep the first.
    pub fn build_container(&self) -> Result<Container, Error> {
        let container = match &self.parent {
            Some(parent) => Container::child(parent.clone()),
            None => Container::root(),
        };

        let mut groups: Vec<(ServiceKey, Vec<&BuilderBinding>)> = Vec::new();
        let mut positions: HashMap<ServiceKey, usize> = HashMap::new();
        for binding in &self.bindings {
            let key = binding.service_key();
            match positions.get(&key) {
                Some(&position) => groups[position].1.push(binding),
                None => {
                    positions.insert(key.clone(), groups.len());
                    groups.push((key, vec![binding]));
                }
            }
        }

        #[cfg(feature = "tracing")]
        let mut registered = 0usize;
        for (key, bindings) in &groups {
            let has_strong = bindings.iter().any(|binding| !binding.weak);
            let mut seen: Vec<ServiceType> = Vec::new();

            for binding in bindings.iter().filter(|binding| !has_strong || !binding.weak) {
                for target in &binding.targets {
                    let implementation = target.implementation();
                    if seen.contains(&implementation) {
                        if binding.weak {
                            #[cfg(feature = "tracing")]
                            debug!("Skipping duplicate weak binding {} for {}", implementation, key);
                            continue;
                        }
                        return Err(Error::duplicate_registration(
                            &key.service_name(),
                            key.key(),
                            &implementation.to_string(),
                        ));
                    }
                    seen.push(implementation);

                    match target {
                        BindingTarget::Creator(creator) => {
                            container.add_registration_key(key, Registration::new(creator.clone(), binding.scope))?
                        }
                        BindingTarget::Unbound(service, implementation) => container.add_unbound_generic(
                            key,
                            UnboundGeneric::new(service, implementation, binding.scope)?,
                        )?,
                    }
                    #[cfg(feature = "tracing")]
                    {
                        registered += 1;
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        info!(
            "Built {}container with {} registration(s) for {} service key(s)",
            if self.parent.is_some() { "child " } else { "" },
            registered,
            groups.len()
        );

        Ok(container)
    }
}

/// Binding targets for a Rust service type `S`.
pub struct BindTo<'a, S: ?Sized> {
    builder: &'a mut Builder,
    _service: PhantomData<fn() -> Box<S>>,
}

impl<'a, S: ?Sized + Send + Sync + 'static> BindTo<'a, S> {
    fn target(self, creator: Arc<dyn Creator>) -> &'a mut BuilderBinding {
        self.builder
            .push(BuilderBinding::new(ServiceType::of::<S>(), vec![BindingTarget::Creator(creator)]))
    }

    /// `S` is constructed by the container.
    pub fn to_self(self) -> &'a mut BuilderBinding
    where
        S: Injectable,
    {
        self.to::<S>()
    }

    /// `S` is provided by constructing `C`.
    pub fn to<C: Injectable + Implements<S>>(self) -> &'a mut BuilderBinding {
        self.target(Arc::new(TypeCreator::new::<C, S>()))
    }

    /// `S` is provided by calling `factory`. The produced value has its
    /// members injected, and is released with its container if it is a
    /// cached disposable.
    pub fn to_factory<C, F>(self, factory: F) -> &'a mut BuilderBinding
    where
        C: Component + Implements<S>,
        F: Fn(&Container) -> Result<C, Error> + Send + Sync + 'static,
    {
        let produce = move |context: &Container| -> Result<Instance, Error> {
            let concrete = complete(factory(context)?, context)?;
            upcast::<C, S>(concrete)
        };
        self.target(Arc::new(FactoryCreator::new(ServiceType::of::<C>(), Arc::new(produce))))
    }

    /// `S` is always `instance`. The caller keeps ownership: the container
    /// never releases it.
    pub fn to_instance<C: Implements<S>>(self, instance: Arc<C>) -> &'a mut BuilderBinding {
        self.target(Arc::new(InstanceCreator::new::<C, S>(instance)))
            .in_singleton_scope()
    }

    /// Like [`to_instance`](Self::to_instance), but the container takes
    /// ownership and releases the instance when it is disposed.
    pub fn to_disposable_instance<C: Implements<S> + Disposable>(self, instance: Arc<C>) -> &'a mut BuilderBinding {
        self.target(Arc::new(InstanceCreator::disposable::<C, S>(instance)))
            .in_singleton_scope()
    }

    /// `S` is an abstract factory trait; its implementation is generated.
    pub fn to_abstract_factory(self) -> Result<&'a mut BuilderBinding, Error>
    where
        S: AbstractFactory,
    {
        S::descriptor().validate()?;

        #[cfg(feature = "tracing")]
        debug!("Binding abstract factory {}", ServiceType::of::<S>());

        Ok(self.target(Arc::new(AbstractFactoryCreator::new::<S>())))
    }

    /// Binds `S` to every catalog type that implements it, under one key
    /// and scope.
    pub fn to_all_implementations(self, catalogs: &[&TypeCatalog]) -> &'a mut BuilderBinding {
        let service = ServiceType::of::<S>();
        let targets = concrete_implementations(&service, catalogs);
        self.builder.push(BuilderBinding::new(service, targets))
    }
}

/// Binding targets for an erased service type.
pub struct BindService<'a> {
    builder: &'a mut Builder,
    service: ServiceType,
}

impl<'a> BindService<'a> {
    fn target(self, target: BindingTarget) -> &'a mut BuilderBinding {
        self.builder.push(BuilderBinding::new(self.service, vec![target]))
    }

    fn ensure_concrete_service(&self, binding: &str) -> Result<(), Error> {
        if self.service.is_open_generic() {
            return Err(Error::invalid_binding(
                &self.service.to_string(),
                &format!("open generic services cannot be bound {}", binding),
            ));
        }
        if self.service.is_synthesized() {
            return Err(Error::invalid_binding(
                &self.service.to_string(),
                "lazy handle and collection services are provided by the container",
            ));
        }
        Ok(())
    }

    /// Binds to a runtime generic implementation.
    ///
    /// An open service (`IValidator<>`) registers an unbound generic that is
    /// closed on demand. A closed service (`IValidator<String>`) closes the
    /// implementation right away.
    pub fn to_generic(self, implementation: &'static GenericImplementation) -> Result<&'a mut BuilderBinding, Error> {
        match &self.service {
            &ServiceType::OpenGeneric(definition) => {
                implementation.check_open_binding(definition)?;
                Ok(self.target(BindingTarget::Unbound(definition, implementation)))
            }
            ServiceType::Generic(generic) => {
                let closed = implementation
                    .close(generic)
                    .ok_or_else(|| Error::not_implemented(&self.service.to_string(), implementation.name()))?;
                Ok(self.target(BindingTarget::Creator(Arc::new(TypeCreator::closed(closed)))))
            }
            _ => Err(Error::invalid_binding(
                &self.service.to_string(),
                &format!("only generic services can be bound to {}", implementation.name()),
            )),
        }
    }

    /// The factory must produce an instance stored as the service's
    /// storage type.
    pub fn to_factory<F>(self, factory: F) -> Result<&'a mut BuilderBinding, Error>
    where
        F: Fn(&Container) -> Result<Instance, Error> + Send + Sync + 'static,
    {
        self.ensure_concrete_service("to a factory")?;
        let service = self.service.clone();
        Ok(self.target(BindingTarget::Creator(Arc::new(FactoryCreator::new(service, Arc::new(factory))))))
    }

    pub fn to_instance(self, instance: Instance) -> Result<&'a mut BuilderBinding, Error> {
        self.ensure_concrete_service("to an instance")?;
        let service = self.service.clone();
        Ok(self
            .target(BindingTarget::Creator(Arc::new(InstanceCreator::erased(service, instance))))
            .in_singleton_scope())
    }

    /// Binds to every catalog type implementing the service: concrete
    /// types for plain services, generic implementations for generic ones.
    pub fn to_all_implementations(self, catalogs: &[&TypeCatalog]) -> &'a mut BuilderBinding {
        let targets = match &self.service {
            &ServiceType::OpenGeneric(definition) => {
                generic_implementations(catalogs)
                    .filter(|implementation| implementation.implements_definition(definition))
                    .filter_map(|implementation| match implementation.check_open_binding(definition) {
                        Ok(()) => Some(BindingTarget::Unbound(definition, implementation)),
                        Err(_err) => {
                            #[cfg(feature = "tracing")]
                            warn!("Skipping {} for {}: {}", implementation.name(), self.service, _err.message);
                            None
                        }
                    })
                    .collect()
            }
            ServiceType::Generic(generic) => generic_implementations(catalogs)
                .filter_map(|implementation| implementation.close(generic))
                .map(|closed| BindingTarget::Creator(Arc::new(TypeCreator::closed(closed))))
                .collect(),
            service => concrete_implementations(service, catalogs),
        };
        self.builder.push(BuilderBinding::new(self.service, targets))
    }
}

fn generic_implementations<'c>(
    catalogs: &'c [&TypeCatalog],
) -> impl Iterator<Item = &'static GenericImplementation> + 'c {
    catalogs.iter().flat_map(|catalog| catalog.generic().iter().copied())
}

fn concrete_implementations(service: &ServiceType, catalogs: &[&TypeCatalog]) -> Vec<BindingTarget> {
    let targets: Vec<BindingTarget> = catalogs
        .iter()
        .flat_map(|catalog| catalog.concrete())
        .filter_map(|entry| entry.creator_for(service))
        .map(BindingTarget::Creator)
        .collect();

    #[cfg(feature = "tracing")]
    if targets.is_empty() {
        warn!("No catalog type implements {}", service);
    } else {
        debug!("Found {} implementation(s) of {}", targets.len(), service);
    }

    targets
}
