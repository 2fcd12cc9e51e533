//! Creators turn a binding into a generator: a compiled closure that
//! produces one instance of the bound service from a container.
//!
//! Compilation is lazy and happens once per registration; for
//! [`TypeCreator`] this is where constructor selection runs, against the
//! registrations visible from the container doing the compiling.

use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::abstract_factory::AbstractFactory;
use crate::constructor::{Arguments, ConstructorPlan};
use crate::container::Container;
use crate::error::Error;
use crate::func::FuncHandle;
use crate::generic::ClosedImplementation;
use crate::injectable::{upcast, Disposable, Implements, Injectable};
use crate::instance::Instance;
use crate::service_type::{ServiceKey, ServiceType};

/// A compiled instance factory.
pub type Generator = Arc<dyn Fn(&Container) -> Result<Instance, Error> + Send + Sync>;

/// Knows how to produce instances of one implementation.
pub trait Creator: Send + Sync {
    /// Concrete type produced, used to detect duplicate registrations.
    fn implementation(&self) -> &ServiceType;

    /// Compiles the generator against `context`.
    fn compile(&self, context: &Container) -> Result<Generator, Error>;

    /// True if instances are built outside any container, so a child
    /// container inheriting the registration must not release them.
    fn is_prebuilt(&self) -> bool {
        false
    }
}

enum Step {
    Resolve(ServiceKey),
    Default,
}

/// Constructs a concrete type through one of its constructors.
pub struct TypeCreator {
    implementation: ServiceType,
    constructors: Vec<ConstructorPlan>,
    upcast: fn(Instance) -> Result<Instance, Error>,
}

impl TypeCreator {
    /// Creator for `C`, stored as the service `S`.
    pub fn new<C, S>() -> Self
    where
        C: Injectable + Implements<S>,
        S: ?Sized + Send + Sync + 'static,
    {
        Self {
            implementation: ServiceType::of::<C>(),
            constructors: C::constructors().into_iter().map(ConstructorPlan::from).collect(),
            upcast: upcast::<C, S>,
        }
    }

    pub(crate) fn closed(closed: ClosedImplementation) -> Self {
        Self {
            implementation: ServiceType::Generic(closed.implementation),
            constructors: closed.constructors,
            upcast: closed.upcast,
        }
    }

    /// A constructor whose sole parameter is the type itself.
    fn is_copy_constructor(&self, plan: &ConstructorPlan) -> bool {
        matches!(plan.params(), [only] if *only.service_type() == self.implementation)
    }

    fn steps(plan: &ConstructorPlan, context: &Container) -> Vec<Option<Step>> {
        plan.params()
            .iter()
            .map(|param| {
                let key = param.service_key();
                if context.can_resolve_key(&key) {
                    Some(Step::Resolve(key))
                } else if param.has_default() {
                    Some(Step::Default)
                } else {
                    None
                }
            })
            .collect()
    }

    /// Picks the constructor to call and how to obtain each argument.
    fn select(&self, context: &Container) -> Result<(ConstructorPlan, Vec<Step>), Error> {
        let implementation = self.implementation.to_string();
        let candidates: Vec<&ConstructorPlan> = self
            .constructors
            .iter()
            .filter(|plan| !self.is_copy_constructor(plan))
            .collect();

        let preferred: Vec<&ConstructorPlan> = candidates.iter().copied().filter(|plan| plan.is_preferred()).collect();
        if preferred.len() > 1 {
            return Err(Error::multiple_preferred_constructors(&implementation));
        }
        if let Some(plan) = preferred.first() {
            let mut steps = Vec::with_capacity(plan.params().len());
            for (param, step) in plan.params().iter().zip(Self::steps(plan, context)) {
                match step {
                    Some(step) => steps.push(step),
                    None => {
                        return Err(Error::unresolvable_parameter(
                            &implementation,
                            plan.name(),
                            param.name(),
                            &param.service_type().to_string(),
                            param.key(),
                        ));
                    }
                }
            }
            return Ok(((*plan).clone(), steps));
        }

        let mut best: Option<(usize, &ConstructorPlan, Vec<Step>)> = None;
        let mut rejected = Vec::new();
        for plan in candidates.iter().copied() {
            let steps = Self::steps(plan, context);
            let unresolvable: Vec<&str> = plan
                .params()
                .iter()
                .zip(&steps)
                .filter(|(_, step)| step.is_none())
                .map(|(param, _)| param.name())
                .collect();
            if !unresolvable.is_empty() {
                rejected.push(format!("{}({})", plan.name(), unresolvable.join(", ")));
                continue;
            }
            let score = plan.params().iter().filter(|param| !param.has_default()).count();
            if best.as_ref().is_none_or(|(top, _, _)| score > *top) {
                best = Some((score, plan, steps.into_iter().flatten().collect()));
            }
        }

        match best {
            Some((_, plan, steps)) => Ok((plan.clone(), steps)),
            None if candidates.is_empty() => Err(Error::no_constructor(&implementation, "it declares no usable constructors")),
            None => Err(Error::no_constructor(
                &implementation,
                &format!("unresolvable parameters in {}", rejected.join("; ")),
            )),
        }
    }
}

impl Creator for TypeCreator {
    fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    fn compile(&self, context: &Container) -> Result<Generator, Error> {
        let (plan, steps) = self.select(context)?;

        #[cfg(feature = "tracing")]
        debug!(
            "Compiled {} using constructor {} with {} parameter(s)",
            self.implementation,
            plan.name(),
            steps.len()
        );

        let names: Vec<&'static str> = plan.params().iter().map(|param| param.name()).collect();
        let upcast = self.upcast;
        Ok(Arc::new(move |context: &Container| {
            let mut values = Vec::with_capacity(steps.len());
            for (name, step) in names.iter().zip(&steps) {
                let value = match step {
                    Step::Resolve(key) => Some(context.get_type_or_all_key(key)?),
                    Step::Default => None,
                };
                values.push((*name, value));
            }
            let mut args = Arguments::new(values, context);
            upcast(plan.invoke(&mut args)?)
        }))
    }
}

type Factory = Arc<dyn Fn(&Container) -> Result<Instance, Error> + Send + Sync>;

/// Delegates to a user-supplied factory.
pub struct FactoryCreator {
    service: ServiceType,
    factory: Factory,
}

impl FactoryCreator {
    pub fn new(service: ServiceType, factory: Factory) -> Self {
        Self { service, factory }
    }
}

impl Creator for FactoryCreator {
    fn implementation(&self) -> &ServiceType {
        &self.service
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        Ok(self.factory.clone())
    }
}

/// Hands out an instance built outside the container.
pub struct InstanceCreator {
    implementation: ServiceType,
    instance: Instance,
}

impl InstanceCreator {
    pub fn new<C, S>(instance: Arc<C>) -> Self
    where
        C: Implements<S>,
        S: ?Sized + Send + Sync + 'static,
    {
        Self {
            implementation: ServiceType::of::<C>(),
            instance: Instance::new(C::upcast(instance)),
        }
    }

    /// The container releases the instance when it is disposed.
    pub fn disposable<C, S>(instance: Arc<C>) -> Self
    where
        C: Implements<S> + Disposable,
        S: ?Sized + Send + Sync + 'static,
    {
        let owned = instance.clone();
        Self {
            implementation: ServiceType::of::<C>(),
            instance: Instance::new(C::upcast(instance)).with_release(Arc::new(move || owned.dispose())),
        }
    }

    /// Already-erased instance, stored as `service`.
    pub fn erased(service: ServiceType, instance: Instance) -> Self {
        Self {
            implementation: service,
            instance,
        }
    }
}

impl Creator for InstanceCreator {
    fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        let instance = self.instance.clone();
        Ok(Arc::new(move |_: &Container| Ok(instance.clone())))
    }

    fn is_prebuilt(&self) -> bool {
        true
    }
}

/// Produces a generated implementation of an abstract factory interface.
pub struct AbstractFactoryCreator {
    interface: ServiceType,
    create: fn(Container) -> Instance,
}

impl AbstractFactoryCreator {
    pub fn new<F: ?Sized + AbstractFactory>() -> Self {
        Self {
            interface: ServiceType::of::<F>(),
            create: |context| Instance::new(F::create(context)),
        }
    }
}

impl Creator for AbstractFactoryCreator {
    fn implementation(&self) -> &ServiceType {
        &self.interface
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        let create = self.create;
        Ok(Arc::new(move |context: &Container| Ok(create(context.clone()))))
    }
}

/// Collects every registration of one service into a list.
pub struct GetAllCreator {
    service: ServiceType,
    element: ServiceKey,
}

impl GetAllCreator {
    pub fn new(element: ServiceKey) -> Self {
        Self {
            service: ServiceType::many(element.service.clone()),
            element,
        }
    }
}

impl Creator for GetAllCreator {
    fn implementation(&self) -> &ServiceType {
        &self.service
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        let element = self.element.clone();
        Ok(Arc::new(move |context: &Container| {
            Ok(Instance::list(context.resolve_all_key(&element)?))
        }))
    }
}

/// Produces lazy handles to another service.
pub struct FuncCreator {
    service: ServiceType,
    target: ServiceKey,
}

impl FuncCreator {
    pub fn new(target: ServiceKey) -> Self {
        Self {
            service: ServiceType::func(target.service.clone()),
            target,
        }
    }
}

impl Creator for FuncCreator {
    fn implementation(&self) -> &ServiceType {
        &self.service
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        let target = self.target.clone();
        Ok(Arc::new(move |context: &Container| {
            Ok(Instance::new(Arc::new(FuncHandle::new(context, target.clone()))))
        }))
    }
}

/// Resolves the container itself.
pub struct ContainerCreator {
    service: ServiceType,
}

impl ContainerCreator {
    pub fn new() -> Self {
        Self {
            service: ServiceType::of::<Container>(),
        }
    }
}

impl Default for ContainerCreator {
    fn default() -> Self {
        Self::new()
    }
}

impl Creator for ContainerCreator {
    fn implementation(&self) -> &ServiceType {
        &self.service
    }

    fn compile(&self, _context: &Container) -> Result<Generator, Error> {
        Ok(Arc::new(|context: &Container| Ok(Instance::new(Arc::new(context.clone())))))
    }
}
