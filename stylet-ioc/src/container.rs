//! The dependency injection container.
//!
//! A [`Container`] is produced by a [`Builder`] and answers requests for
//! services. Public API:
//! - `get` / `get_all` / `get_func`: typed resolution of one service, every
//!   registration of a service, or a lazy handle to it
//! - `resolve` / `resolve_all` / `get_type_or_all` / `can_resolve`: the same
//!   over erased [`ServiceType`]s, for runtime generics and tooling
//! - `build_up`: inject members into a value constructed elsewhere
//! - `compile`: compile every registration up front
//! - `create_child_builder`: start a child container that inherits bindings
//! - `dispose`: release owned singletons; the container is unusable after
//!
//! Lookup for a `(service, key)` pair goes, in order, through the local
//! registrations, explicit registrations of ancestors (copied into this
//! container with a fresh instance cache), lazy-handle synthesis, open
//! generic closing and finally "many" synthesis. Everything synthesized is
//! cached, and every table is safe to read and extend concurrently.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::builder::Builder;
use crate::builder_upper::BuilderUpper;
use crate::creator::{ContainerCreator, FuncCreator, GetAllCreator};
use crate::error::{Error, ErrorKind};
use crate::func::Func;
use crate::generic::GenericDefinition;
use crate::injectable::Component;
use crate::instance::Instance;
use crate::registration::Registration;
use crate::registration_collection::RegistrationCollection;
use crate::resolve_guard::ResolveGuard;
use crate::scope::Scope;
use crate::service_type::{GenericType, ServiceKey, ServiceType};
use crate::unbound_generic::UnboundGeneric;

/// A service table entry. Only explicit entries are inherited by children.
#[derive(Clone)]
struct Stored {
    collection: Arc<RegistrationCollection>,
    explicit: bool,
}

struct ContainerInner {
    parent: Option<Container>,
    registrations: DashMap<ServiceKey, Stored>,
    get_all_registrations: DashMap<ServiceKey, Arc<Registration>>,
    unbound_generics: DashMap<ServiceKey, Vec<Arc<UnboundGeneric>>>,
    builder_uppers: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    disposed: AtomicBool,
}

/// The DI container. Cloning yields another handle to the same container.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// A non-owning handle to a container, held by lazy handles and abstract
/// factories so that cached instances never keep their container alive.
#[derive(Clone)]
pub(crate) struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    pub(crate) fn upgrade(&self) -> Result<Container, Error> {
        self.inner
            .upgrade()
            .map(|inner| Container { inner })
            .ok_or_else(|| Error::disposed("resolve through a dropped container"))
    }
}

impl Container {
    pub(crate) fn root() -> Self {
        Self::with_parent(None)
    }

    pub(crate) fn child(parent: Container) -> Self {
        Self::with_parent(Some(parent))
    }

    fn with_parent(parent: Option<Container>) -> Self {
        let container = Container {
            inner: Arc::new(ContainerInner {
                parent,
                registrations: DashMap::new(),
                get_all_registrations: DashMap::new(),
                unbound_generics: DashMap::new(),
                builder_uppers: DashMap::new(),
                disposed: AtomicBool::new(false),
            }),
        };

        // The container resolves itself.
        let registration = Registration::new(Arc::new(ContainerCreator::new()), Scope::Transient);
        container.inner.registrations.insert(
            ServiceKey::of::<Container>(None),
            Stored {
                collection: Arc::new(RegistrationCollection::new(Arc::new(registration))),
                explicit: true,
            },
        );
        container
    }

    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self, operation: &str) -> Result<(), Error> {
        if self.is_disposed() {
            return Err(Error::disposed(operation));
        }
        Ok(())
    }

    pub(crate) fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// True if both handles refer to the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // ---------------------------------------------------------------------
    // Typed API
    // ---------------------------------------------------------------------

    /// Resolves the single registration of `S` under `key`.
    pub fn get<S: ?Sized + Send + Sync + 'static>(&self, key: Option<&str>) -> Result<Arc<S>, Error> {
        self.resolve(&ServiceType::of::<S>(), key)?.downcast::<S>()
    }

    /// Resolves every registration of `S` under `key`, in registration order.
    /// An unregistered service yields an empty list.
    pub fn get_all<S: ?Sized + Send + Sync + 'static>(&self, key: Option<&str>) -> Result<Vec<Arc<S>>, Error> {
        self.resolve_all(&ServiceType::of::<S>(), key)?
            .iter()
            .map(Instance::downcast::<S>)
            .collect()
    }

    /// A lazy handle that resolves `S` on each call.
    pub fn get_func<S: ?Sized + Send + Sync + 'static>(&self, key: Option<&str>) -> Result<Func<S>, Error> {
        let instance = self.resolve(&ServiceType::func(ServiceType::of::<S>()), key)?;
        Func::from_instance(&instance)
    }

    /// Resolves a closed runtime generic, downcast to the definition's base `S`.
    pub fn get_generic<S: ?Sized + Send + Sync + 'static>(
        &self,
        definition: &'static GenericDefinition,
        args: Vec<ServiceType>,
        key: Option<&str>,
    ) -> Result<Arc<S>, Error> {
        self.resolve(&ServiceType::generic(definition, args), key)?.downcast::<S>()
    }

    // ---------------------------------------------------------------------
    // Erased API
    // ---------------------------------------------------------------------

    pub fn resolve(&self, service: &ServiceType, key: Option<&str>) -> Result<Instance, Error> {
        self.resolve_key(&ServiceKey::new(service.clone(), key))
    }

    pub fn resolve_all(&self, service: &ServiceType, key: Option<&str>) -> Result<Vec<Instance>, Error> {
        self.resolve_all_key(&ServiceKey::new(service.clone(), key))
    }

    /// Behaves like `resolve_all` for "many" services, like `resolve` otherwise.
    pub fn get_type_or_all(&self, service: &ServiceType, key: Option<&str>) -> Result<Instance, Error> {
        self.get_type_or_all_key(&ServiceKey::new(service.clone(), key))
    }

    /// True if a request for `service` under `key` could be satisfied.
    /// Does not create or cache anything.
    pub fn can_resolve(&self, service: &ServiceType, key: Option<&str>) -> bool {
        self.can_resolve_key(&ServiceKey::new(service.clone(), key))
    }

    pub(crate) fn resolve_key(&self, key: &ServiceKey) -> Result<Instance, Error> {
        self.ensure_live("resolve services")?;
        let registration = self.registration(key)?;
        let _guard = ResolveGuard::push(registration.id(), key)?;
        registration.resolve(self)
    }

    pub(crate) fn resolve_all_key(&self, key: &ServiceKey) -> Result<Vec<Instance>, Error> {
        self.ensure_live("resolve services")?;
        let registrations = self.collection(key)?.map(|collection| collection.all()).unwrap_or_default();
        registrations
            .iter()
            .map(|registration| {
                let _guard = ResolveGuard::push(registration.id(), key)?;
                registration.resolve(self)
            })
            .collect()
    }

    pub(crate) fn get_type_or_all_key(&self, key: &ServiceKey) -> Result<Instance, Error> {
        match &key.service {
            ServiceType::Many(element) => Ok(Instance::list(self.resolve_all_key(&key.with_service(element))?)),
            _ => self.resolve_key(key),
        }
    }

    pub(crate) fn can_resolve_key(&self, key: &ServiceKey) -> bool {
        if self.is_disposed() {
            return false;
        }
        if self.has_registration(key) {
            return true;
        }
        match &key.service {
            ServiceType::Func(inner) => self.can_resolve_key(&key.with_service(inner)),
            ServiceType::Generic(generic) => self
                .unbound_candidates(key, generic)
                .iter()
                .any(|candidate| candidate.can_close(generic)),
            ServiceType::Many(_) => true,
            ServiceType::Type(_) | ServiceType::OpenGeneric(_) => false,
        }
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    fn has_registration(&self, key: &ServiceKey) -> bool {
        if self.inner.registrations.contains_key(key) {
            return true;
        }
        self.ancestors().any(|ancestor| {
            ancestor
                .inner
                .registrations
                .get(key)
                .is_some_and(|stored| stored.explicit)
        })
    }

    fn ancestors(&self) -> impl Iterator<Item = &Container> {
        std::iter::successors(self.inner.parent.as_ref(), |container| container.inner.parent.as_ref())
    }

    fn local_collection(&self, key: &ServiceKey) -> Option<Arc<RegistrationCollection>> {
        self.inner
            .registrations
            .get(key)
            .map(|stored| stored.collection.clone())
    }

    fn inherited_collection(&self, key: &ServiceKey) -> Option<Arc<RegistrationCollection>> {
        self.ancestors().find_map(|ancestor| {
            ancestor
                .inner
                .registrations
                .get(key)
                .filter(|stored| stored.explicit)
                .map(|stored| stored.collection.clone())
        })
    }

    /// Stores `collection` unless another thread got there first, and
    /// returns whichever is stored.
    fn get_or_add(&self, key: &ServiceKey, collection: RegistrationCollection, explicit: bool) -> Arc<RegistrationCollection> {
        self.inner
            .registrations
            .entry(key.clone())
            .or_insert_with(|| Stored {
                collection: Arc::new(collection),
                explicit,
            })
            .collection
            .clone()
    }

    fn collection(&self, key: &ServiceKey) -> Result<Option<Arc<RegistrationCollection>>, Error> {
        if let Some(local) = self.local_collection(key) {
            return Ok(Some(local));
        }

        if let Some(inherited) = self.inherited_collection(key) {
            #[cfg(feature = "tracing")]
            debug!("Inheriting registrations for {} from a parent container", key);

            return Ok(Some(self.get_or_add(key, inherited.clone_for_child(), true)));
        }

        match &key.service {
            ServiceType::Func(inner) => Ok(self.create_func(key, inner)),
            ServiceType::Generic(generic) => self.create_closed_generics(key, generic),
            _ => Ok(None),
        }
    }

    fn create_func(&self, key: &ServiceKey, inner: &ServiceType) -> Option<Arc<RegistrationCollection>> {
        let target = key.with_service(inner);
        if !self.can_resolve_key(&target) {
            return None;
        }

        #[cfg(feature = "tracing")]
        debug!("Synthesizing lazy handle registration for {}", target);

        let registration = Registration::new(Arc::new(FuncCreator::new(target)), Scope::Transient);
        Some(self.get_or_add(key, RegistrationCollection::new(Arc::new(registration)), false))
    }

    /// Open generic bindings for the definition of `generic`. The nearest
    /// container that declares any wins.
    fn unbound_candidates(&self, key: &ServiceKey, generic: &GenericType) -> Vec<Arc<UnboundGeneric>> {
        let open = key.with_service(&ServiceType::open(generic.definition));
        std::iter::once(self)
            .chain(self.ancestors())
            .find_map(|container| {
                container
                    .inner
                    .unbound_generics
                    .get(&open)
                    .map(|candidates| candidates.value().clone())
                    .filter(|candidates| !candidates.is_empty())
            })
            .unwrap_or_default()
    }

    fn create_closed_generics(
        &self,
        key: &ServiceKey,
        generic: &GenericType,
    ) -> Result<Option<Arc<RegistrationCollection>>, Error> {
        let collection = RegistrationCollection::default();
        for candidate in self.unbound_candidates(key, generic) {
            if let Some(registration) = candidate.close(generic) {
                collection.add(key, Arc::new(registration))?;
            }
        }
        if collection.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.get_or_add(key, collection, false)))
    }

    fn get_all_registration(&self, element: &ServiceKey) -> Arc<Registration> {
        if let Some(existing) = self.inner.get_all_registrations.get(element).map(|entry| entry.value().clone()) {
            return existing;
        }

        #[cfg(feature = "tracing")]
        debug!("Synthesizing get-all registration for {}", element);

        let registration = Arc::new(Registration::new(
            Arc::new(GetAllCreator::new(element.clone())),
            Scope::Transient,
        ));
        self.inner
            .get_all_registrations
            .entry(element.clone())
            .or_insert(registration)
            .value()
            .clone()
    }

    fn registration(&self, key: &ServiceKey) -> Result<Arc<Registration>, Error> {
        if let Some(collection) = self.collection(key)? {
            return collection.single(key);
        }
        if let ServiceType::Many(element) = &key.service {
            return Ok(self.get_all_registration(&key.with_service(element)));
        }
        Err(Error::no_registration(&key.service_name(), key.key()))
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Adds a registration to this container, after the multi-binding rules.
    pub fn add_registration(
        &self,
        service: ServiceType,
        key: Option<&str>,
        registration: Registration,
    ) -> Result<(), Error> {
        self.ensure_live("add registrations")?;
        self.add_registration_key(&ServiceKey::new(service, key), registration)
    }

    pub(crate) fn add_registration_key(&self, key: &ServiceKey, registration: Registration) -> Result<(), Error> {
        let collection = self
            .inner
            .registrations
            .entry(key.clone())
            .or_insert_with(|| Stored {
                collection: Arc::new(RegistrationCollection::default()),
                explicit: true,
            })
            .collection
            .clone();
        collection.add(key, Arc::new(registration))
    }

    pub(crate) fn add_unbound_generic(&self, key: &ServiceKey, generic: UnboundGeneric) -> Result<(), Error> {
        let mut candidates = self.inner.unbound_generics.entry(key.clone()).or_default();
        let implementation = generic.implementation();
        if candidates
            .iter()
            .any(|existing| existing.implementation() == implementation)
        {
            return Err(Error::duplicate_registration(
                &key.service_name(),
                key.key(),
                &implementation.to_string(),
            ));
        }
        candidates.push(Arc::new(generic));
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Build-up, compilation, children, disposal
    // ---------------------------------------------------------------------

    /// Injects every unset member of `target`, then notifies it.
    pub fn build_up<T: Component>(&self, target: &mut T) -> Result<(), Error> {
        self.ensure_live("build up instances")?;
        self.builder_upper::<T>().build_up(target, self)
    }

    fn builder_upper<T: Component>(&self) -> Arc<BuilderUpper<T>> {
        let type_id = TypeId::of::<T>();
        let cached = self
            .inner
            .builder_uppers
            .get(&type_id)
            .map(|entry| entry.value().clone());
        let upper = match cached {
            Some(upper) => upper,
            None => {
                let created: Arc<dyn Any + Send + Sync> = Arc::new(BuilderUpper::<T>::new());
                self.inner
                    .builder_uppers
                    .entry(type_id)
                    .or_insert(created)
                    .value()
                    .clone()
            }
        };
        upper
            .downcast::<BuilderUpper<T>>()
            .unwrap_or_else(|_| Arc::new(BuilderUpper::new()))
    }

    /// Compiles every registration currently held by this container.
    ///
    /// With `throw_on_error` unset, registrations whose constructor cannot
    /// be selected yet are skipped; they may become resolvable later.
    pub fn compile(&self, throw_on_error: bool) -> Result<(), Error> {
        self.ensure_live("compile registrations")?;

        let registrations: Vec<Arc<Registration>> = self
            .inner
            .registrations
            .iter()
            .flat_map(|entry| entry.value().collection.all())
            .collect();

        for registration in &registrations {
            match registration.generator(self) {
                Ok(_) => {}
                Err(err) if !throw_on_error && err.kind == ErrorKind::ConstructorSelection => {
                    #[cfg(feature = "tracing")]
                    warn!("Skipping compilation of {}: {}", registration, err.message);
                }
                Err(err) => return Err(err),
            }
        }

        #[cfg(feature = "tracing")]
        info!(
            "Compiled {} of {} registration(s)",
            registrations.iter().filter(|registration| registration.is_compiled()).count(),
            registrations.len()
        );

        Ok(())
    }

    /// A builder for a child container. The child sees every explicit
    /// binding of this container and its ancestors, and can override them.
    pub fn create_child_builder(&self) -> Builder {
        #[cfg(feature = "tracing")]
        debug!("Creating child builder");

        Builder::child_of(self.clone())
    }

    /// Releases every owned singleton and empties the container. Later
    /// calls are no-ops; any other use fails with a disposed-access error.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        #[cfg(feature = "tracing")]
        info!("Disposing container with {} service key(s)", self.inner.registrations.len());

        let collections: Vec<Arc<RegistrationCollection>> = self
            .inner
            .registrations
            .iter()
            .map(|entry| entry.value().collection.clone())
            .collect();
        for collection in collections {
            for registration in collection.all() {
                registration.dispose();
            }
        }

        let get_all: Vec<Arc<Registration>> = self
            .inner
            .get_all_registrations
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        for registration in get_all {
            registration.dispose();
        }

        self.inner.registrations.clear();
        self.inner.get_all_registrations.clear();
        self.inner.unbound_generics.clear();
        self.inner.builder_uppers.clear();
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Container({} service key(s){})",
            self.inner.registrations.len(),
            if self.is_disposed() { ", disposed" } else { "" }
        )
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("parent", &self.inner.parent.is_some())
            .field("registrations", &self.inner.registrations.len())
            .field("unbound_generics", &self.inner.unbound_generics.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
