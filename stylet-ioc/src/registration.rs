//! Registrations: a creator paired with a lifecycle.
//!
//! This module defines the [`Registration`] struct, which owns a
//! [`Creator`] together with the [`Scope`] that decides how often the
//! creator's generator runs.
//!
//! # Overview
//!
//! A registration is the unit the container stores per service key. It:
//! - Compiles its creator lazily, once, the first time an instance is needed
//! - Caches the produced instance when the scope is a singleton scope
//! - Releases that cached instance when its container is disposed
//!
//! # Scopes
//!
//! - **Transient**: the generator runs on every request
//! - **Singleton / PerContainer**: the first produced instance is kept for
//!   the lifetime of the container that owns this registration. A child
//!   container inheriting the registration gets a fresh, empty cache.
//!
//! # Concurrency
//!
//! The generator is compiled through a [`OnceCell`], so concurrent first
//! requests compile it once. Singleton instances are produced while holding
//! a per-registration creation lock, and the cache is checked again once
//! the lock is taken, so racing first requests construct the instance once
//! and all receive it. Re-entering the same registration on one thread is
//! stopped earlier by the container's resolve guard.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::container::Container;
use crate::creator::{Creator, Generator};
use crate::error::Error;
use crate::instance::Instance;
use crate::scope::Scope;
use crate::service_type::ServiceType;

/// A creator wrapped with its lifecycle.
///
/// # Fields
///
/// * `creator` - Produces the generator for this registration
/// * `scope` - Whether produced instances are cached
/// * `owns_instances` - Whether disposal should release cached instances
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use stylet_ioc::{ContainerCreator, Registration, Scope};
///
/// let registration = Registration::new(Arc::new(ContainerCreator::new()), Scope::Transient);
/// assert_eq!(registration.scope(), Scope::Transient);
/// assert!(!registration.is_compiled());
/// ```
pub struct Registration {
    creator: Arc<dyn Creator>,
    scope: Scope,
    owns_instances: bool,
    generator: OnceCell<Generator>,
    instance: Mutex<Option<Instance>>,
    creating: Mutex<()>,
}

impl Registration {
    /// Creates a registration owning the instances it produces.
    ///
    /// # Parameters
    ///
    /// - `creator`: the creator compiled on first use
    /// - `scope`: lifecycle of produced instances
    pub fn new(creator: Arc<dyn Creator>, scope: Scope) -> Self {
        Self {
            creator,
            scope,
            owns_instances: true,
            generator: OnceCell::new(),
            instance: Mutex::new(None),
            creating: Mutex::new(()),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn implementation(&self) -> &ServiceType {
        self.creator.implementation()
    }

    /// True once the generator has been compiled.
    pub fn is_compiled(&self) -> bool {
        self.generator.get().is_some()
    }

    /// Returns the compiled generator, compiling it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the creator's compilation error, usually a constructor
    /// selection failure. A failed compilation is retried on the next call.
    pub fn generator(&self, context: &Container) -> Result<Generator, Error> {
        self.generator
            .get_or_try_init(|| {
                #[cfg(feature = "tracing")]
                debug!("Compiling registration for {}", self.creator.implementation());

                self.creator.compile(context)
            })
            .cloned()
    }

    /// Produces an instance according to the scope.
    ///
    /// # Parameters
    ///
    /// - `context`: the container the request was made against
    ///
    /// # Returns
    ///
    /// A fresh instance for transient registrations, otherwise the cached
    /// instance, producing it first if needed.
    pub fn resolve(&self, context: &Container) -> Result<Instance, Error> {
        if !self.scope.is_singleton() {
            let generator = self.generator(context)?;
            return generator(context);
        }

        if let Some(existing) = self.instance.lock().as_ref() {
            return Ok(existing.clone());
        }

        let _creating = self.creating.lock();
        if let Some(existing) = self.instance.lock().as_ref() {
            #[cfg(feature = "tracing")]
            trace!("Singleton {} was produced while waiting", self.creator.implementation());

            return Ok(existing.clone());
        }

        let generator = self.generator(context)?;
        let created = generator(context)?;
        *self.instance.lock() = Some(created.clone());
        Ok(created)
    }

    /// Copy of this registration for a child container.
    ///
    /// The creator is shared, so the compiled plan is not. The child starts
    /// with an empty instance cache, and never releases prebuilt instances
    /// it did not create.
    pub fn clone_for_child(&self) -> Registration {
        Registration {
            creator: self.creator.clone(),
            scope: self.scope,
            owns_instances: self.owns_instances && !self.creator.is_prebuilt(),
            generator: OnceCell::new(),
            instance: Mutex::new(None),
            creating: Mutex::new(()),
        }
    }

    /// Releases the cached instance, at most once.
    pub fn dispose(&self) {
        let instance = self.instance.lock().take();
        if let Some(instance) = instance {
            if self.owns_instances {
                #[cfg(feature = "tracing")]
                debug!("Releasing {}", instance.type_name());

                instance.release();
            }
        }
    }

    /// Stable identity for cycle detection.
    pub(crate) fn id(&self) -> usize {
        self as *const Registration as usize
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.creator.implementation(), self.scope)
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("implementation", self.creator.implementation())
            .field("scope", &self.scope)
            .field("owns_instances", &self.owns_instances)
            .field("compiled", &self.is_compiled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::creator::{FactoryCreator, InstanceCreator};
    use crate::injectable::Disposable;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;

    struct Counter(AtomicUsize);

    impl Disposable for Counter {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_factory(calls: Arc<AtomicUsize>) -> Arc<dyn Creator> {
        Arc::new(FactoryCreator::new(
            ServiceType::of::<usize>(),
            Arc::new(move |_: &Container| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(Instance::new(Arc::new(n)))
            }),
        ))
    }

    #[test]
    fn transient_runs_generator_every_time() {
        let container = Builder::new().build_container().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let registration = Registration::new(counting_factory(calls.clone()), Scope::Transient);
        let a = registration.resolve(&container).unwrap();
        let b = registration.resolve(&container).unwrap();
        assert!(!a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(registration.is_compiled());
    }

    #[test]
    fn singleton_caches_and_child_copy_starts_empty() {
        let container = Builder::new().build_container().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let registration = Registration::new(counting_factory(calls.clone()), Scope::Singleton);
        let a = registration.resolve(&container).unwrap();
        let b = registration.resolve(&container).unwrap();
        assert!(a.ptr_eq(&b));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let child = registration.clone_for_child();
        assert!(!child.is_compiled());
        let c = child.resolve(&container).unwrap();
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn racing_first_requests_construct_once() {
        let container = Builder::new().build_container().unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counted = calls.clone();
        let creator: Arc<dyn Creator> = Arc::new(FactoryCreator::new(
            ServiceType::of::<usize>(),
            Arc::new(move |_: &Container| {
                let n = counted.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(std::time::Duration::from_millis(50));
                Ok(Instance::new(Arc::new(n)))
            }),
        ));
        let registration = Registration::new(creator, Scope::Singleton);
        let barrier = Barrier::new(8);

        let instances: Vec<Instance> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        registration.resolve(&container).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|handle| handle.join().unwrap()).collect()
        });

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|instance| instance.ptr_eq(&instances[0])));
    }

    #[test]
    fn dispose_releases_once() {
        let container = Builder::new().build_container().unwrap();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let creator = Arc::new(InstanceCreator::disposable::<Counter, Counter>(counter.clone()));
        let registration = Registration::new(creator, Scope::Singleton);
        registration.resolve(&container).unwrap();
        registration.dispose();
        registration.dispose();
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn child_copy_of_prebuilt_instance_does_not_release() {
        let container = Builder::new().build_container().unwrap();
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let creator = Arc::new(InstanceCreator::disposable::<Counter, Counter>(counter.clone()));
        let registration = Registration::new(creator, Scope::Singleton);
        let child = registration.clone_for_child();
        child.resolve(&container).unwrap();
        child.dispose();
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);
    }
}
