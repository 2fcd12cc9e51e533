//! Type catalogs: explicit lists of the types a builder may scan.
//!
//! Rust cannot enumerate the types of a crate at runtime, so a catalog
//! plays the part of an assembly: each entry records a concrete
//! [`Injectable`] type and the services it can stand in for. Catalogs feed
//! [`Builder::autobind`](crate::Builder::autobind) and the
//! `to_all_implementations` binding targets.

use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::trace;

use crate::creator::{Creator, TypeCreator};
use crate::generic::GenericImplementation;
use crate::injectable::{Implements, Injectable};
use crate::service_type::ServiceType;

/// A concrete type known to a catalog.
pub struct CatalogEntry {
    implementation: ServiceType,
    self_creator: Arc<dyn Creator>,
    services: Vec<(ServiceType, Arc<dyn Creator>)>,
}

impl CatalogEntry {
    pub fn implementation(&self) -> &ServiceType {
        &self.implementation
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceType> {
        self.services.iter().map(|(service, _)| service)
    }

    pub(crate) fn self_creator(&self) -> Arc<dyn Creator> {
        self.self_creator.clone()
    }

    pub(crate) fn creator_for(&self, service: &ServiceType) -> Option<Arc<dyn Creator>> {
        if *service == self.implementation {
            return Some(self.self_creator.clone());
        }
        self.services
            .iter()
            .find(|(candidate, _)| candidate == service)
            .map(|(_, creator)| creator.clone())
    }
}

/// A named set of concrete and generic implementations.
///
/// ```
/// use std::sync::Arc;
/// use stylet_ioc::{Builder, Component, Constructor, Injectable, TypeCatalog, implements};
///
/// trait Shape: Send + Sync {}
///
/// struct Square;
/// impl Shape for Square {}
/// impl Component for Square {}
/// impl Injectable for Square {
///     fn constructors() -> Vec<Constructor<Self>> {
///         vec![Constructor::new("new", |_| Ok(Square))]
///     }
/// }
/// implements!(Square: dyn Shape);
///
/// let mut catalog = TypeCatalog::new("shapes");
/// catalog.add::<Square>().implements::<dyn Shape>();
///
/// let mut builder = Builder::new();
/// builder.bind::<dyn Shape>().to_all_implementations(&[&catalog]);
/// let container = builder.build_container().unwrap();
/// assert_eq!(container.get_all::<dyn Shape>(None).unwrap().len(), 1);
/// ```
pub struct TypeCatalog {
    name: String,
    concrete: Vec<CatalogEntry>,
    generic: Vec<&'static GenericImplementation>,
}

impl TypeCatalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            concrete: Vec::new(),
            generic: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of concrete and generic entries.
    pub fn len(&self) -> usize {
        self.concrete.len() + self.generic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds the concrete type `C`. Adding a type twice keeps one entry.
    pub fn add<C: Injectable>(&mut self) -> CatalogEntryBuilder<'_, C> {
        let implementation = ServiceType::of::<C>();
        let index = match self
            .concrete
            .iter()
            .position(|entry| entry.implementation == implementation)
        {
            Some(index) => {
                #[cfg(feature = "tracing")]
                trace!("{} is already in catalog {}", implementation, self.name);
                index
            }
            None => {
                self.concrete.push(CatalogEntry {
                    implementation,
                    self_creator: Arc::new(TypeCreator::new::<C, C>()),
                    services: Vec::new(),
                });
                self.concrete.len() - 1
            }
        };
        CatalogEntryBuilder {
            catalog: self,
            index,
            _concrete: PhantomData,
        }
    }

    pub fn add_generic(&mut self, implementation: &'static GenericImplementation) -> &mut Self {
        if !self.generic.iter().any(|existing| std::ptr::eq(*existing, implementation)) {
            self.generic.push(implementation);
        }
        self
    }

    pub fn concrete(&self) -> &[CatalogEntry] {
        &self.concrete
    }

    pub fn generic(&self) -> &[&'static GenericImplementation] {
        &self.generic
    }
}

/// Declares the services a catalog entry implements.
pub struct CatalogEntryBuilder<'a, C> {
    catalog: &'a mut TypeCatalog,
    index: usize,
    _concrete: PhantomData<fn() -> C>,
}

impl<C: Injectable> CatalogEntryBuilder<'_, C> {
    pub fn implements<S: ?Sized + Send + Sync + 'static>(self) -> Self
    where
        C: Implements<S>,
    {
        let service = ServiceType::of::<S>();
        if let Some(entry) = self.catalog.concrete.get_mut(self.index) {
            if !entry.services.iter().any(|(existing, _)| *existing == service) {
                entry.services.push((service, Arc::new(TypeCreator::new::<C, S>())));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::constructor::Constructor;
    use crate::injectable::Component;

    trait Handler: Send + Sync {
        fn id(&self) -> u8;
    }

    struct Ping;
    struct Pong;
    struct Unrelated;

    impl Handler for Ping {
        fn id(&self) -> u8 {
            1
        }
    }

    impl Handler for Pong {
        fn id(&self) -> u8 {
            2
        }
    }

    impl Component for Ping {}
    impl Component for Pong {}
    impl Component for Unrelated {}

    impl Injectable for Ping {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Ping))]
        }
    }

    impl Injectable for Pong {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Pong))]
        }
    }

    impl Injectable for Unrelated {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new("new", |_| Ok(Unrelated))]
        }
    }

    crate::implements!(Ping: dyn Handler);
    crate::implements!(Pong: dyn Handler);

    fn catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new("handlers");
        catalog.add::<Ping>().implements::<dyn Handler>();
        catalog.add::<Unrelated>();
        catalog.add::<Pong>().implements::<dyn Handler>().implements::<dyn Handler>();
        catalog
    }

    #[test]
    fn entries_are_unique() {
        let mut catalog = catalog();
        catalog.add::<Ping>();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.concrete()[2].services().count(), 1);
    }

    #[test]
    fn to_all_implementations_binds_matching_types_in_order() {
        let catalog = catalog();
        let mut builder = Builder::new();
        builder
            .bind::<dyn Handler>()
            .to_all_implementations(&[&catalog])
            .in_singleton_scope();
        let container = builder.build_container().unwrap();

        let ids: Vec<u8> = container
            .get_all::<dyn Handler>(None)
            .unwrap()
            .iter()
            .map(|handler| handler.id())
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(container.get::<Unrelated>(None).is_err());
    }

    #[test]
    fn autobind_is_weak() {
        let catalog = catalog();
        let mut builder = Builder::new();
        builder.autobind(&[&catalog]);
        builder.bind::<Ping>().to_instance(Arc::new(Ping));
        let container = builder.build_container().unwrap();

        assert!(container.get::<Unrelated>(None).is_ok());
        assert!(container.get::<Pong>(None).is_ok());
        let first = container.get::<Ping>(None).unwrap();
        let second = container.get::<Ping>(None).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
