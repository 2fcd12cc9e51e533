use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Error;
use crate::registration::Registration;
use crate::service_type::ServiceKey;

#[derive(Default)]
enum Entries {
    #[default]
    Empty,
    Single(Arc<Registration>),
    Multiple(Vec<Arc<Registration>>),
}

/// Every registration stored under one service key, in registration order.
///
/// Most keys only ever hold one registration, so a single entry is kept
/// inline and promoted to a list when a second one arrives.
#[derive(Default)]
pub struct RegistrationCollection {
    entries: RwLock<Entries>,
}

impl RegistrationCollection {
    pub fn new(registration: Arc<Registration>) -> Self {
        Self {
            entries: RwLock::new(Entries::Single(registration)),
        }
    }

    pub fn len(&self) -> usize {
        match &*self.entries.read() {
            Entries::Empty => 0,
            Entries::Single(_) => 1,
            Entries::Multiple(all) => all.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The only registration, failing if there are none or several.
    pub fn single(&self, key: &ServiceKey) -> Result<Arc<Registration>, Error> {
        match &*self.entries.read() {
            Entries::Single(registration) => Ok(registration.clone()),
            Entries::Empty => Err(Error::no_registration(&key.service_name(), key.key())),
            Entries::Multiple(all) => Err(Error::ambiguous_registration(
                &key.service_name(),
                key.key(),
                all.len(),
            )),
        }
    }

    /// Snapshot of all registrations in registration order.
    pub fn all(&self) -> Vec<Arc<Registration>> {
        match &*self.entries.read() {
            Entries::Empty => Vec::new(),
            Entries::Single(registration) => vec![registration.clone()],
            Entries::Multiple(all) => all.clone(),
        }
    }

    /// Appends a registration, rejecting a second one for the same
    /// implementation type.
    pub fn add(&self, key: &ServiceKey, registration: Arc<Registration>) -> Result<(), Error> {
        let mut entries = self.entries.write();
        let duplicate = match &*entries {
            Entries::Empty => false,
            Entries::Single(existing) => existing.implementation() == registration.implementation(),
            Entries::Multiple(all) => all
                .iter()
                .any(|existing| existing.implementation() == registration.implementation()),
        };
        if duplicate {
            return Err(Error::duplicate_registration(
                &key.service_name(),
                key.key(),
                &registration.implementation().to_string(),
            ));
        }

        *entries = match std::mem::take(&mut *entries) {
            Entries::Empty => Entries::Single(registration),
            Entries::Single(existing) => Entries::Multiple(vec![existing, registration]),
            Entries::Multiple(mut all) => {
                all.push(registration);
                Entries::Multiple(all)
            }
        };
        Ok(())
    }

    /// Copy for a child container: same creators, fresh instance caches.
    pub fn clone_for_child(&self) -> RegistrationCollection {
        let entries = match &*self.entries.read() {
            Entries::Empty => Entries::Empty,
            Entries::Single(registration) => Entries::Single(Arc::new(registration.clone_for_child())),
            Entries::Multiple(all) => Entries::Multiple(
                all.iter()
                    .map(|registration| Arc::new(registration.clone_for_child()))
                    .collect(),
            ),
        };
        RegistrationCollection {
            entries: RwLock::new(entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creator::InstanceCreator;
    use crate::error::ErrorKind;
    use crate::scope::Scope;

    trait Plugin: Send + Sync {}
    struct First;
    struct Second;
    impl Plugin for First {}
    impl Plugin for Second {}

    crate::implements!(First: dyn Plugin);
    crate::implements!(Second: dyn Plugin);

    fn registration<C: crate::Implements<dyn Plugin>>(value: C) -> Arc<Registration> {
        Arc::new(Registration::new(
            Arc::new(InstanceCreator::new::<C, dyn Plugin>(Arc::new(value))),
            Scope::Transient,
        ))
    }

    fn key() -> ServiceKey {
        ServiceKey::of::<dyn Plugin>(None)
    }

    #[test]
    fn empty_collection_has_no_single() {
        let collection = RegistrationCollection::default();
        assert!(collection.is_empty());
        let err = collection.single(&key()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Registration);
    }

    #[test]
    fn promotes_to_multiple_and_keeps_order() {
        let collection = RegistrationCollection::new(registration(First));
        assert!(collection.single(&key()).is_ok());

        collection.add(&key(), registration(Second)).unwrap();
        assert_eq!(collection.len(), 2);
        let all = collection.all();
        assert!(all[0].implementation().to_string().ends_with("First"));
        assert!(all[1].implementation().to_string().ends_with("Second"));

        let err = collection.single(&key()).unwrap_err();
        assert!(err.message.contains("Found 2 registrations"));
    }

    #[test]
    fn rejects_same_implementation_twice() {
        let collection = RegistrationCollection::new(registration(First));
        let err = collection.add(&key(), registration(First)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Registration);
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn child_copy_has_fresh_registrations() {
        let collection = RegistrationCollection::new(registration(First));
        let child = collection.clone_for_child();
        assert_eq!(child.len(), 1);
        assert!(!Arc::ptr_eq(&collection.all()[0], &child.all()[0]));
    }
}
