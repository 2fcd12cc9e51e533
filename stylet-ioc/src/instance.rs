use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;

type Release = Arc<dyn Fn() + Send + Sync>;

/// A type-erased shared service instance.
///
/// The payload is always an `Arc<S>` where `S` is the storage type of the
/// service it was produced for (usually a `dyn Trait`). Cloning an
/// `Instance` clones the handle, never the service.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
    release: Option<Release>,
}

impl Instance {
    pub fn new<S: ?Sized + Send + Sync + 'static>(value: Arc<S>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<S>(),
            release: None,
        }
    }

    /// Wraps a list of instances, as produced for "many" requests.
    pub fn list(items: Vec<Instance>) -> Self {
        Self::new(Arc::new(InstanceList(items)))
    }

    pub(crate) fn with_release(mut self, release: Release) -> Self {
        self.release = Some(release);
        self
    }

    /// Same service, stored under a different Rust type. The release hook
    /// stays with the instance.
    pub(crate) fn retype<S: ?Sized + Send + Sync + 'static>(&self, value: Arc<S>) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<S>(),
            release: self.release.clone(),
        }
    }

    pub fn downcast<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<S>, Error> {
        self.value
            .downcast_ref::<Arc<S>>()
            .cloned()
            .ok_or_else(|| Error::type_mismatch(std::any::type_name::<S>(), self.type_name))
    }

    pub fn as_list(&self) -> Result<Arc<InstanceList>, Error> {
        self.downcast::<InstanceList>()
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True if both handles refer to the same produced instance.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    pub fn is_disposable(&self) -> bool {
        self.release.is_some()
    }

    /// Runs the disposal hook, if the service has one.
    pub(crate) fn release(&self) {
        if let Some(release) = &self.release {
            release();
        }
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance<{}>", self.type_name)
    }
}

#[cfg(feature = "debug")]
impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("disposable", &self.release.is_some())
            .finish()
    }
}

/// Ordered instances of every registration of one service.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct InstanceList(Vec<Instance>);

impl InstanceList {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.0.iter()
    }

    pub fn downcast_all<S: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<S>>, Error> {
        self.0.iter().map(Instance::downcast::<S>).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Greeter: Send + Sync {
        fn greet(&self) -> &'static str;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> &'static str {
            "hello"
        }
    }

    #[test]
    fn downcast_to_stored_type() {
        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(greeter);
        assert_eq!(instance.downcast::<dyn Greeter>().unwrap().greet(), "hello");
    }

    #[test]
    fn downcast_to_other_type_fails() {
        let instance = Instance::new(Arc::new(English));
        let err = instance.downcast::<dyn Greeter>().err().expect("type mismatch");
        assert_eq!(err.kind, crate::error::ErrorKind::TypeMismatch);
        assert!(err.message.contains("English"));
    }

    #[test]
    fn clones_share_identity() {
        let a = Instance::new(Arc::new(English));
        let b = a.clone();
        let c = Instance::new(Arc::new(English));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn retype_keeps_release_hook() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let concrete = Arc::new(English);
        let instance = Instance::new(concrete.clone()).with_release(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let upcast = instance.retype::<dyn Greeter>(concrete);
        assert!(upcast.is_disposable());
        upcast.release();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn list_downcasts_each_element() {
        let list = Instance::list(vec![Instance::new(Arc::new(1u8)), Instance::new(Arc::new(2u8))]);
        let items = list.as_list().unwrap().downcast_all::<u8>().unwrap();
        assert_eq!(items.iter().map(|v| **v).collect::<Vec<_>>(), vec![1, 2]);
    }
}
