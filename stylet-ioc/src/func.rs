use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::{Container, WeakContainer};
use crate::error::Error;
use crate::instance::Instance;
use crate::service_type::ServiceKey;

/// Untyped lazy handle: resolves its service from its container on each call.
///
/// The container is held weakly. Calling the handle after every owner of
/// the container has dropped it fails with a disposed-access error.
pub struct FuncHandle {
    context: WeakContainer,
    key: ServiceKey,
}

impl FuncHandle {
    pub(crate) fn new(context: &Container, key: ServiceKey) -> Self {
        Self {
            context: context.downgrade(),
            key,
        }
    }

    pub fn key(&self) -> &ServiceKey {
        &self.key
    }

    pub fn invoke(&self) -> Result<Instance, Error> {
        self.context.upgrade()?.resolve_key(&self.key)
    }
}

/// A factory for `S`, as injected for `Func` parameters and members.
///
/// Each [`call`](Func::call) asks the container again, so a transient
/// service yields a fresh instance every time.
pub struct Func<S: ?Sized> {
    handle: Arc<FuncHandle>,
    _service: PhantomData<fn() -> Arc<S>>,
}

impl<S: ?Sized + Send + Sync + 'static> Func<S> {
    pub(crate) fn from_instance(instance: &Instance) -> Result<Self, Error> {
        Ok(Self {
            handle: instance.downcast::<FuncHandle>()?,
            _service: PhantomData,
        })
    }

    pub fn call(&self) -> Result<Arc<S>, Error> {
        self.handle.invoke()?.downcast::<S>()
    }

    pub fn key(&self) -> &ServiceKey {
        self.handle.key()
    }
}

impl<S: ?Sized> Clone for Func<S> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            _service: PhantomData,
        }
    }
}

impl<S: ?Sized> fmt::Display for Func<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Func<{}>", self.handle.key)
    }
}

#[cfg(feature = "debug")]
impl<S: ?Sized> fmt::Debug for Func<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Func").field("key", &self.handle.key).finish()
    }
}
