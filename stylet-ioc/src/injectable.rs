use std::sync::Arc;

use crate::builder_upper::Member;
use crate::constructor::Constructor;
use crate::error::Error;
use crate::instance::Instance;

/// A resource that must be released when its owning container is disposed.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

/// A type the container can inject members into.
///
/// Every type the container constructs is a component; a type that is only
/// ever built up (constructed by someone else, then handed to
/// [`Container::build_up`](crate::Container::build_up)) needs nothing more.
pub trait Component: Send + Sync + Sized + 'static {
    /// Injectable members, assigned after construction in declaration order.
    ///
    /// Members whose current value is not the default are left alone.
    fn members() -> Vec<Member<Self>> {
        Vec::new()
    }

    /// Called once every member has been injected.
    fn parameters_injected(&mut self) {}

    /// Returns the disposal contract if this component holds resources.
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        None
    }
}

/// A component the container knows how to construct.
pub trait Injectable: Component {
    /// Public constructors, in declaration order.
    fn constructors() -> Vec<Constructor<Self>>;
}

/// Declares that `Self` can stand in for the service `S`.
///
/// Every type implements itself. Trait-object services are normally
/// declared with [`implements!`](crate::implements).
pub trait Implements<S: ?Sized + Send + Sync + 'static>: Send + Sync + 'static {
    fn upcast(this: Arc<Self>) -> Arc<S>;
}

impl<T: Send + Sync + 'static> Implements<T> for T {
    fn upcast(this: Arc<Self>) -> Arc<T> {
        this
    }
}

/// Converts an instance stored as `C` into one stored as `S`.
pub fn upcast<C, S>(instance: Instance) -> Result<Instance, Error>
where
    C: Implements<S>,
    S: ?Sized + Send + Sync + 'static,
{
    let concrete = instance.downcast::<C>()?;
    Ok(instance.retype::<S>(C::upcast(concrete)))
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Animal: Send + Sync {
        fn sound(&self) -> &'static str;
    }

    struct Dog;

    impl Animal for Dog {
        fn sound(&self) -> &'static str {
            "woof"
        }
    }

    crate::implements!(Dog: dyn Animal);

    #[test]
    fn upcast_to_trait_object() {
        let instance = Instance::new(Arc::new(Dog));
        let animal = upcast::<Dog, dyn Animal>(instance).unwrap();
        assert_eq!(animal.downcast::<dyn Animal>().unwrap().sound(), "woof");
    }

    #[test]
    fn upcast_to_self_is_identity() {
        let dog = Arc::new(Dog);
        let same = <Dog as Implements<Dog>>::upcast(dog.clone());
        assert!(Arc::ptr_eq(&dog, &same));
    }

    #[test]
    fn upcast_from_wrong_type_fails() {
        let instance = Instance::new(Arc::new(5u32));
        let err = upcast::<Dog, dyn Animal>(instance).err().expect("mismatch");
        assert_eq!(err.kind, crate::error::ErrorKind::TypeMismatch);
    }
}
