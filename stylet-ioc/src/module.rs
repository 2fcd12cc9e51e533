use std::any::Any;

use crate::builder::Builder;

/// A reusable bundle of bindings.
///
/// Modules returned by [`imports`](Module::imports) are loaded before the
/// module itself, and each module type is loaded once per builder.
#[cfg(feature = "debug")]
pub trait Module: Any + std::fmt::Debug {
    fn imports(&self) -> Vec<Box<dyn Module>> {
        vec![]
    }

    fn load(&self, builder: &mut Builder);
}

#[cfg(not(feature = "debug"))]
pub trait Module: Any {
    fn imports(&self) -> Vec<Box<dyn Module>> {
        vec![]
    }

    fn load(&self, builder: &mut Builder);
}
