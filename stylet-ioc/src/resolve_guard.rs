//! Thread-local stack guard for circular dependency detection.
//!
//! Every registration being resolved on the current thread is pushed onto a
//! stack together with the key it was requested under. Requesting a
//! registration that is already on the stack means the dependency graph has
//! a cycle, and the whole chain is reported instead of recursing forever.
//!
//! # Example
//! ```
//! use stylet_ioc::{ErrorKind, ResolveGuard, ServiceKey};
//!
//! let a = ServiceKey::of::<u8>(None);
//! let b = ServiceKey::of::<u16>(None);
//! let _g1 = ResolveGuard::push(1, &a).unwrap();
//! let _g2 = ResolveGuard::push(2, &b).unwrap();
//! let err = ResolveGuard::push(1, &a).unwrap_err();
//! assert!(matches!(err.kind, ErrorKind::CircularDependency));
//! ```

use std::cell::RefCell;

use crate::error::Error;
use crate::service_type::ServiceKey;

thread_local! {
    // Registration identities being resolved on this thread, with the key
    // each was requested under for reporting.
    static RESOLVE_STACK: RefCell<Vec<(usize, ServiceKey)>> = const { RefCell::new(Vec::new()) };
}

/// Pops the registration it was created for when dropped.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct ResolveGuard {
    pub id: usize,
}

impl ResolveGuard {
    /// Try to push a registration onto the thread-local stack.
    ///
    /// Returns `Err(Error::circular_dependency(..))` if it is already on the
    /// stack, otherwise a guard that pops it on drop.
    pub fn push(id: usize, key: &ServiceKey) -> Result<Self, Error> {
        RESOLVE_STACK.with(|stack| {
            let mut v = stack.borrow_mut();
            if v.iter().any(|(existing, _)| *existing == id) {
                let mut chain: Vec<String> = v.iter().map(|(_, key)| key.to_string()).collect();
                chain.push(key.to_string());
                let refs: Vec<&str> = chain.iter().map(|s| s.as_str()).collect();
                return Err(Error::circular_dependency(&refs));
            }
            v.push((id, key.clone()));
            Ok(ResolveGuard { id })
        })
    }

    /// Number of registrations currently being resolved on this thread.
    pub fn depth() -> usize {
        RESOLVE_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ResolveGuard {
    fn drop(&mut self) {
        RESOLVE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn push_and_pop_stack() {
        let a = ServiceKey::of::<u8>(None);
        let b = ServiceKey::of::<u16>(Some("b"));
        {
            let _g1 = ResolveGuard::push(1, &a).unwrap();
            {
                let _g2 = ResolveGuard::push(2, &b).unwrap();
                let err = ResolveGuard::push(1, &a).unwrap_err();
                assert!(matches!(err.kind, ErrorKind::CircularDependency));
                assert!(err.message.contains("u8 -> u16 (key 'b') -> u8"));
            }
            assert_eq!(ResolveGuard::depth(), 1);
            assert!(ResolveGuard::push(1, &a).is_err());
        }
        assert_eq!(ResolveGuard::depth(), 0);
        let _g = ResolveGuard::push(1, &a).unwrap();
    }

    #[test]
    fn same_key_different_registration_is_not_a_cycle() {
        let a = ServiceKey::of::<u8>(None);
        let _g1 = ResolveGuard::push(10, &a).unwrap();
        let _g2 = ResolveGuard::push(11, &a).unwrap();
        assert_eq!(ResolveGuard::depth(), 2);
    }
}
