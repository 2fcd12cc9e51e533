use std::fmt;

/// Lifetime of the instances a registration produces.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "debug", derive(Debug))]
pub enum Scope {
    /// A new instance for every request.
    #[default]
    Transient,
    /// One instance per container. A child container gets its own.
    Singleton,
    /// Same caching as [`Scope::Singleton`]: one instance per container,
    /// a fresh one in each child. Kept as a separate name for bindings that
    /// want to state the per-container intent.
    PerContainer,
}

impl Scope {
    pub fn is_singleton(self) -> bool {
        matches!(self, Scope::Singleton | Scope::PerContainer)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Scope::Transient => "transient",
            Scope::Singleton => "singleton",
            Scope::PerContainer => "per-container",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_container_caches_like_singleton() {
        assert!(Scope::Singleton.is_singleton());
        assert!(Scope::PerContainer.is_singleton());
        assert!(!Scope::Transient.is_singleton());
        assert_eq!(Scope::PerContainer.to_string(), "per-container");
    }
}
