//! An optional process-wide container.
//!
//! Code that cannot receive the container through injection (callbacks
//! registered with foreign code, for example) can reach it here once the
//! application has installed it. Prefer injection everywhere else.

use std::sync::Arc;

use once_cell::sync::OnceCell;

#[cfg(feature = "tracing")]
use tracing::info;

use crate::container::Container;
use crate::error::{Error, ErrorKind};

static GLOBAL_CONTAINER: OnceCell<Container> = OnceCell::new();

/// Installs the process-wide container. Fails if one is already installed.
pub fn install(container: Container) -> Result<(), Error> {
    GLOBAL_CONTAINER
        .set(container)
        .map_err(|_| Error::new(ErrorKind::Registration, "A global container is already installed"))?;

    #[cfg(feature = "tracing")]
    info!("Installed global container");

    Ok(())
}

/// The installed container, if any.
pub fn container() -> Option<&'static Container> {
    GLOBAL_CONTAINER.get()
}

/// Resolves `S` from the installed container.
pub fn get<S: ?Sized + Send + Sync + 'static>(key: Option<&str>) -> Result<Arc<S>, Error> {
    container()
        .ok_or_else(|| Error::new(ErrorKind::Registration, "No global container is installed"))?
        .get::<S>(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    // The cell is process-wide, so everything runs in one test.
    #[test]
    fn install_once_then_resolve() {
        let mut builder = Builder::new();
        builder.bind::<String>().to_instance(Arc::new("global".to_string()));
        let container = builder.build_container().unwrap();

        install(container.clone()).unwrap();
        assert!(super::container().is_some_and(|installed| installed.ptr_eq(&container)));
        assert_eq!(*get::<String>(None).unwrap(), "global");

        let other = Builder::new().build_container().unwrap();
        assert_eq!(install(other).unwrap_err().kind, ErrorKind::Registration);
    }
}
