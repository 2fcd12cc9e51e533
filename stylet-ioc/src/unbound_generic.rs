use std::sync::Arc;

#[cfg(feature = "tracing")]
use tracing::debug;

use crate::creator::TypeCreator;
use crate::error::Error;
use crate::generic::{GenericDefinition, GenericImplementation};
use crate::registration::Registration;
use crate::scope::Scope;
use crate::service_type::{GenericType, ServiceType};

/// An open generic binding, waiting for a closed request.
///
/// Each distinct closed service it is asked for gets its own
/// [`Registration`], so a singleton scope means one instance per closed type.
#[cfg_attr(feature = "debug", derive(Debug))]
pub struct UnboundGeneric {
    service: &'static GenericDefinition,
    implementation: &'static GenericImplementation,
    scope: Scope,
}

impl UnboundGeneric {
    pub(crate) fn new(
        service: &'static GenericDefinition,
        implementation: &'static GenericImplementation,
        scope: Scope,
    ) -> Result<Self, Error> {
        implementation.check_open_binding(service)?;
        Ok(Self {
            service,
            implementation,
            scope,
        })
    }

    /// Open implementation type, used to detect duplicate bindings.
    pub fn implementation(&self) -> ServiceType {
        ServiceType::open(&self.implementation.definition)
    }

    pub fn service(&self) -> &'static GenericDefinition {
        self.service
    }

    /// True if this binding can produce `service`.
    pub fn can_close(&self, service: &GenericType) -> bool {
        service.definition == self.service && self.implementation.can_close(service)
    }

    /// A fresh registration for the closed `service`, if it fits.
    pub(crate) fn close(&self, service: &GenericType) -> Option<Registration> {
        if service.definition != self.service {
            return None;
        }
        let closed = self.implementation.close(service)?;

        #[cfg(feature = "tracing")]
        debug!(
            "Closed {} as {} for {}",
            ServiceType::open(self.service),
            ServiceType::Generic(closed.implementation.clone()),
            ServiceType::Generic(service.clone())
        );

        Some(Registration::new(Arc::new(TypeCreator::closed(closed)), self.scope))
    }
}
