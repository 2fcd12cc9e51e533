use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::Container;
use crate::error::Error;
use crate::func::Func;
use crate::injectable::Component;
use crate::instance::Instance;
use crate::service_type::{ServiceKey, ServiceType};

type IsUnset<T> = Arc<dyn Fn(&mut T) -> bool + Send + Sync>;
type Assign<T> = Arc<dyn Fn(&mut T, Instance) -> Result<(), Error> + Send + Sync>;

/// An injectable member of `T`.
///
/// Members are written through a plain accessor function and are only
/// assigned while they still hold their default (`None` or empty).
pub struct Member<T> {
    name: &'static str,
    service: ServiceType,
    key: Option<String>,
    is_unset: IsUnset<T>,
    assign: Assign<T>,
}

impl<T: 'static> Member<T> {
    pub fn of<S: ?Sized + Send + Sync + 'static>(name: &'static str, field: fn(&mut T) -> &mut Option<Arc<S>>) -> Self {
        Self {
            name,
            service: ServiceType::of::<S>(),
            key: None,
            is_unset: Arc::new(move |target: &mut T| field(target).is_none()),
            assign: Arc::new(move |target: &mut T, instance: Instance| {
                *field(target) = Some(instance.downcast::<S>()?);
                Ok(())
            }),
        }
    }

    pub fn all<S: ?Sized + Send + Sync + 'static>(name: &'static str, field: fn(&mut T) -> &mut Vec<Arc<S>>) -> Self {
        Self {
            name,
            service: ServiceType::many(ServiceType::of::<S>()),
            key: None,
            is_unset: Arc::new(move |target: &mut T| field(target).is_empty()),
            assign: Arc::new(move |target: &mut T, instance: Instance| {
                *field(target) = instance.as_list()?.downcast_all::<S>()?;
                Ok(())
            }),
        }
    }

    pub fn func<S: ?Sized + Send + Sync + 'static>(name: &'static str, field: fn(&mut T) -> &mut Option<Func<S>>) -> Self {
        Self {
            name,
            service: ServiceType::func(ServiceType::of::<S>()),
            key: None,
            is_unset: Arc::new(move |target: &mut T| field(target).is_none()),
            assign: Arc::new(move |target: &mut T, instance: Instance| {
                *field(target) = Some(Func::from_instance(&instance)?);
                Ok(())
            }),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn service_key(&self) -> ServiceKey {
        ServiceKey::new(self.service.clone(), self.key.as_deref())
    }
}

/// Cached injection plan for one component type.
pub(crate) struct BuilderUpper<T> {
    members: Vec<Member<T>>,
    _component: PhantomData<fn(&mut T)>,
}

impl<T: Component> BuilderUpper<T> {
    pub(crate) fn new() -> Self {
        Self {
            members: T::members(),
            _component: PhantomData,
        }
    }

    pub(crate) fn build_up(&self, target: &mut T, context: &Container) -> Result<(), Error> {
        for member in &self.members {
            if !(member.is_unset)(target) {
                continue;
            }
            let value = context.get_type_or_all(&member.service, member.key.as_deref())?;
            (member.assign)(target, value)?;
        }
        target.parameters_injected();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    impl Component for FixedClock {}

    crate::implements!(FixedClock: dyn Clock);

    #[derive(Default)]
    struct Report {
        clock: Option<Arc<dyn Clock>>,
        backup: Option<Arc<dyn Clock>>,
        clocks: Vec<Arc<dyn Clock>>,
        ready: bool,
    }

    impl Component for Report {
        fn members() -> Vec<Member<Self>> {
            vec![
                Member::of::<dyn Clock>("clock", |r: &mut Report| &mut r.clock),
                Member::of::<dyn Clock>("backup", |r: &mut Report| &mut r.backup).with_key("backup"),
                Member::all::<dyn Clock>("clocks", |r: &mut Report| &mut r.clocks),
            ]
        }

        fn parameters_injected(&mut self) {
            self.ready = true;
        }
    }

    fn container() -> Container {
        let mut builder = Builder::new();
        builder.bind::<dyn Clock>().to_instance(Arc::new(FixedClock(1)));
        builder
            .bind::<dyn Clock>()
            .to_instance(Arc::new(FixedClock(2)))
            .with_key("backup");
        builder.build_container().unwrap()
    }

    #[test]
    fn injects_unset_members_then_notifies() {
        let container = container();
        let mut report = Report::default();
        container.build_up(&mut report).unwrap();
        assert_eq!(report.clock.as_ref().unwrap().now(), 1);
        assert_eq!(report.backup.as_ref().unwrap().now(), 2);
        assert_eq!(report.clocks.len(), 1);
        assert!(report.ready);
    }

    #[test]
    fn leaves_assigned_members_alone() {
        let container = container();
        let mut report = Report {
            clock: Some(Arc::new(FixedClock(42))),
            ..Report::default()
        };
        container.build_up(&mut report).unwrap();
        assert_eq!(report.clock.as_ref().unwrap().now(), 42);
    }

    #[test]
    fn unresolvable_member_fails() {
        let container = Builder::new().build_container().unwrap();
        let mut report = Report::default();
        let err = container.build_up(&mut report).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Registration);
        assert!(!report.ready);
    }
}
