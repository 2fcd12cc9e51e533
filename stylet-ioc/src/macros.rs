//! Declaration macros.
//!
//! - [`implements!`]: declare which trait-object services a concrete type
//!   can stand in for.
//! - [`abstract_factory!`]: declare a factory trait whose implementation the
//!   container generates.
//!
//! [`implements!`]: crate::implements
//! [`abstract_factory!`]: crate::abstract_factory

/// Implements [`Implements`](crate::Implements) for each listed service.
///
/// ```
/// use stylet_ioc::{implements, Implements};
/// use std::sync::Arc;
///
/// trait Named: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
/// trait Aged: Send + Sync {}
///
/// struct Cat;
/// impl Named for Cat {
///     fn name(&self) -> &'static str {
///         "cat"
///     }
/// }
/// impl Aged for Cat {}
///
/// implements!(Cat: dyn Named, dyn Aged);
///
/// let named: Arc<dyn Named> = <Cat as Implements<dyn Named>>::upcast(Arc::new(Cat));
/// assert_eq!(named.name(), "cat");
/// ```
#[macro_export]
macro_rules! implements {
    ($concrete:ty : $($service:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$service> for $concrete {
                fn upcast(this: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$service> {
                    this
                }
            }
        )+
    };
}

/// Declares an abstract factory trait and generates its implementation.
///
/// Each method returns `Result<Arc<S>, Error>`, `Result<Vec<Arc<S>>, Error>`
/// or `Result<Func<S>, Error>` and takes either nothing or a single `&str`,
/// which is used as the lookup key. A method without a key argument may
/// declare a fixed key with `#[key = "..."]`.
///
/// The generated trait requires `Send + Sync`; bind it with
/// [`to_abstract_factory`](crate::BindTo::to_abstract_factory).
#[macro_export]
macro_rules! abstract_factory {
    (
        $(#[$attr:meta])*
        $vis:vis trait $name:ident {
            $(
                $(#[key = $key:literal])?
                fn $method:ident(&self $(, $arg:ident : &str)?) -> $ret:ty;
            )+
        }
    ) => {
        $(#[$attr])*
        $vis trait $name: Send + Sync {
            $(
                fn $method(&self $(, $arg: &str)?) -> $ret;
            )+
        }

        impl $name for $crate::FactoryProxy<dyn $name> {
            $(
                fn $method(&self $(, $arg: &str)?) -> $ret {
                    self.invoke::<$ret>($crate::__factory_key!($($key)? ; $($arg)?))
                }
            )+
        }

        impl $crate::AbstractFactory for dyn $name {
            fn descriptor() -> $crate::FactoryDescriptor {
                $crate::FactoryDescriptor::new(
                    $crate::TypeInfo::of::<dyn $name>(),
                    vec![
                        $(
                            $crate::FactoryMethod::new(
                                stringify!($method),
                                Some(<$ret as $crate::FactoryOutput>::service()),
                            )
                            $(.with_key($key))?
                            $(.with_parameter(stringify!($arg), "&str"))?
                        ),+
                    ],
                )
            }

            fn create(context: $crate::Container) -> ::std::sync::Arc<Self> {
                ::std::sync::Arc::new($crate::FactoryProxy::<dyn $name>::new(context))
            }
        }
    };
}

/// The key a generated factory method resolves with: its argument if it has
/// one, else its declared key.
#[doc(hidden)]
#[macro_export]
macro_rules! __factory_key {
    ($key:literal ; $arg:ident) => {
        Some($arg)
    };
    (; $arg:ident) => {
        Some($arg)
    };
    ($key:literal ;) => {
        Some($key)
    };
    (;) => {
        None
    };
}
