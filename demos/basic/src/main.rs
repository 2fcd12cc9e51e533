use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use stylet_ioc::{
    Builder, Component, Constructor, Disposable, Error, GenericArgs, GenericDefinition, GenericImplementation,
    GenericInterface, Injectable, Module, Parameter, ServiceType, TypeInfo, abstract_factory, implements, upcast,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

#[derive(Default)]
struct ConsoleLogger {
    lines: AtomicUsize,
}

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        let line = self.lines.fetch_add(1, Ordering::SeqCst) + 1;
        println!("[{:>3}] {}", line, message);
    }
}

impl Disposable for ConsoleLogger {
    fn dispose(&self) {
        println!("logger closed after {} line(s)", self.lines.load(Ordering::SeqCst));
    }
}

impl Component for ConsoleLogger {
    fn as_disposable(&self) -> Option<&dyn Disposable> {
        Some(self)
    }
}

impl Injectable for ConsoleLogger {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new("new", |_| Ok(ConsoleLogger::default()))]
    }
}

implements!(ConsoleLogger: dyn Logger);

trait Greeter: Send + Sync {
    fn greet(&self, name: &str);
}

struct PoliteGreeter {
    logger: Arc<dyn Logger>,
    greeting: Arc<String>,
}

impl Greeter for PoliteGreeter {
    fn greet(&self, name: &str) {
        self.logger.log(&format!("{}, {}!", self.greeting, name));
    }
}

impl Component for PoliteGreeter {}

impl Injectable for PoliteGreeter {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![
            Constructor::new("new", |args| {
                Ok(PoliteGreeter {
                    logger: args.next()?,
                    greeting: args.next()?,
                })
            })
            .param(Parameter::of::<dyn Logger>("logger"))
            .param(Parameter::of::<String>("greeting").with_key("greeting")),
        ]
    }
}

implements!(PoliteGreeter: dyn Greeter);

trait Repository: Send + Sync {
    fn entity(&self) -> String;
}

struct MemoryRepository {
    entity: String,
}

impl Repository for MemoryRepository {
    fn entity(&self) -> String {
        self.entity.clone()
    }
}

impl Component for MemoryRepository {}

implements!(MemoryRepository: dyn Repository);

static IREPOSITORY: GenericDefinition = GenericDefinition::new("IRepository", &["T"], TypeInfo::of::<dyn Repository>);

fn repository_constructors(args: &GenericArgs) -> Vec<stylet_ioc::ConstructorPlan> {
    let entity = args.get(0).map(|arg| arg.to_string()).unwrap_or_default();
    vec![Constructor::new("new", move |_| Ok(MemoryRepository { entity: entity.clone() })).into_plan()]
}

static MEMORY_REPOSITORY: GenericImplementation = GenericImplementation {
    definition: GenericDefinition::new("MemoryRepository", &["T"], TypeInfo::of::<MemoryRepository>),
    implements: &[GenericInterface {
        service: &IREPOSITORY,
        args: &[stylet_ioc::TypePattern::Param("T")],
        upcast: upcast::<MemoryRepository, dyn Repository>,
    }],
    constructors: repository_constructors,
};

abstract_factory! {
    trait GreeterFactory {
        fn greeter(&self) -> Result<Arc<dyn Greeter>, Error>;
    }
}

#[derive(Debug)]
struct LoggingModule;

impl Module for LoggingModule {
    fn load(&self, builder: &mut Builder) {
        builder.bind::<dyn Logger>().to::<ConsoleLogger>().in_singleton_scope();
    }
}

#[derive(Debug)]
struct AppModule;

impl Module for AppModule {
    fn imports(&self) -> Vec<Box<dyn Module>> {
        vec![Box::new(LoggingModule)]
    }

    fn load(&self, builder: &mut Builder) {
        builder
            .bind::<String>()
            .to_instance(Arc::new("Hello".to_string()))
            .with_key("greeting");
        builder.bind::<dyn Greeter>().to::<PoliteGreeter>();
        if let Err(err) = builder.bind::<dyn GreeterFactory>().to_abstract_factory() {
            warn!("Greeter factory unavailable: {}", err);
        }
    }
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    let mut builder = Builder::new();
    builder.add_module(&AppModule);
    builder
        .bind_generic(&IREPOSITORY)
        .to_generic(&MEMORY_REPOSITORY)?
        .in_singleton_scope();

    let container = builder.build_container()?;
    container.compile(true)?;

    let greeter = container.get::<dyn Greeter>(None)?;
    greeter.greet("world");

    let factory = container.get::<dyn GreeterFactory>(None)?;
    factory.greeter()?.greet("factory");

    let users = container.get_generic::<dyn Repository>(&IREPOSITORY, vec![ServiceType::of::<u32>()], None)?;
    container.get::<dyn Logger>(None)?.log(&format!("repository for {}", users.entity()));

    let mut child_builder = container.create_child_builder();
    child_builder
        .bind::<String>()
        .to_instance(Arc::new("Howdy".to_string()))
        .with_key("greeting");
    let child = child_builder.build_container()?;
    child.get::<dyn Greeter>(None)?.greet("child");

    info!("Shutting down");
    child.dispose();
    container.dispose();

    match container.get::<dyn Greeter>(None) {
        Ok(_) => println!("unexpected: container still usable"),
        Err(err) => println!("after dispose: {}", err),
    }

    Ok(())
}
