use std::{env, fs, sync::Arc, thread};

use graft_di::{
    compile, Assisted, CompilerOptions, Container, DynError, InjectionTarget, Instance, Parameter,
    Provider, ProviderDefinition, Registry, RequireError, Scope, ScopeKind, TypeKey, TypeRef,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), DynError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match env::args().nth(1) {
        Some(path) => check(&path, env::args().nth(2).as_deref()),
        None => demo(),
    }
}

/// Compiles a registry read from json and prints either its diagnostics or its blueprint
fn check(registry: &str, options: Option<&str>) -> Result<(), DynError> {
    let registry = Registry::from_json(&fs::read_to_string(registry)?)?;
    let options = match options {
        Some(path) => CompilerOptions::from_json(&fs::read_to_string(path)?)?,
        None => CompilerOptions::default(),
    };

    match compile(&registry, &options) {
        Ok(blueprint) => {
            for warning in &blueprint.warnings {
                println!("{warning}");
            }
            println!("{}", serde_json::to_string_pretty(&blueprint)?);
            Ok(())
        }
        Err(diagnostics) => {
            for diagnostic in &diagnostics {
                println!("{diagnostic}");
            }
            Err(format!("{} diagnostics", diagnostics.len()).into())
        }
    }
}

#[derive(Debug)]
struct Config {
    db_name: String,
    default_schema: String,
}

#[derive(Debug)]
struct DbService {
    name: String,
    schema: String,
}

#[derive(Debug)]
struct Service {
    db: Arc<DbService>,
    name: String,
}

impl Service {
    fn start(&self) {
        tracing::info!("Starting service {} on {}", self.name, self.db.schema);
    }

    fn stop(&self) {
        tracing::info!("Stopping service {}", self.name);
    }
}

struct Task {
    service: Arc<Service>,
}

struct AssistedTask {
    service: Arc<Service>,
    name: String,
}

struct App {
    service: Arc<Service>,
    db: Arc<DbService>,
    assisted_task: Provider<AssistedTask>,
    task: Provider<Task>,
    task2: Arc<Task>,
}

impl App {
    fn run(&self) -> Result<(), RequireError> {
        tracing::info!("Running app with {} on {}", self.service.name, self.db.name);
        self.task.get()?;
        self.assisted_task.get_with(Assisted::new().with("One".to_string()))?;
        self.assisted_task.get_with(Assisted::new().with("Two".to_string()))?;
        let task = self.task.get()?;
        tracing::info!(
            "Tasks share their service: {}",
            Arc::ptr_eq(&task.service, &self.task2.service)
        );
        Ok(())
    }
}

#[derive(Default)]
struct FrameworkClass {
    db: Option<Arc<DbService>>,
    config: Option<Arc<Config>>,
}

/// Produces twice and hands out the second value
struct DoubleScope;

impl Scope for DoubleScope {
    fn get_scoped(
        &self,
        _key: &TypeKey,
        produce: graft_di::scope::Produce<'_>,
    ) -> Result<Instance, RequireError> {
        produce()?;
        produce()
    }

    fn clear(&self) {}
}

fn registry() -> Registry {
    Registry::new()
        .add_provider(
            ProviderDefinition::function(TypeKey::of::<Config>(), "config", vec![])
                .scoped(ScopeKind::Singleton),
        )
        .add_provider(
            ProviderDefinition::function(
                TypeKey::of::<DbService>(),
                "default_db",
                vec![Parameter::named("config", TypeKey::of::<Config>())],
            )
            .scoped(ScopeKind::Thread),
        )
        .add_provider(
            ProviderDefinition::constructor(
                TypeKey::of::<Service>(),
                vec![
                    Parameter::new("container", TypeRef::unresolved("Container")),
                    Parameter::named("db", TypeKey::of::<DbService>()),
                ],
            )
            .scoped(ScopeKind::Singleton)
            .post_construct("start")
            .pre_destroy("stop"),
        )
        .add_provider(ProviderDefinition::constructor(
            TypeKey::of::<Task>(),
            vec![Parameter::named("service", TypeKey::of::<Service>())],
        ))
        .add_provider(
            ProviderDefinition::constructor(
                TypeKey::of::<AssistedTask>(),
                vec![
                    Parameter::named("service", TypeKey::of::<Service>()),
                    Parameter::assisted("name", "String"),
                ],
            )
            .post_construct("prepare"),
        )
        .add_provider(
            ProviderDefinition::constructor(
                TypeKey::of::<App>(),
                vec![
                    Parameter::named("service", TypeKey::of::<Service>()),
                    Parameter::named("db", TypeKey::of::<DbService>()),
                    Parameter::new("assisted_task", TypeRef::unresolved("AssistedTaskFactory")),
                    Parameter::new(
                        "task",
                        TypeRef::generic("Provider", vec![TypeRef::named(TypeKey::of::<Task>())]),
                    ),
                    Parameter::named("task2", TypeKey::of::<Task>()),
                ],
            )
            .scoped(ScopeKind::custom("double")),
        )
        .add_injection_target(
            InjectionTarget::new(TypeKey::of::<FrameworkClass>())
                .field("db", TypeRef::named(TypeKey::of::<DbService>()))
                .field("config", TypeRef::named(TypeKey::of::<Config>()))
                .method(
                    "dependencies",
                    vec![Parameter::named("service", TypeKey::of::<Service>())],
                ),
        )
}

fn container(registry: &Registry) -> Result<Container, DynError> {
    let blueprint = compile(registry, &CompilerOptions::default())?;
    let framework = TypeKey::of::<FrameworkClass>();

    let container = Container::builder(blueprint)
        .constructor(TypeKey::of::<Config>(), |_| {
            Ok(Config {
                db_name: "database".into(),
                default_schema: "schema".into(),
            })
        })
        .constructor(TypeKey::of::<DbService>(), |args| {
            let config = args.get::<Config>(0)?;
            Ok(DbService {
                name: config.db_name.clone(),
                schema: config.default_schema.clone(),
            })
        })
        .constructor(TypeKey::of::<Service>(), |args| {
            let config = args.container(0)?.require::<Config>()?;
            Ok(Service {
                db: args.get(1)?,
                name: format!("Service for {}", config.db_name),
            })
        })
        .hook(TypeKey::of::<Service>(), "start", Service::start)
        .hook(TypeKey::of::<Service>(), "stop", Service::stop)
        .constructor(TypeKey::of::<Task>(), |args| {
            Ok(Task {
                service: args.get(0)?,
            })
        })
        .constructor(TypeKey::of::<AssistedTask>(), |args| {
            Ok(AssistedTask {
                service: args.get(0)?,
                name: args.get::<String>(1)?.to_string(),
            })
        })
        .hook(TypeKey::of::<AssistedTask>(), "prepare", |task: &AssistedTask| {
            tracing::info!("Assisted task {} created with {}", task.name, task.service.name);
        })
        .constructor(TypeKey::of::<App>(), |args| {
            Ok(App {
                service: args.get(0)?,
                db: args.get(1)?,
                assisted_task: args.provider(2)?,
                task: args.provider(3)?,
                task2: args.get(4)?,
            })
        })
        .custom_scope("double", DoubleScope)
        .injector(framework.clone(), "db", |target: &mut FrameworkClass, args| {
            target.db = Some(args.get(0)?);
            Ok(())
        })
        .injector(framework.clone(), "config", |target: &mut FrameworkClass, args| {
            target.config = Some(args.get(0)?);
            Ok(())
        })
        .injector(framework, "dependencies", |target: &mut FrameworkClass, args| {
            let service = args.get::<Service>(0)?;
            tracing::info!(
                "Got {} with {:?} and {:?}",
                service.name,
                target.db,
                target.config
            );
            Ok(())
        })
        .build()?;
    Ok(container)
}

fn demo() -> Result<(), DynError> {
    let container = container(&registry())?;
    tracing::info!("{:?}", container);

    container.require::<App>()?.run()?;

    let mut framework = FrameworkClass::default();
    container.inject(&TypeKey::of::<FrameworkClass>(), &mut framework)?;

    let task = container.get_with::<AssistedTask>(
        &TypeKey::of::<AssistedTask>(),
        Assisted::new().with("Test".to_string()),
    )?;
    tracing::info!("Built assisted task {}", task.name);

    let here = container.require::<DbService>()?;
    let other = thread::scope(|s| s.spawn(|| container.require::<DbService>()).join())
        .map_err(|_| "db thread panicked")??;
    tracing::info!("Each thread has its own db: {}", !Arc::ptr_eq(&here, &other));

    container.destroy();
    container.require::<App>()?.run()?;
    container.destroy();
    Ok(())
}
