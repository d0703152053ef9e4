use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier, Mutex,
    },
    thread,
    time::Duration,
};

use graft_di::{
    compile, Assisted, BindingProblem, CompilerOptions, Container, InjectionTarget, Instance,
    Parameter, Provider, ProviderDefinition, Registry, RequireError, Scope, ScopeKind, TypeKey,
    TypeRef,
};

fn key(name: &str) -> TypeKey {
    TypeKey::new(name)
}

fn blueprint(registry: &Registry) -> graft_di::Blueprint {
    compile(registry, &CompilerOptions::default()).unwrap()
}

#[derive(Debug)]
struct Value(usize);

fn counting_container(scope: ScopeKind) -> (Container, Arc<AtomicUsize>) {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("Value", vec![]).scoped(scope));
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();
    let container = Container::builder(blueprint(&registry))
        .constructor("Value", move |_| {
            thread::sleep(Duration::from_millis(5));
            Ok(Value(counter.fetch_add(1, Ordering::SeqCst)))
        })
        .build()
        .unwrap();
    (container, built)
}

#[test]
fn singleton_identity() {
    let (container, _) = counting_container(ScopeKind::Singleton);
    let a = container.get::<Value>(&key("Value")).unwrap();
    let b = container.get::<Value>(&key("Value")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn unscoped_values_are_distinct() {
    let (container, built) = counting_container(ScopeKind::Unscoped);
    let a = container.get::<Value>(&key("Value")).unwrap();
    let b = container.get::<Value>(&key("Value")).unwrap();
    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn thread_scope_isolates_threads() {
    let (container, built) = counting_container(ScopeKind::Thread);
    let here = container.get::<Value>(&key("Value")).unwrap();
    let again = container.get::<Value>(&key("Value")).unwrap();
    let there = thread::scope(|s| {
        s.spawn(|| container.get::<Value>(&key("Value")).unwrap())
            .join()
            .unwrap()
    });

    assert!(Arc::ptr_eq(&here, &again));
    assert!(!Arc::ptr_eq(&here, &there));
    assert_eq!(built.load(Ordering::SeqCst), 2);
}

#[test]
fn concurrent_first_access_constructs_once() {
    let (container, built) = counting_container(ScopeKind::Singleton);
    let barrier = Barrier::new(16);

    let values: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = (0..16)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    container.get::<Value>(&key("Value")).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(values.iter().all(|v| Arc::ptr_eq(v, &values[0])));
}

struct A {
    b: Provider<B>,
}

struct B {
    a: Arc<A>,
}

#[test]
fn cycle_through_provider_wires_the_real_instance() {
    let registry = Registry::new()
        .add_provider(
            ProviderDefinition::constructor(
                "A",
                vec![Parameter::new("b", TypeRef::generic("Provider", vec![TypeRef::named("B")]))],
            )
            .scoped(ScopeKind::Singleton),
        )
        .add_provider(ProviderDefinition::constructor("B", vec![Parameter::named("a", "A")]));

    let container = Container::builder(blueprint(&registry))
        .constructor("A", |args| Ok(A { b: args.provider(0)? }))
        .constructor("B", |args| match args.owner().as_str() {
            "B" => Ok(B { a: args.get(0)? }),
            other => Err(format!("built arguments for {other}").into()),
        })
        .build()
        .unwrap();

    let a = container.get::<A>(&key("A")).unwrap();
    let b = a.b.get().unwrap();
    assert!(Arc::ptr_eq(&a, &b.a));

    let from_b = container.get::<B>(&key("B")).unwrap();
    assert!(Arc::ptr_eq(&from_b.a, &a));
}

#[test]
fn direct_cycle_fails_at_runtime_instead_of_hanging() {
    let registry = Registry::new()
        .add_provider(
            ProviderDefinition::constructor("A", vec![Parameter::named("b", "B")])
                .scoped(ScopeKind::Singleton),
        )
        .add_provider(ProviderDefinition::constructor("B", vec![Parameter::named("a", "A")]));
    let options = CompilerOptions::default().with_direct_cycles_rejected(false);

    let container = Container::builder(compile(&registry, &options).unwrap())
        .constructor("A", |args| Ok(args.get::<u8>(0)?.to_string()))
        .constructor("B", |args| Ok(args.get::<String>(0)?.len() as u8))
        .build()
        .unwrap();

    let err = container.get::<String>(&key("A")).unwrap_err();
    match err {
        RequireError::CircularConstruction { chain } => {
            assert_eq!(chain, [key("A"), key("B"), key("A")]);
        }
        other => panic!("unexpected {other}"),
    }
}

#[derive(Debug)]
struct Service {
    name: &'static str,
}

type Log = Arc<Mutex<Vec<String>>>;

fn lifecycle_container(log: &Log) -> Container {
    let registry = Registry::new()
        .add_provider(
            ProviderDefinition::constructor("Db", vec![])
                .scoped(ScopeKind::Singleton)
                .post_construct("open")
                .pre_destroy("close"),
        )
        .add_provider(
            ProviderDefinition::constructor("Api", vec![Parameter::named("db", "Db")])
                .scoped(ScopeKind::Singleton)
                .post_construct("open")
                .pre_destroy("flush")
                .pre_destroy("close"),
        );

    let hook = |event: &'static str| {
        let log = log.clone();
        move |service: &Service| log.lock().unwrap().push(format!("{event} {}", service.name))
    };

    Container::builder(blueprint(&registry))
        .constructor("Db", |_| Ok(Service { name: "db" }))
        .constructor("Api", |args| {
            args.get::<Service>(0)?;
            Ok(Service { name: "api" })
        })
        .hook("Db", "open", hook("open"))
        .hook("Db", "close", hook("close"))
        .hook("Api", "open", hook("open"))
        .hook("Api", "flush", hook("flush"))
        .hook("Api", "close", hook("close"))
        .build()
        .unwrap()
}

#[test]
fn destroy_runs_hooks_in_registration_order_once() {
    let log = Log::default();
    let container = lifecycle_container(&log);

    let first = container.get::<Service>(&key("Api")).unwrap();
    assert_eq!(*log.lock().unwrap(), ["open db", "open api"]);

    container.destroy();
    container.destroy();
    assert_eq!(
        log.lock().unwrap()[2..],
        ["close db", "flush api", "close api"]
    );

    log.lock().unwrap().clear();
    let second = container.get::<Service>(&key("Api")).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(*log.lock().unwrap(), ["open db", "open api"]);
}

#[derive(Debug)]
struct Task {
    name: Arc<String>,
    priority: Arc<u8>,
}

#[test]
fn assisted_factory_builds_fresh_values_through_a_provider() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor(
            "Task",
            vec![Parameter::assisted("name", "String"), Parameter::assisted("priority", "u8")],
        ))
        .add_provider(ProviderDefinition::constructor(
            "Scheduler",
            vec![Parameter::new("tasks", TypeRef::unresolved("TaskFactory"))],
        ));
    let container = Container::builder(blueprint(&registry))
        .constructor("Task", |args| {
            Ok(Task {
                name: args.get(0)?,
                priority: args.get(1)?,
            })
        })
        .constructor("Scheduler", |args| args.provider::<Task>(0).map_err(Into::into))
        .build()
        .unwrap();

    let tasks = container.get::<Provider<Task>>(&key("Scheduler")).unwrap();
    let one = tasks.get_with(Assisted::new().with("one".to_string()).with(1u8)).unwrap();
    let two = tasks.get_with(Assisted::new().with("two".to_string()).with(2u8)).unwrap();
    assert_eq!((one.name.as_str(), *one.priority), ("one", 1));
    assert_eq!((two.name.as_str(), *two.priority), ("two", 2));

    assert!(matches!(tasks.get(), Err(RequireError::AssistedRequired(_))));
}

#[test]
fn provider_outliving_its_container_fails() {
    let (container, _) = counting_container(ScopeKind::Singleton);
    let provider = container.provider::<Value>(&key("Value")).unwrap();
    assert_eq!(provider.get().unwrap().0, 0);

    drop(container);
    assert!(matches!(provider.get(), Err(RequireError::ContainerDropped)));
}

/// Caches per key, counting how often it was cleared
#[derive(Default)]
struct SessionScope {
    values: Mutex<HashMap<TypeKey, Instance>>,
    cleared: Arc<AtomicUsize>,
}

impl Scope for SessionScope {
    fn get_scoped(
        &self,
        key: &TypeKey,
        produce: graft_di::scope::Produce<'_>,
    ) -> Result<Instance, RequireError> {
        if let Some(value) = self.values.lock().unwrap().get(key) {
            return Ok(value.clone());
        }
        let value = produce()?;
        self.values.lock().unwrap().insert(key.clone(), value.clone());
        Ok(value)
    }

    fn clear(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
        self.values.lock().unwrap().clear();
    }
}

#[test]
fn custom_scope_is_used_and_cleared() {
    let registry = Registry::new().add_provider(
        ProviderDefinition::constructor("Value", vec![]).scoped(ScopeKind::custom("session")),
    );
    let scope = SessionScope::default();
    let cleared = scope.cleared.clone();
    let container = Container::builder(blueprint(&registry))
        .constructor("Value", |_| Ok(Value(7)))
        .custom_scope("session", scope)
        .build()
        .unwrap();

    let a = container.get::<Value>(&key("Value")).unwrap();
    let b = container.get::<Value>(&key("Value")).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    container.destroy();
    assert_eq!(cleared.load(Ordering::SeqCst), 1);
    let c = container.get::<Value>(&key("Value")).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
}

#[derive(Default)]
struct Activity {
    value: Option<Arc<Value>>,
    calls: usize,
}

#[test]
fn injection_fills_points_in_order_without_hooks() {
    let registry = Registry::new()
        .add_provider(
            ProviderDefinition::constructor("Value", vec![])
                .scoped(ScopeKind::Singleton)
                .post_construct("start"),
        )
        .add_injection_target(
            InjectionTarget::new("Activity")
                .field("value", TypeRef::named("Value"))
                .method("attach", vec![Parameter::named("value", "Value")]),
        );
    let started = Arc::new(AtomicUsize::new(0));
    let counter = started.clone();

    let container = Container::builder(blueprint(&registry))
        .constructor("Value", |_| Ok(Value(1)))
        .hook("Value", "start", move |_: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .injector("Activity", "value", |activity: &mut Activity, args| {
            activity.value = Some(args.get(0)?);
            Ok(())
        })
        .injector("Activity", "attach", |activity: &mut Activity, args| {
            let value = args.get::<Value>(0)?;
            assert!(activity.value.is_some(), "fields are injected first");
            activity.calls += value.0;
            Ok(())
        })
        .build()
        .unwrap();

    let mut activity = Activity::default();
    container.inject(&key("Activity"), &mut activity).unwrap();
    container.inject(&key("Activity"), &mut activity).unwrap();

    assert_eq!(activity.calls, 2);
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(matches!(
        container.inject(&key("Value"), &mut activity),
        Err(RequireError::NotInjectable(_))
    ));
}

#[test]
fn container_self_reference_reaches_the_container() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("Value", vec![]).scoped(ScopeKind::Singleton))
        .add_provider(ProviderDefinition::constructor(
            "Service",
            vec![Parameter::new("container", TypeRef::unresolved("Container"))],
        ));
    let container = Container::builder(blueprint(&registry))
        .constructor("Value", |_| Ok(Value(3)))
        .constructor("Service", |args| {
            let value = args.container(0)?.get::<Value>(&TypeKey::new("Value"))?;
            Ok(Service {
                name: if value.0 == 3 { "three" } else { "other" },
            })
        })
        .build()
        .unwrap();

    assert_eq!(container.get::<Service>(&key("Service")).unwrap().name, "three");
}

#[test]
fn missing_bindings_are_listed_together() {
    let registry = Registry::new()
        .add_provider(
            ProviderDefinition::constructor("Value", vec![]).scoped(ScopeKind::custom("session")),
        )
        .add_provider(ProviderDefinition::constructor("Other", vec![]).post_construct("start"));

    let err = Container::builder(blueprint(&registry))
        .constructor("Value", |_| Ok(Value(0)))
        .build()
        .unwrap_err();

    assert_eq!(
        err.problems,
        [
            BindingProblem::MissingHook {
                target: key("Other"),
                hook: "start".into()
            },
            BindingProblem::MissingConstructor(key("Other")),
            BindingProblem::UnboundScope("session".into()),
        ]
    );
}
