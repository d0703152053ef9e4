use graft_di::{
    compile, CompilerOptions, ConstructorDecl, Dependency, DependencyResolver, DiagnosticKind,
    Diagnostics, Parameter, ProviderDefinition, Registry, ScopeKind, Severity, SourceRef, TypeRef,
    Wire,
};

fn app_registry() -> Registry {
    Registry::new()
        .add_provider(
            ProviderDefinition::function("app.Config", "config", vec![])
                .scoped(ScopeKind::Singleton),
        )
        .add_provider(
            ProviderDefinition::constructor(
                "app.Service",
                vec![
                    Parameter::new("container", TypeRef::unresolved("Container")),
                    Parameter::named("config", "app.Config"),
                ],
            )
            .scoped(ScopeKind::Singleton),
        )
        .add_provider(ProviderDefinition::constructor(
            "app.AssistedTask",
            vec![
                Parameter::named("service", "app.Service"),
                Parameter::assisted("name", "String"),
            ],
        ))
        .add_provider(ProviderDefinition::constructor(
            "app.App",
            vec![
                Parameter::new("tasks", TypeRef::unresolved("AssistedTaskFactory")),
                Parameter::new(
                    "service",
                    TypeRef::generic("Provider", vec![TypeRef::named("app.Service")]),
                ),
            ],
        ))
}

#[test]
fn resolution_is_idempotent() {
    let registry = app_registry();
    let options = CompilerOptions::default();

    let mut first_diagnostics = Diagnostics::new();
    let first = DependencyResolver::new(&registry, &options).resolve(&mut first_diagnostics);
    let mut second_diagnostics = Diagnostics::new();
    let second = DependencyResolver::new(&registry, &options).resolve(&mut second_diagnostics);

    assert!(first_diagnostics.is_empty(), "{first_diagnostics}");
    assert_eq!(first, second);
    assert_eq!(first_diagnostics, second_diagnostics);
}

#[test]
fn classifies_every_kind_of_dependency() {
    let registry = app_registry();
    let options = CompilerOptions::default();
    let mut diagnostics = Diagnostics::new();
    let resolution = DependencyResolver::new(&registry, &options).resolve(&mut diagnostics);

    let dependencies = |i: usize| {
        resolution.providers[i]
            .parameters
            .iter()
            .map(|p| p.dependency.clone())
            .collect::<Vec<_>>()
    };
    let index = |i: usize| resolution.providers[i].index;

    assert_eq!(
        dependencies(1),
        [Dependency::ContainerSelfReference, Dependency::Direct(index(0))]
    );
    assert_eq!(
        dependencies(2),
        [Dependency::Direct(index(1)), Dependency::Assisted(TypeRef::named("String"))]
    );
    assert_eq!(
        dependencies(3),
        [Dependency::Indirect(index(2)), Dependency::Indirect(index(1))]
    );
}

#[test]
fn duplicate_provider_is_one_ambiguity_and_no_blueprint() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("app.Db", vec![]))
        .add_provider(ProviderDefinition::function("app.Db", "custom_db", vec![]))
        .add_provider(ProviderDefinition::constructor(
            "app.A",
            vec![Parameter::named("db", "app.Db")],
        ))
        .add_provider(ProviderDefinition::constructor(
            "app.B",
            vec![Parameter::named("db", "app.Db")],
        ));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1, "{diagnostics}");
    assert_eq!(diagnostics.count(DiagnosticKind::AmbiguousProvider), 1);
}

#[test]
fn factory_of_duplicate_provider_is_not_reported_again() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("app.Db", vec![]))
        .add_provider(ProviderDefinition::function("app.Db", "custom_db", vec![]))
        .add_provider(ProviderDefinition::constructor(
            "app.A",
            vec![Parameter::new("dbs", TypeRef::unresolved("DbFactory"))],
        ))
        .add_provider(ProviderDefinition::constructor(
            "app.B",
            vec![Parameter::new(
                "db",
                TypeRef::generic("Provider", vec![TypeRef::named("app.Db")]),
            )],
        ));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1, "{diagnostics}");
    assert_eq!(diagnostics.count(DiagnosticKind::AmbiguousProvider), 1);
}

#[test]
fn same_simple_name_in_two_packages_is_rejected() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("a.Task", vec![]))
        .add_provider(ProviderDefinition::constructor("b.Task", vec![]))
        .add_provider(ProviderDefinition::constructor(
            "app.Runner",
            vec![Parameter::new("tasks", TypeRef::unresolved("TaskFactory"))],
        ));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1, "{diagnostics}");
    let clash = diagnostics.iter().next().unwrap();
    assert_eq!(clash.kind, DiagnosticKind::AmbiguousProvider);
    assert!(clash.message.contains("a.Task, b.Task"), "{clash}");
    assert!(clash.message.contains("TaskFactory"), "{clash}");
}

#[test]
fn missing_provider_is_one_unresolved_dependency_and_no_blueprint() {
    let registry = Registry::new().add_provider(ProviderDefinition::constructor(
        "app.A",
        vec![Parameter::named("db", "app.Db")],
    ));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.len(), 1, "{diagnostics}");
    assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedDependency), 1);
}

#[test]
fn assisted_singleton_is_rejected() {
    let registry = Registry::new().add_provider(
        ProviderDefinition::constructor("app.Task", vec![Parameter::assisted("name", "String")])
            .scoped(ScopeKind::Singleton),
    );

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.count(DiagnosticKind::InvalidAssistedScope), 1, "{diagnostics}");
}

#[test]
fn every_defect_is_reported_in_one_run() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor(
            "app.A",
            vec![Parameter::named("x", "app.Missing")],
        ))
        .add_provider(
            ProviderDefinition::constructor("app.Task", vec![Parameter::assisted("name", "String")])
                .scoped(ScopeKind::Thread),
        )
        .add_provider(ProviderDefinition::constructor(
            "app.B",
            vec![Parameter::named("task", "app.Task")],
        ))
        .add_provider(ProviderDefinition::class("app.C", vec![]))
        .add_provider(
            ProviderDefinition::constructor("app.D", vec![])
                .post_construct(graft_di::HookDecl {
                    name: "start".into(),
                    parameters: vec![Parameter::named("x", "app.A")],
                }),
        )
        .add_provider(ProviderDefinition::class(
            "app.E",
            vec![
                ConstructorDecl::secondary(vec![]).inject(),
                ConstructorDecl::secondary(vec![Parameter::named("a", "app.A")]).inject(),
            ],
        ));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    for kind in [
        DiagnosticKind::UnresolvedDependency,
        DiagnosticKind::InvalidAssistedScope,
        DiagnosticKind::InvalidAssistedDependency,
        DiagnosticKind::MissingConstructor,
        DiagnosticKind::InvalidLifecycleSignature,
    ] {
        assert!(diagnostics.count(kind) >= 1, "{kind:?} missing from {diagnostics}");
    }
    assert!(diagnostics.iter().all(|d| d.severity == Severity::Error));
}

#[test]
fn diagnostics_point_at_the_declaration() {
    let registry = Registry::new().add_provider(
        ProviderDefinition::class("app.C", vec![]).source(SourceRef::symbol("app.C").at("c.kt", 3)),
    );

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    let missing = diagnostics.iter().next().unwrap();
    assert_eq!(missing.kind, DiagnosticKind::MissingConstructor);
    assert_eq!(missing.source.line, Some(3));
    assert!(missing.to_string().contains("app.C (c.kt:3)"), "{missing}");
}

#[test]
fn forward_reference_links_to_assisted_factory() {
    let blueprint = compile(&app_registry(), &CompilerOptions::default()).unwrap();
    let task = blueprint.factory(&"app.AssistedTask".into()).unwrap();
    let app = blueprint.factory(&"app.App".into()).unwrap();

    assert_eq!(task.factory_name, "AssistedTaskFactory");
    assert_eq!(app.arguments[0].wire, Wire::Indirect(task.id));
    assert!(blueprint.warnings.is_empty());
}

#[test]
fn renamed_container_is_still_recognized() {
    let registry = Registry::new().add_provider(ProviderDefinition::constructor(
        "app.Service",
        vec![Parameter::new("injector", TypeRef::unresolved("Injector"))],
    ));
    let options = CompilerOptions::default().with_container_type("app.Injector");

    let blueprint = compile(&registry, &options).unwrap();
    assert_eq!(blueprint.factories[0].arguments[0].wire, Wire::Container);

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedDependency), 1);
}

#[test]
fn custom_wrapper_and_factory_suffix_are_deferred() {
    let registry = Registry::new()
        .add_provider(ProviderDefinition::constructor("app.Task", vec![]))
        .add_provider(ProviderDefinition::constructor(
            "app.Runner",
            vec![
                Parameter::new("lazy", TypeRef::generic("Lazy", vec![TypeRef::named("app.Task")])),
                Parameter::new("tasks", TypeRef::unresolved("TaskBuilder")),
            ],
        ));
    let options = CompilerOptions::default()
        .with_provider_wrapper("Lazy")
        .with_factory_suffix("Builder");

    let blueprint = compile(&registry, &options).unwrap();
    let task = blueprint.factory(&"app.Task".into()).unwrap();
    let runner = blueprint.factory(&"app.Runner".into()).unwrap();
    assert_eq!(task.factory_name, "TaskBuilder");
    assert_eq!(runner.arguments[0].wire, Wire::Indirect(task.id));
    assert_eq!(runner.arguments[1].wire, Wire::Indirect(task.id));

    let diagnostics = compile(&registry, &CompilerOptions::default()).unwrap_err();
    assert_eq!(diagnostics.count(DiagnosticKind::UnresolvedDependency), 2, "{diagnostics}");
}

#[test]
fn json_registry_compiles() {
    let json = r#"{
        "providers": [
            {
                "target": "app.Config",
                "origin": { "kind": "function", "name": "config", "parameters": [] },
                "scope": "singleton"
            },
            {
                "target": "app.Service",
                "origin": { "kind": "class", "constructors": [{ "primary": true, "parameters": [
                    { "name": "config", "type": { "named": "app.Config" } }
                ] }] },
                "scope": { "custom": "request" },
                "post_construct": [{ "name": "start" }]
            }
        ]
    }"#;

    let registry = Registry::from_json(json).unwrap();
    let blueprint = compile(&registry, &CompilerOptions::default()).unwrap();
    assert_eq!(blueprint.factories.len(), 2);
    assert_eq!(blueprint.factories[1].post_construct, ["start"]);
    assert_eq!(
        blueprint.scopes.kind(blueprint.factories[1].scope),
        Some(&ScopeKind::custom("request"))
    );
    assert!(serde_json::to_string(&blueprint).is_ok());
}
