//! Build-time dependency injection.
//!
//! A front end describes the injectable types of a program as a [`Registry`]. [`compile`] resolves
//! every parameter against it and either produces a [`Blueprint`] of the container or the full
//! list of [`Diagnostics`] explaining why it can't. The blueprint is plain data; a
//! [`ContainerBuilder`] binds constructors, hooks and scopes to it and instantiates a
//! [`Container`] which hands out the described values at runtime.
//!
//! ```
//! use graft_di::{
//!     compile, CompilerOptions, Container, Parameter, ProviderDefinition, Registry, ScopeKind,
//!     TypeKey,
//! };
//!
//! struct Config(&'static str);
//! struct Service(std::sync::Arc<Config>);
//!
//! let registry = Registry::new()
//!     .add_provider(
//!         ProviderDefinition::constructor("Config", vec![]).scoped(ScopeKind::Singleton),
//!     )
//!     .add_provider(ProviderDefinition::constructor(
//!         "Service",
//!         vec![Parameter::named("config", "Config")],
//!     ));
//! let blueprint = compile(&registry, &CompilerOptions::default()).unwrap();
//!
//! let container = Container::builder(blueprint)
//!     .constructor("Config", |_| Ok(Config("prod")))
//!     .constructor("Service", |args| Ok(Service(args.get::<Config>(0)?)))
//!     .build()
//!     .unwrap();
//! let service = container.get::<Service>(&TypeKey::new("Service")).unwrap();
//! assert_eq!(service.0 .0, "prod");
//! ```

mod args;
mod blueprint;
mod builder;
mod config;
mod container;
mod dependency_graph;
mod diagnostics;
mod errors;
mod factories;
mod provider;
mod registry;
mod resolver;
pub mod scope;
mod types;

pub use args::{Args, Assisted};
pub use blueprint::{
    Argument, Blueprint, BlueprintBuilder, FactoryBlueprint, FactoryId, InjectionPointBlueprint,
    InjectorBlueprint, Wire,
};
pub use builder::ContainerBuilder;
pub use config::CompilerOptions;
pub use container::Container;
pub use dependency_graph::DependencyGraph;
pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics, Severity};
pub use errors::{BindingProblem, InstantiateError, RequireError};
pub use provider::Provider;
pub use registry::{
    ConstructorDecl, ConstructorSelection, HookDecl, InjectionPoint, InjectionTarget, Origin,
    Parameter, PointKind, ProviderDefinition, ProviderIndex, Registry,
};
pub use resolver::{
    Dependency, DependencyResolver, Resolution, ResolvedParameter, ResolvedPoint,
    ResolvedProvider, ResolvedTarget,
};
pub use scope::{Scope, ScopeId, ScopeKind, ScopeRegistry};
pub use types::{DynError, Injectable, Instance, SourceRef, TypeKey, TypeRef};

/// Resolves the registry and builds the blueprint of its container
///
/// Every defect is reported, not just the first. Warnings don't prevent the blueprint and are
/// attached to it.
pub fn compile(registry: &Registry, options: &CompilerOptions) -> Result<Blueprint, Diagnostics> {
    tracing::debug!(
        "Compiling {} providers and {} injection targets",
        registry.providers.len(),
        registry.injection_targets.len()
    );

    let mut diagnostics = Diagnostics::new();
    let resolution = DependencyResolver::new(registry, options).resolve(&mut diagnostics);
    if options.reject_direct_cycles {
        DependencyGraph::new(&resolution).check(&mut diagnostics);
    }

    BlueprintBuilder::new(options).build(&resolution, diagnostics)
}
