//! The fully resolved, immutable description of a container.
//!
//! Factories are wired in two phases. First every resolved provider is allocated a stable
//! [`FactoryId`] in a single arena, with its dependencies still pointing at registry entries.
//! Then each dependency is linked to the factory id of the provider it references. Since every
//! slot exists before the first link is made, providers may reference each other in any order and
//! cycles broken by an indirect edge wire like any other dependency.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    config::CompilerOptions,
    diagnostics::{Diagnostic, DiagnosticKind, Diagnostics},
    registry::{PointKind, ProviderIndex},
    resolver::{Dependency, ResolvedParameter, ResolvedProvider, ResolvedTarget, Resolution},
    scope::{ScopeId, ScopeRegistry},
    types::{SourceRef, TypeKey, TypeRef},
};

/// Slot of a factory in the container arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FactoryId(pub usize);

/// A linked dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Wire {
    Direct(FactoryId),
    Indirect(FactoryId),
    /// Position among the values the caller supplies
    Assisted { position: usize, ty: TypeRef },
    Container,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Argument {
    pub name: String,
    pub wire: Wire,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactoryBlueprint {
    pub id: FactoryId,
    pub target: TypeKey,
    pub factory_name: String,
    /// Accessor name, assisted factories have none since they need arguments
    pub getter: Option<String>,
    pub scope: ScopeId,
    /// Number of caller supplied values
    pub assisted: usize,
    pub arguments: Vec<Argument>,
    pub post_construct: Vec<String>,
    pub pre_destroy: Vec<String>,
    pub source: SourceRef,
}

impl FactoryBlueprint {
    pub fn is_assisted(&self) -> bool {
        self.assisted > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionPointBlueprint {
    pub name: String,
    pub kind: PointKind,
    pub arguments: Vec<Argument>,
}

/// One injection function, applied to instances the container did not build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectorBlueprint {
    pub target: TypeKey,
    pub function_name: String,
    pub points: Vec<InjectionPointBlueprint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blueprint {
    pub container_type: TypeKey,
    pub scopes: ScopeRegistry,
    pub factories: Vec<FactoryBlueprint>,
    pub injectors: Vec<InjectorBlueprint>,
    /// Non-fatal diagnostics of the run that produced this blueprint
    pub warnings: Vec<Diagnostic>,
}

impl Blueprint {
    pub fn factory(&self, target: &TypeKey) -> Option<&FactoryBlueprint> {
        self.factories.iter().find(|f| &f.target == target)
    }

    pub fn injector(&self, target: &TypeKey) -> Option<&InjectorBlueprint> {
        self.injectors.iter().find(|i| &i.target == target)
    }
}

/// A factory allocated in the first phase, its dependencies not linked yet
struct AllocatedFactory<'a, 'r> {
    id: FactoryId,
    scope: ScopeId,
    provider: &'a ResolvedProvider<'r>,
}

pub struct BlueprintBuilder<'o> {
    options: &'o CompilerOptions,
}

impl<'o> BlueprintBuilder<'o> {
    pub fn new(options: &'o CompilerOptions) -> Self {
        Self { options }
    }

    /// Builds the blueprint, or returns the diagnostics if any of them is an error.
    ///
    /// No partial blueprint is ever produced.
    pub fn build(
        &self,
        resolution: &Resolution<'_>,
        mut diagnostics: Diagnostics,
    ) -> Result<Blueprint, Diagnostics> {
        if diagnostics.has_errors() {
            tracing::debug!("Skipping blueprint, {} diagnostics recorded", diagnostics.len());
            return Err(diagnostics);
        }

        // Phase one: a slot for every factory
        let mut scopes = ScopeRegistry::new();
        let mut slots = BTreeMap::new();
        let mut allocated = Vec::with_capacity(resolution.providers.len());
        for provider in &resolution.providers {
            let id = FactoryId(allocated.len());
            slots.insert(provider.index, id);
            allocated.push(AllocatedFactory {
                id,
                scope: scopes.intern(&provider.definition.scope),
                provider,
            });
        }
        tracing::debug!(
            "Allocated {} factories over {} scopes",
            allocated.len(),
            scopes.len()
        );

        // Phase two: link every dependency to its sibling's slot
        let factories = allocated
            .into_iter()
            .map(|factory| self.link_factory(factory, &slots, &mut diagnostics))
            .collect();
        let injectors = resolution
            .targets
            .iter()
            .map(|target| self.link_injector(target, &slots, &mut diagnostics))
            .collect();

        if diagnostics.has_errors() {
            return Err(diagnostics);
        }

        Ok(Blueprint {
            container_type: self.options.container_type.clone(),
            scopes,
            factories,
            injectors,
            warnings: diagnostics.into_vec(),
        })
    }

    fn link_factory(
        &self,
        factory: AllocatedFactory<'_, '_>,
        slots: &BTreeMap<ProviderIndex, FactoryId>,
        diagnostics: &mut Diagnostics,
    ) -> FactoryBlueprint {
        let definition = factory.provider.definition;
        let arguments = link_arguments(
            &factory.provider.parameters,
            slots,
            &definition.source,
            diagnostics,
        );
        let assisted = arguments
            .iter()
            .filter(|a| matches!(a.wire, Wire::Assisted { .. }))
            .count();

        if assisted > 0 && !definition.scope.is_unscoped() {
            diagnostics.record(
                DiagnosticKind::InvalidAssistedScope,
                &definition.source,
                format!(
                    "'{}' takes assisted parameters and can't use the {} scope",
                    definition.target, definition.scope
                ),
            );
        }

        FactoryBlueprint {
            id: factory.id,
            target: definition.target.clone(),
            factory_name: definition.factory_name(&self.options.factory_suffix),
            getter: (assisted == 0).then(|| definition.getter_name()),
            scope: factory.scope,
            assisted,
            arguments,
            post_construct: definition.post_construct.iter().map(|h| h.name.clone()).collect(),
            pre_destroy: definition.pre_destroy.iter().map(|h| h.name.clone()).collect(),
            source: definition.source.clone(),
        }
    }

    fn link_injector(
        &self,
        target: &ResolvedTarget<'_>,
        slots: &BTreeMap<ProviderIndex, FactoryId>,
        diagnostics: &mut Diagnostics,
    ) -> InjectorBlueprint {
        let definition = target.definition;
        InjectorBlueprint {
            target: definition.target.clone(),
            function_name: format!("inject{}", definition.target.simple_name()),
            points: target
                .points
                .iter()
                .map(|resolved| InjectionPointBlueprint {
                    name: resolved.point.name.clone(),
                    kind: resolved.point.kind,
                    arguments: link_arguments(
                        &resolved.arguments,
                        slots,
                        &definition.source,
                        diagnostics,
                    ),
                })
                .collect(),
        }
    }
}

fn link_arguments(
    parameters: &[ResolvedParameter],
    slots: &BTreeMap<ProviderIndex, FactoryId>,
    source: &SourceRef,
    diagnostics: &mut Diagnostics,
) -> Vec<Argument> {
    let mut position = 0;
    let mut arguments = Vec::with_capacity(parameters.len());
    for parameter in parameters {
        let slot = |index: &ProviderIndex, diagnostics: &mut Diagnostics| {
            let slot = slots.get(index).copied();
            if slot.is_none() {
                diagnostics.record(
                    DiagnosticKind::UnresolvedDependency,
                    source,
                    format!("No factory was allocated for parameter '{}'", parameter.name),
                );
            }
            slot
        };

        let wire = match &parameter.dependency {
            Dependency::Direct(index) => slot(index, diagnostics).map(Wire::Direct),
            Dependency::Indirect(index) => slot(index, diagnostics).map(Wire::Indirect),
            Dependency::Assisted(ty) => {
                position += 1;
                Some(Wire::Assisted {
                    position: position - 1,
                    ty: ty.clone(),
                })
            }
            Dependency::ContainerSelfReference => Some(Wire::Container),
        };

        if let Some(wire) = wire {
            arguments.push(Argument {
                name: parameter.name.clone(),
                wire,
            });
        }
    }
    arguments
}
