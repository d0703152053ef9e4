//! Classifies every provider parameter and injection point parameter into a [`Dependency`].
//!
//! Resolution only starts once the whole registry is known, since providers reference each other
//! in any declaration order. It is a pure function of the registry: running it twice yields the
//! same classification.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    config::CompilerOptions,
    diagnostics::{DiagnosticKind, Diagnostics},
    registry::{
        ConstructorSelection, HookDecl, InjectionPoint, InjectionTarget, Parameter, PointKind,
        ProviderDefinition, ProviderIndex, Registry,
    },
    types::{SourceRef, TypeKey, TypeRef},
};

/// How a single parameter is satisfied
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Dependency {
    /// The value of another provider, fetched when the owner is constructed
    Direct(ProviderIndex),
    /// A deferred accessor for another provider, fetched whenever the owner chooses
    Indirect(ProviderIndex),
    /// Supplied by the caller of the owning factory, never cached
    Assisted(TypeRef),
    /// The container itself
    ContainerSelfReference,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParameter {
    pub name: String,
    pub dependency: Dependency,
}

/// A provider with the dependencies of its selected parameter list attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider<'r> {
    pub index: ProviderIndex,
    pub definition: &'r ProviderDefinition,
    pub parameters: Vec<ResolvedParameter>,
}

impl ResolvedProvider<'_> {
    pub fn is_assisted(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| matches!(p.dependency, Dependency::Assisted(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPoint<'r> {
    pub point: &'r InjectionPoint,
    pub arguments: Vec<ResolvedParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget<'r> {
    pub definition: &'r InjectionTarget,
    pub points: Vec<ResolvedPoint<'r>>,
}

/// Output of [`DependencyResolver::resolve`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution<'r> {
    pub providers: Vec<ResolvedProvider<'r>>,
    pub targets: Vec<ResolvedTarget<'r>>,
}

pub struct DependencyResolver<'r> {
    registry: &'r Registry,
    options: &'r CompilerOptions,
    by_target: BTreeMap<&'r TypeKey, Vec<ProviderIndex>>,
    by_factory_name: BTreeMap<String, Vec<ProviderIndex>>,
}

impl<'r> DependencyResolver<'r> {
    pub fn new(registry: &'r Registry, options: &'r CompilerOptions) -> Self {
        let mut by_target: BTreeMap<_, Vec<_>> = BTreeMap::new();
        let mut by_factory_name: BTreeMap<_, Vec<_>> = BTreeMap::new();
        for (i, provider) in registry.providers.iter().enumerate() {
            by_target
                .entry(&provider.target)
                .or_default()
                .push(ProviderIndex(i));
            by_factory_name
                .entry(provider.factory_name(&options.factory_suffix))
                .or_default()
                .push(ProviderIndex(i));
        }

        Self {
            registry,
            options,
            by_target,
            by_factory_name,
        }
    }

    /// Resolves the whole registry, recording every defect found
    pub fn resolve(&self, diagnostics: &mut Diagnostics) -> Resolution<'r> {
        tracing::debug!(
            "Resolving {} providers and {} injection targets",
            self.registry.providers.len(),
            self.registry.injection_targets.len()
        );
        self.report_duplicates(diagnostics);
        self.report_name_clashes(diagnostics);

        let providers = self
            .registry
            .providers
            .iter()
            .enumerate()
            .filter_map(|(i, definition)| {
                self.resolve_provider(ProviderIndex(i), definition, diagnostics)
            })
            .collect();

        let targets = self
            .registry
            .injection_targets
            .iter()
            .map(|target| self.resolve_target(target, diagnostics))
            .collect();

        Resolution { providers, targets }
    }

    /// Each duplicated target type is reported once, whether or not anything depends on it
    fn report_duplicates(&self, diagnostics: &mut Diagnostics) {
        let mut duplicated: Vec<_> = self
            .by_target
            .values()
            .filter(|indices| indices.len() > 1)
            .collect();
        duplicated.sort_by_key(|indices| indices[0]);

        for indices in duplicated {
            let first = &self.registry.providers[indices[0].0];
            let others = indices[1..]
                .iter()
                .map(|i| self.registry.providers[i.0].source.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.record(
                DiagnosticKind::AmbiguousProvider,
                &first.source,
                format!(
                    "'{}' has {} providers, also declared at {}",
                    first.target,
                    indices.len(),
                    others
                ),
            );
        }
    }

    /// Distinct types sharing a simple name would generate the same factory and getter
    fn report_name_clashes(&self, diagnostics: &mut Diagnostics) {
        for (factory_name, indices) in &self.by_factory_name {
            let mut targets: Vec<_> = indices
                .iter()
                .map(|i| &self.registry.providers[i.0])
                .collect();
            targets.sort_by(|a, b| a.target.cmp(&b.target));
            targets.dedup_by(|a, b| a.target == b.target);
            let [first, _, ..] = targets.as_slice() else {
                continue;
            };

            let names = targets
                .iter()
                .map(|p| p.target.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            diagnostics.record(
                DiagnosticKind::AmbiguousProvider,
                &first.source,
                format!("{names} would all generate '{factory_name}', rename one of them"),
            );
        }
    }

    fn resolve_provider(
        &self,
        index: ProviderIndex,
        definition: &'r ProviderDefinition,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedProvider<'r>> {
        check_hooks(definition, &definition.post_construct, diagnostics);
        check_hooks(definition, &definition.pre_destroy, diagnostics);

        let parameters = match definition.parameters() {
            Ok(parameters) => parameters,
            Err(selection) => {
                report_selection(definition, selection, diagnostics);
                return None;
            }
        };

        if parameters.iter().any(|p| p.assisted) && !definition.scope.is_unscoped() {
            diagnostics.record(
                DiagnosticKind::InvalidAssistedScope,
                &definition.source,
                format!(
                    "'{}' takes assisted parameters and can't use the {} scope",
                    definition.target, definition.scope
                ),
            );
        }

        let parameters = parameters
            .iter()
            .filter_map(|parameter| {
                let (owner, source) = (&definition.target, &definition.source);
                self.resolve_parameter(owner, source, parameter, diagnostics)
            })
            .collect();

        Some(ResolvedProvider {
            index,
            definition,
            parameters,
        })
    }

    fn resolve_target(
        &self,
        definition: &'r InjectionTarget,
        diagnostics: &mut Diagnostics,
    ) -> ResolvedTarget<'r> {
        if definition.points.is_empty() {
            diagnostics.record(
                DiagnosticKind::EmptyInjectionTarget,
                &definition.source,
                format!("'{}' has no injection points", definition.target),
            );
        }

        let mut points = Vec::with_capacity(definition.points.len());
        for point in &definition.points {
            if point.kind == PointKind::Field && point.parameters.len() != 1 {
                diagnostics.record(
                    DiagnosticKind::InvalidAnnotationTarget,
                    &definition.source,
                    format!(
                        "Field '{}' of '{}' must take exactly one value, it declares {}",
                        point.name,
                        definition.target,
                        point.parameters.len()
                    ),
                );
                continue;
            }

            let mut arguments = Vec::with_capacity(point.parameters.len());
            for parameter in &point.parameters {
                if parameter.assisted {
                    diagnostics.record(
                        DiagnosticKind::InvalidAnnotationTarget,
                        &definition.source,
                        format!(
                            "Parameter '{}' of injection point '{}' can't be assisted, only provider parameters can",
                            parameter.name, point.name
                        ),
                    );
                    continue;
                }
                if let Some(resolved) = self.resolve_parameter(
                    &definition.target,
                    &definition.source,
                    parameter,
                    diagnostics,
                ) {
                    arguments.push(resolved);
                }
            }
            points.push(ResolvedPoint { point, arguments });
        }

        ResolvedTarget { definition, points }
    }

    /// Classifies one parameter of `owner`
    pub fn resolve_parameter(
        &self,
        owner: &TypeKey,
        source: &SourceRef,
        parameter: &Parameter,
        diagnostics: &mut Diagnostics,
    ) -> Option<ResolvedParameter> {
        let dependency = self.classify(owner, source, parameter, diagnostics)?;
        tracing::trace!(
            "'{}' parameter '{}' resolved as {:?}",
            owner,
            parameter.name,
            dependency
        );

        Some(ResolvedParameter {
            name: parameter.name.clone(),
            dependency,
        })
    }

    fn classify(
        &self,
        owner: &TypeKey,
        source: &SourceRef,
        parameter: &Parameter,
        diagnostics: &mut Diagnostics,
    ) -> Option<Dependency> {
        if let TypeRef::Unresolved(spelling) = &parameter.ty {
            return self.classify_forward_reference(owner, source, parameter, spelling, diagnostics);
        }

        if parameter.assisted {
            return Some(Dependency::Assisted(parameter.ty.clone()));
        }

        let (requested, indirect) = match &parameter.ty {
            TypeRef::Generic { base, arguments }
                if arguments.len() == 1 && self.options.is_provider_wrapper(base) =>
            {
                (&arguments[0], true)
            }
            other => (other, false),
        };

        let candidate = match requested
            .nominal()
            .and_then(|key| self.by_target.get(&key))
            .map(Vec::as_slice)
        {
            Some([single]) => *single,
            // Reported once for the duplicated type
            Some([_, _, ..]) => return None,
            _ => {
                diagnostics.record(
                    DiagnosticKind::UnresolvedDependency,
                    source,
                    format!(
                        "Cannot find a provider for parameter '{}' ({}) of '{}'",
                        parameter.name, parameter.ty, owner
                    ),
                );
                return None;
            }
        };

        if !indirect && self.registry.providers[candidate.0].has_assisted() {
            let wrapper = self
                .options
                .provider_wrappers
                .first()
                .map(|w| w.simple_name())
                .unwrap_or("Provider");
            diagnostics.record(
                DiagnosticKind::InvalidAssistedDependency,
                source,
                format!(
                    "Parameter '{}' of '{}' depends on '{}' directly, but it takes assisted parameters; request {}<{}> or its factory instead",
                    parameter.name, owner, requested, wrapper, requested
                ),
            );
            return None;
        }

        Some(match indirect {
            true => Dependency::Indirect(candidate),
            false => Dependency::Direct(candidate),
        })
    }

    /// A type the front end couldn't resolve is either a not yet generated factory, or the
    /// not yet generated container
    fn classify_forward_reference(
        &self,
        owner: &TypeKey,
        source: &SourceRef,
        parameter: &Parameter,
        spelling: &str,
        diagnostics: &mut Diagnostics,
    ) -> Option<Dependency> {
        match self.by_factory_name.get(spelling).map(Vec::as_slice) {
            Some([single]) => return Some(Dependency::Indirect(*single)),
            // Reported once, as a duplicate or as a name clash
            Some([_, _, ..]) => return None,
            _ => {}
        }

        let container = &self.options.container_type;
        if spelling == container.as_str() || spelling == container.simple_name() {
            return Some(Dependency::ContainerSelfReference);
        }

        diagnostics.record(
            DiagnosticKind::UnresolvedDependency,
            source,
            format!(
                "Unable to resolve type '{}' for parameter '{}' of '{}'",
                spelling, parameter.name, owner
            ),
        );
        None
    }
}

fn check_hooks(definition: &ProviderDefinition, hooks: &[HookDecl], diagnostics: &mut Diagnostics) {
    for hook in hooks.iter().filter(|hook| !hook.parameters.is_empty()) {
        diagnostics.record(
            DiagnosticKind::InvalidLifecycleSignature,
            &definition.source,
            format!(
                "Lifecycle hook '{}' of '{}' must not take parameters, it declares {}",
                hook.name,
                definition.target,
                hook.parameters.len()
            ),
        );
    }
}

fn report_selection(
    definition: &ProviderDefinition,
    selection: ConstructorSelection,
    diagnostics: &mut Diagnostics,
) {
    let (kind, message) = match selection {
        ConstructorSelection::NoConstructor => (
            DiagnosticKind::MissingConstructor,
            format!("'{}' has no constructor", definition.target),
        ),
        ConstructorSelection::Ambiguous(count) => (
            DiagnosticKind::MissingConstructor,
            format!(
                "'{}' has {count} constructors, mark one as primary or inject",
                definition.target
            ),
        ),
        ConstructorSelection::Unsupported(kind) => (
            DiagnosticKind::InvalidAnnotationTarget,
            format!(
                "'{}' is a {kind}, only classes and functions can provide values",
                definition.target
            ),
        ),
    };
    diagnostics.record(kind, &definition.source, message);
}
