use std::collections::HashMap;

use crate::{
    args::Args,
    blueprint::Blueprint,
    container::{Container, FactorySlot, InjectorSlot},
    errors::{BindingProblem, InstantiateError},
    factories::{ConstructorBinding, HookBinding, InjectorBinding},
    scope::{Scope, ScopeKind, SingletonScope, ThreadScope, UnscopedScope},
    types::{DynError, Injectable, TypeKey},
};

/// Binds behaviour to a blueprint and turns it into a [`Container`]
///
/// The blueprint only describes the wiring, every factory still needs a constructor, every named
/// lifecycle hook and injection point a closure, and every custom scope an implementation.
/// Problems are collected and reported together by [`ContainerBuilder::build`].
pub struct ContainerBuilder {
    blueprint: Blueprint,
    constructors: HashMap<TypeKey, ConstructorBinding>,
    hooks: HashMap<(TypeKey, String), HookBinding>,
    injectors: HashMap<(TypeKey, String), InjectorBinding>,
    custom_scopes: HashMap<String, Box<dyn Scope>>,
    problems: Vec<BindingProblem>,
}

impl ContainerBuilder {
    pub fn new(blueprint: Blueprint) -> Self {
        ContainerBuilder {
            blueprint,
            constructors: HashMap::new(),
            hooks: HashMap::new(),
            injectors: HashMap::new(),
            custom_scopes: HashMap::new(),
            problems: Vec::new(),
        }
    }
}

impl ContainerBuilder {
    pub fn constructor<T: Injectable>(
        mut self,
        target: impl Into<TypeKey>,
        construct: impl Fn(&Args<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    ) -> Self {
        let target = target.into();
        if self.constructors.contains_key(&target) {
            self.problems
                .push(BindingProblem::Duplicate(format!("constructor of '{target}'")));
        }
        self.constructors
            .insert(target, ConstructorBinding::new(construct));
        self
    }

    /// Binds a lifecycle hook by name, used for post-construct and pre-destroy hooks alike
    pub fn hook<T: Injectable>(
        mut self,
        target: impl Into<TypeKey>,
        name: impl Into<String>,
        hook: impl Fn(&T) + Send + Sync + 'static,
    ) -> Self {
        let key = (target.into(), name.into());
        if self.hooks.contains_key(&key) {
            self.problems.push(BindingProblem::Duplicate(format!(
                "hook '{}' of '{}'",
                key.1, key.0
            )));
        }
        self.hooks.insert(key, HookBinding::new(hook));
        self
    }

    pub fn injector<T: 'static>(
        mut self,
        target: impl Into<TypeKey>,
        point: impl Into<String>,
        inject: impl Fn(&mut T, &Args<'_>) -> Result<(), DynError> + Send + Sync + 'static,
    ) -> Self {
        let key = (target.into(), point.into());
        if self.injectors.contains_key(&key) {
            self.problems.push(BindingProblem::Duplicate(format!(
                "injection point '{}' of '{}'",
                key.1, key.0
            )));
        }
        self.injectors.insert(key, InjectorBinding::new(inject));
        self
    }

    /// Supplies the implementation for a custom scope kind
    pub fn custom_scope(mut self, name: impl Into<String>, scope: impl Scope + 'static) -> Self {
        let name = name.into();
        if self.custom_scopes.contains_key(&name) {
            self.problems
                .push(BindingProblem::Duplicate(format!("scope '{name}'")));
        }
        self.custom_scopes.insert(name, Box::new(scope));
        self
    }

    pub fn build(self) -> Result<Container, InstantiateError> {
        let ContainerBuilder {
            blueprint,
            mut constructors,
            mut hooks,
            mut injectors,
            mut custom_scopes,
            mut problems,
        } = self;

        tracing::debug!(
            "Instantiating container with {} factories and {} injectors",
            blueprint.factories.len(),
            blueprint.injectors.len()
        );

        // Hooks may be shared between both lists, so they are only removed at the end
        let bound_hook = |target: &TypeKey, name: &str, problems: &mut Vec<BindingProblem>| {
            let binding = hooks.get(&(target.clone(), name.to_string())).cloned();
            if binding.is_none() {
                problems.push(BindingProblem::MissingHook {
                    target: target.clone(),
                    hook: name.to_string(),
                });
            }
            binding
        };

        let mut factories = Vec::with_capacity(blueprint.factories.len());
        let mut used_hooks = Vec::new();
        for factory in &blueprint.factories {
            let post_construct: Vec<_> = factory
                .post_construct
                .iter()
                .filter_map(|name| bound_hook(&factory.target, name.as_str(), &mut problems))
                .collect();
            let pre_destroy: Vec<_> = factory
                .pre_destroy
                .iter()
                .filter_map(|name| {
                    bound_hook(&factory.target, name.as_str(), &mut problems)
                        .map(|hook| (name.clone(), hook))
                })
                .collect();
            used_hooks.extend(
                factory
                    .post_construct
                    .iter()
                    .chain(&factory.pre_destroy)
                    .map(|name| (factory.target.clone(), name.clone())),
            );

            let Some(constructor) = constructors.remove(&factory.target) else {
                problems.push(BindingProblem::MissingConstructor(factory.target.clone()));
                continue;
            };
            factories.push(FactorySlot {
                blueprint: factory.clone(),
                constructor,
                post_construct,
                pre_destroy,
            });
        }
        for key in &used_hooks {
            hooks.remove(key);
        }

        let mut injector_slots = Vec::with_capacity(blueprint.injectors.len());
        for injector in &blueprint.injectors {
            let points: Vec<_> = injector
                .points
                .iter()
                .filter_map(|point| {
                    let binding = injectors.remove(&(injector.target.clone(), point.name.clone()));
                    if binding.is_none() {
                        problems.push(BindingProblem::MissingInjector {
                            target: injector.target.clone(),
                            point: point.name.clone(),
                        });
                    }
                    binding
                })
                .collect();
            injector_slots.push(InjectorSlot {
                blueprint: injector.clone(),
                points,
            });
        }

        let mut scopes: Vec<Box<dyn Scope>> = Vec::with_capacity(blueprint.scopes.len());
        for (_, kind) in blueprint.scopes.iter() {
            let scope: Box<dyn Scope> = match kind {
                ScopeKind::Unscoped => Box::new(UnscopedScope),
                ScopeKind::Singleton => Box::new(SingletonScope::new()),
                ScopeKind::Thread => Box::new(ThreadScope::new()),
                ScopeKind::Custom(name) => match custom_scopes.remove(name) {
                    Some(scope) => scope,
                    None => {
                        problems.push(BindingProblem::UnboundScope(name.clone()));
                        continue;
                    }
                },
            };
            scopes.push(scope);
        }

        // Whatever is left was bound to something the blueprint doesn't describe
        problems.extend(
            constructors
                .into_keys()
                .map(|target| BindingProblem::UnknownBinding(format!("constructor of '{target}'"))),
        );
        problems.extend(hooks.into_keys().map(|(target, hook)| {
            BindingProblem::UnknownBinding(format!("hook '{hook}' of '{target}'"))
        }));
        problems.extend(injectors.into_keys().map(|(target, point)| {
            BindingProblem::UnknownBinding(format!("injection point '{point}' of '{target}'"))
        }));
        problems.extend(
            custom_scopes
                .into_keys()
                .map(|name| BindingProblem::UnknownBinding(format!("scope '{name}'"))),
        );

        if !problems.is_empty() {
            for problem in &problems {
                tracing::error!("Binding problem: {}", problem);
            }
            return Err(InstantiateError { problems });
        }

        Ok(Container::new(blueprint, factories, injector_slots, scopes))
    }
}
