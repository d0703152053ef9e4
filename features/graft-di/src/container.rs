use std::{
    any::{type_name, Any},
    cell::RefCell,
    collections::HashMap,
    fmt::Debug,
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;

use crate::{
    args::{Arg, Args, Assisted},
    blueprint::{Argument, Blueprint, FactoryBlueprint, FactoryId, InjectorBlueprint, Wire},
    builder::ContainerBuilder,
    errors::RequireError,
    factories::{ConstructorBinding, HookBinding, InjectorBinding},
    provider::Provider,
    scope::Scope,
    types::{Injectable, Instance, TypeKey},
};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(0);

thread_local! {
    /// Factories currently under construction on this thread, outermost first
    static CONSTRUCTING: RefCell<Vec<(u64, FactoryId, TypeKey)>> =
        const { RefCell::new(Vec::new()) };
}

/// Runtime form of a blueprint, handing out the values it describes
///
/// Cheap to clone, all clones share the same scopes and factories.
#[derive(Clone)]
pub struct Container(pub(crate) Arc<ContainerInner>);

pub(crate) struct ContainerInner {
    id: u64,
    blueprint: Blueprint,
    factories: Vec<FactorySlot>,
    by_target: HashMap<TypeKey, FactoryId>,
    injectors: HashMap<TypeKey, InjectorSlot>,
    scopes: Vec<Box<dyn Scope>>,
    destroy_hooks: Mutex<Vec<DestroyCallback>>,
}

pub(crate) struct FactorySlot {
    pub blueprint: FactoryBlueprint,
    pub constructor: ConstructorBinding,
    pub post_construct: Vec<HookBinding>,
    pub pre_destroy: Vec<(String, HookBinding)>,
}

pub(crate) struct InjectorSlot {
    pub blueprint: InjectorBlueprint,
    /// One binding per injection point, in declaration order
    pub points: Vec<InjectorBinding>,
}

/// A pre-destroy hook bound to the value it was registered for
struct DestroyCallback {
    target: TypeKey,
    hook: String,
    binding: HookBinding,
    instance: Instance,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_struct("Container");
        for slot in &self.0.factories {
            let scope = self
                .0
                .blueprint
                .scopes
                .kind(slot.blueprint.scope)
                .map(ToString::to_string)
                .unwrap_or_default();
            map.field(slot.blueprint.target.as_str(), &scope);
        }
        map.finish()
    }
}

impl Container {
    /// Starts binding behaviour to a blueprint
    pub fn builder(blueprint: Blueprint) -> ContainerBuilder {
        ContainerBuilder::new(blueprint)
    }

    pub(crate) fn new(
        blueprint: Blueprint,
        factories: Vec<FactorySlot>,
        injectors: Vec<InjectorSlot>,
        scopes: Vec<Box<dyn Scope>>,
    ) -> Self {
        let by_target = factories
            .iter()
            .map(|slot| (slot.blueprint.target.clone(), slot.blueprint.id))
            .collect();
        let injectors = injectors
            .into_iter()
            .map(|slot| (slot.blueprint.target.clone(), slot))
            .collect();

        Self(Arc::new(ContainerInner {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            blueprint,
            factories,
            by_target,
            injectors,
            scopes,
            destroy_hooks: Mutex::new(Vec::new()),
        }))
    }

    pub fn blueprint(&self) -> &Blueprint {
        &self.0.blueprint
    }

    /// Gets the value of the factory for `target`, constructing it if its scope requires
    pub fn get<T: Injectable>(&self, target: &TypeKey) -> Result<Arc<T>, RequireError> {
        self.value_of(self.factory_id(target)?, None)
    }

    /// Like [`Container::get`], keyed by the Rust type name of `T`
    pub fn require<T: Injectable>(&self) -> Result<Arc<T>, RequireError> {
        self.get(&TypeKey::of::<T>())
    }

    /// Builds a fresh value of an assisted factory
    pub fn get_with<T: Injectable>(
        &self,
        target: &TypeKey,
        assisted: Assisted,
    ) -> Result<Arc<T>, RequireError> {
        self.value_of(self.factory_id(target)?, Some(&assisted))
    }

    /// A deferred handle to the factory for `target`
    pub fn provider<T: Injectable>(&self, target: &TypeKey) -> Result<Provider<T>, RequireError> {
        Ok(Provider::new(self, self.factory_id(target)?))
    }

    /// Runs every injection point declared for `target` on an externally constructed value.
    ///
    /// Lifecycle hooks are not run, and the value may be injected any number of times.
    pub fn inject<T: 'static>(&self, target: &TypeKey, value: &mut T) -> Result<(), RequireError> {
        let injector = self
            .0
            .injectors
            .get(target)
            .ok_or_else(|| RequireError::NotInjectable(target.clone()))?;

        for (point, binding) in injector.blueprint.points.iter().zip(&injector.points) {
            let values = self.wire(&injector.blueprint.target, &point.arguments, None)?;
            let args = Args::new(self, &injector.blueprint.target, values);
            binding
                .inject(&mut *value as &mut dyn Any, &args)
                .map_err(|error| RequireError::InjectionFailed {
                    target: target.clone(),
                    point: point.name.clone(),
                    error: Arc::new(error),
                })?;
        }
        tracing::debug!("Injected {} points into {}", injector.points.len(), target);
        Ok(())
    }

    /// Runs the registered pre-destroy hooks in registration order, then clears every scope.
    ///
    /// The container stays usable, scoped values are constructed again on their next access.
    pub fn destroy(&self) {
        let callbacks = mem::take(&mut *self.0.destroy_hooks.lock());
        tracing::info!("Destroying container, running {} hooks", callbacks.len());

        for callback in callbacks {
            if let Err(error) = callback.binding.call(&callback.instance) {
                tracing::error!(
                    "Pre-destroy hook '{}' of {} failed: {}",
                    callback.hook,
                    callback.target,
                    error
                );
            }
        }
        for scope in &self.0.scopes {
            scope.clear();
        }
    }

    pub(crate) fn slot(&self, id: FactoryId) -> Result<&FactorySlot, RequireError> {
        self.0
            .factories
            .get(id.0)
            .ok_or_else(|| RequireError::TypeMissing(TypeKey::new(format!("factory #{}", id.0))))
    }

    pub(crate) fn value_of<T: Injectable>(
        &self,
        id: FactoryId,
        assisted: Option<&Assisted>,
    ) -> Result<Arc<T>, RequireError> {
        self.instance(id, assisted)?
            .downcast()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    fn factory_id(&self, target: &TypeKey) -> Result<FactoryId, RequireError> {
        self.0
            .by_target
            .get(target)
            .copied()
            .ok_or_else(|| RequireError::TypeMissing(target.clone()))
    }

    fn instance(
        &self,
        id: FactoryId,
        assisted: Option<&Assisted>,
    ) -> Result<Instance, RequireError> {
        let slot = self.slot(id)?;
        let blueprint = &slot.blueprint;
        match (blueprint.assisted, assisted) {
            (0, None) => {}
            (expected, None) => {
                tracing::debug!("{} expects {} assisted arguments", blueprint.target, expected);
                return Err(RequireError::AssistedRequired(blueprint.target.clone()));
            }
            (expected, Some(values)) if expected != values.len() => {
                return Err(RequireError::AssistedArity {
                    product: blueprint.target.clone(),
                    expected,
                    actual: values.len(),
                });
            }
            _ => {}
        }

        let _guard = ConstructionGuard::enter(self.0.id, id, &blueprint.target)?;
        if blueprint.is_assisted() {
            // Assisted factories are always unscoped
            return self.construct(slot, assisted);
        }

        let scope = self
            .0
            .scopes
            .get(blueprint.scope.0)
            .ok_or_else(|| RequireError::TypeMissing(blueprint.target.clone()))?;
        scope.get_scoped(&blueprint.target, &mut || self.construct(slot, None))
    }

    fn construct(
        &self,
        slot: &FactorySlot,
        assisted: Option<&Assisted>,
    ) -> Result<Instance, RequireError> {
        let blueprint = &slot.blueprint;
        let values = self.wire(&blueprint.target, &blueprint.arguments, assisted)?;
        let args = Args::new(self, &blueprint.target, values);

        let instance = slot
            .constructor
            .construct(&args)
            .map_err(|error| RequireError::ConstructionFailed {
                product: blueprint.target.clone(),
                error: Arc::new(error),
            })?;

        for hook in &slot.post_construct {
            hook.call(&instance)?;
        }
        if !slot.pre_destroy.is_empty() {
            let mut destroy_hooks = self.0.destroy_hooks.lock();
            for (hook, binding) in &slot.pre_destroy {
                destroy_hooks.push(DestroyCallback {
                    target: blueprint.target.clone(),
                    hook: hook.clone(),
                    binding: binding.clone(),
                    instance: instance.clone(),
                });
            }
        }

        tracing::debug!("Constructed instance of {}", blueprint.target);
        Ok(instance)
    }

    /// Fetches the direct dependencies of a call and collects its arguments
    fn wire(
        &self,
        owner: &TypeKey,
        arguments: &[Argument],
        assisted: Option<&Assisted>,
    ) -> Result<Vec<Arg>, RequireError> {
        arguments
            .iter()
            .map(|argument| -> Result<Arg, RequireError> {
                Ok(match &argument.wire {
                    Wire::Direct(id) => Arg::Value(self.instance(*id, None)?),
                    Wire::Indirect(id) => Arg::Deferred(*id),
                    Wire::Assisted { position, .. } => Arg::Assisted(
                        assisted
                            .and_then(|values| values.get(*position))
                            .cloned()
                            .ok_or_else(|| RequireError::AssistedRequired(owner.clone()))?,
                    ),
                    Wire::Container => Arg::Container,
                })
            })
            .collect()
    }
}

/// Marks a factory as under construction on the current thread until dropped
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(container: u64, factory: FactoryId, target: &TypeKey) -> Result<Self, RequireError> {
        CONSTRUCTING.with(|constructing| {
            let mut constructing = constructing.borrow_mut();
            if let Some(start) = constructing
                .iter()
                .position(|(c, f, _)| *c == container && *f == factory)
            {
                let mut chain: Vec<_> = constructing[start..]
                    .iter()
                    .map(|(_, _, target)| target.clone())
                    .collect();
                chain.push(target.clone());
                return Err(RequireError::CircularConstruction { chain });
            }
            constructing.push((container, factory, target.clone()));
            Ok(ConstructionGuard)
        })
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|constructing| {
            constructing.borrow_mut().pop();
        });
    }
}
