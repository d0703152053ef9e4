//! Behaviour the caller binds to a blueprint: constructors, lifecycle hooks and injection points.
//!
//! Typed closures are wrapped into type erased bindings so the container can store them in one
//! arena, the same way a typed factory is turned into a dyn factory.

use std::{
    any::{type_name, Any},
    fmt,
    sync::Arc,
};

use crate::{
    args::Args,
    errors::RequireError,
    types::{DynError, Injectable, Instance},
};

type ConstructFn = dyn Fn(&Args<'_>) -> Result<Instance, DynError> + Send + Sync;
type HookFn = dyn Fn(&Instance) -> Result<(), RequireError> + Send + Sync;
type InjectFn = dyn Fn(&mut dyn Any, &Args<'_>) -> Result<(), DynError> + Send + Sync;

/// Builds the raw value of a factory from its wired arguments
#[derive(Clone)]
pub(crate) struct ConstructorBinding {
    pub provides: &'static str,
    construct: Arc<ConstructFn>,
}

impl ConstructorBinding {
    pub fn new<T: Injectable>(
        construct: impl Fn(&Args<'_>) -> Result<T, DynError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            provides: type_name::<T>(),
            construct: Arc::new(move |args: &Args<'_>| construct(args).map(Instance::new)),
        }
    }

    pub fn construct(&self, args: &Args<'_>) -> Result<Instance, DynError> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ConstructorBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConstructorBinding").field(&self.provides).finish()
    }
}

/// A post-construct or pre-destroy hook, called with the constructed value
#[derive(Clone)]
pub(crate) struct HookBinding {
    hook: Arc<HookFn>,
}

impl HookBinding {
    pub fn new<T: Injectable>(hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        Self {
            hook: Arc::new(move |instance: &Instance| -> Result<(), RequireError> {
                let value =
                    instance
                        .downcast_ref::<T>()
                        .ok_or_else(|| RequireError::DowncastFailed {
                            required_type: type_name::<T>(),
                            actual_type: instance.type_name,
                        })?;
                hook(value);
                Ok(())
            }),
        }
    }

    pub fn call(&self, instance: &Instance) -> Result<(), RequireError> {
        (self.hook)(instance)
    }
}

/// Performs one field assignment or method call on an externally constructed value
#[derive(Clone)]
pub(crate) struct InjectorBinding {
    inject: Arc<InjectFn>,
}

impl InjectorBinding {
    pub fn new<T: 'static>(
        inject: impl Fn(&mut T, &Args<'_>) -> Result<(), DynError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            inject: Arc::new(move |target: &mut dyn Any, args: &Args<'_>| -> Result<(), DynError> {
                let target = target.downcast_mut::<T>().ok_or_else(|| {
                    RequireError::DowncastFailed {
                        required_type: type_name::<T>(),
                        actual_type: "an injection target of another type",
                    }
                })?;
                inject(target, args)
            }),
        }
    }

    pub fn inject(&self, target: &mut dyn Any, args: &Args<'_>) -> Result<(), DynError> {
        (self.inject)(target, args)
    }
}
