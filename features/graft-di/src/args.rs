use std::{any::type_name, sync::Arc};

use crate::{
    blueprint::FactoryId,
    container::Container,
    errors::RequireError,
    provider::Provider,
    types::{Injectable, Instance, TypeKey},
};

/// Values supplied by the caller of an assisted factory, in declaration order
#[derive(Debug, Clone, Default)]
pub struct Assisted {
    values: Vec<Instance>,
}

impl Assisted {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<T: Injectable>(mut self, value: T) -> Self {
        self.values.push(Instance::new(value));
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn get(&self, position: usize) -> Option<&Instance> {
        self.values.get(position)
    }
}

/// One wired argument
pub(crate) enum Arg {
    Value(Instance),
    Deferred(FactoryId),
    Assisted(Instance),
    Container,
}

impl Arg {
    fn describe(&self) -> &'static str {
        match self {
            Arg::Value(_) => "a value",
            Arg::Deferred(_) => "a provider",
            Arg::Assisted(_) => "an assisted value",
            Arg::Container => "the container",
        }
    }
}

/// The arguments of one constructor or injection point call, in declaration order
pub struct Args<'c> {
    container: &'c Container,
    owner: &'c TypeKey,
    values: Vec<Arg>,
}

impl<'c> Args<'c> {
    pub(crate) fn new(container: &'c Container, owner: &'c TypeKey, values: Vec<Arg>) -> Self {
        Self {
            container,
            owner,
            values,
        }
    }

    /// The type these arguments are built for
    pub fn owner(&self) -> &TypeKey {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A direct dependency or an assisted value
    pub fn get<T: Injectable>(&self, index: usize) -> Result<Arc<T>, RequireError> {
        match self.arg(index)? {
            Arg::Value(instance) | Arg::Assisted(instance) => {
                instance
                    .downcast()
                    .map_err(|actual_type| RequireError::DowncastFailed {
                        required_type: type_name::<T>(),
                        actual_type,
                    })
            }
            other => Err(self.kind_mismatch(index, "a value", other)),
        }
    }

    /// A deferred accessor for an indirect dependency
    pub fn provider<T: Injectable>(&self, index: usize) -> Result<Provider<T>, RequireError> {
        match self.arg(index)? {
            Arg::Deferred(factory) => Ok(Provider::new(self.container, *factory)),
            other => Err(self.kind_mismatch(index, "a provider", other)),
        }
    }

    /// The enclosing container, for parameters that reference it
    pub fn container(&self, index: usize) -> Result<&'c Container, RequireError> {
        match self.arg(index)? {
            Arg::Container => Ok(self.container),
            other => Err(self.kind_mismatch(index, "the container", other)),
        }
    }

    fn arg(&self, index: usize) -> Result<&Arg, RequireError> {
        self.values.get(index).ok_or(RequireError::ArgumentMissing {
            index,
            count: self.values.len(),
        })
    }

    fn kind_mismatch(&self, index: usize, requested: &'static str, actual: &Arg) -> RequireError {
        RequireError::ArgumentKind {
            index,
            requested,
            actual: actual.describe(),
        }
    }
}
