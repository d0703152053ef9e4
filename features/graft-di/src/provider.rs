use std::{
    any::type_name,
    fmt::Debug,
    marker::PhantomData,
    sync::{Arc, Weak},
};

use crate::{
    args::Assisted,
    blueprint::FactoryId,
    container::{Container, ContainerInner},
    errors::RequireError,
    types::Injectable,
};

/// Deferred accessor for another factory's value
///
/// Holds no value itself, every call goes through the container's factory arena. This is what
/// allows providers to depend on each other in a cycle, as long as one side of it takes a
/// `Provider`.
///
/// The container is referenced weakly, so a scoped value holding a provider does not keep its
/// container alive.
pub struct Provider<T: Injectable> {
    container: Weak<ContainerInner>,
    factory: FactoryId,
    _provides: PhantomData<fn() -> T>,
}

impl<T: Injectable> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            factory: self.factory,
            _provides: PhantomData,
        }
    }
}

impl<T: Injectable> Debug for Provider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Provider")
            .field(&type_name::<T>())
            .field(&self.factory)
            .finish()
    }
}

impl<T: Injectable> Provider<T> {
    pub(crate) fn new(container: &Container, factory: FactoryId) -> Self {
        Self {
            container: Arc::downgrade(&container.0),
            factory,
            _provides: PhantomData,
        }
    }

    /// Fetches the value, constructing it if its scope requires
    pub fn get(&self) -> Result<Arc<T>, RequireError> {
        self.container()?.value_of(self.factory, None)
    }

    /// Builds a value of an assisted factory
    pub fn get_with(&self, assisted: Assisted) -> Result<Arc<T>, RequireError> {
        self.container()?.value_of(self.factory, Some(&assisted))
    }

    fn container(&self) -> Result<Container, RequireError> {
        self.container
            .upgrade()
            .map(Container)
            .ok_or(RequireError::ContainerDropped)
    }
}
