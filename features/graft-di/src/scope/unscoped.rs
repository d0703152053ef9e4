use crate::{
    errors::RequireError,
    scope::{Produce, Scope},
    types::{Instance, TypeKey},
};

/// Never caches, every access produces a new value
#[derive(Debug, Default)]
pub struct UnscopedScope;

impl Scope for UnscopedScope {
    fn get_scoped(&self, _key: &TypeKey, produce: Produce<'_>) -> Result<Instance, RequireError> {
        produce()
    }

    fn clear(&self) {}
}
