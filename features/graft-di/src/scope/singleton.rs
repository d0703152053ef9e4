use std::{collections::HashMap, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::{
    errors::RequireError,
    scope::{Produce, Scope},
    types::{Instance, TypeKey},
};

/// Caches one value per key until cleared.
///
/// Concurrent first accesses of the same key run `produce` at most once: the key's cell is taken
/// under the map lock, and initialized outside of it so other keys stay available meanwhile.
#[derive(Debug, Default)]
pub struct SingletonScope {
    cells: Mutex<HashMap<TypeKey, Arc<OnceCell<Instance>>>>,
}

impl SingletonScope {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scope for SingletonScope {
    fn get_scoped(&self, key: &TypeKey, produce: Produce<'_>) -> Result<Instance, RequireError> {
        let cell = self
            .cells
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        cell.get_or_try_init(|| {
            tracing::trace!("Singleton scope producing {}", key);
            produce()
        })
        .cloned()
    }

    fn clear(&self) {
        // In-flight initializations keep their detached cell and are simply forgotten
        self.cells.lock().clear();
    }
}
