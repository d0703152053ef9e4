use std::{
    cell::RefCell,
    collections::HashMap,
    sync::{Arc, Weak},
    thread::{self, ThreadId},
};

use parking_lot::Mutex;

use crate::{
    errors::RequireError,
    scope::{Produce, Scope},
    types::{Instance, TypeKey},
};

type Slots = Mutex<HashMap<ThreadId, HashMap<TypeKey, Instance>>>;

thread_local! {
    /// Thread scopes holding values of the current thread
    static RELEASE_ON_EXIT: RefCell<Vec<Release>> = const { RefCell::new(Vec::new()) };
}

/// Removes a thread's values from a scope when the thread exits
struct Release {
    slots: Weak<Slots>,
    thread: ThreadId,
}

impl Drop for Release {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.upgrade() {
            // Values are dropped after the lock is released
            let released = slots.lock().remove(&self.thread);
            if let Some(values) = released {
                let (thread, count) = (self.thread, values.len());
                tracing::trace!("Thread {:?} exited, released {} values", thread, count);
            }
        }
    }
}

/// Caches one value per key and thread.
///
/// A slot is only ever filled by its own thread, so the lock is not held while producing. A
/// thread's values are released when it exits, or for every thread by [`Scope::clear`].
#[derive(Debug, Default)]
pub struct ThreadScope {
    slots: Arc<Slots>,
}

impl ThreadScope {
    pub fn new() -> Self {
        Self::default()
    }

    fn release_on_exit(&self, thread: ThreadId) {
        let slots = Arc::downgrade(&self.slots);
        let registered = RELEASE_ON_EXIT.try_with(|pending| {
            let mut pending = pending.borrow_mut();
            pending.retain(|release| release.slots.strong_count() > 0);
            if !pending.iter().any(|release| release.slots.ptr_eq(&slots)) {
                pending.push(Release { slots, thread });
            }
        });
        if registered.is_err() {
            tracing::warn!("Thread {:?} is exiting, its scoped values stay until clear", thread);
        }
    }
}

impl Scope for ThreadScope {
    fn get_scoped(&self, key: &TypeKey, produce: Produce<'_>) -> Result<Instance, RequireError> {
        let thread = thread::current().id();
        let cached = self
            .slots
            .lock()
            .get(&thread)
            .and_then(|values| values.get(key))
            .cloned();
        if let Some(instance) = cached {
            return Ok(instance);
        }

        let instance = produce()?;
        tracing::trace!("Thread scope stored {} for {:?}", key, thread);
        let first = {
            let mut slots = self.slots.lock();
            let values = slots.entry(thread).or_default();
            values.insert(key.clone(), instance.clone());
            values.len() == 1
        };
        if first {
            self.release_on_exit(thread);
        }
        Ok(instance)
    }

    fn clear(&self) {
        self.slots.lock().clear();
    }
}
