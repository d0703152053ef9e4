//! Scopes decide how often a factory constructs its value.
//!
//! At compile time every distinct [`ScopeKind`] is interned once into a [`ScopeRegistry`]. At
//! runtime each interned kind becomes exactly one [`Scope`] instance that all factories using that
//! kind share.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    errors::RequireError,
    types::{Instance, TypeKey},
};

mod singleton;
mod thread;
mod unscoped;

pub use singleton::SingletonScope;
pub use thread::ThreadScope;
pub use unscoped::UnscopedScope;

/// Caching policy of a provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    /// A new value on every access
    #[default]
    Unscoped,
    /// One value per key for the lifetime of the container
    Singleton,
    /// One value per key and calling thread
    Thread,
    /// A user supplied [`Scope`], identified by name and bound when the container is built
    Custom(String),
}

impl ScopeKind {
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    pub fn is_unscoped(&self) -> bool {
        matches!(self, ScopeKind::Unscoped)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeKind::Unscoped => f.write_str("unscoped"),
            ScopeKind::Singleton => f.write_str("singleton"),
            ScopeKind::Thread => f.write_str("thread"),
            ScopeKind::Custom(name) => write!(f, "custom({name})"),
        }
    }
}

/// Index of a scope instance in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeId(pub usize);

/// Deduplicates the scope kinds a registry uses, in order of first use
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeRegistry {
    kinds: Vec<ScopeKind>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id of `kind`, registering it on first use
    pub fn intern(&mut self, kind: &ScopeKind) -> ScopeId {
        if let Some(id) = self.get(kind) {
            return id;
        }
        self.kinds.push(kind.clone());
        ScopeId(self.kinds.len() - 1)
    }

    pub fn get(&self, kind: &ScopeKind) -> Option<ScopeId> {
        self.kinds.iter().position(|k| k == kind).map(ScopeId)
    }

    pub fn kind(&self, id: ScopeId) -> Option<&ScopeKind> {
        self.kinds.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ScopeId, &ScopeKind)> {
        self.kinds.iter().enumerate().map(|(i, kind)| (ScopeId(i), kind))
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

/// Thunk that constructs a fresh value for a scope
pub type Produce<'a> = &'a mut dyn FnMut() -> Result<Instance, RequireError>;

/// Caching strategy shared by every factory bound to the same scope kind.
///
/// Implementations for custom scopes are called as-is, the container adds no synchronization
/// around them.
pub trait Scope: Send + Sync {
    /// Returns the value for `key`, calling `produce` when the policy requires a new one
    fn get_scoped(&self, key: &TypeKey, produce: Produce<'_>) -> Result<Instance, RequireError>;

    /// Drops every cached value
    fn clear(&self);
}
