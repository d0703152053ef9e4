use std::sync::Arc;

use thiserror::Error;

use crate::types::{DynError, TypeKey};

/// Errors when trying to require a value from the container
#[derive(Error, Debug, Clone)]
pub enum RequireError {
    /// The container has no factory for the type
    #[error("No factory is known for '{0}'")]
    TypeMissing(TypeKey),

    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },

    /// The factory needs caller supplied values, use `get_with`
    #[error("'{0}' takes assisted arguments and must be requested with them")]
    AssistedRequired(TypeKey),

    #[error("'{product}' expects {expected} assisted arguments, got {actual}")]
    AssistedArity {
        product: TypeKey,
        expected: usize,
        actual: usize,
    },

    /// A factory was re-entered while it was still constructing on the same thread
    #[error("Circular construction: {}", format_chain(.chain))]
    CircularConstruction { chain: Vec<TypeKey> },

    #[error("Factory for '{product}' failed - error: {error}")]
    ConstructionFailed {
        product: TypeKey,
        error: Arc<DynError>,
    },

    #[error("Injecting '{point}' into '{target}' failed - error: {error}")]
    InjectionFailed {
        target: TypeKey,
        point: String,
        error: Arc<DynError>,
    },

    /// The constructor asked for an argument in a form it was not wired as
    #[error("Argument {index} is wired as {actual}, not as {requested}")]
    ArgumentKind {
        index: usize,
        requested: &'static str,
        actual: &'static str,
    },

    #[error("Argument {index} does not exist, {count} were wired")]
    ArgumentMissing { index: usize, count: usize },

    #[error("No injection function is known for '{0}'")]
    NotInjectable(TypeKey),

    #[error("The container was dropped, did you keep a provider after dropping it?")]
    ContainerDropped,
}

fn format_chain(chain: &[TypeKey]) -> String {
    chain
        .iter()
        .map(TypeKey::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A blueprint could not be turned into a container with the supplied bindings
#[derive(Error, Debug, Clone)]
pub struct InstantiateError {
    pub problems: Vec<BindingProblem>,
}
impl std::fmt::Display for InstantiateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("The container bindings had one or more errors:".to_string());
        for problem in &self.problems {
            display.push(format!("- {}", problem));
        }
        f.write_str(&display.join("\n"))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindingProblem {
    #[error("'{0}' has no constructor binding")]
    MissingConstructor(TypeKey),

    #[error("Hook '{hook}' of '{target}' has no binding")]
    MissingHook { target: TypeKey, hook: String },

    #[error("Injection point '{point}' of '{target}' has no binding")]
    MissingInjector { target: TypeKey, point: String },

    #[error("Custom scope '{0}' has no implementation")]
    UnboundScope(String),

    /// A binding was supplied for something the blueprint doesn't contain
    #[error("A binding was supplied for '{0}' which the blueprint does not know")]
    UnknownBinding(String),

    #[error("'{0}' was bound more than once")]
    Duplicate(String),
}
