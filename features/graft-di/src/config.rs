use serde::Deserialize;

use crate::types::TypeKey;

/// Options steering how a registry is resolved
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompilerOptions {
    /// Name of the generated container type, parameters of this type receive the container itself
    pub container_type: TypeKey,
    /// Appended to a provider's simple name to form its factory name
    pub factory_suffix: String,
    /// Generic types with one argument that request a deferred accessor, e.g. `Provider<T>`
    pub provider_wrappers: Vec<TypeKey>,
    /// Report cycles made only of eager dependencies
    pub reject_direct_cycles: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            container_type: TypeKey::new("Container"),
            factory_suffix: "Factory".to_string(),
            provider_wrappers: vec![TypeKey::new("Provider")],
            reject_direct_cycles: true,
        }
    }
}

impl CompilerOptions {
    pub fn with_container_type(mut self, container_type: impl Into<TypeKey>) -> Self {
        self.container_type = container_type.into();
        self
    }

    pub fn with_factory_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.factory_suffix = suffix.into();
        self
    }

    /// Adds another deferred wrapper type
    pub fn with_provider_wrapper(mut self, wrapper: impl Into<TypeKey>) -> Self {
        self.provider_wrappers.push(wrapper.into());
        self
    }

    pub fn with_direct_cycles_rejected(mut self, reject: bool) -> Self {
        self.reject_direct_cycles = reject;
        self
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub(crate) fn is_provider_wrapper(&self, base: &TypeKey) -> bool {
        self.provider_wrappers.contains(base)
    }
}
