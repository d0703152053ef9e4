use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};

/// All errors must be Send + Sync so they can cross threads with the container
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Anything the container hands out is shared between threads
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// Nominal identity of a type, e.g. `app::service::Service`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeKey(String);

impl TypeKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Key derived from the Rust type name
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, with `::` and `.` both accepted as separators
    pub fn simple_name(&self) -> &str {
        let name = self.0.split('<').next().unwrap_or(&self.0);
        name.rsplit(|c: char| c == ':' || c == '.')
            .next()
            .unwrap_or(name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeKey {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TypeKey {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// A type as it was declared on a parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    /// A plain, resolvable type
    Named(TypeKey),
    /// A generic type such as `Provider<Task>`
    Generic {
        base: TypeKey,
        arguments: Vec<TypeRef>,
    },
    /// The front end could not resolve the type, only its spelling is known.
    /// Usually a reference to something that is generated later.
    Unresolved(String),
}

impl TypeRef {
    pub fn named(name: impl Into<TypeKey>) -> Self {
        Self::Named(name.into())
    }

    pub fn generic(base: impl Into<TypeKey>, arguments: Vec<TypeRef>) -> Self {
        Self::Generic {
            base: base.into(),
            arguments,
        }
    }

    pub fn unresolved(spelling: impl Into<String>) -> Self {
        Self::Unresolved(spelling.into())
    }

    /// The identity providers are matched against.
    ///
    /// Returns None for unresolved types.
    pub fn nominal(&self) -> Option<TypeKey> {
        match self {
            TypeRef::Named(key) => Some(key.clone()),
            TypeRef::Generic { .. } => Some(TypeKey(self.to_string())),
            TypeRef::Unresolved(_) => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Named(key) => write!(f, "{key}"),
            TypeRef::Generic { base, arguments } => {
                write!(f, "{base}<")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(">")
            }
            TypeRef::Unresolved(spelling) => write!(f, "{spelling}"),
        }
    }
}

/// Where a declaration came from, as reported by the front end
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl SourceRef {
    pub fn symbol(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            file: None,
            line: None,
        }
    }

    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{} ({file}:{line})", self.symbol),
            (Some(file), None) => write!(f, "{} ({file})", self.symbol),
            _ => f.write_str(&self.symbol),
        }
    }
}

/// A value produced or stored by the container
#[derive(Clone)]
pub struct Instance {
    pub type_name: &'static str,
    pub value: Arc<dyn std::any::Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<T: Injectable>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Injectable>(value: Arc<T>) -> Self {
        Instance {
            type_name: std::any::type_name::<T>(),
            value,
        }
    }

    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.value.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.type_name),
        }
    }

    pub fn downcast_ref<T: Injectable>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Whether both instances point at the same allocation
    pub fn same_as(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name).finish()
    }
}
