//! The declarative input of the compiler.
//!
//! A front end (source scanner, reflection layer, or hand written registration code) collects
//! every provider and injection target into a [`Registry`]. The registry is plain data and is
//! never mutated once resolution starts.

use serde::{Deserialize, Serialize};

use crate::{
    scope::ScopeKind,
    types::{SourceRef, TypeKey, TypeRef},
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub providers: Vec<ProviderDefinition>,
    #[serde(default)]
    pub injection_targets: Vec<InjectionTarget>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn add_provider(mut self, provider: ProviderDefinition) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn add_injection_target(mut self, target: InjectionTarget) -> Self {
        self.injection_targets.push(target);
        self
    }
}

/// Index of a provider inside [`Registry::providers`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ProviderIndex(pub usize);

/// Everything the compiler knows about one constructible type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDefinition {
    pub target: TypeKey,
    pub origin: Origin,
    #[serde(default)]
    pub scope: ScopeKind,
    #[serde(default)]
    pub post_construct: Vec<HookDecl>,
    #[serde(default)]
    pub pre_destroy: Vec<HookDecl>,
    #[serde(default)]
    pub source: SourceRef,
}

impl ProviderDefinition {
    /// A provider backed by the constructors of `target`
    pub fn class(target: impl Into<TypeKey>, constructors: Vec<ConstructorDecl>) -> Self {
        Self::with_origin(target, Origin::Class { constructors })
    }

    /// A provider backed by a class with a single constructor
    pub fn constructor(target: impl Into<TypeKey>, parameters: Vec<Parameter>) -> Self {
        Self::class(target, vec![ConstructorDecl::primary(parameters)])
    }

    /// A provider backed by a free factory function
    pub fn function(
        target: impl Into<TypeKey>,
        name: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self::with_origin(
            target,
            Origin::Function {
                name: name.into(),
                parameters,
            },
        )
    }

    pub fn with_origin(target: impl Into<TypeKey>, origin: Origin) -> Self {
        let target = target.into();
        ProviderDefinition {
            source: SourceRef::symbol(target.as_str()),
            target,
            origin,
            scope: ScopeKind::Unscoped,
            post_construct: Vec::new(),
            pre_destroy: Vec::new(),
        }
    }

    pub fn scoped(mut self, scope: ScopeKind) -> Self {
        self.scope = scope;
        self
    }

    pub fn post_construct(mut self, hook: impl Into<HookDecl>) -> Self {
        self.post_construct.push(hook.into());
        self
    }

    pub fn pre_destroy(mut self, hook: impl Into<HookDecl>) -> Self {
        self.pre_destroy.push(hook.into());
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }

    /// Parameters of the selected constructor or factory function.
    ///
    /// A sole `inject` constructor wins, then the `primary` one, then a sole constructor.
    pub fn parameters(&self) -> Result<&[Parameter], ConstructorSelection> {
        match &self.origin {
            Origin::Function { parameters, .. } => Ok(parameters),
            Origin::Class { constructors } => {
                let mut inject = constructors.iter().filter(|c| c.inject);
                if let (Some(selected), None) = (inject.next(), inject.next()) {
                    return Ok(&selected.parameters);
                }
                if let Some(primary) = constructors.iter().find(|c| c.primary) {
                    return Ok(&primary.parameters);
                }
                match constructors.as_slice() {
                    [single] => Ok(&single.parameters),
                    [] => Err(ConstructorSelection::NoConstructor),
                    _ => Err(ConstructorSelection::Ambiguous(constructors.len())),
                }
            }
            Origin::Unsupported { kind } => Err(ConstructorSelection::Unsupported(kind.clone())),
        }
    }

    pub fn has_assisted(&self) -> bool {
        self.parameters()
            .map(|parameters| parameters.iter().any(|p| p.assisted))
            .unwrap_or(false)
    }

    /// Name of the factory the container synthesizes for this provider
    pub fn factory_name(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.target.simple_name())
    }

    /// Name of the accessor the container exposes for this provider
    pub fn getter_name(&self) -> String {
        format!("get{}", self.target.simple_name())
    }
}

/// Why no parameter list could be selected for a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructorSelection {
    NoConstructor,
    Ambiguous(usize),
    Unsupported(String),
}

/// What kind of declaration a provider was collected from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Origin {
    Class {
        constructors: Vec<ConstructorDecl>,
    },
    Function {
        name: String,
        parameters: Vec<Parameter>,
    },
    /// An annotated declaration that can't provide values, e.g. an interface or a property
    Unsupported {
        #[serde(rename = "declaration")]
        kind: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstructorDecl {
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Explicitly marked for injection
    #[serde(default)]
    pub inject: bool,
    #[serde(default)]
    pub primary: bool,
}

impl ConstructorDecl {
    pub fn primary(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            inject: false,
            primary: true,
        }
    }

    pub fn secondary(parameters: Vec<Parameter>) -> Self {
        Self {
            parameters,
            inject: false,
            primary: false,
        }
    }

    pub fn inject(mut self) -> Self {
        self.inject = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    /// Supplied by the caller when the factory is invoked
    #[serde(default)]
    pub assisted: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            assisted: false,
        }
    }

    pub fn named(name: impl Into<String>, ty: impl Into<TypeKey>) -> Self {
        Self::new(name, TypeRef::named(ty))
    }

    pub fn assisted(name: impl Into<String>, ty: impl Into<TypeKey>) -> Self {
        Self {
            assisted: true,
            ..Self::named(name, ty)
        }
    }
}

/// A post-construct or pre-destroy hook. Valid hooks take no parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDecl {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

impl From<&str> for HookDecl {
    fn from(name: &str) -> Self {
        HookDecl {
            name: name.to_string(),
            parameters: Vec::new(),
        }
    }
}

/// A type the container does not build, but can populate after construction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionTarget {
    pub target: TypeKey,
    #[serde(default)]
    pub points: Vec<InjectionPoint>,
    #[serde(default)]
    pub source: SourceRef,
}

impl InjectionTarget {
    pub fn new(target: impl Into<TypeKey>) -> Self {
        let target = target.into();
        Self {
            source: SourceRef::symbol(target.as_str()),
            target,
            points: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, ty: TypeRef) -> Self {
        let name = name.into();
        self.points.push(InjectionPoint {
            parameters: vec![Parameter::new(name.clone(), ty)],
            name,
            kind: PointKind::Field,
        });
        self
    }

    pub fn method(mut self, name: impl Into<String>, parameters: Vec<Parameter>) -> Self {
        self.points.push(InjectionPoint {
            name: name.into(),
            kind: PointKind::Method,
            parameters,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectionPoint {
    pub name: String,
    pub kind: PointKind,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    /// Assignment of a single value
    Field,
    Method,
}
