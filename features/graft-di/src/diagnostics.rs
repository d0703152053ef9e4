//! Structured reports of defects found while resolving a registry.
//!
//! Nothing in the compiler fails fast: every problem is recorded into [`Diagnostics`] and analysis
//! continues, so a single run reports all of them.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::types::SourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// No provider matches a parameter, and it is no forward or self reference
    UnresolvedDependency,
    /// More than one provider for a target type
    AmbiguousProvider,
    /// A declaration kind that can't be used as a provider or injection point
    InvalidAnnotationTarget,
    /// A class provider without a selectable constructor
    MissingConstructor,
    /// Assisted parameters on a provider with a caching scope
    InvalidAssistedScope,
    /// Eager dependency on a provider that needs assisted parameters
    InvalidAssistedDependency,
    /// A lifecycle hook that declares parameters
    InvalidLifecycleSignature,
    /// Providers that depend on each other through eager edges only
    CyclicDependency,
    EmptyInjectionTarget,
}

impl DiagnosticKind {
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::EmptyInjectionTarget => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
    pub source: SourceRef,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{level}[{}] {}: {}", self.kind, self.source, self.message)
    }
}

/// Accumulating sink of diagnostics, kept in the order they were recorded
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DiagnosticKind, source: &SourceRef, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            kind,
            severity: kind.severity(),
            message: message.into(),
            source: source.clone(),
        };
        match diagnostic.severity {
            Severity::Error => tracing::error!("{}", diagnostic),
            Severity::Warning => tracing::warn!("{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.entries.iter()
    }

    /// Number of diagnostics of a given kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut display = Vec::new();
        display.push("The registry had one or more errors:".to_string());
        for diagnostic in &self.entries {
            display.push(format!("- {}", diagnostic));
        }
        f.write_str(&display.join("\n"))
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
