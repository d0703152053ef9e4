use std::collections::{BTreeMap, BTreeSet};

use crate::{
    diagnostics::{DiagnosticKind, Diagnostics},
    registry::ProviderIndex,
    resolver::{Dependency, Resolution},
    types::{SourceRef, TypeKey},
};

/// Graph of the eager edges between providers.
///
/// Indirect edges are left out: a deferred accessor is only followed after wiring completed, so
/// any cycle that contains one can be wired.
pub struct DependencyGraph<'r> {
    map: BTreeMap<ProviderIndex, DependencyGraphEntry<'r>>,
}

struct DependencyGraphEntry<'r> {
    target: &'r TypeKey,
    source: &'r SourceRef,
    direct: Vec<ProviderIndex>,
}

impl<'r> DependencyGraph<'r> {
    pub fn new(resolution: &Resolution<'r>) -> Self {
        let map = resolution
            .providers
            .iter()
            .map(|provider| {
                let direct = provider
                    .parameters
                    .iter()
                    .filter_map(|p| match p.dependency {
                        Dependency::Direct(index) => Some(index),
                        _ => None,
                    })
                    .collect();
                let entry = DependencyGraphEntry {
                    target: &provider.definition.target,
                    source: &provider.definition.source,
                    direct,
                };
                (provider.index, entry)
            })
            .collect();

        Self { map }
    }

    /// Records one diagnostic for every distinct cycle made of direct edges only
    pub fn check(&self, diagnostics: &mut Diagnostics) {
        let mut checked = BTreeSet::new();
        let mut reported = BTreeSet::new();
        for &index in self.map.keys() {
            let mut chain = Vec::new();
            self.check_recurse(index, &mut checked, &mut chain, &mut reported, diagnostics);
        }
    }

    fn check_recurse(
        &self,
        index: ProviderIndex,
        checked: &mut BTreeSet<ProviderIndex>,
        chain: &mut Vec<ProviderIndex>,
        reported: &mut BTreeSet<Vec<ProviderIndex>>,
        diagnostics: &mut Diagnostics,
    ) {
        if let Some(start) = chain.iter().position(|&i| i == index) {
            self.report_cycle(&chain[start..], reported, diagnostics);
            return;
        }

        // Everything reachable from here was already walked
        if checked.contains(&index) {
            return;
        }
        let Some(entry) = self.map.get(&index) else {
            return;
        };

        chain.push(index);
        for &next in &entry.direct {
            self.check_recurse(next, checked, chain, reported, diagnostics);
        }
        chain.pop();
        checked.insert(index);
    }

    fn report_cycle(
        &self,
        cycle: &[ProviderIndex],
        reported: &mut BTreeSet<Vec<ProviderIndex>>,
        diagnostics: &mut Diagnostics,
    ) {
        // Rotate so the same cycle found from another member compares equal
        let mut normalized = cycle.to_vec();
        let lowest = (0..normalized.len())
            .min_by_key(|&i| normalized[i])
            .unwrap_or(0);
        normalized.rotate_left(lowest);
        if !reported.insert(normalized.clone()) {
            return;
        }

        let mut names: Vec<_> = normalized
            .iter()
            .filter_map(|i| self.map.get(i))
            .map(|entry| entry.target.to_string())
            .collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        let Some(head) = normalized.first().and_then(|i| self.map.get(i)) else {
            return;
        };

        diagnostics.record(
            DiagnosticKind::CyclicDependency,
            head.source,
            format!(
                "A circular dependency exists through {} - consider requesting one of them through a provider",
                names.join(" -> ")
            ),
        );
    }
}
