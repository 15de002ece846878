// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Symbol and name index (spec §4.2, component C3).
//!
//! In-memory maps from `(file, name) -> entity-id` and `name -> [entity]`,
//! used by the relationship builders to promote placeholder targets
//! ([`kg_core::relationship::Target::Placeholder`] /
//! [`kg_core::relationship::Target::External`]) to concrete entity ids once
//! the defining symbol has been observed. Built once per scan pass and
//! read-only during builder execution (spec §5); rebuilding requires
//! exclusive access via [`SymbolIndex::clear`] + re-population.

use std::collections::HashMap;

/// `(file, name) -> entity-id` and `name -> [entity-id]` lookup tables
/// populated as symbols are observed during a scan.
#[derive(Debug, Default, Clone)]
pub struct SymbolIndex {
    by_file_name: HashMap<(String, String), String>,
    by_name: HashMap<String, Vec<String>>,
}

impl SymbolIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a symbol's entity id under its declaring file and name.
    /// Idempotent: re-inserting the same `(file, name, id)` triple is a
    /// no-op; re-inserting a different id under the same `(file, name)`
    /// overwrites the `by_file_name` entry but still appends to `by_name`
    /// only once.
    pub fn insert(&mut self, file: impl Into<String>, name: impl Into<String>, entity_id: impl Into<String>) {
        let file = file.into();
        let name = name.into();
        let entity_id = entity_id.into();

        self.by_file_name
            .insert((file, name.clone()), entity_id.clone());

        let bucket = self.by_name.entry(name).or_default();
        if !bucket.contains(&entity_id) {
            bucket.push(entity_id);
        }
    }

    /// Look up the unique entity id declared as `name` within `file`.
    #[must_use]
    pub fn lookup_local(&self, file: &str, name: &str) -> Option<&str> {
        self.by_file_name
            .get(&(file.to_string(), name.to_string()))
            .map(String::as_str)
    }

    /// Look up every entity id declared anywhere under `name`, for
    /// ambiguity detection (spec §4.2.2 THROWS `ambiguous`/`candidateCount`).
    #[must_use]
    pub fn lookup_by_name(&self, name: &str) -> &[String] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    /// Look up the single entity id for `name` if and only if it is
    /// unambiguous (spec §4.2.4 placeholder promotion: "promoted when
    /// `nameIndex` yields a unique hit").
    #[must_use]
    pub fn lookup_unique(&self, name: &str) -> Option<&str> {
        match self.by_name.get(name) {
            Some(ids) if ids.len() == 1 => Some(ids[0].as_str()),
            _ => None,
        }
    }

    /// Number of distinct `(file, name)` entries registered.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_file_name.len()
    }

    /// Returns `true` if no symbols have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_file_name.is_empty()
    }

    /// Clear both maps, preparing for an exclusive rebuild (spec §5).
    pub fn clear(&mut self) {
        self.by_file_name.clear();
        self.by_name.clear();
    }
}

/// A bounded counter limiting expensive type-checker resolution calls per
/// scan (spec §5 "type-checker budget", §9 "Global mutable state").
/// Builders must consult [`TypeCheckerBudget::take`] before invoking
/// type-checker resolution and gracefully degrade when exhausted.
#[derive(Debug, Clone, Copy)]
pub struct TypeCheckerBudget {
    remaining: u32,
}

impl TypeCheckerBudget {
    /// Create a budget with `limit` available calls.
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self { remaining: limit }
    }

    /// Attempt to consume one unit of budget. Returns `true` if budget was
    /// available and has been decremented; `false` if exhausted.
    pub fn take(&mut self) -> bool {
        if self.remaining == 0 {
            false
        } else {
            self.remaining -= 1;
            true
        }
    }

    /// Remaining budget, for diagnostics.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_lookup_finds_registered_symbol() {
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "foo", "sym:a.ts:foo");
        assert_eq!(idx.lookup_local("a.ts", "foo"), Some("sym:a.ts:foo"));
        assert_eq!(idx.lookup_local("b.ts", "foo"), None);
    }

    #[test]
    fn name_lookup_collects_all_files() {
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "foo", "sym:a.ts:foo");
        idx.insert("b.ts", "foo", "sym:b.ts:foo");
        assert_eq!(idx.lookup_by_name("foo").len(), 2);
        assert_eq!(idx.lookup_unique("foo"), None);
    }

    #[test]
    fn unique_lookup_requires_single_hit() {
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "bar", "sym:a.ts:bar");
        assert_eq!(idx.lookup_unique("bar"), Some("sym:a.ts:bar"));
    }

    #[test]
    fn clear_empties_both_maps() {
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "foo", "sym:a.ts:foo");
        idx.clear();
        assert!(idx.is_empty());
        assert!(idx.lookup_by_name("foo").is_empty());
    }

    #[test]
    fn type_checker_budget_exhausts() {
        let mut budget = TypeCheckerBudget::new(2);
        assert!(budget.take());
        assert!(budget.take());
        assert!(!budget.take());
        assert_eq!(budget.remaining(), 0);
    }
}
