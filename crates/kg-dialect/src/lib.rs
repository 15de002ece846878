// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Closed-set vocabulary and synonym normalization for structural
//! relationships (spec §4.1).
//!
//! The structural normalizer (`kg-normalizer`) needs to map loosely-typed,
//! caller-supplied strings (`importKind`, `lang`, resolution hints, ...)
//! onto the closed enums that the rest of the graph relies on. This crate
//! owns that mapping so the synonym tables live in one place and are
//! independently testable.

use kg_core::relationship::ImportKind;
use std::collections::BTreeMap;

/// Map a caller-supplied `importType`/`importKind` string onto the closed
/// [`ImportKind`] set via the synonym rules in spec §4.1:
/// `type`/`types` → named, `star-import`/`namespace-import` → namespace,
/// `sideeffect`/`side_effect` → side-effect, `*`/`all` → wildcard, plus a
/// substring fallback for anything containing `namespace`/`side`/`wild`.
#[must_use]
pub fn normalize_import_kind(raw: &str) -> Option<ImportKind> {
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "default" => Some(ImportKind::Default),
        "named" | "type" | "types" => Some(ImportKind::Named),
        "namespace" | "star-import" | "namespace-import" => Some(ImportKind::Namespace),
        "wildcard" | "*" | "all" => Some(ImportKind::Wildcard),
        "side-effect" | "sideeffect" | "side_effect" => Some(ImportKind::SideEffect),
        other => {
            if other.contains("namespace") || other.contains("star") {
                Some(ImportKind::Namespace)
            } else if other.contains("side") {
                Some(ImportKind::SideEffect)
            } else if other.contains("wild") {
                Some(ImportKind::Wildcard)
            } else if other.contains("default") {
                Some(ImportKind::Default)
            } else {
                None
            }
        }
    }
}

/// Legacy metadata aliases pruned during structural normalization (spec
/// §4.1): keys that duplicate a canonical field under an older name.
pub const LEGACY_METADATA_ALIASES: &[&str] = &[
    "alias",
    "module",
    "moduleSpecifier",
    "sourceModule",
    "importKind",
    "lang",
    "languageId",
    "reExport",
];

/// Remove every key in [`LEGACY_METADATA_ALIASES`] from `metadata` in
/// place, returning the removed entries so callers can fold them into
/// canonical fields before discarding them.
pub fn extract_legacy_aliases(
    metadata: &mut BTreeMap<String, serde_json::Value>,
) -> BTreeMap<String, serde_json::Value> {
    let mut removed = BTreeMap::new();
    for key in LEGACY_METADATA_ALIASES {
        if let Some(v) = metadata.remove(*key) {
            removed.insert((*key).to_string(), v);
        }
    }
    removed
}

/// Normalize a module path per spec §4.1: back-slashes to forward-slashes,
/// collapse runs of `/`, strip a trailing `/` except when the path is the
/// root (`"/"`).
#[must_use]
pub fn normalize_module_path(raw: &str) -> String {
    let forward = raw.replace('\\', "/");
    let mut collapsed = String::with_capacity(forward.len());
    let mut prev_slash = false;
    for c in forward.chars() {
        if c == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
        collapsed
    } else {
        collapsed
    }
}

/// Trim and length-cap an import alias at 256 characters (spec §4.1).
#[must_use]
pub fn normalize_import_alias(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.chars().count() > 256 {
        trimmed.chars().take(256).collect()
    } else {
        trimmed.to_string()
    }
}

/// A recognized language hint derived from a file extension candidate (spec
/// §4.1 language adapters).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageHint {
    /// TypeScript (`.ts`).
    TypeScript,
    /// TypeScript JSX (`.tsx`).
    TypeScriptJsx,
    /// JavaScript (`.js`, `.mjs`, `.cjs`).
    JavaScript,
    /// Python (`.py`).
    Python,
    /// Go (`.go`).
    Go,
    /// Rust (`.rs`).
    Rust,
}

impl LanguageHint {
    /// The lower-cased `language` tag this hint sets.
    #[must_use]
    pub fn language_tag(self) -> &'static str {
        match self {
            Self::TypeScript | Self::TypeScriptJsx => "typescript",
            Self::JavaScript => "javascript",
            Self::Python => "python",
            Self::Go => "go",
            Self::Rust => "rust",
        }
    }

    /// A language-specific syntax hint (spec §4.1, e.g. TypeScript's
    /// `ts|tsx` distinction), if this language makes the distinction.
    #[must_use]
    pub fn syntax_hint(self) -> Option<&'static str> {
        match self {
            Self::TypeScript => Some("ts"),
            Self::TypeScriptJsx => Some("tsx"),
            _ => None,
        }
    }
}

/// A registered language adapter. Adapters run in registration order over a
/// candidate extension string (from `modulePath` or an entity id) and may
/// recognize it; the first match wins. Failures (an adapter returning
/// `None`) are not errors — the normalizer falls through to the next
/// adapter (spec §4.1: "adapter failures are swallowed").
pub trait LanguageAdapter: Send + Sync {
    /// Attempt to recognize `extension_candidate` (without the leading
    /// dot), returning a [`LanguageHint`] on a match.
    fn recognize(&self, extension_candidate: &str) -> Option<LanguageHint>;
}

/// The default extension-based adapter covering TypeScript, JavaScript,
/// Python, Go, and Rust.
#[derive(Debug, Default)]
pub struct DefaultLanguageAdapter;

impl LanguageAdapter for DefaultLanguageAdapter {
    fn recognize(&self, extension_candidate: &str) -> Option<LanguageHint> {
        match extension_candidate.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(LanguageHint::TypeScript),
            "tsx" => Some(LanguageHint::TypeScriptJsx),
            "js" | "mjs" | "cjs" | "jsx" => Some(LanguageHint::JavaScript),
            "py" | "pyi" => Some(LanguageHint::Python),
            "go" => Some(LanguageHint::Go),
            "rs" => Some(LanguageHint::Rust),
            _ => None,
        }
    }
}

/// An ordered registry of [`LanguageAdapter`]s, run in registration order
/// until one recognizes the candidate.
#[derive(Default)]
pub struct LanguageAdapterRegistry {
    adapters: Vec<Box<dyn LanguageAdapter>>,
}

impl LanguageAdapterRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// Create a registry pre-populated with [`DefaultLanguageAdapter`].
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut reg = Self::new();
        reg.register(DefaultLanguageAdapter);
        reg
    }

    /// Append an adapter to the end of the registration order.
    pub fn register(&mut self, adapter: impl LanguageAdapter + 'static) {
        self.adapters.push(Box::new(adapter));
    }

    /// Run every adapter in order over `extension_candidate`, returning the
    /// first match.
    #[must_use]
    pub fn recognize(&self, extension_candidate: &str) -> Option<LanguageHint> {
        self.adapters
            .iter()
            .find_map(|a| a.recognize(extension_candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn import_kind_synonyms_map_correctly() {
        assert_eq!(normalize_import_kind("type"), Some(ImportKind::Named));
        assert_eq!(normalize_import_kind("types"), Some(ImportKind::Named));
        assert_eq!(
            normalize_import_kind("star-import"),
            Some(ImportKind::Namespace)
        );
        assert_eq!(
            normalize_import_kind("namespace-import"),
            Some(ImportKind::Namespace)
        );
        assert_eq!(
            normalize_import_kind("sideeffect"),
            Some(ImportKind::SideEffect)
        );
        assert_eq!(
            normalize_import_kind("side_effect"),
            Some(ImportKind::SideEffect)
        );
        assert_eq!(normalize_import_kind("*"), Some(ImportKind::Wildcard));
        assert_eq!(normalize_import_kind("all"), Some(ImportKind::Wildcard));
    }

    #[test]
    fn import_kind_substring_fallback() {
        assert_eq!(
            normalize_import_kind("weird-namespace-thing"),
            Some(ImportKind::Namespace)
        );
        assert_eq!(normalize_import_kind("totally-unknown"), None);
    }

    #[test]
    fn module_path_normalization() {
        assert_eq!(normalize_module_path("a\\b\\c"), "a/b/c");
        assert_eq!(normalize_module_path("a//b///c"), "a/b/c");
        assert_eq!(normalize_module_path("a/b/"), "a/b");
        assert_eq!(normalize_module_path("/"), "/");
    }

    #[test]
    fn import_alias_trims_and_caps() {
        assert_eq!(normalize_import_alias("  foo  "), "foo");
        let long = "x".repeat(300);
        assert_eq!(normalize_import_alias(&long).len(), 256);
    }

    #[test]
    fn legacy_aliases_extracted() {
        let mut meta = BTreeMap::new();
        meta.insert("alias".to_string(), serde_json::json!("a"));
        meta.insert("keep".to_string(), serde_json::json!("b"));
        let removed = extract_legacy_aliases(&mut meta);
        assert_eq!(removed.len(), 1);
        assert!(meta.contains_key("keep"));
        assert!(!meta.contains_key("alias"));
    }

    #[test]
    fn language_adapter_registry_runs_in_order() {
        let reg = LanguageAdapterRegistry::with_defaults();
        assert_eq!(
            reg.recognize("tsx").map(LanguageHint::language_tag),
            Some("typescript")
        );
        assert_eq!(reg.recognize("tsx").and_then(LanguageHint::syntax_hint), Some("tsx"));
        assert_eq!(reg.recognize("unknown_ext"), None);
    }
}
