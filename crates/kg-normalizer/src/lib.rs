// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Structural relationship normalizer (spec §4.1, component C2).
//!
//! Takes a freshly constructed structural relationship (`CONTAINS`,
//! `DEFINES`, `EXPORTS`, `IMPORTS`) with loosely-typed metadata and produces
//! its canonical form: pruned metadata, normalized module path and import
//! alias, a closed-set `importType`, inferred `isNamespace`/`isReExport`,
//! a computed `resolutionState`, a default `confidence` by state, and
//! language-adapter annotations, finishing with a stable canonical id.

use kg_core::ids::canonical_structural_id;
use kg_core::relationship::{
    CodeAttributes, Relationship, RelationshipType, ResolutionState, Target,
};
use kg_dialect::{normalize_import_alias, normalize_import_kind, normalize_module_path, LanguageAdapterRegistry};

/// Errors raised while normalizing a structural relationship.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// The relationship's type is not one of the structural group.
    #[error("relationship type {0:?} is not a structural type (CONTAINS/DEFINES/EXPORTS/IMPORTS)")]
    NotStructural(RelationshipType),
}

/// Default confidence assigned by resolution state (spec §4.1), before any
/// caller-supplied override.
#[must_use]
pub fn default_confidence(rel_type: RelationshipType, state: ResolutionState) -> f64 {
    if matches!(rel_type, RelationshipType::Contains | RelationshipType::Defines) {
        return 0.95;
    }
    match state {
        ResolutionState::Resolved => 0.90,
        ResolutionState::Partial => 0.60,
        ResolutionState::Unresolved => 0.40,
    }
}

/// Classify a synthetic id's namespace prefix into a [`ResolutionState`],
/// per spec §4.1's id-prefix fallback rule. Returns `None` when the prefix
/// is not recognized.
#[must_use]
pub fn classify_id_prefix(id: &str) -> Option<ResolutionState> {
    const RESOLVED_PREFIXES: &[&str] = &["file:", "sym:", "dir:", "entity:"];
    const UNRESOLVED_PREFIXES: &[&str] = &[
        "import:",
        "external:",
        "package:",
        "module:",
        "class:",
        "interface:",
        "function:",
        "typeAlias:",
    ];
    if RESOLVED_PREFIXES.iter().any(|p| id.starts_with(p)) {
        Some(ResolutionState::Resolved)
    } else if UNRESOLVED_PREFIXES.iter().any(|p| id.starts_with(p)) {
        Some(ResolutionState::Unresolved)
    } else {
        None
    }
}

/// Compute the `resolutionState` for a structural relationship (spec
/// §4.1): explicit value if already valid, else classify `toRef.kind`,
/// else classify the `toEntityId` prefix, else default CONTAINS/DEFINES to
/// resolved.
#[must_use]
pub fn compute_resolution_state(
    rel_type: RelationshipType,
    explicit: Option<ResolutionState>,
    to_ref: Option<&Target>,
    to_entity_id: &str,
) -> ResolutionState {
    if let Some(state) = explicit {
        return state;
    }
    if let Some(target) = to_ref {
        return if target.is_resolved_kind() {
            ResolutionState::Resolved
        } else {
            ResolutionState::Unresolved
        };
    }
    if let Some(state) = classify_id_prefix(to_entity_id) {
        return state;
    }
    if matches!(rel_type, RelationshipType::Contains | RelationshipType::Defines) {
        ResolutionState::Resolved
    } else {
        ResolutionState::Unresolved
    }
}

/// Normalize a single structural relationship in place, per spec §4.1.
/// Idempotent: `normalize(normalize(r)) == normalize(r)` (spec §8 property
/// 1, 2).
///
/// # Errors
///
/// Returns [`NormalizeError::NotStructural`] if `rel.type` is not one of
/// `CONTAINS`, `DEFINES`, `EXPORTS`, `IMPORTS`.
pub fn normalize(rel: &mut Relationship, adapters: &LanguageAdapterRegistry) -> Result<(), NormalizeError> {
    if !rel.r#type.is_structural() {
        return Err(NormalizeError::NotStructural(rel.r#type));
    }

    kg_dialect::extract_legacy_aliases(&mut rel.metadata);

    let mut attrs = rel.attrs.take().unwrap_or_default();

    if let Some(module_path) = attrs.module_path.take() {
        attrs.module_path = Some(normalize_module_path(&module_path));
    }
    if let Some(alias) = attrs.import_alias.take() {
        attrs.import_alias = Some(normalize_import_alias(&alias));
    }
    if let Some(raw_kind) = attrs
        .import_type
        .map(|k| format!("{k:?}"))
        .or_else(|| {
            rel.metadata
                .get("importType")
                .and_then(|v| v.as_str())
                .map(str::to_string)
        })
    {
        attrs.import_type = normalize_import_kind(&raw_kind);
    }

    let is_namespace_by_path = attrs
        .module_path
        .as_deref()
        .is_some_and(|p| p.ends_with("/*"));
    attrs.is_namespace = Some(
        attrs.is_namespace.unwrap_or(false)
            || attrs.import_type == Some(kg_core::relationship::ImportKind::Namespace)
            || is_namespace_by_path,
    );

    attrs.is_re_export = Some(attrs.re_export_target.is_some() || attrs.is_re_export.unwrap_or(false));
    if attrs.is_re_export == Some(false) {
        attrs.re_export_target = None;
    }

    if let Some(lang) = attrs.language.take() {
        attrs.language = Some(lang.to_ascii_lowercase());
    }
    if let Some(kind) = attrs.symbol_kind.take() {
        attrs.symbol_kind = Some(kind.to_ascii_lowercase());
    }
    attrs.import_depth = attrs.import_depth.or(Some(0));

    let state = compute_resolution_state(
        rel.r#type,
        attrs.resolution_state,
        attrs.to_ref.as_ref(),
        &rel.to_entity_id,
    );
    attrs.resolution_state = Some(state);

    let confidence = attrs
        .confidence
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or_else(|| default_confidence(rel.r#type, state));
    attrs.confidence = Some(confidence);

    if let (Some(module_path), Some(lang)) = (attrs.module_path.clone(), extension_candidate(&attrs)) {
        if let Some(hint) = adapters.recognize(&lang) {
            attrs.language = Some(hint.language_tag().to_string());
            if let Some(syntax) = hint.syntax_hint() {
                rel.metadata.insert(
                    "syntaxHint".to_string(),
                    serde_json::Value::String(syntax.to_string()),
                );
            }
        }
        let _ = module_path; // module_path already normalized above; kept for adapter context.
    }

    rel.attrs = Some(attrs);

    let to_ref_canonical = rel
        .attrs
        .as_ref()
        .and_then(|a| a.to_ref.as_ref())
        .map(Target::synthetic_id)
        .unwrap_or_else(|| rel.to_entity_id.clone());
    rel.id = canonical_structural_id(&rel.from_entity_id, type_tag(rel.r#type), &to_ref_canonical);

    Ok(())
}

fn extension_candidate(attrs: &CodeAttributes) -> Option<String> {
    attrs
        .module_path
        .as_ref()
        .and_then(|p| p.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string())
}

fn type_tag(t: RelationshipType) -> &'static str {
    match t {
        RelationshipType::Contains => "CONTAINS",
        RelationshipType::Defines => "DEFINES",
        RelationshipType::Exports => "EXPORTS",
        RelationshipType::Imports => "IMPORTS",
        _ => "OTHER",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn import_rel() -> Relationship {
        let now = Utc::now();
        Relationship {
            id: String::new(),
            from_entity_id: "file:a.ts".into(),
            to_entity_id: "file:b.ts:foo".into(),
            r#type: RelationshipType::Imports,
            created: now,
            last_modified: now,
            version: 1,
            metadata: Default::default(),
            site_id: None,
            site_hash: None,
            evidence: vec![],
            locations: vec![],
            sites: vec![],
            attrs: Some(CodeAttributes {
                module_path: Some("./b".into()),
                to_ref: Some(Target::FileSymbol {
                    file: "b.ts".into(),
                    symbol: "foo".into(),
                }),
                ..Default::default()
            }),
            valid_from: Some(now),
            valid_to: None,
            last_seen_at: Some(now),
            change_set_id: None,
        }
    }

    #[test]
    fn normalize_is_idempotent() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        normalize(&mut r, &adapters).unwrap();
        let once = r.clone();
        normalize(&mut r, &adapters).unwrap();
        assert_eq!(once.id, r.id);
        assert_eq!(once.attrs, r.attrs);
    }

    #[test]
    fn resolved_import_gets_default_confidence() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        normalize(&mut r, &adapters).unwrap();
        let attrs = r.attrs.unwrap();
        assert_eq!(attrs.resolution_state, Some(ResolutionState::Resolved));
        assert_eq!(attrs.confidence, Some(0.90));
    }

    #[test]
    fn legacy_aliases_are_pruned() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        r.metadata.insert("alias".into(), serde_json::json!("x"));
        normalize(&mut r, &adapters).unwrap();
        assert!(!r.metadata.contains_key("alias"));
    }

    #[test]
    fn non_structural_type_rejected() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        r.r#type = RelationshipType::Calls;
        assert!(matches!(
            normalize(&mut r, &adapters),
            Err(NormalizeError::NotStructural(RelationshipType::Calls))
        ));
    }

    #[test]
    fn confidence_is_clamped() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        r.attrs.as_mut().unwrap().confidence = Some(5.0);
        normalize(&mut r, &adapters).unwrap();
        assert_eq!(r.attrs.unwrap().confidence, Some(1.0));
    }

    #[test]
    fn unresolved_placeholder_defaults_to_point_four() {
        let adapters = LanguageAdapterRegistry::with_defaults();
        let mut r = import_rel();
        r.to_entity_id = "import:./b:foo".into();
        r.attrs.as_mut().unwrap().to_ref = Some(Target::Placeholder {
            placeholder_kind: "import".into(),
            name: "./b:foo".into(),
        });
        normalize(&mut r, &adapters).unwrap();
        let attrs = r.attrs.unwrap();
        assert_eq!(attrs.resolution_state, Some(ResolutionState::Unresolved));
        assert_eq!(attrs.confidence, Some(0.40));
    }

    proptest::proptest! {
        #[test]
        fn normalize_never_panics_on_arbitrary_module_path(path in "[\\\\/a-zA-Z0-9_.*]{0,64}") {
            let adapters = LanguageAdapterRegistry::with_defaults();
            let mut r = import_rel();
            r.attrs.as_mut().unwrap().module_path = Some(path);
            let _ = normalize(&mut r, &adapters);
        }
    }
}
