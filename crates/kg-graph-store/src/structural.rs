//! Structural persistence fields extracted from a [`Relationship`] for
//! fast columnar filtering (spec §4.4).

use chrono::{DateTime, Utc};
use kg_core::relationship::{EdgeScope, ResolutionState};
use kg_core::Relationship;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Explicit columns extracted from a relationship's top-level fields,
/// `attrs`, and metadata, normalized for storage (spec §4.4 "Structural
/// persistence fields").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralFields {
    /// Import alias, lower-cased trim.
    pub import_alias: Option<String>,
    /// Import kind as a lower-case string.
    pub import_type: Option<String>,
    /// Namespace import flag.
    pub is_namespace: Option<bool>,
    /// Re-export flag.
    pub is_re_export: Option<bool>,
    /// Re-export target, when `is_re_export`.
    pub re_export_target: Option<String>,
    /// Source language, lower-cased.
    pub language: Option<String>,
    /// Symbol kind, lower-cased.
    pub symbol_kind: Option<String>,
    /// Normalized module path.
    pub module_path: Option<String>,
    /// Resolution state.
    pub resolution_state: Option<ResolutionState>,
    /// Re-export/import traversal depth.
    pub import_depth: Option<u32>,
    /// Confidence, clamped to `[0, 1]`.
    pub confidence: Option<f64>,
    /// Resolution scope.
    pub scope: Option<EdgeScope>,
    /// First time this edge was observed, ISO-8601.
    pub first_seen_at: DateTime<Utc>,
    /// Last time this edge was observed, ISO-8601.
    pub last_seen_at: DateTime<Utc>,
}

fn lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Normalize a module path the same way `kg-dialect` does: backslashes to
/// forward slashes, collapse slash runs, strip a trailing slash (but never
/// the root `/`). Duplicated here rather than taking a `kg-dialect`
/// dependency, since the store adapter sits downstream of the pipeline and
/// this is the only piece of dialect logic it needs.
fn normalize_module_path(p: &str) -> String {
    let slashed = p.replace('\\', "/");
    let mut collapsed = String::with_capacity(slashed.len());
    let mut last_was_slash = false;
    for c in slashed.chars() {
        if c == '/' {
            if last_was_slash {
                continue;
            }
            last_was_slash = true;
        } else {
            last_was_slash = false;
        }
        collapsed.push(c);
    }
    if collapsed.len() > 1 && collapsed.ends_with('/') {
        collapsed.pop();
    }
    collapsed
}

/// Extract and normalize structural fields from `rel`'s `attrs` first,
/// falling back to `metadata` entries of the same name (spec §4.4).
#[must_use]
pub fn extract_structural_fields(rel: &Relationship) -> StructuralFields {
    let meta = &rel.metadata;
    let str_field = |key: &str| -> Option<String> {
        meta.get(key).and_then(Value::as_str).map(str::to_string)
    };
    let bool_field = |key: &str| -> Option<bool> { meta.get(key).and_then(Value::as_bool) };
    let u32_field =
        |key: &str| -> Option<u32> { meta.get(key).and_then(Value::as_u64).map(|v| v as u32) };

    let attrs = rel.attrs.as_ref();

    let import_alias = attrs
        .and_then(|a| a.import_alias.clone())
        .or_else(|| str_field("importAlias"))
        .map(|s| s.trim().to_string());

    let import_type = attrs
        .and_then(|a| a.import_type)
        .map(|k| lower(&format!("{k:?}")))
        .or_else(|| str_field("importType").map(|s| lower(&s)));

    let language = attrs
        .and_then(|a| a.language.clone())
        .or_else(|| str_field("language"))
        .map(|s| lower(&s));

    let symbol_kind = attrs
        .and_then(|a| a.symbol_kind.clone())
        .or_else(|| str_field("symbolKind"))
        .map(|s| lower(&s));

    let module_path = attrs
        .and_then(|a| a.module_path.clone())
        .or_else(|| str_field("modulePath"))
        .map(|s| normalize_module_path(&s));

    let confidence = attrs
        .and_then(|a| a.confidence)
        .or_else(|| meta.get("confidence").and_then(Value::as_f64))
        .map(|c| c.clamp(0.0, 1.0));

    let resolution_state = attrs.and_then(|a| a.resolution_state).or_else(|| {
        meta.get("resolutionState")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    });

    let scope = attrs.and_then(|a| a.scope).or_else(|| {
        meta.get("scope")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    });

    StructuralFields {
        import_alias,
        import_type,
        is_namespace: attrs
            .and_then(|a| a.is_namespace)
            .or_else(|| bool_field("isNamespace")),
        is_re_export: attrs
            .and_then(|a| a.is_re_export)
            .or_else(|| bool_field("isReExport")),
        re_export_target: attrs
            .and_then(|a| a.re_export_target.clone())
            .or_else(|| str_field("reExportTarget")),
        language,
        symbol_kind,
        module_path,
        resolution_state,
        import_depth: attrs
            .and_then(|a| a.import_depth)
            .or_else(|| u32_field("importDepth")),
        confidence,
        scope,
        first_seen_at: rel.valid_from.unwrap_or(rel.created),
        last_seen_at: rel.last_seen_at.unwrap_or(rel.last_modified),
    }
}

/// Serialize a JSON value to a string with object keys sorted at every
/// level, so semantically identical metadata always produces the same
/// bytes regardless of insertion order (spec §4.4 "stable-stringified
/// metadata JSON (keys sorted) for change detection").
#[must_use]
pub fn stable_stringify(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).unwrap_or_default()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted = Map::new();
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for k in keys {
                sorted.insert(k.clone(), sort_keys(&map[k]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_core::relationship::RelationshipType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn base_relationship() -> Relationship {
        let now = Utc::now();
        Relationship {
            id: "time-rel_abc".into(),
            from_entity_id: "entity:a".into(),
            to_entity_id: "entity:b".into(),
            r#type: RelationshipType::Imports,
            created: now,
            last_modified: now,
            version: 1,
            metadata: BTreeMap::from([
                ("importAlias".to_string(), json!(" Foo ")),
                ("importType".to_string(), json!("Named")),
                ("isNamespace".to_string(), json!(false)),
                ("modulePath".to_string(), json!("a\\b//c/")),
            ]),
            site_id: None,
            site_hash: None,
            evidence: Vec::new(),
            locations: Vec::new(),
            sites: Vec::new(),
            attrs: None,
            valid_from: None,
            valid_to: None,
            last_seen_at: None,
            change_set_id: None,
        }
    }

    #[test]
    fn extracts_and_normalizes_module_path() {
        let rel = base_relationship();
        let fields = extract_structural_fields(&rel);
        assert_eq!(fields.import_type.as_deref(), Some("named"));
        assert_eq!(fields.module_path.as_deref(), Some("a/b/c"));
        assert_eq!(fields.is_namespace, Some(false));
    }

    #[test]
    fn confidence_is_clamped_from_metadata_fallback() {
        let mut rel = base_relationship();
        rel.metadata.insert("confidence".into(), json!(1.8));
        let fields = extract_structural_fields(&rel);
        assert_eq!(fields.confidence, Some(1.0));
    }

    #[test]
    fn confidence_prefers_attrs_over_metadata() {
        let mut rel = base_relationship();
        rel.metadata.insert("confidence".into(), json!(0.1));
        let mut attrs = kg_core::relationship::CodeAttributes::default();
        attrs.confidence = Some(0.9);
        rel.attrs = Some(attrs);
        let fields = extract_structural_fields(&rel);
        assert_eq!(fields.confidence, Some(0.9));
    }

    #[test]
    fn stable_stringify_is_order_independent() {
        let a = json!({"b": 1, "a": 2});
        let b = json!({"a": 2, "b": 1});
        assert_eq!(stable_stringify(&a), stable_stringify(&b));
    }

    #[test]
    fn stable_stringify_sorts_nested_objects() {
        let v = json!({"z": {"y": 1, "x": 2}, "a": 1});
        let s = stable_stringify(&v);
        assert!(s.find("\"a\"").unwrap() < s.find("\"z\"").unwrap());
        assert!(s.find("\"x\"").unwrap() < s.find("\"y\"").unwrap());
    }
}
