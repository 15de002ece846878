//! Backfill diffing: given a persisted row's structural fields and the
//! current in-memory relationship, decide whether a re-upsert is needed
//! (spec §4.4 "Backfill").

use crate::structural::{extract_structural_fields, stable_stringify, StructuralFields};
use kg_core::Relationship;
use serde_json::Value;

/// A single changed column between a persisted row and the current
/// relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    /// The structural column name (e.g. `"importAlias"`, `"confidence"`).
    pub field: String,
    /// The persisted value, serialized for display/logging.
    pub old: String,
    /// The current value, serialized for display/logging.
    pub new: String,
}

/// The result of comparing a persisted row against a relationship's
/// current computed state. `None` when nothing differs.
#[derive(Debug, Clone, PartialEq)]
pub struct Backfill {
    /// Every structural column that changed.
    pub changes: Vec<FieldChange>,
    /// The new structural-fields payload to persist.
    pub fields: StructuralFields,
    /// The new stable-stringified metadata payload to persist.
    pub metadata: String,
}

/// Compare a persisted row (`persisted_fields`, `persisted_metadata`)
/// against `rel`'s current computed state; return the changed-field list
/// and new payload when anything differs, otherwise `None` (spec §4.4
/// "Backfill").
#[must_use]
pub fn compute_backfill(
    persisted_fields: &StructuralFields,
    persisted_metadata: &str,
    rel: &Relationship,
) -> Option<Backfill> {
    let fields = extract_structural_fields(rel);
    let metadata_value: Value = rel
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<serde_json::Map<_, _>>()
        .into();
    let metadata = stable_stringify(&metadata_value);

    let mut changes = Vec::new();
    macro_rules! diff_field {
        ($name:literal, $field:ident) => {
            if persisted_fields.$field != fields.$field {
                changes.push(FieldChange {
                    field: $name.to_string(),
                    old: format!("{:?}", persisted_fields.$field),
                    new: format!("{:?}", fields.$field),
                });
            }
        };
    }

    diff_field!("importAlias", import_alias);
    diff_field!("importType", import_type);
    diff_field!("isNamespace", is_namespace);
    diff_field!("isReExport", is_re_export);
    diff_field!("reExportTarget", re_export_target);
    diff_field!("language", language);
    diff_field!("symbolKind", symbol_kind);
    diff_field!("modulePath", module_path);
    diff_field!("resolutionState", resolution_state);
    diff_field!("importDepth", import_depth);
    diff_field!("confidence", confidence);
    diff_field!("scope", scope);

    let metadata_changed = persisted_metadata != metadata;
    if metadata_changed {
        changes.push(FieldChange {
            field: "metadata".to_string(),
            old: persisted_metadata.to_string(),
            new: metadata.clone(),
        });
    }

    if changes.is_empty() {
        None
    } else {
        Some(Backfill {
            changes,
            fields,
            metadata,
        })
    }
}
