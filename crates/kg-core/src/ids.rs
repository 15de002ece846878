//! Deterministic, collision-resistant id hashing (spec §4.1, §9 OQ-b).
//!
//! All hashes use SHA-256 (≥128 bits of collision resistance, per spec
//! §4.1) over a fixed field-separated byte sequence so that re-extracting
//! the same inputs always yields the same id.

use sha2::{Digest, Sha256};

const FIELD_SEP: u8 = 0x1f; // ASCII unit separator

fn hash_fields(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, f) in fields.iter().enumerate() {
        if i > 0 {
            hasher.update([FIELD_SEP]);
        }
        hasher.update(f.as_bytes());
    }
    hex::encode(hasher.finalize())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        use std::fmt::Write;
        let mut s = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            let _ = write!(s, "{b:02x}");
        }
        s
    }
}

/// Compute the canonical id for a structural relationship (CONTAINS,
/// DEFINES, EXPORTS, IMPORTS): `hash(fromEntityId || type || canonicalized
/// toRef)`, prefixed `time-rel_` so the temporal layer can distinguish
/// structural ids from other id namespaces (spec §4.1).
#[must_use]
pub fn canonical_structural_id(from_entity_id: &str, rel_type: &str, to_ref_canonical: &str) -> String {
    format!(
        "time-rel_{}",
        hash_fields(&[from_entity_id, rel_type, to_ref_canonical])
    )
}

/// Compute a code-relationship's `siteHash` (spec §9 OQ-b): deterministic
/// hash of `(fromEntityId, toEntityId, type, location.path, location.line,
/// location.column, accessPath)`.
#[must_use]
pub fn site_hash(
    from_entity_id: &str,
    to_entity_id: &str,
    rel_type: &str,
    location_path: &str,
    location_line: u32,
    location_column: u32,
    access_path: Option<&str>,
) -> String {
    let line = location_line.to_string();
    let column = location_column.to_string();
    hash_fields(&[
        from_entity_id,
        to_entity_id,
        rel_type,
        location_path,
        &line,
        &column,
        access_path.unwrap_or(""),
    ])
}

const PLACEHOLDER_PREFIXES: &[&str] = &[
    "import:",
    "external:",
    "file:",
    "class:",
    "interface:",
    "function:",
    "typeAlias:",
];

/// Returns `true` when `id` does not carry one of the synthetic
/// placeholder/file-symbol prefixes (spec §4.3 scorer signal "is resolved
/// entity id"). Used by `kg-scorer` to distinguish a concrete entity id
/// from a not-yet-materialized target.
#[must_use]
pub fn is_plausible_entity_id(id: &str) -> bool {
    !id.is_empty() && !PLACEHOLDER_PREFIXES.iter().any(|p| id.starts_with(p))
}

/// Compute a data-flow correlation id shared by reads/writes of the same
/// local binding within one enclosing symbol (spec §4.2.3): `"df_" ||
/// hash(filePath | enclosingSymbolId | varName).slice(12)`.
#[must_use]
pub fn data_flow_id(file_path: &str, enclosing_symbol_id: &str, var_name: &str) -> String {
    let full = hash_fields(&[file_path, enclosing_symbol_id, var_name]);
    format!("df_{}", &full[..12.min(full.len())])
}
