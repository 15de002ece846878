// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz structural relationship normalization metadata robustness.
//!
//! Builds an IMPORTS relationship whose `module_path`/`import_alias` come
//! straight from the fuzz input and checks `normalize` never panics,
//! always yields a clamped confidence, and is idempotent.
#![no_main]
use std::collections::BTreeMap;

use chrono::Utc;
use libfuzzer_sys::fuzz_target;

use kg_core::relationship::{CodeAttributes, Relationship, RelationshipType};
use kg_dialect::LanguageAdapterRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };
    let mut parts = s.splitn(2, '\u{1}');
    let module_path = parts.next().unwrap_or("").to_string();
    let import_alias = parts.next().unwrap_or("").to_string();

    let now = Utc::now();
    let adapters = LanguageAdapterRegistry::with_defaults();
    let mut rel = Relationship {
        id: String::new(),
        from_entity_id: "file:a.ts".into(),
        to_entity_id: "file:b.ts:foo".into(),
        r#type: RelationshipType::Imports,
        created: now,
        last_modified: now,
        version: 1,
        metadata: BTreeMap::new(),
        site_id: None,
        site_hash: None,
        evidence: vec![],
        locations: vec![],
        sites: vec![],
        attrs: Some(CodeAttributes {
            module_path: Some(module_path),
            import_alias: Some(import_alias),
            ..Default::default()
        }),
        valid_from: None,
        valid_to: None,
        last_seen_at: None,
        change_set_id: None,
    };

    if kg_normalizer::normalize(&mut rel, &adapters).is_err() {
        return;
    }
    let confidence = rel.attrs.as_ref().and_then(|a| a.confidence).expect("confidence set");
    assert!((0.0..=1.0).contains(&confidence), "confidence out of range: {confidence}");
    assert!(!rel.id.is_empty());

    let once = rel.clone();
    kg_normalizer::normalize(&mut rel, &adapters).unwrap();
    assert_eq!(once.id, rel.id, "normalize must be idempotent");
    assert_eq!(once.attrs, rel.attrs, "normalize must be idempotent");
});
