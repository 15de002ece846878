// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz canonical id hashing for stability and field-sensitivity.
//!
//! Splits the input into up to four fields and checks that
//! `canonical_structural_id` and `site_hash` never panic, are deterministic
//! for the same input, and change whenever any one field changes.
#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };
    let parts: Vec<&str> = s.splitn(4, '\u{1}').collect();
    let from = parts.first().copied().unwrap_or("");
    let rel_type = parts.get(1).copied().unwrap_or("");
    let to_ref = parts.get(2).copied().unwrap_or("");
    let access_path = parts.get(3).copied();

    let a = kg_core::ids::canonical_structural_id(from, rel_type, to_ref);
    let b = kg_core::ids::canonical_structural_id(from, rel_type, to_ref);
    assert_eq!(a, b, "canonical_structural_id must be deterministic");
    assert!(a.starts_with("time-rel_"));

    let changed_from = kg_core::ids::canonical_structural_id(&(from.to_string() + "x"), rel_type, to_ref);
    if from != format!("{from}x") {
        assert_ne!(a, changed_from);
    }

    let site = kg_core::ids::site_hash(from, to_ref, rel_type, from, 1, 2, access_path);
    let site_again = kg_core::ids::site_hash(from, to_ref, rel_type, from, 1, 2, access_path);
    assert_eq!(site, site_again, "site_hash must be deterministic");

    let site_no_access = kg_core::ids::site_hash(from, to_ref, rel_type, from, 1, 2, None);
    if access_path.is_some() {
        assert_ne!(site, site_no_access, "access_path must affect site_hash");
    }

    let df = kg_core::ids::data_flow_id(from, rel_type, to_ref);
    assert!(df.starts_with("df_"));
    assert_eq!(df.len(), 3 + 12);

    let _ = kg_core::ids::is_plausible_entity_id(from);
});
