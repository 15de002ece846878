// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz language adapter extension recognition with arbitrary extensions.
#![no_main]
use libfuzzer_sys::fuzz_target;

use kg_dialect::LanguageAdapterRegistry;

fuzz_target!(|data: &[u8]| {
    let Ok(extension) = std::str::from_utf8(data) else { return };
    let adapters = LanguageAdapterRegistry::with_defaults();

    if let Some(hint) = adapters.recognize(extension) {
        assert!(!hint.language_tag().is_empty(), "language_tag must not be empty on a match");
        if let Some(syntax) = hint.syntax_hint() {
            assert!(!syntax.is_empty());
        }
    }

    // normalize_module_path/normalize_import_alias must never panic on
    // arbitrary input either; they share the fuzz corpus.
    let _ = kg_dialect::normalize_module_path(extension);
    let _ = kg_dialect::normalize_import_alias(extension);
});
