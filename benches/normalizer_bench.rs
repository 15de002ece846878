// SPDX-License-Identifier: MIT OR Apache-2.0
//! Benchmarks for structural relationship normalization.

use std::collections::BTreeMap;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use kg_core::relationship::{CodeAttributes, Relationship, RelationshipType, Target};
use kg_dialect::LanguageAdapterRegistry;

fn import_rel(depth: usize) -> Relationship {
    let now = Utc::now();
    let module_path = "../".repeat(depth) + "lib/mod";
    Relationship {
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
            import_alias: Some(" Foo ".into()),
            to_ref: Some(Target::FileSymbol { file: "b.ts".into(), symbol: "foo".into() }),
            ..Default::default()
        }),
        valid_from: None,
        valid_to: None,
        last_seen_at: None,
        change_set_id: None,
    }
}

fn bench_normalize(c: &mut Criterion) {
    let adapters = LanguageAdapterRegistry::default();
    let mut group = c.benchmark_group("normalize");
    for depth in [1, 8, 32] {
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, &depth| {
            b.iter_batched(
                || import_rel(depth),
                |mut rel| kg_normalizer::normalize(&mut rel, &adapters).unwrap(),
                criterion::BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize);
criterion_main!(benches);
