// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fuzz the confidence scorer across arbitrary relationship-type/name/id
//! combinations, checking the score always lands in [0.0, 1.0].
#![no_main]
use libfuzzer_sys::fuzz_target;

use kg_core::relationship::RelationshipType;
use kg_scorer::{meets_floor, score, ScoreInput};

const TYPES: &[RelationshipType] = &[
    RelationshipType::Calls,
    RelationshipType::References,
    RelationshipType::Reads,
    RelationshipType::Writes,
    RelationshipType::Throws,
    RelationshipType::TypeUses,
];

fuzz_target!(|data: &[u8]| {
    if data.len() < 4 {
        return;
    }
    let Ok(to_id) = std::str::from_utf8(&data[4..]) else { return };
    let relation_type = TYPES[data[0] as usize % TYPES.len()];
    let used_type_checker = data[1] & 1 == 1;
    let is_exported = data[1] & 2 == 2;
    let name_length = data[2] as usize;
    let import_depth = if data[3] == 0xff { None } else { Some(u32::from(data[3])) };

    let s = score(ScoreInput { relation_type, used_type_checker, is_exported, name_length, to_id, import_depth });
    assert!((0.0..=1.0).contains(&s), "score out of range: {s}");
    let _ = meets_floor(s, 0.4);
});
