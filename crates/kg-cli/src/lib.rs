// SPDX-License-Identifier: MIT OR Apache-2.0
//! Library-level pieces of the knowledge graph CLI, split out from
//! `main.rs` so they can be unit-tested without spawning the binary.

pub mod commands;
pub mod format;
