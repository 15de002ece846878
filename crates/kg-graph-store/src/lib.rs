// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Graph store adapter (spec §4.4, component C6): entity/edge upserts with
//! idempotent MERGE semantics, structural columnar fields, backfill
//! diffing, vector collections, and transactional bulk writes.
//!
//! This crate defines the store-agnostic [`GraphStore`] trait and its
//! shared helpers; a concrete backend (graph database driver) implements
//! the trait and calls [`run_bulk_batch`] to get the transaction/telemetry
//! semantics for free. [`memory::InMemoryGraphStore`] is one such backend,
//! kept in-tree as the reference implementation everything else in the
//! workspace runs against.

pub mod backfill;
pub mod memory;
pub mod store;
pub mod structural;
pub mod vector;

pub use backfill::{compute_backfill, Backfill, FieldChange};
pub use memory::InMemoryGraphStore;
pub use store::{run_bulk_batch, BulkOptions, BulkQuery, BulkResult, GraphStore, QueryOutcome};
pub use structural::{extract_structural_fields, stable_stringify, StructuralFields};
pub use vector::{VectorCollection, VectorHit, VectorRecord, VECTOR_DIMENSIONS};
