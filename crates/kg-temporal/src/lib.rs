// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Temporal history engine (spec §4.6, component C8): version chains,
//! edge open/close lifecycle, and checkpoint materialization over a
//! [`kg_graph_store::GraphStore`].
//!
//! Every operation here is a thin orchestration over the store's existing
//! bulk-write and query surface (C6) — this crate adds no storage of its
//! own, only the sequencing spec §4.6 and §5 describe.

pub mod checkpoint;
pub mod edge;
pub mod support;
pub mod version;

pub use checkpoint::{
    annotate_session_relationships_with_checkpoint, create_checkpoint,
    create_session_checkpoint_link, CheckpointParams,
};
pub use edge::{close_edge, mark_inactive_edges_not_seen_since, open_edge};
pub use version::{append_version, repair_previous_version_link};
