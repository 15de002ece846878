// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Entity and relationship model for the code knowledge graph.
//!
//! This crate defines the tagged-variant entity/relationship types (§3 of
//! the data model), canonical-id hashing (§4.1/§9), and the typed query
//! surface (§6.2) that the rest of the workspace builds on. It has no
//! knowledge of any particular store backend.

pub mod entity;
pub mod ids;
pub mod query;
pub mod relationship;
pub mod validate;

pub use entity::{Entity, EntityKind, Location, SymbolKind, SymbolVisibility};
pub use ids::{canonical_structural_id, data_flow_id, site_hash};
pub use query::{ImpactQuery, PathQuery, PathResult, RelationshipQuery, TraversalQuery};
pub use relationship::{
    CodeAttributes, ImportKind, Relationship, RelationshipType, ResolutionState, Target,
};
