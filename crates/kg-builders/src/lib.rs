// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Relationship builders (spec §4.2, component C4): the four builders that
//! turn one file's parsed declaration surface into raw `CONTAINS`/import/
//! call/reference/type relationships, ready for [`kg_normalizer::normalize`]
//! to canonicalize.
//!
//! Each builder is a pure function over a [`BuilderContext`] and a slice of
//! already-parsed input structs — a language front end owns the AST walk
//! and hands builders the shapes they need.

pub mod call;
pub mod import_export;
pub mod input;
pub mod reference;
pub mod support;
pub mod type_builder;

pub use call::{
    build_call_relationships, build_override_relationships, build_throws_relationships,
    CallExpression, MethodOverrideCandidate, ThrowStatement, MIN_INFERRED_CONFIDENCE,
    MUTATING_METHOD_NAMES,
};
pub use import_export::{build_import_relationship, ImportDeclaration, ImportForm};
pub use input::{
    BuilderContext, BuilderLimits, ImportMap, ImportSymbolMap, Loc, TypeCheckerResolver,
    AST_MIN_NAME_LENGTH, STOP_NAMES,
};
pub use reference::{
    build_reference_relationships, Assignment, IdentifierReference, Instantiation, LhsTarget,
    RhsRead,
};
pub use support::{
    build_code_relationship, resolution_state_for, resolve_call_target, resolve_reference_target,
    resolve_type_target, type_wire_name, Resolved,
};
pub use type_builder::{
    build_decorator_relationships, build_inheritance_relationships, build_signature_relationships,
    simple_type_name, Decorator, FunctionSignature, InheritanceClause, InheritanceKind, ParamType,
    TypeNode,
};
