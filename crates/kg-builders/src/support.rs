//! Resolution cascades and relationship-construction helpers shared by all
//! four builders (spec §4.2).

use std::collections::BTreeMap;

use kg_core::ids::site_hash;
use kg_core::relationship::{
    CodeAttributes, EdgeScope, ResolutionMethod, ResolutionState, Relationship, RelationshipType,
    Site, Target,
};

use crate::input::{BuilderContext, Loc};

/// Outcome of resolving a name to a relationship target: the target itself
/// plus the provenance needed to populate [`CodeAttributes`].
#[derive(Debug, Clone)]
pub struct Resolved {
    /// The resolved (or placeholder) target.
    pub target: Target,
    /// How it was resolved, when resolution succeeded via a cascade step
    /// that has a [`ResolutionMethod`] equivalent.
    pub method: Option<ResolutionMethod>,
    /// Lexical scope implied by the resolution step that matched.
    pub scope: EdgeScope,
    /// Whether a type-checker call contributed to this resolution.
    pub used_type_checker: bool,
}

/// Resolve a call target per spec §4.2.2 steps (a)-(e).
///
/// `target_name` is the full dotted callee expression (e.g. `"a.b.c"`);
/// `simple_name` is its final segment.
#[must_use]
pub fn resolve_call_target(ctx: &BuilderContext<'_>, target_name: &str, simple_name: &str) -> Resolved {
    let root = target_name.split('.').next().unwrap_or(target_name);

    // (a) dotted member whose root is in importMap.
    if target_name.contains('.') {
        if let Some(file) = ctx.import_map.get(root) {
            return Resolved {
                target: Target::FileSymbol {
                    file: file.clone(),
                    symbol: simple_name.to_string(),
                },
                method: Some(ResolutionMethod::ViaImport),
                scope: EdgeScope::Imported,
                used_type_checker: false,
            };
        }
    }

    // (b) root alias in importMap (non-dotted import usage).
    if let Some(file) = ctx.import_map.get(root) {
        return Resolved {
            target: Target::FileSymbol {
                file: file.clone(),
                symbol: simple_name.to_string(),
            },
            method: Some(ResolutionMethod::ViaImport),
            scope: EdgeScope::Imported,
            used_type_checker: false,
        };
    }

    // (c) localIndex hit.
    if let Some(id) = ctx.symbol_index.lookup_local(ctx.from_file, simple_name) {
        return Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(ResolutionMethod::Direct),
            scope: EdgeScope::Local,
            used_type_checker: false,
        };
    }

    // (d) budgeted type-checker.
    if let Some(tc) = ctx.type_checker {
        if ctx.take_budget() {
            if let Some(file) = tc.resolve_symbol_file(simple_name) {
                return Resolved {
                    target: Target::FileSymbol {
                        file,
                        symbol: simple_name.to_string(),
                    },
                    method: Some(ResolutionMethod::TypeChecker),
                    scope: EdgeScope::Imported,
                    used_type_checker: true,
                };
            }
        }
    }

    // (e) fallback.
    Resolved {
        target: Target::External {
            name: simple_name.to_string(),
        },
        method: None,
        scope: EdgeScope::External,
        used_type_checker: false,
    }
}

/// Resolve a plain identifier/instantiation reference per spec §4.2.3:
/// importMap (via `importSymbolMap` deep-export resolution) → localIndex →
/// budgeted type-checker → `external:<name>`.
#[must_use]
pub fn resolve_reference_target(ctx: &BuilderContext<'_>, name: &str) -> Resolved {
    if let Some(file) = ctx.import_map.get(name) {
        let symbol = ctx
            .import_symbol_map
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string());
        return Resolved {
            target: Target::FileSymbol {
                file: file.clone(),
                symbol,
            },
            method: Some(ResolutionMethod::ViaImport),
            scope: EdgeScope::Imported,
            used_type_checker: false,
        };
    }

    if let Some(id) = ctx.symbol_index.lookup_local(ctx.from_file, name) {
        return Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(ResolutionMethod::Direct),
            scope: EdgeScope::Local,
            used_type_checker: false,
        };
    }

    if let Some(tc) = ctx.type_checker {
        if ctx.take_budget() {
            if let Some(file) = tc.resolve_symbol_file(name) {
                return Resolved {
                    target: Target::FileSymbol {
                        file,
                        symbol: name.to_string(),
                    },
                    method: Some(ResolutionMethod::TypeChecker),
                    scope: EdgeScope::Imported,
                    used_type_checker: true,
                };
            }
        }
    }

    Resolved {
        target: Target::External {
            name: name.to_string(),
        },
        method: None,
        scope: EdgeScope::External,
        used_type_checker: false,
    }
}

/// Resolve an inheritance/decorator target per spec §4.2.4: localIndex →
/// importMap → budgeted type-checker → `<placeholder_kind>:<name>`.
#[must_use]
pub fn resolve_type_target(ctx: &BuilderContext<'_>, name: &str, placeholder_kind: &str) -> Resolved {
    if let Some(id) = ctx.symbol_index.lookup_local(ctx.from_file, name) {
        return Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(ResolutionMethod::Direct),
            scope: EdgeScope::Local,
            used_type_checker: false,
        };
    }

    if let Some(file) = ctx.import_map.get(name) {
        return Resolved {
            target: Target::FileSymbol {
                file: file.clone(),
                symbol: name.to_string(),
            },
            method: Some(ResolutionMethod::ViaImport),
            scope: EdgeScope::Imported,
            used_type_checker: false,
        };
    }

    if let Some(tc) = ctx.type_checker {
        if ctx.take_budget() {
            if let Some(file) = tc.resolve_symbol_file(name) {
                return Resolved {
                    target: Target::FileSymbol {
                        file,
                        symbol: name.to_string(),
                    },
                    method: Some(ResolutionMethod::TypeChecker),
                    scope: EdgeScope::Imported,
                    used_type_checker: true,
                };
            }
        }
    }

    // promotion check: a unique nameIndex hit upgrades the placeholder.
    if let Some(id) = ctx.symbol_index.lookup_unique(name) {
        return Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(ResolutionMethod::Heuristic),
            scope: EdgeScope::Unknown,
            used_type_checker: false,
        };
    }

    Resolved {
        target: Target::Placeholder {
            placeholder_kind: placeholder_kind.to_string(),
            name: name.to_string(),
        },
        method: None,
        scope: EdgeScope::Unknown,
        used_type_checker: false,
    }
}

/// `resolutionState` implied by a [`Resolved`] target (spec invariant 5:
/// `resolutionState=resolved ⇒ toRef.kind ∈ {entity, fileSymbol}`).
#[must_use]
pub fn resolution_state_for(resolved: &Resolved) -> ResolutionState {
    if resolved.target.is_resolved_kind() {
        ResolutionState::Resolved
    } else {
        ResolutionState::Unresolved
    }
}

/// Build a code-group [`Relationship`] from its resolved target and
/// attributes. The id and `siteHash` are both derived from the same
/// salient-attribute hash (spec line "canonical id is a deterministic hash
/// of (fromEntityId, toEntityId, type, salient attributes)"); the id is
/// distinguished from the bare hash with a `rel_` prefix so it cannot be
/// confused with a `time-rel_` structural id.
#[must_use]
pub fn build_code_relationship(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    to_entity_id_for_hash: &str,
    rel_type: RelationshipType,
    loc: Loc,
    access_path: Option<&str>,
    attrs: CodeAttributes,
) -> Relationship {
    let hash = site_hash(
        from_entity_id,
        to_entity_id_for_hash,
        type_wire_name(rel_type),
        ctx.from_file,
        loc.line,
        loc.column,
        access_path,
    );
    let site = Site {
        path: ctx.from_file.to_string(),
        line: loc.line,
        column: loc.column,
        access_path: access_path.map(str::to_string),
    };

    Relationship {
        id: format!("rel_{hash}"),
        from_entity_id: from_entity_id.to_string(),
        to_entity_id: to_entity_id_for_hash.to_string(),
        r#type: rel_type,
        created: ctx.now,
        last_modified: ctx.now,
        version: 1,
        metadata: BTreeMap::new(),
        site_id: Some(format!("site_{hash}")),
        site_hash: Some(hash),
        evidence: Vec::new(),
        locations: vec![site.clone()],
        sites: vec![site],
        attrs: Some(attrs),
        valid_from: Some(ctx.now),
        valid_to: None,
        last_seen_at: Some(ctx.now),
        change_set_id: None,
    }
}

/// The `SCREAMING_SNAKE_CASE` wire name of a [`RelationshipType`], used as
/// hash input so the id is sensitive to the edge's type (matches the
/// serialization format so `site_hash`'s input is stable across restarts).
#[must_use]
pub fn type_wire_name(rel_type: RelationshipType) -> &'static str {
    use RelationshipType as T;
    match rel_type {
        T::Contains => "CONTAINS",
        T::Defines => "DEFINES",
        T::Exports => "EXPORTS",
        T::Imports => "IMPORTS",
        T::Calls => "CALLS",
        T::References => "REFERENCES",
        T::Implements => "IMPLEMENTS",
        T::Extends => "EXTENDS",
        T::DependsOn => "DEPENDS_ON",
        T::Overrides => "OVERRIDES",
        T::Reads => "READS",
        T::Writes => "WRITES",
        T::Throws => "THROWS",
        T::TypeUses => "TYPE_USES",
        T::ReturnsType => "RETURNS_TYPE",
        T::ParamType => "PARAM_TYPE",
        T::Tests => "TESTS",
        T::Validates => "VALIDATES",
        T::Requires => "REQUIRES",
        T::Impacts => "IMPACTS",
        T::ImplementsSpec => "IMPLEMENTS_SPEC",
        T::PreviousVersion => "PREVIOUS_VERSION",
        T::ModifiedBy => "MODIFIED_BY",
        T::CreatedIn => "CREATED_IN",
        T::ModifiedIn => "MODIFIED_IN",
        T::RemovedIn => "REMOVED_IN",
        T::Of => "OF",
        T::DescribesDomain => "DESCRIBES_DOMAIN",
        T::BelongsToDomain => "BELONGS_TO_DOMAIN",
        T::DocumentedBy => "DOCUMENTED_BY",
        T::ClusterMember => "CLUSTER_MEMBER",
        T::DomainRelated => "DOMAIN_RELATED",
        T::GovernedBy => "GOVERNED_BY",
        T::DocumentsSection => "DOCUMENTS_SECTION",
        T::HasSecurityIssue => "HAS_SECURITY_ISSUE",
        T::DependsOnVulnerable => "DEPENDS_ON_VULNERABLE",
        T::SecurityImpacts => "SECURITY_IMPACTS",
        T::PerformanceImpact => "PERFORMANCE_IMPACT",
        T::PerformanceRegression => "PERFORMANCE_REGRESSION",
        T::CoverageProvides => "COVERAGE_PROVIDES",
        T::SessionModified => "SESSION_MODIFIED",
        T::SessionImpacted => "SESSION_IMPACTED",
        T::SessionCheckpoint => "SESSION_CHECKPOINT",
        T::BrokeIn => "BROKE_IN",
        T::FixedIn => "FIXED_IN",
        T::DependsOnChange => "DEPENDS_ON_CHANGE",
        T::CheckpointIncludes => "CHECKPOINT_INCLUDES",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_index::{SymbolIndex, TypeCheckerBudget};
    use std::collections::HashMap;

    fn ctx<'a>(
        from_file: &'a str,
        import_map: &'a HashMap<String, String>,
        import_symbol_map: &'a HashMap<String, String>,
        symbol_index: &'a SymbolIndex,
    ) -> BuilderContext<'a> {
        BuilderContext::new(
            from_file,
            chrono::Utc::now(),
            import_map,
            import_symbol_map,
            symbol_index,
            None,
            TypeCheckerBudget::new(0),
        )
    }

    #[test]
    fn call_target_prefers_import_map_for_dotted_root() {
        let mut import_map = HashMap::new();
        import_map.insert("fs".to_string(), "node:fs".to_string());
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let r = resolve_call_target(&c, "fs.readFile", "readFile");
        assert_eq!(
            r.target,
            Target::FileSymbol {
                file: "node:fs".to_string(),
                symbol: "readFile".to_string()
            }
        );
        assert_eq!(r.scope, EdgeScope::Imported);
    }

    #[test]
    fn call_target_falls_back_to_local_index() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "helper", "sym:a.ts:helper");
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let r = resolve_call_target(&c, "helper", "helper");
        assert_eq!(
            r.target,
            Target::Entity {
                id: "sym:a.ts:helper".to_string()
            }
        );
    }

    #[test]
    fn call_target_falls_back_to_external() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let r = resolve_call_target(&c, "mystery", "mystery");
        assert_eq!(
            r.target,
            Target::External {
                name: "mystery".to_string()
            }
        );
        assert_eq!(r.scope, EdgeScope::External);
    }

    #[test]
    fn type_target_promotes_on_unique_name_index_hit() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let mut idx = SymbolIndex::new();
        idx.insert("other.ts", "Base", "sym:other.ts:Base");
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let r = resolve_type_target(&c, "Base", "class");
        assert_eq!(
            r.target,
            Target::Entity {
                id: "sym:other.ts:Base".to_string()
            }
        );
    }

    #[test]
    fn type_target_placeholder_when_unresolvable() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let r = resolve_type_target(&c, "Unknown", "class");
        assert_eq!(
            r.target,
            Target::Placeholder {
                placeholder_kind: "class".to_string(),
                name: "Unknown".to_string()
            }
        );
    }

    #[test]
    fn resolution_state_matches_target_kind() {
        let entity = Resolved {
            target: Target::Entity { id: "x".into() },
            method: None,
            scope: EdgeScope::Local,
            used_type_checker: false,
        };
        let placeholder = Resolved {
            target: Target::Placeholder {
                placeholder_kind: "class".into(),
                name: "x".into(),
            },
            method: None,
            scope: EdgeScope::Unknown,
            used_type_checker: false,
        };
        assert_eq!(resolution_state_for(&entity), ResolutionState::Resolved);
        assert_eq!(
            resolution_state_for(&placeholder),
            ResolutionState::Unresolved
        );
    }

    #[test]
    fn build_code_relationship_id_is_deterministic() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx("a.ts", &import_map, &import_symbol_map, &idx);
        let attrs = CodeAttributes::default();
        let a = build_code_relationship(
            &c,
            "sym:a.ts:f",
            "external:g",
            RelationshipType::Calls,
            Loc { line: 1, column: 0 },
            None,
            attrs.clone(),
        );
        let b = build_code_relationship(
            &c,
            "sym:a.ts:f",
            "external:g",
            RelationshipType::Calls,
            Loc { line: 1, column: 0 },
            None,
            attrs,
        );
        assert_eq!(a.id, b.id);
        assert!(a.id.starts_with("rel_"));
    }
}
