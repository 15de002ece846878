//! Reference Builder (spec §4.2.3).

use std::collections::HashMap;

use kg_core::ids::data_flow_id;
use kg_core::relationship::{CodeAttributes, EdgeScope, EdgeSource, Relationship, RelationshipType, Target};
use kg_scorer::ScoreInput;

use crate::input::{BuilderContext, Loc};
use crate::support::{build_code_relationship, resolve_reference_target, Resolved};

const DEPENDS_ON_DEFAULT_CONFIDENCE: f64 = 0.6;

/// `new X(...)` (spec §4.2.3 "Instantiations").
#[derive(Debug, Clone)]
pub struct Instantiation {
    /// The constructed class's dotted expression.
    pub class_access_path: String,
    /// Location of the `new` expression.
    pub loc: Loc,
}

/// A bare identifier reference outside a call expression or import binding
/// (spec §4.2.3 "Identifier references").
#[derive(Debug, Clone)]
pub struct IdentifierReference {
    /// The identifier's name.
    pub name: String,
    /// Location of the reference.
    pub loc: Loc,
}

/// The left-hand side of an assignment (spec §4.2.3 "Assignments").
#[derive(Debug, Clone)]
pub enum LhsTarget {
    /// A bare identifier (`x = ...`).
    Identifier(String),
    /// A dotted property access (`a.b = ...`).
    PropertyAccess {
        /// The base/root identifier.
        base: String,
        /// The assigned property name.
        property: String,
        /// The full dotted access path.
        access_path: String,
    },
    /// A destructuring pattern, each entry a named binding
    /// (`const { a, b } = ...` / `[a, b] = ...`).
    Destructure(Vec<String>),
}

/// A single RHS identifier or property access read by an assignment (spec
/// §4.2.3 "RHS descendants emit READS").
#[derive(Debug, Clone)]
pub struct RhsRead {
    /// The simple name or full dotted access path.
    pub access_path: String,
    /// Location of the read.
    pub loc: Loc,
}

/// One parsed assignment expression (spec §4.2.3 "Assignments").
#[derive(Debug, Clone)]
pub struct Assignment {
    /// The assignment/compound-assignment operator (`=`, `+=`, ...).
    pub operator: String,
    /// The assignment target.
    pub lhs: LhsTarget,
    /// Identifiers/property accesses read on the right-hand side.
    pub rhs_reads: Vec<RhsRead>,
    /// Location of the assignment.
    pub loc: Loc,
}

struct Agg {
    rel_type: RelationshipType,
    resolved: Resolved,
    occurrences_scan: u32,
    earliest: Loc,
    access_path: Option<String>,
    kind: Option<&'static str>,
    operator: Option<String>,
    data_flow_id: Option<String>,
}

type AggKey = (RelationshipType, String);

fn aggregate(
    map: &mut HashMap<AggKey, Agg>,
    rel_type: RelationshipType,
    resolved: Resolved,
    loc: Loc,
    access_path: Option<String>,
    kind: Option<&'static str>,
    operator: Option<String>,
    data_flow_id: Option<String>,
) {
    let to_id = resolved.target.synthetic_id();
    let key = (rel_type, to_id);
    let entry = map.entry(key).or_insert_with(|| Agg {
        rel_type,
        resolved: resolved.clone(),
        occurrences_scan: 0,
        earliest: loc,
        access_path: access_path.clone(),
        kind,
        operator: operator.clone(),
        data_flow_id: data_flow_id.clone(),
    });
    entry.occurrences_scan += 1;
    if (loc.line, loc.column) < (entry.earliest.line, entry.earliest.column) {
        entry.earliest = loc;
    }
}

fn score_or_drop(
    ctx: &BuilderContext<'_>,
    rel_type: RelationshipType,
    resolved: &Resolved,
    name_length: usize,
    to_id: &str,
) -> Option<f64> {
    let s = kg_scorer::score(ScoreInput {
        relation_type: rel_type,
        used_type_checker: resolved.used_type_checker,
        is_exported: false,
        name_length,
        to_id,
        import_depth: None,
    });
    kg_scorer::meets_floor(s, ctx.limits.min_inferred_confidence).then_some(s)
}

/// Resolve an assignment's LHS property access per spec §4.2.3: type
/// checker first, then import-map deep resolution of `base`, then a
/// same-file unique `nameIndex` match on `property`, else
/// `external:<property>`.
fn resolve_assignment_property(ctx: &BuilderContext<'_>, base: &str, property: &str) -> Resolved {
    if let Some(tc) = ctx.type_checker {
        if ctx.take_budget() {
            if let Some(file) = tc.resolve_symbol_file(property) {
                return Resolved {
                    target: Target::FileSymbol {
                        file,
                        symbol: property.to_string(),
                    },
                    method: Some(kg_core::relationship::ResolutionMethod::TypeChecker),
                    scope: EdgeScope::Imported,
                    used_type_checker: true,
                };
            }
        }
    }

    if let Some(file) = ctx.import_map.get(base) {
        return Resolved {
            target: Target::FileSymbol {
                file: file.clone(),
                symbol: property.to_string(),
            },
            method: Some(kg_core::relationship::ResolutionMethod::ViaImport),
            scope: EdgeScope::Imported,
            used_type_checker: false,
        };
    }

    if let Some(id) = ctx.symbol_index.lookup_unique(property) {
        return Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(kg_core::relationship::ResolutionMethod::Heuristic),
            scope: EdgeScope::Unknown,
            used_type_checker: false,
        };
    }

    Resolved {
        target: Target::External {
            name: property.to_string(),
        },
        method: None,
        scope: EdgeScope::External,
        used_type_checker: false,
    }
}

/// Walk one file's instantiations, bare identifier references, and
/// assignments, aggregate by `(to, type)`, and flush `REFERENCES`/
/// `READS`/`WRITES`/`DEPENDS_ON` edges (spec §4.2.3).
#[must_use]
pub fn build_reference_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    enclosing_symbol_id: &str,
    instantiations: &[Instantiation],
    identifiers: &[IdentifierReference],
    assignments: &[Assignment],
) -> Vec<Relationship> {
    let mut agg: HashMap<AggKey, Agg> = HashMap::new();

    for inst in instantiations {
        let name = inst.class_access_path.rsplit('.').next().unwrap_or(&inst.class_access_path);
        if ctx.is_noise_name(name) {
            continue;
        }
        let resolved = resolve_reference_target(ctx, name);
        aggregate(
            &mut agg,
            RelationshipType::References,
            resolved,
            inst.loc,
            Some(inst.class_access_path.clone()),
            Some("instantiation"),
            None,
            None,
        );
    }

    for ident in identifiers {
        if ctx.is_noise_name(&ident.name) {
            continue;
        }
        let resolved = resolve_reference_target(ctx, &ident.name);
        aggregate(
            &mut agg,
            RelationshipType::References,
            resolved,
            ident.loc,
            Some(ident.name.clone()),
            None,
            None,
            None,
        );
    }

    for assignment in assignments {
        match &assignment.lhs {
            LhsTarget::Identifier(name) => {
                if !ctx.is_noise_name(name) {
                    let resolved = resolve_reference_target(ctx, name);
                    let dfid = data_flow_id(ctx.from_file, enclosing_symbol_id, name);
                    aggregate(
                        &mut agg,
                        RelationshipType::Writes,
                        resolved,
                        assignment.loc,
                        Some(name.clone()),
                        None,
                        Some(assignment.operator.clone()),
                        Some(dfid),
                    );
                }
            }
            LhsTarget::PropertyAccess {
                base,
                property,
                access_path,
            } => {
                if !ctx.is_noise_name(property) {
                    let resolved = resolve_assignment_property(ctx, base, property);
                    let dfid = data_flow_id(ctx.from_file, enclosing_symbol_id, property);
                    aggregate(
                        &mut agg,
                        RelationshipType::Writes,
                        resolved,
                        assignment.loc,
                        Some(access_path.clone()),
                        None,
                        Some(assignment.operator.clone()),
                        Some(dfid),
                    );
                }
            }
            LhsTarget::Destructure(names) => {
                for name in names {
                    if ctx.is_noise_name(name) {
                        continue;
                    }
                    let resolved = resolve_reference_target(ctx, name);
                    let dfid = data_flow_id(ctx.from_file, enclosing_symbol_id, name);
                    aggregate(
                        &mut agg,
                        RelationshipType::Writes,
                        resolved,
                        assignment.loc,
                        Some(name.clone()),
                        None,
                        Some(assignment.operator.clone()),
                        Some(dfid),
                    );
                }
            }
        }

        for read in &assignment.rhs_reads {
            let simple = read.access_path.rsplit('.').next().unwrap_or(&read.access_path);
            if ctx.is_noise_name(simple) {
                continue;
            }
            let resolved = resolve_reference_target(ctx, simple);
            let dfid = data_flow_id(ctx.from_file, enclosing_symbol_id, simple);
            aggregate(
                &mut agg,
                RelationshipType::Reads,
                resolved,
                read.loc,
                Some(read.access_path.clone()),
                None,
                None,
                Some(dfid),
            );
        }
    }

    let mut out = Vec::new();
    let mut depends_on_targets: HashMap<String, (Resolved, Loc)> = HashMap::new();

    for (_, entry) in agg {
        let name_length = entry
            .access_path
            .as_deref()
            .map_or(0, |p| p.rsplit('.').next().unwrap_or(p).chars().count());
        let to_id = entry.resolved.target.synthetic_id();

        if entry.resolved.scope == EdgeScope::Imported {
            depends_on_targets
                .entry(to_id.clone())
                .or_insert_with(|| (entry.resolved.clone(), entry.earliest));
        }

        let Some(confidence) = score_or_drop(ctx, entry.rel_type, &entry.resolved, name_length, &to_id) else {
            continue;
        };

        let attrs = CodeAttributes {
            kind: entry.kind.map(str::to_string),
            source: Some(EdgeSource::Ast),
            resolution: entry.resolved.method,
            scope: Some(entry.resolved.scope),
            confidence: Some(confidence),
            inferred: true,
            resolved: entry.resolved.target.is_resolved_kind(),
            active: true,
            occurrences_scan: entry.occurrences_scan,
            access_path: entry.access_path.clone(),
            operator: entry.operator.clone(),
            data_flow_id: entry.data_flow_id.clone(),
            to_ref: Some(entry.resolved.target.clone()),
            from_ref: Some(Target::Entity {
                id: from_entity_id.to_string(),
            }),
            ..Default::default()
        };

        out.push(build_code_relationship(
            ctx,
            from_entity_id,
            &to_id,
            entry.rel_type,
            entry.earliest,
            entry.access_path.as_deref(),
            attrs,
        ));
    }

    for (to_id, (resolved, loc)) in depends_on_targets {
        let attrs = CodeAttributes {
            kind: Some("dependency".to_string()),
            source: Some(EdgeSource::Ast),
            scope: Some(resolved.scope),
            confidence: Some(DEPENDS_ON_DEFAULT_CONFIDENCE),
            inferred: true,
            resolved: resolved.target.is_resolved_kind(),
            active: true,
            to_ref: Some(resolved.target.clone()),
            from_ref: Some(Target::Entity {
                id: from_entity_id.to_string(),
            }),
            ..Default::default()
        };
        out.push(build_code_relationship(
            ctx,
            from_entity_id,
            &to_id,
            RelationshipType::DependsOn,
            loc,
            None,
            attrs,
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_index::{SymbolIndex, TypeCheckerBudget};
    use std::collections::HashMap as Map;

    fn ctx<'a>(
        import_map: &'a Map<String, String>,
        import_symbol_map: &'a Map<String, String>,
        symbol_index: &'a SymbolIndex,
    ) -> BuilderContext<'a> {
        BuilderContext::new(
            "a.ts",
            chrono::Utc::now(),
            import_map,
            import_symbol_map,
            symbol_index,
            None,
            TypeCheckerBudget::new(0),
        )
    }

    #[test]
    fn instantiation_emits_references_with_instantiation_kind() {
        let import_map = Map::new();
        let import_symbol_map = Map::new();
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "Widget", "sym:a.ts:Widget");
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let insts = vec![Instantiation {
            class_access_path: "Widget".to_string(),
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_reference_relationships(&c, "sym:a.ts:f", "sym:a.ts:f", &insts, &[], &[]);
        let r = rels.iter().find(|r| r.r#type == RelationshipType::References).unwrap();
        assert_eq!(r.attrs.as_ref().unwrap().kind.as_deref(), Some("instantiation"));
    }

    #[test]
    fn identifier_assignment_emits_writes_with_data_flow_id() {
        let import_map = Map::new();
        let import_symbol_map = Map::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let assignments = vec![Assignment {
            operator: "=".to_string(),
            lhs: LhsTarget::Identifier("total".to_string()),
            rhs_reads: vec![],
            loc: Loc { line: 4, column: 2 },
        }];
        let rels = build_reference_relationships(&c, "sym:a.ts:f", "sym:a.ts:f", &[], &[], &assignments);
        let w = rels.iter().find(|r| r.r#type == RelationshipType::Writes).unwrap();
        let dfid = w.attrs.as_ref().unwrap().data_flow_id.clone().unwrap();
        assert!(dfid.starts_with("df_"));
    }

    #[test]
    fn destructure_emits_one_write_per_binding() {
        let import_map = Map::new();
        let import_symbol_map = Map::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let assignments = vec![Assignment {
            operator: "=".to_string(),
            lhs: LhsTarget::Destructure(vec!["alpha".to_string(), "beta".to_string()]),
            rhs_reads: vec![],
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_reference_relationships(&c, "sym:a.ts:f", "sym:a.ts:f", &[], &[], &assignments);
        assert_eq!(
            rels.iter().filter(|r| r.r#type == RelationshipType::Writes).count(),
            2
        );
    }

    #[test]
    fn imported_scope_synthesizes_one_depends_on() {
        let mut import_map = Map::new();
        import_map.insert("thing".to_string(), "thing.ts".to_string());
        let import_symbol_map = Map::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let idents = vec![
            IdentifierReference {
                name: "thing".to_string(),
                loc: Loc { line: 1, column: 0 },
            },
            IdentifierReference {
                name: "thing".to_string(),
                loc: Loc { line: 2, column: 0 },
            },
        ];
        let rels = build_reference_relationships(&c, "sym:a.ts:f", "sym:a.ts:f", &[], &idents, &[]);
        assert_eq!(
            rels.iter().filter(|r| r.r#type == RelationshipType::DependsOn).count(),
            1
        );
        let depends = rels.iter().find(|r| r.r#type == RelationshipType::DependsOn).unwrap();
        assert_eq!(depends.attrs.as_ref().unwrap().confidence, Some(0.6));
    }

    #[test]
    fn low_confidence_external_reference_is_dropped() {
        let import_map = Map::new();
        let import_symbol_map = Map::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        // "xy" resolves to external with name_length 2 -> base 0.6 - 0.15 (short) - 0.10 (external) = 0.35 < floor.
        let idents = vec![IdentifierReference {
            name: "xy".to_string(),
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_reference_relationships(&c, "sym:a.ts:f", "sym:a.ts:f", &[], &idents, &[]);
        assert!(rels.iter().all(|r| r.r#type != RelationshipType::References));
    }
}
