//! Call/Override/Throws Builder (spec §4.2.2).

use std::collections::HashMap;

use kg_core::relationship::{CodeAttributes, EdgeSource, Relationship, RelationshipType, Target};
use kg_scorer::ScoreInput;

use crate::input::{BuilderContext, Loc};
use crate::support::{build_code_relationship, resolve_call_target, resolve_reference_target, Resolved};

/// Resolve a thrown exception's type name per spec §4.2.2 "Throws":
/// `importMap`/`localIndex`/`nameIndex`, leaving a placeholder with
/// `ambiguous=true` when the name index yields more than one hit rather
/// than guessing which declaration is meant.
fn resolve_throw_target(ctx: &BuilderContext<'_>, name: &str) -> (Resolved, bool, usize) {
    let candidates = ctx.symbol_index.lookup_by_name(name);
    if candidates.len() > 1 {
        let resolved = Resolved {
            target: Target::Placeholder {
                placeholder_kind: "class".to_string(),
                name: name.to_string(),
            },
            method: None,
            scope: kg_core::relationship::EdgeScope::Unknown,
            used_type_checker: false,
        };
        return (resolved, true, candidates.len());
    }

    if let Some(file) = ctx.import_map.get(name) {
        let resolved = Resolved {
            target: Target::FileSymbol {
                file: file.clone(),
                symbol: name.to_string(),
            },
            method: Some(kg_core::relationship::ResolutionMethod::ViaImport),
            scope: kg_core::relationship::EdgeScope::Imported,
            used_type_checker: false,
        };
        return (resolved, false, candidates.len());
    }

    if let Some(id) = ctx.symbol_index.lookup_local(ctx.from_file, name) {
        let resolved = Resolved {
            target: Target::Entity { id: id.to_string() },
            method: Some(kg_core::relationship::ResolutionMethod::Direct),
            scope: kg_core::relationship::EdgeScope::Local,
            used_type_checker: false,
        };
        return (resolved, false, candidates.len());
    }

    if let Some(id) = candidates.first() {
        let resolved = Resolved {
            target: Target::Entity { id: id.clone() },
            method: Some(kg_core::relationship::ResolutionMethod::Heuristic),
            scope: kg_core::relationship::EdgeScope::Unknown,
            used_type_checker: false,
        };
        return (resolved, false, candidates.len());
    }

    (resolve_reference_target(ctx, name), false, candidates.len())
}

/// Minimum confidence an inferred edge must meet to be emitted (spec §4.3
/// `MIN_INFERRED_CONFIDENCE`, default 0.4).
pub const MIN_INFERRED_CONFIDENCE: f64 = 0.4;

/// Method names whose invocation on a resolvable base mutates that base in
/// place and therefore also emits a `WRITES` edge (spec §4.2.2 step 4).
pub const MUTATING_METHOD_NAMES: &[&str] = &[
    "push", "pop", "shift", "unshift", "splice", "sort", "reverse", "copyWithin", "fill", "set",
    "delete", "clear", "add",
];

/// One parsed call expression inside a function/method body (spec §4.2.2
/// input).
#[derive(Debug, Clone)]
pub struct CallExpression {
    /// The full dotted callee expression (e.g. `"a.b.c"`).
    pub target_name: String,
    /// The callee's final segment.
    pub simple_name: String,
    /// Number of call arguments.
    pub arity: u32,
    /// Whether the call's result is awaited (skipping parentheses).
    pub awaited: bool,
    /// Whether the callee is a property-access expression (`a.b()`).
    pub is_method: bool,
    /// Call-site location.
    pub loc: Loc,
}

/// The resolved callee root identifier (`"a"` in `"a.b.c()"`), needed to
/// target a `WRITES` edge when the call mutates its receiver in place.
fn base_identifier(target_name: &str) -> &str {
    target_name.split('.').next().unwrap_or(target_name)
}

struct Aggregated {
    resolved: Resolved,
    occurrences_scan: u32,
    earliest: Loc,
    access_path: String,
    arity: u32,
    awaited: bool,
    is_method: bool,
}

/// Apply [`kg_scorer::score`] and drop the edge if it falls below
/// `ctx.limits.min_inferred_confidence` (spec §4.2.3 "Confidence gate" —
/// applied uniformly to every inferred non-`CALLS` code edge built here).
fn score_gate(
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
    if kg_scorer::meets_floor(s, ctx.limits.min_inferred_confidence) {
        Some(s)
    } else {
        None
    }
}

/// Walk every call expression in one function/method body, aggregate by
/// `(from, to)`, and emit `CALLS`, `REFERENCES`, optional `DEPENDS_ON`, and
/// optional `WRITES` edges (spec §4.2.2).
#[must_use]
pub fn build_call_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    calls: &[CallExpression],
) -> Vec<Relationship> {
    let mut aggregated: HashMap<String, Aggregated> = HashMap::new();
    let mut out = Vec::new();

    for call in calls {
        if ctx.is_noise_name(&call.simple_name) {
            continue;
        }

        let resolved = resolve_call_target(ctx, &call.target_name, &call.simple_name);
        let to_id = resolved.target.synthetic_id();

        // Mutating-method WRITES edge, emitted per-occurrence rather than
        // aggregated (spec §4.2.2 step 4).
        if call.is_method && MUTATING_METHOD_NAMES.contains(&call.simple_name.as_str()) {
            let base = base_identifier(&call.target_name);
            let base_resolved = resolve_reference_target(ctx, base);
            let base_to_id = base_resolved.target.synthetic_id();
            if let Some(confidence) = score_gate(ctx, RelationshipType::Writes, &base_resolved, base.len(), &base_to_id) {
                let attrs = CodeAttributes {
                    kind: Some("write".to_string()),
                    source: Some(EdgeSource::Ast),
                    resolution: base_resolved.method,
                    scope: Some(base_resolved.scope),
                    confidence: Some(confidence),
                    inferred: true,
                    resolved: base_resolved.target.is_resolved_kind(),
                    active: true,
                    operator: Some("mutate".to_string()),
                    access_path: Some(call.target_name.clone()),
                    to_ref: Some(base_resolved.target.clone()),
                    from_ref: Some(Target::Entity {
                        id: from_entity_id.to_string(),
                    }),
                    ..Default::default()
                };
                out.push(build_code_relationship(
                    ctx,
                    from_entity_id,
                    &base_to_id,
                    RelationshipType::Writes,
                    call.loc,
                    Some(&call.target_name),
                    attrs,
                ));
            }
        }

        let entry = aggregated.entry(to_id.clone()).or_insert_with(|| Aggregated {
            resolved: resolved.clone(),
            occurrences_scan: 0,
            earliest: call.loc,
            access_path: call.target_name.clone(),
            arity: call.arity,
            awaited: call.awaited,
            is_method: call.is_method,
        });
        entry.occurrences_scan += 1;
        if (call.loc.line, call.loc.column) < (entry.earliest.line, entry.earliest.column) {
            entry.earliest = call.loc;
        }
    }

    for (to_id, agg) in aggregated {
        let name_length = agg.access_path.rsplit('.').next().unwrap_or(&agg.access_path).len();

        let calls_attrs = CodeAttributes {
            kind: Some("call".to_string()),
            source: Some(EdgeSource::Ast),
            resolution: agg.resolved.method,
            scope: Some(agg.resolved.scope),
            confidence: Some(kg_scorer::score(ScoreInput {
                relation_type: RelationshipType::Calls,
                used_type_checker: agg.resolved.used_type_checker,
                is_exported: false,
                name_length,
                to_id: &to_id,
                import_depth: None,
            })),
            inferred: true,
            resolved: agg.resolved.target.is_resolved_kind(),
            active: true,
            occurrences_scan: agg.occurrences_scan,
            access_path: Some(agg.access_path.clone()),
            callee: Some(agg.access_path.rsplit('.').next().unwrap_or(&agg.access_path).to_string()),
            arity: Some(agg.arity),
            awaited: Some(agg.awaited),
            is_method: Some(agg.is_method),
            to_ref: Some(agg.resolved.target.clone()),
            from_ref: Some(Target::Entity {
                id: from_entity_id.to_string(),
            }),
            ..Default::default()
        };
        out.push(build_code_relationship(
            ctx,
            from_entity_id,
            &to_id,
            RelationshipType::Calls,
            agg.earliest,
            Some(&agg.access_path),
            calls_attrs,
        ));

        if let Some(confidence) = score_gate(ctx, RelationshipType::References, &agg.resolved, name_length, &to_id) {
            let references_attrs = CodeAttributes {
                kind: Some("call-reference".to_string()),
                source: Some(EdgeSource::Ast),
                resolution: agg.resolved.method,
                scope: Some(agg.resolved.scope),
                confidence: Some(confidence),
                inferred: true,
                resolved: agg.resolved.target.is_resolved_kind(),
                active: true,
                occurrences_scan: agg.occurrences_scan,
                access_path: Some(agg.access_path.clone()),
                to_ref: Some(agg.resolved.target.clone()),
                from_ref: Some(Target::Entity {
                    id: from_entity_id.to_string(),
                }),
                ..Default::default()
            };
            out.push(build_code_relationship(
                ctx,
                from_entity_id,
                &to_id,
                RelationshipType::References,
                agg.earliest,
                Some(&agg.access_path),
                references_attrs,
            ));
        }

        if agg.resolved.scope == kg_core::relationship::EdgeScope::Imported {
            if let Some(confidence) = score_gate(ctx, RelationshipType::DependsOn, &agg.resolved, name_length, &to_id) {
                let depends_attrs = CodeAttributes {
                    kind: Some("dependency".to_string()),
                    source: Some(EdgeSource::Ast),
                    scope: Some(agg.resolved.scope),
                    confidence: Some(confidence),
                    inferred: true,
                    resolved: agg.resolved.target.is_resolved_kind(),
                    active: true,
                    to_ref: Some(agg.resolved.target.clone()),
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
                    agg.earliest,
                    Some(&agg.access_path),
                    depends_attrs,
                ));
            }
        }
    }

    out
}

/// One class method that may override a base-class method (spec §4.2.2
/// "Overrides").
#[derive(Debug, Clone)]
pub struct MethodOverrideCandidate {
    /// The overriding method's own entity id.
    pub method_entity_id: String,
    /// The method's simple name.
    pub method_name: String,
    /// The base class's simple name (from the `extends` clause).
    pub base_class_name: String,
    /// Location of the method declaration.
    pub loc: Loc,
}

/// Emit an `OVERRIDES` edge for each candidate whose base class's same-name
/// method can be resolved (spec §4.2.2 "Overrides").
#[must_use]
pub fn build_override_relationships(
    ctx: &BuilderContext<'_>,
    candidates: &[MethodOverrideCandidate],
) -> Vec<Relationship> {
    candidates
        .iter()
        .map(|candidate| {
            // Prefer a concrete hit via the global name index over the
            // `file:<base>:<method>` placeholder form (spec §4.2.2).
            let resolved = if let Some(id) = ctx.symbol_index.lookup_unique(&candidate.method_name) {
                Resolved {
                    target: Target::Entity { id: id.to_string() },
                    method: Some(kg_core::relationship::ResolutionMethod::Heuristic),
                    scope: kg_core::relationship::EdgeScope::Unknown,
                    used_type_checker: false,
                }
            } else {
                crate::support::resolve_type_target(ctx, &candidate.base_class_name, "class")
            };
            let to_id = match &resolved.target {
                Target::Entity { id } => id.clone(),
                other => format!("{}:{}", other.synthetic_id(), candidate.method_name),
            };

            let attrs = CodeAttributes {
                kind: Some("override".to_string()),
                source: Some(if resolved.used_type_checker {
                    EdgeSource::TypeChecker
                } else {
                    EdgeSource::Ast
                }),
                resolution: resolved.method,
                scope: Some(resolved.scope),
                confidence: Some(0.9),
                inferred: false,
                resolved: resolved.target.is_resolved_kind(),
                active: true,
                to_ref: Some(resolved.target.clone()),
                from_ref: Some(Target::Entity {
                    id: candidate.method_entity_id.clone(),
                }),
                ..Default::default()
            };

            build_code_relationship(
                ctx,
                &candidate.method_entity_id,
                &to_id,
                RelationshipType::Overrides,
                candidate.loc,
                None,
                attrs,
            )
        })
        .collect()
}

/// One parsed `throw` statement (spec §4.2.2 "Throws").
#[derive(Debug, Clone)]
pub struct ThrowStatement {
    /// The thrown exception's simple type name.
    pub exception_type_name: String,
    /// Location of the `throw` site.
    pub loc: Loc,
}

/// Emit a `THROWS` edge per throw statement, marking ambiguous resolutions
/// (spec §4.2.2 "Throws").
#[must_use]
pub fn build_throws_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    throws: &[ThrowStatement],
) -> Vec<Relationship> {
    throws
        .iter()
        .map(|t| {
            let (resolved, ambiguous, candidate_count) = resolve_throw_target(ctx, &t.exception_type_name);
            let to_id = resolved.target.synthetic_id();

            let attrs = CodeAttributes {
                kind: Some("throw".to_string()),
                source: Some(EdgeSource::Ast),
                resolution: resolved.method,
                scope: Some(resolved.scope),
                confidence: Some(0.8),
                inferred: true,
                resolved: resolved.target.is_resolved_kind(),
                active: true,
                ambiguous: Some(ambiguous),
                candidate_count: if ambiguous { Some(candidate_count as u32) } else { None },
                to_ref: Some(resolved.target.clone()),
                from_ref: Some(Target::Entity {
                    id: from_entity_id.to_string(),
                }),
                ..Default::default()
            };

            build_code_relationship(
                ctx,
                from_entity_id,
                &to_id,
                RelationshipType::Throws,
                t.loc,
                None,
                attrs,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kg_index::{SymbolIndex, TypeCheckerBudget};
    use std::collections::HashMap;

    fn ctx<'a>(
        import_map: &'a HashMap<String, String>,
        import_symbol_map: &'a HashMap<String, String>,
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
    fn noise_names_are_skipped() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let calls = vec![CallExpression {
            target_name: "log".to_string(),
            simple_name: "log".to_string(),
            arity: 1,
            awaited: false,
            is_method: false,
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_call_relationships(&c, "sym:a.ts:f", &calls);
        assert!(rels.is_empty());
    }

    #[test]
    fn repeated_calls_aggregate_occurrences() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "helper", "sym:a.ts:helper");
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let calls = vec![
            CallExpression {
                target_name: "helper".to_string(),
                simple_name: "helper".to_string(),
                arity: 0,
                awaited: false,
                is_method: false,
                loc: Loc { line: 5, column: 0 },
            },
            CallExpression {
                target_name: "helper".to_string(),
                simple_name: "helper".to_string(),
                arity: 0,
                awaited: false,
                is_method: false,
                loc: Loc { line: 2, column: 0 },
            },
        ];
        let rels = build_call_relationships(&c, "sym:a.ts:f", &calls);
        let calls_edge = rels
            .iter()
            .find(|r| r.r#type == RelationshipType::Calls)
            .unwrap();
        assert_eq!(calls_edge.attrs.as_ref().unwrap().occurrences_scan, 2);
        assert_eq!(calls_edge.locations[0].line, 2);
    }

    #[test]
    fn mutating_method_emits_writes_edge() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "items", "sym:a.ts:items");
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let calls = vec![CallExpression {
            target_name: "items.push".to_string(),
            simple_name: "push".to_string(),
            arity: 1,
            awaited: false,
            is_method: true,
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_call_relationships(&c, "sym:a.ts:f", &calls);
        assert!(rels.iter().any(|r| r.r#type == RelationshipType::Writes));
    }

    #[test]
    fn imported_scope_emits_depends_on() {
        let mut import_map = HashMap::new();
        import_map.insert("util".to_string(), "util.ts".to_string());
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let calls = vec![CallExpression {
            target_name: "util.run".to_string(),
            simple_name: "run".to_string(),
            arity: 0,
            awaited: false,
            is_method: true,
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_call_relationships(&c, "sym:a.ts:f", &calls);
        assert!(rels.iter().any(|r| r.r#type == RelationshipType::DependsOn));
    }

    #[test]
    fn ambiguous_throw_records_candidate_count() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let mut idx = SymbolIndex::new();
        idx.insert("a.ts", "MyError", "sym:a.ts:MyError");
        idx.insert("b.ts", "MyError", "sym:b.ts:MyError");
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let throws = vec![ThrowStatement {
            exception_type_name: "MyError".to_string(),
            loc: Loc { line: 1, column: 0 },
        }];
        let rels = build_throws_relationships(&c, "sym:a.ts:f", &throws);
        let attrs = rels[0].attrs.as_ref().unwrap();
        assert_eq!(attrs.ambiguous, Some(true));
        assert_eq!(attrs.candidate_count, Some(2));
    }
}
