//! Type Builder (spec §4.2.4).

use kg_core::relationship::{CodeAttributes, EdgeScope, EdgeSource, Relationship, RelationshipType, ResolutionMethod, Target};
use kg_scorer::ScoreInput;

use crate::input::{BuilderContext, Loc};
use crate::support::{build_code_relationship, resolve_reference_target, resolve_type_target, Resolved};

/// `extends` or `implements` (spec §4.2.4 "Inheritance").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InheritanceKind {
    /// `class A extends B`.
    Extends,
    /// `class A implements B`.
    Implements,
}

/// One `extends`/`implements` clause.
#[derive(Debug, Clone)]
pub struct InheritanceClause {
    /// The base class or interface's simple name.
    pub base_name: String,
    /// Which relation this clause implies.
    pub kind: InheritanceKind,
    /// Location of the clause.
    pub loc: Loc,
}

/// One decorator application (spec §4.2.4 "Decorators").
#[derive(Debug, Clone)]
pub struct Decorator {
    /// The decorator function's simple name.
    pub decorator_name: String,
    /// The full decorator expression as written (e.g. `@Injectable()`).
    pub access_path: String,
    /// Location of the decorator.
    pub loc: Loc,
}

/// A type annotation as written, or the raw string the type checker infers
/// in its absence — generics/unions/intersections are stripped by
/// [`simple_type_name`] before lookup either way.
#[derive(Debug, Clone)]
pub struct TypeNode {
    /// The raw annotation text (e.g. `"Array<Item>"`, `"string | number"`).
    pub raw_name: String,
}

/// One declared function parameter (spec §4.2.4 "Function signatures").
#[derive(Debug, Clone)]
pub struct ParamType {
    /// The parameter's name.
    pub param_name: String,
    /// Its declared type node, when annotated.
    pub type_node: Option<TypeNode>,
}

/// A function/method signature's parameter and return type nodes.
#[derive(Debug, Clone)]
pub struct FunctionSignature {
    /// Declared parameters, in order.
    pub params: Vec<ParamType>,
    /// The declared return type node, when annotated.
    pub return_type: Option<TypeNode>,
    /// Location of the signature (the function/method declaration).
    pub loc: Loc,
}

/// Strip generics (`<...>`), unions (`|`), and intersections (`&`) from a
/// type annotation, keeping only the leading symbol name (spec §4.2.4
/// "stripping generics, unions, and intersections before lookup").
#[must_use]
pub fn simple_type_name(raw: &str) -> &str {
    let mut end = raw.len();
    for marker in ['<', '|', '&'] {
        if let Some(idx) = raw.find(marker) {
            end = end.min(idx);
        }
    }
    raw[..end].trim()
}

/// `DEPENDS_ON` confidence tier for a parameter type dependency, keyed by
/// resolution scope (spec §4.2.4 "confidence {local:0.9, imported:0.6,
/// external:0.4}").
fn depends_on_confidence(scope: EdgeScope) -> f64 {
    match scope {
        EdgeScope::Local => 0.9,
        EdgeScope::Imported => 0.6,
        _ => 0.4,
    }
}

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
    kg_scorer::meets_floor(s, ctx.limits.min_inferred_confidence).then_some(s)
}

/// Resolve one type node, or — when absent — the type checker's inferred
/// type at `inference_key`, returning the resolution plus the simple name
/// that was looked up (spec §4.2.4 "When a type node is absent, fall back
/// to the type-checker's inferred type").
fn resolve_explicit_or_inferred(
    ctx: &BuilderContext<'_>,
    type_node: Option<&TypeNode>,
    inference_key: &str,
) -> Option<(Resolved, bool, String)> {
    if let Some(node) = type_node {
        let name = simple_type_name(&node.raw_name).to_string();
        if ctx.is_noise_name(&name) {
            return None;
        }
        return Some((resolve_type_target(ctx, &name, "type"), false, name));
    }

    let tc = ctx.type_checker?;
    if !ctx.take_budget() {
        return None;
    }
    let inferred_raw = tc.inferred_type_name(inference_key)?;
    let name = simple_type_name(&inferred_raw).to_string();
    if ctx.is_noise_name(&name) {
        return None;
    }
    let mut resolved = resolve_type_target(ctx, &name, "type");
    resolved.used_type_checker = true;
    resolved.method = Some(ResolutionMethod::TypeChecker);
    Some((resolved, true, name))
}

/// Emit `EXTENDS`/`IMPLEMENTS` for each inheritance clause (spec §4.2.4
/// "Inheritance").
#[must_use]
pub fn build_inheritance_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    clauses: &[InheritanceClause],
) -> Vec<Relationship> {
    clauses
        .iter()
        .filter(|c| !ctx.is_noise_name(&c.base_name))
        .map(|clause| {
            let placeholder_kind = match clause.kind {
                InheritanceKind::Extends => "class",
                InheritanceKind::Implements => "interface",
            };
            let resolved = resolve_type_target(ctx, &clause.base_name, placeholder_kind);
            let to_id = resolved.target.synthetic_id();
            let rel_type = match clause.kind {
                InheritanceKind::Extends => RelationshipType::Extends,
                InheritanceKind::Implements => RelationshipType::Implements,
            };

            let attrs = CodeAttributes {
                kind: Some(placeholder_kind.to_string()),
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
                    id: from_entity_id.to_string(),
                }),
                ..Default::default()
            };

            build_code_relationship(ctx, from_entity_id, &to_id, rel_type, clause.loc, None, attrs)
        })
        .collect()
}

/// Emit `REFERENCES` (`kind=decorator`) for each decorator application,
/// dropping ones that fall below the confidence floor (spec §4.2.4
/// "Decorators").
#[must_use]
pub fn build_decorator_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    decorators: &[Decorator],
) -> Vec<Relationship> {
    decorators
        .iter()
        .filter(|d| !ctx.is_noise_name(&d.decorator_name))
        .filter_map(|d| {
            let resolved = resolve_reference_target(ctx, &d.decorator_name);
            let to_id = resolved.target.synthetic_id();
            let confidence = score_gate(
                ctx,
                RelationshipType::References,
                &resolved,
                d.decorator_name.chars().count(),
                &to_id,
            )?;

            let attrs = CodeAttributes {
                kind: Some("decorator".to_string()),
                source: Some(if resolved.used_type_checker {
                    EdgeSource::TypeChecker
                } else {
                    EdgeSource::Ast
                }),
                resolution: resolved.method,
                scope: Some(resolved.scope),
                confidence: Some(confidence),
                inferred: true,
                resolved: resolved.target.is_resolved_kind(),
                active: true,
                access_path: Some(d.access_path.clone()),
                to_ref: Some(resolved.target.clone()),
                from_ref: Some(Target::Entity {
                    id: from_entity_id.to_string(),
                }),
                ..Default::default()
            };

            Some(build_code_relationship(
                ctx,
                from_entity_id,
                &to_id,
                RelationshipType::References,
                d.loc,
                Some(&d.access_path),
                attrs,
            ))
        })
        .collect()
}

/// Emit `PARAM_TYPE`/`DEPENDS_ON` per declared parameter and `RETURNS_TYPE`
/// for the return type, falling back to the type checker's inferred type
/// when a node is absent (spec §4.2.4 "Function signatures").
#[must_use]
pub fn build_signature_relationships(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    signature: &FunctionSignature,
) -> Vec<Relationship> {
    let mut out = Vec::new();

    for param in &signature.params {
        if ctx.is_noise_name(&param.param_name) {
            continue;
        }
        let Some((resolved, used_tc, type_name)) =
            resolve_explicit_or_inferred(ctx, param.type_node.as_ref(), &param.param_name)
        else {
            continue;
        };
        let to_id = resolved.target.synthetic_id();
        let name_length = type_name.chars().count();

        let param_attrs = CodeAttributes {
            kind: Some("param".to_string()),
            source: Some(if used_tc { EdgeSource::TypeChecker } else { EdgeSource::Ast }),
            resolution: resolved.method,
            scope: Some(resolved.scope),
            confidence: Some(kg_scorer::score(ScoreInput {
                relation_type: RelationshipType::ParamType,
                used_type_checker: used_tc,
                is_exported: false,
                name_length,
                to_id: &to_id,
                import_depth: None,
            })),
            inferred: true,
            resolved: resolved.target.is_resolved_kind(),
            active: true,
            access_path: Some(param.param_name.clone()),
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
            RelationshipType::ParamType,
            signature.loc,
            Some(&param.param_name),
            param_attrs,
        ));

        let depends_attrs = CodeAttributes {
            kind: Some("param-dependency".to_string()),
            source: Some(if used_tc { EdgeSource::TypeChecker } else { EdgeSource::Ast }),
            scope: Some(resolved.scope),
            confidence: Some(depends_on_confidence(resolved.scope)),
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
            signature.loc,
            Some(&param.param_name),
            depends_attrs,
        ));
    }

    if let Some((resolved, used_tc, type_name)) =
        resolve_explicit_or_inferred(ctx, signature.return_type.as_ref(), "<return>")
    {
        let to_id = resolved.target.synthetic_id();
        let name_length = type_name.chars().count();
        let attrs = CodeAttributes {
            kind: Some("return".to_string()),
            source: Some(if used_tc { EdgeSource::TypeChecker } else { EdgeSource::Ast }),
            resolution: resolved.method,
            scope: Some(resolved.scope),
            confidence: Some(kg_scorer::score(ScoreInput {
                relation_type: RelationshipType::ReturnsType,
                used_type_checker: used_tc,
                is_exported: false,
                name_length,
                to_id: &to_id,
                import_depth: None,
            })),
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
            RelationshipType::ReturnsType,
            signature.loc,
            None,
            attrs,
        ));
    }

    out
}
