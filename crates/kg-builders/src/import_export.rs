//! Import/Export Builder (spec §4.2.1).
//!
//! Emits one raw `IMPORTS` relationship per import declaration. The
//! relationship is intentionally left "raw" — `toEntityId` and `attrs` are
//! populated, but the canonical id, default confidence, and language-tag
//! annotation are left for `kg-normalizer::normalize` to compute, matching
//! the pipeline split in spec §4.1 ("take a freshly constructed structural
//! relationship and produce its canonical form").

use std::collections::BTreeMap;

use kg_core::relationship::{CodeAttributes, ImportKind, Relationship, RelationshipType, Site, Target};

use crate::input::{BuilderContext, Loc};

/// The binding form of one import declaration (spec §4.2.1).
#[derive(Debug, Clone)]
pub enum ImportForm {
    /// `import "mod"` — no bindings.
    SideEffect,
    /// `import x from "mod"`.
    Default {
        /// Local binding name.
        alias: String,
    },
    /// `import * as x from "mod"`.
    Namespace {
        /// Local binding name.
        alias: String,
    },
    /// `import { x as y } from "mod"`.
    Named {
        /// Exported name being imported.
        exported_name: String,
        /// Local alias, when renamed.
        alias: Option<String>,
        /// Traversal depth at which the export was located by walking
        /// re-exports transitively, capped at a depth bound (spec
        /// §4.2.1 "Export maps are walked transitively via re-exports up
        /// to a depth bound").
        export_depth: u32,
        /// Whether `export_depth` hit the traversal bound without fully
        /// resolving the export chain.
        depth_bound_reached: bool,
    },
}

/// One parsed import declaration (spec §4.2.1 input).
#[derive(Debug, Clone)]
pub struct ImportDeclaration {
    /// The raw module specifier as written (e.g. `"./util"`, `"react"`).
    pub module_specifier: String,
    /// The binding form.
    pub form: ImportForm,
    /// Location of the import declaration.
    pub loc: Loc,
    /// The resolved repo-relative file, when `module_specifier` points
    /// inside the repo. `None` for external packages.
    pub resolved_file: Option<String>,
}

fn named_target(resolved_file: Option<&str>, module_specifier: &str, exported_name: &str) -> Target {
    match resolved_file {
        Some(file) => Target::FileSymbol {
            file: file.to_string(),
            symbol: exported_name.to_string(),
        },
        None => Target::Placeholder {
            placeholder_kind: "import".to_string(),
            name: format!("{module_specifier}:{exported_name}"),
        },
    }
}

/// Build the raw `IMPORTS` relationship for one declaration (spec §4.2.1).
#[must_use]
pub fn build_import_relationship(
    ctx: &BuilderContext<'_>,
    from_entity_id: &str,
    decl: &ImportDeclaration,
) -> Relationship {
    let (to_ref, import_type, alias, import_depth, re_export_target) = match &decl.form {
        ImportForm::SideEffect => (
            named_target(decl.resolved_file.as_deref(), &decl.module_specifier, "*"),
            Some(ImportKind::SideEffect),
            None,
            None,
            None,
        ),
        ImportForm::Default { alias } => (
            named_target(decl.resolved_file.as_deref(), &decl.module_specifier, "default"),
            Some(ImportKind::Default),
            Some(alias.clone()),
            None,
            None,
        ),
        ImportForm::Namespace { alias } => (
            named_target(decl.resolved_file.as_deref(), &decl.module_specifier, "*"),
            Some(ImportKind::Namespace),
            Some(alias.clone()),
            None,
            None,
        ),
        ImportForm::Named {
            exported_name,
            alias,
            export_depth,
            depth_bound_reached,
        } => {
            let target = named_target(decl.resolved_file.as_deref(), &decl.module_specifier, exported_name);
            let re_export = if *export_depth > 0 {
                Some(decl.module_specifier.clone())
            } else {
                None
            };
            let _ = depth_bound_reached;
            (target, Some(ImportKind::Named), alias.clone(), Some(*export_depth), re_export)
        }
    };

    // spec §4.2.1 "isNamespace inferred when importType=namespace or
    // modulePath ends with /*" — the builder only knows the former; the
    // latter is finished by kg-normalizer once modulePath is normalized.
    let is_namespace = matches!(import_type, Some(ImportKind::Namespace));
    let resolution_state = if decl
        .form
        .depth_bound_reached()
        .unwrap_or(false)
    {
        Some(kg_core::relationship::ResolutionState::Partial)
    } else {
        None
    };

    let attrs = CodeAttributes {
        resolved: to_ref.is_resolved_kind(),
        module_path: Some(decl.module_specifier.clone()),
        import_type,
        import_alias: alias,
        import_depth,
        is_namespace: Some(is_namespace),
        is_re_export: Some(re_export_target.is_some()),
        re_export_target,
        resolution_state,
        to_ref: Some(to_ref.clone()),
        from_ref: Some(Target::Entity {
            id: from_entity_id.to_string(),
        }),
        ..Default::default()
    };

    let site = Site {
        path: ctx.from_file.to_string(),
        line: decl.loc.line,
        column: decl.loc.column,
        access_path: None,
    };

    Relationship {
        id: String::new(),
        from_entity_id: from_entity_id.to_string(),
        to_entity_id: to_ref.synthetic_id(),
        r#type: RelationshipType::Imports,
        created: ctx.now,
        last_modified: ctx.now,
        version: 1,
        metadata: BTreeMap::new(),
        site_id: None,
        site_hash: None,
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

impl ImportForm {
    fn depth_bound_reached(&self) -> Option<bool> {
        match self {
            Self::Named { depth_bound_reached, .. } => Some(*depth_bound_reached),
            _ => None,
        }
    }
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
    fn side_effect_import_resolved_targets_wildcard_file_symbol() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let decl = ImportDeclaration {
            module_specifier: "./polyfill".to_string(),
            form: ImportForm::SideEffect,
            loc: Loc { line: 1, column: 0 },
            resolved_file: Some("polyfill.ts".to_string()),
        };
        let rel = build_import_relationship(&c, "file:a.ts", &decl);
        assert_eq!(rel.to_entity_id, "file:polyfill.ts:*");
        assert_eq!(
            rel.attrs.unwrap().import_type,
            Some(ImportKind::SideEffect)
        );
    }

    #[test]
    fn unresolved_side_effect_import_is_placeholder() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let decl = ImportDeclaration {
            module_specifier: "some-package".to_string(),
            form: ImportForm::SideEffect,
            loc: Loc { line: 1, column: 0 },
            resolved_file: None,
        };
        let rel = build_import_relationship(&c, "file:a.ts", &decl);
        assert_eq!(rel.to_entity_id, "import:some-package:*");
    }

    #[test]
    fn default_import_carries_alias() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let decl = ImportDeclaration {
            module_specifier: "./util".to_string(),
            form: ImportForm::Default {
                alias: "util".to_string(),
            },
            loc: Loc { line: 2, column: 0 },
            resolved_file: Some("util.ts".to_string()),
        };
        let rel = build_import_relationship(&c, "file:a.ts", &decl);
        assert_eq!(rel.to_entity_id, "file:util.ts:default");
        assert_eq!(rel.attrs.unwrap().import_alias, Some("util".to_string()));
    }

    #[test]
    fn namespace_import_sets_is_namespace() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let decl = ImportDeclaration {
            module_specifier: "./mod".to_string(),
            form: ImportForm::Namespace {
                alias: "mod".to_string(),
            },
            loc: Loc { line: 3, column: 0 },
            resolved_file: Some("mod.ts".to_string()),
        };
        let rel = build_import_relationship(&c, "file:a.ts", &decl);
        assert_eq!(rel.attrs.unwrap().is_namespace, Some(true));
    }

    #[test]
    fn named_import_depth_bound_marks_partial() {
        let import_map = HashMap::new();
        let import_symbol_map = HashMap::new();
        let idx = SymbolIndex::new();
        let c = ctx(&import_map, &import_symbol_map, &idx);
        let decl = ImportDeclaration {
            module_specifier: "./reexport".to_string(),
            form: ImportForm::Named {
                exported_name: "thing".to_string(),
                alias: None,
                export_depth: 6,
                depth_bound_reached: true,
            },
            loc: Loc { line: 4, column: 0 },
            resolved_file: Some("reexport.ts".to_string()),
        };
        let rel = build_import_relationship(&c, "file:a.ts", &decl);
        assert_eq!(
            rel.attrs.unwrap().resolution_state,
            Some(kg_core::relationship::ResolutionState::Partial)
        );
    }
}
