//! Import declaration fixes: merging duplicates and the missing `React` binding.

use indexmap::IndexMap;
use oxc_ast::ast::{
    Expression, ImportDeclaration, ImportDeclarationSpecifier, ImportOrExportKind, Statement,
};
use oxc_span::GetSpan;

use crate::api::ChangeKind;

use super::syntax::{imported_locals, prologue_end, quote_of, removal_range, slice};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

/// Declarations that only bind named specifiers.
fn is_named_only(decl: &ImportDeclaration<'_>) -> bool {
    decl.specifiers.as_ref().is_some_and(|specifiers| {
        !specifiers.is_empty()
            && specifiers
                .iter()
                .all(|s| matches!(s, ImportDeclarationSpecifier::ImportSpecifier(_)))
    })
}

pub struct MergeImports;

impl TreeVisitor for MergeImports {
    fn name(&self) -> &'static str {
        "merge-imports"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut groups: IndexMap<(&str, bool), Vec<&ImportDeclaration<'_>>> = IndexMap::new();
        for stmt in &cx.program.body {
            if let Statement::ImportDeclaration(decl) = stmt {
                if is_named_only(decl) {
                    let is_type = decl.import_kind == ImportOrExportKind::Type;
                    groups
                        .entry((decl.source.value.as_str(), is_type))
                        .or_default()
                        .push(decl);
                }
            }
        }

        for ((source, is_type), decls) in groups {
            let [first, rest @ ..] = &decls[..] else {
                continue;
            };
            if rest.is_empty() {
                continue;
            }

            let mut names: Vec<&str> = Vec::new();
            for decl in &decls {
                for spec in decl.specifiers.iter().flatten() {
                    let text = slice(cx.text, spec.span());
                    if !names.contains(&text) {
                        names.push(text);
                    }
                }
            }

            let quote = quote_of(slice(cx.text, first.source.span));
            let keyword = if is_type { "import type" } else { "import" };
            rw.replace(
                first.span,
                format!(
                    "{keyword} {{ {} }} from {quote}{source}{quote};",
                    names.join(", ")
                ),
            );
            for decl in rest {
                rw.remove(removal_range(cx.text, decl.span));
                rw.change(
                    ChangeKind::ImportMerged,
                    format!("merged duplicate import from \"{}\"", source),
                    decl.span.start,
                );
            }
        }
    }
}

#[derive(Default)]
struct ReactUsage {
    referenced: bool,
    declared: bool,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for ReactUsage {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::Expression(Expression::StaticMemberExpression(m)) => {
                if matches!(&m.object, Expression::Identifier(id) if id.name.as_str() == "React") {
                    self.referenced = true;
                }
            }
            Node::VariableDeclaration(d) => {
                self.declared |= d.declarations.iter().any(|declarator| {
                    declarator
                        .id
                        .get_binding_identifier()
                        .is_some_and(|id| id.name.as_str() == "React")
                });
            }
            _ => {}
        }
    }
}

/// `React.*` used without any `React` binding in scope.
pub struct ReactImport;

impl TreeVisitor for ReactImport {
    fn name(&self) -> &'static str {
        "react-import"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        if imported_locals(cx.program).contains(&"React") {
            return;
        }
        let mut usage = ReactUsage::default();
        walk_program(cx.program, &mut usage);
        if !usage.referenced || usage.declared {
            return;
        }

        // Prefer extending `import { useState } from "react"`.
        let existing = cx.program.body.iter().find_map(|stmt| match stmt {
            Statement::ImportDeclaration(decl)
                if decl.source.value.as_str() == "react"
                    && decl.import_kind == ImportOrExportKind::Value
                    && is_named_only(decl) =>
            {
                Some(decl)
            }
            _ => None,
        });
        if let Some(decl) = existing {
            let first = decl.specifiers.iter().flatten().next();
            if let Some(first) = first {
                let head = &cx.text[decl.span.start as usize..first.span().start as usize];
                if let Some(brace) = head.rfind('{') {
                    let at = decl.span.start + brace as u32;
                    rw.insert(at, "React, ");
                    rw.change(
                        ChangeKind::ImportAdded,
                        "added the default React import",
                        decl.span.start,
                    );
                    return;
                }
            }
        }

        let at = prologue_end(cx.program, cx.text);
        rw.insert(at, "import React from \"react\";\n");
        rw.change(ChangeKind::ImportAdded, "imported React for React.* references", at);
    }
}
