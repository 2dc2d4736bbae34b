//! Test file fixes for React Testing Library suites.

use std::collections::BTreeSet;

use oxc_ast::ast::{Expression, ImportDeclarationSpecifier, ImportOrExportKind, Program, Statement};
use oxc_span::GetSpan;

use crate::api::ChangeKind;

use super::syntax::{callee_name, imported_locals, imports_end};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

pub const TESTING_LIBRARY: &str = "@testing-library/react";
pub const JEST_DOM: &str = "@testing-library/jest-dom";

const HELPERS: [&str; 3] = ["render", "screen", "fireEvent"];

pub const DOM_MATCHERS: [&str; 12] = [
    "toBeInTheDocument",
    "toHaveTextContent",
    "toHaveAttribute",
    "toHaveClass",
    "toBeVisible",
    "toBeDisabled",
    "toBeEnabled",
    "toHaveValue",
    "toBeChecked",
    "toHaveStyle",
    "toHaveFocus",
    "toBeEmptyDOMElement",
];

const TEST_FUNCTIONS: [&str; 6] = ["it", "test", "it.only", "test.only", "it.skip", "test.skip"];

#[derive(Default)]
struct Usage {
    referenced: BTreeSet<&'static str>,
    declared: BTreeSet<&'static str>,
    matchers: bool,
    /// Start offsets of non-async test callbacks containing `await`.
    async_callbacks: BTreeSet<u32>,
}

fn helper(name: &str) -> Option<&'static str> {
    HELPERS.iter().copied().find(|h| *h == name)
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Usage {
    fn enter(&mut self, node: Node<'n, 'a>, ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::Expression(Expression::Identifier(id)) => {
                if let Some(h) = helper(id.name.as_str()) {
                    self.referenced.insert(h);
                }
            }
            Node::Expression(Expression::StaticMemberExpression(m)) => {
                if DOM_MATCHERS.contains(&m.property.name.as_str()) {
                    self.matchers = true;
                }
            }
            Node::Expression(Expression::AwaitExpression(_)) => {
                if let Some(start) = enclosing_test_callback(ancestors) {
                    self.async_callbacks.insert(start);
                }
            }
            Node::VariableDeclaration(d) => {
                for declarator in &d.declarations {
                    if let Some(h) = declarator
                        .id
                        .get_binding_identifier()
                        .and_then(|id| helper(id.name.as_str()))
                    {
                        self.declared.insert(h);
                    }
                }
            }
            Node::Function(f) => {
                if let Some(h) = f.id.as_ref().and_then(|id| helper(id.name.as_str())) {
                    self.declared.insert(h);
                }
            }
            _ => {}
        }
    }
}

/// Start of the nearest enclosing function when it is a synchronous callback
/// passed to `it` / `test`.
fn enclosing_test_callback(ancestors: &[Node<'_, '_>]) -> Option<u32> {
    let mut i = ancestors.iter().rposition(Node::is_function_boundary)?;
    if let Node::Function(f) = ancestors[i] {
        if f.r#async {
            return None;
        }
        i = i.checked_sub(1)?;
    }
    let callback = ancestors[i].as_expression()?;
    match callback {
        Expression::ArrowFunctionExpression(f) if f.r#async => return None,
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_) => {}
        _ => return None,
    }
    let Some(Expression::CallExpression(call)) = ancestors[i.checked_sub(1)?].as_expression() else {
        return None;
    };
    let is_test = callee_name(call).is_some_and(|name| TEST_FUNCTIONS.contains(&name.as_str()));
    let is_callback = call
        .arguments
        .iter()
        .filter_map(|a| a.as_expression())
        .any(|a| a.span() == callback.span());
    (is_test && is_callback).then_some(callback.span().start)
}

fn scan(cx: &VisitContext<'_, '_>) -> Usage {
    let mut usage = Usage::default();
    walk_program(cx.program, &mut usage);
    usage
}

/// Adds `render` / `screen` / `fireEvent` imports the suite relies on.
pub struct TestingLibraryImports;

impl TreeVisitor for TestingLibraryImports {
    fn name(&self) -> &'static str {
        "testing-library-imports"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let usage = scan(cx);
        let imported = imported_locals(cx.program);
        let missing: Vec<&str> = HELPERS
            .iter()
            .copied()
            .filter(|h| {
                usage.referenced.contains(h) && !usage.declared.contains(h) && !imported.contains(h)
            })
            .collect();
        if missing.is_empty() {
            return;
        }

        let existing = cx.program.body.iter().find_map(|stmt| match stmt {
            Statement::ImportDeclaration(decl)
                if decl.source.value.as_str() == TESTING_LIBRARY
                    && decl.import_kind == ImportOrExportKind::Value =>
            {
                decl.specifiers
                    .iter()
                    .flatten()
                    .filter(|s| matches!(s, ImportDeclarationSpecifier::ImportSpecifier(_)))
                    .last()
            }
            _ => None,
        });

        let at = match existing {
            Some(last) => {
                let at = last.span().end;
                rw.insert(at, format!(", {}", missing.join(", ")));
                at
            }
            None => {
                let at = imports_end(cx.program, cx.text);
                rw.insert(
                    at,
                    format!("import {{ {} }} from \"{}\";\n", missing.join(", "), TESTING_LIBRARY),
                );
                at
            }
        };
        for name in missing {
            rw.change(
                ChangeKind::ImportAdded,
                format!("imported `{}` from {}", name, TESTING_LIBRARY),
                at,
            );
        }
    }
}

/// DOM matchers need the jest-dom extension loaded.
pub struct JestDomImport;

pub fn imports_jest_dom(program: &Program<'_>) -> bool {
    program.body.iter().any(|stmt| {
        matches!(stmt, Statement::ImportDeclaration(decl) if decl.source.value.as_str().starts_with(JEST_DOM))
    })
}

impl TreeVisitor for JestDomImport {
    fn name(&self) -> &'static str {
        "jest-dom-import"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        if imports_jest_dom(cx.program) || !scan(cx).matchers {
            return;
        }
        let at = imports_end(cx.program, cx.text);
        rw.insert(at, format!("import \"{}\";\n", JEST_DOM));
        rw.change(ChangeKind::ImportAdded, "imported @testing-library/jest-dom matchers", at);
    }
}

/// Test callbacks that `await` must be `async`.
pub struct AsyncTestCallbacks;

impl TreeVisitor for AsyncTestCallbacks {
    fn name(&self) -> &'static str {
        "async-test-callbacks"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        for start in scan(cx).async_callbacks {
            rw.insert(start, "async ");
            rw.change(ChangeKind::TestScaffold, "marked an awaiting test callback async", start);
        }
    }
}
