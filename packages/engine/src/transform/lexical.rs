//! Token-level cleanups: HTML entities in strings, diagnostic statements and
//! `var` declarations.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use oxc_ast::ast::{Expression, Statement, VariableDeclaration, VariableDeclarationKind};
use oxc_span::{GetSpan, Span};
use regex::{Captures, Regex};

use crate::api::ChangeKind;

use super::syntax::{callee_name, quote_of, removal_range, slice};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

static ENTITY: Lazy<Regex> = Lazy::new(|| Regex::new(r"&(quot|#x27|#39|amp);").unwrap());

/// Decode `&quot;`, `&#x27;`, `&#39;` and `&amp;` in one left-to-right pass.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &Captures<'_>| match &caps[1] {
            "quot" => "\"",
            "amp" => "&",
            _ => "'",
        })
        .into_owned()
}

pub fn has_entities(text: &str) -> bool {
    ENTITY.is_match(text)
}

/// Decode entities inside a quoted literal, escaping any decoded quote that
/// matches the delimiter. `None` when there is nothing to decode.
pub fn decode_string_literal(raw: &str) -> Option<String> {
    if raw.len() < 2 || !has_entities(raw) {
        return None;
    }
    let quote = quote_of(raw);
    let decoded = decode_entities(&raw[1..raw.len() - 1]);
    let mut escaped = String::with_capacity(decoded.len() + 2);
    escaped.push(quote);
    let mut previous_backslash = false;
    for c in decoded.chars() {
        if c == quote && !previous_backslash {
            escaped.push('\\');
        }
        previous_backslash = c == '\\' && !previous_backslash;
        escaped.push(c);
    }
    escaped.push(quote);
    Some(escaped)
}

pub const DIAGNOSTIC_CALLS: [&str; 3] = ["console.log", "console.debug", "console.info"];

#[derive(Default)]
struct Literals {
    spans: Vec<Span>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Literals {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        if let Node::Expression(Expression::StringLiteral(lit)) = node {
            self.spans.push(lit.span);
        }
    }
}

pub struct DecodeEntities;

impl TreeVisitor for DecodeEntities {
    fn name(&self) -> &'static str {
        "decode-entities"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut literals = Literals::default();
        walk_program(cx.program, &mut literals);

        for span in literals.spans {
            let Some(decoded) = decode_string_literal(slice(cx.text, span)) else {
                continue;
            };
            rw.replace(span, decoded);
            rw.change(
                ChangeKind::EntityDecoded,
                "decoded HTML entities in a string literal",
                span.start,
            );
        }
    }
}

#[derive(Default)]
struct Diagnostics {
    /// Statement span and whether its parent holds a statement list.
    found: Vec<(Span, bool, &'static str)>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Diagnostics {
    fn enter(&mut self, node: Node<'n, 'a>, ancestors: &[Node<'n, 'a>]) {
        let Node::Statement(stmt) = node else {
            return;
        };
        let what = match stmt {
            Statement::DebuggerStatement(_) => "debugger",
            Statement::ExpressionStatement(s) => match &s.expression {
                Expression::CallExpression(c) => {
                    match callee_name(c).and_then(|n| DIAGNOSTIC_CALLS.iter().copied().find(|d| *d == n)) {
                        Some(name) => name,
                        None => return,
                    }
                }
                _ => return,
            },
            _ => return,
        };
        let in_list = ancestors.last().is_some_and(|p| p.statements().is_some());
        self.found.push((stmt.span(), in_list, what));
    }
}

/// Drops `console.log/debug/info(...)` and `debugger` statements.
pub struct RemoveDiagnostics;

impl TreeVisitor for RemoveDiagnostics {
    fn name(&self) -> &'static str {
        "remove-diagnostics"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut diagnostics = Diagnostics::default();
        walk_program(cx.program, &mut diagnostics);

        for (span, in_list, what) in diagnostics.found {
            if in_list {
                rw.remove(removal_range(cx.text, span));
            } else {
                // Sole body of an `if` / loop: keep a statement there.
                rw.replace(span, "{}");
            }
            rw.change(
                ChangeKind::DiagnosticRemoved,
                format!("removed `{}` statement", what),
                span.start,
            );
        }
    }
}

#[derive(Default)]
struct VarDeclarations<'n, 'a> {
    candidates: Vec<&'n VariableDeclaration<'a>>,
    declared: HashMap<String, usize>,
    /// Earliest reference offset per name.
    first_use: HashMap<String, u32>,
    /// Declarations holding a destructuring pattern.
    patterned: Vec<Span>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for VarDeclarations<'n, 'a> {
    fn enter(&mut self, node: Node<'n, 'a>, ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::VariableDeclaration(d) if d.kind == VariableDeclarationKind::Var => {
                for declarator in &d.declarations {
                    match declarator.id.get_binding_identifier() {
                        Some(id) => *self.declared.entry(id.name.to_string()).or_default() += 1,
                        None => self.patterned.push(d.span),
                    }
                }
                if at_scope_top(ancestors) {
                    self.candidates.push(d);
                }
            }
            Node::Expression(Expression::Identifier(id)) => {
                let first = self.first_use.entry(id.name.to_string()).or_insert(id.span.start);
                *first = (*first).min(id.span.start);
            }
            _ => {}
        }
    }
}

/// Directly in a program or function body, where `let` keeps the same reach.
fn at_scope_top(ancestors: &[Node<'_, '_>]) -> bool {
    let n = ancestors.len();
    let (Some(parent), Some(grandparent)) = (ancestors.last(), n.checked_sub(2).map(|i| ancestors[i]))
    else {
        return false;
    };
    match parent {
        Node::Statement(Statement::VariableDeclaration(_)) => {
            matches!(grandparent, Node::Program(_) | Node::FunctionBody(_))
        }
        Node::Statement(Statement::ExportNamedDeclaration(_)) => matches!(grandparent, Node::Program(_)),
        _ => false,
    }
}

/// `var` -> `let` when every name is declared once and never read before
/// its declaration.
pub struct VarToLet;

impl TreeVisitor for VarToLet {
    fn name(&self) -> &'static str {
        "var-to-let"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut vars = VarDeclarations::default();
        walk_program(cx.program, &mut vars);

        for decl in &vars.candidates {
            if vars.patterned.contains(&decl.span) {
                continue;
            }
            let convertible = decl.declarations.iter().all(|declarator| {
                declarator.id.get_binding_identifier().is_some_and(|id| {
                    let name = id.name.as_str();
                    vars.declared.get(name) == Some(&1)
                        && vars.first_use.get(name).map_or(true, |at| *at > decl.span.start)
                })
            });
            if !convertible || !slice(cx.text, decl.span).starts_with("var") {
                continue;
            }
            rw.replace(Span::new(decl.span.start, decl.span.start + 3), "let");
            rw.change(ChangeKind::ApiMigrated, "replaced `var` with `let`", decl.span.start);
        }
    }
}
