//! Browser global guards.
//!
//! Every read of `window`, `document`, `localStorage`, `sessionStorage` or
//! `navigator` that is not already behind a `typeof` check gets one. Writes
//! and whole expression statements are wrapped in an `if`, other reads in a
//! conditional expression. Output of this pass passes through it unchanged.

use oxc_ast::ast::{Expression, IdentifierReference, Statement};
use oxc_semantic::{Scoping, SemanticBuilder};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::{LogicalOperator, UnaryOperator};

use crate::api::ChangeKind;

use super::syntax::{
    argument_expression, is_early_exit_guard, is_effect_hook, tests_defined, tests_undefined,
};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

pub const BROWSER_GLOBALS: [&str; 5] = [
    "window",
    "document",
    "localStorage",
    "sessionStorage",
    "navigator",
];

pub fn browser_global(name: &str) -> Option<&'static str> {
    BROWSER_GLOBALS.iter().copied().find(|g| *g == name)
}

pub struct BrowserGlobalGuards;

impl TreeVisitor for BrowserGlobalGuards {
    fn name(&self) -> &'static str {
        "browser-global-guards"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        // Scope resolution tells a shadowing parameter or import from the global.
        let semantic = SemanticBuilder::new()
            .with_excess_capacity(0.0)
            .build(cx.program)
            .semantic;
        let mut finder = GuardFinder {
            scoping: semantic.scoping(),
            claimed: Vec::new(),
            guards: Vec::new(),
        };
        walk_program(cx.program, &mut finder);

        for guard in finder.guards {
            let test = format!("typeof {} !== \"undefined\"", guard.root);
            match guard.kind {
                GuardKind::Statement => {
                    rw.wrap(guard.span, format!("if ({}) {{ ", test), " }", guard.depth);
                }
                GuardKind::Expression => {
                    rw.wrap(guard.span, format!("({} ? ", test), " : undefined)", guard.depth);
                }
                GuardKind::Shorthand => {
                    rw.replace(
                        guard.span,
                        format!("{root}: ({test} ? {root} : undefined)", root = guard.root),
                    );
                }
            }
            rw.change(
                ChangeKind::GuardAdded,
                format!("guarded `{}` access with a typeof check", guard.root),
                guard.span.start,
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GuardKind {
    Statement,
    Expression,
    Shorthand,
}

#[derive(Debug)]
struct Guard {
    root: &'static str,
    span: Span,
    depth: u32,
    kind: GuardKind,
}

enum Link {
    None,
    Read,
    Write,
}

struct GuardFinder<'s> {
    scoping: &'s Scoping,
    claimed: Vec<(&'static str, Span)>,
    guards: Vec<Guard>,
}

impl GuardFinder<'_> {
    /// Resolves to a parameter, declaration or import rather than the global.
    fn is_bound(&self, id: &IdentifierReference<'_>) -> bool {
        id.reference_id
            .get()
            .is_some_and(|reference| self.scoping.get_reference(reference).symbol_id().is_some())
    }

    fn claim(&mut self, root: &'static str, span: Span, depth: usize, kind: GuardKind) {
        self.claimed.push((root, span));
        self.guards.push(Guard {
            root,
            span,
            depth: depth as u32,
            kind,
        });
    }

    fn is_claimed(&self, root: &str, span: Span) -> bool {
        self.claimed
            .iter()
            .any(|(r, s)| *r == root && s.start <= span.start && span.end <= s.end)
    }
}

impl<'n, 'a> NodeVisitor<'n, 'a> for GuardFinder<'_> {
    fn enter(&mut self, node: Node<'n, 'a>, ancestors: &[Node<'n, 'a>]) {
        let Node::Expression(Expression::Identifier(id)) = node else {
            return;
        };
        let Some(root) = browser_global(id.name.as_str()) else {
            return;
        };
        if self.is_bound(id) || self.is_claimed(root, id.span) {
            return;
        }
        if is_guarded(ancestors, id.span, root) {
            return;
        }

        // Grow the chain upward: `window` -> `window.a` -> `window.a.b()`.
        let mut top = ancestors.len();
        let mut chain = id.span;
        let mut write = false;
        for i in (0..ancestors.len()).rev() {
            match chain_link(ancestors[i], chain) {
                Link::None => break,
                Link::Read => {
                    chain = ancestors[i].span();
                    top = i;
                }
                Link::Write => {
                    chain = ancestors[i].span();
                    top = i;
                    write = true;
                    break;
                }
            }
        }

        let above = top.checked_sub(1).map(|i| ancestors[i]);
        if let Some(Node::Expression(Expression::UnaryExpression(u))) = above {
            match u.operator {
                UnaryOperator::Typeof => return,
                UnaryOperator::Delete => write = true,
                _ => {}
            }
        }

        if let Some(Node::ObjectProperty(p)) = above {
            if p.shorthand {
                self.claim(root, p.span, top - 1, GuardKind::Shorthand);
                return;
            }
        }

        let statement_level = matches!(above, Some(Node::Statement(Statement::ExpressionStatement(_))));
        if write || statement_level {
            if let Some((span, depth)) = enclosing_expression_statement(ancestors, top) {
                self.claim(root, span, depth, GuardKind::Statement);
                return;
            }
            // A write nested in an expression: guard the assignment itself.
            if write {
                if let Some(i) = top.checked_sub(1) {
                    self.claim(root, ancestors[i].span(), i, GuardKind::Expression);
                    return;
                }
            }
        }

        self.claim(root, chain, top, GuardKind::Expression);
    }
}

/// How `parent` relates to the chain spanning `child`.
fn chain_link(parent: Node<'_, '_>, child: Span) -> Link {
    let extends = match parent {
        Node::Expression(expr) => match expr {
            Expression::StaticMemberExpression(m) => m.object.span() == child,
            Expression::ComputedMemberExpression(m) => m.object.span() == child,
            Expression::PrivateFieldExpression(m) => m.object.span() == child,
            Expression::CallExpression(c) => c.callee.span() == child,
            Expression::ParenthesizedExpression(p) => p.expression.span() == child,
            Expression::TSNonNullExpression(t) => t.expression.span() == child,
            Expression::ChainExpression(_) => true,
            _ => false,
        },
        Node::ChainMember(m) => m.object().span() == child,
        Node::ChainCall(c) => c.callee.span() == child,
        Node::WriteTarget(m) => {
            return if m.object().span() == child {
                Link::Write
            } else {
                Link::None
            };
        }
        _ => false,
    };
    if extends {
        Link::Read
    } else {
        Link::None
    }
}

/// The expression statement holding the chain at `top`, if nothing but
/// expressions sit in between.
fn enclosing_expression_statement(ancestors: &[Node<'_, '_>], top: usize) -> Option<(Span, usize)> {
    for i in (0..top).rev() {
        let node = ancestors[i];
        if node.is_function_boundary() {
            return None;
        }
        match node {
            Node::Statement(Statement::ExpressionStatement(s)) => return Some((s.span, i)),
            Node::Expression(_) | Node::WriteTarget(_) | Node::ChainMember(_) | Node::ChainCall(_) => {}
            _ => return None,
        }
    }
    None
}

/// Whether some ancestor already proves `root` is defined at `span`.
pub fn is_guarded(ancestors: &[Node<'_, '_>], span: Span, root: &str) -> bool {
    let mut child = span;
    for parent in ancestors.iter().rev() {
        let guarded = match parent {
            Node::Expression(Expression::ConditionalExpression(c)) => {
                (c.consequent.span() == child && tests_defined(&c.test, root))
                    || (c.alternate.span() == child && tests_undefined(&c.test, root))
            }
            Node::Expression(Expression::LogicalExpression(l)) if l.right.span() == child => {
                match l.operator {
                    LogicalOperator::And => tests_defined(&l.left, root),
                    LogicalOperator::Or => tests_undefined(&l.left, root),
                    LogicalOperator::Coalesce => false,
                }
            }
            Node::Statement(Statement::IfStatement(s)) => {
                (s.consequent.span() == child && tests_defined(&s.test, root))
                    || (s.alternate.as_ref().is_some_and(|a| a.span() == child)
                        && tests_undefined(&s.test, root))
            }
            Node::Expression(Expression::CallExpression(c)) if is_effect_hook(c) => {
                argument_expression(&c.arguments, 0).is_some_and(|cb| cb.span() == child)
            }
            other => other.statements().is_some_and(|stmts| {
                stmts
                    .iter()
                    .take_while(|s| s.span().end <= child.start)
                    .any(|s| is_early_exit_guard(s, root))
            }),
        };
        if guarded {
            return true;
        }
        child = parent.span();
    }
    false
}
