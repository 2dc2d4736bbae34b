//! Effect teardown synthesis.
//!
//! An effect callback that registers listeners, timers or subscriptions and
//! returns nothing leaks them across re-renders. Pair each registration with
//! its unregister call and return them from a cleanup closure.

use oxc_ast::ast::{Argument, CallExpression, Expression, Statement, VariableDeclaration};
use oxc_span::GetSpan;

use crate::api::ChangeKind;

use super::syntax::{argument_expression, is_effect_hook, line_indent, slice, strip_parens};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

pub struct EffectCleanup;

#[derive(Default)]
struct EffectCalls<'n, 'a> {
    calls: Vec<&'n CallExpression<'a>>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for EffectCalls<'n, 'a> {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        if let Node::Expression(Expression::CallExpression(c)) = node {
            if is_effect_hook(c) {
                self.calls.push(c);
            }
        }
    }
}

impl TreeVisitor for EffectCleanup {
    fn name(&self) -> &'static str {
        "effect-cleanup"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut effects = EffectCalls::default();
        walk_program(cx.program, &mut effects);

        for call in effects.calls {
            let Some(body) = callback_body(call) else {
                continue;
            };
            if body.iter().any(|s| matches!(s, Statement::ReturnStatement(_))) {
                continue;
            }
            let Some(last) = body.last() else {
                continue;
            };

            let mut teardowns = Vec::new();
            for stmt in body {
                match stmt {
                    Statement::ExpressionStatement(s) => {
                        if let Expression::CallExpression(c) = strip_parens(&s.expression) {
                            if let Some(teardown) = listener_teardown(cx.text, c, rw) {
                                teardowns.push((teardown, stmt.span().start));
                            }
                        }
                    }
                    Statement::VariableDeclaration(d) => {
                        if let Some(teardown) = handle_teardown(d) {
                            teardowns.push((teardown, stmt.span().start));
                        }
                    }
                    _ => {}
                }
            }
            if teardowns.is_empty() {
                continue;
            }

            let indent = line_indent(cx.text, last.span().start);
            let mut closure = format!("\n{indent}return () => {{\n");
            for (teardown, _) in &teardowns {
                closure.push_str(&format!("{indent}  {teardown};\n"));
            }
            closure.push_str(&format!("{indent}}};"));
            rw.insert(last.span().end, closure);

            for (teardown, offset) in teardowns {
                rw.change(
                    ChangeKind::CleanupAdded,
                    format!("added `{}` to the effect cleanup", teardown),
                    offset,
                );
            }
        }
    }
}

/// Statements of a block-bodied effect callback.
fn callback_body<'n, 'a>(call: &'n CallExpression<'a>) -> Option<&'n [Statement<'a>]> {
    match strip_parens(argument_expression(&call.arguments, 0)?) {
        Expression::ArrowFunctionExpression(f) if !f.expression => Some(&f.body.statements[..]),
        Expression::FunctionExpression(f) => f.body.as_ref().map(|b| &b.statements[..]),
        _ => None,
    }
}

/// `target.addEventListener(ev, handler, opts?)` -> `target.removeEventListener(...)`.
fn listener_teardown(text: &str, call: &CallExpression<'_>, rw: &mut Rewriter<'_>) -> Option<String> {
    let Expression::StaticMemberExpression(member) = strip_parens(&call.callee) else {
        return None;
    };
    if member.property.name.as_str() != "addEventListener" || call.arguments.len() < 2 {
        return None;
    }
    let handler = argument_expression(&call.arguments, 1)?;
    if matches!(
        strip_parens(handler),
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
    ) {
        rw.warn(format!(
            "inline listener `{}` cannot be removed; move the handler into a named function",
            slice(text, call.span)
        ));
        return None;
    }
    let args: Vec<&str> = call
        .arguments
        .iter()
        .map(|a: &Argument<'_>| slice(text, a.span()))
        .collect();
    Some(format!(
        "{}.removeEventListener({})",
        slice(text, member.object.span()),
        args.join(", ")
    ))
}

/// `const id = setInterval(...)`, `setTimeout`, or `const sub = x.subscribe(...)`.
fn handle_teardown(declaration: &VariableDeclaration<'_>) -> Option<String> {
    let [declarator] = &declaration.declarations[..] else {
        return None;
    };
    let id = declarator.id.get_binding_identifier()?;
    let Expression::CallExpression(init) = strip_parens(declarator.init.as_ref()?) else {
        return None;
    };
    let callee = strip_parens(&init.callee);
    let timer = match callee {
        Expression::Identifier(i) => Some(i.name.as_str()),
        Expression::StaticMemberExpression(m) if is_global_object(&m.object) => {
            Some(m.property.name.as_str())
        }
        _ => None,
    };
    match timer {
        Some("setInterval") => return Some(format!("clearInterval({})", id.name)),
        Some("setTimeout") => return Some(format!("clearTimeout({})", id.name)),
        _ => {}
    }
    match callee {
        Expression::StaticMemberExpression(m) if m.property.name.as_str() == "subscribe" => {
            Some(format!("{}.unsubscribe()", id.name))
        }
        _ => None,
    }
}

fn is_global_object(expr: &Expression<'_>) -> bool {
    matches!(strip_parens(expr), Expression::Identifier(i) if matches!(i.name.as_str(), "window" | "globalThis"))
}
