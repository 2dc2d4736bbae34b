//! JSX element fixes: list keys and required intrinsic attributes.

use oxc_ast::ast::{ArrowFunctionExpression, Expression, JSXElement, JSXOpeningElement, Program, Statement};
use oxc_span::GetSpan;

use crate::api::ChangeKind;

use super::syntax::{
    argument_expression, element_name, has_attribute, has_spread_attribute, slice, strip_parens,
};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

#[derive(Default)]
struct Elements<'n, 'a> {
    elements: Vec<&'n JSXElement<'a>>,
    map_callbacks: Vec<&'n ArrowFunctionExpression<'a>>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Elements<'n, 'a> {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::JSXElement(el) => self.elements.push(el),
            Node::Expression(Expression::CallExpression(c)) => {
                let is_map = matches!(
                    strip_parens(&c.callee),
                    Expression::StaticMemberExpression(m) if m.property.name.as_str() == "map"
                );
                if !is_map {
                    return;
                }
                if let Some(Expression::ArrowFunctionExpression(f)) =
                    argument_expression(&c.arguments, 0).map(strip_parens)
                {
                    self.map_callbacks.push(f);
                }
            }
            _ => {}
        }
    }
}

/// The element an arrow callback returns, directly or via `return`.
fn returned_element<'n, 'a>(f: &'n ArrowFunctionExpression<'a>) -> Option<&'n JSXElement<'a>> {
    let expression = if f.expression {
        match f.body.statements.first()? {
            Statement::ExpressionStatement(s) => &s.expression,
            _ => return None,
        }
    } else {
        f.body.statements.iter().rev().find_map(|s| match s {
            Statement::ReturnStatement(r) => r.argument.as_ref(),
            _ => None,
        })?
    };
    match strip_parens(expression) {
        Expression::JSXElement(el) => Some(el),
        _ => None,
    }
}

fn insert_attribute(rw: &mut Rewriter<'_>, opening: &JSXOpeningElement<'_>, attribute: &str) {
    rw.insert(opening.name.span().end, format!(" {}", attribute));
}

/// Elements returned from `.map()` callbacks get a `key`.
pub struct ListKeys;

impl TreeVisitor for ListKeys {
    fn name(&self) -> &'static str {
        "list-keys"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut found = Elements::default();
        walk_program(cx.program, &mut found);

        for callback in found.map_callbacks {
            let Some(element) = returned_element(callback) else {
                continue;
            };
            let opening = &element.opening_element;
            if has_attribute(opening, "key") || has_spread_attribute(opening) {
                continue;
            }

            let params = &callback.params;
            let index = match params.items.get(1).map(|p| p.pattern.get_binding_identifier()) {
                Some(Some(id)) => id.name.to_string(),
                Some(None) => continue,
                None => {
                    if params.rest.is_some() {
                        continue;
                    }
                    let Some(first) = params.items.first() else {
                        continue;
                    };
                    let param_text = slice(cx.text, first.span);
                    let parenthesized = slice(cx.text, params.span).starts_with('(');
                    if parenthesized {
                        rw.insert(first.span.end, ", index");
                    } else {
                        rw.replace(first.span, format!("({}, index)", param_text));
                    }
                    "index".to_string()
                }
            };

            insert_attribute(rw, opening, &format!("key={{{}}}", index));
            rw.change(
                ChangeKind::KeyAdded,
                format!("added key={{{}}} to an element rendered by .map()", index),
                opening.span.start,
            );
        }
    }
}

/// `<img>` gets `alt=""`, `<button>` gets `type="button"`.
pub struct IntrinsicAttributes;

const REQUIRED_ATTRIBUTES: [(&str, &str, &str); 2] =
    [("img", "alt", "alt=\"\""), ("button", "type", "type=\"button\"")];

impl TreeVisitor for IntrinsicAttributes {
    fn name(&self) -> &'static str {
        "intrinsic-attributes"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut found = Elements::default();
        walk_program(cx.program, &mut found);

        for element in found.elements {
            let opening = &element.opening_element;
            let Some(name) = element_name(&opening.name) else {
                continue;
            };
            for (tag, attribute, text) in REQUIRED_ATTRIBUTES {
                if name == tag && !has_attribute(opening, attribute) && !has_spread_attribute(opening) {
                    insert_attribute(rw, opening, text);
                    rw.change(
                        ChangeKind::AttributeAdded,
                        format!("added {} to <{}>", text, tag),
                        opening.span.start,
                    );
                }
            }
        }
    }
}

/// True when the tree contains JSX at all.
pub fn has_jsx(program: &Program<'_>) -> bool {
    let mut found = Elements::default();
    walk_program(program, &mut found);
    !found.elements.is_empty()
}
