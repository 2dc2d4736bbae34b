//! Shape helpers shared by the visitors.

use oxc_ast::ast::{
    Argument, CallExpression, Expression, ImportDeclarationSpecifier, JSXAttributeItem,
    JSXAttributeName, JSXElementName, JSXOpeningElement, Program, Statement,
};
use oxc_span::{GetSpan, Span};
use oxc_syntax::operator::{BinaryOperator, LogicalOperator, UnaryOperator};

use crate::api::Location;

/// Byte offset to 1-based line / column.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<u32>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i as u32 + 1),
        );
        Self { starts }
    }

    pub fn location(&self, text: &str, offset: u32) -> Location {
        let line = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.starts[line] as usize;
        let end = (offset as usize).min(text.len());
        let column = text.get(start..end).map_or(0, |s| s.chars().count());
        Location {
            line: line as u32 + 1,
            column: column as u32 + 1,
        }
    }
}

pub fn slice(text: &str, span: Span) -> &str {
    text.get(span.start as usize..span.end as usize).unwrap_or("")
}

pub fn line_start(text: &str, offset: u32) -> u32 {
    text[..offset as usize].rfind('\n').map_or(0, |i| i as u32 + 1)
}

/// Leading whitespace of the line containing `offset`.
pub fn line_indent(text: &str, offset: u32) -> &str {
    let start = line_start(text, offset) as usize;
    let rest = &text[start..];
    let width = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    &rest[..width]
}

/// Range that removes a statement. A statement alone on its line takes the
/// whole line with it.
pub fn removal_range(text: &str, span: Span) -> Span {
    let start = line_start(text, span.start);
    let before = &text[start as usize..span.start as usize];
    let after_end = text[span.end as usize..]
        .find('\n')
        .map_or(text.len(), |i| span.end as usize + i);
    let after = &text[span.end as usize..after_end];

    if before.trim().is_empty() && after.trim().is_empty() {
        let end = if after_end < text.len() { after_end + 1 } else { after_end };
        Span::new(start, end as u32)
    } else {
        let trailing = after.len() - after.trim_start_matches([' ', '\t']).len();
        Span::new(span.start, span.end + trailing as u32)
    }
}

pub fn strip_parens<'n, 'a>(mut expr: &'n Expression<'a>) -> &'n Expression<'a> {
    while let Expression::ParenthesizedExpression(p) = expr {
        expr = &p.expression;
    }
    expr
}

pub fn identifier_name<'n>(expr: &'n Expression<'_>) -> Option<&'n str> {
    match strip_parens(expr) {
        Expression::Identifier(id) => Some(id.name.as_str()),
        _ => None,
    }
}

pub fn string_value<'n>(expr: &'n Expression<'_>) -> Option<&'n str> {
    match strip_parens(expr) {
        Expression::StringLiteral(s) => Some(s.value.as_str()),
        _ => None,
    }
}

/// `a.b.c` for identifier / static member chains.
pub fn dotted_name(expr: &Expression<'_>) -> Option<String> {
    match strip_parens(expr) {
        Expression::Identifier(id) => Some(id.name.to_string()),
        Expression::StaticMemberExpression(m) => {
            dotted_name(&m.object).map(|object| format!("{}.{}", object, m.property.name))
        }
        _ => None,
    }
}

pub fn callee_name(call: &CallExpression<'_>) -> Option<String> {
    dotted_name(&call.callee)
}

pub fn is_effect_hook(call: &CallExpression<'_>) -> bool {
    matches!(
        callee_name(call).as_deref(),
        Some("useEffect" | "useLayoutEffect" | "React.useEffect" | "React.useLayoutEffect")
    )
}

pub fn argument_expression<'n, 'a>(args: &'n [Argument<'a>], index: usize) -> Option<&'n Expression<'a>> {
    args.get(index).and_then(|a| a.as_expression())
}

/// `typeof root` as an operand.
fn is_typeof_of(expr: &Expression<'_>, root: &str) -> bool {
    match strip_parens(expr) {
        Expression::UnaryExpression(u) => {
            u.operator == UnaryOperator::Typeof && identifier_name(&u.argument) == Some(root)
        }
        _ => false,
    }
}

fn compares_typeof_undefined(expr: &Expression<'_>, root: &str, operators: &[BinaryOperator]) -> bool {
    match strip_parens(expr) {
        Expression::BinaryExpression(b) if operators.contains(&b.operator) => {
            (is_typeof_of(&b.left, root) && string_value(&b.right) == Some("undefined"))
                || (is_typeof_of(&b.right, root) && string_value(&b.left) == Some("undefined"))
        }
        _ => false,
    }
}

/// True when `test` being truthy implies `root` is defined.
pub fn tests_defined(test: &Expression<'_>, root: &str) -> bool {
    match strip_parens(test) {
        Expression::LogicalExpression(l) if l.operator == LogicalOperator::And => {
            tests_defined(&l.left, root) || tests_defined(&l.right, root)
        }
        other => compares_typeof_undefined(
            other,
            root,
            &[BinaryOperator::StrictInequality, BinaryOperator::Inequality],
        ),
    }
}

/// True when `test` being falsy implies `root` is defined.
pub fn tests_undefined(test: &Expression<'_>, root: &str) -> bool {
    match strip_parens(test) {
        Expression::LogicalExpression(l) if l.operator == LogicalOperator::Or => {
            tests_undefined(&l.left, root) || tests_undefined(&l.right, root)
        }
        other => compares_typeof_undefined(
            other,
            root,
            &[BinaryOperator::StrictEquality, BinaryOperator::Equality],
        ),
    }
}

/// `if (typeof root === "undefined") return;` (or throw), braced or not.
pub fn is_early_exit_guard(stmt: &Statement<'_>, root: &str) -> bool {
    let Statement::IfStatement(s) = stmt else {
        return false;
    };
    if s.alternate.is_some() || !tests_undefined(&s.test, root) {
        return false;
    }
    let exits = |st: &Statement<'_>| {
        matches!(st, Statement::ReturnStatement(_) | Statement::ThrowStatement(_))
    };
    match &s.consequent {
        Statement::BlockStatement(b) => b.body.last().is_some_and(exits),
        other => exits(other),
    }
}

pub fn element_name<'n>(name: &'n JSXElementName<'_>) -> Option<&'n str> {
    match name {
        JSXElementName::Identifier(id) => Some(id.name.as_str()),
        JSXElementName::IdentifierReference(id) => Some(id.name.as_str()),
        _ => None,
    }
}

pub fn attribute_name<'n>(item: &'n JSXAttributeItem<'_>) -> Option<&'n str> {
    match item {
        JSXAttributeItem::Attribute(attr) => match &attr.name {
            JSXAttributeName::Identifier(id) => Some(id.name.as_str()),
            JSXAttributeName::NamespacedName(_) => None,
        },
        JSXAttributeItem::SpreadAttribute(_) => None,
    }
}

pub fn has_attribute(opening: &JSXOpeningElement<'_>, name: &str) -> bool {
    opening
        .attributes
        .iter()
        .any(|item| attribute_name(item) == Some(name))
}

pub fn has_spread_attribute(opening: &JSXOpeningElement<'_>) -> bool {
    opening
        .attributes
        .iter()
        .any(|item| matches!(item, JSXAttributeItem::SpreadAttribute(_)))
}

/// Offset right after the hashbang line and the directive prologue.
pub fn prologue_end(program: &Program<'_>, text: &str) -> u32 {
    if let Some(last) = program.directives.last() {
        return line_end_after(text, last.span.end);
    }
    match &program.hashbang {
        Some(hashbang) => line_end_after(text, hashbang.span.end),
        None => 0,
    }
}

/// Offset right after the last top-level import, or the prologue end.
pub fn imports_end(program: &Program<'_>, text: &str) -> u32 {
    program
        .body
        .iter()
        .filter(|s| matches!(s, Statement::ImportDeclaration(_)))
        .map(|s| line_end_after(text, s.span().end))
        .max()
        .unwrap_or_else(|| prologue_end(program, text))
}

/// Offset after the newline that ends the line containing `offset`.
pub fn line_end_after(text: &str, offset: u32) -> u32 {
    text[offset as usize..]
        .find('\n')
        .map_or(text.len() as u32, |i| offset + i as u32 + 1)
}

/// Local binding names introduced by top-level imports.
pub fn imported_locals<'n>(program: &'n Program<'_>) -> Vec<&'n str> {
    let mut names = Vec::new();
    for stmt in &program.body {
        if let Statement::ImportDeclaration(decl) = stmt {
            if let Some(specifiers) = &decl.specifiers {
                for spec in specifiers {
                    names.push(specifier_local(spec));
                }
            }
        }
    }
    names
}

pub fn specifier_local<'n>(spec: &'n ImportDeclarationSpecifier<'_>) -> &'n str {
    match spec {
        ImportDeclarationSpecifier::ImportSpecifier(s) => s.local.name.as_str(),
        ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => s.local.name.as_str(),
        ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => s.local.name.as_str(),
    }
}

/// Quote character used by a string literal's source text.
pub fn quote_of(raw: &str) -> char {
    match raw.chars().next() {
        Some('\'') => '\'',
        _ => '"',
    }
}
