//! Framework API migrations: Next.js navigation imports, `<Link>` children and
//! the React 18 root API.

use oxc_ast::ast::{CallExpression, Expression, ImportDeclarationSpecifier, JSXChild, JSXElement, Statement};
use oxc_span::{GetSpan, Span};

use crate::api::ChangeKind;

use super::directive::{has_directive, CLIENT_DIRECTIVE};
use super::syntax::{attribute_name, callee_name, element_name, has_attribute, quote_of, slice};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

/// `next/router` -> `next/navigation` in `app/` client components.
pub struct NavigationImports;

impl TreeVisitor for NavigationImports {
    fn name(&self) -> &'static str {
        "navigation-imports"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        if !cx.file.in_app_dir() || !has_directive(cx.program, CLIENT_DIRECTIVE) {
            return;
        }
        for stmt in &cx.program.body {
            let Statement::ImportDeclaration(decl) = stmt else {
                continue;
            };
            if decl.source.value.as_str() != "next/router" {
                continue;
            }
            let quote = quote_of(slice(cx.text, decl.source.span));
            rw.replace(decl.source.span, format!("{quote}next/navigation{quote}"));
            rw.change(
                ChangeKind::ApiMigrated,
                "moved next/router import to next/navigation",
                decl.source.span.start,
            );
        }
    }
}

#[derive(Default)]
struct Collect<'n, 'a> {
    links: Vec<&'n JSXElement<'a>>,
    renders: Vec<&'n CallExpression<'a>>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Collect<'n, 'a> {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::JSXElement(el) if element_name(&el.opening_element.name) == Some("Link") => {
                self.links.push(el);
            }
            Node::Expression(Expression::CallExpression(c))
                if callee_name(c).as_deref() == Some("ReactDOM.render") =>
            {
                self.renders.push(c);
            }
            _ => {}
        }
    }
}

/// The lone `<a>` child of a `<Link>`, ignoring whitespace.
fn anchor_child<'n, 'a>(link: &'n JSXElement<'a>) -> Option<&'n JSXElement<'a>> {
    let mut anchor = None;
    for child in &link.children {
        match child {
            JSXChild::Text(t) if t.value.trim().is_empty() => {}
            JSXChild::Element(el) if anchor.is_none() => anchor = Some(&**el),
            _ => return None,
        }
    }
    anchor.filter(|a| element_name(&a.opening_element.name) == Some("a"))
}

/// `<Link href="/x"><a className="c">x</a></Link>` -> `<Link href="/x" className="c">x</Link>`.
pub struct LinkChildren;

impl TreeVisitor for LinkChildren {
    fn name(&self) -> &'static str {
        "link-children"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut found = Collect::default();
        walk_program(cx.program, &mut found);

        for link in found.links {
            let opening = &link.opening_element;
            if has_attribute(opening, "legacyBehavior") {
                continue;
            }
            let Some(anchor) = anchor_child(link) else {
                continue;
            };
            let Some(closing) = &anchor.closing_element else {
                continue;
            };

            let moved: Vec<&str> = anchor
                .opening_element
                .attributes
                .iter()
                .filter(|item| attribute_name(item).map_or(true, |name| !has_attribute(opening, name)))
                .map(|item| slice(cx.text, item.span()))
                .collect();
            if !moved.is_empty() {
                let at = opening
                    .attributes
                    .last()
                    .map_or_else(|| opening.name.span().end, |a| a.span().end);
                rw.insert(at, format!(" {}", moved.join(" ")));
            }
            rw.remove(anchor.opening_element.span);
            rw.remove(closing.span);
            rw.change(
                ChangeKind::ApiMigrated,
                "moved <a> attributes onto <Link> and dropped the anchor",
                anchor.span.start,
            );
        }
    }
}

/// `ReactDOM.render(el, root)` -> `ReactDOM.createRoot(root).render(el)`.
pub struct CreateRoot;

impl TreeVisitor for CreateRoot {
    fn name(&self) -> &'static str {
        "create-root"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let mut found = Collect::default();
        walk_program(cx.program, &mut found);
        if found.renders.is_empty() {
            return;
        }

        let mut migrated = false;
        for call in found.renders {
            let Expression::StaticMemberExpression(member) = &call.callee else {
                continue;
            };
            let [element, container] = &call.arguments[..] else {
                continue;
            };
            let container_text = slice(cx.text, container.span());
            rw.replace(member.property.span, format!("createRoot({}).render", container_text));
            rw.remove(Span::new(element.span().end, container.span().end));
            rw.change(
                ChangeKind::ApiMigrated,
                "replaced ReactDOM.render with createRoot().render",
                call.span.start,
            );
            migrated = true;
        }
        if !migrated {
            return;
        }

        for stmt in &cx.program.body {
            let Statement::ImportDeclaration(decl) = stmt else {
                continue;
            };
            let binds_react_dom = decl.specifiers.iter().flatten().any(|s| {
                matches!(
                    s,
                    ImportDeclarationSpecifier::ImportDefaultSpecifier(d)
                        if d.local.name.as_str() == "ReactDOM"
                ) || matches!(
                    s,
                    ImportDeclarationSpecifier::ImportNamespaceSpecifier(n)
                        if n.local.name.as_str() == "ReactDOM"
                )
            });
            if decl.source.value.as_str() == "react-dom" && binds_react_dom {
                let quote = quote_of(slice(cx.text, decl.source.span));
                rw.replace(decl.source.span, format!("{quote}react-dom/client{quote}"));
                rw.change(
                    ChangeKind::ApiMigrated,
                    "imported ReactDOM from react-dom/client",
                    decl.source.span.start,
                );
            }
        }
    }
}
