//! `'use client'` placement.
//!
//! A component file that calls client hooks or wires DOM event handlers must
//! open with exactly one `'use client'` directive. Misplaced and duplicate
//! copies are removed; a file that already has it in first position with no
//! duplicates is left alone.

use oxc_ast::ast::{Expression, Program, Statement};
use oxc_span::{GetSpan, Span};

use crate::api::ChangeKind;

use super::syntax::{attribute_name, callee_name, line_end_after, removal_range};
use super::walk::{walk_program, Node, NodeVisitor};
use super::{Rewriter, TreeVisitor, VisitContext};

pub const CLIENT_DIRECTIVE: &str = "use client";

pub const CLIENT_HOOKS: [&str; 15] = [
    "useState",
    "useEffect",
    "useLayoutEffect",
    "useReducer",
    "useRef",
    "useCallback",
    "useMemo",
    "useContext",
    "useTransition",
    "useDeferredValue",
    "useImperativeHandle",
    "useSyncExternalStore",
    "useRouter",
    "usePathname",
    "useSearchParams",
];

pub fn is_client_hook(name: &str) -> bool {
    let name = name.strip_prefix("React.").unwrap_or(name);
    CLIENT_HOOKS.contains(&name)
}

/// `onClick`, `onChange`, ...
pub fn is_event_handler_attribute(name: &str) -> bool {
    name.strip_prefix("on")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_uppercase())
}

#[derive(Default)]
struct ClientUsage {
    found: bool,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for ClientUsage {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        if self.found {
            return;
        }
        match node {
            Node::Expression(Expression::CallExpression(c)) => {
                self.found = callee_name(c).is_some_and(|name| is_client_hook(&name));
            }
            Node::JSXElement(el) => {
                self.found = el
                    .opening_element
                    .attributes
                    .iter()
                    .filter_map(|item| attribute_name(item))
                    .any(is_event_handler_attribute);
            }
            _ => {}
        }
    }
}

pub fn uses_client_features(program: &Program<'_>) -> bool {
    let mut usage = ClientUsage::default();
    walk_program(program, &mut usage);
    usage.found
}

pub fn has_directive(program: &Program<'_>, name: &str) -> bool {
    program.directives.iter().any(|d| d.directive.as_str() == name)
}

pub struct ClientDirective;

impl TreeVisitor for ClientDirective {
    fn name(&self) -> &'static str {
        "client-directive"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        let program = cx.program;
        if cx.file.is_test()
            || cx.file.in_pages_dir()
            || has_directive(program, "use server")
            || !uses_client_features(program)
        {
            return;
        }

        let in_place = program
            .directives
            .first()
            .is_some_and(|d| d.directive.as_str() == CLIENT_DIRECTIVE);

        let mut misplaced: Vec<Span> = program
            .directives
            .iter()
            .skip(usize::from(in_place))
            .filter(|d| d.directive.as_str() == CLIENT_DIRECTIVE)
            .map(|d| d.span)
            .collect();
        misplaced.extend(program.body.iter().filter_map(|stmt| match stmt {
            Statement::ExpressionStatement(s) => match &s.expression {
                Expression::StringLiteral(lit) if lit.value.as_str() == CLIENT_DIRECTIVE => {
                    Some(stmt.span())
                }
                _ => None,
            },
            _ => None,
        }));

        if in_place && misplaced.is_empty() {
            return;
        }

        for span in &misplaced {
            rw.remove(removal_range(cx.text, *span));
        }
        if !in_place {
            let at = program
                .hashbang
                .as_ref()
                .map_or(0, |h| line_end_after(cx.text, h.span.end));
            rw.insert(at, format!("'{}';\n", CLIENT_DIRECTIVE));
            rw.change(
                ChangeKind::DirectivePlaced,
                "added 'use client' as the first statement",
                at,
            );
        }
        for span in misplaced {
            rw.change(
                ChangeKind::DirectivePlaced,
                "removed a misplaced or duplicate 'use client'",
                span.start,
            );
        }
    }
}
