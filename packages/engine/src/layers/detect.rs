//! Automatic layer selection.

use once_cell::sync::Lazy;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Expression, Statement};
use regex::Regex;

use crate::transform::directive::{is_client_hook, is_event_handler_attribute};
use crate::transform::guards::browser_global;
use crate::transform::syntax::{attribute_name, callee_name};
use crate::transform::{parse, walk_program, Node, NodeVisitor, ParseMode, SourceFile};

use super::LayerSet;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Signals {
    jsx: bool,
    browser_globals: bool,
    client_features: bool,
    framework_apis: bool,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for Signals {
    fn enter(&mut self, node: Node<'n, 'a>, _ancestors: &[Node<'n, 'a>]) {
        match node {
            Node::JSXElement(el) => {
                self.jsx = true;
                self.client_features |= el
                    .opening_element
                    .attributes
                    .iter()
                    .filter_map(|item| attribute_name(item))
                    .any(is_event_handler_attribute);
            }
            Node::Expression(Expression::JSXFragment(_)) => self.jsx = true,
            Node::Expression(Expression::Identifier(id)) => {
                self.browser_globals |= browser_global(id.name.as_str()).is_some();
            }
            Node::Expression(Expression::CallExpression(call)) => {
                if let Some(name) = callee_name(call) {
                    self.client_features |= is_client_hook(&name);
                    self.framework_apis |= name == "ReactDOM.render";
                }
            }
            Node::Statement(Statement::ImportDeclaration(decl)) => {
                let source = decl.source.value.as_str();
                self.framework_apis |= source == "next" || source.starts_with("next/");
            }
            _ => {}
        }
    }
}

static JSX_HINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z][\w.]*[\s/>]|<>").unwrap());
static BROWSER_GLOBAL_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:window|document|localStorage|sessionStorage|navigator)\b").unwrap()
});
static CLIENT_HINT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\buse(?:State|Effect|LayoutEffect|Reducer|Ref|Callback|Memo|Context|Router)\s*\(|\son[A-Z]\w*=").unwrap()
});
static FRAMEWORK_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"from\s+['"]next(?:/[^'"]*)?['"]|ReactDOM\.render\s*\("#).unwrap());

impl Signals {
    /// Text heuristics for sources the parser gave up on.
    fn from_text(code: &str) -> Self {
        Self {
            jsx: JSX_HINT.is_match(code),
            browser_globals: BROWSER_GLOBAL_HINT.is_match(code),
            client_features: CLIENT_HINT.is_match(code),
            framework_apis: FRAMEWORK_HINT.is_match(code),
        }
    }
}

/// Layers worth running on `file`.
///
/// Config files get layer 1 only, other JSON nothing. Sources always get
/// patterns and adaptive, plus whichever of the rest their content calls for.
pub fn auto_select(file: &SourceFile, code: &str) -> LayerSet {
    if file.config_kind().is_some() {
        return LayerSet::CONFIG;
    }
    if !file.is_script() {
        return LayerSet::empty();
    }

    let allocator = Allocator::default();
    let signals = match parse(&allocator, code, file, ParseMode::Recover) {
        Ok(program) => {
            let mut signals = Signals::default();
            walk_program(&program, &mut signals);
            signals
        }
        Err(_) => Signals::from_text(code),
    };

    let mut layers = LayerSet::PATTERNS | LayerSet::ADAPTIVE;
    layers.set(LayerSet::COMPONENTS, signals.jsx);
    layers.set(LayerSet::HYDRATION, signals.browser_globals);
    layers.set(
        LayerSet::FRAMEWORK,
        signals.client_features || signals.framework_apis,
    );
    layers.set(LayerSet::TESTING, file.is_test());
    layers
}
