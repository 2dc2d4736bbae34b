//! Regex Fallback
//!
//! Ordered, layer-scoped pattern rules for when the tree pass cannot run or
//! its output does not validate. Rules see raw text, so each one is written
//! to leave already-fixed code alone; the layer runner validates whatever
//! they produce before it is accepted.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::api::{Change, ChangeKind};
use crate::layers::LayerId;
use crate::transform::directive::CLIENT_HOOKS;
use crate::transform::lexical::decode_string_literal;
use crate::transform::testing::{DOM_MATCHERS, JEST_DOM};
use crate::transform::{Rewrite, SourceFile};

pub enum Replacement {
    /// Expanded with `$1` / `${name}` capture references.
    Literal(&'static str),
    /// Computed per match; returning the match text unchanged skips it.
    Rewrite(fn(&Captures<'_>) -> String),
}

pub enum RuleKind {
    Pattern {
        regex: Regex,
        replacement: Replacement,
    },
    /// Whole-text rewrite returning the new text and the number of sites.
    Scan(fn(&str, &SourceFile) -> Option<(String, usize)>),
}

pub struct FallbackRule {
    pub name: &'static str,
    pub change: ChangeKind,
    pub kind: RuleKind,
}

impl FallbackRule {
    fn pattern(name: &'static str, change: ChangeKind, regex: &str, replacement: Replacement) -> Self {
        Self {
            name,
            change,
            kind: RuleKind::Pattern {
                regex: Regex::new(regex).unwrap(),
                replacement,
            },
        }
    }

    fn scan(
        name: &'static str,
        change: ChangeKind,
        scan: fn(&str, &SourceFile) -> Option<(String, usize)>,
    ) -> Self {
        Self {
            name,
            change,
            kind: RuleKind::Scan(scan),
        }
    }

    /// New text and the number of sites changed, or `None` when nothing changed.
    pub fn apply(&self, text: &str, file: &SourceFile) -> Option<(String, usize)> {
        let (code, count) = match &self.kind {
            RuleKind::Pattern { regex, replacement } => replace_counting(regex, replacement, text),
            RuleKind::Scan(scan) => scan(text, file)?,
        };
        (count > 0 && code != text).then_some((code, count))
    }
}

fn replace_counting(regex: &Regex, replacement: &Replacement, text: &str) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut count = 0;
    for caps in regex.captures_iter(text) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let replaced = match replacement {
            Replacement::Literal(template) => {
                let mut expanded = String::new();
                caps.expand(template, &mut expanded);
                expanded
            }
            Replacement::Rewrite(rewrite) => rewrite(&caps),
        };
        if replaced != whole.as_str() {
            count += 1;
        }
        out.push_str(&text[last..whole.start()]);
        out.push_str(&replaced);
        last = whole.end();
    }
    out.push_str(&text[last..]);
    (out, count)
}

/// Run every rule of `layer` in order.
pub fn apply_fallback(layer: LayerId, text: &str, file: &SourceFile) -> Rewrite {
    let mut code = text.to_string();
    let mut changes = Vec::new();
    for rule in rules_for(layer) {
        if let Some((next, count)) = rule.apply(&code, file) {
            changes.extend(
                (0..count).map(|_| Change::new(rule.change, format!("{} (pattern fallback)", rule.name))),
            );
            code = next;
        }
    }
    Rewrite {
        code,
        changes,
        warnings: Vec::new(),
    }
}

pub fn rules_for(layer: LayerId) -> &'static [FallbackRule] {
    match layer {
        LayerId::Config => &CONFIG_RULES,
        LayerId::Patterns => &PATTERN_RULES,
        LayerId::Components => &COMPONENT_RULES,
        LayerId::Hydration => &HYDRATION_RULES,
        LayerId::Framework => &FRAMEWORK_RULES,
        LayerId::Testing => &TESTING_RULES,
        LayerId::Adaptive => &[],
    }
}

static CONFIG_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        FallbackRule::pattern(
            "raised compilerOptions.target to es2020",
            ChangeKind::ConfigNormalized,
            r#"("target"\s*:\s*")(?i:es3|es5)(")"#,
            Replacement::Literal("${1}es2020${2}"),
        ),
        FallbackRule::pattern(
            "removed experimental.appDir",
            ChangeKind::ConfigNormalized,
            r"(?m)^[ \t]*appDir\s*:\s*(?:true|false)\s*,?[ \t]*\r?\n",
            Replacement::Literal(""),
        ),
        FallbackRule::pattern(
            "removed swcMinify",
            ChangeKind::ConfigNormalized,
            r"(?m)^[ \t]*swcMinify\s*:\s*(?:true|false)\s*,?[ \t]*\r?\n",
            Replacement::Literal(""),
        ),
    ]
});

static PATTERN_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        // The leading group keeps JSX attribute values (`alt="..."`) out.
        FallbackRule::pattern(
            "decoded HTML entities in a string literal",
            ChangeKind::EntityDecoded,
            r#"(^|[^=\\])("(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*')"#,
            Replacement::Rewrite(|caps| match decode_string_literal(&caps[2]) {
                Some(decoded) => format!("{}{}", &caps[1], decoded),
                None => caps[0].to_string(),
            }),
        ),
        FallbackRule::scan(
            "removed console statement",
            ChangeKind::DiagnosticRemoved,
            remove_diagnostics,
        ),
        FallbackRule::scan("replaced `var` with `let`", ChangeKind::ApiMigrated, var_to_let),
    ]
});

/// One `console.log/debug/info(...)` call filling a whole line. Arguments may
/// nest one level of parentheses.
pub const DIAGNOSTIC_STATEMENT_SOURCE: &str =
    r"[ \t]*console\.(?:log|debug|info)\((?:[^()\n]|\([^()\n]*\))*\);?[ \t]*\r?\n";

static DIAGNOSTIC_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^{}$", DIAGNOSTIC_STATEMENT_SOURCE)).unwrap());

/// Drops diagnostic lines only where the last code line above ends a
/// statement or opens a block. Under a brace-less `if` the line stays.
fn remove_diagnostics(text: &str, _file: &SourceFile) -> Option<(String, usize)> {
    let mut out = String::with_capacity(text.len());
    let mut count = 0;
    let mut at_statement_start = true;
    for line in text.split_inclusive('\n') {
        if at_statement_start && DIAGNOSTIC_STATEMENT.is_match(line) {
            count += 1;
            continue;
        }
        out.push_str(line);
        let code = line.trim();
        if !code.is_empty() && !code.starts_with("//") {
            at_statement_start = code.ends_with([';', '{', '}']);
        }
    }
    (count > 0).then_some((out, count))
}

static TOP_LEVEL_VAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^var\s+([A-Za-z_$][\w$]*)\s*[=;\n]").unwrap());

/// Top-level `var` declarations whose name is declared once and not used
/// above the declaration.
fn var_to_let(text: &str, _file: &SourceFile) -> Option<(String, usize)> {
    let declarations: Vec<(usize, &str)> = TOP_LEVEL_VAR
        .captures_iter(text)
        .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())))
        .collect();
    if declarations.is_empty() {
        return None;
    }

    let mut out = text.to_string();
    let mut count = 0;
    // Back to front so earlier offsets stay valid.
    for &(start, name) in declarations.iter().rev() {
        if declarations.iter().filter(|(_, n)| *n == name).count() != 1 {
            continue;
        }
        let Ok(reference) = Regex::new(&format!(r"(^|[^\w$.]){}($|[^\w$])", regex::escape(name))) else {
            continue;
        };
        if reference.is_match(&text[..start]) {
            continue;
        }
        out.replace_range(start..start + 3, "let");
        count += 1;
    }
    Some((out, count))
}

static COMPONENT_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        FallbackRule::pattern(
            "added alt=\"\" to <img>",
            ChangeKind::AttributeAdded,
            r"<img\b([^>]*)>",
            Replacement::Rewrite(|caps| with_attribute(caps, "img", "alt", "alt=\"\"")),
        ),
        FallbackRule::pattern(
            "added type=\"button\" to <button>",
            ChangeKind::AttributeAdded,
            r"<button\b([^>]*)>",
            Replacement::Rewrite(|caps| with_attribute(caps, "button", "type", "type=\"button\"")),
        ),
        FallbackRule::pattern(
            "added key={index} to an element rendered by .map()",
            ChangeKind::KeyAdded,
            r"\.map\(\s*\(?\s*([A-Za-z_$][\w$]*)\s*\)?\s*=>\s*(\(?\s*)<([A-Za-z][\w.]*)([^>]*)>",
            Replacement::Rewrite(|caps| {
                if caps[4].contains("key=") {
                    return caps[0].to_string();
                }
                format!(
                    ".map(({}, index) => {}<{} key={{index}}{}>",
                    &caps[1], &caps[2], &caps[3], &caps[4]
                )
            }),
        ),
    ]
});

fn with_attribute(caps: &Captures<'_>, tag: &str, name: &str, attribute: &str) -> String {
    let rest = &caps[1];
    if rest.contains(&format!("{}=", name)) || rest.contains("{...") {
        return caps[0].to_string();
    }
    format!("<{} {}{}>", tag, attribute, rest)
}

static HYDRATION_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        FallbackRule::pattern(
            "guarded a localStorage.getItem assignment",
            ChangeKind::GuardAdded,
            r"(=\s*)(localStorage\.getItem\([^()\n]*\))",
            Replacement::Literal(r#"${1}(typeof localStorage !== "undefined" ? ${2} : null)"#),
        ),
        FallbackRule::pattern(
            "guarded a browser global read",
            ChangeKind::GuardAdded,
            r"([=(,:]\s*)(window|document)((?:\.[A-Za-z_$][\w$]*)+)(\s*[;),])",
            Replacement::Literal(r#"${1}(typeof ${2} !== "undefined" ? ${2}${3} : undefined)${4}"#),
        ),
    ]
});

static FRAMEWORK_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![
        FallbackRule::scan(
            "placed 'use client' as the first statement",
            ChangeKind::DirectivePlaced,
            place_client_directive,
        ),
        FallbackRule::scan(
            "replaced ReactDOM.render with createRoot().render",
            ChangeKind::ApiMigrated,
            create_root,
        ),
    ]
});

static CLIENT_USAGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:{})\s*\(|\son[A-Z]\w*=\{{",
        CLIENT_HOOKS.join("|")
    ))
    .unwrap()
});
static USE_SERVER: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?m)^\s*['"]use server['"]"#).unwrap());
static USE_CLIENT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?m)^[ \t]*['"]use client['"];?[ \t]*(?:\r?\n|$)"#).unwrap());

fn place_client_directive(text: &str, file: &SourceFile) -> Option<(String, usize)> {
    if file.is_test() || file.in_pages_dir() || USE_SERVER.is_match(text) || !CLIENT_USAGE.is_match(text) {
        return None;
    }
    let at = if text.starts_with("#!") {
        text.find('\n').map_or(text.len(), |i| i + 1)
    } else {
        0
    };
    let (head, body) = text.split_at(at);
    let stripped = USE_CLIENT_LINE.replace_all(body, "");
    let placed = format!("{}'use client';\n{}", head, stripped);
    (placed != text).then_some((placed, 1))
}

static REACT_DOM_RENDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"ReactDOM\.render\(\s*([^,]+?)\s*,\s*([^,()]+?)\s*\)").unwrap());
static REACT_DOM_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(import\s+(?:\*\s+as\s+)?ReactDOM\s+from\s+)(['"])react-dom(['"])"#).unwrap());

fn create_root(text: &str, _file: &SourceFile) -> Option<(String, usize)> {
    let count = REACT_DOM_RENDER.find_iter(text).count();
    if count == 0 {
        return None;
    }
    let rendered = REACT_DOM_RENDER.replace_all(text, "ReactDOM.createRoot(${2}).render(${1})");
    let imported = REACT_DOM_IMPORT.replace_all(&rendered, "${1}${2}react-dom/client${3}");
    Some((imported.into_owned(), count))
}

static TESTING_RULES: Lazy<Vec<FallbackRule>> = Lazy::new(|| {
    vec![FallbackRule::scan(
        "imported @testing-library/jest-dom matchers",
        ChangeKind::ImportAdded,
        jest_dom_import,
    )]
});

static DOM_MATCHER_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\.(?:{})\(", DOM_MATCHERS.join("|"))).unwrap());
static IMPORT_STATEMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^import\b[^;]*;[ \t]*(?:\r?\n|$)").unwrap());

fn jest_dom_import(text: &str, _file: &SourceFile) -> Option<(String, usize)> {
    if text.contains(JEST_DOM) || !DOM_MATCHER_CALL.is_match(text) {
        return None;
    }
    let at = IMPORT_STATEMENT.find_iter(text).last().map_or(0, |m| m.end());
    let mut out = String::with_capacity(text.len() + 40);
    out.push_str(&text[..at]);
    if at > 0 && !text[..at].ends_with('\n') {
        out.push('\n');
    }
    out.push_str(&format!("import \"{}\";\n", JEST_DOM));
    out.push_str(&text[at..]);
    Some((out, 1))
}
