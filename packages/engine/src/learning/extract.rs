//! Diff mining
//!
//! Compares a layer's input and output and recognizes a small, fixed set of
//! rewrite shapes. Each recognized shape becomes a candidate rule written in
//! the stored pattern dialect. Anything else yields nothing.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::fallback::DIAGNOSTIC_STATEMENT_SOURCE;
use crate::layers::LayerId;

use super::matcher::{escape_replacement, join_pattern};
use super::LearnedRule;

pub const DIRECTIVE_CONFIDENCE: f64 = 0.9;
pub const WRAPPER_CONFIDENCE: f64 = 0.6;
pub const MEMO_CONFIDENCE: f64 = 0.6;
pub const DIAGNOSTIC_CONFIDENCE: f64 = 0.8;

/// Leading whitespace and the first character of a file that does not start
/// with a directive or a hashbang.
const DIRECTIVE_SOURCE: &str = r#"^(\s*)([^'"\s#])"#;
const SELF_CLOSING_RETURN_SOURCE: &str = r"return\s+(<[A-Z][\w.]*(?:\s[^<>]*)?/>);";
const DEFAULT_EXPORT_SOURCE: &str = r"export default ([A-Z][\w$]*);";

/// A run of diagnostic lines after a line ending in `;`, `{` or `}` (or at
/// the start of the file), with blank and comment lines in between kept.
static DIAGNOSTIC_RUN_SOURCE: Lazy<String> = Lazy::new(|| {
    format!(
        r"(^|[{{}};][ \t]*\r?\n)((?:[ \t]*(?://[^\n]*)?\r?\n)*)(?:{})+",
        DIAGNOSTIC_STATEMENT_SOURCE
    )
});

static LEADING_DIRECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^(?:#![^\n]*\n)?\s*(['"])use client['"];?"#).unwrap());

/// `return <Wrapper …><Inner … /></Wrapper>;`
static WRAPPED_RETURN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"return\s+(<([A-Z][\w.]*)(?:\s[^<>]*)?>)\s*(<[A-Z][\w.]*(?:\s[^<>]*)?/>)\s*</([A-Z][\w.]*)>\s*;",
    )
    .unwrap()
});

static WRAPPED_DEFAULT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"export default ((?:React\.)?memo)\(\s*([A-Z][\w$]*)\s*\);").unwrap()
});

static DIAGNOSTIC_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("(?m)^{}", DIAGNOSTIC_STATEMENT_SOURCE)).unwrap());

/// Candidate rules for the shapes found between `before` and `after`.
pub fn extract_patterns(before: &str, after: &str, layer: LayerId) -> Vec<LearnedRule> {
    if before == after {
        return Vec::new();
    }
    [
        directive_insertion(before, after, layer),
        wrapper_insertion(before, after, layer),
        memo_wrapping(before, after, layer),
        diagnostic_removal(before, after, layer),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn directive_insertion(before: &str, after: &str, layer: LayerId) -> Option<LearnedRule> {
    if LEADING_DIRECTIVE.is_match(before) {
        return None;
    }
    let quote = LEADING_DIRECTIVE.captures(after)?.get(1)?.as_str();
    Some(LearnedRule::new(
        join_pattern(DIRECTIVE_SOURCE, ""),
        format!("{q}use client{q};\n$1$2", q = quote),
        DIRECTIVE_CONFIDENCE,
        layer,
        "insert the 'use client' directive at the top of the file",
    ))
}

fn wrapper_insertion(before: &str, after: &str, layer: LayerId) -> Option<LearnedRule> {
    let captures = WRAPPED_RETURN
        .captures_iter(after)
        .find(|c| c[2] == c[4] && before.contains(&c[3]) && !before.contains(&c[0]))?;
    let (opening, name) = (&captures[1], &captures[2]);
    Some(LearnedRule::new(
        join_pattern(SELF_CLOSING_RETURN_SOURCE, "g"),
        format!(
            "return {}$1</{}>;",
            escape_replacement(opening),
            escape_replacement(name)
        ),
        WRAPPER_CONFIDENCE,
        layer,
        format!("wrap returned self-closing elements in <{}>", name),
    ))
}

fn memo_wrapping(before: &str, after: &str, layer: LayerId) -> Option<LearnedRule> {
    let captures = WRAPPED_DEFAULT_EXPORT.captures_iter(after).find(|c| {
        before.contains(&format!("export default {};", &c[2])) && !before.contains(&c[0])
    })?;
    let callee = &captures[1];
    Some(LearnedRule::new(
        join_pattern(DEFAULT_EXPORT_SOURCE, ""),
        format!("export default {}($1);", callee),
        MEMO_CONFIDENCE,
        layer,
        format!("wrap the default component export in {}", callee),
    ))
}

fn diagnostic_removal(before: &str, after: &str, layer: LayerId) -> Option<LearnedRule> {
    let removed = DIAGNOSTIC_LINE.find_iter(before).count();
    if removed == 0 || DIAGNOSTIC_LINE.find_iter(after).count() >= removed {
        return None;
    }
    Some(LearnedRule::new(
        join_pattern(&DIAGNOSTIC_RUN_SOURCE, "g"),
        "$1$2",
        DIAGNOSTIC_CONFIDENCE,
        layer,
        "remove console.log/debug/info lines",
    ))
}
