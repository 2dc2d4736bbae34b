//! Compiling stored `"<source>/<flags>"` patterns into matchers.
//!
//! Stored rules use the pattern and replacement dialect of JavaScript regular
//! expressions, so the flag letters and `$` references are translated here.

use std::borrow::Cow;

use regex::Regex;

use crate::error::{EngineError, Result};

/// A rule ready to run against source text.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    regex: Regex,
    global: bool,
    replacement: String,
}

impl CompiledRule {
    pub fn compile(pattern: &str, replacement: &str) -> Result<Self> {
        let (source, flags) = split_pattern(pattern)?;

        let mut global = false;
        let mut inline = String::new();
        for flag in flags.chars() {
            match flag {
                'g' => global = true,
                'i' | 'm' | 's' => {
                    if !inline.contains(flag) {
                        inline.push(flag);
                    }
                }
                // Unicode is always on; match indices are never exposed.
                'u' | 'd' => {}
                other => {
                    return Err(rule_error(pattern, format!("unsupported flag '{}'", other)));
                }
            }
        }

        let source = if inline.is_empty() {
            source.to_string()
        } else {
            format!("(?{}){}", inline, source)
        };
        let regex = Regex::new(&source).map_err(|e| rule_error(pattern, e.to_string()))?;

        Ok(Self {
            regex,
            global,
            replacement: translate_replacement(replacement),
        })
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Replace the first match, or every match for `g` rules. `None` when
    /// nothing matched.
    pub fn apply(&self, code: &str) -> Option<String> {
        let replaced = if self.global {
            self.regex.replace_all(code, self.replacement.as_str())
        } else {
            self.regex.replace(code, self.replacement.as_str())
        };
        match replaced {
            Cow::Owned(out) if out != code => Some(out),
            _ => None,
        }
    }
}

/// `"<source>/<flags>"`, split at the last `/`.
pub fn split_pattern(pattern: &str) -> Result<(&str, &str)> {
    let (source, flags) = pattern
        .rsplit_once('/')
        .ok_or_else(|| rule_error(pattern, "missing '/<flags>' suffix"))?;
    if flags.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(rule_error(pattern, format!("malformed flags '{}'", flags)));
    }
    Ok((source, flags))
}

pub fn join_pattern(source: &str, flags: &str) -> String {
    format!("{}/{}", source, flags)
}

/// `$&`, `$1` and `$<name>` become `${0}`, `${1}` and `${name}`; any other
/// `$` is literal.
pub fn translate_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len() + 8);
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                    group.push(d);
                    chars.next();
                    if group.len() == 2 {
                        break;
                    }
                }
                out.push_str(&format!("${{{}}}", group));
            }
            Some('<') => {
                let rest: String = chars.clone().collect();
                match rest[1..].find('>') {
                    Some(end) => {
                        let name = &rest[1..1 + end];
                        out.push_str(&format!("${{{}}}", name));
                        for _ in 0..name.chars().count() + 2 {
                            chars.next();
                        }
                    }
                    None => out.push_str("$$"),
                }
            }
            _ => out.push_str("$$"),
        }
    }
    out
}

/// Escape text so it survives as a literal inside a stored replacement.
pub fn escape_replacement(text: &str) -> String {
    text.replace('$', "$$")
}

fn rule_error(pattern: &str, message: impl Into<String>) -> EngineError {
    EngineError::RuleApplication {
        pattern: pattern.to_string(),
        message: message.into(),
    }
}
