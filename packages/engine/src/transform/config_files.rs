//! Project configuration normalization.
//!
//! `tsconfig.json` and `package.json` are edited as JSON trees and
//! re-serialized with key order preserved. `next.config.*` is a script, so
//! its obsolete flags are removed with span edits like any other source.

use oxc_ast::ast::{Expression, ObjectExpression, ObjectPropertyKind, PropertyKey};
use oxc_span::{GetSpan, Span};
use serde_json::{Map, Value};

use crate::api::{Change, ChangeKind};
use crate::error::{EngineError, Result};

use super::walk::{walk_program, Node, NodeVisitor};
use super::{ConfigKind, Rewrite, Rewriter, SourceFile, TreeVisitor, VisitContext};

const LEGACY_TARGETS: [&str; 2] = ["es3", "es5"];
const MODERN_TARGET: &str = "es2020";

/// Compiler options every project should set, with the value added when absent.
const REQUIRED_COMPILER_OPTIONS: [&str; 4] = [
    "strict",
    "esModuleInterop",
    "skipLibCheck",
    "forceConsistentCasingInFileNames",
];

/// Remove `//` and `/* */` comments and trailing commas, leaving strings intact.
pub fn strip_json_comments(text: &str) -> String {
    strip_trailing_commas(&strip_comments(text))
}

fn strip_comments(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '/' if chars.peek() == Some(&'/') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn strip_trailing_commas(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            ',' => {
                let next = chars.clone().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}' | ']')) {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

fn parse_json(text: &str, file: &SourceFile, comments: bool) -> Result<Value> {
    let parsed = if comments {
        serde_json::from_str(&strip_json_comments(text))
    } else {
        serde_json::from_str(text)
    };
    parsed.map_err(|e| EngineError::parse(file.path(), e.to_string()))
}

fn object_entry<'v>(root: &'v mut Map<String, Value>, key: &str) -> Option<&'v mut Map<String, Value>> {
    root.entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
}

/// Normalize a JSON config file. The text is returned untouched when there
/// is nothing to change.
pub fn normalize_json_config(text: &str, file: &SourceFile) -> Result<Rewrite> {
    let unchanged = || Rewrite {
        code: text.to_string(),
        ..Rewrite::default()
    };
    let (value, changes) = match file.config_kind() {
        Some(ConfigKind::TsConfig) => {
            let mut value = parse_json(text, file, true)?;
            let changes = normalize_tsconfig(&mut value);
            (value, changes)
        }
        Some(ConfigKind::PackageJson) => {
            let mut value = parse_json(text, file, false)?;
            let changes = normalize_package_json(&mut value);
            (value, changes)
        }
        _ => return Ok(unchanged()),
    };
    if changes.is_empty() {
        return Ok(unchanged());
    }

    let mut code = serde_json::to_string_pretty(&value)?;
    code.push('\n');
    Ok(Rewrite {
        code,
        changes,
        warnings: Vec::new(),
    })
}

fn normalize_tsconfig(value: &mut Value) -> Vec<Change> {
    let mut changes = Vec::new();
    let Some(root) = value.as_object_mut() else {
        return changes;
    };
    let Some(options) = object_entry(root, "compilerOptions") else {
        return changes;
    };

    if let Some(target) = options.get_mut("target") {
        let legacy = target
            .as_str()
            .is_some_and(|t| LEGACY_TARGETS.contains(&t.to_ascii_lowercase().as_str()));
        if legacy {
            *target = Value::String(MODERN_TARGET.to_string());
            changes.push(Change::new(
                ChangeKind::ConfigNormalized,
                format!("raised compilerOptions.target to {}", MODERN_TARGET),
            ));
        }
    }
    for option in REQUIRED_COMPILER_OPTIONS {
        if !options.contains_key(option) {
            options.insert(option.to_string(), Value::Bool(true));
            changes.push(Change::new(
                ChangeKind::ConfigNormalized,
                format!("added compilerOptions.{}", option),
            ));
        }
    }
    changes
}

fn normalize_package_json(value: &mut Value) -> Vec<Change> {
    let mut changes = Vec::new();
    let Some(root) = value.as_object_mut() else {
        return changes;
    };
    let uses_next = ["dependencies", "devDependencies"]
        .iter()
        .any(|k| root.get(*k).and_then(|d| d.get("next")).is_some());
    let Some(scripts) = object_entry(root, "scripts") else {
        return changes;
    };

    let lint = if uses_next { "next lint" } else { "eslint ." };
    for (name, command) in [("lint", lint), ("type-check", "tsc --noEmit")] {
        if !scripts.contains_key(name) {
            scripts.insert(name.to_string(), Value::String(command.to_string()));
            changes.push(Change::new(
                ChangeKind::ConfigNormalized,
                format!("added the \"{}\" script", name),
            ));
        }
    }
    changes
}

pub fn property_key_name<'n>(key: &'n PropertyKey<'_>) -> Option<&'n str> {
    match key {
        PropertyKey::StaticIdentifier(id) => Some(id.name.as_str()),
        PropertyKey::StringLiteral(s) => Some(s.value.as_str()),
        _ => None,
    }
}

#[derive(Default)]
struct ObsoleteFlags {
    /// Per object literal, the indices of properties to drop.
    objects: Vec<(Span, Vec<Span>, Vec<usize>)>,
}

impl<'n, 'a> NodeVisitor<'n, 'a> for ObsoleteFlags {
    fn enter(&mut self, node: Node<'n, 'a>, ancestors: &[Node<'n, 'a>]) {
        let Node::Expression(Expression::ObjectExpression(object)) = node else {
            return;
        };
        let in_experimental = matches!(
            ancestors.last(),
            Some(Node::ObjectProperty(p))
                if property_key_name(&p.key) == Some("experimental") && p.value.span() == object.span
        );
        let removed = obsolete_indices(object, in_experimental);
        if !removed.is_empty() {
            let spans = object.properties.iter().map(|p| p.span()).collect();
            self.objects.push((object.span, spans, removed));
        }
    }
}

fn obsolete_indices(object: &ObjectExpression<'_>, in_experimental: bool) -> Vec<usize> {
    object
        .properties
        .iter()
        .enumerate()
        .filter_map(|(i, kind)| {
            let ObjectPropertyKind::ObjectProperty(p) = kind else {
                return None;
            };
            let name = property_key_name(&p.key)?;
            (name == "swcMinify" || (in_experimental && name == "appDir")).then_some(i)
        })
        .collect()
}

/// Drops `experimental.appDir` and `swcMinify` from `next.config.*`.
pub struct NextConfigFlags;

impl TreeVisitor for NextConfigFlags {
    fn name(&self) -> &'static str {
        "next-config-flags"
    }

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>) {
        if cx.file.config_kind() != Some(ConfigKind::NextConfig) {
            return;
        }
        let mut flags = ObsoleteFlags::default();
        walk_program(cx.program, &mut flags);

        for (object_span, properties, removed) in flags.objects {
            for range in removal_ranges(cx.text, object_span, &properties, &removed) {
                rw.remove(range);
            }
            for i in removed {
                rw.change(
                    ChangeKind::ConfigNormalized,
                    "removed an obsolete Next.js config flag",
                    properties[i].start,
                );
            }
        }
    }
}

/// Non-overlapping ranges deleting the properties at `removed` together with
/// their separators.
fn removal_ranges(text: &str, object: Span, properties: &[Span], removed: &[usize]) -> Vec<Span> {
    let mut ranges = Vec::new();
    let mut i = 0;
    while i < removed.len() {
        let start = removed[i];
        let mut end = start;
        while i + 1 < removed.len() && removed[i + 1] == end + 1 {
            i += 1;
            end += 1;
        }
        i += 1;

        if let Some(next) = properties.get(end + 1) {
            ranges.push(Span::new(properties[start].start, next.start));
        } else if let Some(previous) = start.checked_sub(1).map(|p| properties[p]) {
            ranges.push(Span::new(previous.end, properties[end].end));
        } else {
            // Every property goes; take a trailing comma too.
            let last = properties[end].end;
            let tail = &text[last as usize..object.end as usize];
            let comma = tail
                .trim_start()
                .starts_with(',')
                .then(|| tail.find(',').map_or(0, |c| c as u32 + 1))
                .unwrap_or(0);
            ranges.push(Span::new(properties[start].start, last + comma));
        }
    }
    ranges
}
