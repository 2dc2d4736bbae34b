//! Span-anchored edits and the printer that splices them into source text.
//!
//! Edits never move existing text; they replace byte ranges or insert at
//! offsets. At a shared offset the order is: closing text of wrappers that
//! end there, plain insertions, opening text of wrappers that start there,
//! then any replacement starting there. Wrappers nest by tree depth, so an
//! outer guard opens before and closes after an inner one.

use oxc_span::Span;

use crate::api::{Change, ChangeKind};
use crate::error::{EngineError, Result};

use super::syntax::LineIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Anchor {
    Close,
    Insert,
    Open,
    Replace,
}

#[derive(Debug, Clone)]
struct Edit {
    start: u32,
    end: u32,
    text: String,
    anchor: Anchor,
    depth: u32,
    seq: u32,
}

impl Edit {
    fn sort_key(&self) -> (u32, Anchor, i64, i64) {
        let (depth, seq) = (i64::from(self.depth), i64::from(self.seq));
        match self.anchor {
            Anchor::Close => (self.start, self.anchor, -depth, -seq),
            Anchor::Open => (self.start, self.anchor, depth, seq),
            Anchor::Insert | Anchor::Replace => (self.start, self.anchor, 0, seq),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct EditSet {
    edits: Vec<Edit>,
    next_seq: u32,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        let anchor = if span.start == span.end {
            Anchor::Insert
        } else {
            Anchor::Replace
        };
        self.push(span.start, span.end, text.into(), anchor, 0);
    }

    pub fn remove(&mut self, span: Span) {
        self.replace(span, String::new());
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.push(at, at, text.into(), Anchor::Insert, 0);
    }

    /// Surround `span` with `before` / `after`. `depth` is the tree depth of
    /// the wrapped node and decides nesting among wrappers sharing an offset.
    pub fn wrap(&mut self, span: Span, before: impl Into<String>, after: impl Into<String>, depth: u32) {
        self.push(span.start, span.start, before.into(), Anchor::Open, depth);
        self.push(span.end, span.end, after.into(), Anchor::Close, depth);
    }

    fn push(&mut self, start: u32, end: u32, text: String, anchor: Anchor, depth: u32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.edits.push(Edit {
            start,
            end,
            text,
            anchor,
            depth,
            seq,
        });
    }

    /// Splice every edit into `source`. Overlapping replacements, or an
    /// insertion strictly inside a replaced range, are a conflict.
    pub fn apply(mut self, source: &str) -> Result<String> {
        self.edits.sort_by_key(Edit::sort_key);

        let mut out = String::with_capacity(source.len() + 64);
        let mut cursor = 0u32;
        for edit in &self.edits {
            let (start, end) = (edit.start as usize, edit.end as usize);
            if edit.start < cursor
                || end > source.len()
                || !source.is_char_boundary(start)
                || !source.is_char_boundary(end)
            {
                return Err(EngineError::EditConflict { offset: edit.start });
            }
            out.push_str(&source[cursor as usize..start]);
            out.push_str(&edit.text);
            cursor = edit.end;
        }
        out.push_str(&source[cursor as usize..]);
        Ok(out)
    }
}

/// Output of one rewriting pass.
#[derive(Debug, Clone, Default)]
pub struct Rewrite {
    pub code: String,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
}

/// Collects edits and the audit trail for one pass over one text.
pub struct Rewriter<'s> {
    text: &'s str,
    lines: LineIndex,
    edits: EditSet,
    changes: Vec<Change>,
    warnings: Vec<String>,
}

impl<'s> Rewriter<'s> {
    pub fn new(text: &'s str) -> Self {
        Self {
            text,
            lines: LineIndex::new(text),
            edits: EditSet::new(),
            changes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn text(&self) -> &'s str {
        self.text
    }

    pub fn replace(&mut self, span: Span, text: impl Into<String>) {
        self.edits.replace(span, text);
    }

    pub fn remove(&mut self, span: Span) {
        self.edits.remove(span);
    }

    pub fn insert(&mut self, at: u32, text: impl Into<String>) {
        self.edits.insert(at, text);
    }

    pub fn wrap(&mut self, span: Span, before: impl Into<String>, after: impl Into<String>, depth: u32) {
        self.edits.wrap(span, before, after, depth);
    }

    /// Record a change located at byte `offset` of the input text.
    pub fn change(&mut self, kind: ChangeKind, description: impl Into<String>, offset: u32) {
        let location = self.lines.location(self.text, offset);
        self.changes.push(Change::new(kind, description).at(location));
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn finish(self) -> Result<Rewrite> {
        let code = if self.edits.is_empty() {
            self.text.to_string()
        } else {
            self.edits.apply(self.text)?
        };
        Ok(Rewrite {
            code,
            changes: self.changes,
            warnings: self.warnings,
        })
    }
}
