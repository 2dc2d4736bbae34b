//! Tree Transformer
//!
//! Parses a source file with oxc, lets structural visitors record span edits
//! against it and splices those edits back into the original text. Every pass
//! re-parses its input, and the final text is validated once more, so no
//! output is ever trusted without a successful parse.

pub mod cleanup;
pub mod config_files;
pub mod directive;
pub mod edit;
pub mod framework;
pub mod guards;
pub mod imports;
pub mod jsx;
pub mod lexical;
pub mod syntax;
pub mod testing;
pub mod walk;


use std::path::{Path, PathBuf};

use oxc_allocator::Allocator;
use oxc_ast::ast::Program;
use oxc_parser::Parser;
use oxc_span::SourceType;
use tracing::debug;

use crate::error::{EngineError, Result};

pub use edit::{EditSet, Rewrite, Rewriter};
pub use walk::{walk_program, Node, NodeVisitor};

/// Project configuration files handled by the config layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    TsConfig,
    PackageJson,
    NextConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Script(SourceType),
    /// JSON; `comments` admits the comment and trailing-comma dialect of
    /// `tsconfig.json`.
    Json { comments: bool },
}

/// Path-derived facts about the file being transformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    path: PathBuf,
    kind: SourceKind,
    config: Option<ConfigKind>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let config = if name == "package.json" {
            Some(ConfigKind::PackageJson)
        } else if (name.starts_with("tsconfig") || name == "jsconfig.json") && extension == "json" {
            Some(ConfigKind::TsConfig)
        } else if name.starts_with("next.config.") {
            Some(ConfigKind::NextConfig)
        } else {
            None
        };

        let kind = if extension == "json" {
            SourceKind::Json {
                comments: config == Some(ConfigKind::TsConfig),
            }
        } else {
            SourceKind::Script(source_type_for(&path))
        };

        Self { path, kind, config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn config_kind(&self) -> Option<ConfigKind> {
        self.config
    }

    pub fn source_type(&self) -> Option<SourceType> {
        match self.kind {
            SourceKind::Script(source_type) => Some(source_type),
            SourceKind::Json { .. } => None,
        }
    }

    pub fn is_script(&self) -> bool {
        matches!(self.kind, SourceKind::Script(_))
    }

    pub fn is_test(&self) -> bool {
        let normalized = self.normalized();
        let name = normalized.rsplit('/').next().unwrap_or("");
        name.contains(".test.") || name.contains(".spec.") || normalized.contains("__tests__/")
    }

    /// Under a Next.js `app/` directory.
    pub fn in_app_dir(&self) -> bool {
        let normalized = self.normalized();
        normalized.starts_with("app/") || normalized.contains("/app/")
    }

    pub fn in_pages_dir(&self) -> bool {
        let normalized = self.normalized();
        normalized.starts_with("pages/") || normalized.contains("/pages/")
    }

    fn normalized(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

/// Unknown extensions parse as TSX. Plain `.js` files may carry JSX.
pub fn source_type_for(path: &Path) -> SourceType {
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::tsx());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "js" | "mjs" | "cjs" => source_type.with_jsx(true),
        _ => source_type,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseMode {
    /// Any diagnostic is an error.
    Strict,
    /// Accept a recovered tree when the parser did not give up. The output
    /// of a pass over such a tree is still validated strictly.
    Recover,
}

pub fn parse<'a>(
    allocator: &'a Allocator,
    text: &'a str,
    file: &SourceFile,
    mode: ParseMode,
) -> Result<Program<'a>> {
    let source_type = file
        .source_type()
        .ok_or_else(|| EngineError::parse(file.path(), "not a script source"))?;
    let ret = Parser::new(allocator, text, source_type).parse();
    if ret.panicked {
        let message = ret
            .errors
            .first()
            .map(|e| e.to_string())
            .unwrap_or_else(|| "parser gave up".to_string());
        return Err(EngineError::parse(file.path(), message));
    }
    if mode == ParseMode::Strict {
        if let Some(first) = ret.errors.first() {
            return Err(EngineError::parse(file.path(), first.to_string()));
        }
    }
    Ok(ret.program)
}

/// Syntax validation of emitted text.
pub fn validate(text: &str, file: &SourceFile) -> Result<()> {
    match file.kind() {
        SourceKind::Script(_) => {
            let allocator = Allocator::default();
            parse(&allocator, text, file, ParseMode::Strict).map(|_| ())
        }
        SourceKind::Json { comments } => {
            let cleaned;
            let json = if comments {
                cleaned = config_files::strip_json_comments(text);
                cleaned.as_str()
            } else {
                text
            };
            serde_json::from_str::<serde_json::Value>(json)
                .map(|_| ())
                .map_err(|e| EngineError::parse(file.path(), e.to_string()))
        }
    }
}

pub struct VisitContext<'n, 'a> {
    pub program: &'n Program<'a>,
    pub text: &'n str,
    pub file: &'n SourceFile,
}

/// A structural fix. Visitors record edits and changes; they never print.
pub trait TreeVisitor: Send + Sync {
    fn name(&self) -> &'static str;

    fn visit(&self, cx: &VisitContext<'_, '_>, rw: &mut Rewriter<'_>);
}

/// Run each visitor as its own parse / edit / print pass, then validate.
pub fn apply_visitors(
    text: &str,
    file: &SourceFile,
    visitors: &[&dyn TreeVisitor],
    mode: ParseMode,
) -> Result<Rewrite> {
    let mut output = Rewrite {
        code: text.to_string(),
        ..Rewrite::default()
    };

    for visitor in visitors {
        let pass = {
            let allocator = Allocator::default();
            let program = parse(&allocator, &output.code, file, mode)?;
            let cx = VisitContext {
                program: &program,
                text: &output.code,
                file,
            };
            let mut rewriter = Rewriter::new(&output.code);
            visitor.visit(&cx, &mut rewriter);
            rewriter.finish()?
        };
        debug!(
            visitor = visitor.name(),
            changes = pass.changes.len(),
            path = %file.path().display(),
            "visitor pass"
        );
        output.changes.extend(pass.changes);
        output.warnings.extend(pass.warnings);
        output.code = pass.code;
    }

    validate(&output.code, file)?;
    Ok(output)
}
