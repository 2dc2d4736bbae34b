//! Request / result contract
//!
//! These are the only types upstream surfaces (CLI, Node binding, dashboard)
//! are expected to depend on. Field names serialize in camelCase.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ErrorInfo;
use crate::layers::LayerId;

/// Immutable per-invocation input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRequest {
    /// Source text to transform. When absent the engine reads `file_path`.
    #[serde(default)]
    pub source_text: Option<String>,
    pub file_path: PathBuf,
    #[serde(default)]
    pub layer_selection: LayerSelection,
    #[serde(default)]
    pub dry_run: bool,
    /// When false the request runs in analysis mode: changes are reported
    /// but the returned code is the original source and nothing is written.
    #[serde(default = "default_apply_fixes")]
    pub apply_fixes: bool,
    #[serde(default)]
    pub verbose: bool,
}

fn default_apply_fixes() -> bool {
    true
}

impl TransformRequest {
    pub fn for_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            source_text: None,
            file_path: file_path.into(),
            layer_selection: LayerSelection::Auto,
            dry_run: false,
            apply_fixes: true,
            verbose: false,
        }
    }

    pub fn for_source(file_path: impl Into<PathBuf>, source_text: impl Into<String>) -> Self {
        Self {
            source_text: Some(source_text.into()),
            ..Self::for_file(file_path)
        }
    }

    pub fn with_layers(mut self, selection: LayerSelection) -> Self {
        self.layer_selection = selection;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn apply_fixes(mut self, apply_fixes: bool) -> Self {
        self.apply_fixes = apply_fixes;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Which layers a request runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "SelectionRepr", into = "SelectionRepr")]
pub enum LayerSelection {
    #[default]
    Auto,
    Explicit(Vec<LayerId>),
}

impl LayerSelection {
    pub fn explicit(ids: impl IntoIterator<Item = LayerId>) -> Self {
        LayerSelection::Explicit(ids.into_iter().collect())
    }

    pub fn all() -> Self {
        LayerSelection::Explicit(LayerId::ALL.to_vec())
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SelectionRepr {
    Keyword(String),
    Layers(Vec<u8>),
}

impl TryFrom<SelectionRepr> for LayerSelection {
    type Error = String;

    fn try_from(repr: SelectionRepr) -> Result<Self, Self::Error> {
        match repr {
            SelectionRepr::Keyword(word) => word.parse(),
            SelectionRepr::Layers(numbers) => numbers
                .into_iter()
                .map(|n| LayerId::from_number(n).ok_or_else(|| format!("unknown layer {}", n)))
                .collect::<Result<Vec<_>, _>>()
                .map(LayerSelection::Explicit),
        }
    }
}

impl From<LayerSelection> for SelectionRepr {
    fn from(selection: LayerSelection) -> Self {
        match selection {
            LayerSelection::Auto => SelectionRepr::Keyword("auto".to_string()),
            LayerSelection::Explicit(ids) => {
                SelectionRepr::Layers(ids.into_iter().map(LayerId::number).collect())
            }
        }
    }
}

impl FromStr for LayerSelection {
    type Err = String;

    /// Accepts `auto`, `all`, or a comma separated list such as `1,2,4`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(LayerSelection::Auto);
        }
        if s.eq_ignore_ascii_case("all") {
            return Ok(LayerSelection::all());
        }
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<u8>()
                    .ok()
                    .and_then(LayerId::from_number)
                    .ok_or_else(|| format!("unknown layer '{}'", part))
            })
            .collect::<Result<Vec<_>, _>>()
            .and_then(|ids| {
                if ids.is_empty() {
                    Err("empty layer selection".to_string())
                } else {
                    Ok(LayerSelection::Explicit(ids))
                }
            })
    }
}

/// 1-based position in the text a layer received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    ConfigNormalized,
    EntityDecoded,
    DiagnosticRemoved,
    KeyAdded,
    AttributeAdded,
    ImportAdded,
    ImportMerged,
    CleanupAdded,
    GuardAdded,
    DirectivePlaced,
    ApiMigrated,
    TestScaffold,
    RuleApplied,
}

/// Append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl Change {
    pub fn new(kind: ChangeKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            description: description.into(),
            location: None,
        }
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// Which stage produced a layer's code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerStrategy {
    /// The tree transform produced validated output.
    Tree,
    /// The regex fallback produced validated output.
    Fallback,
    /// Both stages ran and neither changed anything.
    Unchanged,
    /// The layer does not apply to this file.
    Skipped,
    /// No stage produced usable output; the input was passed through.
    Failed,
}

impl fmt::Display for LayerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerStrategy::Tree => "tree",
            LayerStrategy::Fallback => "fallback",
            LayerStrategy::Unchanged => "unchanged",
            LayerStrategy::Skipped => "skipped",
            LayerStrategy::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Output of one layer, chained into the next.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerResult {
    pub layer: LayerId,
    pub name: String,
    pub success: bool,
    pub code: String,
    pub original_code: String,
    pub change_count: usize,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
    pub strategy: LayerStrategy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
}

impl LayerResult {
    pub fn passthrough(layer: LayerId, code: &str, strategy: LayerStrategy) -> Self {
        Self {
            layer,
            name: layer.name().to_string(),
            success: true,
            code: code.to_string(),
            original_code: code.to_string(),
            change_count: 0,
            changes: Vec::new(),
            warnings: Vec::new(),
            strategy,
            error: None,
            backup_path: None,
        }
    }

    pub fn changed(&self) -> bool {
        self.change_count > 0
    }
}

/// Aggregate result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformResponse {
    pub success: bool,
    pub file_path: PathBuf,
    pub code: String,
    pub change_count: usize,
    pub changes: Vec<Change>,
    pub warnings: Vec<String>,
    pub layers: Vec<LayerResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

impl TransformResponse {
    pub fn failure(file_path: PathBuf, code: String, error: ErrorInfo) -> Self {
        Self {
            success: false,
            file_path,
            code,
            change_count: 0,
            changes: Vec::new(),
            warnings: Vec::new(),
            layers: Vec::new(),
            error: Some(error),
        }
    }
}
