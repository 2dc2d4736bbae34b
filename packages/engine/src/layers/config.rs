//! Layer 1: project configuration.

use crate::error::Result;
use crate::transform::config_files::{normalize_json_config, NextConfigFlags};
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile, SourceKind};

use super::{Layer, LayerId};

pub struct ConfigLayer;

impl Layer for ConfigLayer {
    fn id(&self) -> LayerId {
        LayerId::Config
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.config_kind().is_some()
    }

    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        match file.kind() {
            SourceKind::Json { .. } => normalize_json_config(code, file),
            SourceKind::Script(_) => apply_visitors(code, file, &[&NextConfigFlags], ParseMode::Strict),
        }
    }
}
