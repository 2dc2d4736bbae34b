//! Layer 2: source-wide patterns.

use crate::error::Result;
use crate::transform::lexical::{DecodeEntities, RemoveDiagnostics, VarToLet};
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile};

use super::{Layer, LayerId};

pub struct PatternsLayer;

impl Layer for PatternsLayer {
    fn id(&self) -> LayerId {
        LayerId::Patterns
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script()
    }

    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        apply_visitors(
            code,
            file,
            &[&DecodeEntities, &RemoveDiagnostics, &VarToLet],
            ParseMode::Strict,
        )
    }
}
