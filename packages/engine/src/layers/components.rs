//! Layer 3: component hygiene.

use crate::error::Result;
use crate::transform::cleanup::EffectCleanup;
use crate::transform::imports::{MergeImports, ReactImport};
use crate::transform::jsx::{IntrinsicAttributes, ListKeys};
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile};

use super::{Layer, LayerId};

pub struct ComponentsLayer;

impl Layer for ComponentsLayer {
    fn id(&self) -> LayerId {
        LayerId::Components
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script()
    }

    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        apply_visitors(
            code,
            file,
            &[
                &ListKeys,
                &IntrinsicAttributes,
                &MergeImports,
                &ReactImport,
                &EffectCleanup,
            ],
            ParseMode::Strict,
        )
    }
}
