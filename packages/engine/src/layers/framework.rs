//! Layer 5: framework migrations.

use crate::error::Result;
use crate::transform::directive::ClientDirective;
use crate::transform::framework::{CreateRoot, LinkChildren, NavigationImports};
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile};

use super::{Layer, LayerId};

pub struct FrameworkLayer;

impl Layer for FrameworkLayer {
    fn id(&self) -> LayerId {
        LayerId::Framework
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script() && file.config_kind().is_none()
    }

    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        // The directive goes first so the navigation pass sees it.
        apply_visitors(
            code,
            file,
            &[&ClientDirective, &NavigationImports, &LinkChildren, &CreateRoot],
            ParseMode::Strict,
        )
    }
}
