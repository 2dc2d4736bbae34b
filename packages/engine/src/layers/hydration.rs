//! Layer 4: server rendering safety.

use crate::error::Result;
use crate::transform::guards::BrowserGlobalGuards;
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile};

use super::{Layer, LayerId};

pub struct HydrationLayer;

impl Layer for HydrationLayer {
    fn id(&self) -> LayerId {
        LayerId::Hydration
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script()
    }

    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        apply_visitors(code, file, &[&BrowserGlobalGuards], ParseMode::Strict)
    }
}
