//! Layer 7: learned rules.

use crate::api::{Change, ChangeKind};
use crate::error::Result;
use crate::learning::RuleStore;
use crate::transform::{Rewrite, SourceFile};

use super::{Layer, LayerId};

/// Runs the rules of a store snapshot. Mining happens in the engine, after
/// the other layers have produced their diffs.
pub struct AdaptiveLayer<'s> {
    store: &'s RuleStore,
}

impl<'s> AdaptiveLayer<'s> {
    pub fn new(store: &'s RuleStore) -> Self {
        Self { store }
    }
}

impl Layer for AdaptiveLayer<'_> {
    fn id(&self) -> LayerId {
        LayerId::Adaptive
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script() && file.config_kind().is_none()
    }

    fn transform(&self, code: &str, _file: &SourceFile) -> Result<Rewrite> {
        let applied = self.store.apply_rules(code);
        let changes = applied
            .descriptions
            .into_iter()
            .map(|description| Change::new(ChangeKind::RuleApplied, description))
            .collect();
        Ok(Rewrite {
            code: applied.code,
            changes,
            warnings: Vec::new(),
        })
    }
}
