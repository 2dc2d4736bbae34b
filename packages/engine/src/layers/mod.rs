//! Layer Pipeline
//!
//! Seven ordered layers, each a tree pass with a regex fallback behind it.
//! The catalogue lives in one module per layer; [`runner`] holds the
//! per-layer stage logic and [`detect`] the automatic selection.

pub mod adaptive;
pub mod components;
pub mod config;
pub mod detect;
pub mod framework;
pub mod hydration;
pub mod patterns;
pub mod runner;
pub mod testing;

#[cfg(test)]
mod test;

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::error::Result;
use crate::fallback::apply_fallback;
use crate::transform::{Rewrite, SourceFile};

pub use adaptive::AdaptiveLayer;
pub use detect::auto_select;
pub use runner::run_layer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LayerId {
    Config = 1,
    Patterns = 2,
    Components = 3,
    Hydration = 4,
    Framework = 5,
    Testing = 6,
    Adaptive = 7,
}

impl LayerId {
    pub const ALL: [LayerId; 7] = [
        LayerId::Config,
        LayerId::Patterns,
        LayerId::Components,
        LayerId::Hydration,
        LayerId::Framework,
        LayerId::Testing,
        LayerId::Adaptive,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.number() == number)
    }

    pub fn name(self) -> &'static str {
        match self {
            LayerId::Config => "config",
            LayerId::Patterns => "patterns",
            LayerId::Components => "components",
            LayerId::Hydration => "hydration",
            LayerId::Framework => "framework",
            LayerId::Testing => "testing",
            LayerId::Adaptive => "adaptive",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LayerId::Config => "project configuration normalization",
            LayerId::Patterns => "entity decoding, diagnostic removal, var to let",
            LayerId::Components => "keys, required attributes, imports, effect cleanup",
            LayerId::Hydration => "typeof guards around browser globals",
            LayerId::Framework => "client directive and framework API migrations",
            LayerId::Testing => "testing library imports and async tests",
            LayerId::Adaptive => "learned rewrite rules",
        }
    }

    pub fn flag(self) -> LayerSet {
        LayerSet::from_bits_truncate(1 << (self.number() - 1))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.number(), self.name())
    }
}

impl TryFrom<u8> for LayerId {
    type Error = String;

    fn try_from(number: u8) -> std::result::Result<Self, Self::Error> {
        LayerId::from_number(number).ok_or_else(|| format!("unknown layer {}", number))
    }
}

impl From<LayerId> for u8 {
    fn from(id: LayerId) -> Self {
        id.number()
    }
}

bitflags! {
    /// A set of layers; iteration is always in pipeline order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LayerSet: u8 {
        const CONFIG = 0b000_0001;
        const PATTERNS = 0b000_0010;
        const COMPONENTS = 0b000_0100;
        const HYDRATION = 0b000_1000;
        const FRAMEWORK = 0b001_0000;
        const TESTING = 0b010_0000;
        const ADAPTIVE = 0b100_0000;
    }
}

impl LayerSet {
    pub fn ids(self) -> SmallVec<[LayerId; 7]> {
        LayerId::ALL
            .iter()
            .copied()
            .filter(|id| self.contains(id.flag()))
            .collect()
    }
}

impl FromIterator<LayerId> for LayerSet {
    fn from_iter<I: IntoIterator<Item = LayerId>>(iter: I) -> Self {
        iter.into_iter().fold(LayerSet::empty(), |set, id| set | id.flag())
    }
}

/// One pipeline stage.
pub trait Layer: Send + Sync {
    fn id(&self) -> LayerId;

    /// Whether the layer targets this file at all.
    fn applies_to(&self, file: &SourceFile) -> bool;

    /// The primary, structure-aware pass.
    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite>;

    /// Pattern rules used when the primary pass fails or does not validate.
    fn fallback(&self, code: &str, file: &SourceFile) -> Rewrite {
        apply_fallback(self.id(), code, file)
    }
}

/// Built-in layers 1-6. The adaptive layer needs a rule snapshot and is
/// constructed by the engine.
pub fn builtin(id: LayerId) -> Option<Box<dyn Layer>> {
    let layer: Box<dyn Layer> = match id {
        LayerId::Config => Box::new(config::ConfigLayer),
        LayerId::Patterns => Box::new(patterns::PatternsLayer),
        LayerId::Components => Box::new(components::ComponentsLayer),
        LayerId::Hydration => Box::new(hydration::HydrationLayer),
        LayerId::Framework => Box::new(framework::FrameworkLayer),
        LayerId::Testing => Box::new(testing::TestingLayer),
        LayerId::Adaptive => return None,
    };
    Some(layer)
}
