//! Per-category recovery strategies and retry backoff.

use std::fmt;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::classify::ErrorCategory;

/// Alternative action taken by a fallback strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackAction {
    /// Stream instead of buffering whole contents.
    Stream,
    /// Write uncompressed instead of compressed.
    Uncompressed,
    /// Use the alternate location instead of the primary one.
    AlternateLocation,
}

impl FallbackAction {
    /// The action a retry is downgraded to under resource pressure.
    pub fn for_category(category: ErrorCategory) -> Self {
        match category {
            ErrorCategory::Memory => FallbackAction::Stream,
            ErrorCategory::Compression => FallbackAction::Uncompressed,
            _ => FallbackAction::AlternateLocation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RecoveryStrategy {
    Retry { max_attempts: u32 },
    Fallback { action: FallbackAction },
    Skip,
    Abort,
    Escalate,
    ManualIntervention,
}

impl fmt::Display for RecoveryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStrategy::Retry { max_attempts } => write!(f, "retry(x{})", max_attempts),
            RecoveryStrategy::Fallback { action } => write!(f, "fallback({:?})", action),
            RecoveryStrategy::Skip => f.write_str("skip"),
            RecoveryStrategy::Abort => f.write_str("abort"),
            RecoveryStrategy::Escalate => f.write_str("escalate"),
            RecoveryStrategy::ManualIntervention => f.write_str("manual-intervention"),
        }
    }
}

/// Primary strategy plus the strategy used once the primary is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyPlan {
    pub primary: RecoveryStrategy,
    pub secondary: RecoveryStrategy,
}

pub fn plan_for(category: ErrorCategory) -> StrategyPlan {
    use RecoveryStrategy::*;
    let (primary, secondary) = match category {
        ErrorCategory::Io => (
            Retry { max_attempts: 3 },
            Fallback {
                action: FallbackAction::AlternateLocation,
            },
        ),
        ErrorCategory::Network => (Retry { max_attempts: 5 }, Skip),
        ErrorCategory::Crypto => (Abort, Escalate),
        ErrorCategory::Compression => (
            Fallback {
                action: FallbackAction::Uncompressed,
            },
            Skip,
        ),
        ErrorCategory::Validation => (Skip, Abort),
        ErrorCategory::Permission => (
            Fallback {
                action: FallbackAction::AlternateLocation,
            },
            ManualIntervention,
        ),
        ErrorCategory::Capacity => (
            Fallback {
                action: FallbackAction::AlternateLocation,
            },
            Escalate,
        ),
        ErrorCategory::Memory => (
            Fallback {
                action: FallbackAction::Stream,
            },
            Abort,
        ),
        ErrorCategory::Timeout => (Retry { max_attempts: 3 }, Skip),
        ErrorCategory::DataIntegrity => (Abort, Escalate),
        ErrorCategory::Unknown => (Retry { max_attempts: 1 }, Escalate),
    };
    StrategyPlan { primary, secondary }
}

/// Exponential backoff with additive jitter, capped at `max_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl Backoff {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms }
    }

    /// Deterministic part of the delay before retry `attempt` (0-indexed).
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let multiplier = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(multiplier).min(self.max_ms))
    }

    /// Delay with up to 25% jitter added, still capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt).as_millis() as u64;
        let spread = base / 4;
        let jitter = if spread == 0 {
            0
        } else {
            rand::rng().random_range(0..=spread)
        };
        Duration::from_millis(base.saturating_add(jitter).min(self.max_ms))
    }
}
