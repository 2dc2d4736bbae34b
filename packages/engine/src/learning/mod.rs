//! Adaptive Rule Store
//!
//! Rules mined from successful diffs, persisted as one JSON list:
//!
//! ```text
//! [
//!   {
//!     "pattern": "^([^'\"\\s#])/",
//!     "replacement": "'use client';\n$1",
//!     "confidence": 0.9,
//!     "frequency": 1,
//!     "layer": 5,
//!     "description": "insert the 'use client' directive at the top of the file"
//!   }
//! ]
//! ```
//!
//! Re-observing a rule raises its confidence by a fixed delta, capped at 1.0.
//! Only rules at or above the application threshold run.

mod extract;
mod matcher;


use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backup::StagedWrite;
use crate::config::LearningConfig;
use crate::error::{EngineError, Result};
use crate::layers::LayerId;

pub use extract::{
    extract_patterns, DIAGNOSTIC_CONFIDENCE, DIRECTIVE_CONFIDENCE, MEMO_CONFIDENCE,
    WRAPPER_CONFIDENCE,
};
pub use matcher::{split_pattern, translate_replacement, CompiledRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedRule {
    /// `"<source>/<flags>"`; also the rule's signature.
    pub pattern: String,
    pub replacement: String,
    pub confidence: f64,
    pub frequency: u32,
    pub layer: LayerId,
    pub description: String,
}

impl LearnedRule {
    pub fn new(
        pattern: impl Into<String>,
        replacement: impl Into<String>,
        confidence: f64,
        layer: LayerId,
        description: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
            confidence: confidence.clamp(0.0, 1.0),
            frequency: 1,
            layer,
            description: description.into(),
        }
    }

    pub fn signature(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        split_pattern(&self.pattern).map_or("", |(_, flags)| flags)
    }
}

/// What `add_rule` did with a candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RuleMerge {
    Added,
    Reinforced { confidence: f64, frequency: u32 },
}

/// Output of [`RuleStore::apply_rules`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedRules {
    pub code: String,
    pub descriptions: Vec<String>,
}

#[derive(Debug)]
pub struct RuleStore {
    path: PathBuf,
    config: LearningConfig,
    rules: Vec<LearnedRule>,
    /// Compiled matchers by signature. A rule that does not compile keeps its
    /// error here so it is reported once and skipped afterwards.
    compiled: IndexMap<String, std::result::Result<CompiledRule, String>>,
}

impl RuleStore {
    pub fn new(path: impl Into<PathBuf>, config: LearningConfig) -> Self {
        Self {
            path: path.into(),
            config,
            rules: Vec::new(),
            compiled: IndexMap::new(),
        }
    }

    /// Read the store at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>, config: LearningConfig) -> Result<Self> {
        let mut store = Self::new(path, config);
        let raw = match fs::read_to_string(&store.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(EngineError::io(&store.path, e)),
        };
        let rules: Vec<LearnedRule> = serde_json::from_str(&raw)?;
        for rule in &rules {
            store.compile(rule);
        }
        store.rules = rules;
        debug!(path = %store.path.display(), rules = store.rules.len(), "loaded rule store");
        Ok(store)
    }

    /// Rewrite the whole store through a temp file and rename.
    pub fn save(&self) -> Result<()> {
        let mut json = serde_json::to_vec_pretty(&self.rules)?;
        json.push(b'\n');
        let staged = StagedWrite::stage(&self.path, &json)?;
        staged.verify(&json)?;
        staged.commit()?;
        info!(path = %self.path.display(), rules = self.rules.len(), "saved rule store");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    pub fn rules(&self) -> &[LearnedRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Merge a candidate: reinforce the rule with the same signature, or
    /// append the candidate with its seed confidence.
    pub fn add_rule(&mut self, candidate: LearnedRule) -> RuleMerge {
        let delta = self.config.confidence_delta;
        if let Some(existing) = self
            .rules
            .iter_mut()
            .find(|r| r.signature() == candidate.signature())
        {
            existing.frequency += 1;
            existing.confidence = reinforce(existing.confidence, delta);
            debug!(
                pattern = %existing.pattern,
                confidence = existing.confidence,
                frequency = existing.frequency,
                "reinforced rule"
            );
            return RuleMerge::Reinforced {
                confidence: existing.confidence,
                frequency: existing.frequency,
            };
        }

        self.compile(&candidate);
        debug!(pattern = %candidate.pattern, confidence = candidate.confidence, "learned rule");
        self.rules.push(candidate);
        RuleMerge::Added
    }

    /// Mine `before` / `after` and merge every candidate. Returns how many
    /// candidates were found.
    pub fn learn(&mut self, before: &str, after: &str, layer: LayerId) -> usize {
        let candidates = extract_patterns(before, after, layer);
        let found = candidates.len();
        for candidate in candidates {
            self.add_rule(candidate);
        }
        found
    }

    /// Rules eligible to run, in storage order.
    pub fn active_rules(&self) -> impl Iterator<Item = &LearnedRule> {
        let threshold = self.config.confidence_threshold;
        self.rules.iter().filter(move |r| r.confidence >= threshold)
    }

    /// Apply every active rule in storage order. A rule that fails to compile
    /// is skipped and the pass continues.
    pub fn apply_rules(&self, code: &str) -> AppliedRules {
        let mut out = AppliedRules {
            code: code.to_string(),
            descriptions: Vec::new(),
        };
        for rule in self.active_rules() {
            let compiled = match self.compiled.get(rule.signature()) {
                Some(Ok(compiled)) => compiled.clone(),
                Some(Err(_)) => continue,
                None => match CompiledRule::compile(&rule.pattern, &rule.replacement) {
                    Ok(compiled) => compiled,
                    Err(e) => {
                        warn!("skipping rule: {}", e);
                        continue;
                    }
                },
            };
            if let Some(code) = compiled.apply(&out.code) {
                debug!(pattern = %rule.pattern, "applied rule");
                out.code = code;
                out.descriptions.push(rule.description.clone());
            }
        }
        out
    }

    fn compile(&mut self, rule: &LearnedRule) {
        let compiled = CompiledRule::compile(&rule.pattern, &rule.replacement).map_err(|e| {
            warn!("rule will be skipped: {}", e);
            e.to_string()
        });
        self.compiled.insert(rule.signature().to_string(), compiled);
    }
}

/// Raise `confidence` by `delta`, rounded to two places and capped at 1.0.
pub fn reinforce(confidence: f64, delta: f64) -> f64 {
    (((confidence + delta) * 100.0).round() / 100.0).min(1.0)
}
