//! `backups`, `restore` and `rules`.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use mend_engine::backup::BackupInfo;
use mend_engine::learning::RuleStore;
use mend_engine::Engine;

pub fn render_backups(file: &Path, backups: &[BackupInfo]) -> String {
    let mut out = String::new();
    if backups.is_empty() {
        let _ = writeln!(out, "no backups for {}", file.display());
        return out;
    }
    let _ = writeln!(out, "{} backup(s) for {}", backups.len(), file.display());
    for backup in backups {
        let _ = writeln!(
            out,
            "  {}  {}  {}",
            backup.timestamp,
            backup.hash,
            backup.backup_path.display()
        );
    }
    out
}

pub fn restore(engine: &Engine, backup: &Path, target: Option<&Path>) -> anyhow::Result<PathBuf> {
    let restored = engine.backups().restore_from_backup(backup, target)?;
    Ok(restored)
}

pub fn render_rules(store: &RuleStore) -> String {
    let mut out = String::new();
    if store.is_empty() {
        let _ = writeln!(out, "no learned rules in {}", store.path().display());
        return out;
    }
    let threshold = store.config().confidence_threshold;
    for rule in store.rules() {
        let marker = if rule.confidence >= threshold { "*" } else { " " };
        let _ = writeln!(
            out,
            "{} [{:.2} x{}] layer {}: {}",
            marker, rule.confidence, rule.frequency, rule.layer, rule.description
        );
        let _ = writeln!(out, "    {} => {}", rule.pattern, rule.replacement);
    }
    out
}
