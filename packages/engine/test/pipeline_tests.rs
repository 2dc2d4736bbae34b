//! Pipeline Tests
//!
//! Requests against files on disk: per-layer writes, backups, dry runs and
//! rollback after a failed layer.

mod utils;

use std::fs;

use mend_engine::backup::BackupManager;
use mend_engine::error::{EngineError, Result};
use mend_engine::layers::{builtin, Layer};
use mend_engine::pipeline::{Pipeline, RunOptions};
use mend_engine::recovery::ErrorHandler;
use mend_engine::transform::{Rewrite, SourceFile};
use mend_engine::{Engine, LayerId, LayerSelection, LayerStrategy, TransformRequest};
use pretty_assertions::assert_eq;
use utils::Project;

const SOURCE: &str = "console.log(\"mounted\");\nconst w = window.innerWidth;\n";
const FIXED: &str = "const w = (typeof window !== \"undefined\" ? window.innerWidth : undefined);\n";

fn both_layers() -> LayerSelection {
    LayerSelection::explicit([LayerId::Patterns, LayerId::Hydration])
}

/// Fails both stages: the tree pass errors and the fallback emits text that
/// does not parse.
struct Unfixable;

impl Layer for Unfixable {
    fn id(&self) -> LayerId {
        LayerId::Hydration
    }

    fn applies_to(&self, _file: &SourceFile) -> bool {
        true
    }

    fn transform(&self, _code: &str, file: &SourceFile) -> Result<Rewrite> {
        Err(EngineError::parse(file.path(), "visitor failed"))
    }

    fn fallback(&self, code: &str, _file: &SourceFile) -> Rewrite {
        Rewrite {
            code: format!("{} = = ;", code),
            ..Rewrite::default()
        }
    }
}

const WRITE: RunOptions = RunOptions {
    write: true,
    apply_fixes: true,
    verbose: false,
};

#[test]
fn should_write_each_mutating_layer_with_its_own_backup() {
    let project = Project::new();
    let path = project.write("src/viewport.js", SOURCE);
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(&TransformRequest::for_file(&path).with_layers(both_layers()));

    assert!(response.success);
    assert_eq!(response.code, FIXED);
    assert_eq!(project.read("src/viewport.js"), FIXED);

    let backups = BackupManager::from_config(engine.config());
    let listed = backups.list_backups(&path).unwrap();
    assert_eq!(listed.len(), 2);

    // Newest first: the snapshot taken before layer 4 holds layer 2's output.
    let before_hydration = backups.read_record(&listed[0].backup_path).unwrap();
    let before_patterns = backups.read_record(&listed[1].backup_path).unwrap();
    assert_eq!(before_patterns.content, SOURCE);
    assert_eq!(before_hydration.content, "const w = window.innerWidth;\n");

    for layer in &response.layers {
        assert_eq!(layer.strategy, LayerStrategy::Tree);
        assert!(layer.backup_path.as_ref().is_some_and(|p| p.exists()));
    }
}

#[test]
fn should_not_touch_disk_on_dry_run() {
    let project = Project::new();
    let path = project.write("src/viewport.js", SOURCE);
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(
        &TransformRequest::for_file(&path)
            .with_layers(both_layers())
            .dry_run(true),
    );

    assert!(response.success);
    assert_eq!(response.change_count, 2);
    assert_eq!(response.code, FIXED);
    assert_eq!(project.read("src/viewport.js"), SOURCE);
    assert!(!project.root().join(".mend").exists());
    assert!(response.layers.iter().all(|l| l.backup_path.is_none()));
}

#[test]
fn should_not_write_unchanged_files() {
    let project = Project::new();
    let path = project.write("src/plain.js", "export const a = 1;\n");
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(&TransformRequest::for_file(&path).with_layers(both_layers()));

    assert!(response.success);
    assert_eq!(response.change_count, 0);
    assert!(engine.backups().list_backups(&path).unwrap().is_empty());
}

#[test]
fn should_keep_the_file_when_every_layer_fails() {
    let project = Project::new();
    let broken = "const a = ;\nconsole.log(a);\n";
    let path = project.write("src/broken.js", broken);
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(
        &TransformRequest::for_file(&path).with_layers(LayerSelection::explicit([LayerId::Hydration])),
    );

    assert!(!response.success);
    assert_eq!(fs::read_to_string(&path).unwrap(), broken);
    assert!(engine.backups().list_backups(&path).unwrap().is_empty());
}

#[test]
fn should_read_missing_files_as_failures() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(&TransformRequest::for_file(project.root().join("src/gone.js")));

    assert!(!response.success);
    assert_eq!(response.error.map(|e| e.kind), Some("filesystem".to_string()));
}

#[test]
fn should_restore_the_file_when_a_later_layer_fails() {
    let project = Project::new();
    let path = project.write("src/viewport.js", SOURCE);
    let engine = Engine::open(project.config()).unwrap();
    let errors = ErrorHandler::new(engine.config().recovery.clone());
    let patterns = builtin(LayerId::Patterns).unwrap();
    let file = SourceFile::new(&path);

    let response = Pipeline::new(engine.backups(), &errors).run(
        &[patterns.as_ref(), &Unfixable],
        &file,
        SOURCE,
        WRITE,
    );

    assert!(!response.success);
    assert_eq!(response.error.as_ref().map(|e| e.kind.as_str()), Some("parse"));
    assert_eq!(response.code, SOURCE);
    assert_eq!(project.read("src/viewport.js"), SOURCE);

    assert_eq!(response.layers.len(), 2);
    assert_eq!(response.layers[0].strategy, LayerStrategy::Tree);
    assert!(response.layers[0].backup_path.is_some());
    assert_eq!(response.layers[1].strategy, LayerStrategy::Failed);
    assert!(response.layers[1]
        .warnings
        .iter()
        .any(|w| w.starts_with("pattern fallback produced invalid output")));
}

#[test]
fn should_stop_at_the_first_failed_layer_when_writing() {
    let project = Project::new();
    let path = project.write("src/viewport.js", SOURCE);
    let engine = Engine::open(project.config()).unwrap();
    let errors = ErrorHandler::new(engine.config().recovery.clone());
    let hydration = builtin(LayerId::Hydration).unwrap();

    let response = Pipeline::new(engine.backups(), &errors).run(
        &[&Unfixable, hydration.as_ref()],
        &SourceFile::new(&path),
        SOURCE,
        WRITE,
    );

    assert!(!response.success);
    assert_eq!(response.layers.len(), 1);
    assert_eq!(project.read("src/viewport.js"), SOURCE);
    assert!(engine.backups().list_backups(&path).unwrap().is_empty());
}

#[test]
fn should_guard_only_unbound_globals_on_disk() {
    let project = Project::new();
    let source = "function a(document) {\n  return document.title;\n}\nexport function b(w = window.innerWidth) {\n  const { t = document.title } = {};\n  return [a(w), t];\n}\n";
    let path = project.write("src/title.js", source);
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(
        &TransformRequest::for_file(&path).with_layers(LayerSelection::explicit([LayerId::Hydration])),
    );

    let fixed = "function a(document) {\n  return document.title;\n}\nexport function b(w = (typeof window !== \"undefined\" ? window.innerWidth : undefined)) {\n  const { t = (typeof document !== \"undefined\" ? document.title : undefined) } = {};\n  return [a(w), t];\n}\n";
    assert!(response.success);
    assert_eq!(response.change_count, 2);
    assert_eq!(project.read("src/title.js"), fixed);
}
