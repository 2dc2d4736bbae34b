//! Transform Tests
//!
//! End-to-end requests against in-memory sources: layer selection, guard
//! idempotence, the validation safety net and analysis mode.

mod utils;

use mend_engine::{ChangeKind, Engine, LayerId, LayerSelection, LayerStrategy, TransformRequest};
use pretty_assertions::assert_eq;
use utils::Project;

const BROWSER_READS: &str = "const w = window.innerWidth;
const t = document.title;
const s = localStorage.getItem(\"k\");
";

#[test]
fn should_guard_each_browser_global_once() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();
    let path = project.root().join("src/viewport.js");

    let first = engine.transform(
        &TransformRequest::for_source(&path, BROWSER_READS)
            .with_layers(LayerSelection::explicit([LayerId::Hydration])),
    );

    assert!(first.success);
    assert_eq!(first.change_count, 3);
    assert!(first.changes.iter().all(|c| c.kind == ChangeKind::GuardAdded));
    assert!(first.code.contains(
        "(typeof localStorage !== \"undefined\" ? localStorage.getItem(\"k\") : undefined)"
    ));
    assert_eq!(first.layers[0].strategy, LayerStrategy::Tree);

    let second = engine.transform(
        &TransformRequest::for_source(&path, first.code.clone())
            .with_layers(LayerSelection::explicit([LayerId::Hydration]))
            .dry_run(true),
    );

    assert!(second.success);
    assert_eq!(second.change_count, 0);
    assert_eq!(second.code, first.code);
}

#[test]
fn should_leave_unparsable_sources_untouched() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();
    let source = "export const = ;\n";

    let response = engine.transform(
        &TransformRequest::for_source(project.root().join("src/broken.js"), source)
            .with_layers(LayerSelection::all()),
    );

    assert!(!response.success);
    assert_eq!(response.code, source);
    assert_eq!(response.change_count, 0);
    assert_eq!(response.error.as_ref().map(|e| e.kind.as_str()), Some("parse"));
    for layer in &response.layers {
        assert!(
            matches!(layer.strategy, LayerStrategy::Skipped | LayerStrategy::Failed),
            "layer {} ended {}",
            layer.layer,
            layer.strategy
        );
        assert_eq!(layer.code, source);
    }
}

#[test]
fn should_report_without_applying_in_analysis_mode() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();
    let source = "console.log(1);\nlet a = 1;\n";

    let response = engine.transform(
        &TransformRequest::for_source(project.root().join("src/a.js"), source)
            .with_layers(LayerSelection::explicit([LayerId::Patterns]))
            .apply_fixes(false),
    );

    assert!(response.success);
    assert_eq!(response.change_count, 1);
    assert_eq!(response.code, source);
    assert_eq!(response.layers[0].code, "let a = 1;\n");
}

#[test]
fn should_refuse_excluded_files() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();

    let response = engine.transform(&TransformRequest::for_source(
        project.root().join("node_modules/pkg/index.js"),
        "var a = 1;\n",
    ));

    assert!(!response.success);
    assert!(response.layers.is_empty());
    assert_eq!(response.error.map(|e| e.kind), Some("excluded".to_string()));
}

#[test]
fn should_select_only_the_config_layer_for_tsconfig() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();
    let source = "{\n  // legacy\n  \"compilerOptions\": { \"target\": \"es5\", \"strict\": false }\n}\n";

    let response = engine.transform(&TransformRequest::for_source(
        project.root().join("tsconfig.json"),
        source,
    ));

    assert!(response.success);
    let ran: Vec<LayerId> = response.layers.iter().map(|l| l.layer).collect();
    assert_eq!(ran, vec![LayerId::Config]);

    let value: serde_json::Value = serde_json::from_str(&response.code).unwrap();
    let options = &value["compilerOptions"];
    assert_eq!(options["target"], "es2020");
    assert_eq!(options["strict"], false);
    assert_eq!(options["skipLibCheck"], true);
    assert_eq!(response.change_count, 4);
}

#[test]
fn should_pick_layers_from_content() {
    let project = Project::new();
    let engine = Engine::open(project.config()).unwrap();
    let source = "export function Width() {\n  return <p>{window.innerWidth}</p>;\n}\n";

    let response = engine.transform(
        &TransformRequest::for_source(project.root().join("src/Width.jsx"), source).dry_run(true),
    );

    let ran: Vec<LayerId> = response.layers.iter().map(|l| l.layer).collect();
    assert_eq!(
        ran,
        vec![
            LayerId::Patterns,
            LayerId::Components,
            LayerId::Hydration,
            LayerId::Adaptive
        ]
    );
}
