// Layer Tests
//
// Tests for layer ids, stage selection in the runner, automatic layer
// selection and the per-layer fixes.

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::api::{ChangeKind, LayerStrategy};
    use crate::config::LearningConfig;
    use crate::error::{EngineError, Result};
    use crate::fallback::apply_fallback;
    use crate::layers::*;
    use crate::learning::{LearnedRule, RuleStore};
    use crate::transform::{Rewrite, SourceFile};

    fn run(id: LayerId, path: &str, code: &str) -> crate::api::LayerResult {
        let layer = builtin(id).unwrap();
        run_layer(layer.as_ref(), code, &SourceFile::new(path))
    }

    /// A layer whose tree pass always fails, leaving only the fallback.
    struct BrokenTree(LayerId);

    impl Layer for BrokenTree {
        fn id(&self) -> LayerId {
            self.0
        }

        fn applies_to(&self, _file: &SourceFile) -> bool {
            true
        }

        fn transform(&self, _code: &str, file: &SourceFile) -> Result<Rewrite> {
            Err(EngineError::parse(file.path(), "visitor failed"))
        }
    }

    /// A layer whose tree pass emits unparsable text.
    struct InvalidOutput(LayerId);

    impl Layer for InvalidOutput {
        fn id(&self) -> LayerId {
            self.0
        }

        fn applies_to(&self, _file: &SourceFile) -> bool {
            true
        }

        fn transform(&self, code: &str, _file: &SourceFile) -> Result<Rewrite> {
            Ok(Rewrite {
                code: format!("{} = = ;", code),
                ..Rewrite::default()
            })
        }
    }

    mod id_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_number_layers_one_to_seven() {
            let numbers: Vec<u8> = LayerId::ALL.iter().map(|id| id.number()).collect();
            assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7]);
            assert_eq!(LayerId::from_number(4), Some(LayerId::Hydration));
            assert_eq!(LayerId::from_number(8), None);
        }

        #[test]
        fn should_display_number_and_name() {
            assert_eq!(LayerId::Hydration.to_string(), "4 (hydration)");
        }

        #[test]
        fn should_iterate_sets_in_pipeline_order() {
            let set: LayerSet = [LayerId::Adaptive, LayerId::Config, LayerId::Hydration]
                .into_iter()
                .collect();
            assert_eq!(
                set.ids().as_slice(),
                &[LayerId::Config, LayerId::Hydration, LayerId::Adaptive]
            );
        }

        #[test]
        fn should_serialize_layer_as_number() {
            assert_eq!(serde_json::to_string(&LayerId::Framework).unwrap(), "5");
            let id: LayerId = serde_json::from_str("2").unwrap();
            assert_eq!(id, LayerId::Patterns);
            assert!(serde_json::from_str::<LayerId>("9").is_err());
        }

        #[test]
        fn should_leave_adaptive_out_of_builtins() {
            assert!(builtin(LayerId::Adaptive).is_none());
            assert!(builtin(LayerId::Config).is_some());
        }
    }

    mod runner_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_use_tree_result_when_it_validates() {
            let result = run(LayerId::Hydration, "src/size.ts", "const w = window.innerWidth;\n");

            assert_eq!(result.strategy, LayerStrategy::Tree);
            assert!(result.success);
            assert_eq!(result.change_count, 1);
            assert_eq!(
                result.code,
                "const w = (typeof window !== \"undefined\" ? window.innerWidth : undefined);\n"
            );
            assert_eq!(result.original_code, "const w = window.innerWidth;\n");
        }

        #[test]
        fn should_report_unchanged_when_nothing_applies() {
            let result = run(LayerId::Patterns, "src/a.ts", "let a = 1;\n");
            assert_eq!(result.strategy, LayerStrategy::Unchanged);
            assert_eq!(result.change_count, 0);
            assert!(result.success);
        }

        #[test]
        fn should_skip_layers_that_do_not_target_the_file() {
            let result = run(LayerId::Testing, "src/a.ts", "let a = 1;\n");
            assert_eq!(result.strategy, LayerStrategy::Skipped);
            assert_eq!(result.code, "let a = 1;\n");
        }

        #[test]
        fn should_fall_back_when_tree_pass_fails() {
            let code = "console.log(1);\nlet a = 1;\n";
            let result = run_layer(&BrokenTree(LayerId::Patterns), code, &SourceFile::new("a.js"));

            assert_eq!(result.strategy, LayerStrategy::Fallback);
            assert!(result.success);
            assert_eq!(result.code, "let a = 1;\n");
            assert_eq!(result.change_count, 1);
            assert!(result.warnings[0].contains("visitor failed"));
        }

        #[test]
        fn should_discard_invalid_tree_output() {
            let code = "const a = 1;\n";
            let result = run_layer(&InvalidOutput(LayerId::Patterns), code, &SourceFile::new("a.js"));

            assert!(result.success);
            assert_eq!(result.strategy, LayerStrategy::Unchanged);
            assert_eq!(result.code, code);
            assert_eq!(result.warnings.len(), 1);
        }

        #[test]
        fn should_pass_input_through_when_no_stage_validates() {
            let code = "console.log(1);\nlet = ;\n";
            let result = run(LayerId::Patterns, "broken.js", code);

            assert!(!result.success);
            assert_eq!(result.strategy, LayerStrategy::Failed);
            assert_eq!(result.code, code);
            assert_eq!(result.change_count, 0);
            assert_eq!(result.error.as_ref().map(|e| e.kind.as_str()), Some("parse"));
        }
    }

    mod detect_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_select_config_layer_for_config_files() {
            assert_eq!(auto_select(&SourceFile::new("tsconfig.json"), "{}"), LayerSet::CONFIG);
            assert_eq!(
                auto_select(&SourceFile::new("next.config.js"), "module.exports = {};"),
                LayerSet::CONFIG
            );
        }

        #[test]
        fn should_select_nothing_for_other_json() {
            assert!(auto_select(&SourceFile::new("data/items.json"), "[]").is_empty());
        }

        #[test]
        fn should_select_by_content() {
            let code = r#"import { useState } from "react";
export function Size() {
  const [w] = useState(window.innerWidth);
  return <span>{w}</span>;
}
"#;
            let set = auto_select(&SourceFile::new("src/Size.tsx"), code);
            assert_eq!(
                set,
                LayerSet::PATTERNS
                    | LayerSet::COMPONENTS
                    | LayerSet::HYDRATION
                    | LayerSet::FRAMEWORK
                    | LayerSet::ADAPTIVE
            );
        }

        #[test]
        fn should_select_minimal_layers_for_plain_module() {
            let set = auto_select(&SourceFile::new("src/math.ts"), "export const add = (a: number, b: number) => a + b;\n");
            assert_eq!(set, LayerSet::PATTERNS | LayerSet::ADAPTIVE);
        }

        #[test]
        fn should_select_testing_for_test_files() {
            let set = auto_select(&SourceFile::new("src/math.test.ts"), "test('x', () => {});\n");
            assert!(set.contains(LayerSet::TESTING));
        }

        #[test]
        fn should_select_framework_for_next_imports() {
            let set = auto_select(
                &SourceFile::new("app/page.tsx"),
                "import Link from \"next/link\";\nexport default function P() { return null; }\n",
            );
            assert!(set.contains(LayerSet::FRAMEWORK));
        }
    }

    mod catalogue_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_normalize_tsconfig() {
            let code = "{\n  // legacy\n  \"compilerOptions\": { \"target\": \"es5\", \"strict\": false, },\n}\n";
            let result = run(LayerId::Config, "tsconfig.json", code);

            assert_eq!(result.strategy, LayerStrategy::Tree);
            assert_eq!(result.change_count, 4);
            let value: serde_json::Value = serde_json::from_str(&result.code).unwrap();
            let options = &value["compilerOptions"];
            assert_eq!(options["target"], "es2020");
            assert_eq!(options["strict"], false);
            assert_eq!(options["esModuleInterop"], true);
            assert_eq!(options["skipLibCheck"], true);
            assert_eq!(options["forceConsistentCasingInFileNames"], true);
        }

        #[test]
        fn should_add_package_scripts() {
            let code = "{\"name\":\"app\",\"dependencies\":{\"next\":\"14.0.0\"}}";
            let result = run(LayerId::Config, "package.json", code);

            let value: serde_json::Value = serde_json::from_str(&result.code).unwrap();
            assert_eq!(value["scripts"]["lint"], "next lint");
            assert_eq!(value["scripts"]["type-check"], "tsc --noEmit");
            assert!(result.code.find("\"name\"").unwrap() < result.code.find("\"scripts\"").unwrap());
        }

        #[test]
        fn should_drop_obsolete_next_config_flags() {
            let code = "module.exports = {\n  swcMinify: true,\n  reactStrictMode: true,\n};\n";
            let result = run(LayerId::Config, "next.config.js", code);

            assert_eq!(result.code, "module.exports = {\n  reactStrictMode: true,\n};\n");
            assert_eq!(result.change_count, 1);
        }

        #[test]
        fn should_decode_entities_in_string_literals() {
            let result = run(LayerId::Patterns, "src/a.ts", "const s = \"it&#39;s &amp; more\";\n");
            assert_eq!(result.code, "const s = \"it's & more\";\n");
            assert_eq!(result.changes[0].kind, ChangeKind::EntityDecoded);
        }

        #[test]
        fn should_add_keys_to_mapped_elements() {
            let code = "const list = items.map(item => <li>{item}</li>);\n";
            let result = run(LayerId::Components, "src/List.jsx", code);

            assert_eq!(
                result.code,
                "const list = items.map((item, index) => <li key={index}>{item}</li>);\n"
            );
            assert_eq!(result.changes[0].kind, ChangeKind::KeyAdded);
        }

        #[test]
        fn should_add_required_intrinsic_attributes() {
            let code = "const a = <div><img src=\"a.png\" /><button>Go</button></div>;\n";
            let result = run(LayerId::Components, "src/A.jsx", code);

            assert_eq!(
                result.code,
                "const a = <div><img alt=\"\" src=\"a.png\" /><button type=\"button\">Go</button></div>;\n"
            );
            assert_eq!(result.change_count, 2);
        }

        #[test]
        fn should_place_client_directive_once() {
            let code = "import { useState } from \"react\";\nexport function A() {\n  const [s] = useState(0);\n  return s;\n}\n";
            let first = run(LayerId::Framework, "app/a.tsx", code);
            assert!(first.code.starts_with("'use client';\nimport"));
            assert_eq!(first.changes[0].kind, ChangeKind::DirectivePlaced);

            let second = run(LayerId::Framework, "app/a.tsx", &first.code);
            assert_eq!(second.change_count, 0);
            assert_eq!(second.code, first.code);
        }

        #[test]
        fn should_not_place_directive_in_server_files() {
            let code = "'use server';\nimport { useState } from \"react\";\nexport function A() { return useState(0); }\n";
            let result = run(LayerId::Framework, "app/a.tsx", code);
            assert_eq!(result.change_count, 0);
        }

        #[test]
        fn should_guard_statement_level_calls() {
            let result = run(LayerId::Hydration, "src/a.ts", "window.scrollTo(0, 0);\n");
            assert_eq!(
                result.code,
                "if (typeof window !== \"undefined\") { window.scrollTo(0, 0); }\n"
            );
        }

        #[test]
        fn should_not_reguard_guarded_output() {
            let first = run(LayerId::Hydration, "src/a.ts", "const w = window.innerWidth;\n");
            let second = run(LayerId::Hydration, "src/a.ts", &first.code);
            assert_eq!(second.change_count, 0);
            assert_eq!(second.code, first.code);
        }

        #[test]
        fn should_apply_learned_rules_in_adaptive_layer() {
            let mut store = RuleStore::new("rules.json", LearningConfig::default());
            store.add_rule(LearnedRule::new(
                r"export default ([A-Z][\w$]*);/",
                "export default memo($1);",
                0.8,
                LayerId::Components,
                "wrap the default component export in memo",
            ));
            let layer = AdaptiveLayer::new(&store);
            let result = run_layer(&layer, "function A() {}\nexport default A;\n", &SourceFile::new("src/A.js"));

            assert_eq!(result.strategy, LayerStrategy::Tree);
            assert_eq!(result.code, "function A() {}\nexport default memo(A);\n");
            assert_eq!(result.changes[0].kind, ChangeKind::RuleApplied);
        }
    }

    mod fallback_tests {
        use super::*;
        use pretty_assertions::assert_eq;

        #[test]
        fn should_add_attributes_with_patterns() {
            let file = SourceFile::new("src/A.jsx");
            let out = apply_fallback(LayerId::Components, "<img src=\"a.png\" />", &file);
            assert_eq!(out.code, "<img alt=\"\" src=\"a.png\" />");

            let again = apply_fallback(LayerId::Components, &out.code, &file);
            assert!(again.changes.is_empty());
        }

        #[test]
        fn should_guard_local_storage_reads_with_patterns() {
            let file = SourceFile::new("src/a.ts");
            let out = apply_fallback(LayerId::Hydration, "const t = localStorage.getItem(\"t\");\n", &file);
            assert_eq!(
                out.code,
                "const t = (typeof localStorage !== \"undefined\" ? localStorage.getItem(\"t\") : null);\n"
            );
        }

        #[test]
        fn should_rewrite_react_dom_render_with_patterns() {
            let file = SourceFile::new("src/index.js");
            let code = "import ReactDOM from 'react-dom';\nReactDOM.render(<App />, root);\n";
            let out = apply_fallback(LayerId::Framework, code, &file);
            assert_eq!(
                out.code,
                "import ReactDOM from 'react-dom/client';\nReactDOM.createRoot(root).render(<App />);\n"
            );
        }

        #[test]
        fn should_add_jest_dom_import_with_patterns() {
            let file = SourceFile::new("src/a.test.tsx");
            let code = "import { render } from \"@testing-library/react\";\nexpect(el).toBeInTheDocument();\n";
            let out = apply_fallback(LayerId::Testing, code, &file);
            assert_eq!(
                out.code,
                "import { render } from \"@testing-library/react\";\nimport \"@testing-library/jest-dom\";\nexpect(el).toBeInTheDocument();\n"
            );
        }

        #[test]
        fn should_remove_whole_line_diagnostics_with_patterns() {
            let file = SourceFile::new("src/a.js");
            let code = "function f(a) {\n  console.log(a);\n  console.debug(a, g(a));\n\n  // done\n  console.info(a);\n  return a;\n}\n";
            let out = apply_fallback(LayerId::Patterns, code, &file);
            assert_eq!(out.code, "function f(a) {\n\n  // done\n  return a;\n}\n");
            assert_eq!(out.changes.len(), 3);
            assert!(out.changes.iter().all(|c| c.kind == ChangeKind::DiagnosticRemoved));
        }

        #[test]
        fn should_keep_statements_sharing_a_line_with_a_diagnostic() {
            let file = SourceFile::new("src/a.js");
            let code = "console.log(a); save();\n";
            let out = apply_fallback(LayerId::Patterns, code, &file);
            assert_eq!(out.code, code);
            assert!(out.changes.is_empty());
        }

        #[test]
        fn should_keep_diagnostics_under_braceless_conditions() {
            let file = SourceFile::new("src/a.js");
            for code in [
                "if (dbg)\n  console.log(x);\nsave();\n",
                "if (ok) save();\nelse\n  console.log(x);\n",
            ] {
                let out = apply_fallback(LayerId::Patterns, code, &file);
                assert_eq!(out.code, code);
                assert!(out.changes.is_empty(), "changed: {}", code);
            }
        }

        #[test]
        fn should_have_no_adaptive_fallback() {
            let out = apply_fallback(LayerId::Adaptive, "let a;", &SourceFile::new("a.js"));
            assert_eq!(out.code, "let a;");
            assert!(out.changes.is_empty());
        }
    }
}
