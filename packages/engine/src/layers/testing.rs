//! Layer 6: test suites.

use crate::error::Result;
use crate::transform::testing::{AsyncTestCallbacks, JestDomImport, TestingLibraryImports};
use crate::transform::{apply_visitors, ParseMode, Rewrite, SourceFile};

use super::{Layer, LayerId};

pub struct TestingLayer;

impl Layer for TestingLayer {
    fn id(&self) -> LayerId {
        LayerId::Testing
    }

    fn applies_to(&self, file: &SourceFile) -> bool {
        file.is_script() && file.is_test()
    }

    /// `await` inside a synchronous test callback is itself a syntax error,
    /// so the tree is accepted in recovered form; the result is still
    /// validated strictly.
    fn transform(&self, code: &str, file: &SourceFile) -> Result<Rewrite> {
        apply_visitors(
            code,
            file,
            &[&AsyncTestCallbacks, &TestingLibraryImports, &JestDomImport],
            ParseMode::Recover,
        )
    }
}
