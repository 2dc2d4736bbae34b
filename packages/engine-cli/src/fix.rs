use std::path::PathBuf;
use std::time::Instant;

use mend_engine::{Engine, LayerSelection, TransformRequest};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::report::FixReport;

#[derive(Debug, Clone, Default)]
pub struct FixOptions {
    /// Absolute files or directories.
    pub paths: Vec<PathBuf>,
    pub layers: LayerSelection,
    pub dry_run: bool,
    /// Report only; returned code is the original and nothing is written.
    pub analyze: bool,
    pub verbose: bool,
}

/// Expand directories through the engine's filter. Explicit files are kept
/// as given so the engine can report them as excluded.
pub fn collect_targets(engine: &Engine, paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    for path in paths {
        if path.is_dir() {
            let found = engine.filter().discover(path);
            debug!(dir = %path.display(), files = found.len(), "discovered");
            targets.extend(found);
        } else {
            targets.push(path.clone());
        }
    }
    targets.sort();
    targets.dedup();
    targets
}

pub fn run_fix(engine: &Engine, options: &FixOptions) -> FixReport {
    let start = Instant::now();
    let targets = collect_targets(engine, &options.paths);
    info!(files = targets.len(), "fixing");

    let results: Vec<_> = targets
        .par_iter()
        .map(|path| {
            let request = TransformRequest::for_file(path)
                .with_layers(options.layers.clone())
                .dry_run(options.dry_run)
                .apply_fixes(!options.analyze)
                .verbose(options.verbose);
            engine.transform(&request)
        })
        .collect();

    info!(elapsed = ?start.elapsed(), "fix finished");
    FixReport::new(results, options.dry_run || options.analyze)
}
