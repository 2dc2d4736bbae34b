#![deny(clippy::all)]

/**
 * mend CLI
 *
 * `mend fix`, `mend backups`, `mend restore` and `mend rules` over one
 * engine opened from `mend.config.json`.
 */
pub mod commands;
pub mod fix;
pub mod report;


use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Arg, ArgAction, ArgMatches, Command};
use mend_engine::{Engine, EngineConfig, LayerSelection};

use crate::fix::FixOptions;

/// CLI version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn cli() -> Command {
    Command::new("mend")
        .version(version())
        .about("Layered, validated modernization of front-end component sources")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Path to mend.config.json")
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Log every layer decision")
                .global(true),
        )
        .subcommand(
            Command::new("fix")
                .about("Run the layer pipeline over files and directories")
                .arg(
                    Arg::new("paths")
                        .value_name("PATH")
                        .num_args(1..)
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("layers")
                        .short('l')
                        .long("layers")
                        .value_name("LAYERS")
                        .default_value("auto")
                        .value_parser(|s: &str| s.parse::<LayerSelection>())
                        .help("auto, all, or a list such as 1,2,4"),
                )
                .arg(
                    Arg::new("dry-run")
                        .long("dry-run")
                        .action(ArgAction::SetTrue)
                        .help("Compute fixes without writing or backing up"),
                )
                .arg(
                    Arg::new("analyze")
                        .long("analyze")
                        .action(ArgAction::SetTrue)
                        .help("Report what would change; never writes"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Print the full result document as JSON"),
                ),
        )
        .subcommand(
            Command::new("backups")
                .about("List the backups of a file, newest first")
                .arg(
                    Arg::new("file")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("restore")
                .about("Restore a backup after verifying its hash")
                .arg(
                    Arg::new("backup")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("target")
                        .short('t')
                        .long("target")
                        .value_name("FILE")
                        .value_parser(clap::value_parser!(PathBuf))
                        .help("Write here instead of the original path"),
                ),
        )
        .subcommand(Command::new("rules").about("Show the learned rules"))
}

/// `--config FILE`, or `mend.config.json` in `cwd`, or defaults rooted at
/// `cwd`.
pub fn load_config(explicit: Option<&Path>, cwd: &Path) -> anyhow::Result<EngineConfig> {
    match explicit {
        Some(path) => {
            let path = absolutize(path, cwd);
            let mut config = EngineConfig::load(&path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            if config.project_root.is_none() {
                config.project_root = path.parent().map(Path::to_path_buf);
            }
            Ok(config)
        }
        None => EngineConfig::discover(cwd),
    }
}

pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

/// Run a parsed command line. Returns the process exit code.
pub fn run(matches: &ArgMatches) -> anyhow::Result<i32> {
    let cwd = env::current_dir().context("cannot read the current directory")?;
    let config = load_config(
        matches.get_one::<String>("config").map(Path::new),
        &cwd,
    )?;
    let engine = Engine::open(config).context("failed to open the engine")?;

    match matches.subcommand() {
        Some(("fix", sub)) => {
            let options = FixOptions {
                paths: sub
                    .get_many::<PathBuf>("paths")
                    .into_iter()
                    .flatten()
                    .map(|p| absolutize(p, &cwd))
                    .collect(),
                layers: sub
                    .get_one::<LayerSelection>("layers")
                    .cloned()
                    .unwrap_or_default(),
                dry_run: sub.get_flag("dry-run"),
                analyze: sub.get_flag("analyze"),
                verbose: matches.get_flag("verbose"),
            };
            let json = sub.get_flag("json");
            let mut report = fix::run_fix(&engine, &options);
            report.learning = Some(engine.close().context("failed to save learned rules")?);
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_text());
            }
            Ok(report.exit_code())
        }
        Some(("backups", sub)) => {
            let file = sub
                .get_one::<PathBuf>("file")
                .map(|p| absolutize(p, &cwd))
                .context("missing file")?;
            let backups = engine.backups().list_backups(&file)?;
            print!("{}", commands::render_backups(&file, &backups));
            Ok(0)
        }
        Some(("restore", sub)) => {
            let backup = sub
                .get_one::<PathBuf>("backup")
                .map(|p| absolutize(p, &cwd))
                .context("missing backup path")?;
            let target = sub.get_one::<PathBuf>("target").map(|p| absolutize(p, &cwd));
            let restored = commands::restore(&engine, &backup, target.as_deref())?;
            println!("restored {}", restored.display());
            Ok(0)
        }
        Some(("rules", _)) => {
            print!("{}", commands::render_rules(engine.rules()));
            Ok(0)
        }
        _ => Ok(2),
    }
}
