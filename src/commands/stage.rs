//! # Stage Command Implementation
//!
//! Runs the full staging pipeline for every image in `IMAGES_TO_BUILD`:
//!
//! 1. Load and validate the environment into a `StageConfig`.
//! 2. Open the run log (rotating it first if it is older than a day).
//! 3. Query version control and export `GIT_*` variables.
//! 4. Reset the staging directory, collect every image, substitute
//!    variables and write the `files-sources` manifest.
//! 5. Print a summary.
//!
//! Progress details go to the log file; stdout only gets the coordinates
//! and the summary, and nothing at all with `--quiet`.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use clap::Args;
use log::{error, info};

use ceph_stage::config::{Environment, StageConfig};
use ceph_stage::output::{render_coordinates, render_summary};
use ceph_stage::vcs::{GitVersionControl, StaticVersionControl, VersionControl};
use ceph_stage::{defaults, logging, stager};

use super::{load_environment, GlobalOptions, SourceArgs};

/// Stage build contexts for every image in IMAGES_TO_BUILD
#[derive(Args, Debug)]
pub struct StageArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Run log; appended to, and replaced when older than a day
    #[arg(long, value_name = "FILE", env = "LOG_FILE", default_value = defaults::LOG_FILE)]
    pub log_file: PathBuf,

    /// Do not query git; coordinates are unknown and every source counts as clean
    #[arg(long)]
    pub no_vcs: bool,

    /// Do not print coordinates or the summary
    #[arg(short, long)]
    pub quiet: bool,
}

/// Execute the `stage` command.
pub fn execute(args: StageArgs, global: &GlobalOptions) -> Result<()> {
    let layout = args.source.layout();
    let env = load_environment(args.source.env_file.as_deref(), &layout.root)?;

    let level = global
        .log_level
        .unwrap_or_else(|| logging::level_from_env(&env));
    if logging::rotate_if_stale(&args.log_file, defaults::MAX_LOG_AGE)? {
        eprintln!("Removed log file older than one day: {}", args.log_file.display());
    }
    logging::init_file_logger(&args.log_file, level)?;

    let mut config = StageConfig::from_env(env, layout).inspect_err(|e| error!("{}", e))?;

    let vcs: Box<dyn VersionControl> = if args.no_vcs {
        Box::new(StaticVersionControl::unknown())
    } else {
        Box::new(GitVersionControl::new(config.layout.root.clone()))
    };
    config.export_vcs_info(vcs.as_ref());
    log_run_header(&config.env);

    if !args.quiet {
        println!("Staging with:");
        print!("{}", render_coordinates(&config.env));
    }

    let report = stager::execute(&config, vcs.as_ref()).inspect_err(|e| error!("{}", e))?;

    if !args.quiet {
        print!("{}", render_summary(&global.output, &report));
    }
    Ok(())
}

fn log_run_header(env: &Environment) {
    let started = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    info!("");
    info!("");
    info!("Start time: {}", started);
    for name in ["GIT_REPO", "GIT_BRANCH", "GIT_COMMIT", "GIT_CLEAN"] {
        info!("{:<11} {}", format!("{}:", name), env.get(name).unwrap_or_default());
    }
    info!("");
    for line in render_coordinates(env).lines() {
        info!("{}", line);
    }
}
