//! # Env Command Implementation
//!
//! Prints every required environment variable with its description and the
//! value staging would see, including values filled in from a dotenv file.
//! Fails when any of them is unset, so it doubles as a preflight check.

use anyhow::{bail, Result};
use clap::Args;
use log::LevelFilter;
use std::path::PathBuf;

use ceph_stage::config::{SourceLayout, StageConfig, REQUIRED_ENV_VARS};
use ceph_stage::logging;
use ceph_stage::output::render_env;

use super::{load_environment, GlobalOptions};

/// Show the required environment variables and their values
#[derive(Args, Debug)]
pub struct EnvArgs {
    /// Repository root, used to find the default .env file
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Dotenv file with defaults for unset variables
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

/// Execute the `env` command.
pub fn execute(args: EnvArgs, global: &GlobalOptions) -> Result<()> {
    logging::init_stderr_logger(global.log_level.unwrap_or(LevelFilter::Warn));
    let env = load_environment(args.env_file.as_deref(), &args.root)?;

    println!("Required environment variables:");
    print!("{}", render_env(&global.output, &env));

    let unset = REQUIRED_ENV_VARS
        .iter()
        .filter(|(name, _)| !env.contains(name))
        .count();
    if unset > 0 {
        bail!("{} required environment variable(s) are unset", unset);
    }

    let config = StageConfig::from_env(env, SourceLayout::new(args.root))?;
    println!();
    println!("Computed:");
    for name in ["BASE_IMAGE", "GO_ARCH"] {
        println!("  {:<18} = \"{}\"", name, config.env.get(name).unwrap_or_default());
    }
    Ok(())
}
