//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::LevelFilter;

use crate::commands::{self, GlobalOptions};
use ceph_stage::output::OutputConfig;

/// Ceph Stage - Assemble per-image build contexts for Ceph containers
#[derive(Parser, Debug)]
#[command(name = "ceph-stage")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (off, error, warn, info, debug, trace)
    ///
    /// Overrides the level derived from the DEBUG environment variable.
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stage every image in IMAGES_TO_BUILD into STAGING_DIR
    Stage(commands::stage::StageArgs),

    /// Show the required environment variables and their current values
    Env(commands::env::EnvArgs),

    /// Show what the blacklist excludes for the current environment
    Blacklist(commands::blacklist::BlacklistArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let global = GlobalOptions {
            output: OutputConfig::from_env_and_flag(&self.color),
            log_level: self.log_level,
        };

        match self.command {
            Commands::Stage(args) => commands::stage::execute(args, &global),
            Commands::Env(args) => commands::env::execute(args, &global),
            Commands::Blacklist(args) => commands::blacklist::execute(args, &global),
        }
    }
}
