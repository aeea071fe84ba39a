//! # Blacklist Command Implementation
//!
//! Evaluates the blacklist rule file against the current environment and
//! prints the paths a staging run would skip. Read-only.

use anyhow::Result;
use clap::Args;
use log::LevelFilter;

use ceph_stage::blacklist::Blacklist;
use ceph_stage::logging;

use super::{load_environment, GlobalOptions, SourceArgs};

/// Show the paths excluded for the current environment
#[derive(Args, Debug)]
pub struct BlacklistArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

/// Execute the `blacklist` command.
pub fn execute(args: BlacklistArgs, global: &GlobalOptions) -> Result<()> {
    logging::init_stderr_logger(global.log_level.unwrap_or(LevelFilter::Warn));
    let layout = args.source.layout();
    let env = load_environment(args.source.env_file.as_deref(), &layout.root)?;

    let rule_file = layout.resolve(&layout.blacklist_file);
    let blacklist = Blacklist::load(&rule_file, &env, &layout)?;

    if blacklist.is_empty() {
        println!("Nothing is blacklisted for this environment");
        return Ok(());
    }
    println!(
        "{} Blacklisted by {}:",
        global.output.mark("🚫", "[SKIP]"),
        rule_file.display()
    );
    for entry in blacklist.entries() {
        println!("  {}", entry);
    }
    Ok(())
}
