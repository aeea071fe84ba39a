//! # Ceph Stage CLI
//!
//! This is the binary entry point for the `ceph-stage` command-line tool.
//!
//! Its responsibilities are parsing command-line arguments with `clap`,
//! dispatching to the matching command, and turning any error into a
//! message on stderr with a non-zero exit status. All staging logic lives in
//! the `ceph_stage` library.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
