//! # CLI Command Implementations
//!
//! One file per subcommand. Each contains an `Args` struct derived with
//! `clap` and an `execute` function that calls into the `ceph_stage`
//! library.
//!
//! Flags shared by the commands that look at the source tree live in
//! [`SourceArgs`], and environment loading in [`load_environment`].

pub mod blacklist;
pub mod env;
pub mod stage;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use log::LevelFilter;

use ceph_stage::config::{Environment, SourceLayout};
use ceph_stage::defaults;
use ceph_stage::output::OutputConfig;

/// Options that apply to every subcommand
#[derive(Debug, Clone, Copy)]
pub struct GlobalOptions {
    pub output: OutputConfig,
    /// Explicit `--log-level`, if given
    pub log_level: Option<LevelFilter>,
}

/// Where the layered sources live
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Repository root; source directories and a relative STAGING_DIR are resolved against it
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub root: PathBuf,

    /// Directory of generic files shared by every flavor
    #[arg(long, value_name = "DIR", default_value = defaults::CORE_FILES_DIR)]
    pub core_dir: PathBuf,

    /// Directory of per-release, per-distro overrides
    #[arg(long, value_name = "DIR", default_value = defaults::CEPH_RELEASES_DIR)]
    pub releases_dir: PathBuf,

    /// Blacklist rule file
    #[arg(long, value_name = "FILE", default_value = defaults::BLACKLIST_FILE)]
    pub blacklist: PathBuf,

    /// Dotenv file with defaults for unset variables [default: <root>/.env if present]
    #[arg(long, value_name = "FILE")]
    pub env_file: Option<PathBuf>,
}

impl SourceArgs {
    pub fn layout(&self) -> SourceLayout {
        SourceLayout {
            root: self.root.clone(),
            core_dir: self.core_dir.clone(),
            releases_dir: self.releases_dir.clone(),
            blacklist_file: self.blacklist.clone(),
        }
    }
}

/// Snapshot the process environment, filling unset variables from a dotenv file.
///
/// Variables already set in the process always win over the file.
pub fn load_environment(env_file: Option<&Path>, root: &Path) -> Result<Environment> {
    let mut env = Environment::from_process();

    let path = match env_file {
        Some(path) => Some(path.to_path_buf()),
        None => Some(root.join(defaults::ENV_FILE)).filter(|p| p.is_file()),
    };
    let Some(path) = path else {
        return Ok(env);
    };

    let entries = dotenvy::from_path_iter(&path)
        .with_context(|| format!("Failed to open env file {}", path.display()))?;
    for entry in entries {
        let (name, value) =
            entry.with_context(|| format!("Failed to parse env file {}", path.display()))?;
        if !env.contains(&name) {
            env.set(name, value);
        }
    }
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    #[serial]
    fn test_env_file_fills_unset_variables() {
        let temp = TempDir::new().unwrap();
        let env_file = temp.path().join("build.env");
        std::fs::write(
            &env_file,
            "CEPH_STAGE_TEST_FROM_FILE=file\nPATH=overridden\n",
        )
        .unwrap();

        let env = load_environment(Some(&env_file), temp.path()).unwrap();
        assert_eq!(env.get("CEPH_STAGE_TEST_FROM_FILE"), Some("file"));
        assert_ne!(env.get("PATH"), Some("overridden"));
    }

    #[test]
    #[serial]
    fn test_default_env_file_is_optional() {
        let temp = TempDir::new().unwrap();
        let env = load_environment(None, temp.path()).unwrap();
        assert!(!env.contains("CEPH_STAGE_TEST_FROM_FILE"));
    }

    #[test]
    #[serial]
    fn test_explicit_missing_env_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(load_environment(Some(&temp.path().join("nope.env")), temp.path()).is_err());
    }
}
