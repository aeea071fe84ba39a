//! Thin wrappers over the system `git` command.
//!
//! Staging only ever reads from git: the repository coordinates recorded in
//! the log and the manifest, and whether a source file has uncommitted
//! changes. A failing command is not fatal for any of these; callers get an
//! `Err` and decide on a fallback.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Command;

use crate::error::{Error, Result};

/// Run `git <args>` in `work_dir` and return trimmed stdout.
pub fn run<S: AsRef<OsStr>>(work_dir: &Path, args: &[S]) -> Result<String> {
    let command = || {
        args.iter()
            .map(|a| a.as_ref().to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    };
    let output = Command::new("git")
        .args(args)
        .current_dir(work_dir)
        .output()
        .map_err(|e| Error::GitCommand {
            command: command(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(Error::GitCommand {
            command: command(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// URL of the `origin` remote
pub fn remote_url(work_dir: &Path) -> Result<String> {
    run(work_dir, &["ls-remote", "--get-url", "origin"])
}

/// Name of the checked-out branch
pub fn current_branch(work_dir: &Path) -> Result<String> {
    run(work_dir, &["rev-parse", "--abbrev-ref", "HEAD"])
}

/// Full hash of `HEAD`
pub fn head_commit(work_dir: &Path) -> Result<String> {
    run(work_dir, &["rev-parse", "--verify", "HEAD"])
}

/// Porcelain status lines for `path`, or for the whole tree when `path` is `None`.
///
/// Untracked files are listed individually so that a new file inside an
/// untracked directory is reported as dirty.
pub fn status_porcelain(work_dir: &Path, path: Option<&Path>) -> Result<Vec<String>> {
    let mut args: Vec<&OsStr> = ["status", "--porcelain", "--untracked-files=all"]
        .into_iter()
        .map(OsStr::new)
        .collect();
    if let Some(path) = path {
        args.push(OsStr::new("--"));
        args.push(path.as_os_str());
    }
    let stdout = run(work_dir, args.as_slice())?;
    Ok(parse_porcelain(&stdout))
}

/// Split porcelain output into non-empty status lines.
fn parse_porcelain(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}
