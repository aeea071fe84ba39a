//! # Error Handling
//!
//! This module defines the centralized error type for `ceph-stage`. It uses
//! the `thiserror` library to create a single `Error` enum covering every
//! way a staging run can fail.
//!
//! Every variant is fatal: a staging run never retries and never resumes.
//! The variants fall into three groups:
//!
//! - Configuration errors (`Config`, `Blacklist`, `MissingVariableFile`,
//!   `UnsetVariable`, `SubstitutionCycle`): the build inputs are wrong and
//!   re-running without fixing them will fail the same way.
//! - I/O errors (`Filesystem`, `Io`): the message carries the OS error code
//!   and text so the operator can see what the kernel refused.
//! - Collaborator errors (`GitCommand`, `Regex`).

use std::path::Path;

use thiserror::Error;

/// Main error type for ceph-stage operations
#[derive(Error, Debug)]
pub enum Error {
    /// The staging configuration (usually the environment) is incomplete or invalid.
    #[error("Configuration error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    Config {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A line in the blacklist rule file could not be parsed.
    #[error("Blacklist error at line {line}: {message}")]
    Blacklist { line: usize, message: String },

    /// A `__VARIABLE__` token has no same-named file in the staging root.
    #[error("Variable file for {variable} not found at {path} (referenced from {file})")]
    MissingVariableFile {
        variable: String,
        path: String,
        file: String,
    },

    /// A `STAGE_REPLACE_WITH_<VAR>` token names an unset environment variable.
    #[error("Variable {token} in {file} could not be replaced, because the env var {variable} is unset")]
    UnsetVariable {
        token: String,
        variable: String,
        file: String,
    },

    /// Variable files keep producing new tokens; most likely they reference each other.
    #[error("Variable substitution in {file} did not settle after {passes} passes; unresolved: {remaining}")]
    SubstitutionCycle {
        file: String,
        passes: usize,
        remaining: String,
    },

    /// A filesystem operation failed during staging.
    #[error("Filesystem operation error: {message}")]
    Filesystem { message: String },

    /// A git command could not be executed.
    #[error("Git command failed: {command} - {stderr}")]
    GitCommand { command: String, stderr: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Wrap an OS error with the action that failed, surfacing the errno.
    ///
    /// The rendered message reads like `Could not copy file a to b\nError [2]: No such file or directory`.
    pub fn filesystem(action: impl Into<String>, err: &std::io::Error) -> Self {
        let code = err
            .raw_os_error()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        Error::Filesystem {
            message: format!("{}\nError [{}]: {}", action.into(), code, err),
        }
    }

    /// Shorthand for the common `Could not <verb> <path>` filesystem failure.
    pub(crate) fn at_path(verb: &str, path: &Path, err: &std::io::Error) -> Self {
        Self::filesystem(format!("Could not {} {}", verb, path.display()), err)
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
