//! # Variable Substitution Engine
//!
//! After an image's files are staged, every staged file is treated as a
//! template and two kinds of tokens are resolved in it:
//!
//! 1. **File variables** (`__NAME__`): replaced by the trimmed contents of the
//!    file `<root>/__NAME__`. Variable files may contain further tokens, so
//!    resolution repeats until no file-variable token is left (bounded by
//!    [`MAX_SUBSTITUTION_PASSES`]).
//! 2. **Environment variables** (`STAGE_REPLACE_WITH_NAME`): replaced by the
//!    value of `NAME` in the [`Environment`] snapshot. This happens in a
//!    single pass; values are never re-scanned. An unset variable is fatal.
//!
//! Files are handled as raw bytes, so a template does not have to be valid
//! UTF-8; a file without any token match is simply left alone.
//!
//! Files whose name starts with a file-variable token are the variable
//! sources themselves and are never rewritten. A file `X.bak` is treated as
//! a backup, and skipped, only while its sibling `X` exists; a staged
//! `settings.bak` with no `settings` next to it is an ordinary template.
//!
//! A file whose text changes is rewritten through [`save_with_backup`]: the
//! original survives as `<file>.bak`. Unchanged files are not touched, which
//! makes running the engine twice a no-op.

use std::borrow::Cow;
use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use log::{debug, info};
use regex::bytes::{Captures, Regex};
use walkdir::WalkDir;

use crate::config::Environment;
use crate::error::{Error, Result};

/// `__NAME__` tokens naming a variable file
pub static VARIABLE_FILE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"__[A-Z0-9_]+__").expect("valid file variable pattern"));

/// `STAGE_REPLACE_WITH_NAME` tokens naming an environment variable
pub static ENV_VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"STAGE_REPLACE_WITH_[A-Z0-9_]+").expect("valid env variable pattern")
});

/// Prefix stripped from an environment token to get the variable name
pub const ENV_VAR_PREFIX: &str = "STAGE_REPLACE_WITH_";

/// Upper bound on file-variable resolution passes for a single file.
pub const MAX_SUBSTITUTION_PASSES: usize = 64;

/// Values longer than this are logged as a placeholder.
const MAX_LOGGED_VALUE_LEN: usize = 46;

/// Extension of the backup written next to a rewritten file
pub const BACKUP_EXTENSION: &str = "bak";

/// Counts for one substitution run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    /// Template files read
    pub scanned: usize,
    /// Files whose text changed and were rewritten
    pub rewritten: usize,
    /// Variable source files and backups left alone
    pub skipped: usize,
}

/// Whether a file is a variable source (its name starts with a `__NAME__` token).
pub fn is_variable_file(file_name: impl AsRef<OsStr>) -> bool {
    VARIABLE_FILE_PATTERN
        .find(file_name.as_ref().as_encoded_bytes())
        .is_some_and(|m| m.start() == 0)
}

/// `X.bak` is a backup written by this engine only while `X` exists.
fn is_backup_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == BACKUP_EXTENSION) && path.with_extension("").is_file()
}

/// The `.bak` sibling of `path`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(BACKUP_EXTENSION);
    path.with_file_name(name)
}

/// What gets written to the log for a substituted value.
fn loggable(value: &[u8]) -> Cow<'_, str> {
    if value.contains(&b'\n') || value.len() > MAX_LOGGED_VALUE_LEN {
        Cow::Borrowed("[user-defined script]")
    } else {
        String::from_utf8_lossy(value)
    }
}

/// Resolves tokens for every file below one staging root.
pub struct Substituter<'a> {
    root: PathBuf,
    env: &'a Environment,
    max_passes: usize,
    /// Variable file values, read at most once per run
    values: HashMap<String, Vec<u8>>,
}

impl<'a> Substituter<'a> {
    /// Substituter for the image staged at `root`.
    ///
    /// Variable files are looked up directly in `root`.
    pub fn new(root: impl Into<PathBuf>, env: &'a Environment) -> Self {
        Self {
            root: root.into(),
            env,
            max_passes: MAX_SUBSTITUTION_PASSES,
            values: HashMap::new(),
        }
    }

    /// Override the pass limit
    pub fn with_max_passes(mut self, max_passes: usize) -> Self {
        self.max_passes = max_passes;
        self
    }

    /// Resolve tokens in every file below the root, rewriting changed files.
    pub fn run(&mut self) -> Result<SubstitutionReport> {
        info!("    Replacing variables");
        let mut report = SubstitutionReport::default();

        // Collect first so backups written during the run are never visited.
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(self.root.as_path()).to_path_buf();
                let io = e
                    .into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("symlink loop"));
                Error::at_path("walk directory", &path, &io)
            })?;
            if entry.path().is_file() {
                files.push(entry.into_path());
            }
        }

        for path in files {
            let name = path.file_name().unwrap_or_default();
            if is_variable_file(name) || is_backup_file(&path) {
                debug!("        {:>80}     {}", "[Skip __VARIABLE__ replace]", path.display());
                report.skipped += 1;
                continue;
            }

            report.scanned += 1;
            if self.substitute_file(&path)? {
                report.rewritten += 1;
            }
        }
        Ok(report)
    }

    /// Resolve tokens in one file. Returns whether the file was rewritten.
    ///
    /// The whole text is resolved before anything is written, so a failure
    /// leaves the file untouched.
    pub fn substitute_file(&mut self, path: &Path) -> Result<bool> {
        let template = fs::read(path).map_err(|e| Error::at_path("read file", path, &e))?;

        let text = self.resolve_file_variables(&template, path)?;
        let text = resolve_env_variables(&text, self.env, path)?;
        if text == template {
            return Ok(false);
        }
        save_with_backup(path, &text)?;
        Ok(true)
    }

    /// Replace `__NAME__` tokens until none remain.
    pub fn resolve_file_variables(&mut self, template: &[u8], file: &Path) -> Result<Vec<u8>> {
        let mut text = template.to_vec();
        let mut tokens = distinct_matches(&VARIABLE_FILE_PATTERN, &text);
        if tokens.is_empty() {
            debug!("        {:>80}     {}", "[No __VARIABLES__ to replace]", file.display());
            return Ok(text);
        }

        let mut passes = 0;
        while !tokens.is_empty() {
            if passes == self.max_passes {
                return Err(Error::SubstitutionCycle {
                    file: file.display().to_string(),
                    passes,
                    remaining: tokens.join(", "),
                });
            }
            passes += 1;

            let mut values = HashMap::with_capacity(tokens.len());
            for token in &tokens {
                let value = self.variable_value(token, file)?;
                info!("        {:<30} <- {:<46}  :: {}", token, loggable(&value), file.display());
                values.insert(token.as_str(), value);
            }
            text = replace_tokens(&VARIABLE_FILE_PATTERN, &text, &values);
            tokens = distinct_matches(&VARIABLE_FILE_PATTERN, &text);
        }
        Ok(text)
    }

    /// Trimmed contents of `<root>/<token>`, cached for the rest of the run.
    fn variable_value(&mut self, token: &str, file: &Path) -> Result<Vec<u8>> {
        if let Some(value) = self.values.get(token) {
            return Ok(value.clone());
        }
        let variable_path = self.root.join(token);
        let value = match fs::read(&variable_path) {
            Ok(contents) => contents.trim_ascii_end().to_vec(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::MissingVariableFile {
                    variable: token.to_string(),
                    path: variable_path.display().to_string(),
                    file: file.display().to_string(),
                });
            }
            Err(e) => return Err(Error::at_path("read variable file", &variable_path, &e)),
        };
        self.values.insert(token.to_string(), value.clone());
        Ok(value)
    }
}

/// Replace `STAGE_REPLACE_WITH_NAME` tokens with `NAME` from the environment.
///
/// Single pass: substituted values are not scanned for further tokens.
pub fn resolve_env_variables(template: &[u8], env: &Environment, file: &Path) -> Result<Vec<u8>> {
    let tokens = distinct_matches(&ENV_VAR_PATTERN, template);
    if tokens.is_empty() {
        debug!(
            "        {:>80}     {}",
            "[No STAGE_REPLACE_WITH_VARs to replace]",
            file.display()
        );
        return Ok(template.to_vec());
    }

    let mut values = HashMap::new();
    for token in &tokens {
        let name = &token[ENV_VAR_PREFIX.len()..];
        let value = env.get(name).ok_or_else(|| Error::UnsetVariable {
            token: token.clone(),
            variable: name.to_string(),
            file: file.display().to_string(),
        })?;
        info!("        {:<30} <- {:<46}  :: {}", token, loggable(value.as_bytes()), file.display());
        values.insert(token.as_str(), value.as_bytes().to_vec());
    }

    Ok(replace_tokens(&ENV_VAR_PATTERN, template, &values))
}

/// Replace every match of `pattern` by its value in one left-to-right pass.
///
/// Matches without a value are kept as they are.
fn replace_tokens(pattern: &Regex, text: &[u8], values: &HashMap<&str, Vec<u8>>) -> Vec<u8> {
    pattern
        .replace_all(text, |caps: &Captures| {
            let token = &caps[0];
            std::str::from_utf8(token)
                .ok()
                .and_then(|t| values.get(t))
                .map_or_else(|| token.to_vec(), Clone::clone)
        })
        .into_owned()
}

/// Unique matches of `pattern` in order of first appearance.
///
/// Both token patterns are pure ASCII, so every match is valid UTF-8.
fn distinct_matches(pattern: &Regex, text: &[u8]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for m in pattern.find_iter(text) {
        let token = String::from_utf8_lossy(m.as_bytes());
        if !seen.iter().any(|s| *s == token) {
            seen.push(token.into_owned());
        }
    }
    seen
}

/// Removes a temporary file unless the write it belongs to completed.
struct PendingWrite {
    path: PathBuf,
    committed: bool,
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Replace the contents of `path` with `text`, keeping the original as `<path>.bak`.
///
/// The new text is written to a temporary sibling first and carries the
/// original's permissions. Only then is the original moved to the backup
/// name and the temporary moved into place, so at every point either the
/// original or the backup holds the old contents.
pub fn save_with_backup(path: &Path, text: &[u8]) -> Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".stage-tmp");
    let mut pending = PendingWrite {
        path: path.with_file_name(tmp_name),
        committed: false,
    };

    fs::write(&pending.path, text)
        .map_err(|e| Error::at_path("write text to file", &pending.path, &e))?;
    let permissions = fs::metadata(path)
        .map_err(|e| Error::at_path("read metadata of", path, &e))?
        .permissions();
    fs::set_permissions(&pending.path, permissions)
        .map_err(|e| Error::at_path("set permissions on", &pending.path, &e))?;

    let backup = backup_path(path);
    fs::rename(path, &backup).map_err(|e| {
        Error::filesystem(
            format!("Could not rename file {0} to {0}.bak", path.display()),
            &e,
        )
    })?;
    fs::rename(&pending.path, path).map_err(|e| {
        Error::filesystem(
            format!(
                "Could not move new text into {} (original kept at {})",
                path.display(),
                backup.display()
            ),
            &e,
        )
    })?;
    pending.committed = true;
    Ok(())
}

/// Resolve every token below `root` with a fresh [`Substituter`].
pub fn do_variable_replace(root: &Path, env: &Environment) -> Result<SubstitutionReport> {
    Substituter::new(root, env).run()
}
