//! # Blacklist Filter
//!
//! Some staged files only make sense for some flavors. The blacklist rule
//! file excludes paths from collection depending on the build environment.
//!
//! ## Rule format
//!
//! ```text
//! # comment
//! <path> <VAR1>=<v1>,<v2> [<VAR2>=<v3> ...]
//! ```
//!
//! A rule is *active* when at least one of its conditions holds, and a
//! condition holds when the named environment variable equals one of the
//! listed values. Active rules exclude their path; if the path is a
//! directory, everything below it is excluded too.
//!
//! Rule paths are relative to the repository root, the same way source
//! roots are. They are normalized (see [`crate::path::normalize`]) so a
//! directory matches with or without a trailing separator.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::config::{Environment, SourceLayout};
use crate::error::{Error, Result};
use crate::path::{normalize, with_trailing_separator};

/// `VAR=v1,v2`: holds when `VAR` is one of the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub variable: String,
    pub values: Vec<String>,
}

impl Condition {
    /// Parse a raw `VAR=v1,v2` condition.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let mut parts = raw.split('=');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(variable), Some(values), None) if !variable.is_empty() => Ok(Self {
                variable: variable.to_string(),
                values: values.split(',').map(str::to_string).collect(),
            }),
            _ => Err(format!("condition is not properly formatted: {}", raw)),
        }
    }

    /// Whether the environment satisfies this condition.
    ///
    /// Conditions may only reference variables that are set.
    pub fn matches(&self, env: &Environment) -> Result<bool> {
        let value = env.get(&self.variable).ok_or_else(|| Error::Config {
            message: format!(
                "Blacklist condition references unset environment variable '{}'",
                self.variable
            ),
            hint: None,
        })?;
        Ok(self.values.iter().any(|v| v == value))
    }
}

/// One line of the rule file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistRule {
    pub path: PathBuf,
    pub conditions: Vec<Condition>,
    /// 1-based line number in the rule file
    pub line: usize,
}

impl BlacklistRule {
    /// A rule is active when any of its conditions holds.
    pub fn is_active(&self, env: &Environment) -> Result<bool> {
        for condition in &self.conditions {
            if condition.matches(env)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Parse the text of a rule file.
///
/// Blank lines and `#` comments are skipped. Any other line must have a path
/// followed by at least one well-formed condition.
pub fn parse_rules(text: &str) -> Result<Vec<BlacklistRule>> {
    let mut rules = Vec::new();
    for (index, raw_line) in text.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let mut fields = line.split_whitespace();
        let path = fields.next().unwrap_or_default();
        let conditions = fields
            .map(Condition::parse)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|message| Error::Blacklist {
                line: index + 1,
                message,
            })?;
        if conditions.is_empty() {
            return Err(Error::Blacklist {
                line: index + 1,
                message: format!("line improperly formatted, expected '<path> <VAR>=<values>': {}", line),
            });
        }

        rules.push(BlacklistRule {
            path: PathBuf::from(path),
            conditions,
            line: index + 1,
        });
    }
    Ok(rules)
}

/// The set of paths excluded for the current environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    files: BTreeSet<PathBuf>,
    dirs: BTreeSet<PathBuf>,
}

impl Blacklist {
    /// A blacklist that excludes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read and evaluate the rule file at `path`.
    ///
    /// A missing rule file means nothing is blacklisted.
    pub fn load(path: &Path, env: &Environment, layout: &SourceLayout) -> Result<Self> {
        if !path.is_file() {
            info!("No blacklist file at {}; nothing is blacklisted", path.display());
            return Ok(Self::empty());
        }
        info!("Parsing blacklist file: {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| Error::at_path("read blacklist file", path, &e))?;
        let rules = parse_rules(&text)?;
        Self::from_rules(&rules, env, layout)
    }

    /// Evaluate parsed rules against the environment.
    ///
    /// Rule paths are resolved against the layout root and classified as file
    /// or directory by looking at the disk. An active rule whose path does not
    /// exist excludes nothing and is only reported.
    pub fn from_rules(rules: &[BlacklistRule], env: &Environment, layout: &SourceLayout) -> Result<Self> {
        let mut blacklist = Self::empty();
        for rule in rules {
            if !rule.is_active(env)? {
                debug!("    Blacklist line {} does not match environment", rule.line);
                continue;
            }
            info!(
                "    Blacklist line {} matches environment: {}",
                rule.line,
                rule.path.display()
            );
            let resolved = layout.resolve(&rule.path);
            if resolved.is_dir() {
                blacklist.dirs.insert(normalize(&resolved));
            } else if resolved.is_file() {
                blacklist.files.insert(normalize(&resolved));
            } else {
                warn!(
                    "    Blacklist path is not a file or directory: {}",
                    resolved.display()
                );
            }
        }
        Ok(blacklist)
    }

    /// Exclude a file path regardless of the disk (for programmatic use).
    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        self.files.insert(normalize(path.as_ref()));
    }

    /// Exclude a directory path regardless of the disk (for programmatic use).
    pub fn add_dir(&mut self, path: impl AsRef<Path>) {
        self.dirs.insert(normalize(path.as_ref()));
    }

    /// Whether `dir` itself is a blacklisted directory
    pub fn is_dir_blacklisted(&self, dir: &Path) -> bool {
        self.dirs.contains(&normalize(dir))
    }

    /// Whether `file` is blacklisted by an exact file rule
    pub fn is_file_blacklisted(&self, file: &Path) -> bool {
        self.files.contains(&normalize(file))
    }

    /// Whether `path` is excluded, either directly or by a blacklisted ancestor.
    pub fn excludes(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.files.contains(&path) || self.dirs.iter().any(|dir| path.starts_with(dir))
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len() + self.dirs.len()
    }

    /// Excluded paths for display; directories end with a separator.
    pub fn entries(&self) -> Vec<String> {
        let mut entries: Vec<String> = self
            .dirs
            .iter()
            .map(|d| with_trailing_separator(d))
            .chain(self.files.iter().map(|f| f.display().to_string()))
            .collect();
        entries.sort();
        entries
    }
}
