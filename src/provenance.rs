//! # Provenance Recorder
//!
//! Records, for every staged file, which source file it came from and
//! whether that source had uncommitted changes when it was copied. The
//! result is written once per run as the `files-sources` manifest at the
//! staging root. Nothing reads the manifest back; it exists for humans
//! auditing a build context.
//!
//! Entries keep the order in which destinations were first staged. When a
//! more specific source root overrides a file, the existing entry is updated
//! in place, so the manifest shows the winning source.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::path::display_relative;

const SOURCE_KEY: &str =
    "  <source file> (preceding * indicates file is modified in git without a commit)";

/// One staged destination and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    pub destination: PathBuf,
    pub source: PathBuf,
    /// The source had uncommitted version-control changes at copy time
    pub dirty: bool,
}

impl StagedFile {
    /// `*` for dirty sources, a blank otherwise
    pub fn marker(&self) -> char {
        if self.dirty {
            '*'
        } else {
            ' '
        }
    }
}

/// Repository coordinates printed in the manifest header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    pub repo: String,
    pub branch: String,
    pub commit: String,
}

/// Accumulates [`StagedFile`] records for one staging run.
#[derive(Debug, Clone, Default)]
pub struct Provenance {
    entries: Vec<StagedFile>,
    index: HashMap<PathBuf, usize>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `destination` was staged from `source`.
    pub fn record(&mut self, destination: impl Into<PathBuf>, source: impl Into<PathBuf>, dirty: bool) {
        let staged = StagedFile {
            destination: destination.into(),
            source: source.into(),
            dirty,
        };
        match self.index.get(&staged.destination) {
            Some(&position) => self.entries[position] = staged,
            None => {
                self.index.insert(staged.destination.clone(), self.entries.len());
                self.entries.push(staged);
            }
        }
    }

    /// The record for a destination, if it was staged
    pub fn get(&self, destination: &Path) -> Option<&StagedFile> {
        self.index.get(destination).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[StagedFile] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the manifest table, stripping `strip_prefix` from destinations.
    pub fn render(&self, info: &SourceInfo, strip_prefix: &Path) -> String {
        let separator = format!("{}\n", "-".repeat(85 + SOURCE_KEY.len()));
        let mut text = separator.clone();
        text.push_str(&format!(
            "Source version info:  repo [{}] - branch [{}] - commit hash [{}]\n\n",
            info.repo, info.branch, info.commit
        ));
        text.push_str(&format!("{:<80}  <- {}\n", "<staged file>", SOURCE_KEY));
        text.push_str(&separator);
        for staged in &self.entries {
            text.push_str(&format!(
                "{:<80}  <- {} {}\n",
                display_relative(&staged.destination, strip_prefix),
                staged.marker(),
                staged.source.display()
            ));
        }
        text
    }

    /// Write the manifest to `path`, overwriting any existing file.
    pub fn save(&self, path: &Path, info: &SourceInfo, strip_prefix: &Path) -> Result<()> {
        fs::write(path, self.render(info, strip_prefix))
            .map_err(|e| Error::at_path("write text to file", path, &e))
    }
}
