//! # File Collector
//!
//! Copies files out of a source root into a staging directory, honoring the
//! [`Blacklist`] and recording every copy in a [`Provenance`] accumulator.
//!
//! Two entry points mirror the two ways the stager pulls from a root:
//!
//! - [`Collector::copy_files`] copies the direct files of one directory
//!   (see [`list_files`]).
//! - [`Collector::recursive_copy_dir`] mirrors a whole tree. A blacklisted
//!   directory is pruned: neither it nor anything below it is visited.
//!
//! Copies overwrite silently and preserve permissions and timestamps. Any
//! I/O failure aborts the run with the OS error attached.

use std::cell::Cell;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use log::info;
use walkdir::WalkDir;

use crate::blacklist::Blacklist;
use crate::error::{Error, Result};
use crate::provenance::Provenance;
use crate::vcs::VersionControl;

/// Counts for one copy operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    /// Files copied into the staging directory
    pub copied: usize,
    /// Files and directories skipped because of the blacklist
    pub blacklisted: usize,
}

impl std::ops::AddAssign for CopyStats {
    fn add_assign(&mut self, other: Self) {
        self.copied += other.copied;
        self.blacklisted += other.blacklisted;
    }
}

/// List the files (not directories) directly inside `dir`, sorted by name.
///
/// Names are returned as the OS reports them, whether or not they are UTF-8.
pub fn list_files(dir: &Path) -> Result<Vec<OsString>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::at_path("list directory", dir, &e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::at_path("list directory", dir, &e))?;
        if entry.path().is_file() {
            files.push(entry.file_name());
        }
    }
    files.sort();
    Ok(files)
}

/// Create `path` (and missing parents) with mode 0755 unless it already exists.
pub fn mkdir_if_dne(path: &Path) -> Result<()> {
    if path.is_dir() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder
        .create(path)
        .map_err(|e| Error::at_path("create directory", path, &e))
}

/// Copy one file, keeping its permissions and timestamps.
pub fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    let fail = |e: std::io::Error| {
        Error::filesystem(
            format!("Could not copy file {} to {}", src.display(), dst.display()),
            &e,
        )
    };

    fs::copy(src, dst).map_err(fail)?;

    let metadata = fs::metadata(src).map_err(fail)?;
    let times = fs::FileTimes::new()
        .set_accessed(metadata.accessed().map_err(fail)?)
        .set_modified(metadata.modified().map_err(fail)?);
    fs::File::open(dst)
        .and_then(|file| file.set_times(times))
        .map_err(fail)?;
    Ok(())
}

/// Copies files into staging while consulting the blacklist and version control.
pub struct Collector<'a> {
    blacklist: &'a Blacklist,
    vcs: &'a dyn VersionControl,
}

impl<'a> Collector<'a> {
    pub fn new(blacklist: &'a Blacklist, vcs: &'a dyn VersionControl) -> Self {
        Self { blacklist, vcs }
    }

    /// Copy `filenames` from `src_dir` into `dst_dir`.
    ///
    /// If `src_dir` is blacklisted nothing is copied and `dst_dir` is not
    /// created. Blacklisted files are skipped individually.
    pub fn copy_files(
        &self,
        filenames: &[OsString],
        src_dir: &Path,
        dst_dir: &Path,
        provenance: &mut Provenance,
    ) -> Result<CopyStats> {
        let mut stats = CopyStats::default();
        if self.blacklist.excludes(src_dir) {
            info!("        {:<80}     [DIR BLACKLISTED]", src_dir.display());
            stats.blacklisted += 1;
            return Ok(stats);
        }

        mkdir_if_dne(dst_dir)?;
        for filename in filenames {
            let src = src_dir.join(filename);
            if self.blacklist.excludes(&src) {
                info!("        {:<80}     [FILE BLACKLISTED]", src.display());
                stats.blacklisted += 1;
                continue;
            }

            let dst = dst_dir.join(filename);
            let dirty = self.vcs.is_dirty(&src);
            let marker = if dirty { '*' } else { ' ' };
            info!(
                "      {:<82}  -> {}",
                format!("{} {}", marker, src.display()),
                dst_dir.display()
            );
            copy_file(&src, &dst)?;
            provenance.record(dst, src, dirty);
            stats.copied += 1;
        }
        Ok(stats)
    }

    /// Mirror everything under `src_root` into `dst_root`.
    ///
    /// A missing `src_root` is not an error; there is simply nothing to copy.
    pub fn recursive_copy_dir(
        &self,
        src_root: &Path,
        dst_root: &Path,
        provenance: &mut Provenance,
    ) -> Result<CopyStats> {
        let mut stats = CopyStats::default();
        if !src_root.is_dir() {
            return Ok(stats);
        }

        let pruned = Cell::new(0);
        let walker = WalkDir::new(src_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let blacklisted =
                    entry.file_type().is_dir() && self.blacklist.is_dir_blacklisted(entry.path());
                if blacklisted {
                    info!("        {:<80}     [DIR BLACKLISTED]", entry.path().display());
                    pruned.set(pruned.get() + 1);
                }
                !blacklisted
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(src_root).to_path_buf();
                match e.into_io_error() {
                    Some(io) => Error::at_path("walk directory", &path, &io),
                    None => Error::Filesystem {
                        message: format!("Could not walk directory {}: symlink loop", path.display()),
                    },
                }
            })?;
            if !entry.file_type().is_dir() {
                continue;
            }

            let offset = entry.path().strip_prefix(src_root).unwrap_or(Path::new(""));
            let files = list_files(entry.path())?;
            stats += self.copy_files(&files, entry.path(), &dst_root.join(offset), provenance)?;
        }

        stats.blacklisted += pruned.get();
        Ok(stats)
    }
}
