//! Path manipulation utilities for ceph-stage

use std::path::{Component, Path, PathBuf};

/// Lexically normalize a path.
///
/// Removes `.` components and trailing separators so that `./src/daemon/`,
/// `src/daemon/.` and `src/daemon` compare equal. `..` components are kept
/// as-is; the filesystem is never consulted.
pub fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Render a directory path with exactly one trailing separator.
pub fn with_trailing_separator(path: &Path) -> String {
    let mut rendered = normalize(path).display().to_string();
    if !rendered.ends_with(std::path::MAIN_SEPARATOR) {
        rendered.push(std::path::MAIN_SEPARATOR);
    }
    rendered
}

/// Strip `prefix` from the front of `path` for display, if present.
pub fn display_relative(path: &Path, prefix: &Path) -> String {
    path.strip_prefix(prefix)
        .unwrap_or(path)
        .display()
        .to_string()
}
