//! # Run Log
//!
//! Every run appends to a log file that records each copy, blacklist
//! decision and substitution. The file is rotated in the simplest possible
//! way: if it is older than [`MAX_LOG_AGE`](crate::defaults::MAX_LOG_AGE) it
//! is deleted before the run starts.
//!
//! Records are formatted as `LEVEL:  message` with the level right-aligned,
//! so the indented copy and substitution tables stay readable.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::{Duration, SystemTime};

use env_logger::{Builder, Target};
use log::LevelFilter;

use crate::config::Environment;
use crate::error::{Error, Result};

/// Delete `path` if its last modification is older than `max_age`.
///
/// Returns whether the file was removed.
pub fn rotate_if_stale(path: &Path, max_age: Duration) -> Result<bool> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(false),
    };
    let modified = metadata
        .modified()
        .map_err(|e| Error::at_path("read modification time of", path, &e))?;
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age <= max_age {
        return Ok(false);
    }
    fs::remove_file(path).map_err(|e| Error::at_path("remove old log file", path, &e))?;
    Ok(true)
}

/// `debug` when `DEBUG` is set to anything but `0`, otherwise `info`.
pub fn level_from_env(env: &Environment) -> LevelFilter {
    match env.get("DEBUG") {
        Some(value) if value != "0" => LevelFilter::Debug,
        _ => LevelFilter::Info,
    }
}

/// Render one record the way the run log expects.
pub fn format_record(level: log::Level, message: &std::fmt::Arguments<'_>) -> String {
    format!("{:>5}:  {}", level, message)
}

/// Route all `log` records at or above `level` to the file at `path`.
///
/// Fails if a logger is already installed in this process.
pub fn init_file_logger(path: &Path, level: LevelFilter) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::at_path("open log file", path, &e))?;

    Builder::new()
        .filter_level(level)
        .target(Target::Pipe(Box::new(file)))
        .format(|buf, record| writeln!(buf, "{}", format_record(record.level(), record.args())))
        .try_init()
        .map_err(|e| Error::Config {
            message: format!("Could not install logger: {}", e),
            hint: None,
        })
}

/// Route warnings and errors (or `level`) to stderr, for commands without a log file.
pub fn init_stderr_logger(level: LevelFilter) {
    let _ = Builder::new()
        .filter_level(level)
        .format(|buf, record| writeln!(buf, "{}", format_record(record.level(), record.args())))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rotate_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(!rotate_if_stale(&temp.path().join("stage.log"), Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_rotate_keeps_fresh_file() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("stage.log");
        fs::write(&log, "INFO:  hello\n").unwrap();

        assert!(!rotate_if_stale(&log, Duration::from_secs(3600)).unwrap());
        assert!(log.exists());
    }

    #[test]
    fn test_rotate_removes_old_file() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("stage.log");
        fs::write(&log, "INFO:  old\n").unwrap();
        let two_days_ago = SystemTime::now() - Duration::from_secs(2 * 86_400);
        fs::File::options()
            .write(true)
            .open(&log)
            .unwrap()
            .set_modified(two_days_ago)
            .unwrap();

        assert!(rotate_if_stale(&log, crate::defaults::MAX_LOG_AGE).unwrap());
        assert!(!log.exists());
    }

    #[test]
    fn test_level_from_env() {
        assert_eq!(level_from_env(&Environment::new()), LevelFilter::Info);
        assert_eq!(
            level_from_env(&Environment::new().with("DEBUG", "0")),
            LevelFilter::Info
        );
        assert_eq!(
            level_from_env(&Environment::new().with("DEBUG", "")),
            LevelFilter::Debug
        );
        assert_eq!(
            level_from_env(&Environment::new().with("DEBUG", "1")),
            LevelFilter::Debug
        );
    }

    #[test]
    fn test_format_record_aligns_level() {
        assert_eq!(format_record(log::Level::Info, &format_args!("x")), " INFO:  x");
        assert_eq!(format_record(log::Level::Debug, &format_args!("y")), "DEBUG:  y");
    }
}
