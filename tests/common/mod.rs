//! Shared test utilities for CLI end-to-end tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_file("src/daemon/entrypoint.sh", "#!/bin/sh\n");
//!     fixture.stage().assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// Variables every staging run needs, matching a small opensuse/luminous build.
pub const BUILD_ENV: &[(&str, &str)] = &[
    ("CEPH_VERSION", "luminous"),
    ("CEPH_POINT_RELEASE", ""),
    ("DISTRO", "opensuse"),
    ("DISTRO_VERSION", "42.3"),
    ("HOST_ARCH", "x86_64"),
    ("BASEOS_REGISTRY", ""),
    ("BASEOS_REPO", "opensuse"),
    ("BASEOS_TAG", "42.3"),
    ("IMAGES_TO_BUILD", "dockerfile daemon"),
    ("STAGING_DIR", "staging"),
    ("RELEASE", "test"),
    ("DAEMON_BASE_IMAGE", "ceph/daemon-base:test"),
    ("DAEMON_IMAGE", "ceph/daemon:test"),
];

/// Variables inherited from the developer's shell that would change results.
const SCRUBBED_ENV: &[&str] = &["DEBUG", "LOG_FILE", "NO_COLOR", "CLICOLOR_FORCE"];

/// A temporary source tree plus the environment a run will see.
///
/// Required variables never come from the test runner's own environment:
/// every command starts from [`BUILD_ENV`] plus the overrides applied with
/// [`TestFixture::with_env`] and [`TestFixture::without_env`].
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    env: BTreeMap<String, Option<String>>,
}

impl TestFixture {
    /// Create a fixture with an empty source tree and a complete environment.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            env: BUILD_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), Some(v.to_string())))
                .collect(),
        }
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Set (or override) an environment variable for every command.
    pub fn with_env(mut self, name: &str, value: &str) -> Self {
        self.env.insert(name.to_string(), Some(value.to_string()));
        self
    }

    /// Make sure an environment variable is unset for every command.
    #[allow(dead_code)]
    pub fn without_env(mut self, name: &str) -> Self {
        self.env.insert(name.to_string(), None);
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a file below the fixture root.
    #[allow(dead_code)]
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
    }

    /// Create a command running in this fixture's directory with its environment.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ceph-stage");
        cmd.current_dir(self.path());
        for name in SCRUBBED_ENV {
            cmd.env_remove(name);
        }
        for (name, value) in &self.env {
            match value {
                Some(value) => cmd.env(name, value),
                None => cmd.env_remove(name),
            };
        }
        cmd
    }

    /// `ceph-stage stage` without git and without color.
    #[allow(dead_code)]
    pub fn stage(&self) -> assert_cmd::Command {
        let mut cmd = self.command();
        cmd.arg("--color").arg("never").arg("stage").arg("--no-vcs");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_file() {
        let fixture = TestFixture::new().with_file("src/daemon/entrypoint.sh", "hello");
        assert_eq!(fixture.read("src/daemon/entrypoint.sh"), "hello");
    }

    #[test]
    fn test_fixture_env_overrides() {
        let fixture = TestFixture::new()
            .with_env("IMAGES_TO_BUILD", "daemon")
            .without_env("RELEASE");
        assert_eq!(fixture.env["IMAGES_TO_BUILD"].as_deref(), Some("daemon"));
        assert_eq!(fixture.env["RELEASE"], None);
    }
}
