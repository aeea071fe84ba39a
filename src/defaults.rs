//! Default values for ceph-stage.
//!
//! The source tree layout is part of the build contract: paths are computed
//! from these names, not configured per flavor. The CLI can override them,
//! mostly for tests.

use std::time::Duration;

/// Generic files shared by every flavor
pub const CORE_FILES_DIR: &str = "src";

/// Per-release, per-distro overrides
pub const CEPH_RELEASES_DIR: &str = "ceph-releases";

/// Environment-conditional exclusion rules
pub const BLACKLIST_FILE: &str = "flavor-blacklist.txt";

/// Log file, relative to the working directory
pub const LOG_FILE: &str = "stage.log";

/// Provenance manifest, relative to the staging directory
pub const MANIFEST_FILE: &str = "files-sources";

/// Dotenv file looked up in the repository root when `--env-file` is not given
pub const ENV_FILE: &str = ".env";

/// A log file older than this is deleted before a run appends to it.
pub const MAX_LOG_AGE: Duration = Duration::from_secs(24 * 60 * 60);
