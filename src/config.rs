//! # Staging Configuration
//!
//! Build coordinates arrive as environment variables. Rather than reading the
//! process environment all over the code base, the environment is captured
//! once into an [`Environment`] snapshot and validated into an immutable
//! [`StageConfig`]. Every component receives the config (or the snapshot) by
//! reference, which also makes the engine testable without touching the real
//! process environment.
//!
//! ## Required variables
//!
//! See [`REQUIRED_ENV_VARS`]. Validation fails on the first missing variable
//! and the error lists all of them with their descriptions.
//!
//! ## Computed variables
//!
//! [`StageConfig::from_env`] adds `BASE_IMAGE` and `GO_ARCH` to the snapshot,
//! and [`StageConfig::export_vcs_info`] adds `GIT_REPO`, `GIT_BRANCH`,
//! `GIT_COMMIT` and `GIT_CLEAN`. Templates may reference these through
//! `STAGE_REPLACE_WITH_<NAME>` tokens like any other variable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::defaults;
use crate::error::{Error, Result};
use crate::vcs::VersionControl;

/// Required environment variables and their descriptions, in display order.
pub const REQUIRED_ENV_VARS: &[(&str, &str)] = &[
    (
        "CEPH_VERSION",
        "Ceph named version part of the ceph-releases source path (e.g., luminous, mimic)",
    ),
    (
        "CEPH_POINT_RELEASE",
        "Points to specific version of Ceph (e.g -12.2.0) or empty",
    ),
    (
        "DISTRO",
        "Distro part of the ceph-releases source path (e.g., opensuse, centos)",
    ),
    (
        "DISTRO_VERSION",
        "Distro version part of the ceph-releases source path (e.g. opensuse/\"42.3\", centos/\"7\")",
    ),
    (
        "HOST_ARCH",
        "Architecture of binaries being built (e.g., amd64, arm32, arm64)",
    ),
    (
        "BASEOS_REGISTRY",
        "Registry for the container base image (e.g., _ (x86_64), arm64v8 (aarch64))",
    ),
    (
        "BASEOS_REPO",
        "Repository for the container base image (e.g., centos, opensuse)",
    ),
    (
        "BASEOS_TAG",
        "Tagged version of BASEOS_REPO container (e.g., 7, 42.3 respectively)",
    ),
    (
        "IMAGES_TO_BUILD",
        "Container images to be built (usually should be \"dockerfile daemon\")",
    ),
    (
        "STAGING_DIR",
        "Dir into which files will be staged; it is overwritten if it already exists",
    ),
    ("RELEASE", "Release string for the build"),
    (
        "DAEMON_BASE_IMAGE",
        "Tag given to the daemon-base image and used as base for the daemon image",
    ),
    ("DAEMON_IMAGE", "Tag given to the daemon image"),
];

/// Ceph architecture names that differ from their golang equivalents.
const GOLANG_ARCH_CONVERSIONS: &[(&str, &str)] = &[("x86_64", "amd64"), ("aarch64", "arm64")];

/// A snapshot of environment variables.
///
/// Lookups never consult the live process environment, so values computed
/// during startup (such as `BASE_IMAGE`) are visible to every later stage
/// without mutating global state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<String, String>,
}

impl Environment {
    /// Create an empty environment
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment.
    ///
    /// Variables whose name or value is not valid unicode are ignored.
    pub fn from_process() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Look up a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Whether a variable is set (an empty value counts as set)
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Set or replace a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Builder-style variant of [`Environment::set`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    /// Look up a variable that must be present.
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| Error::Config {
            message: format!("Expected environment variable '{}' to be set", name),
            hint: Some(required_vars_text()),
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Environment {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Render the table of required variables shown when one is missing.
pub fn required_vars_text() -> String {
    let mut text = String::from("Required environment variables:\n");
    for (name, description) in REQUIRED_ENV_VARS {
        text.push_str(&format!("    {:<18} {}\n", name, description));
    }
    text
}

/// Where the layered source trees live, relative to the working root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    /// Repository root all other paths are resolved against
    pub root: PathBuf,
    /// Generic files shared by every flavor
    pub core_dir: PathBuf,
    /// Per-release overrides (`<releases>/ALL`, `<releases>/<version>`, ...)
    pub releases_dir: PathBuf,
    /// Blacklist rule file
    pub blacklist_file: PathBuf,
}

impl SourceLayout {
    /// Layout rooted at `root` with the default directory names.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            core_dir: PathBuf::from(defaults::CORE_FILES_DIR),
            releases_dir: PathBuf::from(defaults::CEPH_RELEASES_DIR),
            blacklist_file: PathBuf::from(defaults::BLACKLIST_FILE),
        }
    }

    /// Resolve a layout-relative path against the root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if self.root.as_os_str().is_empty() || self.root == Path::new(".") {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Validated, immutable configuration for one staging run.
#[derive(Debug, Clone)]
pub struct StageConfig {
    pub ceph_version: String,
    pub distro: String,
    pub distro_version: String,
    pub host_arch: String,
    /// Images to stage, in the order given
    pub images: Vec<String>,
    pub staging_dir: PathBuf,
    pub layout: SourceLayout,
    /// Environment snapshot including computed variables
    pub env: Environment,
}

impl StageConfig {
    /// Validate the environment and build the configuration.
    ///
    /// A relative `STAGING_DIR` is resolved against the layout root.
    pub fn from_env(mut env: Environment, layout: SourceLayout) -> Result<Self> {
        for (name, _) in REQUIRED_ENV_VARS {
            env.require(name)?;
        }

        let base_image = compute_base_image(&env)?;
        env.set("BASE_IMAGE", base_image);
        let go_arch = golang_arch(env.require("HOST_ARCH")?).to_string();
        env.set("GO_ARCH", go_arch);

        let images: Vec<String> = env
            .require("IMAGES_TO_BUILD")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if images.is_empty() {
            return Err(Error::Config {
                message: "IMAGES_TO_BUILD does not name any image".to_string(),
                hint: Some("Set it to e.g. \"dockerfile daemon\"".to_string()),
            });
        }

        let staging_dir = layout.resolve(Path::new(env.require("STAGING_DIR")?));

        Ok(Self {
            ceph_version: env.require("CEPH_VERSION")?.to_string(),
            distro: env.require("DISTRO")?.to_string(),
            distro_version: env.require("DISTRO_VERSION")?.to_string(),
            host_arch: env.require("HOST_ARCH")?.to_string(),
            images,
            staging_dir,
            layout,
            env,
        })
    }

    /// Add the git coordinates of the source tree to the environment snapshot.
    pub fn export_vcs_info(&mut self, vcs: &dyn VersionControl) {
        self.env.set("GIT_REPO", vcs.repo());
        self.env.set("GIT_BRANCH", vcs.branch());
        self.env.set("GIT_COMMIT", vcs.commit());
        let clean = if vcs.tree_is_dirty() { "False" } else { "True" };
        self.env.set("GIT_CLEAN", clean);
    }

    /// Source roots from least to most specific.
    ///
    /// Later roots override earlier ones at the same relative path.
    pub fn search_order(&self) -> Vec<PathBuf> {
        let core = self.layout.resolve(&self.layout.core_dir);
        let releases = self.layout.resolve(&self.layout.releases_dir);
        let all = releases.join("ALL");
        let version = releases.join(&self.ceph_version);
        vec![
            core,
            all.clone(),
            all.join(&self.distro),
            all.join(&self.distro).join(&self.distro_version),
            version.clone(),
            version.join(&self.distro),
            version.join(&self.distro).join(&self.distro_version),
        ]
    }

    /// Path of the blacklist rule file
    pub fn blacklist_path(&self) -> PathBuf {
        self.layout.resolve(&self.layout.blacklist_file)
    }

    /// Path of the provenance manifest
    pub fn manifest_path(&self) -> PathBuf {
        self.staging_dir.join(defaults::MANIFEST_FILE)
    }
}

/// `[BASEOS_REGISTRY/]BASEOS_REPO:BASEOS_TAG`
fn compute_base_image(env: &Environment) -> Result<String> {
    let image = format!(
        "{}:{}",
        env.require("BASEOS_REPO")?,
        env.require("BASEOS_TAG")?
    );
    let registry = env.require("BASEOS_REGISTRY")?;
    if registry.is_empty() {
        Ok(image)
    } else {
        Ok(format!("{}/{}", registry, image))
    }
}

/// Convert a Ceph architecture name to its golang equivalent.
pub fn golang_arch(arch: &str) -> &str {
    GOLANG_ARCH_CONVERSIONS
        .iter()
        .find(|(ceph, _)| *ceph == arch)
        .map(|(_, go)| *go)
        .unwrap_or(arch)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::vcs::StaticVersionControl;

    /// An environment with every required variable set.
    pub(crate) fn complete_env() -> Environment {
        Environment::new()
            .with("CEPH_VERSION", "luminous")
            .with("CEPH_POINT_RELEASE", "")
            .with("DISTRO", "opensuse")
            .with("DISTRO_VERSION", "42.3")
            .with("HOST_ARCH", "x86_64")
            .with("BASEOS_REGISTRY", "")
            .with("BASEOS_REPO", "opensuse")
            .with("BASEOS_TAG", "42.3")
            .with("IMAGES_TO_BUILD", "dockerfile daemon")
            .with("STAGING_DIR", "staging")
            .with("RELEASE", "test-release")
            .with("DAEMON_BASE_IMAGE", "daemon-base:test")
            .with("DAEMON_IMAGE", "daemon:test")
    }

    #[test]
    fn test_from_env_complete() {
        let config = StageConfig::from_env(complete_env(), SourceLayout::new("/repo")).unwrap();
        assert_eq!(config.ceph_version, "luminous");
        assert_eq!(config.images, vec!["dockerfile", "daemon"]);
        assert_eq!(config.staging_dir, PathBuf::from("/repo/staging"));
    }

    #[test]
    fn test_from_env_missing_variable_lists_all_required() {
        let mut env = complete_env();
        env.vars.remove("DISTRO");
        let err = StageConfig::from_env(env, SourceLayout::default()).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'DISTRO'"));
        assert!(message.contains("DAEMON_IMAGE"));
        assert!(message.contains("Required environment variables"));
    }

    #[test]
    fn test_empty_value_counts_as_set() {
        let config = StageConfig::from_env(complete_env(), SourceLayout::default()).unwrap();
        assert_eq!(config.env.get("CEPH_POINT_RELEASE"), Some(""));
    }

    #[test]
    fn test_from_env_rejects_empty_image_list() {
        let env = complete_env().with("IMAGES_TO_BUILD", "   ");
        let err = StageConfig::from_env(env, SourceLayout::default()).unwrap_err();
        assert!(err.to_string().contains("IMAGES_TO_BUILD"));
    }

    #[test]
    fn test_base_image_without_registry() {
        let config = StageConfig::from_env(complete_env(), SourceLayout::default()).unwrap();
        assert_eq!(config.env.get("BASE_IMAGE"), Some("opensuse:42.3"));
    }

    #[test]
    fn test_base_image_with_registry() {
        let env = complete_env().with("BASEOS_REGISTRY", "arm64v8");
        let config = StageConfig::from_env(env, SourceLayout::default()).unwrap();
        assert_eq!(config.env.get("BASE_IMAGE"), Some("arm64v8/opensuse:42.3"));
    }

    #[test]
    fn test_golang_arch_conversions() {
        assert_eq!(golang_arch("x86_64"), "amd64");
        assert_eq!(golang_arch("aarch64"), "arm64");
        assert_eq!(golang_arch("ppc64le"), "ppc64le");
    }

    #[test]
    fn test_go_arch_exported() {
        let config = StageConfig::from_env(complete_env(), SourceLayout::default()).unwrap();
        assert_eq!(config.env.get("GO_ARCH"), Some("amd64"));
    }

    #[test]
    fn test_search_order_least_to_most_specific() {
        let config = StageConfig::from_env(complete_env(), SourceLayout::default()).unwrap();
        let order: Vec<String> = config
            .search_order()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(
            order,
            vec![
                "src",
                "ceph-releases/ALL",
                "ceph-releases/ALL/opensuse",
                "ceph-releases/ALL/opensuse/42.3",
                "ceph-releases/luminous",
                "ceph-releases/luminous/opensuse",
                "ceph-releases/luminous/opensuse/42.3",
            ]
        );
    }

    #[test]
    fn test_export_vcs_info() {
        let mut config = StageConfig::from_env(complete_env(), SourceLayout::default()).unwrap();
        let vcs = StaticVersionControl::new("git@example.com:ceph/ceph-container", "main", "abc123")
            .with_tree_dirty(true);
        config.export_vcs_info(&vcs);
        assert_eq!(
            config.env.get("GIT_REPO"),
            Some("git@example.com:ceph/ceph-container")
        );
        assert_eq!(config.env.get("GIT_BRANCH"), Some("main"));
        assert_eq!(config.env.get("GIT_COMMIT"), Some("abc123"));
        assert_eq!(config.env.get("GIT_CLEAN"), Some("False"));
    }

    #[test]
    fn test_layout_resolve_relative_root() {
        let layout = SourceLayout::default();
        assert_eq!(layout.resolve(Path::new("src")), PathBuf::from("src"));
        let layout = SourceLayout::new("/repo");
        assert_eq!(layout.resolve(Path::new("src")), PathBuf::from("/repo/src"));
    }

    #[test]
    fn test_environment_from_iter() {
        let env: Environment = vec![("A", "1"), ("B", "2")].into_iter().collect();
        assert_eq!(env.get("A"), Some("1"));
        assert!(env.contains("B"));
        assert!(!env.contains("C"));
    }
}
