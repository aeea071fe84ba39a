//! # Ceph Container Staging Library
//!
//! This library assembles per-image build contexts for Ceph container images.
//! Sources are layered from generic to release-specific directories, filtered
//! by an environment-dependent blacklist, and then rendered by substituting
//! file variables and environment variables in place. It is designed to be
//! used by the `ceph-stage` command-line tool, which is a thin wrapper around
//! [`stager::execute`].
//!
//! ## Quick Example
//!
//! ```
//! use ceph_stage::blacklist::parse_rules;
//! use ceph_stage::config::Environment;
//! use ceph_stage::replace::resolve_env_variables;
//! use std::path::Path;
//!
//! let env = Environment::new()
//!     .with("CEPH_VERSION", "luminous")
//!     .with("BASE_IMAGE", "opensuse:42.3");
//!
//! let rules = parse_rules("src/daemon/osd_scenarios CEPH_VERSION=jewel,luminous\n").unwrap();
//! assert!(rules[0].is_active(&env).unwrap());
//!
//! let text = resolve_env_variables(
//!     b"FROM STAGE_REPLACE_WITH_BASE_IMAGE\n",
//!     &env,
//!     Path::new("Dockerfile"),
//! )
//! .unwrap();
//! assert_eq!(text, b"FROM opensuse:42.3\n");
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: An environment snapshot validated once into
//!   an immutable `StageConfig`, including computed variables.
//! - **Blacklist (`blacklist`)**: Rules that exclude paths for some flavors.
//! - **Collection (`collector`)**: Blacklist-aware copying that preserves file
//!   modes and timestamps and records provenance.
//! - **Substitution (`replace`)**: `__VAR__` file variables resolved to a
//!   fixed point, then `STAGE_REPLACE_WITH_<NAME>` tokens in a single pass.
//! - **Provenance (`provenance`)**: The `files-sources` manifest.
//! - **Version control (`vcs`, `git`)**: Repo coordinates and dirty checks,
//!   behind a trait so tests never need a real repository.
//!
//! ## Execution Flow
//!
//! 1.  **Reset**: Remove and recreate the staging directory.
//! 2.  **Collect**: For each image, copy every source root in search order.
//! 3.  **Substitute**: Resolve variables inside each image's staging tree.
//! 4.  **Record**: Write the provenance manifest.

pub mod blacklist;
pub mod collector;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod logging;
pub mod output;
pub mod path;
pub mod provenance;
pub mod replace;
pub mod stager;
pub mod vcs;

#[cfg(test)]
mod staging_proptest;
