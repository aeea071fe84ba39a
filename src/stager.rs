//! # Layered Stager
//!
//! Builds one staging subdirectory per image by layering source roots from
//! least to most specific (see [`StageConfig::search_order`]). For every
//! root that exists:
//!
//! 1. the root's direct files are copied into `<staging>/<image>/`, then
//! 2. the root's `<image>/` subtree is mirrored into the same directory.
//!
//! Copies always overwrite, so a more specific root wins over a less specific
//! one at the same relative path. There is no merging of file contents.
//!
//! A full run ([`Stager::run`]) wipes the staging directory first, stages
//! every image, resolves variables per image and finally writes the
//! provenance manifest. Runs are not incremental and must not overlap.

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::blacklist::Blacklist;
use crate::collector::{list_files, mkdir_if_dne, Collector, CopyStats};
use crate::config::StageConfig;
use crate::error::{Error, Result};
use crate::provenance::{Provenance, SourceInfo};
use crate::replace::{Substituter, SubstitutionReport};
use crate::vcs::VersionControl;

/// Outcome for one image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReport {
    pub image: String,
    pub staging_path: PathBuf,
    pub copy: CopyStats,
    pub substitution: SubstitutionReport,
}

/// Outcome of a full staging run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub images: Vec<ImageReport>,
    /// Distinct staged destinations across all images
    pub staged_files: usize,
    pub manifest: PathBuf,
}

impl StageReport {
    pub fn files_copied(&self) -> usize {
        self.images.iter().map(|i| i.copy.copied).sum()
    }

    pub fn blacklisted(&self) -> usize {
        self.images.iter().map(|i| i.copy.blacklisted).sum()
    }

    pub fn files_rewritten(&self) -> usize {
        self.images.iter().map(|i| i.substitution.rewritten).sum()
    }
}

/// Stages images described by a [`StageConfig`].
pub struct Stager<'a> {
    config: &'a StageConfig,
    blacklist: &'a Blacklist,
    vcs: &'a dyn VersionControl,
}

impl<'a> Stager<'a> {
    pub fn new(config: &'a StageConfig, blacklist: &'a Blacklist, vcs: &'a dyn VersionControl) -> Self {
        Self {
            config,
            blacklist,
            vcs,
        }
    }

    /// Delete and recreate the staging directory.
    ///
    /// Refuses to delete a directory that contains the source tree.
    pub fn reset_staging_dir(&self) -> Result<()> {
        let staging = &self.config.staging_dir;
        let fail = |e: std::io::Error| {
            Error::filesystem(
                format!("Could not delete and recreate staging dir: {}", staging.display()),
                &e,
            )
        };

        if staging.is_dir() {
            let staging_abs = staging.canonicalize().map_err(fail)?;
            let root_abs = self.config.layout.root.canonicalize().map_err(fail)?;
            if root_abs.starts_with(&staging_abs) {
                return Err(Error::Config {
                    message: format!(
                        "STAGING_DIR {} contains the source tree at {}",
                        staging.display(),
                        root_abs.display()
                    ),
                    hint: Some("Point STAGING_DIR at a dedicated directory such as 'staging/'".to_string()),
                });
            }
            fs::remove_dir_all(staging).map_err(fail)?;
        }
        mkdir_if_dne(staging)
    }

    /// Layer every existing source root into `<staging>/<image>/`.
    ///
    /// Does not resolve variables; see [`Stager::stage_image`].
    pub fn collect_image(&self, image: &str, provenance: &mut Provenance) -> Result<CopyStats> {
        let collector = Collector::new(self.blacklist, self.vcs);
        let staging_path = self.config.staging_dir.join(image);
        let mut stats = CopyStats::default();

        for src_path in self.config.search_order() {
            if !src_path.is_dir() {
                debug!("    {} does not exist, skipping", src_path.display());
                continue;
            }
            mkdir_if_dne(&staging_path)?;
            let files = list_files(&src_path)?;
            stats += collector.copy_files(&files, &src_path, &staging_path, provenance)?;
            stats += collector.recursive_copy_dir(&src_path.join(image), &staging_path, provenance)?;
        }
        Ok(stats)
    }

    /// Stage one image and resolve the variables in its files.
    pub fn stage_image(&self, image: &str, provenance: &mut Provenance) -> Result<ImageReport> {
        info!("");
        info!("{}/", image);
        info!("    Copying files (preceding * indicates file has been modified)");
        let copy = self.collect_image(image, provenance)?;

        let staging_path = self.config.staging_dir.join(image);
        let substitution = if staging_path.is_dir() {
            Substituter::new(&staging_path, &self.config.env).run()?
        } else {
            info!("    No source root provided files for {}", image);
            SubstitutionReport::default()
        };

        Ok(ImageReport {
            image: image.to_string(),
            staging_path,
            copy,
            substitution,
        })
    }

    /// Run the whole pipeline: reset, stage every image, write the manifest.
    pub fn run(&self) -> Result<StageReport> {
        debug!("Path search order: {:?}", self.config.search_order());
        self.reset_staging_dir()?;

        let mut provenance = Provenance::new();
        let mut images = Vec::with_capacity(self.config.images.len());
        for image in &self.config.images {
            images.push(self.stage_image(image, &mut provenance)?);
        }

        let manifest = self.config.manifest_path();
        let info = SourceInfo {
            repo: self.vcs.repo(),
            branch: self.vcs.branch(),
            commit: self.vcs.commit(),
        };
        provenance.save(&manifest, &info, &self.config.staging_dir)?;
        info!("");
        info!("Staged file sources written to {}", manifest.display());

        Ok(StageReport {
            images,
            staged_files: provenance.len(),
            manifest,
        })
    }
}

/// Load the blacklist for `config` and run a full staging pass.
pub fn execute(config: &StageConfig, vcs: &dyn VersionControl) -> Result<StageReport> {
    let blacklist = Blacklist::load(&config.blacklist_path(), &config.env, &config.layout)?;
    debug!("Blacklist: {:?}", blacklist.entries());
    Stager::new(config, &blacklist, vcs).run()
}
