//! # Terminal Output
//!
//! Styling for what the CLI prints to stdout. The run log never goes through
//! here; it is always plain text.
//!
//! Color is controlled by `--color=always|never|auto`. In `auto` mode color
//! is disabled by `NO_COLOR` (any value), `CLICOLOR=0` and `TERM=dumb`,
//! forced by `CLICOLOR_FORCE`, and otherwise follows what the terminal
//! supports.

use std::env;

use console::style;

use crate::config::{Environment, REQUIRED_ENV_VARS};
use crate::stager::StageReport;

/// How CLI output should look.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag against the environment.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => color_wanted(),
        };
        Self { use_color }
    }

    pub fn plain() -> Self {
        Self { use_color: false }
    }

    /// `marker` when colored output is on, `plain` otherwise.
    pub fn mark<'a>(&self, marker: &'a str, plain: &'a str) -> &'a str {
        if self.use_color {
            marker
        } else {
            plain
        }
    }

    fn bold(&self, text: &str) -> String {
        if self.use_color {
            style(text).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn dim(&self, text: &str) -> String {
        if self.use_color {
            style(text).dim().to_string()
        } else {
            text.to_string()
        }
    }
}

fn color_wanted() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
        return false;
    }
    if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
        return true;
    }
    if env::var("TERM").is_ok_and(|v| v == "dumb") {
        return false;
    }
    console::Term::stdout().features().colors_supported()
}

/// One line per required variable: `NAME = value`, or `<unset>`.
pub fn render_env(output: &OutputConfig, env: &Environment) -> String {
    let mut text = String::new();
    for (name, description) in REQUIRED_ENV_VARS {
        let value = match env.get(name) {
            Some(value) => format!("\"{}\"", value),
            None => output.mark("❌ <unset>", "<unset>").to_string(),
        };
        text.push_str(&format!("  {} = {}\n", output.bold(&format!("{:<18}", name)), value));
        text.push_str(&format!("  {:<18}   {}\n", "", output.dim(description)));
    }
    text
}

/// Variables that change what gets staged, printed before a run.
pub fn render_coordinates(env: &Environment) -> String {
    let mut text = String::new();
    for name in [
        "CEPH_VERSION",
        "DISTRO",
        "DISTRO_VERSION",
        "HOST_ARCH",
        "BASE_IMAGE",
        "IMAGES_TO_BUILD",
        "STAGING_DIR",
    ] {
        text.push_str(&format!("  {:<16} {}\n", name, env.get(name).unwrap_or_default()));
    }
    text
}

/// Summary printed after a successful run.
pub fn render_summary(output: &OutputConfig, report: &StageReport) -> String {
    let mut text = String::new();
    for image in &report.images {
        text.push_str(&format!(
            "  {} {:<12} {} copied, {} blacklisted, {} rewritten\n",
            output.mark("📦", "-"),
            image.image,
            image.copy.copied,
            image.copy.blacklisted,
            image.substitution.rewritten
        ));
    }
    text.push_str(&format!(
        "{} Staged {} files ({} rewritten, {} blacklisted entries skipped)\n",
        output.mark("✅", "[OK]"),
        report.staged_files,
        report.files_rewritten(),
        report.blacklisted()
    ));
    text.push_str(&format!("   Sources: {}\n", report.manifest.display()));
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CopyStats;
    use crate::replace::SubstitutionReport;
    use crate::stager::ImageReport;
    use std::path::PathBuf;

    #[test]
    fn test_color_flag_overrides_detection() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(OutputConfig::from_env_and_flag("ALWAYS").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
    }

    #[test]
    fn test_mark() {
        let colored = OutputConfig { use_color: true };
        assert_eq!(colored.mark("✅", "[OK]"), "✅");
        assert_eq!(OutputConfig::plain().mark("✅", "[OK]"), "[OK]");
    }

    #[test]
    fn test_render_env_marks_unset() {
        let env = Environment::new().with("CEPH_VERSION", "luminous");
        let text = render_env(&OutputConfig::plain(), &env);
        assert!(text.contains("CEPH_VERSION       = \"luminous\""));
        assert!(text.contains("DISTRO             = <unset>"));
    }

    #[test]
    fn test_render_summary() {
        let report = StageReport {
            images: vec![ImageReport {
                image: "daemon".to_string(),
                staging_path: PathBuf::from("staging/daemon"),
                copy: CopyStats {
                    copied: 4,
                    blacklisted: 1,
                },
                substitution: SubstitutionReport {
                    scanned: 4,
                    rewritten: 2,
                    skipped: 1,
                },
            }],
            staged_files: 3,
            manifest: PathBuf::from("staging/files-sources"),
        };
        let text = render_summary(&OutputConfig::plain(), &report);
        assert!(text.contains("daemon       4 copied, 1 blacklisted, 2 rewritten"));
        assert!(text.contains("[OK] Staged 3 files (2 rewritten, 1 blacklisted entries skipped)"));
        assert!(text.contains("staging/files-sources"));
    }
}
