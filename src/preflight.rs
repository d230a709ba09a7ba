//! Pre-flight checks for the runtime environment
//!
//! The pipeline assumes storage access and the ability to launch the
//! installer were granted before a run starts. This module checks both:
//! - the OBB root and the cache root are writable (or creatable)
//! - the installer program can be found
//!
//! The checks only report; they never request permissions.

use crate::config::SideloadConfig;
use crate::error::{Result, SideloadError};
use nix::unistd::{AccessFlags, access};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// Result of environment verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightResult {
    /// Staging roots that cannot be written, with the directory that was checked
    pub unwritable: Vec<(PathBuf, PathBuf)>,
    /// Installer program, if it could not be found
    pub missing_program: Option<String>,
}

impl PreflightResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.unwritable.is_empty() && self.missing_program.is_none()
    }

    /// One line per problem, for error messages
    pub fn problems(&self) -> Vec<String> {
        let mut problems: Vec<String> = self
            .unwritable
            .iter()
            .map(|(root, checked)| {
                format!(
                    "{} is not writable (checked {})",
                    root.display(),
                    checked.display()
                )
            })
            .collect();
        if let Some(program) = &self.missing_program {
            problems.push(format!("installer program '{}' was not found", program));
        }
        problems
    }

    /// Convert into the crate result; all problems are joined into one message.
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(SideloadError::preflight(self.problems().join("; ")))
        }
    }
}

/// Nearest existing directory at or above `path`.
fn nearest_existing(path: &Path) -> Option<&Path> {
    path.ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
}

/// Check whether `path` (or the directory it would be created in) is writable
fn is_writable(path: &Path) -> (bool, PathBuf) {
    match nearest_existing(path) {
        Some(dir) => (access(dir, AccessFlags::W_OK).is_ok(), dir.to_path_buf()),
        None => (false, path.to_path_buf()),
    }
}

/// Check if a program is available (explicit path or in PATH)
fn program_exists(name: &str) -> bool {
    if name.contains('/') {
        return access(Path::new(name), AccessFlags::X_OK).is_ok();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Perform all preflight checks for `config`
pub fn verify_environment(config: &SideloadConfig) -> PreflightResult {
    let mut unwritable = Vec::new();
    for root in [&config.obb_root, &config.cache_root] {
        let (writable, checked) = is_writable(root);
        debug!(
            "Write access for {} (via {}): {}",
            root.display(),
            checked.display(),
            writable
        );
        if !writable {
            unwritable.push((root.clone(), checked));
        }
    }

    let missing_program = if program_exists(&config.installer.program) {
        None
    } else {
        warn!("Installer program not found: {}", config.installer.program);
        Some(config.installer.program.clone())
    };

    let result = PreflightResult {
        unwritable,
        missing_program,
    };
    if result.is_ok() {
        info!("Preflight checks passed");
    }
    result
}

/// Print a readable report to stderr
pub fn print_report(result: &PreflightResult) {
    if result.is_ok() {
        eprintln!("✓ Storage is writable and the installer is available");
        return;
    }

    eprintln!();
    eprintln!("✗ Pre-flight check failed");
    eprintln!();
    for problem in result.problems() {
        eprintln!("   • {}", problem);
    }
    eprintln!();
    eprintln!("   Grant storage access to this terminal and make sure the installer");
    eprintln!("   command from the configuration is on PATH, then try again.");
    eprintln!();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &Path, program: &str) -> SideloadConfig {
        let mut config = SideloadConfig {
            obb_root: dir.join("Android/obb"),
            cache_root: dir.join("cache"),
            ..SideloadConfig::default()
        };
        config.installer.program = program.to_string();
        config
    }

    #[test]
    fn test_nearest_existing_walks_up() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("a/b/c");
        assert_eq!(nearest_existing(&missing), Some(dir.path()));
    }

    #[test]
    fn test_creatable_roots_pass() {
        let dir = tempfile::tempdir().unwrap();
        let result = verify_environment(&config_in(dir.path(), "sh"));
        assert!(result.unwritable.is_empty(), "{:?}", result.problems());
    }

    #[test]
    fn test_missing_program_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let result = verify_environment(&config_in(dir.path(), "no-such-installer-xyz"));
        assert_eq!(
            result.missing_program.as_deref(),
            Some("no-such-installer-xyz")
        );
        assert!(!result.is_ok());
        assert!(result.problems().iter().any(|p| p.contains("no-such-installer-xyz")));
    }

    #[test]
    fn test_problems_lists_unwritable_roots() {
        let result = PreflightResult {
            unwritable: vec![(PathBuf::from("/obb"), PathBuf::from("/"))],
            missing_program: None,
        };
        assert!(!result.is_ok());
        assert_eq!(result.problems(), vec!["/obb is not writable (checked /)"]);
    }

    #[test]
    fn test_into_result_maps_problems_to_preflight_error() {
        let failed = PreflightResult {
            unwritable: vec![(PathBuf::from("/obb"), PathBuf::from("/"))],
            missing_program: Some("am".to_string()),
        };
        let err = failed.into_result().unwrap_err();
        assert!(matches!(err, SideloadError::Preflight(_)));
        assert_eq!(
            err.to_string(),
            "Preflight check failed: /obb is not writable (checked /); installer program 'am' was not found"
        );

        let passed = PreflightResult {
            unwritable: Vec::new(),
            missing_program: None,
        };
        assert!(passed.into_result().is_ok());
    }
}
