//! Installer handoff
//!
//! The staged archive is never handed to the platform as a raw path. A
//! `ContentPublisher` turns it into a shared `content://` reference first,
//! and an `InstallerLauncher` dispatches an install request for that
//! reference. Dispatch is fire-and-forget: nothing here waits for, or learns
//! about, the outcome of the installation itself.

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info, warn};

/// MIME type of an installable Android package.
pub const PACKAGE_ARCHIVE_MIME: &str = "application/vnd.android.package-archive";

/// Errors raised while publishing or dispatching.
#[derive(Error, Debug)]
pub enum InstallerError {
    /// The file is not inside a root the publisher serves
    #[error("{path} is outside the published root {root}")]
    OutsideRoot { path: PathBuf, root: PathBuf },

    /// The reference does not belong to this publisher
    #[error("unknown content reference: {0}")]
    UnknownReference(String),

    /// The launcher command could not be started
    #[error("failed to launch installer '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Any other dispatch failure
    #[error("installer dispatch failed: {0}")]
    Dispatch(String),
}

/// An opaque reference to a published file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SharedReference(String);

impl SharedReference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SharedReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a local file into a reference the installer can read.
pub trait ContentPublisher: Send + Sync {
    fn publish(&self, path: &Path) -> Result<SharedReference, InstallerError>;
}

/// Publishes files below a cache directory under a provider authority.
///
/// `<cache_root>/temp_install.apk` becomes
/// `content://<authority>/cache/temp_install.apk`.
#[derive(Debug, Clone)]
pub struct CacheProvider {
    authority: String,
    cache_root: PathBuf,
}

impl CacheProvider {
    const SEGMENT: &'static str = "cache";

    pub fn new(authority: impl Into<String>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            authority: authority.into(),
            cache_root: cache_root.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    fn prefix(&self) -> String {
        format!("content://{}/{}/", self.authority, Self::SEGMENT)
    }

    /// Map a reference issued by this provider back to its file.
    pub fn resolve(&self, reference: &SharedReference) -> Result<PathBuf, InstallerError> {
        let relative = reference
            .as_str()
            .strip_prefix(&self.prefix())
            .filter(|rest| !rest.is_empty())
            .ok_or_else(|| InstallerError::UnknownReference(reference.to_string()))?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(InstallerError::UnknownReference(reference.to_string()));
        }
        Ok(self.cache_root.join(relative))
    }
}

impl ContentPublisher for CacheProvider {
    fn publish(&self, path: &Path) -> Result<SharedReference, InstallerError> {
        let outside = || InstallerError::OutsideRoot {
            path: path.to_path_buf(),
            root: self.cache_root.clone(),
        };

        let relative = path.strip_prefix(&self.cache_root).map_err(|_| outside())?;
        let segments: Vec<String> = relative
            .components()
            .map(|c| match c {
                Component::Normal(part) => Ok(part.to_string_lossy().into_owned()),
                _ => Err(outside()),
            })
            .collect::<Result<_, _>>()?;
        if segments.is_empty() {
            return Err(outside());
        }

        Ok(SharedReference(format!("{}{}", self.prefix(), segments.join("/"))))
    }
}

/// A request to show the platform's install UI for a published archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    pub reference: SharedReference,
    pub mime_type: &'static str,
    /// Grant the installer read access to the reference
    pub grant_read: bool,
}

impl InstallRequest {
    pub fn for_package(reference: SharedReference) -> Self {
        Self {
            reference,
            mime_type: PACKAGE_ARCHIVE_MIME,
            grant_read: true,
        }
    }
}

/// Dispatches install requests. Returning `Ok` means "dispatched", not
/// "installed".
pub trait InstallerLauncher: Send + Sync {
    fn launch(&self, request: &InstallRequest) -> Result<(), InstallerError>;
}

/// Launches the installer by spawning an external command.
///
/// Arguments may contain the placeholders `{uri}`, `{path}` and `{mime}`.
/// The child runs in its own process group so it outlives an interrupted
/// terminal session, and a detached thread reaps it.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    program: String,
    args: Vec<String>,
    provider: CacheProvider,
}

impl CommandLauncher {
    pub fn new(program: impl Into<String>, args: Vec<String>, provider: CacheProvider) -> Self {
        Self {
            program: program.into(),
            args,
            provider,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Expand the argument template for `request`.
    pub fn render_args(&self, request: &InstallRequest) -> Result<Vec<String>, InstallerError> {
        let needs_path = self.args.iter().any(|arg| arg.contains("{path}"));
        let path = if needs_path {
            self.provider
                .resolve(&request.reference)?
                .to_string_lossy()
                .into_owned()
        } else {
            String::new()
        };

        Ok(self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{uri}", request.reference.as_str())
                    .replace("{mime}", request.mime_type)
                    .replace("{path}", &path)
            })
            .collect())
    }
}

impl InstallerLauncher for CommandLauncher {
    fn launch(&self, request: &InstallRequest) -> Result<(), InstallerError> {
        use std::os::unix::process::CommandExt;

        let args = self.render_args(request)?;
        info!("Launching installer: {} {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .spawn()
            .map_err(|source| InstallerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let program = self.program.clone();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if status.success() => debug!("{} exited successfully", program),
            Ok(status) => warn!("{} exited with {}", program, status),
            Err(e) => warn!("Failed to wait for {}: {}", program, e),
        });

        Ok(())
    }
}

/// Logs install requests instead of dispatching them.
///
/// Clones share the record of requests.
#[derive(Debug, Clone, Default)]
pub struct DryRunLauncher {
    launched: Arc<Mutex<Vec<InstallRequest>>>,
}

impl DryRunLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far.
    pub fn launched(&self) -> Vec<InstallRequest> {
        self.launched
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl InstallerLauncher for DryRunLauncher {
    fn launch(&self, request: &InstallRequest) -> Result<(), InstallerError> {
        info!(
            "[DRY RUN] Would open {} as {}",
            request.reference, request.mime_type
        );
        self.launched
            .lock()
            .map_err(|e| InstallerError::Dispatch(format!("launch log poisoned: {}", e)))?
            .push(request.clone());
        Ok(())
    }
}
