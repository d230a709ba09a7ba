//! Configuration file handling.
//!
//! A `SideloadConfig` describes where artifacts are staged and how the
//! installer is launched. It is stored as JSON; every field has a default so
//! partial files are accepted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::installer::{CacheProvider, CommandLauncher, DryRunLauncher, InstallerLauncher};
use crate::orchestrator::Orchestrator;
use crate::staging::{DEFAULT_ARCHIVE_FILE_NAME, DEFAULT_CHUNK_SIZE, StagingLayout};

/// Largest accepted copy buffer.
pub const MAX_CHUNK_SIZE: usize = 16 * 1024 * 1024;

/// External command used to open the platform installer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallerCommand {
    pub program: String,
    /// Arguments; `{uri}`, `{path}` and `{mime}` are substituted
    pub args: Vec<String>,
}

impl Default for InstallerCommand {
    fn default() -> Self {
        Self {
            program: "am".to_string(),
            args: [
                "start",
                "-a",
                "android.intent.action.VIEW",
                "-t",
                "{mime}",
                "-d",
                "{uri}",
                "--grant-read-uri-permission",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Sideload configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SideloadConfig {
    /// Root of the OBB tree; blobs go to `<obb_root>/<package>/`
    pub obb_root: PathBuf,
    /// Directory holding the single archive slot
    pub cache_root: PathBuf,
    /// File name of the archive slot
    pub archive_file_name: String,
    /// Copy buffer size in bytes
    pub chunk_size: usize,
    /// Authority used in published `content://` references
    pub provider_authority: String,
    pub installer: InstallerCommand,
}

impl Default for SideloadConfig {
    fn default() -> Self {
        Self {
            obb_root: PathBuf::from("/sdcard/Android/obb"),
            cache_root: std::env::temp_dir().join("sideload-cache"),
            archive_file_name: DEFAULT_ARCHIVE_FILE_NAME.to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            provider_authority: "sideload.fileprovider".to_string(),
            installer: InstallerCommand::default(),
        }
    }
}

impl SideloadConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Load from `path` if given, otherwise use defaults. The result is validated.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.obb_root.as_os_str().is_empty() {
            anyhow::bail!("OBB root must be specified");
        }
        if self.cache_root.as_os_str().is_empty() {
            anyhow::bail!("Cache root must be specified");
        }

        let name = self.archive_file_name.trim();
        if name.is_empty() {
            anyhow::bail!("Archive file name must be specified");
        }
        if name != self.archive_file_name
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            anyhow::bail!(
                "Archive file name must be a plain file name, got {:?}",
                self.archive_file_name
            );
        }

        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            anyhow::bail!(
                "Chunk size must be between 1 and {} bytes, got {}",
                MAX_CHUNK_SIZE,
                self.chunk_size
            );
        }

        let authority = self.provider_authority.trim();
        if authority.is_empty() {
            anyhow::bail!("Provider authority must be specified");
        }
        if authority.contains(['/', ' ']) {
            anyhow::bail!("Provider authority cannot contain '/' or spaces");
        }

        if self.installer.program.trim().is_empty() {
            anyhow::bail!("Installer program must be specified");
        }

        Ok(())
    }

    pub fn staging_layout(&self) -> StagingLayout {
        StagingLayout {
            obb_root: self.obb_root.clone(),
            cache_root: self.cache_root.clone(),
            archive_file_name: self.archive_file_name.clone(),
            chunk_size: self.chunk_size,
        }
    }

    pub fn cache_provider(&self) -> CacheProvider {
        CacheProvider::new(self.provider_authority.clone(), self.cache_root.clone())
    }

    pub fn command_launcher(&self) -> CommandLauncher {
        CommandLauncher::new(
            self.installer.program.clone(),
            self.installer.args.clone(),
            self.cache_provider(),
        )
    }

    /// Build an orchestrator; `dry_run` swaps in the logging launcher.
    pub fn orchestrator(&self, dry_run: bool) -> Orchestrator {
        let launcher: Arc<dyn InstallerLauncher> = if dry_run {
            Arc::new(DryRunLauncher::new())
        } else {
            Arc::new(self.command_launcher())
        };
        Orchestrator::new(
            self.staging_layout(),
            Arc::new(self.cache_provider()),
            launcher,
        )
    }
}
