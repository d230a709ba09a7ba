use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Sideload - install an APK together with its OBB expansion file
#[derive(Parser)]
#[command(name = "sideload")]
#[command(about = "Stage an OBB where its app expects it, then open the APK installer")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: stage files but only log the installer launch.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Path to a JSON configuration file (defaults are used otherwise)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Stage the OBB and launch the installer without the TUI
    Install {
        /// Package archive to install
        #[arg(long)]
        apk: PathBuf,

        /// OBB expansion file named main.<version>.<package>.obb
        #[arg(long)]
        obb: PathBuf,

        /// Skip the storage and installer checks
        #[arg(long)]
        skip_preflight: bool,

        /// Save the effective configuration to this file first
        #[arg(long)]
        save_config: Option<PathBuf>,
    },
    /// Run the interactive installer
    Tui {
        /// Pre-fill the APK path prompt
        #[arg(long)]
        apk: Option<PathBuf>,

        /// Pre-fill the OBB path prompt
        #[arg(long)]
        obb: Option<PathBuf>,

        /// Skip the storage and installer checks
        #[arg(long)]
        skip_preflight: bool,
    },
    /// Print the package name inferred from an OBB file name
    Infer {
        /// OBB file name (only the name is used, the file need not exist)
        filename: String,
    },
    /// Check storage access and installer availability
    Check,
    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        file: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
