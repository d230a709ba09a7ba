//! Sideload Library
//!
//! Stages an OBB expansion file where its application expects it and then
//! hands the APK to the platform installer. The core is the orchestration
//! pipeline in `orchestrator`; `worker` runs it off the interactive thread.

pub mod app;
pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod identifier;
pub mod installer;
pub mod orchestrator;
pub mod pipeline_state;
pub mod preflight;
pub mod selection;
pub mod staging;
pub mod theme;
pub mod ui;
pub mod worker;

// Re-export main types for convenience
pub use config::SideloadConfig;
pub use content::{ContentHandle, InMemoryContent, LocalFile};
pub use error::SideloadError;
pub use identifier::{infer, ApplicationIdentifier, InferenceError};
pub use installer::{
    CacheProvider, CommandLauncher, ContentPublisher, DryRunLauncher, InstallRequest,
    InstallerError, InstallerLauncher, SharedReference,
};
pub use orchestrator::{Orchestrator, PipelineError, PipelineObserver, RunReport};
pub use pipeline_state::{FailureReason, PipelineContext, PipelineState, TransitionError};
pub use preflight::{verify_environment, PreflightResult};
pub use selection::{ReadySelection, SelectionFlow};
pub use staging::{copy_stream, StagedFile, StagingLayout};
pub use worker::{InstallWorker, RunId, WorkerEvent};
