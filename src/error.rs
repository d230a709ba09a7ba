//! Error handling module for sideload
//!
//! Provides the crate-wide error type using thiserror. Module-local error
//! enums (inference, transitions, installer dispatch, pipeline) convert into
//! `SideloadError` so callers outside the core can use a single type.

use crate::identifier::InferenceError;
use crate::installer::InstallerError;
use crate::orchestrator::PipelineError;
use crate::pipeline_state::TransitionError;
use thiserror::Error;

/// Main error type for sideload
#[derive(Error, Debug)]
pub enum SideloadError {
    /// The OBB file name does not follow the expansion file naming scheme
    #[error("Could not infer package name: {0}")]
    Inference(#[from] InferenceError),

    /// Pipeline state machine transition errors
    #[error("Pipeline transition error: {0}")]
    Transition(#[from] TransitionError),

    /// Publishing the archive or launching the installer failed
    #[error("Installer error: {0}")]
    Installer(#[from] InstallerError),

    /// A run ended in a failed state
    #[error("Installation failed: {0}")]
    Pipeline(#[from] PipelineError),

    /// Preflight failures (storage not writable, installer missing)
    #[error("Preflight check failed: {0}")]
    Preflight(String),

    /// State errors (worker gone)
    #[error("State error: {0}")]
    State(String),

    /// A run was submitted while another one is still in flight
    #[error("An installation is already in progress")]
    RunInProgress,
}

/// Result type alias for sideload operations
pub type Result<T> = std::result::Result<T, SideloadError>;

impl SideloadError {
    /// Create a preflight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create a state error
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }
}
