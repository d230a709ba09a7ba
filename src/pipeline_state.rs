//! Pipeline State Machine
//!
//! Authoritative source of truth for the progress of one sideload run. A
//! `PipelineContext` is created fresh for every user-initiated run and is
//! discarded once it reaches a terminal state; it is never shared between
//! runs.
//!
//! # Stage Flow
//!
//! ```text
//! Idle
//!     ↓
//! AwaitingArchive      (selection flow)
//!     ↓
//! AwaitingBlob         (selection flow)
//!     ↓
//! InferringIdentifier
//!     ↓
//! StagingBlob
//!     ↓
//! StagingArchive
//!     ↓
//! HandoffToInstaller
//!     ↓
//! Succeeded
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;
use strum::{Display, EnumIter};
use thiserror::Error;

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum FailureReason {
    /// The blob filename did not yield an application identifier
    #[strum(to_string = "identifier inference failed")]
    InferenceFailed,
    /// Copying the blob to its staging destination failed
    #[strum(to_string = "blob copy failed")]
    BlobCopyFailed,
    /// Copying the archive to the temp slot failed
    #[strum(to_string = "archive copy failed")]
    ArchiveCopyFailed,
    /// Publishing the archive or launching the installer failed
    #[strum(to_string = "installer dispatch failed")]
    DispatchFailed,
}

/// Pipeline stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing selected yet; the trigger is enabled
    Idle,
    /// Waiting for the package archive selection
    AwaitingArchive,
    /// Waiting for the data blob selection
    AwaitingBlob,
    /// Deriving the application identifier from the blob name
    InferringIdentifier,
    /// Copying the blob into its staging destination
    StagingBlob,
    /// Copying the archive into the single temp slot
    StagingArchive,
    /// Publishing the archive and dispatching the installer
    HandoffToInstaller,
    /// Installer dispatched (terminal state)
    Succeeded,
    /// Run failed (terminal state)
    Failed(FailureReason),
}

impl PipelineState {
    /// Returns the numeric order of this stage (0-7, 255 for Failed)
    #[inline]
    pub const fn order(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AwaitingArchive => 1,
            Self::AwaitingBlob => 2,
            Self::InferringIdentifier => 3,
            Self::StagingBlob => 4,
            Self::StagingArchive => 5,
            Self::HandoffToInstaller => 6,
            Self::Succeeded => 7,
            Self::Failed(_) => 255,
        }
    }

    /// Returns true if this is a terminal state (Succeeded or Failed)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// Returns the next stage in the sequence, or None if at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Idle => Some(Self::AwaitingArchive),
            Self::AwaitingArchive => Some(Self::AwaitingBlob),
            Self::AwaitingBlob => Some(Self::InferringIdentifier),
            Self::InferringIdentifier => Some(Self::StagingBlob),
            Self::StagingBlob => Some(Self::StagingArchive),
            Self::StagingArchive => Some(Self::HandoffToInstaller),
            Self::HandoffToInstaller => Some(Self::Succeeded),
            Self::Succeeded | Self::Failed(_) => None,
        }
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::Idle => "Ready to install your classic games",
            Self::AwaitingArchive => "Select the APK file",
            Self::AwaitingBlob => "Now select the OBB file",
            Self::InferringIdentifier => "Processing game files...",
            Self::StagingBlob => "Copying OBB file...",
            Self::StagingArchive => "Preparing APK...",
            Self::HandoffToInstaller => "Installing APK...",
            Self::Succeeded => "Installer launched",
            Self::Failed(_) => "Installation failed",
        }
    }

    /// Returns the approximate progress percentage for this stage
    pub const fn progress_percent(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::AwaitingArchive => 0,
            Self::AwaitingBlob => 5,
            Self::InferringIdentifier => 10,
            Self::StagingBlob => 20,
            Self::StagingArchive => 70,
            Self::HandoffToInstaller => 90,
            Self::Succeeded => 100,
            Self::Failed(_) => 0, // Progress is meaningless for failed state
        }
    }

    /// Returns all stages in order (excluding Failed)
    pub const fn all_stages() -> &'static [Self] {
        &[
            Self::Idle,
            Self::AwaitingArchive,
            Self::AwaitingBlob,
            Self::InferringIdentifier,
            Self::StagingBlob,
            Self::StagingArchive,
            Self::HandoffToInstaller,
            Self::Succeeded,
        ]
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "{} ({})", self.description(), reason),
            _ => f.write_str(self.description()),
        }
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// Attempted to skip one or more stages
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: PipelineState,
        to: PipelineState,
    },

    /// Attempted to go backwards (not allowed)
    #[error("Cannot go backwards from {from} to {to} (the pipeline is forward-only)")]
    BackwardTransition {
        from: PipelineState,
        to: PipelineState,
    },

    /// Attempted to transition from a terminal state
    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: PipelineState },

    /// Attempted to transition to the same state
    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: PipelineState },
}

/// State of a single run.
///
/// Owns the current stage and provides validated transition methods so that
/// stages can neither be skipped nor revisited.
///
/// # Example
///
/// ```
/// use sideload::pipeline_state::{PipelineContext, PipelineState};
///
/// let mut ctx = PipelineContext::new();
/// assert_eq!(ctx.current_stage(), PipelineState::Idle);
///
/// ctx.transition_to(PipelineState::AwaitingArchive).unwrap();
/// assert_eq!(ctx.current_stage(), PipelineState::AwaitingArchive);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(PipelineState::StagingBlob).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct PipelineContext {
    current: PipelineState,

    /// Stage at which failure occurred (if any)
    failed_at: Option<PipelineState>,

    /// Stages entered so far with unix timestamps
    stage_history: Vec<(PipelineState, u64)>,
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineContext {
    /// Create a new context in the Idle state.
    pub fn new() -> Self {
        Self {
            current: PipelineState::Idle,
            failed_at: None,
            stage_history: Vec::with_capacity(PipelineState::all_stages().len()),
        }
    }

    /// Create a context for a run whose two inputs were supplied up front.
    ///
    /// Both selection stages are recorded as passed; the next transition is
    /// `InferringIdentifier`.
    pub fn with_selection_complete() -> Self {
        let mut ctx = Self::new();
        ctx.record_stage_transition(PipelineState::AwaitingArchive);
        ctx.record_stage_transition(PipelineState::AwaitingBlob);
        ctx.current = PipelineState::AwaitingBlob;
        ctx
    }

    #[inline]
    pub fn current_stage(&self) -> PipelineState {
        self.current
    }

    /// Returns the stage at which failure occurred, if any
    #[inline]
    pub fn failed_at(&self) -> Option<PipelineState> {
        self.failed_at
    }

    /// Returns the stage history as a slice of (stage, timestamp) pairs
    pub fn stage_history(&self) -> &[(PipelineState, u64)] {
        &self.stage_history
    }

    /// Transition to a specific stage (must be the next stage in sequence).
    ///
    /// The caller names the stage it expects to enter, which catches
    /// ordering bugs in the driver.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if current is a terminal state
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    pub fn transition_to(
        &mut self,
        target: PipelineState,
    ) -> Result<PipelineState, TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(TransitionError::AlreadyAtStage { stage: target });
        }

        // Failed is only reachable through fail()
        if matches!(target, PipelineState::Failed(_)) {
            return Err(TransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(TransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(TransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record_stage_transition(target);
        self.current = target;

        Ok(target)
    }

    /// Mark the run as failed for `reason`.
    ///
    /// Records the stage the failure occurred at.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Succeeded or Failed
    pub fn fail(&mut self, reason: FailureReason) -> Result<PipelineState, TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }

        let failed = PipelineState::Failed(reason);
        self.failed_at = Some(self.current);
        self.record_stage_transition(failed);
        self.current = failed;

        Ok(failed)
    }

    fn record_stage_transition(&mut self, stage: PipelineState) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.stage_history.push((stage, timestamp));
    }
}
