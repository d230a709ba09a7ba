//! Install orchestration
//!
//! Drives one run from a pair of selected artifacts to a terminal state:
//!
//! ```text
//! InferringIdentifier → StagingBlob → StagingArchive → HandoffToInstaller → Succeeded
//!         │                  │               │                  │
//!         └──────────────────┴───────┬───────┴──────────────────┘
//!                                    ↓
//!                             Failed(reason)
//! ```
//!
//! Each stage runs exactly once. There are no retries and no rollback of
//! partially written files. Whatever the outcome, the observer receives
//! exactly one `on_ready` call after the terminal state, so the presentation
//! layer always returns to a state where the user can start over.

use crate::content::ContentHandle;
use crate::identifier::{self, ApplicationIdentifier, InferenceError};
use crate::installer::{ContentPublisher, InstallRequest, InstallerError, InstallerLauncher, SharedReference};
use crate::pipeline_state::{FailureReason, PipelineContext, PipelineState};
use crate::selection::ReadySelection;
use crate::staging::{self, StagedFile, StagingLayout};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Message shown for every inference failure.
pub const INFERENCE_FAILED_MESSAGE: &str = "Could not infer package name from OBB";

/// Why a run failed, with the underlying cause.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("could not infer application identifier from '{filename}': {source}")]
    Inference {
        filename: String,
        #[source]
        source: InferenceError,
    },

    #[error("failed to stage OBB at {path}: {source}")]
    BlobCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to stage APK at {path}: {source}")]
    ArchiveCopy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to hand APK to the installer: {0}")]
    Dispatch(#[from] InstallerError),

    /// The driver attempted an invalid transition. Indicates a bug; still
    /// reported like any other failure rather than panicking.
    #[error(transparent)]
    Transition(#[from] crate::pipeline_state::TransitionError),
}

impl PipelineError {
    /// The failure reason recorded in the pipeline state.
    pub fn reason(&self) -> FailureReason {
        match self {
            Self::Inference { .. } => FailureReason::InferenceFailed,
            Self::BlobCopy { .. } => FailureReason::BlobCopyFailed,
            Self::ArchiveCopy { .. } => FailureReason::ArchiveCopyFailed,
            Self::Dispatch(_) | Self::Transition(_) => FailureReason::DispatchFailed,
        }
    }

    /// The single message shown to the user for this failure.
    pub fn user_message(&self) -> String {
        match self {
            Self::Inference { .. } => INFERENCE_FAILED_MESSAGE.to_string(),
            Self::BlobCopy { source, .. } | Self::ArchiveCopy { source, .. } => {
                format!("Error: {}", source)
            }
            Self::Dispatch(e) => format!("Error: {}", e),
            Self::Transition(e) => format!("Error: {}", e),
        }
    }
}

/// Receives notifications about a run.
///
/// For every run: `on_state` once per entered stage, `on_failure` exactly
/// once if the run failed, then `on_ready` exactly once.
pub trait PipelineObserver {
    fn on_state(&mut self, state: PipelineState);
    fn on_failure(&mut self, error: &PipelineError);
    fn on_ready(&mut self);
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {
    fn on_state(&mut self, _state: PipelineState) {}
    fn on_failure(&mut self, _error: &PipelineError) {}
    fn on_ready(&mut self) {}
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub identifier: ApplicationIdentifier,
    pub blob: StagedFile,
    pub archive: StagedFile,
    pub reference: SharedReference,
}

/// Runs the sideload pipeline against its collaborators.
#[derive(Clone)]
pub struct Orchestrator {
    layout: StagingLayout,
    publisher: Arc<dyn ContentPublisher>,
    launcher: Arc<dyn InstallerLauncher>,
}

impl Orchestrator {
    pub fn new(
        layout: StagingLayout,
        publisher: Arc<dyn ContentPublisher>,
        launcher: Arc<dyn InstallerLauncher>,
    ) -> Self {
        Self {
            layout,
            publisher,
            launcher,
        }
    }

    pub fn layout(&self) -> &StagingLayout {
        &self.layout
    }

    /// Run the pipeline for two already selected artifacts.
    pub fn run(
        &self,
        archive: &dyn ContentHandle,
        blob: &dyn ContentHandle,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunReport, PipelineError> {
        self.drive(PipelineContext::with_selection_complete(), archive, blob, observer)
    }

    /// Continue a run whose context was produced by the selection flow.
    pub fn run_selection(
        &self,
        selection: ReadySelection,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunReport, PipelineError> {
        let (context, archive, blob) = selection.into_parts();
        self.drive(context, archive.as_ref(), blob.as_ref(), observer)
    }

    fn drive(
        &self,
        mut ctx: PipelineContext,
        archive: &dyn ContentHandle,
        blob: &dyn ContentHandle,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunReport, PipelineError> {
        let result = self.stages(&mut ctx, archive, blob, observer);

        match &result {
            Ok(report) => {
                if let Err(e) = ctx.transition_to(PipelineState::Succeeded) {
                    // Unreachable unless stages() left the context elsewhere
                    warn!("Could not record success: {}", e);
                } else {
                    observer.on_state(PipelineState::Succeeded);
                }
                info!(
                    "Sideload of {} dispatched ({} byte OBB, {} byte APK)",
                    report.identifier, report.blob.bytes, report.archive.bytes
                );
            }
            Err(e) => {
                if let Ok(state) = ctx.fail(e.reason()) {
                    observer.on_state(state);
                }
                let at = ctx.failed_at().unwrap_or(ctx.current_stage());
                error!("Run failed at {}: {}", at, e);
                observer.on_failure(e);
            }
        }

        debug!(
            "Stages entered: {:?}",
            ctx.stage_history()
                .iter()
                .map(|(stage, _)| *stage)
                .collect::<Vec<_>>()
        );
        observer.on_ready();
        result
    }

    fn stages(
        &self,
        ctx: &mut PipelineContext,
        archive: &dyn ContentHandle,
        blob: &dyn ContentHandle,
        observer: &mut dyn PipelineObserver,
    ) -> Result<RunReport, PipelineError> {
        let mut enter =
            |ctx: &mut PipelineContext, stage: PipelineState| -> Result<(), PipelineError> {
                ctx.transition_to(stage)?;
                info!("Stage: {}", stage);
                observer.on_state(stage);
                Ok(())
            };

        enter(ctx, PipelineState::InferringIdentifier)?;
        let filename = blob.display_name();
        let identifier = identifier::infer(filename).map_err(|source| PipelineError::Inference {
            filename: filename.to_string(),
            source,
        })?;
        info!("Inferred identifier {} from {}", identifier, filename);

        enter(ctx, PipelineState::StagingBlob)?;
        let blob_file = staging::stage_blob(&self.layout, &identifier, blob).map_err(|source| {
            PipelineError::BlobCopy {
                path: self.layout.destination_dir(&identifier).join(filename),
                source,
            }
        })?;

        enter(ctx, PipelineState::StagingArchive)?;
        let archive_file = staging::stage_archive(&self.layout, archive).map_err(|source| {
            PipelineError::ArchiveCopy {
                path: self.layout.archive_slot(),
                source,
            }
        })?;

        enter(ctx, PipelineState::HandoffToInstaller)?;
        let reference = self.publisher.publish(&archive_file.path)?;
        self.launcher
            .launch(&InstallRequest::for_package(reference.clone()))?;

        Ok(RunReport {
            identifier,
            blob: blob_file,
            archive: archive_file,
            reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContent;
    use crate::installer::{CacheProvider, DryRunLauncher};

    #[derive(Default)]
    struct Recorder {
        states: Vec<PipelineState>,
        failures: Vec<String>,
        ready: usize,
    }

    impl PipelineObserver for Recorder {
        fn on_state(&mut self, state: PipelineState) {
            self.states.push(state);
        }
        fn on_failure(&mut self, error: &PipelineError) {
            self.failures.push(error.user_message());
        }
        fn on_ready(&mut self) {
            self.ready += 1;
        }
    }

    fn orchestrator(root: &std::path::Path) -> (Orchestrator, DryRunLauncher) {
        let layout = StagingLayout::new(root.join("obb"), root.join("cache"));
        let provider = CacheProvider::new("test.provider", root.join("cache"));
        let launcher = DryRunLauncher::new();
        (
            Orchestrator::new(layout, Arc::new(provider), Arc::new(launcher.clone())),
            launcher,
        )
    }

    #[test]
    fn test_successful_run_visits_every_stage() {
        let root = tempfile::tempdir().unwrap();
        let (orch, launcher) = orchestrator(root.path());
        let mut rec = Recorder::default();

        let report = orch
            .run(
                &InMemoryContent::new("game.apk", vec![1u8; 32]),
                &InMemoryContent::new("main.2.com.example.game.obb", vec![2u8; 64]),
                &mut rec,
            )
            .unwrap();

        assert_eq!(
            rec.states,
            vec![
                PipelineState::InferringIdentifier,
                PipelineState::StagingBlob,
                PipelineState::StagingArchive,
                PipelineState::HandoffToInstaller,
                PipelineState::Succeeded,
            ]
        );
        assert!(rec.failures.is_empty());
        assert_eq!(rec.ready, 1);
        assert_eq!(report.identifier.as_str(), "com.example.game");
        assert_eq!(report.blob.bytes, 64);
        assert_eq!(report.archive.bytes, 32);
        assert_eq!(launcher.launched().len(), 1);
        assert_eq!(launcher.launched()[0].reference, report.reference);
    }

    #[test]
    fn test_inference_failure_stops_before_staging() {
        let root = tempfile::tempdir().unwrap();
        let (orch, launcher) = orchestrator(root.path());
        let mut rec = Recorder::default();

        let err = orch
            .run(
                &InMemoryContent::new("game.apk", vec![1u8]),
                &InMemoryContent::new("randomfile.obb", vec![2u8]),
                &mut rec,
            )
            .unwrap_err();

        assert_eq!(err.reason(), FailureReason::InferenceFailed);
        assert_eq!(
            rec.states,
            vec![
                PipelineState::InferringIdentifier,
                PipelineState::Failed(FailureReason::InferenceFailed),
            ]
        );
        assert_eq!(rec.failures, vec![INFERENCE_FAILED_MESSAGE.to_string()]);
        assert_eq!(rec.ready, 1);
        assert!(!root.path().join("obb").exists());
        assert!(launcher.launched().is_empty());
    }

    #[test]
    fn test_dispatch_failure_is_reported_once() {
        let root = tempfile::tempdir().unwrap();
        let layout = StagingLayout::new(root.path().join("obb"), root.path().join("cache"));
        // Publisher rooted elsewhere refuses the archive slot
        let provider = CacheProvider::new("test.provider", root.path().join("elsewhere"));
        let orch = Orchestrator::new(layout, Arc::new(provider), Arc::new(DryRunLauncher::new()));
        let mut rec = Recorder::default();

        let err = orch
            .run(
                &InMemoryContent::new("game.apk", vec![1u8]),
                &InMemoryContent::new("main.1.app.obb", vec![2u8]),
                &mut rec,
            )
            .unwrap_err();

        assert_eq!(err.reason(), FailureReason::DispatchFailed);
        assert_eq!(rec.failures.len(), 1);
        assert!(rec.failures[0].starts_with("Error: "));
        assert_eq!(rec.ready, 1);
        assert_eq!(
            rec.states.last(),
            Some(&PipelineState::Failed(FailureReason::DispatchFailed))
        );
    }

    #[test]
    fn test_user_messages() {
        let err = PipelineError::BlobCopy {
            path: PathBuf::from("/x"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.user_message(), "Error: denied");
        assert_eq!(err.reason(), FailureReason::BlobCopyFailed);
    }
}
