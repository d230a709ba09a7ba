//! Artifact selection flow
//!
//! The user picks the APK first and the OBB second. This module tracks that
//! two-step selection on a fresh `PipelineContext` and hands both handles,
//! together with the context, to the orchestrator once the second pick
//! arrives. Cancelling either pick abandons the context.

use crate::content::ContentHandle;
use crate::pipeline_state::{PipelineContext, PipelineState, TransitionError};

/// Both artifacts picked; ready for `Orchestrator::run_selection`.
pub struct ReadySelection {
    context: PipelineContext,
    archive: Box<dyn ContentHandle>,
    blob: Box<dyn ContentHandle>,
}

impl ReadySelection {
    /// Wrap two handles that were supplied together, skipping the picker.
    pub fn from_handles(archive: Box<dyn ContentHandle>, blob: Box<dyn ContentHandle>) -> Self {
        Self {
            context: PipelineContext::with_selection_complete(),
            archive,
            blob,
        }
    }

    pub fn archive(&self) -> &dyn ContentHandle {
        self.archive.as_ref()
    }

    pub fn blob(&self) -> &dyn ContentHandle {
        self.blob.as_ref()
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn into_parts(
        self,
    ) -> (
        PipelineContext,
        Box<dyn ContentHandle>,
        Box<dyn ContentHandle>,
    ) {
        (self.context, self.archive, self.blob)
    }
}

impl std::fmt::Debug for ReadySelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadySelection")
            .field("stage", &self.context.current_stage())
            .field("archive", &self.archive.display_name())
            .field("blob", &self.blob.display_name())
            .finish()
    }
}

/// Two-step picker state: Idle → AwaitingArchive → AwaitingBlob.
#[derive(Default)]
pub struct SelectionFlow {
    context: Option<PipelineContext>,
    archive: Option<Box<dyn ContentHandle>>,
}

impl SelectionFlow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stage as shown to the user.
    pub fn stage(&self) -> PipelineState {
        self.context
            .as_ref()
            .map_or(PipelineState::Idle, PipelineContext::current_stage)
    }

    /// Start a new selection with a fresh context.
    ///
    /// # Errors
    ///
    /// `AlreadyAtStage` if a selection is already underway.
    pub fn begin(&mut self) -> Result<PipelineState, TransitionError> {
        if let Some(ctx) = &self.context {
            return Err(TransitionError::AlreadyAtStage {
                stage: ctx.current_stage(),
            });
        }
        let mut ctx = PipelineContext::new();
        let stage = ctx.transition_to(PipelineState::AwaitingArchive)?;
        self.context = Some(ctx);
        Ok(stage)
    }

    /// Record the picked archive and move on to the blob.
    pub fn supply_archive(
        &mut self,
        archive: Box<dyn ContentHandle>,
    ) -> Result<PipelineState, TransitionError> {
        let ctx = self.context_mut()?;
        let stage = ctx.transition_to(PipelineState::AwaitingBlob)?;
        self.archive = Some(archive);
        Ok(stage)
    }

    /// Record the picked blob and release the finished selection.
    ///
    /// The flow returns to Idle afterwards.
    pub fn supply_blob(
        &mut self,
        blob: Box<dyn ContentHandle>,
    ) -> Result<ReadySelection, TransitionError> {
        let stage = self.stage();
        if stage != PipelineState::AwaitingBlob {
            return Err(TransitionError::SkippedStage {
                from: stage,
                to: PipelineState::AwaitingBlob,
            });
        }
        match (self.context.take(), self.archive.take()) {
            (Some(context), Some(archive)) => Ok(ReadySelection {
                context,
                archive,
                blob,
            }),
            _ => Err(TransitionError::SkippedStage {
                from: PipelineState::Idle,
                to: PipelineState::AwaitingBlob,
            }),
        }
    }

    /// Abandon the current selection (picker dismissed).
    pub fn cancel(&mut self) {
        self.context = None;
        self.archive = None;
    }

    fn context_mut(&mut self) -> Result<&mut PipelineContext, TransitionError> {
        self.context
            .as_mut()
            .ok_or(TransitionError::SkippedStage {
                from: PipelineState::Idle,
                to: PipelineState::AwaitingBlob,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContent;

    fn handle(name: &str) -> Box<dyn ContentHandle> {
        Box::new(InMemoryContent::new(name, vec![0u8]))
    }

    #[test]
    fn test_full_selection() {
        let mut flow = SelectionFlow::new();
        assert_eq!(flow.stage(), PipelineState::Idle);

        assert_eq!(flow.begin().unwrap(), PipelineState::AwaitingArchive);
        assert_eq!(
            flow.supply_archive(handle("game.apk")).unwrap(),
            PipelineState::AwaitingBlob
        );
        let ready = flow.supply_blob(handle("main.1.x.obb")).unwrap();

        assert_eq!(ready.archive().display_name(), "game.apk");
        assert_eq!(ready.blob().display_name(), "main.1.x.obb");
        assert_eq!(ready.context().current_stage(), PipelineState::AwaitingBlob);
        assert_eq!(flow.stage(), PipelineState::Idle);
    }

    #[test]
    fn test_blob_before_archive_is_rejected() {
        let mut flow = SelectionFlow::new();
        flow.begin().unwrap();
        assert!(flow.supply_blob(handle("main.1.x.obb")).is_err());
        assert_eq!(flow.stage(), PipelineState::AwaitingArchive);
    }

    #[test]
    fn test_archive_without_begin_is_rejected() {
        let mut flow = SelectionFlow::new();
        assert!(flow.supply_archive(handle("game.apk")).is_err());
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut flow = SelectionFlow::new();
        flow.begin().unwrap();
        assert!(matches!(
            flow.begin(),
            Err(TransitionError::AlreadyAtStage { .. })
        ));
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut flow = SelectionFlow::new();
        flow.begin().unwrap();
        flow.supply_archive(handle("game.apk")).unwrap();
        flow.cancel();
        assert_eq!(flow.stage(), PipelineState::Idle);
        assert!(flow.begin().is_ok());
    }
}
