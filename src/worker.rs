//! Install worker - runs the pipeline on a dedicated background thread.
//!
//! The interactive thread submits runs and polls `WorkerEvent`s from the
//! returned receiver; all blocking IO (directory creation, stream copies)
//! stays on the worker thread. At most one run is admitted at a time: a
//! `submit` while a run is in flight is rejected with `RunInProgress`, which
//! keeps two runs from writing the shared archive slot concurrently.

use crate::content::ContentHandle;
use crate::error::{Result, SideloadError};
use crate::orchestrator::{Orchestrator, PipelineError, PipelineObserver};
use crate::pipeline_state::PipelineState;
use crate::selection::ReadySelection;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender, TrySendError};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

/// Identifier of a submitted run, increasing per worker.
pub type RunId = u64;

/// Notifications delivered to the presentation thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    /// The run entered a new stage
    StateChanged { run: RunId, state: PipelineState },
    /// The run failed; `message` is the one line to show the user
    Failed { run: RunId, message: String },
    /// The run is over and a new one may be submitted
    Ready { run: RunId },
}

struct RunRequest {
    id: RunId,
    selection: ReadySelection,
}

/// Handle to the background worker.
///
/// Dropping it stops the worker after the current run finishes.
pub struct InstallWorker {
    request_tx: Option<SyncSender<RunRequest>>,
    busy: Arc<AtomicBool>,
    next_id: AtomicU64,
    handle: Option<JoinHandle<()>>,
}

impl InstallWorker {
    /// Spawn the worker thread.
    ///
    /// Returns the worker handle and the receiving end of its event channel.
    pub fn spawn(orchestrator: Orchestrator) -> (Self, Receiver<WorkerEvent>) {
        let (request_tx, request_rx) = mpsc::sync_channel::<RunRequest>(1);
        let (event_tx, event_rx) = mpsc::channel();
        let busy = Arc::new(AtomicBool::new(false));

        let worker_busy = Arc::clone(&busy);
        let handle = std::thread::spawn(move || {
            debug!("Install worker thread started");
            while let Ok(request) = request_rx.recv() {
                info!(
                    "Starting run {} ({} + {})",
                    request.id,
                    request.selection.archive().display_name(),
                    request.selection.blob().display_name()
                );
                let mut observer = ChannelObserver {
                    run: request.id,
                    events: event_tx.clone(),
                    busy: Arc::clone(&worker_busy),
                    failure_sent: false,
                    ready_sent: false,
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    orchestrator.run_selection(request.selection, &mut observer)
                }));
                match outcome {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => debug!("Run {} ended with failure: {}", request.id, e),
                    Err(payload) => observer.abort(&panic_message(&*payload)),
                }
            }
            debug!("Install worker thread exiting");
        });

        (
            Self {
                request_tx: Some(request_tx),
                busy,
                next_id: AtomicU64::new(1),
                handle: Some(handle),
            },
            event_rx,
        )
    }

    /// True while a run is admitted and not yet back to ready.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Submit a finished selection.
    ///
    /// # Errors
    ///
    /// - `RunInProgress` if a run is still in flight
    /// - `State` if the worker thread is gone
    pub fn submit(&self, selection: ReadySelection) -> Result<RunId> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Rejected submission: a run is already in progress");
            return Err(SideloadError::RunInProgress);
        }

        let Some(tx) = &self.request_tx else {
            self.busy.store(false, Ordering::Release);
            return Err(SideloadError::state("install worker is shut down"));
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match tx.try_send(RunRequest { id, selection }) {
            Ok(()) => Ok(id),
            Err(TrySendError::Full(_)) => Err(SideloadError::RunInProgress),
            Err(TrySendError::Disconnected(_)) => {
                self.busy.store(false, Ordering::Release);
                Err(SideloadError::state("install worker thread has stopped"))
            }
        }
    }

    /// Submit two handles supplied together.
    pub fn submit_handles(
        &self,
        archive: Box<dyn ContentHandle>,
        blob: Box<dyn ContentHandle>,
    ) -> Result<RunId> {
        self.submit(ReadySelection::from_handles(archive, blob))
    }
}

impl Drop for InstallWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Install worker thread panicked");
            }
        }
    }
}

/// Message shown when a run panicked instead of returning an error.
pub const ABORTED_MESSAGE: &str = "Error: installation aborted unexpectedly";

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Forwards pipeline notifications to the event channel.
struct ChannelObserver {
    run: RunId,
    events: Sender<WorkerEvent>,
    busy: Arc<AtomicBool>,
    failure_sent: bool,
    ready_sent: bool,
}

impl ChannelObserver {
    fn send(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!("Event receiver dropped; run {} continues unobserved", self.run);
        }
    }

    /// Finish a run that panicked: report it once and reopen the gate.
    fn abort(&mut self, cause: &str) {
        error!("Run {} panicked: {}", self.run, cause);
        if self.ready_sent {
            return;
        }
        if !self.failure_sent {
            self.failure_sent = true;
            self.send(WorkerEvent::Failed {
                run: self.run,
                message: ABORTED_MESSAGE.to_string(),
            });
        }
        self.on_ready();
    }
}

impl PipelineObserver for ChannelObserver {
    fn on_state(&mut self, state: PipelineState) {
        self.send(WorkerEvent::StateChanged {
            run: self.run,
            state,
        });
    }

    fn on_failure(&mut self, error: &PipelineError) {
        self.failure_sent = true;
        self.send(WorkerEvent::Failed {
            run: self.run,
            message: error.user_message(),
        });
    }

    fn on_ready(&mut self) {
        // Open the gate before announcing readiness
        self.ready_sent = true;
        self.busy.store(false, Ordering::Release);
        self.send(WorkerEvent::Ready { run: self.run });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::InMemoryContent;
    use crate::installer::{CacheProvider, DryRunLauncher};
    use crate::staging::StagingLayout;
    use std::time::Duration;

    fn worker(root: &std::path::Path) -> (InstallWorker, Receiver<WorkerEvent>) {
        let layout = StagingLayout::new(root.join("obb"), root.join("cache"));
        let provider = CacheProvider::new("test.provider", root.join("cache"));
        InstallWorker::spawn(Orchestrator::new(
            layout,
            Arc::new(provider),
            Arc::new(DryRunLauncher::new()),
        ))
    }

    fn wait_ready(events: &Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
        let mut seen = Vec::new();
        loop {
            let event = events
                .recv_timeout(Duration::from_secs(10))
                .expect("worker should report");
            let done = matches!(event, WorkerEvent::Ready { .. });
            seen.push(event);
            if done {
                return seen;
            }
        }
    }

    #[test]
    fn test_run_ids_increase() {
        let root = tempfile::tempdir().unwrap();
        let (worker, events) = worker(root.path());

        let first = worker
            .submit_handles(
                Box::new(InMemoryContent::new("a.apk", vec![1u8])),
                Box::new(InMemoryContent::new("main.1.app.obb", vec![2u8])),
            )
            .unwrap();
        wait_ready(&events);
        let second = worker
            .submit_handles(
                Box::new(InMemoryContent::new("a.apk", vec![1u8])),
                Box::new(InMemoryContent::new("main.1.app.obb", vec![2u8])),
            )
            .unwrap();
        wait_ready(&events);

        assert!(second > first);
        assert!(!worker.is_busy());
    }

    #[test]
    fn test_events_end_with_single_ready() {
        let root = tempfile::tempdir().unwrap();
        let (worker, events) = worker(root.path());

        let run = worker
            .submit_handles(
                Box::new(InMemoryContent::new("a.apk", vec![1u8])),
                Box::new(InMemoryContent::new("bad.obb", vec![2u8])),
            )
            .unwrap();
        let seen = wait_ready(&events);

        let ready = seen
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Ready { .. }))
            .count();
        let failed = seen
            .iter()
            .filter(|e| matches!(e, WorkerEvent::Failed { .. }))
            .count();
        assert_eq!(ready, 1);
        assert_eq!(failed, 1);
        assert_eq!(seen.last(), Some(&WorkerEvent::Ready { run }));
    }
}
