//! Application module - interactive presentation layer
//!
//! Owns the selection flow and the install worker handle. The event loop
//! runs on the interactive thread: it reads keys, drains `WorkerEvent`s from
//! the worker and redraws. Nothing in here blocks on IO; runs happen on the
//! worker thread.

mod state;

pub use state::{AppMode, AppState, LastResult, PromptTarget, MAX_LOG_LINES, READY_MESSAGE};

use crate::content::{ContentHandle, LocalFile};
use crate::selection::SelectionFlow;
use crate::ui;
use crate::worker::{InstallWorker, WorkerEvent};
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Interactive sideload application
pub struct App {
    state: AppState,
    selection: SelectionFlow,
    worker: InstallWorker,
    events: Receiver<WorkerEvent>,
    prefill_apk: Option<PathBuf>,
    prefill_obb: Option<PathBuf>,
}

impl App {
    pub fn new(
        worker: InstallWorker,
        events: Receiver<WorkerEvent>,
        prefill_apk: Option<PathBuf>,
        prefill_obb: Option<PathBuf>,
    ) -> Self {
        Self {
            state: AppState::default(),
            selection: SelectionFlow::new(),
            worker,
            events,
            prefill_apk,
            prefill_obb,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Main loop; returns when the user quits.
    pub fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    ) -> anyhow::Result<()> {
        info!("Starting main application loop");

        loop {
            self.poll_worker_events();

            terminal.draw(|f| ui::render(f, &self.state))?;

            if crossterm::event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = crossterm::event::read()? {
                    if key.kind == KeyEventKind::Press && self.handle_key_event(key) {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Apply every event the worker has delivered so far.
    pub fn poll_worker_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    warn!("Install worker event channel closed");
                    break;
                }
            }
        }
    }

    /// Block until the current run reports ready or `timeout` passes.
    ///
    /// Returns true if the app is ready again.
    pub fn wait_for_ready(&mut self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        while self.state.mode == AppMode::Running {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                return false;
            }
            match self.events.recv_timeout(remaining) {
                Ok(event) => self.apply_event(event),
                Err(_) => return false,
            }
        }
        true
    }

    pub fn apply_event(&mut self, event: WorkerEvent) {
        debug!("Worker event: {:?}", event);
        match event {
            WorkerEvent::StateChanged { state, .. } => {
                self.state.stage = state;
                self.state.status_message = state.description().to_string();
                if state == crate::pipeline_state::PipelineState::Succeeded {
                    self.state.last_result = Some(LastResult::Dispatched);
                    self.state.push_log("Installer launched");
                }
            }
            WorkerEvent::Failed { message, .. } => {
                self.state.push_log(message.clone());
                self.state.last_result = Some(LastResult::Failed(message));
            }
            WorkerEvent::Ready { run } => {
                if self.state.current_run.is_some_and(|current| current != run) {
                    debug!("Ready for stale run {}", run);
                }
                self.state.reset();
            }
        }
    }

    /// Handle a key press. Returns true when the app should exit.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return self.request_quit();
        }

        match self.state.mode {
            AppMode::Ready => match key.code {
                KeyCode::Enter | KeyCode::Char('a') => {
                    self.press_trigger();
                    false
                }
                KeyCode::Char('q') | KeyCode::Esc => self.request_quit(),
                _ => false,
            },
            AppMode::Prompt(target) => {
                match key.code {
                    KeyCode::Esc => {
                        self.selection.cancel();
                        self.state.reset();
                        self.state.push_log("Selection cancelled");
                    }
                    KeyCode::Enter => self.submit_prompt(target),
                    KeyCode::Backspace => {
                        self.state.input.pop();
                    }
                    KeyCode::Char(c) => self.state.input.push(c),
                    _ => {}
                }
                false
            }
            AppMode::Running => {
                if matches!(key.code, KeyCode::Char('q') | KeyCode::Esc) {
                    return self.request_quit();
                }
                false
            }
        }
    }

    fn request_quit(&mut self) -> bool {
        if self.worker.is_busy() {
            self.state
                .push_log("Wait for the current installation to finish before quitting");
            return false;
        }
        true
    }

    /// "Add game": start a new selection unless a run is in flight.
    fn press_trigger(&mut self) {
        if !self.state.trigger_enabled || self.worker.is_busy() {
            debug!("Trigger pressed while disabled");
            return;
        }
        match self.selection.begin() {
            Ok(stage) => {
                self.state.stage = stage;
                self.open_prompt(PromptTarget::Archive);
            }
            Err(e) => warn!("Could not start selection: {}", e),
        }
    }

    fn open_prompt(&mut self, target: PromptTarget) {
        let prefill = match target {
            PromptTarget::Archive => self.prefill_apk.as_deref(),
            PromptTarget::Blob => self.prefill_obb.as_deref(),
        };
        self.state.mode = AppMode::Prompt(target);
        self.state.input = prefill
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.state.status_message = self.state.stage.description().to_string();
    }

    fn submit_prompt(&mut self, target: PromptTarget) {
        let input = self.state.input.trim().to_string();
        if input.is_empty() {
            return;
        }
        let path = Path::new(&input);
        if !path.is_file() {
            self.state.status_message = format!("File not found: {}", input);
            return;
        }
        let handle: Box<dyn ContentHandle> = Box::new(LocalFile::new(path));

        match target {
            PromptTarget::Archive => match self.selection.supply_archive(handle) {
                Ok(stage) => {
                    self.state.stage = stage;
                    self.open_prompt(PromptTarget::Blob);
                }
                Err(e) => self.abort_selection(e.to_string()),
            },
            PromptTarget::Blob => match self.selection.supply_blob(handle) {
                Ok(selection) => match self.worker.submit(selection) {
                    Ok(run) => {
                        info!("Submitted run {}", run);
                        self.state.mode = AppMode::Running;
                        self.state.trigger_enabled = false;
                        self.state.current_run = Some(run);
                        self.state.input.clear();
                        self.state.status_message = "Processing game files...".to_string();
                    }
                    Err(e) => self.abort_selection(e.to_string()),
                },
                Err(e) => self.abort_selection(e.to_string()),
            },
        }
    }

    fn abort_selection(&mut self, message: String) {
        warn!("Selection aborted: {}", message);
        self.selection.cancel();
        self.state.reset();
        self.state.push_log(message);
    }
}
