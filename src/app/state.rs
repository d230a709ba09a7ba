//! Application state definitions

use crate::pipeline_state::PipelineState;
use crate::worker::RunId;

/// Status text shown whenever the app is ready for a new run
pub const READY_MESSAGE: &str = "Ready to install your classic games";

/// Maximum number of lines kept in the activity log
pub const MAX_LOG_LINES: usize = 100;

/// Which artifact the path prompt is asking for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTarget {
    Archive,
    Blob,
}

impl PromptTarget {
    pub fn label(self) -> &'static str {
        match self {
            Self::Archive => "APK file",
            Self::Blob => "OBB file",
        }
    }
}

/// Application operating modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppMode {
    /// Waiting for the user to press the trigger
    Ready,
    /// Asking for a file path
    Prompt(PromptTarget),
    /// A run is on the worker; the trigger is disabled
    Running,
}

/// Outcome of the most recent run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastResult {
    Dispatched,
    Failed(String),
}

/// Main application state
#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: AppMode,
    /// Status line for user feedback
    pub status_message: String,
    /// Stage shown by the progress gauge
    pub stage: PipelineState,
    /// Text typed into the path prompt
    pub input: String,
    /// Whether the "Add game" trigger accepts presses
    pub trigger_enabled: bool,
    pub current_run: Option<RunId>,
    pub last_result: Option<LastResult>,
    /// Recent notifications, oldest first
    pub log: Vec<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Ready,
            status_message: READY_MESSAGE.to_string(),
            stage: PipelineState::Idle,
            input: String::new(),
            trigger_enabled: true,
            current_run: None,
            last_result: None,
            log: Vec::new(),
        }
    }
}

impl AppState {
    pub fn push_log(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
        if self.log.len() > MAX_LOG_LINES {
            let excess = self.log.len() - MAX_LOG_LINES;
            self.log.drain(..excess);
        }
    }

    /// Restore the ready indication after a run or a cancelled selection
    pub fn reset(&mut self) {
        self.mode = AppMode::Ready;
        self.status_message = READY_MESSAGE.to_string();
        self.stage = PipelineState::Idle;
        self.input.clear();
        self.trigger_enabled = true;
        self.current_run = None;
    }

    /// Gauge value; the last stage reached stays visible until reset
    pub fn progress_percent(&self) -> u8 {
        self.stage.progress_percent()
    }
}
