use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use smartsession_core::TeacherRoster;

const MAX_LOG_LINES: usize = 300;

// ── GuiState ──────────────────────────────────────────────────────────────────

pub struct GuiState {
    pub class_id: String,
    pub roster:   TeacherRoster,
    pub logs:     VecDeque<String>,
}

impl GuiState {
    pub fn new(class_id: impl Into<String>) -> Self {
        Self {
            class_id: class_id.into(),
            roster:   TeacherRoster::new(),
            logs:     VecDeque::new(),
        }
    }

    /// Append a line to the circular log buffer.
    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!("[GUI log] {}", line);
        if self.logs.len() >= MAX_LOG_LINES {
            self.logs.pop_front();
        }
        self.logs.push_back(line);
    }
}

/// Shared handle passed between the GUI thread and the async receiver task.
pub type SharedState = Arc<Mutex<GuiState>>;

/// Lock the shared state, recovering from a poisoned mutex.
pub fn lock(state: &SharedState) -> MutexGuard<'_, GuiState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
