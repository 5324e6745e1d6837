use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use image::RgbImage;
use smartsession_core::{StudentIdentity, StudentView};

const MAX_LOG_LINES: usize = 300;

// ── GuiState ──────────────────────────────────────────────────────────────────

pub struct GuiState {
    pub view:          StudentView,
    /// Latest un-mirrored camera frame for the self-view.
    pub preview:       Option<Arc<RgbImage>>,
    /// Bumped whenever `preview` is replaced.
    pub preview_seq:   u64,
    /// `FrameSource::frame_seq` of the frame in `preview`.
    pub source_seq:    u64,
    pub frames_sent:   u64,
    pub camera_active: bool,
    pub logs:          VecDeque<String>,
}

impl GuiState {
    pub fn new(identity: StudentIdentity) -> Self {
        Self {
            view:          StudentView::new(identity),
            preview:       None,
            preview_seq:   0,
            source_seq:    0,
            frames_sent:   0,
            camera_active: false,
            logs:          VecDeque::new(),
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

    /// Whether the source has produced a frame newer than the one shown.
    pub fn wants_preview(&self, source_seq: u64) -> bool {
        self.preview.is_none() || source_seq != self.source_seq
    }

    pub fn set_preview(&mut self, frame: RgbImage, source_seq: u64) {
        self.preview = Some(Arc::new(frame));
        self.preview_seq += 1;
        self.source_seq = source_seq;
    }
}

/// Shared handle passed between the GUI thread and the async session task.
pub type SharedState = Arc<Mutex<GuiState>>;

/// Lock the shared state, recovering from a poisoned mutex.
pub fn lock(state: &SharedState) -> MutexGuard<'_, GuiState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}
