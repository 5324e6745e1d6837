//! smartsession-capture: student-side frame capture.
//!
//! # Pipeline
//!
//! ```text
//! Webcam (nokhwa, background thread)
//!   │  latest RGB frame
//!   ▼
//! CaptureLoop  ── every 250 ms ──►  mirror_horizontal
//!                                        │
//!                                   JPEG q=60 → data:image/jpeg;base64,…
//!                                        │
//!                                        ▼
//!                                   FrameSink (WebSocket client)
//! ```
//!
//! A cycle is skipped when the sink is not open or the source has not
//! produced a decodable frame yet. Skipped cycles are not retried.
//!
//! # Backends
//!
//! | Backend | Feature | Notes |
//! |---------|---------|-------|
//! | nokhwa native input | `webcam` | first device, 640×480 requested |
//! | stub | default | reports the camera as unavailable |

pub mod capture_loop;
pub mod codec;

use image::RgbImage;
use smartsession_core::ClientConfig;

pub use capture_loop::{capture_tick, CaptureLoop, TickOutcome};
pub use codec::{
    decode_jpeg_base64, decode_thumbnail, encode_jpeg, encode_jpeg_data_uri, mirror_horizontal,
    CodecError, JPEG_DATA_URI_PREFIX,
};

/// A camera-like source of RGB frames.
pub trait FrameSource: Send + Sync {
    /// Most recent decodable frame, or `None` while the device is warming up.
    fn latest_frame(&self) -> Option<RgbImage>;

    /// Number of frames produced so far. Unchanged means `latest_frame`
    /// would return the same image as last time.
    fn frame_seq(&self) -> u64;

    /// Release the device. Further calls to `latest_frame` return `None`.
    fn stop(&self);
}

/// Capture parameters for one student session.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub width:  u32,
    pub height: u32,
    pub interval: std::time::Duration,
    pub jpeg_quality: u8,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for CaptureConfig {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            width:  cfg.capture_width,
            height: cfg.capture_height,
            interval: cfg.capture_interval(),
            jpeg_quality: cfg.jpeg_quality,
        }
    }
}

/// Join `handle`, giving up after `timeout`. Returns `false` if the thread
/// was still running and got detached.
#[cfg_attr(not(feature = "webcam"), allow(dead_code))]
pub(crate) fn join_within(handle: std::thread::JoinHandle<()>, timeout: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while !handle.is_finished() {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    if handle.join().is_err() {
        tracing::warn!("Joined thread had panicked");
    }
    true
}

// ── Platform split ─────────────────────────────────────────────────────────────

#[cfg(feature = "webcam")]
mod webcam;
#[cfg(feature = "webcam")]
pub use webcam::Webcam;

#[cfg(not(feature = "webcam"))]
mod stub;
#[cfg(not(feature = "webcam"))]
pub use stub::Webcam;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn join_within_waits_for_a_finishing_thread() {
        let done = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&done);
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            flag.store(true, Ordering::SeqCst);
        });
        assert!(join_within(handle, Duration::from_secs(2)));
        assert!(done.load(Ordering::SeqCst));
    }

    #[test]
    fn join_within_gives_up_on_a_stuck_thread() {
        let release = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&release);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
        });
        assert!(!join_within(handle, Duration::from_millis(50)));
        release.store(true, Ordering::SeqCst);
    }
}
