//! Stand-in used when built without the `webcam` feature.

use image::RgbImage;
use smartsession_core::SessionError;

use crate::{CaptureConfig, FrameSource};

pub struct Webcam {
    _private: (),
}

impl Webcam {
    pub fn open(config: &CaptureConfig) -> Result<Self, SessionError> {
        tracing::warn!(
            "Webcam::open stub: built without the `webcam` feature ({}x{} requested)",
            config.width, config.height
        );
        Err(SessionError::CameraUnavailable {
            reason: "built without the `webcam` feature".to_owned(),
        })
    }
}

impl FrameSource for Webcam {
    fn latest_frame(&self) -> Option<RgbImage> {
        None
    }

    fn frame_seq(&self) -> u64 {
        0
    }

    fn stop(&self) {}
}
