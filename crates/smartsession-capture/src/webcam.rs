//! Native webcam backend (nokhwa).
//!
//! The camera lives on a dedicated OS thread because nokhwa's `Camera` is not
//! `Send` on every platform. That thread keeps decoding frames into a
//! single-slot buffer; [`FrameSource::latest_frame`] clones whatever is there.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};
use smartsession_core::SessionError;
use tracing::{debug, info, warn};

use crate::{join_within, CaptureConfig, FrameSource};

/// Longest `stop` waits for the camera thread to release the device.
const STOP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Webcam {
    latest:  Arc<Mutex<Option<RgbImage>>>,
    seq:     Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread:  Mutex<Option<JoinHandle<()>>>,
}

impl Webcam {
    /// Open the first camera and start streaming. Blocks until the device is
    /// open (or has failed to open).
    pub fn open(config: &CaptureConfig) -> Result<Self, SessionError> {
        let latest = Arc::new(Mutex::new(None));
        let seq = Arc::new(AtomicU64::new(0));
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), SessionError>>(1);

        let (width, height) = (config.width, config.height);
        let slot = Arc::clone(&latest);
        let counter = Arc::clone(&seq);
        let flag = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name("smartsession-webcam".into())
            .spawn(move || camera_thread(width, height, slot, counter, flag, ready_tx))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self { latest, seq, running, thread: Mutex::new(Some(thread)) }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::CameraUnavailable {
                reason: "camera thread exited before opening".to_owned(),
            }),
        }
    }
}

impl FrameSource for Webcam {
    fn latest_frame(&self) -> Option<RgbImage> {
        if !self.running.load(Ordering::Relaxed) {
            return None;
        }
        self.latest.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn frame_seq(&self) -> u64 {
        self.seq.load(Ordering::Acquire)
    }

    /// Blocks until the camera thread has released the device, at most
    /// [`STOP_TIMEOUT`].
    fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            info!("Webcam stop requested");
        }
        let thread = self.thread.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(thread) = thread {
            if !join_within(thread, STOP_TIMEOUT) {
                warn!("Webcam thread did not exit within {:?}; detaching", STOP_TIMEOUT);
            }
        }
    }
}

impl Drop for Webcam {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_camera(width: u32, height: u32) -> Result<Camera, SessionError> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, 30),
    ));
    let mut camera = Camera::new(CameraIndex::Index(0), requested).map_err(map_open_error)?;
    camera.open_stream().map_err(map_open_error)?;
    Ok(camera)
}

fn map_open_error(e: NokhwaError) -> SessionError {
    let reason = e.to_string();
    if reason.to_ascii_lowercase().contains("permission") {
        SessionError::PermissionDenied { permission: format!("camera ({reason})") }
    } else {
        SessionError::CameraUnavailable { reason }
    }
}

fn camera_thread(
    width: u32,
    height: u32,
    latest: Arc<Mutex<Option<RgbImage>>>,
    seq: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    ready_tx: mpsc::SyncSender<Result<(), SessionError>>,
) {
    let mut camera = match open_camera(width, height) {
        Ok(c) => c,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let format = camera.camera_format();
    info!("Webcam open: {} ({:?})", camera.info().human_name(), format);
    let _ = ready_tx.send(Ok(()));

    while running.load(Ordering::Relaxed) {
        let frame = camera
            .frame()
            .and_then(|buffer| buffer.decode_image::<RgbFormat>());
        match frame {
            Ok(decoded) => {
                let (w, h) = (decoded.width(), decoded.height());
                match RgbImage::from_raw(w, h, decoded.into_raw()) {
                    Some(img) => {
                        *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(img);
                        seq.fetch_add(1, Ordering::Release);
                    }
                    None => debug!("Webcam frame size mismatch ({}x{})", w, h),
                }
            }
            Err(e) => {
                warn!("Webcam frame error: {}", e);
                std::thread::sleep(Duration::from_millis(50));
            }
        }
    }

    latest.lock().unwrap_or_else(|e| e.into_inner()).take();
    if let Err(e) = camera.stop_stream() {
        warn!("Webcam stop_stream: {}", e);
    }
    info!("Webcam released");
}
