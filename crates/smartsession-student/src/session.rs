//! Student session lifecycle, run on the tokio runtime thread.
//!
//! ```text
//! Webcam::open ──► FrameSource ──┬──► CaptureLoop (250 ms) ──► ClientHandle ──► server
//!                                └──► preview ticker ──► GuiState.preview
//! server ──► ClientEvent<StudentInbound> ──► StudentView::apply ──► repaint
//! ```

use std::sync::Arc;
use std::time::Duration;

use smartsession_capture::{CaptureConfig, CaptureLoop, FrameSource, Webcam};
use smartsession_client::{ClientEvent, MessageClient};
use smartsession_core::{ClientConfig, ConnectionStatus, FrameSink, StudentIdentity, StudentInbound};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::state::{lock, SharedState};

const PREVIEW_INTERVAL: Duration = Duration::from_millis(66);

/// Runs until `shutdown_rx` fires or its sender is dropped (window closed),
/// then releases the camera and closes the socket.
pub async fn run(
    state: SharedState,
    ctx: egui::Context,
    config: ClientConfig,
    identity: StudentIdentity,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    // ── 1. Camera ─────────────────────────────────────────────────────────
    let capture_cfg = CaptureConfig::from(&config);
    let open_cfg = capture_cfg.clone();
    let camera: Option<Arc<dyn FrameSource>> =
        match tokio::task::spawn_blocking(move || Webcam::open(&open_cfg)).await {
            Ok(Ok(cam)) => {
                lock(&state).push_log("Camera opened");
                Some(Arc::new(cam))
            }
            Ok(Err(e)) => {
                error!("Error accessing webcam: {}", e);
                let mut s = lock(&state);
                s.view.camera_failed();
                s.push_log(format!("[ERROR] Camera: {e}"));
                None
            }
            Err(e) => {
                error!("Camera open task failed: {}", e);
                let mut s = lock(&state);
                s.view.camera_failed();
                s.push_log(format!("[ERROR] Camera: {e}"));
                None
            }
        };
    {
        let mut s = lock(&state);
        s.camera_active = camera.is_some();
    }
    ctx.request_repaint();

    // ── 2. Connection ─────────────────────────────────────────────────────
    let endpoint = config.student_endpoint(&identity.id);
    lock(&state).push_log(format!("Connecting to {endpoint}…"));
    let (handle, mut events) = MessageClient::connect::<StudentInbound>(&endpoint);

    // ── 3. Capture loop ───────────────────────────────────────────────────
    let capture = camera.as_ref().map(|source| {
        let sink: Arc<dyn FrameSink> = Arc::new(handle.clone());
        CaptureLoop::spawn(Arc::clone(source), sink, identity.clone(), &capture_cfg)
    });

    // ── 4. Event loop ─────────────────────────────────────────────────────
    let mut preview_ticker = tokio::time::interval(PREVIEW_INTERVAL);
    preview_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Session teardown requested");
                break;
            }

            maybe_ev = events.recv(), if events_open => {
                let mut s = lock(&state);
                match maybe_ev {
                    Some(ClientEvent::Status(status)) => {
                        let line = match &status {
                            ConnectionStatus::Error(reason) => format!("[ERROR] Connection: {reason}"),
                            other => format!("Connection: {other}"),
                        };
                        if s.view.set_status(status) {
                            s.push_log(line);
                        }
                    }
                    Some(ClientEvent::Message(msg)) => {
                        s.view.apply(msg);
                    }
                    None => {
                        // Terminal: no reconnect. Keep the camera preview alive.
                        events_open = false;
                        s.push_log("[WARN] Connection ended; restart to reconnect");
                    }
                }
                drop(s);
                ctx.request_repaint();
            }

            _ = preview_ticker.tick(), if camera.is_some() => {
                let Some(source) = camera.as_ref() else { continue };
                let source_seq = source.frame_seq();
                // Only clone a frame the GUI has not seen yet.
                let frame = if lock(&state).wants_preview(source_seq) {
                    source.latest_frame()
                } else {
                    None
                };
                let frames_sent = capture.as_ref().map(|c| c.frames_sent());
                let mut s = lock(&state);
                let mut changed = false;
                if let Some(frame) = frame {
                    s.set_preview(frame, source_seq);
                    changed = true;
                }
                if let Some(sent) = frames_sent {
                    changed |= s.frames_sent != sent;
                    s.frames_sent = sent;
                }
                drop(s);
                if changed {
                    ctx.request_repaint();
                }
            }
        }
    }

    // ── Teardown ──────────────────────────────────────────────────────────
    if let Some(c) = &capture {
        c.stop();
    }
    handle.close();
    if let Some(cam) = camera.clone() {
        // Joins the camera thread; keep it off the runtime.
        if let Err(e) = tokio::task::spawn_blocking(move || cam.stop()).await {
            warn!("Camera stop task failed: {}", e);
        }
    }
    // Give the socket task a moment to flush the close frame.
    if tokio::time::timeout(Duration::from_millis(500), async {
        while events.recv().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Socket did not close within 500 ms");
    }
    info!("Student session {} ended", identity.id);
}
