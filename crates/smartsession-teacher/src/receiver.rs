//! Teacher connection task: telemetry and forwarded frames into the roster.

use bytes::Bytes;
use smartsession_capture::decode_thumbnail;
use smartsession_client::{ClientEvent, MessageClient};
use smartsession_core::{ClientConfig, ConnectionStatus, TeacherInbound, TelemetryData};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::state::{lock, GuiState, SharedState};

/// Widest thumbnail kept per student card.
const THUMBNAIL_WIDTH: u32 = 240;

// ── Entry point (called from the tokio runtime thread) ─────────────────────────

/// Runs until the server closes the socket or `shutdown_rx` fires.
/// There is no reconnect; a new dashboard session is needed after a drop.
pub async fn run(
    state: SharedState,
    ctx: egui::Context,
    config: ClientConfig,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let endpoint = config.teacher_endpoint();
    lock(&state).push_log(format!("Connecting to {endpoint}…"));
    ctx.request_repaint();

    let (handle, mut events) = MessageClient::connect::<TeacherInbound>(&endpoint);
    let mut events_open = true;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Dashboard teardown requested");
                break;
            }

            maybe_ev = events.recv(), if events_open => {
                let Some(ev) = maybe_ev else {
                    events_open = false;
                    lock(&state).push_log("[WARN] Connection ended; restart to reconnect");
                    ctx.request_repaint();
                    continue;
                };
                // JPEG decoding runs on the blocking pool, outside the GUI lock.
                let update = if matches!(ev, ClientEvent::Message(TeacherInbound::StudentFrame { .. })) {
                    match tokio::task::spawn_blocking(move || prepare(ev)).await {
                        Ok(update) => update,
                        Err(e) => {
                            warn!("Thumbnail decode task failed: {}", e);
                            None
                        }
                    }
                } else {
                    prepare(ev)
                };
                if let Some(update) = update {
                    apply_update(&mut lock(&state), update);
                    ctx.request_repaint();
                }
            }
        }
    }

    handle.close();
    info!("Dashboard for {} closed", config.class_id);
}

/// Client event reduced to what the dashboard stores. Frames arrive here
/// already decoded so applying them under the lock is cheap.
#[derive(Debug)]
pub enum DashboardUpdate {
    Status(ConnectionStatus),
    Telemetry(TelemetryData),
    Thumbnail { student_id: String, width: u32, height: u32, rgba: Bytes },
}

/// Turn one client event into a [`DashboardUpdate`], decoding forwarded
/// frames to thumbnails. CPU-bound for `student_frame`.
pub fn prepare(event: ClientEvent<TeacherInbound>) -> Option<DashboardUpdate> {
    match event {
        ClientEvent::Status(status) => Some(DashboardUpdate::Status(status)),
        ClientEvent::Message(TeacherInbound::TelemetryUpdate { data }) => {
            Some(DashboardUpdate::Telemetry(data))
        }
        ClientEvent::Message(TeacherInbound::StudentFrame { student_id, image }) => {
            match decode_thumbnail(&image, THUMBNAIL_WIDTH) {
                Ok(rgba) => {
                    let (width, height) = rgba.dimensions();
                    Some(DashboardUpdate::Thumbnail {
                        student_id,
                        width,
                        height,
                        rgba: Bytes::from(rgba.into_raw()),
                    })
                }
                Err(e) => {
                    warn!("Dropping frame for {}: {}", student_id, e);
                    None
                }
            }
        }
        ClientEvent::Message(TeacherInbound::Unknown) => None,
    }
}

/// Fold one prepared update into the dashboard state.
pub fn apply_update(state: &mut GuiState, update: DashboardUpdate) {
    match update {
        DashboardUpdate::Status(status) => {
            let line = match &status {
                ConnectionStatus::Error(reason) => format!("[ERROR] Connection: {reason}"),
                other => format!("Connection: {other}"),
            };
            if state.roster.set_status(status) {
                state.push_log(line);
            }
        }
        DashboardUpdate::Telemetry(data) => state.roster.apply_telemetry(data),
        // Frames for students without telemetry are kept; the card shows
        // them once the first telemetry record arrives.
        DashboardUpdate::Thumbnail { student_id, width, height, rgba } => {
            state.roster.set_thumbnail(&student_id, width, height, rgba);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use smartsession_capture::encode_jpeg_data_uri;

    fn telemetry(id: &str, state: &str, score: f64) -> TelemetryData {
        TelemetryData {
            student_id: id.into(),
            name: format!("Student {id}"),
            state: state.into(),
            raw_state: None,
            engagement_score: score,
            confusion_index: 0.0,
            gaze: None,
            timestamp: None,
        }
    }

    fn handle(state: &mut GuiState, event: ClientEvent<TeacherInbound>) {
        if let Some(update) = prepare(event) {
            apply_update(state, update);
        }
    }

    #[test]
    fn telemetry_then_offline_removes_card() {
        let mut s = GuiState::new("CLASS_A");
        handle(&mut s, ClientEvent::Message(TeacherInbound::TelemetryUpdate { data: telemetry("S1", "Happy", 0.8) }));
        handle(&mut s, ClientEvent::Message(TeacherInbound::TelemetryUpdate { data: telemetry("S2", "Focused", 0.6) }));
        assert_eq!(s.roster.len(), 2);

        handle(&mut s, ClientEvent::Message(TeacherInbound::TelemetryUpdate { data: telemetry("S1", "OFFLINE", 0.0) }));
        let ids: Vec<_> = s.roster.students().map(|d| d.student_id.as_str()).collect();
        assert_eq!(ids, ["S2"]);
    }

    #[test]
    fn frame_is_decoded_without_dashboard_state() {
        let frame = RgbImage::from_pixel(640, 480, Rgb([10, 200, 30]));
        let uri = encode_jpeg_data_uri(&frame, 60).unwrap();
        let bare = uri.trim_start_matches(smartsession_capture::JPEG_DATA_URI_PREFIX).to_owned();

        // `prepare` takes no state, so the decode cannot run under the lock.
        let update = prepare(ClientEvent::Message(TeacherInbound::StudentFrame { student_id: "S1".into(), image: bare }));
        let Some(DashboardUpdate::Thumbnail { student_id, width, height, rgba }) = update else {
            panic!("expected a thumbnail, got {update:?}");
        };
        assert_eq!(student_id, "S1");
        assert_eq!((width, height), (THUMBNAIL_WIDTH, 180));
        assert_eq!(rgba.len(), (240 * 180 * 4) as usize);

        let mut s = GuiState::new("CLASS_A");
        apply_update(&mut s, DashboardUpdate::Thumbnail { student_id, width, height, rgba });
        let thumb = s.roster.thumbnail("S1").expect("thumbnail stored");
        assert_eq!((thumb.width, thumb.height), (THUMBNAIL_WIDTH, 180));
    }

    #[test]
    fn garbage_frame_is_dropped() {
        let update = prepare(ClientEvent::Message(TeacherInbound::StudentFrame { student_id: "S1".into(), image: "!!".into() }));
        assert!(update.is_none());
    }

    #[test]
    fn unknown_messages_prepare_to_nothing() {
        assert!(prepare(ClientEvent::Message(TeacherInbound::Unknown)).is_none());
    }

    #[test]
    fn status_changes_are_logged_once() {
        let mut s = GuiState::new("CLASS_A");
        handle(&mut s, ClientEvent::Status(ConnectionStatus::Connecting));
        handle(&mut s, ClientEvent::Status(ConnectionStatus::Connected));
        handle(&mut s, ClientEvent::Status(ConnectionStatus::Disconnected));
        assert_eq!(s.roster.status, ConnectionStatus::Disconnected);
        assert_eq!(s.logs.len(), 2);
        assert_eq!(s.logs.back().map(String::as_str), Some("Connection: DISCONNECTED"));
    }
}
