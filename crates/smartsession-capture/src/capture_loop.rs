//! `CaptureLoop`: the student's sample → mirror → encode → send cycle.
//!
//! [`CaptureLoop::spawn`] runs one tokio task ticking at the configured
//! interval (250 ms by default). Each tick is a single [`capture_tick`]; its
//! outcome is logged and counted, never retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use smartsession_core::{FrameMessage, FrameSink, StudentIdentity};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::codec::{encode_jpeg_data_uri, mirror_horizontal};
use crate::{CaptureConfig, FrameSource};

/// Result of one capture cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Sent,
    /// The outbound channel is not open; nothing was sampled.
    ChannelClosed,
    /// The source has no decodable frame yet.
    SourceNotReady,
    EncodeFailed,
    SendFailed,
}

/// Run one cycle: sample, mirror, encode, send.
pub fn capture_tick(
    source: &dyn FrameSource,
    sink: &dyn FrameSink,
    identity: &StudentIdentity,
    jpeg_quality: u8,
) -> TickOutcome {
    if !sink.is_open() {
        return TickOutcome::ChannelClosed;
    }
    let Some(mut frame) = source.latest_frame() else {
        return TickOutcome::SourceNotReady;
    };

    mirror_horizontal(&mut frame);
    let image = match encode_jpeg_data_uri(&frame, jpeg_quality) {
        Ok(uri) => uri,
        Err(e) => {
            warn!("Frame encode failed: {}", e);
            return TickOutcome::EncodeFailed;
        }
    };

    match sink.send_frame(FrameMessage::new(identity, image, ts_ms())) {
        Ok(()) => TickOutcome::Sent,
        Err(e) => {
            debug!("Frame send failed: {}", e);
            TickOutcome::SendFailed
        }
    }
}

// ── CaptureLoop ───────────────────────────────────────────────────────────────

/// Handle to a running capture task. Dropping it stops the task.
pub struct CaptureLoop {
    stop_tx:     mpsc::Sender<()>,
    frames_sent: Arc<AtomicU64>,
}

impl CaptureLoop {
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        sink: Arc<dyn FrameSink>,
        identity: StudentIdentity,
        config: &CaptureConfig,
    ) -> Self {
        let (stop_tx, stop_rx) = mpsc::channel::<()>(1);
        let frames_sent = Arc::new(AtomicU64::new(0));

        tokio::spawn(run_loop(
            source,
            sink,
            identity,
            config.clone(),
            stop_rx,
            Arc::clone(&frames_sent),
        ));

        Self { stop_tx, frames_sent }
    }

    /// Request stop (non-blocking).
    pub fn stop(&self) {
        let _ = self.stop_tx.try_send(());
    }

    /// Frames handed to the sink since start.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }
}

async fn run_loop(
    source: Arc<dyn FrameSource>,
    sink: Arc<dyn FrameSink>,
    identity: StudentIdentity,
    config: CaptureConfig,
    mut stop_rx: mpsc::Receiver<()>,
    frames_sent: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    info!(
        "Capture loop started for {} every {:?} (q={})",
        identity.id, config.interval, config.jpeg_quality
    );

    let mut last_outcome = None;
    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = ticker.tick() => {
                let outcome = capture_tick(source.as_ref(), sink.as_ref(), &identity, config.jpeg_quality);
                if outcome == TickOutcome::Sent {
                    frames_sent.fetch_add(1, Ordering::Relaxed);
                }
                // Only log changes so an idle source does not flood the log.
                if last_outcome != Some(outcome) {
                    debug!("Capture tick: {:?}", outcome);
                    last_outcome = Some(outcome);
                }
            }
        }
    }

    info!(
        "Capture loop stopped for {} ({} frames sent)",
        identity.id,
        frames_sent.load(Ordering::Relaxed)
    );
}

fn ts_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;
    use std::time::Duration;

    use image::{Rgb, RgbImage};
    use smartsession_core::SessionError;

    use crate::codec::{decode_jpeg_base64, JPEG_DATA_URI_PREFIX};

    struct FakeSource {
        frame: Mutex<Option<RgbImage>>,
    }

    impl FakeSource {
        fn ready() -> Self {
            let mut img = RgbImage::from_pixel(8, 8, Rgb([0, 0, 0]));
            // Bright left half; mirrored it should end up on the right.
            for y in 0..8 {
                for x in 0..4 {
                    img.put_pixel(x, y, Rgb([255, 255, 255]));
                }
            }
            Self { frame: Mutex::new(Some(img)) }
        }

        fn warming_up() -> Self {
            Self { frame: Mutex::new(None) }
        }
    }

    impl FrameSource for FakeSource {
        fn latest_frame(&self) -> Option<RgbImage> {
            self.frame.lock().unwrap().clone()
        }

        fn frame_seq(&self) -> u64 {
            u64::from(self.frame.lock().unwrap().is_some())
        }

        fn stop(&self) {
            self.frame.lock().unwrap().take();
        }
    }

    struct FakeSink {
        open: AtomicBool,
        sent: Mutex<Vec<FrameMessage>>,
    }

    impl FakeSink {
        fn new(open: bool) -> Self {
            Self { open: AtomicBool::new(open), sent: Mutex::new(Vec::new()) }
        }

        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl FrameSink for FakeSink {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }

        fn send_frame(&self, frame: FrameMessage) -> Result<(), SessionError> {
            self.sent.lock().unwrap().push(frame);
            Ok(())
        }
    }

    fn identity() -> StudentIdentity {
        StudentIdentity::new("AB12C", "Student 42")
    }

    fn config() -> CaptureConfig {
        CaptureConfig { interval: Duration::from_millis(250), ..CaptureConfig::default() }
    }

    #[test]
    fn tick_sends_mirrored_tagged_frame() {
        let source = FakeSource::ready();
        let sink = FakeSink::new(true);
        assert_eq!(capture_tick(&source, &sink, &identity(), 90), TickOutcome::Sent);

        let sent = sink.sent.lock().unwrap();
        let msg = &sent[0];
        assert_eq!(msg.student_id, "AB12C");
        assert_eq!(msg.name, "Student 42");
        assert!(msg.image.starts_with(JPEG_DATA_URI_PREFIX));
        assert!(msg.timestamp > 0);

        let decoded = decode_jpeg_base64(&msg.image).unwrap();
        assert!(decoded.get_pixel(1, 4)[0] < 64, "left side should be dark after mirroring");
        assert!(decoded.get_pixel(6, 4)[0] > 192, "right side should be bright after mirroring");
    }

    #[test]
    fn tick_skips_when_closed_or_not_ready() {
        let sink = FakeSink::new(false);
        assert_eq!(
            capture_tick(&FakeSource::ready(), &sink, &identity(), 60),
            TickOutcome::ChannelClosed
        );

        let sink = FakeSink::new(true);
        assert_eq!(
            capture_tick(&FakeSource::warming_up(), &sink, &identity(), 60),
            TickOutcome::SourceNotReady
        );
        assert_eq!(sink.count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn one_frame_per_interval_while_open() {
        let source = Arc::new(FakeSource::ready());
        let sink = Arc::new(FakeSink::new(true));
        let capture = CaptureLoop::spawn(source.clone(), sink.clone(), identity(), &config());

        // Ticks at 0, 250, 500, 750 and 1000 ms.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sink.count(), 5);
        assert_eq!(capture.frames_sent(), 5);

        sink.open.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.count(), 5);

        capture.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_sent_until_source_is_ready() {
        let source = Arc::new(FakeSource::warming_up());
        let sink = Arc::new(FakeSink::new(true));
        let capture = CaptureLoop::spawn(source.clone(), sink.clone(), identity(), &config());

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(sink.count(), 0);

        *source.frame.lock().unwrap() = FakeSource::ready().frame.into_inner().unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(sink.count(), 2);
        assert_eq!(capture.frames_sent(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_stops_loop() {
        let source = Arc::new(FakeSource::ready());
        let sink = Arc::new(FakeSink::new(true));
        let capture = CaptureLoop::spawn(source.clone(), sink.clone(), identity(), &config());
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(capture);

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(sink.count(), 1);
    }
}
