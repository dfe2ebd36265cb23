use screen_sieve_common::frame::Frame;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::source::FrameSource;

const MIN_SLEEP: Duration = Duration::from_micros(500);

#[derive(Debug, Clone)]
pub struct ProducerConfig {
    pub fps: f64,
    /// Longest sleep between cancellation checks.
    pub poll_interval: Duration,
}

impl ProducerConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProducerStats {
    pub captured: u64,
    pub enqueued: u64,
    /// Frames discarded because the queue was full.
    pub dropped: u64,
    pub failed: u64,
}

/// Spawn the producer on the blocking pool. Capture APIs are synchronous,
/// so the loop owns a dedicated thread for the lifetime of the session.
pub fn spawn_producer(
    source: Box<dyn FrameSource>,
    frame_tx: mpsc::Sender<Frame>,
    cancel: watch::Receiver<bool>,
    session_start: Instant,
    config: ProducerConfig,
) -> tokio::task::JoinHandle<ProducerStats> {
    tokio::task::spawn_blocking(move || {
        run_producer(source, frame_tx, cancel, session_start, config)
    })
}

/// Grab frames at most once per frame interval until cancelled.
///
/// Each frame is tagged with seconds since `session_start`. A full queue
/// drops the new frame instead of blocking, and grab failures are skipped,
/// so the capture cadence never stalls on the writer or a bad grab.
pub fn run_producer(
    mut source: Box<dyn FrameSource>,
    frame_tx: mpsc::Sender<Frame>,
    cancel: watch::Receiver<bool>,
    session_start: Instant,
    config: ProducerConfig,
) -> ProducerStats {
    let interval = config.frame_interval();
    let mut stats = ProducerStats::default();
    let mut last_capture: Option<Instant> = None;
    let mut seq: u64 = 0;

    info!(
        source = source.name(),
        fps = config.fps,
        interval_ms = interval.as_millis() as u64,
        "capture producer started"
    );

    while !*cancel.borrow() {
        let now = Instant::now();
        let since_last = last_capture.map(|t| now.duration_since(t));

        if let Some(since) = since_last.filter(|since| *since < interval) {
            let wait = ((interval - since) / 2).min(config.poll_interval).max(MIN_SLEEP);
            std::thread::sleep(wait);
            continue;
        }

        last_capture = Some(now);
        let pixels = match source.grab() {
            Ok(p) => p,
            Err(e) => {
                stats.failed += 1;
                warn!(error = %e, failed = stats.failed, "frame grab failed, skipping");
                continue;
            }
        };
        // Tagged with the tick, not grab completion: ticks are at least one
        // interval apart, so slow grabs cannot squeeze two frames into one name.
        let captured_at = now.duration_since(session_start).as_secs_f64();
        stats.captured += 1;

        match frame_tx.try_send(Frame::new(pixels, captured_at, seq)) {
            Ok(()) => {
                stats.enqueued += 1;
                seq += 1;
            }
            Err(TrySendError::Full(_)) => {
                stats.dropped += 1;
                debug!(captured_at, dropped = stats.dropped, "frame queue full, dropping frame");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("frame queue closed, stopping producer");
                break;
            }
        }
    }

    info!(
        captured = stats.captured,
        enqueued = stats.enqueued,
        dropped = stats.dropped,
        failed = stats.failed,
        "capture producer stopped"
    );
    stats
}
