use screen_sieve_capture::producer::{spawn_producer, ProducerConfig, ProducerStats};
use screen_sieve_capture::source::{open_source, FrameSource};
use screen_sieve_capture::writer::{run_writer, WriterConfig, WriterStats};
use screen_sieve_capture::{frame_queue, CaptureError};
use screen_sieve_common::config::Config;
use screen_sieve_common::frame::identifier_for;
use screen_sieve_dedup::grouping::HashRecord;
use screen_sieve_dedup::{DedupEngine, DedupError, DedupOutcome};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::report::{write_report_file, CycleReport, SessionTotals};
use crate::storage::{open_sink, session_label, FrameSink, StorageError, StorageRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
    Stopping,
    Stopped,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Stopped => "stopped",
        }
    }
}

/// Totals handed back when a session stops.
#[derive(Debug, Clone)]
pub struct SessionSummary {
    pub session_id: String,
    pub producer: ProducerStats,
    pub writer: WriterStats,
    pub dedup: SessionTotals,
    /// Whether the working directory was removed after the final flush.
    pub work_dir_removed: bool,
}

/// Owns one capture session: producer, writer and the periodic dedup task.
///
/// ```text
/// Idle --start--> Running --stop--> Stopping --> Stopped
/// ```
///
/// A failed `start` leaves the session `Idle`.
pub struct CaptureSession {
    config: Config,
    session_id: String,
    state: SessionState,
    cancel_tx: watch::Sender<bool>,
    tasks: Option<SessionTasks>,
}

struct SessionTasks {
    producer: JoinHandle<ProducerStats>,
    writer: JoinHandle<WriterStats>,
    dedup: JoinHandle<()>,
    worker: Arc<DedupWorker>,
}

impl CaptureSession {
    pub fn new(config: Config) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        Self {
            config,
            session_id: session_label(),
            state: SessionState::Idle,
            cancel_tx,
            tasks: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn work_dir(&self) -> &Path {
        &self.config.capture.output_dir
    }

    /// Acquire the configured frame source and storage, then start.
    ///
    /// The working directory is created before storage is opened, so a bad
    /// working directory leaves no archive behind.
    pub async fn start(&mut self) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle)?;
        let source = open_source(&self.config.capture)?;
        self.prepare_work_dir()?;
        let sink = open_sink(&self.config.storage, &self.session_id).await?;
        self.start_with(source, sink)
    }

    /// Start with an already acquired source and sink.
    pub fn start_with(
        &mut self,
        source: Box<dyn FrameSource>,
        sink: Arc<dyn FrameSink>,
    ) -> Result<(), SessionError> {
        self.expect_state(SessionState::Idle)?;
        let work_dir = self.prepare_work_dir()?;

        let capture = &self.config.capture;

        let poll_interval = Duration::from_millis(capture.poll_interval_ms);
        let (frame_tx, frame_rx) = frame_queue(capture.queue_capacity);
        let cancel_rx = self.cancel_tx.subscribe();
        let session_start = Instant::now();

        let producer = spawn_producer(
            source,
            frame_tx,
            cancel_rx.clone(),
            session_start,
            ProducerConfig {
                fps: capture.fps,
                poll_interval,
            },
        );

        let writer = tokio::spawn(run_writer(
            frame_rx,
            cancel_rx.clone(),
            WriterConfig {
                output_dir: work_dir.clone(),
                jpeg_quality: capture.jpeg_quality,
                poll_interval,
            },
        ));

        let worker = Arc::new(DedupWorker::new(
            DedupEngine::from_config(&self.config.dedup),
            work_dir.clone(),
            sink,
            self.config.storage.batch_size,
            self.session_id.clone(),
            self.config.session.report_path.clone(),
        ));
        let dedup = tokio::spawn(run_dedup_loop(
            Arc::clone(&worker),
            Duration::from_secs(self.config.dedup.interval_secs),
            cancel_rx,
        ));

        self.tasks = Some(SessionTasks {
            producer,
            writer,
            dedup,
            worker,
        });
        self.state = SessionState::Running;

        info!(
            session = self.session_id,
            dir = %work_dir.display(),
            fps = capture.fps,
            interval_secs = self.config.dedup.interval_secs,
            threshold = self.config.dedup.threshold,
            policy = self.config.dedup.policy.as_str(),
            "capture session started"
        );
        Ok(())
    }

    /// Stop all units, flush what is left and release storage.
    ///
    /// Joins in dependency order: the producer stops feeding, the writer
    /// drains the queue, and an in-flight dedup cycle finishes. The working
    /// directory is only removed when the final flush handed everything off.
    pub async fn stop(&mut self) -> Result<SessionSummary, SessionError> {
        self.expect_state(SessionState::Running)?;
        let tasks = self
            .tasks
            .take()
            .ok_or(SessionError::InvalidState {
                expected: SessionState::Running,
                actual: self.state,
            })?;

        self.state = SessionState::Stopping;
        self.cancel_tx.send_replace(true);
        info!(session = self.session_id, "stopping capture session");

        let producer = tasks.producer.await.unwrap_or_else(|e| {
            error!(error = %e, "producer task failed");
            ProducerStats::default()
        });
        let writer = tasks.writer.await.unwrap_or_else(|e| {
            error!(error = %e, "writer task failed");
            WriterStats::default()
        });
        if let Err(e) = tasks.dedup.await {
            error!(error = %e, "dedup task failed");
        }

        let worker = tasks.worker;
        let flushed = if self.config.dedup.flush_on_stop {
            match worker.run_cycle().await {
                Ok(cycle) => {
                    cycle.log();
                    let clean = !cycle.handoff_failed && cycle.report.unreadable_images == 0;
                    if cycle.report.unreadable_images > 0 {
                        warn!(
                            unreadable = cycle.report.unreadable_images,
                            "unreadable frames left in working directory"
                        );
                    }
                    clean
                }
                Err(e) => {
                    warn!(error = %e, "final flush failed");
                    false
                }
            }
        } else {
            false
        };

        if let Err(e) = worker.sink.close().await {
            warn!(error = %e, sink = worker.sink.name(), "failed to close storage");
        }

        let work_dir_removed = if flushed {
            remove_work_dir(self.work_dir()).await
        } else {
            warn!(dir = %self.work_dir().display(), "keeping working directory");
            false
        };

        self.state = SessionState::Stopped;
        let dedup = worker.totals().await;
        worker.write_report(self.state).await;

        info!(
            session = self.session_id,
            captured = producer.captured,
            dropped = producer.dropped,
            written = writer.written,
            handed_off = dedup.handed_off,
            deleted = dedup.deleted,
            "capture session stopped"
        );

        Ok(SessionSummary {
            session_id: self.session_id.clone(),
            producer,
            writer,
            dedup,
            work_dir_removed,
        })
    }

    fn prepare_work_dir(&self) -> Result<PathBuf, SessionError> {
        let work_dir = self.config.capture.output_dir.clone();
        std::fs::create_dir_all(&work_dir)
            .map_err(|e| SessionError::WorkDir(work_dir.display().to_string(), e))?;
        Ok(work_dir)
    }

    fn expect_state(&self, expected: SessionState) -> Result<(), SessionError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(SessionError::InvalidState {
                expected,
                actual: self.state,
            })
        }
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        // Let detached units wind down if the session is dropped while running.
        self.cancel_tx.send_replace(true);
    }
}

async fn remove_work_dir(dir: &Path) -> bool {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            debug!(dir = %dir.display(), "removed working directory");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "failed to remove working directory");
            false
        }
    }
}

/// Runs dedup cycles over the working directory and hands representatives
/// to storage.
pub struct DedupWorker {
    engine: DedupEngine,
    dir: PathBuf,
    sink: Arc<dyn FrameSink>,
    batch_size: usize,
    session_id: String,
    report_path: Option<PathBuf>,
    // Also serializes cycles: the timer and the final flush never overlap.
    totals: Mutex<SessionTotals>,
}

impl DedupWorker {
    pub fn new(
        engine: DedupEngine,
        dir: PathBuf,
        sink: Arc<dyn FrameSink>,
        batch_size: usize,
        session_id: String,
        report_path: Option<PathBuf>,
    ) -> Self {
        Self {
            engine,
            dir,
            sink,
            batch_size: batch_size.max(1),
            session_id,
            report_path: report_path.filter(|p| !p.as_os_str().is_empty()),
            totals: Mutex::new(SessionTotals::default()),
        }
    }

    pub async fn totals(&self) -> SessionTotals {
        self.totals.lock().await.clone()
    }

    /// One scan, group, hand-off and cleanup pass.
    ///
    /// Files are deleted only after storage confirmed every representative.
    /// A hand-off failure is reported through `CycleReport::handoff_failed`
    /// and leaves every file in place for the next cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, CycleError> {
        let mut totals = self.totals.lock().await;

        let engine = self.engine.clone();
        let dir = self.dir.clone();
        let result = tokio::task::spawn_blocking(move || {
            engine.run_on_dir(&dir, &mut rand::thread_rng())
        })
        .await
        .map_err(|e| CycleError::Join(e.to_string()))
        .and_then(|r| r.map_err(CycleError::from));

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                totals.record_error();
                return Err(e);
            }
        };

        let cycle = if outcome.groups.is_empty() {
            CycleReport {
                report: outcome.report,
                ..CycleReport::empty()
            }
        } else {
            self.hand_off_and_clean(outcome).await
        };

        totals.record(&cycle);
        if let Some(path) = &self.report_path {
            write_report_file(path, &self.session_id, SessionState::Running.as_str(), &totals);
        }
        Ok(cycle)
    }

    async fn hand_off_and_clean(&self, outcome: DedupOutcome) -> CycleReport {
        let representatives: Vec<&HashRecord> = outcome.representatives().collect();
        let mut handed_off = 0;
        let mut handoff_failed = false;

        for chunk in representatives.chunks(self.batch_size) {
            match self.submit_batch(chunk).await {
                Ok(n) => handed_off += n,
                Err(e) => {
                    warn!(error = %e, sink = self.sink.name(), "storage hand-off failed");
                    handoff_failed = true;
                    break;
                }
            }
        }

        let deleted = if handoff_failed {
            0
        } else {
            let mut deleted = 0;
            for group in &outcome.groups {
                for member in group.members() {
                    if delete_frame(&member.image_id).await {
                        deleted += 1;
                    }
                }
            }
            deleted
        };

        CycleReport {
            report: outcome.report,
            handed_off,
            deleted,
            handoff_failed,
        }
    }

    /// Read and submit one batch. Any unconfirmed record fails the batch.
    async fn submit_batch(&self, chunk: &[&HashRecord]) -> Result<usize, StorageError> {
        let mut batch = Vec::with_capacity(chunk.len());
        for rep in chunk {
            let image_bytes = tokio::fs::read(&rep.image_id)
                .await
                .map_err(|e| StorageError::Put(format!("{}: {e}", rep.image_id.display())))?;
            batch.push(StorageRecord {
                image_bytes,
                captured_at: rep.captured_at.unwrap_or(0.0),
                identifier: identifier_for(&rep.image_id),
            });
        }

        let submitted = batch.len();
        let results = self.sink.submit(batch).await;
        if results.len() != submitted {
            return Err(StorageError::Put(format!(
                "storage confirmed {} of {submitted} records",
                results.len()
            )));
        }
        results.into_iter().collect::<Result<Vec<()>, _>>()?;
        debug!(count = submitted, "batch handed off");
        Ok(submitted)
    }

    async fn write_report(&self, state: SessionState) {
        if let Some(path) = &self.report_path {
            let totals = self.totals.lock().await;
            write_report_file(path, &self.session_id, state.as_str(), &totals);
        }
    }
}

async fn delete_frame(path: &Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "failed to delete frame");
            false
        }
    }
}

/// Run a cycle every `every` until cancelled. A cycle already running when
/// cancellation arrives completes first.
async fn run_dedup_loop(
    worker: Arc<DedupWorker>,
    every: Duration,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    while !*cancel.borrow() {
        tokio::select! {
            _ = ticker.tick() => {
                match worker.run_cycle().await {
                    Ok(cycle) => cycle.log(),
                    Err(e) => warn!(error = %e, "dedup cycle failed"),
                }
            }
            changed = cancel.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    debug!("dedup loop stopped");
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: SessionState,
        actual: SessionState,
    },
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("failed to prepare working directory {0}: {1}")]
    WorkDir(String, std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error(transparent)]
    Dedup(#[from] DedupError),
    #[error("dedup task panicked: {0}")]
    Join(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{Rgb, RgbImage};
    use screen_sieve_capture::source::TestPatternSource;
    use screen_sieve_common::config::SelectionPolicy;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct MemorySink {
        records: StdMutex<Vec<StorageRecord>>,
        closed: AtomicBool,
    }

    impl MemorySink {
        fn identifiers(&self) -> Vec<String> {
            self.records
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.identifier.clone())
                .collect()
        }
    }

    #[async_trait]
    impl FrameSink for MemorySink {
        async fn submit(&self, batch: Vec<StorageRecord>) -> Vec<Result<(), StorageError>> {
            let n = batch.len();
            self.records.lock().unwrap().extend(batch);
            (0..n).map(|_| Ok(())).collect()
        }

        async fn close(&self) -> Result<(), StorageError> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct RejectingSink;

    #[async_trait]
    impl FrameSink for RejectingSink {
        async fn submit(&self, batch: Vec<StorageRecord>) -> Vec<Result<(), StorageError>> {
            batch
                .iter()
                .map(|_| Err(StorageError::Put("bucket unavailable".into())))
                .collect()
        }
    }

    fn config(dir: &Path) -> Config {
        let mut config = Config::default();
        config.capture.output_dir = dir.join("frames");
        config.capture.fps = 10.0;
        config.capture.poll_interval_ms = 10;
        config.capture.width = 64;
        config.capture.height = 48;
        config.capture.scene_frames = 5;
        config.dedup.interval_secs = 1;
        config.dedup.policy = SelectionPolicy::First;
        config.storage.dir = dir.join("archive");
        config
    }

    fn source() -> Box<dyn FrameSource> {
        Box::new(TestPatternSource::new(64, 48, 5).unwrap())
    }

    fn gradient(width: u32, height: u32, falling: bool) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            let ramp = (x * 255 / (width - 1)) as u8;
            let v = if falling { 255 - ramp } else { ramp };
            Rgb([v, v, v])
        })
    }

    fn stripes(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            if (x * 9 / width) % 2 == 0 {
                Rgb([250, 250, 250])
            } else {
                Rgb([5, 5, 5])
            }
        })
    }

    /// Three near-identical frames followed by two distinct ones.
    fn prepare_scenario(dir: &Path) {
        std::fs::create_dir_all(dir).unwrap();
        gradient(90, 80, true).save(dir.join("frame_0.000.png")).unwrap();
        gradient(180, 160, true).save(dir.join("frame_0.100.png")).unwrap();
        gradient(45, 40, true).save(dir.join("frame_0.200.png")).unwrap();
        gradient(90, 80, false).save(dir.join("frame_0.300.png")).unwrap();
        stripes(90, 80).save(dir.join("frame_0.400.png")).unwrap();
    }

    fn worker(dir: &Path, sink: Arc<dyn FrameSink>, report: Option<PathBuf>) -> DedupWorker {
        DedupWorker::new(
            DedupEngine::new(10, 8, SelectionPolicy::First),
            dir.to_path_buf(),
            sink,
            2,
            "test".into(),
            report,
        )
    }

    fn file_count(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn cycle_hands_off_representatives_then_deletes_members() {
        let tmp = tempfile::tempdir().unwrap();
        let frames = tmp.path().join("frames");
        prepare_scenario(&frames);
        let sink = Arc::new(MemorySink::default());
        let report_path = tmp.path().join("stats.json");
        let worker = worker(&frames, sink.clone(), Some(report_path.clone()));

        let cycle = worker.run_cycle().await.unwrap();

        assert_eq!(cycle.report.total_images, 5);
        assert_eq!(cycle.report.group_count, 3);
        assert_eq!(cycle.report.duplicates_removed, 2);
        assert_eq!(cycle.handed_off, 3);
        assert_eq!(cycle.deleted, 5);
        assert!(!cycle.handoff_failed);
        assert_eq!(
            sink.identifiers(),
            vec!["frame_0.000.png", "frame_0.300.png", "frame_0.400.png"]
        );
        assert_eq!(file_count(&frames), 0);

        let stats: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(stats["totals"]["handed_off"], 3);
    }

    #[tokio::test]
    async fn failed_hand_off_deletes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        prepare_scenario(tmp.path());
        let worker = worker(tmp.path(), Arc::new(RejectingSink), None);

        let cycle = worker.run_cycle().await.unwrap();

        assert!(cycle.handoff_failed);
        assert_eq!(cycle.deleted, 0);
        assert_eq!(file_count(tmp.path()), 5);
        assert_eq!(worker.totals().await.failed_cycles, 1);

        // Retried on the next cycle with the same frames.
        let again = worker.run_cycle().await.unwrap();
        assert_eq!(again.report.total_images, 5);
        assert_eq!(file_count(tmp.path()), 5);
    }

    #[tokio::test]
    async fn empty_directory_is_a_quiet_cycle() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::default());
        let worker = worker(tmp.path(), sink.clone(), None);

        let cycle = worker.run_cycle().await.unwrap();
        assert_eq!(cycle.report.total_images, 0);
        assert_eq!(cycle.handed_off, 0);
        assert!(sink.identifiers().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_fails_the_cycle_only() {
        let tmp = tempfile::tempdir().unwrap();
        let worker = worker(&tmp.path().join("gone"), Arc::new(MemorySink::default()), None);
        assert!(matches!(worker.run_cycle().await, Err(CycleError::Dedup(_))));
        assert_eq!(worker.totals().await.failed_cycles, 1);
    }

    #[tokio::test]
    async fn session_runs_and_flushes_on_stop() {
        let tmp = tempfile::tempdir().unwrap();
        let sink = Arc::new(MemorySink::default());
        let mut session = CaptureSession::new(config(tmp.path()));
        assert_eq!(session.state(), SessionState::Idle);

        session.start_with(source(), sink.clone()).unwrap();
        assert_eq!(session.state(), SessionState::Running);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let summary = session.stop().await.unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(summary.producer.enqueued > 0);
        assert_eq!(
            summary.writer.written + summary.writer.failed,
            summary.producer.enqueued
        );
        let archived = sink.identifiers();
        assert!(!archived.is_empty());
        assert!(archived.len() as u64 <= summary.writer.written);
        assert!(summary.work_dir_removed);
        assert!(!tmp.path().join("frames").exists());
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn rejected_flush_keeps_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.dedup.interval_secs = 60;
        let mut session = CaptureSession::new(config);

        session.start_with(source(), Arc::new(RejectingSink)).unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;
        let summary = session.stop().await.unwrap();

        assert!(!summary.work_dir_removed);
        assert_eq!(summary.dedup.failed_cycles, 1);
        let frames = tmp.path().join("frames");
        assert_eq!(file_count(&frames) as u64, summary.writer.written);
    }

    #[tokio::test]
    async fn source_failure_keeps_session_idle() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = config(tmp.path());
        config.capture.width = 4;
        let mut session = CaptureSession::new(config);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::Capture(_)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!tmp.path().join("frames").exists());
    }

    #[tokio::test]
    async fn bad_working_directory_opens_no_archive() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut config = config(tmp.path());
        config.capture.output_dir = blocker.join("frames");
        let mut session = CaptureSession::new(config);

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, SessionError::WorkDir(..)));
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!tmp.path().join("archive").exists());
    }

    #[tokio::test]
    async fn lifecycle_transitions_are_checked() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::new(config(tmp.path()));
        assert!(matches!(
            session.stop().await,
            Err(SessionError::InvalidState {
                expected: SessionState::Running,
                actual: SessionState::Idle
            })
        ));

        session
            .start_with(source(), Arc::new(MemorySink::default()))
            .unwrap();
        assert!(matches!(
            session.start_with(source(), Arc::new(MemorySink::default())),
            Err(SessionError::InvalidState { .. })
        ));
        session.stop().await.unwrap();
        assert!(session.stop().await.is_err());
    }

    #[tokio::test]
    async fn start_opens_configured_directory_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let mut session = CaptureSession::new(config(tmp.path()));
        session.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;
        let summary = session.stop().await.unwrap();

        let archive = tmp.path().join("archive");
        assert!(archive.join("catalog.db").exists());
        let archived = std::fs::read_dir(archive.join(&summary.session_id))
            .unwrap()
            .count();
        assert_eq!(archived as u64, summary.dedup.handed_off);
    }
}
