use chrono::Utc;
use screen_sieve_dedup::grouping::DeduplicationReport;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// Outcome of one deduplication cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub report: DeduplicationReport,
    /// Representatives confirmed by storage.
    pub handed_off: usize,
    /// Local files removed after the hand-off was confirmed.
    pub deleted: usize,
    /// At least one representative was not confirmed; nothing was deleted.
    pub handoff_failed: bool,
}

impl CycleReport {
    pub fn empty() -> Self {
        Self {
            report: DeduplicationReport::default(),
            handed_off: 0,
            deleted: 0,
            handoff_failed: false,
        }
    }

    pub fn log(&self) {
        if self.handoff_failed {
            warn!(
                total = self.report.total_images,
                groups = self.report.group_count,
                handed_off = self.handed_off,
                "dedup cycle hand-off failed, frames kept for retry"
            );
        } else {
            info!(
                total = self.report.total_images,
                groups = self.report.group_count,
                removed = self.report.duplicates_removed,
                unreadable = self.report.unreadable_images,
                handed_off = self.handed_off,
                deleted = self.deleted,
                "dedup cycle complete"
            );
        }
    }
}

/// Cumulative statistics of one capture session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionTotals {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub images_hashed: u64,
    pub duplicates_removed: u64,
    pub unreadable_images: u64,
    pub handed_off: u64,
    pub deleted: u64,
    /// RFC 3339 time of the last cycle whose hand-off was confirmed.
    pub last_success: Option<String>,
    pub last_cycle: Option<CycleReport>,
}

impl SessionTotals {
    pub fn record(&mut self, cycle: &CycleReport) {
        self.cycles += 1;
        self.images_hashed += cycle.report.total_images as u64;
        self.unreadable_images = cycle.report.unreadable_images as u64;
        self.handed_off += cycle.handed_off as u64;
        if cycle.handoff_failed {
            self.failed_cycles += 1;
        } else {
            self.duplicates_removed += cycle.report.duplicates_removed as u64;
            self.deleted += cycle.deleted as u64;
            self.last_success = Some(Utc::now().to_rfc3339());
        }
        self.last_cycle = Some(cycle.clone());
    }

    pub fn record_error(&mut self) {
        self.cycles += 1;
        self.failed_cycles += 1;
    }
}

/// Rewrite the JSON stats file. Failures are logged, never propagated.
pub fn write_report_file(path: &Path, session_id: &str, state: &str, totals: &SessionTotals) {
    let json = serde_json::json!({
        "session": session_id,
        "state": state,
        "updated_at": Utc::now().to_rfc3339(),
        "totals": totals,
    });

    let body = match serde_json::to_string_pretty(&json) {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "failed to serialize session report");
            return;
        }
    };
    if let Err(e) = std::fs::write(path, body) {
        warn!(error = %e, path = %path.display(), "failed to write session report");
    }
}
