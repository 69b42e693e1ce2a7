//! Authentication audit counters.
//!
//! Counts what the classifier did (sessions, outcomes, template locks)
//! without retaining any keystroke data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

use crate::core::scorer::Score;

/// Counters describing classifier activity.
///
/// All counters are atomic, so one log can be shared between capture
/// sessions through a [`SharedAuditLog`].
#[derive(Debug)]
pub struct AuditLog {
    sessions_started: AtomicU64,
    /// Key presses added to a session's feature set
    keystrokes_captured: AtomicU64,
    /// Sessions that produced a numeric score
    scores_computed: AtomicU64,
    not_enough_data: AtomicU64,
    capturing_errors: AtomicU64,
    invalidated_sessions: AtomicU64,
    /// Enrollment sets that reached capacity and ran template selection
    templates_locked: AtomicU64,
    started_at: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl AuditLog {
    /// Create an in-memory audit log with all counters at zero.
    pub fn new() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            keystrokes_captured: AtomicU64::new(0),
            scores_computed: AtomicU64::new(0),
            not_enough_data: AtomicU64::new(0),
            capturing_errors: AtomicU64::new(0),
            invalidated_sessions: AtomicU64::new(0),
            templates_locked: AtomicU64::new(0),
            started_at: Utc::now(),
            persist_path: None,
        }
    }

    /// Create an audit log that restores and saves its counters at `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("Could not load previous audit stats: {e}");
        }

        log
    }

    /// Record that a capture session started.
    pub fn record_session_started(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one captured key press.
    pub fn record_keystroke(&self) {
        self.keystrokes_captured.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a finished session by its outcome.
    pub fn record_score(&self, score: Score) {
        let counter = match score {
            Score::Value(_) => &self.scores_computed,
            Score::NotEnoughData => &self.not_enough_data,
            Score::CapturingError => &self.capturing_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session abandoned mid-edit.
    pub fn record_invalidated(&self) {
        self.invalidated_sessions.fetch_add(1, Ordering::Relaxed);
    }

    /// Record that an enrollment set was reduced to its template set.
    pub fn record_templates_locked(&self) {
        self.templates_locked.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of the current counters.
    pub fn stats(&self) -> AuditStats {
        AuditStats {
            sessions_started: self.sessions_started.load(Ordering::Relaxed),
            keystrokes_captured: self.keystrokes_captured.load(Ordering::Relaxed),
            scores_computed: self.scores_computed.load(Ordering::Relaxed),
            not_enough_data: self.not_enough_data.load(Ordering::Relaxed),
            capturing_errors: self.capturing_errors.load(Ordering::Relaxed),
            invalidated_sessions: self.invalidated_sessions.load(Ordering::Relaxed),
            templates_locked: self.templates_locked.load(Ordering::Relaxed),
            started_at: self.started_at,
        }
    }

    /// Human-readable summary for the CLI.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Authentication Statistics:\n\
             - Sessions started: {}\n\
             - Keystrokes captured: {}\n\
             - Scores computed: {}\n\
             - Not enough data: {}\n\
             - Capturing errors: {}\n\
             - Invalidated sessions: {}\n\
             - Template sets locked: {}",
            stats.sessions_started,
            stats.keystrokes_captured,
            stats.scores_computed,
            stats.not_enough_data,
            stats.capturing_errors,
            stats.invalidated_sessions,
            stats.templates_locked
        )
    }

    /// Write the counters to the persistence path, if one is set.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats::from(self.stats());
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Restore counters saved by an earlier run.
    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.sessions_started
                    .store(persisted.sessions_started, Ordering::Relaxed);
                self.keystrokes_captured
                    .store(persisted.keystrokes_captured, Ordering::Relaxed);
                self.scores_computed
                    .store(persisted.scores_computed, Ordering::Relaxed);
                self.not_enough_data
                    .store(persisted.not_enough_data, Ordering::Relaxed);
                self.capturing_errors
                    .store(persisted.capturing_errors, Ordering::Relaxed);
                self.invalidated_sessions
                    .store(persisted.invalidated_sessions, Ordering::Relaxed);
                self.templates_locked
                    .store(persisted.templates_locked, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters to zero. The start time is kept.
    pub fn reset(&self) {
        for counter in [
            &self.sessions_started,
            &self.keystrokes_captured,
            &self.scores_computed,
            &self.not_enough_data,
            &self.capturing_errors,
            &self.invalidated_sessions,
            &self.templates_locked,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of the audit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditStats {
    pub sessions_started: u64,
    pub keystrokes_captured: u64,
    /// Sessions that produced a numeric score
    pub scores_computed: u64,
    /// Sessions scored while the enrollment set was below capacity
    pub not_enough_data: u64,
    /// Sessions whose feature shape did not match the enrollment set
    pub capturing_errors: u64,
    pub invalidated_sessions: u64,
    pub templates_locked: u64,
    /// When this process created the log
    pub started_at: DateTime<Utc>,
}

/// On-disk form of the counters.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    sessions_started: u64,
    keystrokes_captured: u64,
    scores_computed: u64,
    not_enough_data: u64,
    capturing_errors: u64,
    invalidated_sessions: u64,
    templates_locked: u64,
    last_updated: DateTime<Utc>,
}

impl From<AuditStats> for PersistedStats {
    fn from(stats: AuditStats) -> Self {
        Self {
            sessions_started: stats.sessions_started,
            keystrokes_captured: stats.keystrokes_captured,
            scores_computed: stats.scores_computed,
            not_enough_data: stats.not_enough_data,
            capturing_errors: stats.capturing_errors,
            invalidated_sessions: stats.invalidated_sessions,
            templates_locked: stats.templates_locked,
            last_updated: Utc::now(),
        }
    }
}

/// Thread-safe shared audit log.
pub type SharedAuditLog = Arc<AuditLog>;

/// Create a new shared audit log.
pub fn create_shared_log() -> SharedAuditLog {
    Arc::new(AuditLog::new())
}

/// Create a shared audit log that restores and saves its counters at `path`.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedAuditLog {
    Arc::new(AuditLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_counting() {
        let log = AuditLog::new();

        log.record_session_started();
        log.record_score(Score::NotEnoughData);
        log.record_score(Score::Value(0.3));
        log.record_score(Score::CapturingError);
        log.record_score(Score::Value(1.2));

        let stats = log.stats();
        assert_eq!(stats.sessions_started, 1);
        assert_eq!(stats.scores_computed, 2);
        assert_eq!(stats.not_enough_data, 1);
        assert_eq!(stats.capturing_errors, 1);

        log.reset();
        assert_eq!(log.stats().scores_computed, 0);
    }

    #[test]
    fn test_persistence_roundtrip() {
        let path = std::env::temp_dir().join(format!("audit_{}.json", uuid::Uuid::new_v4()));

        let log = AuditLog::with_persistence(path.clone());
        log.record_templates_locked();
        log.record_keystroke();
        log.record_keystroke();
        log.save().unwrap();

        let restored = AuditLog::with_persistence(path.clone());
        let stats = restored.stats();
        assert_eq!(stats.templates_locked, 1);
        assert_eq!(stats.keystrokes_captured, 2);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_summary_format() {
        let summary = AuditLog::new().summary();
        assert!(summary.contains("Sessions started"));
        assert!(summary.contains("Template sets locked"));
    }
}
