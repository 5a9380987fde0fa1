//! Transparency log for a gate session.
//!
//! Tracks what was observed and what left the process, so a session can
//! be audited without keeping the collected data itself.

use crate::interaction::PointerEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Transparency statistics for the current session.
#[derive(Debug)]
pub struct TransparencyLog {
    /// Pointer movement events observed
    pointer_moves: AtomicU64,
    /// Clicks observed
    clicks: AtomicU64,
    /// Scroll events observed
    scrolls: AtomicU64,
    /// Observation windows that ran to completion
    windows_completed: AtomicU64,
    /// Verification payloads assembled
    payloads_assembled: AtomicU64,
    /// Submissions the endpoint accepted
    submissions_accepted: AtomicU64,
    /// Submissions answered with a synthesized success
    submissions_synthesized: AtomicU64,
    /// Results reported through the host bridge
    bridge_notifications: AtomicU64,
    /// Results reported through the local fallback
    fallback_notifications: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl TransparencyLog {
    /// Create a new transparency log.
    pub fn new() -> Self {
        Self {
            pointer_moves: AtomicU64::new(0),
            clicks: AtomicU64::new(0),
            scrolls: AtomicU64::new(0),
            windows_completed: AtomicU64::new(0),
            payloads_assembled: AtomicU64::new(0),
            submissions_accepted: AtomicU64::new(0),
            submissions_synthesized: AtomicU64::new(0),
            bridge_notifications: AtomicU64::new(0),
            fallback_notifications: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    /// Record an observed pointer event.
    pub fn record_pointer_event(&self, event: &PointerEvent) {
        let counter = match event {
            PointerEvent::Move => &self.pointer_moves,
            PointerEvent::Click { .. } => &self.clicks,
            PointerEvent::Scroll => &self.scrolls,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed observation window.
    pub fn record_window_completed(&self) {
        self.windows_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an assembled payload.
    pub fn record_payload_assembled(&self) {
        self.payloads_assembled.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a delivery outcome.
    pub fn record_submission(&self, accepted: bool) {
        let counter = if accepted {
            &self.submissions_accepted
        } else {
            &self.submissions_synthesized
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Record which path reported the verified result.
    pub fn record_notification(&self, via_bridge: bool) {
        let counter = if via_bridge {
            &self.bridge_notifications
        } else {
            &self.fallback_notifications
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> TransparencyStats {
        TransparencyStats {
            pointer_moves: self.pointer_moves.load(Ordering::Relaxed),
            clicks: self.clicks.load(Ordering::Relaxed),
            scrolls: self.scrolls.load(Ordering::Relaxed),
            windows_completed: self.windows_completed.load(Ordering::Relaxed),
            payloads_assembled: self.payloads_assembled.load(Ordering::Relaxed),
            submissions_accepted: self.submissions_accepted.load(Ordering::Relaxed),
            submissions_synthesized: self.submissions_synthesized.load(Ordering::Relaxed),
            bridge_notifications: self.bridge_notifications.load(Ordering::Relaxed),
            fallback_notifications: self.fallback_notifications.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Pointer moves observed: {}\n\
             - Clicks observed: {}\n\
             - Scrolls observed: {}\n\
             - Observation windows completed: {}\n\
             - Payloads assembled: {}\n\
             - Submissions accepted: {}\n\
             - Submissions absorbed: {}\n\
             - Host bridge notifications: {}\n\
             - Fallback notifications: {}\n\
             - Session duration: {} seconds",
            stats.pointer_moves,
            stats.clicks,
            stats.scrolls,
            stats.windows_completed,
            stats.payloads_assembled,
            stats.submissions_accepted,
            stats.submissions_synthesized,
            stats.bridge_notifications,
            stats.fallback_notifications,
            stats.session_duration_secs
        )
    }
}

impl Default for TransparencyLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of transparency statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransparencyStats {
    pub pointer_moves: u64,
    pub clicks: u64,
    pub scrolls: u64,
    pub windows_completed: u64,
    pub payloads_assembled: u64,
    pub submissions_accepted: u64,
    pub submissions_synthesized: u64,
    pub bridge_notifications: u64,
    pub fallback_notifications: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl TransparencyStats {
    /// Total notifications across both paths.
    pub fn notifications(&self) -> u64 {
        self.bridge_notifications + self.fallback_notifications
    }

    /// Total delivery attempts.
    pub fn submissions(&self) -> u64 {
        self.submissions_accepted + self.submissions_synthesized
    }
}

/// Thread-safe shared transparency log.
pub type SharedTransparencyLog = Arc<TransparencyLog>;

/// Create a new shared transparency log.
pub fn create_shared_log() -> SharedTransparencyLog {
    Arc::new(TransparencyLog::new())
}
