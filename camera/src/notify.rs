use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::capture::CaptureError;
use crate::storage::Locator;

const RECENT_CAPACITY: usize = 20;

/// Outcome of one capture, as shown to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// Sequence number of the captured frame.
    pub seq: u64,
    /// When the source produced the captured frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_at_ms: Option<i64>,
    pub at_ms: i64,
    #[serde(flatten)]
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Saved { locator: Locator },
    Failed { kind: &'static str, reason: String },
}

impl Notification {
    pub fn from_result(seq: u64, result: &Result<Locator, CaptureError>) -> Self {
        let outcome = match result {
            Ok(locator) => Outcome::Saved {
                locator: locator.clone(),
            },
            Err(e) => Outcome::Failed {
                kind: e.kind(),
                reason: e.to_string(),
            },
        };
        Self {
            seq,
            frame_at_ms: None,
            at_ms: Utc::now().timestamp_millis(),
            outcome,
        }
    }

    pub fn with_frame_time(mut self, captured_at_ms: i64) -> Self {
        self.frame_at_ms = Some(captured_at_ms);
        self
    }

    pub fn is_saved(&self) -> bool {
        matches!(self.outcome, Outcome::Saved { .. })
    }
}

/// Transient user-facing channel for capture outcomes.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Logs every outcome and remembers the most recent ones for the control surface.
#[derive(Default)]
pub struct StatusBoard {
    recent: Mutex<VecDeque<Notification>>,
    last_saved: Mutex<Option<Locator>>,
    saved: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub saved: u64,
    pub failed: u64,
    /// Newest first.
    pub recent: Vec<Notification>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator of the newest saved capture, however many failures followed it.
    pub fn last_saved(&self) -> Option<Locator> {
        self.last_saved
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let recent = self
            .recent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .rev()
            .cloned()
            .collect();
        StatusSnapshot {
            saved: self.saved.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            recent,
        }
    }
}

impl Notifier for StatusBoard {
    fn notify(&self, notification: Notification) {
        match &notification.outcome {
            Outcome::Saved { locator } => {
                self.saved.fetch_add(1, Ordering::Relaxed);
                let mut last = self.last_saved.lock().unwrap_or_else(|p| p.into_inner());
                *last = Some(locator.clone());
                drop(last);
                info!(seq = notification.seq, %locator, "Saved to: {locator}");
            }
            Outcome::Failed { kind, reason } => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                warn!(seq = notification.seq, kind, "Failed to save image: {reason}");
            }
        }

        let mut recent = self.recent.lock().unwrap_or_else(|p| p.into_inner());
        if recent.len() == RECENT_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(notification);
    }
}
