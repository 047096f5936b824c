//! User-facing notices: the toast layer's stand-in.
//!
//! Notices are queued for the presentation layer to drain and are mirrored to the
//! log, so a failed call always leaves both a user message and a diagnostic entry.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Pending notices kept before the oldest are dropped.
pub const MAX_PENDING: usize = 64;

/// Shared, cloneable notice queue holding at most `MAX_PENDING` undrained notices.
#[derive(Clone, Default)]
pub struct Notices {
    queue: Arc<Mutex<VecDeque<Notice>>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Success, message.into());
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message.into());
    }

    fn push(&self, level: NoticeLevel, message: String) {
        match level {
            NoticeLevel::Error => error!(notice = %message, "user notice"),
            _ => info!(notice = %message, "user notice"),
        }
        let mut queue = self.queue.lock();
        if queue.len() == MAX_PENDING {
            queue.pop_front();
        }
        queue.push_back(Notice { level, message });
    }

    /// Takes every pending notice, oldest first.
    pub fn drain(&self) -> Vec<Notice> {
        self.queue.lock().drain(..).collect()
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.queue.lock().iter().cloned().collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.queue.lock().back().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_in_order_and_empties() {
        let notices = Notices::new();
        notices.success("Account created successfully");
        notices.error("Failed to fetch accounts");
        let drained = notices.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].level, NoticeLevel::Success);
        assert_eq!(drained[1].to_string(), "[error] Failed to fetch accounts");
        assert!(notices.drain().is_empty());
    }

    #[test]
    fn undrained_queue_keeps_only_the_newest() {
        let notices = Notices::new();
        for n in 0..MAX_PENDING + 5 {
            notices.info(format!("notice {n}"));
        }
        let pending = notices.snapshot();
        assert_eq!(pending.len(), MAX_PENDING);
        assert_eq!(pending[0].message, "notice 5");
        assert_eq!(
            notices.last().map(|n| n.message),
            Some(format!("notice {}", MAX_PENDING + 4))
        );
    }

    #[test]
    fn clones_share_the_queue() {
        let notices = Notices::new();
        let other = notices.clone();
        other.info("hello");
        assert_eq!(notices.last().map(|n| n.message), Some("hello".to_string()));
    }
}
