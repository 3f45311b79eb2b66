//! Human-readable activity: the action log and user-facing notices.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Local;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Danger,
}

impl fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Danger => "danger",
        };
        f.write_str(s)
    }
}

/// A transient message for whoever is driving the session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub message: String,
}

/// Timestamped action lines, most recent first, plus pending notices.
/// Both are bounded by the same capacity; the oldest entries go first.
#[derive(Debug)]
pub struct Activity {
    actions: Mutex<VecDeque<String>>,
    capacity: usize,
    notices: Mutex<VecDeque<Notice>>,
    next_notice: AtomicU64,
}

impl Activity {
    pub fn new(capacity: usize) -> Self {
        Self {
            actions: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
            notices: Mutex::new(VecDeque::new()),
            next_notice: AtomicU64::new(1),
        }
    }

    /// Append `[HH:MM:SS] message`, dropping the oldest line past capacity.
    pub fn log(&self, message: impl AsRef<str>) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message.as_ref());
        let mut actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        actions.push_front(line);
        actions.truncate(self.capacity);
    }

    pub fn actions(&self) -> Vec<String> {
        let actions = self.actions.lock().unwrap_or_else(|e| e.into_inner());
        actions.iter().cloned().collect()
    }

    pub fn notify(&self, level: NoticeLevel, message: impl Into<String>) -> u64 {
        let id = self.next_notice.fetch_add(1, Ordering::Relaxed);
        let mut notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        notices.push_back(Notice {
            id,
            level,
            message: message.into(),
        });
        while notices.len() > self.capacity {
            notices.pop_front();
        }
        id
    }

    /// Remove and return every pending notice, oldest first.
    pub fn take_notices(&self) -> Vec<Notice> {
        let mut notices = self.notices.lock().unwrap_or_else(|e| e.into_inner());
        notices.drain(..).collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
