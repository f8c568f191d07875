//! Batch lifecycle notifications.
//!
//! Delivery is best effort: the orchestrator logs a failed send and moves on.

use crate::logging::sanitize_message;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

const MAX_LOGGED_TEXT_CHARS: usize = 240;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Started,
    Succeeded,
    Failed,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// One plain-text lifecycle message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub correlation_id: String,
    pub status: BatchStatus,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    Unavailable(String),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(message) => write!(f, "notification channel unavailable: {message}"),
        }
    }
}

impl Error for NotifyError {}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes notifications as log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let text = sanitize_message(&notification.text, MAX_LOGGED_TEXT_CHARS);
        match notification.status {
            BatchStatus::Failed => warn!(
                "event=import_notification module=service status={} correlation_id={} text={text}",
                notification.status.as_str(),
                notification.correlation_id
            ),
            _ => info!(
                "event=import_notification module=service status={} correlation_id={} text={text}",
                notification.status.as_str(),
                notification.correlation_id
            ),
        }
        Ok(())
    }
}

/// Collects notifications in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn statuses(&self) -> Vec<BatchStatus> {
        self.sent().iter().map(|n| n.status).collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .map_err(|_| NotifyError::Unavailable("notifier lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
