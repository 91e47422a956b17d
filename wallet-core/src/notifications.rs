//! Toast-style notices published for the UI layer.
//!
//! Publishing never fails: with no subscribers the notice is just dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Notifications {
    sender: broadcast::Sender<Notice>,
}

impl Notifications {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.sender.subscribe()
    }

    pub fn publish(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            level,
            message: message.into(),
        };
        log::debug!("notice {:?}: {}", notice.level, notice.message);
        let _ = self.sender.send(notice);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Info, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.publish(NoticeLevel::Error, message);
    }
}

impl Default for Notifications {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_notices() {
        let notifications = Notifications::new();
        let mut rx = notifications.subscribe();
        notifications.error("Invalid transaction");
        let notice = rx.recv().await.unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Invalid transaction");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        Notifications::new().success("nobody listening");
    }
}
