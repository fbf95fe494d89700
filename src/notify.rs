// 📣 Notification Sink - Thread replies and direct messages

use crate::error::{Result, TallyError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Outbound messaging collaborator
pub trait NotificationSink: Send + Sync {
    /// Reply inside an existing thread
    fn post_thread_reply(&self, channel_id: &str, thread_id: &str, text: &str) -> Result<()>;

    /// Direct message to one recipient
    fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()>;

    /// Post a new top-level message and return its thread id
    fn open_thread(&self, channel_id: &str, text: &str) -> Result<String>;
}

/// Thread id in chat timestamp form ("seconds.micros")
pub fn thread_id_now() -> String {
    let now = Utc::now();
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

// ============================================================================
// LOG SINK
// ============================================================================

/// Writes every notification to the log instead of a chat service
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    pub fn new() -> Self {
        LogSink
    }
}

impl NotificationSink for LogSink {
    fn post_thread_reply(&self, channel_id: &str, thread_id: &str, text: &str) -> Result<()> {
        info!(channel = channel_id, thread = thread_id, "thread reply:\n{}", text);
        Ok(())
    }

    fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()> {
        info!(recipient = recipient_id, "direct message:\n{}", text);
        Ok(())
    }

    fn open_thread(&self, channel_id: &str, text: &str) -> Result<String> {
        let thread_id = thread_id_now();
        info!(channel = channel_id, thread = %thread_id, "thread opened:\n{}", text);
        Ok(thread_id)
    }
}

// ============================================================================
// MEMORY SINK
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    ThreadReply {
        channel_id: String,
        thread_id: String,
        text: String,
    },
    Direct {
        recipient_id: String,
        text: String,
    },
    ThreadOpened {
        channel_id: String,
        thread_id: String,
        text: String,
    },
}

/// Keeps notifications in memory for inspection
#[derive(Debug, Default)]
pub struct MemorySink {
    sent: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn direct_messages(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|n| match n {
                Notification::Direct { recipient_id, text } => Some((recipient_id, text)),
                _ => None,
            })
            .collect()
    }

    fn push(&self, notification: Notification) -> Result<()> {
        let mut sent = self
            .sent
            .lock()
            .map_err(|_| TallyError::Io(std::io::Error::other("notification buffer poisoned")))?;
        sent.push(notification);
        Ok(())
    }
}

impl NotificationSink for MemorySink {
    fn post_thread_reply(&self, channel_id: &str, thread_id: &str, text: &str) -> Result<()> {
        self.push(Notification::ThreadReply {
            channel_id: channel_id.to_string(),
            thread_id: thread_id.to_string(),
            text: text.to_string(),
        })
    }

    fn send_direct(&self, recipient_id: &str, text: &str) -> Result<()> {
        self.push(Notification::Direct {
            recipient_id: recipient_id.to_string(),
            text: text.to_string(),
        })
    }

    fn open_thread(&self, channel_id: &str, text: &str) -> Result<String> {
        let thread_id = thread_id_now();
        self.push(Notification::ThreadOpened {
            channel_id: channel_id.to_string(),
            thread_id: thread_id.clone(),
            text: text.to_string(),
        })?;
        Ok(thread_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_id_shape() {
        let id = thread_id_now();
        let (secs, micros) = id.split_once('.').unwrap();
        assert!(secs.parse::<i64>().is_ok());
        assert_eq!(micros.len(), 6);
    }

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.post_thread_reply("C1", "1.2", "done").unwrap();
        sink.send_direct("U1", "report").unwrap();
        let thread = sink.open_thread("C1", "check in here").unwrap();

        let sent = sink.sent();
        assert_eq!(sent.len(), 3);
        assert!(matches!(&sent[2], Notification::ThreadOpened { thread_id, .. } if *thread_id == thread));
        assert_eq!(sink.direct_messages(), vec![("U1".to_string(), "report".to_string())]);
    }

    #[test]
    fn test_log_sink_never_fails() {
        let sink = LogSink::new();
        assert!(sink.send_direct("U1", "hello").is_ok());
        assert!(!sink.open_thread("C1", "hello").unwrap().is_empty());
    }
}
