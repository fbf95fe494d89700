// 🧵 Chat Source - Thread replies in, RawMessage out

use crate::error::{Result, TallyError};
use crate::message::RawMessage;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// A top-level message that replies hang off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadRef {
    pub thread_id: String,

    /// Who posted the thread; used as a notification fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
}

pub trait ChatSource: Send + Sync {
    /// Replies under a thread, parent message excluded. May be empty.
    fn replies(&self, channel_id: &str, thread_id: &str) -> Result<Vec<RawMessage>>;

    /// Most recent thread posted by the bot in a channel
    fn find_latest_thread(&self, channel_id: &str) -> Result<Option<ThreadRef>>;

    /// Whether the source knows a thread, replies or not
    fn has_thread(&self, channel_id: &str, thread_id: &str) -> Result<bool>;
}

// ============================================================================
// THREAD LINKS
// ============================================================================

fn permalink_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/p(\d{10})(\d{6})(?:[/?#]|$)").expect("static regex"))
}

fn timestamp_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\.\d+$").expect("static regex"))
}

/// Accept a thread permalink or a raw thread timestamp.
///
/// ".../archives/C123/p1712345678123456" → "1712345678.123456"
pub fn parse_thread_link(input: &str) -> Result<String> {
    let input = input.trim();

    if timestamp_pattern().is_match(input) {
        return Ok(input.to_string());
    }

    if let Some(caps) = permalink_pattern().captures(input) {
        return Ok(format!("{}.{}", &caps[1], &caps[2]));
    }

    Err(TallyError::ThreadNotFound(input.to_string()))
}

/// Order thread timestamps numerically ("seconds.micros")
fn timestamp_key(thread_id: &str) -> (u64, u64) {
    let (secs, frac) = thread_id.split_once('.').unwrap_or((thread_id, "0"));
    (secs.parse().unwrap_or(0), frac.parse().unwrap_or(0))
}

// ============================================================================
// JSON EXPORT
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatExport {
    #[serde(default)]
    pub threads: Vec<ExportedThread>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportedThread {
    pub channel_id: String,
    pub thread_id: String,

    #[serde(default)]
    pub author_id: Option<String>,

    /// Posted by the bot (eligible as a tracking thread)
    #[serde(default)]
    pub bot: bool,

    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub replies: Vec<RawMessage>,
}

/// Chat source reading a JSON export from disk, re-read on every call
#[derive(Debug, Clone)]
pub struct JsonChatSource {
    path: PathBuf,
}

impl JsonChatSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonChatSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ChatExport> {
        let data = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

impl ChatSource for JsonChatSource {
    fn replies(&self, channel_id: &str, thread_id: &str) -> Result<Vec<RawMessage>> {
        let export = self.load()?;
        let replies = export
            .threads
            .into_iter()
            .find(|t| t.channel_id == channel_id && t.thread_id == thread_id)
            .map(|t| t.replies)
            .unwrap_or_default();

        debug!(channel = channel_id, thread = thread_id, replies = replies.len(), "replies loaded");
        Ok(replies)
    }

    fn find_latest_thread(&self, channel_id: &str) -> Result<Option<ThreadRef>> {
        let export = self.load()?;
        Ok(export
            .threads
            .into_iter()
            .filter(|t| t.channel_id == channel_id && t.bot)
            .max_by_key(|t| timestamp_key(&t.thread_id))
            .map(|t| ThreadRef {
                thread_id: t.thread_id,
                author_id: t.author_id,
            }))
    }

    fn has_thread(&self, channel_id: &str, thread_id: &str) -> Result<bool> {
        let export = self.load()?;
        Ok(export
            .threads
            .iter()
            .any(|t| t.channel_id == channel_id && t.thread_id == thread_id))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_export(dir: &Path) -> JsonChatSource {
        let export = serde_json::json!({
            "threads": [
                {
                    "channel_id": "C1",
                    "thread_id": "1712345678.000100",
                    "author_id": "UBOT",
                    "bot": true,
                    "replies": [
                        {"text": "Kim/checked-in", "author_id": "U1"},
                        {"text": "checked-in", "author_id": "U2", "display_name": "Hong_CompSci"}
                    ]
                },
                {
                    "channel_id": "C1",
                    "thread_id": "1712999999.000001",
                    "author_id": "UBOT",
                    "bot": true,
                    "replies": []
                },
                {
                    "channel_id": "C1",
                    "thread_id": "1799999999.000001",
                    "author_id": "U7",
                    "bot": false
                }
            ]
        });
        let path = dir.join("chat.json");
        std::fs::write(&path, export.to_string()).unwrap();
        JsonChatSource::new(path)
    }

    #[test]
    fn test_parse_thread_link() {
        assert_eq!(
            parse_thread_link("https://team.slack.com/archives/C0123/p1712345678123456").unwrap(),
            "1712345678.123456"
        );
        assert_eq!(
            parse_thread_link("https://team.slack.com/archives/C0123/p1712345678123456?thread_ts=1").unwrap(),
            "1712345678.123456"
        );
        assert_eq!(parse_thread_link(" 1712345678.123456 ").unwrap(), "1712345678.123456");
        assert!(parse_thread_link("not a link").is_err());
    }

    #[test]
    fn test_replies_by_thread() {
        let dir = tempfile::tempdir().unwrap();
        let source = create_test_export(dir.path());

        let replies = source.replies("C1", "1712345678.000100").unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].display_name.as_deref(), Some("Hong_CompSci"));

        assert!(source.replies("C1", "0.0").unwrap().is_empty());
        assert!(source.replies("C2", "1712345678.000100").unwrap().is_empty());
    }

    #[test]
    fn test_latest_bot_thread() {
        let dir = tempfile::tempdir().unwrap();
        let source = create_test_export(dir.path());

        let latest = source.find_latest_thread("C1").unwrap().unwrap();
        assert_eq!(latest.thread_id, "1712999999.000001");
        assert_eq!(latest.author_id.as_deref(), Some("UBOT"));
        assert!(source.find_latest_thread("C9").unwrap().is_none());
    }

    #[test]
    fn test_has_thread() {
        let dir = tempfile::tempdir().unwrap();
        let source = create_test_export(dir.path());

        assert!(source.has_thread("C1", "1712999999.000001").unwrap());
        assert!(!source.has_thread("C1", "1713000000.000000").unwrap());
        assert!(!source.has_thread("C2", "1712999999.000001").unwrap());
    }

    #[test]
    fn test_timestamp_ordering() {
        assert!(timestamp_key("1712345678.000100") < timestamp_key("1712345678.000200"));
        assert!(timestamp_key("999.9") < timestamp_key("1000.0"));
    }
}
