// 💬 Data Model - Messages, candidates and sheet records
// Everything here lives for a single run, except the status symbols which are
// part of the sheet contract.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// RAW MESSAGE (chat-source output)
// ============================================================================

/// One reply pulled from a tracking thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: String,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub real_name: Option<String>,
    #[serde(default)]
    pub timestamp: String,
}

impl RawMessage {
    pub fn new(text: &str, author_id: &str) -> Self {
        RawMessage {
            text: text.to_string(),
            author_id: author_id.to_string(),
            display_name: None,
            real_name: None,
            timestamp: String::new(),
        }
    }

    /// Builder pattern: add display name
    pub fn with_display_name(mut self, display_name: &str) -> Self {
        self.display_name = Some(display_name.to_string());
        self
    }

    /// Builder pattern: add real name
    pub fn with_real_name(mut self, real_name: &str) -> Self {
        self.real_name = Some(real_name.to_string());
        self
    }

    pub fn with_timestamp(mut self, timestamp: &str) -> Self {
        self.timestamp = timestamp.to_string();
        self
    }

    /// Display name if set and non-blank, otherwise real name
    pub fn profile_name(&self) -> Option<&str> {
        [self.display_name.as_deref(), self.real_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
    }
}

// ============================================================================
// NAMING CANDIDATE
// ============================================================================

/// How a name was obtained from a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateSource {
    /// Name written in the message text before a separator or keyword
    Pattern,
    /// Keyword present without a leading name; name taken from the author profile
    Fallback,
}

impl CandidateSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateSource::Pattern => "PATTERN",
            CandidateSource::Fallback => "FALLBACK",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingCandidate {
    pub raw_name: String,
    pub author_id: String,
    pub source: CandidateSource,
}

/// Candidate after duplicate resolution
///
/// `row` is set only when a duplicate group pinned the candidate to an explicit
/// roster row; the matcher then skips the name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCandidate {
    pub name: String,
    pub author_id: String,
    pub source: CandidateSource,
    pub row: Option<usize>,
}

// ============================================================================
// ATTENDANCE STATUS
// ============================================================================

/// Closed set of statuses with a fixed mapping to sheet symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    /// Defined by the sheet contract; no stage produces it yet
    Late,
}

impl AttendanceStatus {
    /// Literal written into the sheet cell
    pub fn symbol(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "O",
            AttendanceStatus::Absent => "X",
            AttendanceStatus::Late => "△",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol.trim() {
            "O" => Some(AttendanceStatus::Present),
            "X" => Some(AttendanceStatus::Absent),
            "△" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

// ============================================================================
// ATTENDANCE RECORD (sheet-writer input)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub name: String,
    pub roster_row: usize,
    pub column: usize,
    pub status: AttendanceStatus,
}

impl AttendanceRecord {
    pub fn present(name: &str, roster_row: usize, column: usize) -> Self {
        AttendanceRecord {
            name: name.to_string(),
            roster_row,
            column,
            status: AttendanceStatus::Present,
        }
    }

    pub fn absent(name: &str, roster_row: usize, column: usize) -> Self {
        AttendanceRecord {
            name: name.to_string(),
            roster_row,
            column,
            status: AttendanceStatus::Absent,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_symbols_round_trip() {
        for status in [
            AttendanceStatus::Present,
            AttendanceStatus::Absent,
            AttendanceStatus::Late,
        ] {
            assert_eq!(AttendanceStatus::from_symbol(status.symbol()), Some(status));
        }
        assert_eq!(AttendanceStatus::from_symbol(""), None);
        assert_eq!(AttendanceStatus::from_symbol("o"), None);
    }

    #[test]
    fn test_profile_name_prefers_display_name() {
        let msg = RawMessage::new("hi", "U1")
            .with_display_name("Hong_CompSci")
            .with_real_name("Hong Gildong");
        assert_eq!(msg.profile_name(), Some("Hong_CompSci"));

        let blank_display = RawMessage::new("hi", "U1")
            .with_display_name("  ")
            .with_real_name("Hong Gildong");
        assert_eq!(blank_display.profile_name(), Some("Hong Gildong"));

        assert_eq!(RawMessage::new("hi", "U1").profile_name(), None);
    }

    #[test]
    fn test_raw_message_deserializes_without_optional_fields() {
        let msg: RawMessage =
            serde_json::from_str(r#"{"text":"Kim/checked-in","author_id":"U1"}"#).unwrap();
        assert_eq!(msg.display_name, None);
        assert_eq!(msg.timestamp, "");
    }
}
