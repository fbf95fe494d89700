// 🚨 Error taxonomy for a tracking run
//
// Aborts are variants of TallyError. Non-fatal outcomes (unresolvable
// ambiguity, partial sheet writes) are reported as values, not errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TallyError {
    /// Chat source returned an empty reply sequence
    #[error("no replies found in thread {thread_id}")]
    NoReplies { thread_id: String },

    /// Roster source returned no names
    #[error("roster is empty ({source_name})")]
    NoRoster { source_name: String },

    /// Nothing survived extraction and duplicate resolution
    #[error("no check-in replies could be matched to a name ({replies} replies scanned)")]
    NoCandidates { replies: usize },

    #[error("failed to persist schedule for workspace '{workspace}': {reason}")]
    Persistence { workspace: String, reason: String },

    #[error("column cursor {current} is outside range {start}..={end}")]
    CursorOutOfRange {
        current: String,
        start: String,
        end: String,
    },

    #[error("schedule entry not found: {day} / column {column}")]
    ScheduleEntryNotFound { day: String, column: String },

    #[error("no schedule entry at index {index} ({len} entries)")]
    ScheduleIndexOutOfRange { index: usize, len: usize },

    #[error("column range {start}..={end} is empty")]
    InvalidColumnRange { start: String, end: String },

    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("invalid workspace name '{0}'")]
    InvalidWorkspaceName(String),

    #[error("invalid column '{0}': expected letters A-Z")]
    InvalidColumn(String),

    #[error("no tracking thread found for workspace '{0}'")]
    ThreadNotFound(String),

    #[error("invalid check-in pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl From<figment::Error> for TallyError {
    fn from(err: figment::Error) -> Self {
        TallyError::Config(Box::new(err))
    }
}

impl TallyError {
    /// True for the errors that abort a run before any sheet write happens.
    pub fn is_run_abort(&self) -> bool {
        matches!(
            self,
            TallyError::NoReplies { .. } | TallyError::NoRoster { .. } | TallyError::NoCandidates { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_kinds() {
        assert!(TallyError::NoReplies { thread_id: "1.2".into() }.is_run_abort());
        assert!(TallyError::NoRoster { source_name: "sheet Sheet1".into() }.is_run_abort());
        assert!(TallyError::NoCandidates { replies: 3 }.is_run_abort());
        assert!(!TallyError::WorkspaceNotFound("ws".into()).is_run_abort());
    }

    #[test]
    fn test_range_messages() {
        let err = TallyError::ScheduleIndexOutOfRange { index: 4, len: 2 };
        assert_eq!(err.to_string(), "no schedule entry at index 4 (2 entries)");
        let err = TallyError::InvalidColumnRange { start: "O".into(), end: "H".into() };
        assert_eq!(err.to_string(), "column range O..=H is empty");
    }

    #[test]
    fn test_messages_are_human_readable() {
        let err = TallyError::Persistence {
            workspace: "class-a".into(),
            reason: "disk full".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to persist schedule for workspace 'class-a': disk full"
        );
    }
}
