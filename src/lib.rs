// Roster Tally - Core Library
// Chat replies → roster presence records, plus the recurring column schedule.
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod message;
pub mod column;
pub mod parser;         // Name extraction (check-in + submission)
pub mod deduplication;  // Duplicate-name resolution
pub mod roster;         // Roster + matcher
pub mod reconciliation; // Absence reconciliation + per-run pipeline
pub mod summary;        // Counts, rates, notification text
pub mod schedule;       // Schedule state + column advancer
pub mod db;             // SQLite store, run history, events
pub mod sheet;          // Sheet traits + CSV workbook
pub mod sources;        // Chat source + thread links
pub mod notify;         // Notification sinks
pub mod config;         // Layered configuration
pub mod runner;         // Run orchestration

// Re-export commonly used types
pub use error::{Result, TallyError};
pub use message::{
    AttendanceRecord, AttendanceStatus, CandidateSource, NamingCandidate, RawMessage,
    ResolvedCandidate,
};
pub use column::{a1_reference, Column};
pub use parser::{normalize_name, profile_token, NameExtractor, SubmissionExtractor, DEFAULT_KEYWORDS};
pub use deduplication::{DropReason, DuplicateEntry, DuplicateGroups, DuplicateResolver, Resolution};
pub use roster::{MatchOutcome, MatchReport, Roster, RosterMatcher};
pub use reconciliation::{
    AbsenceReconciler, Absences, AttendanceReport, ReconciliationEngine, SubmissionReport,
};
pub use summary::{RunSummary, SourceCounts, SummaryBuilder};
pub use schedule::{
    AdvanceOutcome, AutoColumn, ColumnAdvancer, ColumnCursor, InMemoryScheduleStore, LastThread,
    ScheduleConfig, ScheduleEntry, ScheduleStore,
};
pub use db::{setup_database, Database, Event, RunJournal, RunMode, RunRecord};
pub use sheet::{apply_updates, load_roster, CellWrite, CsvWorkbook, RosterSource, Sheet, SheetWriter, WriteReport};
pub use sources::{parse_thread_link, ChatSource, JsonChatSource, ThreadRef};
pub use notify::{LogSink, MemorySink, Notification, NotificationSink};
pub use config::{validate_workspace_name, ColumnRef, TallyConfig, WorkspaceConfig};
pub use runner::{CheckOutcome, Runner, ScheduledRun, SubmissionOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
