// 🏃 Run orchestration - one invocation per workspace
//
// Order inside a check:
//   replies → roster → reconcile → sheet write → notifications → history
// Scheduled checks advance the column cursor only after the sheet write
// (write-then-persist: a failed advance never rolls back written cells).

use crate::column::Column;
use crate::config::{TallyConfig, WorkspaceConfig};
use crate::db::{Event, RunJournal, RunMode, RunRecord};
use crate::error::{Result, TallyError};
use crate::notify::NotificationSink;
use crate::reconciliation::{AttendanceReport, ReconciliationEngine, SubmissionReport};
use crate::schedule::{
    day_key, AdvanceOutcome, ColumnAdvancer, ColumnCursor, LastThread, ScheduleConfig, ScheduleEntry,
    ScheduleStore,
};
use crate::sheet::{apply_updates, load_roster, Sheet, WriteReport};
use crate::sources::{ChatSource, ThreadRef};
use crate::summary::{
    attendance_report_text, render_completion, submission_report_text, RunSummary, SourceCounts,
};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    pub report: AttendanceReport,
    pub summary: RunSummary,
    pub write: WriteReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub report: SubmissionReport,
    pub summary: RunSummary,
    pub write: WriteReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScheduledRun {
    /// Schedule switched off; nothing read or written
    Disabled,

    /// No entry for this day (and check time)
    NoEntry { day: String },

    Completed {
        check: Box<CheckOutcome>,
        advance: Option<AdvanceOutcome>,
    },
}

pub struct Runner<'a> {
    config: &'a TallyConfig,
    chat: &'a dyn ChatSource,
    sheet: &'a dyn Sheet,
    notifier: &'a dyn NotificationSink,
    store: &'a dyn ScheduleStore,
    journal: Option<&'a dyn RunJournal>,
    engine: ReconciliationEngine,
}

impl<'a> Runner<'a> {
    pub fn new(
        config: &'a TallyConfig,
        chat: &'a dyn ChatSource,
        sheet: &'a dyn Sheet,
        notifier: &'a dyn NotificationSink,
        store: &'a dyn ScheduleStore,
    ) -> Result<Self> {
        Ok(Runner {
            config,
            chat,
            sheet,
            notifier,
            store,
            journal: None,
            engine: ReconciliationEngine::with_extractor(config.name_extractor()?),
        })
    }

    /// Builder pattern: keep run history and transition events
    pub fn with_journal(mut self, journal: &'a dyn RunJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    // ========================================================================
    // ATTENDANCE
    // ========================================================================

    /// Manual check of one thread into one column
    pub fn run_attendance_check(
        &self,
        workspace: &str,
        thread_id: &str,
        column: Column,
    ) -> Result<CheckOutcome> {
        let ws = self.config.workspace(workspace)?;
        self.check(workspace, ws, thread_id, column, None)
    }

    fn check(
        &self,
        workspace: &str,
        ws: &WorkspaceConfig,
        thread_id: &str,
        column: Column,
        thread_author: Option<&str>,
    ) -> Result<CheckOutcome> {
        info!(workspace, thread = thread_id, column = %column, "attendance check started");

        let messages = self.chat.replies(&ws.channel_id, thread_id)?;
        if messages.is_empty() {
            return Err(TallyError::NoReplies {
                thread_id: thread_id.to_string(),
            });
        }

        let roster = load_roster(self.sheet, &ws.sheet_name, ws.name_column()?, ws.start_row)?;
        let report = self.engine.reconcile_attendance(
            thread_id,
            &messages,
            &roster,
            &ws.duplicate_names,
            column,
            ws.mark_absent,
        )?;

        let write = apply_updates(self.sheet, &ws.sheet_name, &report.records, self.config.write_pacing());

        let summary = self.config.summary_builder().summarize(
            &report.matched_names,
            &report.absent_names,
            &report.unmatched_names,
            report.by_source,
        );

        let reply = render_completion(&ws.completion_message, &summary);
        self.deliver(
            self.notifier.post_thread_reply(&ws.channel_id, thread_id, &reply),
            "thread reply",
        );

        if let Some(recipient) = ws.notification_user_id.as_deref().or(thread_author) {
            let mut text = attendance_report_text(column, &summary, &report.present_names);
            append_write_failures(&mut text, &write);
            self.deliver(self.notifier.send_direct(recipient, &text), "report");
        }

        let mut record = RunRecord::new(workspace, RunMode::Attendance, thread_id, column);
        record.total = summary.total_roster;
        record.present_names = report.present_names.clone();
        record.absent_names = report.absent_names.clone();
        record.unmatched_names = report.unmatched_names.clone();
        record.cells_written = write.written;
        record.failed_names = write.failed.clone();
        self.journal_run(&record);

        info!(
            workspace,
            present = summary.matched_count,
            absent = summary.absent_count,
            written = write.written,
            failed = write.failed.len(),
            "attendance check finished"
        );

        Ok(CheckOutcome {
            report,
            summary,
            write,
        })
    }

    // ========================================================================
    // SCHEDULED
    // ========================================================================

    /// Check today's thread for the entry due `today`, then advance its column.
    ///
    /// `check_time` picks one entry when a day has several.
    pub fn run_scheduled_check(
        &self,
        workspace: &str,
        today: NaiveDate,
        check_time: Option<&str>,
    ) -> Result<ScheduledRun> {
        let ws = self.config.workspace(workspace)?;
        let schedule = self.store.load(workspace)?;

        if !schedule.enabled {
            info!(workspace, "schedule disabled, skipping check");
            return Ok(ScheduledRun::Disabled);
        }

        let day = day_key(today);
        let Some(entry) = due_entry(&schedule, &day, check_time) else {
            info!(workspace, day = %day, "no schedule entry due");
            return Ok(ScheduledRun::NoEntry { day });
        };

        // Nothing is written for an entry that could never advance
        let cursor = match schedule.auto_column {
            Some(range) => {
                let cursor = ColumnCursor::for_entry(entry, range);
                cursor.check_range()?;
                Some(cursor)
            }
            None => None,
        };

        let thread = self.resolve_thread(workspace, ws, &schedule, today)?;

        let check = self.check(
            workspace,
            ws,
            &thread.thread_id,
            entry.column,
            thread.author_id.as_deref(),
        )?;

        let advance = match cursor {
            Some(cursor) => {
                let recipient = ws.notification_user_id.as_deref().or(thread.author_id.as_deref());
                let outcome = ColumnAdvancer::new(self.store, self.notifier)
                    .with_recipient(recipient)
                    .with_label(ws.label(workspace))
                    .advance(workspace, &cursor)?;
                self.journal_transition(workspace, &outcome);
                Some(outcome)
            }
            None => None,
        };

        Ok(ScheduledRun::Completed {
            check: Box::new(check),
            advance,
        })
    }

    /// Post today's tracking thread and cache it for the check
    pub fn open_scheduled_thread(
        &self,
        workspace: &str,
        today: NaiveDate,
        check_time: Option<&str>,
    ) -> Result<Option<String>> {
        let ws = self.config.workspace(workspace)?;
        let schedule = self.store.load(workspace)?;

        if !schedule.enabled {
            info!(workspace, "schedule disabled, no thread opened");
            return Ok(None);
        }

        let day = day_key(today);
        let Some(entry) = due_entry(&schedule, &day, check_time) else {
            info!(workspace, day = %day, "no schedule entry due");
            return Ok(None);
        };
        let column = entry.column;

        let thread_id = self.notifier.open_thread(&ws.channel_id, &ws.thread_message)?;

        self.store.update(workspace, &mut |config| {
            config.last_thread = Some(LastThread {
                thread_id: thread_id.clone(),
                date: today,
                column,
            });
            Ok(())
        })?;

        info!(workspace, thread = %thread_id, column = %column, "tracking thread opened");
        Ok(Some(thread_id))
    }

    // ========================================================================
    // SUBMISSIONS
    // ========================================================================

    pub fn run_submission_check(
        &self,
        workspace: &str,
        thread_id: &str,
        column: Column,
    ) -> Result<SubmissionOutcome> {
        let ws = self.config.workspace(workspace)?;
        info!(workspace, thread = thread_id, column = %column, "submission check started");

        let messages = self.chat.replies(ws.assignment_channel(), thread_id)?;
        if messages.is_empty() {
            return Err(TallyError::NoReplies {
                thread_id: thread_id.to_string(),
            });
        }

        let roster = load_roster(
            self.sheet,
            &ws.assignment_sheet_name,
            ws.assignment_name_column()?,
            ws.assignment_start_row(),
        )?;
        let report =
            self.engine
                .reconcile_submissions(thread_id, &messages, &roster, column, ws.mark_absent)?;

        let write = apply_updates(
            self.sheet,
            &ws.assignment_sheet_name,
            &report.records,
            self.config.write_pacing(),
        );

        let summary = self.config.summary_builder().summarize(
            &report.submitted_names,
            &report.not_submitted_names,
            &report.unregistered_names,
            SourceCounts::default(),
        );

        if let Some(recipient) = ws.notification_user_id.as_deref() {
            let mut text = submission_report_text(column, &summary, &report.submitted_names);
            append_write_failures(&mut text, &write);
            self.deliver(self.notifier.send_direct(recipient, &text), "report");
        }

        let mut record = RunRecord::new(workspace, RunMode::Submission, thread_id, column);
        record.total = summary.total_roster;
        record.present_names = report.submitted_names.clone();
        record.absent_names = report.not_submitted_names.clone();
        record.unmatched_names = report.unregistered_names.clone();
        record.cells_written = write.written;
        record.failed_names = write.failed.clone();
        self.journal_run(&record);

        Ok(SubmissionOutcome {
            report,
            summary,
            write,
        })
    }

    // ========================================================================
    // HELPERS
    // ========================================================================

    /// Today's cached thread when the chat source knows it, else the latest bot thread
    fn resolve_thread(
        &self,
        workspace: &str,
        ws: &WorkspaceConfig,
        schedule: &ScheduleConfig,
        today: NaiveDate,
    ) -> Result<ThreadRef> {
        if let Some(cached) = schedule.thread_for(today) {
            if self.chat.has_thread(&ws.channel_id, &cached.thread_id)? {
                info!(workspace, thread = %cached.thread_id, "using cached thread");
                return Ok(ThreadRef {
                    thread_id: cached.thread_id.clone(),
                    author_id: None,
                });
            }
            warn!(
                workspace,
                thread = %cached.thread_id,
                "cached thread unknown to chat source, searching for the latest"
            );
        }

        self.chat
            .find_latest_thread(&ws.channel_id)?
            .ok_or_else(|| TallyError::ThreadNotFound(workspace.to_string()))
    }

    /// Notifications follow the sheet write; a failed one is logged, not raised
    fn deliver(&self, result: Result<()>, what: &str) {
        if let Err(e) = result {
            warn!(error = %e, "{} not delivered", what);
        }
    }

    fn journal_run(&self, record: &RunRecord) {
        if let Some(journal) = self.journal {
            if let Err(e) = journal.record_run(record) {
                warn!(workspace = %record.workspace, error = %e, "run history not saved");
            }
        }
    }

    fn journal_transition(&self, workspace: &str, outcome: &AdvanceOutcome) {
        let Some(journal) = self.journal else {
            return;
        };
        let data = serde_json::to_value(outcome).unwrap_or_default();
        let event = Event::new(outcome.event_type(), "schedule", workspace, data, "scheduler");
        if let Err(e) = journal.record_event(&event) {
            warn!(workspace, error = %e, "transition event not saved");
        }
    }
}

fn due_entry<'s>(
    schedule: &'s ScheduleConfig,
    day: &str,
    check_time: Option<&str>,
) -> Option<&'s ScheduleEntry> {
    schedule
        .entries_for_day(day)
        .find(|e| check_time.map_or(true, |t| e.check_time == t))
}

fn append_write_failures(text: &mut String, write: &WriteReport) {
    if !write.failed.is_empty() {
        text.push_str(&format!(
            "\n\n⚠️ Not written ({}): {}",
            write.failed.len(),
            write.failed.join(", ")
        ));
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::RawMessage;
    use crate::notify::{MemorySink, Notification};
    use crate::schedule::{AutoColumn, InMemoryScheduleStore};
    use crate::sheet::{CellWrite, RosterSource, SheetWriter};
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeChat {
        threads: HashMap<String, Vec<RawMessage>>,
        latest: Option<ThreadRef>,
    }

    impl ChatSource for FakeChat {
        fn replies(&self, _channel_id: &str, thread_id: &str) -> Result<Vec<RawMessage>> {
            Ok(self.threads.get(thread_id).cloned().unwrap_or_default())
        }

        fn find_latest_thread(&self, _channel_id: &str) -> Result<Option<ThreadRef>> {
            Ok(self.latest.clone())
        }

        fn has_thread(&self, _channel_id: &str, thread_id: &str) -> Result<bool> {
            Ok(self.threads.contains_key(thread_id))
        }
    }

    #[derive(Default)]
    struct FakeSheet {
        names: Vec<String>,
        cells: Mutex<Vec<CellWrite>>,
    }

    impl RosterSource for FakeSheet {
        fn read_column(&self, _sheet: &str, _column: Column, _start_row: usize) -> Result<Vec<String>> {
            Ok(self.names.clone())
        }
    }

    impl SheetWriter for FakeSheet {
        fn write_batch(&self, _sheet: &str, cells: &[CellWrite]) -> Result<usize> {
            self.cells.lock().unwrap().extend_from_slice(cells);
            Ok(cells.len())
        }

        fn write_cell(&self, _sheet: &str, cell: &CellWrite) -> Result<()> {
            self.cells.lock().unwrap().push(cell.clone());
            Ok(())
        }
    }

    fn create_test_config() -> TallyConfig {
        let mut config = TallyConfig::default();
        config.workspaces.insert(
            "class-a".to_string(),
            WorkspaceConfig {
                channel_id: "C1".to_string(),
                start_row: 3,
                notification_user_id: Some("UADMIN".to_string()),
                ..WorkspaceConfig::default()
            },
        );
        config
    }

    fn create_test_chat() -> FakeChat {
        let mut threads = HashMap::new();
        threads.insert(
            "100.1".to_string(),
            vec![
                RawMessage::new("Kim/checked-in", "U1"),
                RawMessage::new("checked-in", "U2").with_display_name("Park_ClassA"),
                RawMessage::new("Choi checked-in", "U3"),
            ],
        );
        FakeChat {
            threads,
            latest: Some(ThreadRef {
                thread_id: "100.1".to_string(),
                author_id: Some("UBOT".to_string()),
            }),
        }
    }

    fn create_test_sheet() -> FakeSheet {
        FakeSheet {
            names: vec!["Kim".into(), "Lee".into(), "Park".into()],
            ..FakeSheet::default()
        }
    }

    fn col(letters: &str) -> Column {
        Column::parse(letters).unwrap()
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()
    }

    fn create_test_schedule(column: &str) -> ScheduleConfig {
        ScheduleConfig {
            enabled: true,
            entries: vec![ScheduleEntry::new("mon", "09:00", "09:10", col(column))],
            auto_column: Some(AutoColumn::default()),
            last_thread: None,
        }
    }

    #[test]
    fn test_manual_check_writes_and_notifies() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new();
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let outcome = runner.run_attendance_check("class-a", "100.1", col("K")).unwrap();

        assert_eq!(outcome.report.matched_names, vec!["Kim", "Park"]);
        assert_eq!(outcome.report.absent_names, vec!["Lee"]);
        assert_eq!(outcome.report.unmatched_names, vec!["Choi"]);
        assert_eq!(outcome.summary.by_source, SourceCounts { pattern: 2, fallback: 1 });
        assert_eq!(outcome.write.written, 3);

        let cells = sheet.cells.lock().unwrap();
        let lee = cells.iter().find(|c| c.name == "Lee").unwrap();
        assert_eq!((lee.row, lee.value.as_str()), (4, "X"));

        let sent = sink.sent();
        assert!(matches!(&sent[0], Notification::ThreadReply { text, .. } if text.contains("Present: 2 / Absent: 1")));
        assert_eq!(sink.direct_messages()[0].0, "UADMIN");
    }

    #[test]
    fn test_empty_thread_aborts_before_writing() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new();
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let err = runner.run_attendance_check("class-a", "999.9", col("K")).unwrap_err();
        assert!(matches!(err, TallyError::NoReplies { .. }));
        assert!(sheet.cells.lock().unwrap().is_empty());
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_unknown_workspace() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new();
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        assert!(matches!(
            runner.run_attendance_check("class-z", "100.1", col("K")),
            Err(TallyError::WorkspaceNotFound(_))
        ));
    }

    #[test]
    fn test_scheduled_check_advances_after_write() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("K"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        match runner.run_scheduled_check("class-a", monday(), None).unwrap() {
            ScheduledRun::Completed { check, advance } => {
                assert!(check.report.records.iter().all(|r| r.column == col("K").index()));
                assert_eq!(advance, Some(AdvanceOutcome::Advanced { from: col("K"), to: col("L") }));
            }
            other => panic!("expected completed run, got {:?}", other),
        }
        assert_eq!(store.load("class-a").unwrap().entries[0].column, col("L"));
    }

    #[test]
    fn test_scheduled_check_skips_when_disabled_or_not_due() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();

        let mut disabled = create_test_schedule("K");
        disabled.enabled = false;
        let store = InMemoryScheduleStore::new().with_schedule("class-a", disabled);
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();
        assert!(matches!(
            runner.run_scheduled_check("class-a", monday(), None).unwrap(),
            ScheduledRun::Disabled
        ));

        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("K"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();
        let tuesday = monday().succ_opt().unwrap();
        assert!(matches!(
            runner.run_scheduled_check("class-a", tuesday, None).unwrap(),
            ScheduledRun::NoEntry { .. }
        ));
        assert!(sheet.cells.lock().unwrap().is_empty());
    }

    #[test]
    fn test_open_thread_caches_it_for_today() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("H"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let thread_id = runner.open_scheduled_thread("class-a", monday(), None).unwrap().unwrap();

        let cached = store.load("class-a").unwrap().last_thread.unwrap();
        assert_eq!(cached.thread_id, thread_id);
        assert_eq!(cached.date, monday());
        assert_eq!(cached.column, col("H"));
        assert!(matches!(&sink.sent()[0], Notification::ThreadOpened { .. }));
    }

    #[test]
    fn test_known_cached_thread_is_used_by_check() {
        let config = create_test_config();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();

        let mut chat = create_test_chat();
        chat.threads.insert("300.1".to_string(), vec![RawMessage::new("Lee/checked-in", "U4")]);

        let mut schedule = create_test_schedule("H");
        schedule.last_thread = Some(LastThread {
            thread_id: "300.1".to_string(),
            date: monday(),
            column: col("H"),
        });
        let store = InMemoryScheduleStore::new().with_schedule("class-a", schedule);
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let run = runner.run_scheduled_check("class-a", monday(), None).unwrap();
        let ScheduledRun::Completed { check, .. } = run else {
            panic!("expected completed run, got {:?}", run);
        };
        assert_eq!(check.report.thread_id, "300.1");
        assert_eq!(check.report.matched_names, vec!["Lee"]);
    }

    #[test]
    fn test_unknown_cached_thread_falls_back_to_latest() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("H"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        // The opened id comes from the sink, which the chat source has never seen
        runner.open_scheduled_thread("class-a", monday(), None).unwrap().unwrap();
        let run = runner.run_scheduled_check("class-a", monday(), None).unwrap();
        let ScheduledRun::Completed { check, advance } = run else {
            panic!("expected completed run, got {:?}", run);
        };

        assert_eq!(check.report.thread_id, "100.1");
        assert_eq!(advance, Some(AdvanceOutcome::Advanced { from: col("H"), to: col("I") }));
    }

    #[test]
    fn test_retirement_notice_uses_display_name() {
        let mut config = create_test_config();
        if let Some(ws) = config.workspaces.get_mut("class-a") {
            ws.display_name = "Class A".to_string();
        }
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("O"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let run = runner.run_scheduled_check("class-a", monday(), None).unwrap();
        let ScheduledRun::Completed { advance, .. } = run else {
            panic!("expected completed run, got {:?}", run);
        };
        assert_eq!(advance, Some(AdvanceOutcome::Retired { column: col("O"), schedule_disabled: true }));

        let notices = sink.direct_messages();
        let (recipient, text) = notices.last().unwrap();
        assert_eq!(recipient, "UADMIN");
        assert!(text.starts_with("🏁 [Class A]"));
    }

    #[test]
    fn test_out_of_range_entry_is_rejected_before_writing() {
        let config = create_test_config();
        let chat = create_test_chat();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("C"));
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        for _ in 0..2 {
            let err = runner.run_scheduled_check("class-a", monday(), None).unwrap_err();
            assert!(matches!(err, TallyError::CursorOutOfRange { .. }));
        }

        assert!(sheet.cells.lock().unwrap().is_empty());
        assert!(sink.sent().is_empty());
        assert_eq!(store.load("class-a").unwrap().entries[0].column, col("C"));
    }

    #[test]
    fn test_scheduled_check_without_thread() {
        let config = create_test_config();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new().with_schedule("class-a", create_test_schedule("H"));
        let chat = FakeChat {
            threads: HashMap::new(),
            latest: None,
        };
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        assert!(matches!(
            runner.run_scheduled_check("class-a", monday(), None),
            Err(TallyError::ThreadNotFound(_))
        ));
    }

    #[test]
    fn test_submission_check() {
        let config = create_test_config();
        let sheet = create_test_sheet();
        let sink = MemorySink::new();
        let store = InMemoryScheduleStore::new();

        let mut threads = HashMap::new();
        threads.insert(
            "200.1".to_string(),
            vec![
                RawMessage::new("here is my work", "U1").with_display_name("Kim"),
                RawMessage::new("done", "U3").with_real_name("Lee (student)"),
            ],
        );
        let chat = FakeChat { threads, latest: None };
        let runner = Runner::new(&config, &chat, &sheet, &sink, &store).unwrap();

        let outcome = runner.run_submission_check("class-a", "200.1", col("C")).unwrap();
        assert_eq!(outcome.report.submitted_names, vec!["Kim", "Lee"]);
        assert_eq!(outcome.report.not_submitted_names, vec!["Park"]);
        assert_eq!(outcome.write.written, 3);
        assert_eq!(sink.direct_messages().len(), 1);
    }
}
