// 🗓️ Schedules - Recurring check slots and the column cursor that walks them
//
// State machine per schedule entry:
//   ADVANCING --(current < end)--> ADVANCING   (cursor moves one column right)
//   ADVANCING --(current == end)--> AT_END     (entry retired, schedule off when empty)
//
// Persisted state is only ever touched through ScheduleStore::update, which
// applies a closure as one read-modify-write.

use crate::column::Column;
use crate::error::{Result, TallyError};
use crate::notify::NotificationSink;
use crate::summary::retirement_text;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info, warn};

pub const DEFAULT_START_COLUMN: &str = "H";
pub const DEFAULT_END_COLUMN: &str = "O";

// ============================================================================
// SCHEDULE STATE
// ============================================================================

/// One recurring check slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// Lowercase weekday key: "mon", "tue", ...
    pub day: String,

    /// When the tracking thread is opened ("HH:MM")
    pub create_time: String,

    /// When replies are reconciled ("HH:MM")
    pub check_time: String,

    /// Column the next check writes to
    pub column: Column,
}

impl ScheduleEntry {
    pub fn new(day: &str, create_time: &str, check_time: &str, column: Column) -> Self {
        ScheduleEntry {
            day: day.trim().to_lowercase(),
            create_time: create_time.to_string(),
            check_time: check_time.to_string(),
            column,
        }
    }
}

/// Inclusive column range walked by auto-advance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoColumn {
    pub start: Column,
    pub end: Column,
}

impl AutoColumn {
    pub fn new(start: Column, end: Column) -> Result<Self> {
        if start > end {
            return Err(TallyError::InvalidColumnRange {
                start: start.letters(),
                end: end.letters(),
            });
        }
        Ok(AutoColumn { start, end })
    }

    pub fn contains(&self, column: Column) -> bool {
        self.start <= column && column <= self.end
    }

    /// `CursorOutOfRange` unless `column` lies inside the range
    pub fn check(&self, column: Column) -> Result<()> {
        if self.contains(column) {
            return Ok(());
        }
        Err(TallyError::CursorOutOfRange {
            current: column.letters(),
            start: self.start.letters(),
            end: self.end.letters(),
        })
    }
}

impl Default for AutoColumn {
    fn default() -> Self {
        AutoColumn {
            start: Column::from_index(7),
            end: Column::from_index(14),
        }
    }
}

/// Thread opened for a given day, cached so the check does not search again
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastThread {
    pub thread_id: String,
    pub date: NaiveDate,
    pub column: Column,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub entries: Vec<ScheduleEntry>,

    /// None disables column auto-advance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_column: Option<AutoColumn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_thread: Option<LastThread>,
}

impl ScheduleConfig {
    /// Append an entry; its column must sit inside the auto-advance range
    pub fn add_entry(&mut self, entry: ScheduleEntry) -> Result<()> {
        if let Some(range) = self.auto_column {
            range.check(entry.column)?;
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Remove by position; an emptied list turns the schedule off
    pub fn remove_entry(&mut self, index: usize) -> Result<ScheduleEntry> {
        if index >= self.entries.len() {
            return Err(TallyError::ScheduleIndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let removed = self.entries.remove(index);
        if self.entries.is_empty() {
            self.enabled = false;
        }
        Ok(removed)
    }

    /// Flip `enabled` and return the new value
    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Replace the auto-advance range. Every existing entry must fit inside it.
    pub fn set_auto_column(&mut self, range: Option<AutoColumn>) -> Result<()> {
        if let Some(range) = range {
            for entry in &self.entries {
                range.check(entry.column)?;
            }
        }
        self.auto_column = range;
        Ok(())
    }

    /// Entries due on a weekday key
    pub fn entries_for_day(&self, day: &str) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        let day = day.to_lowercase();
        self.entries.iter().filter(move |e| e.day == day)
    }

    /// Cached thread, only if it was opened on `date`
    pub fn thread_for(&self, date: NaiveDate) -> Option<&LastThread> {
        self.last_thread.as_ref().filter(|t| t.date == date)
    }
}

/// Weekday key used by schedule entries ("mon".."sun")
pub fn day_key(date: NaiveDate) -> String {
    date.format("%a").to_string().to_lowercase()
}

// ============================================================================
// SCHEDULE STORE
// ============================================================================

/// Per-workspace schedule persistence.
///
/// `update` is the only write path: it loads the workspace's config, applies
/// `apply`, and persists the result as one step. When `apply` fails nothing
/// is written. Implementations serialize concurrent updates per workspace.
pub trait ScheduleStore: Send + Sync {
    fn load(&self, workspace: &str) -> Result<ScheduleConfig>;

    fn update(
        &self,
        workspace: &str,
        apply: &mut dyn FnMut(&mut ScheduleConfig) -> Result<()>,
    ) -> Result<ScheduleConfig>;
}

#[derive(Debug, Default)]
pub struct InMemoryScheduleStore {
    schedules: Mutex<HashMap<String, ScheduleConfig>>,
}

impl InMemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: seed one workspace
    pub fn with_schedule(self, workspace: &str, config: ScheduleConfig) -> Self {
        if let Ok(mut schedules) = self.schedules.lock() {
            schedules.insert(workspace.to_string(), config);
        }
        self
    }

    fn poisoned(workspace: &str) -> TallyError {
        TallyError::Persistence {
            workspace: workspace.to_string(),
            reason: "schedule lock poisoned".to_string(),
        }
    }
}

impl ScheduleStore for InMemoryScheduleStore {
    fn load(&self, workspace: &str) -> Result<ScheduleConfig> {
        let schedules = self.schedules.lock().map_err(|_| Self::poisoned(workspace))?;
        Ok(schedules.get(workspace).cloned().unwrap_or_default())
    }

    fn update(
        &self,
        workspace: &str,
        apply: &mut dyn FnMut(&mut ScheduleConfig) -> Result<()>,
    ) -> Result<ScheduleConfig> {
        let mut schedules = self.schedules.lock().map_err(|_| Self::poisoned(workspace))?;
        let mut config = schedules.get(workspace).cloned().unwrap_or_default();
        apply(&mut config)?;
        schedules.insert(workspace.to_string(), config.clone());
        Ok(config)
    }
}

// ============================================================================
// COLUMN CURSOR
// ============================================================================

/// Active column of one schedule entry within its auto-advance range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnCursor {
    pub current: Column,
    pub start: Column,
    pub end: Column,

    /// Owning entry: weekday key
    pub day: String,

    /// Owning entry: the check slot the cursor is bound to
    pub check_time: String,
}

impl ColumnCursor {
    pub fn for_entry(entry: &ScheduleEntry, range: AutoColumn) -> Self {
        ColumnCursor {
            current: entry.column,
            start: range.start,
            end: range.end,
            day: entry.day.clone(),
            check_time: entry.check_time.clone(),
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.current == self.end
    }

    /// `CursorOutOfRange` when `current` has left `[start, end]`
    pub fn check_range(&self) -> Result<()> {
        AutoColumn {
            start: self.start,
            end: self.end,
        }
        .check(self.current)
    }

    fn owns(&self, entry: &ScheduleEntry) -> bool {
        entry.day == self.day && entry.check_time == self.check_time && entry.column == self.current
    }

    fn not_found(&self) -> TallyError {
        TallyError::ScheduleEntryNotFound {
            day: self.day.clone(),
            column: self.current.letters(),
        }
    }
}

// ============================================================================
// COLUMN ADVANCER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum AdvanceOutcome {
    /// Cursor moved right; entry still active
    Advanced { from: Column, to: Column },

    /// Entry reached the end of its range and was removed
    Retired {
        column: Column,
        schedule_disabled: bool,
    },
}

impl AdvanceOutcome {
    pub fn event_type(&self) -> &'static str {
        match self {
            AdvanceOutcome::Advanced { .. } => "column_advanced",
            AdvanceOutcome::Retired { .. } => "schedule_entry_retired",
        }
    }
}

pub struct ColumnAdvancer<'a> {
    store: &'a dyn ScheduleStore,
    notifier: &'a dyn NotificationSink,
    recipient: Option<String>,
    label: Option<String>,
}

impl<'a> ColumnAdvancer<'a> {
    pub fn new(store: &'a dyn ScheduleStore, notifier: &'a dyn NotificationSink) -> Self {
        ColumnAdvancer {
            store,
            notifier,
            recipient: None,
            label: None,
        }
    }

    /// Builder pattern: who receives the completion notice on retirement
    pub fn with_recipient(mut self, recipient: Option<&str>) -> Self {
        self.recipient = recipient.map(str::to_string);
        self
    }

    /// Builder pattern: workspace name shown in the completion notice
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Run one transition for `cursor`, persisting it through the store.
    ///
    /// Store failures surface as `Persistence`; nothing is retried.
    pub fn advance(&self, workspace: &str, cursor: &ColumnCursor) -> Result<AdvanceOutcome> {
        cursor.check_range()?;

        if cursor.is_at_end() {
            self.retire(workspace, cursor)
        } else {
            self.step(workspace, cursor)
        }
    }

    fn step(&self, workspace: &str, cursor: &ColumnCursor) -> Result<AdvanceOutcome> {
        let next = cursor.current.next();
        debug_assert!(next <= cursor.end);

        self.persist(workspace, &mut |config| {
            let entry = config
                .entries
                .iter_mut()
                .find(|e| cursor.owns(e))
                .ok_or_else(|| cursor.not_found())?;
            entry.column = next;
            Ok(())
        })?;

        info!(
            workspace,
            day = %cursor.day,
            from = %cursor.current,
            to = %next,
            "column advanced"
        );

        Ok(AdvanceOutcome::Advanced {
            from: cursor.current,
            to: next,
        })
    }

    fn retire(&self, workspace: &str, cursor: &ColumnCursor) -> Result<AdvanceOutcome> {
        let mut schedule_disabled = false;

        self.persist(workspace, &mut |config| {
            let index = config
                .entries
                .iter()
                .position(|e| cursor.owns(e))
                .ok_or_else(|| cursor.not_found())?;
            config.entries.remove(index);
            if config.entries.is_empty() {
                config.enabled = false;
                schedule_disabled = true;
            }
            Ok(())
        })?;

        info!(
            workspace,
            day = %cursor.day,
            column = %cursor.current,
            schedule_disabled,
            "schedule entry retired"
        );

        // Retirement is already persisted; a failed notice only gets logged
        match &self.recipient {
            Some(recipient) => {
                let label = self.label.as_deref().unwrap_or(workspace);
                let text = retirement_text(label, &cursor.day, cursor.current, schedule_disabled);
                if let Err(e) = self.notifier.send_direct(recipient, &text) {
                    warn!(workspace, error = %e, "completion notice not delivered");
                }
            }
            None => debug!(workspace, "no recipient for completion notice"),
        }

        Ok(AdvanceOutcome::Retired {
            column: cursor.current,
            schedule_disabled,
        })
    }

    fn persist(
        &self,
        workspace: &str,
        apply: &mut dyn FnMut(&mut ScheduleConfig) -> Result<()>,
    ) -> Result<()> {
        match self.store.update(workspace, apply) {
            Ok(_) => Ok(()),
            Err(e @ TallyError::ScheduleEntryNotFound { .. }) => Err(e),
            Err(e @ TallyError::Persistence { .. }) => Err(e),
            Err(e) => Err(TallyError::Persistence {
                workspace: workspace.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
