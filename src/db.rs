// 🗄️ SQLite persistence - schedules, run history and the transition event log

use crate::column::Column;
use crate::error::{Result, TallyError};
use crate::schedule::{ScheduleConfig, ScheduleStore};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Runs kept per workspace; older ones are pruned on insert
pub const RUN_HISTORY_LIMIT: usize = 100;

// ============================================================================
// RECORDS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Attendance,
    Submission,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Attendance => "attendance",
            RunMode::Submission => "submission",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "attendance" => Some(RunMode::Attendance),
            "submission" => Some(RunMode::Submission),
            _ => None,
        }
    }
}

/// One completed run, as kept in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub recorded_at: DateTime<Utc>,
    pub workspace: String,
    pub mode: RunMode,
    pub thread_id: String,
    pub column: Column,
    pub total: usize,
    pub present_names: Vec<String>,
    pub absent_names: Vec<String>,
    pub unmatched_names: Vec<String>,
    pub cells_written: usize,

    /// Names whose cell could not be written
    pub failed_names: Vec<String>,
}

impl RunRecord {
    pub fn new(workspace: &str, mode: RunMode, thread_id: &str, column: Column) -> Self {
        RunRecord {
            run_id: uuid::Uuid::new_v4().to_string(),
            recorded_at: Utc::now(),
            workspace: workspace.to_string(),
            mode,
            thread_id: thread_id.to_string(),
            column,
            total: 0,
            present_names: Vec::new(),
            absent_names: Vec::new(),
            unmatched_names: Vec::new(),
            cells_written: 0,
            failed_names: Vec::new(),
        }
    }
}

/// Audit trail entry ("every change is an event")
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Sink for run history and transition events
pub trait RunJournal: Send + Sync {
    fn record_run(&self, record: &RunRecord) -> Result<()>;
    fn record_event(&self, event: &Event) -> Result<()>;
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Schedules (one JSON document per workspace)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schedules (
            workspace TEXT PRIMARY KEY,
            config TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Run history
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS run_history (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            recorded_at TEXT NOT NULL,
            workspace TEXT NOT NULL,
            mode TEXT NOT NULL,
            thread_id TEXT NOT NULL,
            column_letters TEXT NOT NULL,
            total INTEGER NOT NULL,
            present_names TEXT NOT NULL,
            absent_names TEXT NOT NULL,
            unmatched_names TEXT NOT NULL,
            cells_written INTEGER NOT NULL,
            failed_names TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail / event sourcing)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_run_history_workspace ON run_history(workspace, seq)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Events for one entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_timestamp(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: parse_json(5, &data_json)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// RUN HISTORY
// ============================================================================

/// Insert a run and prune the workspace down to the newest RUN_HISTORY_LIMIT
pub fn insert_run(conn: &Connection, record: &RunRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO run_history (
            run_id, recorded_at, workspace, mode, thread_id, column_letters, total,
            present_names, absent_names, unmatched_names, cells_written, failed_names
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            record.run_id,
            record.recorded_at.to_rfc3339(),
            record.workspace,
            record.mode.as_str(),
            record.thread_id,
            record.column.letters(),
            record.total as i64,
            serde_json::to_string(&record.present_names)?,
            serde_json::to_string(&record.absent_names)?,
            serde_json::to_string(&record.unmatched_names)?,
            record.cells_written as i64,
            serde_json::to_string(&record.failed_names)?,
        ],
    )?;

    let pruned = conn.execute(
        "DELETE FROM run_history
         WHERE workspace = ?1
           AND seq NOT IN (
               SELECT seq FROM run_history WHERE workspace = ?1 ORDER BY seq DESC LIMIT ?2
           )",
        params![record.workspace, RUN_HISTORY_LIMIT as i64],
    )?;
    if pruned > 0 {
        debug!(workspace = %record.workspace, pruned, "run history pruned");
    }

    Ok(())
}

/// Newest-first runs for a workspace
pub fn recent_runs(conn: &Connection, workspace: &str, limit: usize) -> Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, recorded_at, workspace, mode, thread_id, column_letters, total,
                present_names, absent_names, unmatched_names, cells_written, failed_names
         FROM run_history
         WHERE workspace = ?1
         ORDER BY seq DESC
         LIMIT ?2",
    )?;

    let runs = stmt
        .query_map(params![workspace, limit as i64], |row| {
            let recorded_at: String = row.get(1)?;
            let mode: String = row.get(3)?;
            let column: String = row.get(5)?;
            let total: i64 = row.get(6)?;
            let cells_written: i64 = row.get(10)?;

            Ok(RunRecord {
                run_id: row.get(0)?,
                recorded_at: parse_timestamp(1, &recorded_at)?,
                workspace: row.get(2)?,
                mode: RunMode::parse(&mode).ok_or_else(|| invalid_text(3, &mode))?,
                thread_id: row.get(4)?,
                column: Column::parse(&column).map_err(|_| invalid_text(5, &column))?,
                total: total as usize,
                present_names: parse_json(7, &row.get::<_, String>(7)?)?,
                absent_names: parse_json(8, &row.get::<_, String>(8)?)?,
                unmatched_names: parse_json(9, &row.get::<_, String>(9)?)?,
                cells_written: cells_written as usize,
                failed_names: parse_json(11, &row.get::<_, String>(11)?)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(runs)
}

fn parse_timestamp(column: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn parse_json<T: serde::de::DeserializeOwned>(column: usize, value: &str) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn invalid_text(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("unexpected value '{}'", value).into(),
    )
}

// ============================================================================
// DATABASE HANDLE
// ============================================================================

/// Shared connection implementing the schedule store and run journal
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Database {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| TallyError::Persistence {
            workspace: String::new(),
            reason: "database lock poisoned".to_string(),
        })
    }

    pub fn recent_runs(&self, workspace: &str, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.lock()?;
        recent_runs(&conn, workspace, limit)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        let conn = self.lock()?;
        get_events_for_entity(&conn, entity_type, entity_id)
    }
}

fn read_schedule(conn: &Connection, workspace: &str) -> Result<ScheduleConfig> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT config FROM schedules WHERE workspace = ?1",
            params![workspace],
            |row| row.get(0),
        )
        .optional()?;

    match stored {
        Some(json) => Ok(serde_json::from_str(&json)?),
        None => Ok(ScheduleConfig::default()),
    }
}

impl ScheduleStore for Database {
    fn load(&self, workspace: &str) -> Result<ScheduleConfig> {
        let conn = self.lock()?;
        read_schedule(&conn, workspace)
    }

    fn update(
        &self,
        workspace: &str,
        apply: &mut dyn FnMut(&mut ScheduleConfig) -> Result<()>,
    ) -> Result<ScheduleConfig> {
        let mut conn = self.lock()?;

        // IMMEDIATE takes the write lock up front so concurrent processes serialize here
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut config = read_schedule(&tx, workspace)?;
        apply(&mut config)?;

        tx.execute(
            "INSERT INTO schedules (workspace, config, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(workspace) DO UPDATE SET config = excluded.config, updated_at = excluded.updated_at",
            params![workspace, serde_json::to_string(&config)?, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        Ok(config)
    }
}

impl RunJournal for Database {
    fn record_run(&self, record: &RunRecord) -> Result<()> {
        let conn = self.lock()?;
        insert_run(&conn, record)
    }

    fn record_event(&self, event: &Event) -> Result<()> {
        let conn = self.lock()?;
        insert_event(&conn, event)
    }
}

// ============================================================================
// TESTS
// ============================================================================
