// ⚖️ Reconciliation Engine - Replies vs roster
// Pipeline per run:
//   messages → NameExtractor → DuplicateResolver → RosterMatcher → AbsenceReconciler → records
//
// Invariant (mark_absent = true):
//   matched ∪ absent == roster names  and  matched ∩ absent == ∅

use crate::column::Column;
use crate::deduplication::{DropReason, DuplicateGroups, DuplicateResolver};
use crate::error::{Result, TallyError};
use crate::message::{AttendanceRecord, AttendanceStatus, RawMessage};
use crate::parser::{NameExtractor, SubmissionExtractor};
use crate::roster::{Roster, RosterMatcher};
use crate::summary::SourceCounts;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

// ============================================================================
// ABSENCE RECONCILER
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absences {
    /// Roster names not matched, in roster order
    pub absent_names: Vec<String>,

    /// ABSENT records; empty when absence marking is off
    pub records: Vec<AttendanceRecord>,
}

pub struct AbsenceReconciler;

impl AbsenceReconciler {
    /// Complement of `matched_names` over the roster.
    ///
    /// With `mark_absent` off no record is produced for absentees, so whatever
    /// the sheet already holds for them stays untouched.
    pub fn reconcile(
        roster: &Roster,
        matched_names: &HashSet<String>,
        mark_absent: bool,
        column: usize,
    ) -> Absences {
        let mut absences = Absences::default();

        for (name, row) in roster.iter() {
            if matched_names.contains(name) {
                continue;
            }
            absences.absent_names.push(name.to_string());
            if mark_absent {
                absences.records.push(AttendanceRecord::absent(name, row, column));
            }
        }

        absences
    }
}

// ============================================================================
// RUN REPORTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceReport {
    pub thread_id: String,
    pub column: Column,
    pub total_roster: usize,

    /// Labels written as present (duplicate-group names use their resolved label)
    pub present_names: Vec<String>,

    /// Roster names counted as present
    pub matched_names: Vec<String>,

    pub absent_names: Vec<String>,

    /// Extracted names with no roster row
    pub unmatched_names: Vec<String>,

    pub dropped: Vec<DropReason>,
    pub by_source: SourceCounts,

    /// PRESENT records first, then ABSENT records
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceReport {
    pub fn warnings(&self) -> impl Iterator<Item = &DropReason> {
        self.dropped.iter().filter(|d| d.is_warning())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReport {
    pub thread_id: String,
    pub column: Column,
    pub total_roster: usize,

    /// Roster names that posted, in roster order
    pub submitted_names: Vec<String>,

    pub not_submitted_names: Vec<String>,

    /// Posters whose name is not on the roster
    pub unregistered_names: Vec<String>,

    pub records: Vec<AttendanceRecord>,
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

pub struct ReconciliationEngine {
    extractor: NameExtractor,
    submissions: SubmissionExtractor,
}

impl ReconciliationEngine {
    pub fn new() -> Self {
        Self::with_extractor(NameExtractor::new())
    }

    pub fn with_extractor(extractor: NameExtractor) -> Self {
        ReconciliationEngine {
            extractor,
            submissions: SubmissionExtractor::new(),
        }
    }

    pub fn extractor(&self) -> &NameExtractor {
        &self.extractor
    }

    /// Check-in run: who replied with a name, who is absent
    pub fn reconcile_attendance(
        &self,
        thread_id: &str,
        messages: &[RawMessage],
        roster: &Roster,
        groups: &DuplicateGroups,
        column: Column,
        mark_absent: bool,
    ) -> Result<AttendanceReport> {
        if messages.is_empty() {
            return Err(TallyError::NoReplies {
                thread_id: thread_id.to_string(),
            });
        }

        let candidates = self.extractor.extract_all(messages);
        let mut resolver = DuplicateResolver::new(groups);
        let (resolved, dropped) = resolver.resolve_all(&candidates);

        for reason in dropped.iter().filter(|d| d.is_warning()) {
            warn!("{}", reason.describe());
        }

        if resolved.is_empty() {
            return Err(TallyError::NoCandidates {
                replies: messages.len(),
            });
        }

        if roster.is_empty() {
            return Err(TallyError::NoRoster {
                source_name: "supplied roster".to_string(),
            });
        }

        let mut by_source = SourceCounts::default();
        for candidate in &resolved {
            by_source.record(candidate.source);
        }

        let matches = RosterMatcher::new(roster).match_all(&resolved, column.index());

        // A pinned row counts for the roster name printed on it
        let mut matched_keys: HashSet<String> = HashSet::new();
        for record in &matches.records {
            if roster.contains(&record.name) {
                matched_keys.insert(record.name.clone());
            }
            matched_keys.extend(roster.names_at_row(record.roster_row).map(str::to_string));
        }

        let absences =
            AbsenceReconciler::reconcile(roster, &matched_keys, mark_absent, column.index());

        let matched_names: Vec<String> = roster
            .names()
            .filter(|n| matched_keys.contains(*n))
            .map(str::to_string)
            .collect();

        info!(
            thread = thread_id,
            column = %column,
            roster = roster.len(),
            present = matches.records.len(),
            absent = absences.absent_names.len(),
            unmatched = matches.unmatched_names.len(),
            "attendance reconciled"
        );

        let mut records = matches.records;
        records.extend(absences.records);

        Ok(AttendanceReport {
            thread_id: thread_id.to_string(),
            column,
            total_roster: roster.len(),
            present_names: matches.matched_names,
            matched_names,
            absent_names: absences.absent_names,
            unmatched_names: matches.unmatched_names,
            dropped,
            by_source,
            records,
        })
    }

    /// Submission run: anyone who posted in the thread counts, text is ignored
    pub fn reconcile_submissions(
        &self,
        thread_id: &str,
        messages: &[RawMessage],
        roster: &Roster,
        column: Column,
        mark_absent: bool,
    ) -> Result<SubmissionReport> {
        if messages.is_empty() {
            return Err(TallyError::NoReplies {
                thread_id: thread_id.to_string(),
            });
        }

        let posters = self.submissions.extract_all(messages);

        if roster.is_empty() {
            return Err(TallyError::NoRoster {
                source_name: "supplied roster".to_string(),
            });
        }

        let poster_set: HashSet<String> = posters.iter().cloned().collect();

        let mut report = SubmissionReport {
            thread_id: thread_id.to_string(),
            column,
            total_roster: roster.len(),
            submitted_names: Vec::new(),
            not_submitted_names: Vec::new(),
            unregistered_names: posters
                .iter()
                .filter(|p| !roster.contains(p))
                .cloned()
                .collect(),
            records: Vec::new(),
        };

        for (name, row) in roster.iter() {
            if poster_set.contains(name) {
                report.submitted_names.push(name.to_string());
                report.records.push(AttendanceRecord::present(name, row, column.index()));
            } else {
                report.not_submitted_names.push(name.to_string());
                if mark_absent {
                    report.records.push(AttendanceRecord::absent(name, row, column.index()));
                }
            }
        }

        info!(
            thread = thread_id,
            column = %column,
            submitted = report.submitted_names.len(),
            missing = report.not_submitted_names.len(),
            "submissions reconciled"
        );

        Ok(report)
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Count records per status, useful for quick assertions and logs
pub fn count_status(records: &[AttendanceRecord], status: AttendanceStatus) -> usize {
    records.iter().filter(|r| r.status == status).count()
}

// ============================================================================
// TESTS
// ============================================================================
