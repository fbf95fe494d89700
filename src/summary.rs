// 📊 Run Summary - Counts, rates and notification text
// Pure aggregation: no I/O, nothing here touches a collaborator.

use crate::column::Column;
use crate::message::CandidateSource;
use serde::{Deserialize, Serialize};

/// Absentees listed by name before the rest collapse into a count
pub const DEFAULT_ABSENTEE_PREVIEW: usize = 50;

/// Thread reply posted after a check; `{present}`, `{absent}` and `{total}` are substituted
pub const DEFAULT_COMPLETION_TEMPLATE: &str =
    "[auto] Attendance check complete.\nPresent: {present} / Absent: {absent}";

// ============================================================================
// SOURCE COUNTS
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub pattern: usize,
    pub fallback: usize,
}

impl SourceCounts {
    pub fn record(&mut self, source: CandidateSource) {
        match source {
            CandidateSource::Pattern => self.pattern += 1,
            CandidateSource::Fallback => self.fallback += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pattern + self.fallback
    }
}

// ============================================================================
// RUN SUMMARY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_roster: usize,
    pub matched_count: usize,
    pub absent_count: usize,
    pub unmatched_names: Vec<String>,
    pub by_source: SourceCounts,

    /// Percentages, 0.0 when the roster is empty
    pub matched_rate: f64,
    pub absent_rate: f64,

    /// First absentees in roster order, capped
    pub absentee_preview: Vec<String>,

    /// Absentees left out of the preview
    pub absentee_remainder: usize,
}

pub struct SummaryBuilder {
    preview_limit: usize,
}

impl SummaryBuilder {
    pub fn new() -> Self {
        SummaryBuilder {
            preview_limit: DEFAULT_ABSENTEE_PREVIEW,
        }
    }

    pub fn with_preview_limit(mut self, limit: usize) -> Self {
        self.preview_limit = limit;
        self
    }

    pub fn summarize(
        &self,
        matched_names: &[String],
        absent_names: &[String],
        unmatched_names: &[String],
        by_source: SourceCounts,
    ) -> RunSummary {
        let total = matched_names.len() + absent_names.len();
        let preview: Vec<String> = absent_names
            .iter()
            .take(self.preview_limit)
            .cloned()
            .collect();

        RunSummary {
            total_roster: total,
            matched_count: matched_names.len(),
            absent_count: absent_names.len(),
            unmatched_names: unmatched_names.to_vec(),
            by_source,
            matched_rate: rate(matched_names.len(), total),
            absent_rate: rate(absent_names.len(), total),
            absentee_remainder: absent_names.len() - preview.len(),
            absentee_preview: preview,
        }
    }
}

impl Default for SummaryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

// ============================================================================
// NOTIFICATION TEXT
// ============================================================================

/// Fill the completion template
pub fn render_completion(template: &str, summary: &RunSummary) -> String {
    template
        .replace("{present}", &summary.matched_count.to_string())
        .replace("{absent}", &summary.absent_count.to_string())
        .replace("{total}", &summary.total_roster.to_string())
}

/// Direct-message report sent to the workspace owner after a check
pub fn attendance_report_text(column: Column, summary: &RunSummary, present_names: &[String]) -> String {
    let mut lines = vec![
        "📋 Attendance check result".to_string(),
        String::new(),
        format!("Column: {}", column),
        format!("Roster: {}", summary.total_roster),
        format!(
            "Present: {} ({:.1}%)",
            summary.matched_count, summary.matched_rate
        ),
        format!("Absent: {}", summary.absent_count),
    ];

    if !present_names.is_empty() {
        lines.push(String::new());
        lines.push(format!("✅ Present: {}", present_names.join(", ")));
    }

    append_name_preview(&mut lines, "❌ Absent", &summary.absentee_preview, summary.absentee_remainder);

    if !summary.unmatched_names.is_empty() {
        lines.push(String::new());
        lines.push(format!("❓ Not on roster: {}", summary.unmatched_names.join(", ")));
    }

    lines.join("\n")
}

/// Direct-message report for a submission check
pub fn submission_report_text(
    column: Column,
    summary: &RunSummary,
    submitted_names: &[String],
) -> String {
    let mut lines = vec![
        "📝 Submission check result".to_string(),
        String::new(),
        format!("Column: {}", column),
        format!("Roster: {}", summary.total_roster),
        format!(
            "Submitted: {} ({:.1}%)",
            summary.matched_count, summary.matched_rate
        ),
        format!("Not submitted: {}", summary.absent_count),
    ];

    if !submitted_names.is_empty() {
        lines.push(String::new());
        lines.push(format!("✅ Submitted: {}", submitted_names.join(", ")));
    }

    append_name_preview(
        &mut lines,
        "❌ Not submitted",
        &summary.absentee_preview,
        summary.absentee_remainder,
    );

    lines.join("\n")
}

/// Sent when a schedule entry reaches the last column of its range
/// `label` is the workspace display name, or its key when none is set
pub fn retirement_text(label: &str, day: &str, column: Column, schedule_disabled: bool) -> String {
    let mut text = format!(
        "🏁 [{}] The {} schedule finished its last column ({}).",
        label, day, column
    );
    if schedule_disabled {
        text.push_str("\nNo entries remain; automatic checks are now off.");
    }
    text
}

fn append_name_preview(lines: &mut Vec<String>, heading: &str, names: &[String], remainder: usize) {
    if names.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{}:", heading));
    for (i, name) in names.iter().enumerate() {
        lines.push(format!("{}. {}", i + 1, name));
    }
    if remainder > 0 {
        lines.push(format!("... and {} more", remainder));
    }
}

// ============================================================================
// TESTS
// ============================================================================
