// 📋 Roster - Authoritative name → row mapping, and matching against it

use crate::message::{AttendanceRecord, ResolvedCandidate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

// ============================================================================
// ROSTER
// ============================================================================

/// Name → 0-based row. Keys are unique; iteration follows sheet row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<(String, usize)>", into = "Vec<(String, usize)>")]
pub struct Roster {
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from (name, row) pairs. A repeated name keeps its last row,
    /// like reading the column top to bottom into a map.
    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut roster = Roster::new();
        for (name, row) in pairs {
            roster.insert(name.into(), row);
        }
        roster
    }

    /// Read a name column: cell `i` lives at row `start_row + i`.
    /// Names are trimmed; blank cells are skipped.
    pub fn from_column<S: AsRef<str>>(cells: &[S], start_row: usize) -> Self {
        let mut roster = Roster::new();
        for (offset, cell) in cells.iter().enumerate() {
            let name = cell.as_ref().trim();
            if !name.is_empty() {
                roster.insert(name.to_string(), start_row + offset);
            }
        }
        roster
    }

    pub fn insert(&mut self, name: String, row: usize) {
        if let Some(existing) = self.index.get(&name).copied() {
            self.entries.retain(|(n, _)| n != &name);
            debug!(name = %name, old_row = existing, new_row = row, "roster name repeated, keeping last row");
        }
        self.index.insert(name.clone(), row);
        self.entries.push((name, row));
        self.entries.sort_by_key(|(_, r)| *r);
    }

    pub fn row_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (name, row) in row order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, r)| (n.as_str(), *r))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Names sitting on a given row
    pub fn names_at_row(&self, row: usize) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(move |(_, r)| *r == row)
            .map(|(n, _)| n.as_str())
    }
}

impl From<Vec<(String, usize)>> for Roster {
    fn from(pairs: Vec<(String, usize)>) -> Self {
        Roster::from_pairs(pairs)
    }
}

impl From<Roster> for Vec<(String, usize)> {
    fn from(roster: Roster) -> Self {
        roster.entries
    }
}

// ============================================================================
// ROSTER MATCHER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Candidate lands on a roster row
    Matched { name: String, row: usize },

    /// Not on the roster; reported, never written
    Unmatched { name: String },
}

pub struct RosterMatcher<'a> {
    roster: &'a Roster,
}

impl<'a> RosterMatcher<'a> {
    pub fn new(roster: &'a Roster) -> Self {
        RosterMatcher { roster }
    }

    /// Explicit row from duplicate resolution wins; otherwise look the name up
    pub fn match_candidate(&self, resolved: &ResolvedCandidate) -> MatchOutcome {
        if let Some(row) = resolved.row {
            return MatchOutcome::Matched {
                name: resolved.name.clone(),
                row,
            };
        }

        match self.roster.row_of(&resolved.name) {
            Some(row) => MatchOutcome::Matched {
                name: resolved.name.clone(),
                row,
            },
            None => MatchOutcome::Unmatched {
                name: resolved.name.clone(),
            },
        }
    }

    /// Match every candidate into PRESENT records for `column`.
    ///
    /// A row already marked present in this run is not written twice.
    pub fn match_all(&self, resolved: &[ResolvedCandidate], column: usize) -> MatchReport {
        let mut report = MatchReport::default();

        for candidate in resolved {
            match self.match_candidate(candidate) {
                MatchOutcome::Matched { name, row } => {
                    if report.records.iter().any(|r| r.roster_row == row) {
                        debug!(name = %name, row, "row already marked present");
                        continue;
                    }
                    report.records.push(AttendanceRecord::present(&name, row, column));
                    report.matched_names.push(name);
                }
                MatchOutcome::Unmatched { name } => {
                    debug!(name = %name, "not on roster");
                    report.unmatched_names.push(name);
                }
            }
        }

        report
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub records: Vec<AttendanceRecord>,
    pub matched_names: Vec<String>,
    pub unmatched_names: Vec<String>,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{AttendanceStatus, CandidateSource};

    fn create_test_resolved(name: &str, row: Option<usize>) -> ResolvedCandidate {
        ResolvedCandidate {
            name: name.to_string(),
            author_id: "U1".to_string(),
            source: CandidateSource::Pattern,
            row,
        }
    }

    fn create_test_roster() -> Roster {
        Roster::from_pairs([("Kim", 3), ("Lee", 4), ("Park", 5)])
    }

    #[test]
    fn test_roster_from_column_skips_blanks() {
        let cells = vec!["Kim", " ", " Lee ", "", "Park"];
        let roster = Roster::from_column(&cells, 3);

        assert_eq!(roster.len(), 3);
        assert_eq!(roster.row_of("Kim"), Some(3));
        assert_eq!(roster.row_of("Lee"), Some(5));
        assert_eq!(roster.row_of("Park"), Some(7));
        assert_eq!(roster.names().collect::<Vec<_>>(), vec!["Kim", "Lee", "Park"]);
    }

    #[test]
    fn test_repeated_name_keeps_last_row() {
        let roster = Roster::from_pairs([("Min", 7), ("Kim", 8), ("Min", 9)]);
        assert_eq!(roster.len(), 2);
        assert_eq!(roster.row_of("Min"), Some(9));
        assert_eq!(roster.iter().collect::<Vec<_>>(), vec![("Kim", 8), ("Min", 9)]);
    }

    #[test]
    fn test_match_by_name() {
        let roster = create_test_roster();
        let matcher = RosterMatcher::new(&roster);

        assert_eq!(
            matcher.match_candidate(&create_test_resolved("Lee", None)),
            MatchOutcome::Matched { name: "Lee".to_string(), row: 4 }
        );
        assert_eq!(
            matcher.match_candidate(&create_test_resolved("Choi", None)),
            MatchOutcome::Unmatched { name: "Choi".to_string() }
        );
    }

    #[test]
    fn test_explicit_row_bypasses_lookup() {
        let roster = create_test_roster();
        let matcher = RosterMatcher::new(&roster);

        // "Min(A)" is not a roster key, but the pinned row is used directly
        assert_eq!(
            matcher.match_candidate(&create_test_resolved("Min(A)", Some(7))),
            MatchOutcome::Matched { name: "Min(A)".to_string(), row: 7 }
        );
    }

    #[test]
    fn test_match_all_builds_present_records() {
        let roster = create_test_roster();
        let matcher = RosterMatcher::new(&roster);

        let report = matcher.match_all(
            &[
                create_test_resolved("Kim", None),
                create_test_resolved("Ghost", None),
                create_test_resolved("Kim(B)", Some(3)),
            ],
            10,
        );

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].roster_row, 3);
        assert_eq!(report.records[0].column, 10);
        assert_eq!(report.records[0].status, AttendanceStatus::Present);
        assert_eq!(report.matched_names, vec!["Kim"]);
        assert_eq!(report.unmatched_names, vec!["Ghost"]);
    }
}
