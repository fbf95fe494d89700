// 🔍 Duplicate Resolution - Same printed name, different people
// Two dedup keys:
//   ambiguous name   (listed in a duplicate group) → dedup by author id, row pinned by the group
//   unambiguous name                              → dedup by printed name
//
// Known limitation: two different people sharing a name that is NOT registered
// as a duplicate group collapse into one record.

use crate::message::{NamingCandidate, ResolvedCandidate};
use crate::parser::normalize_name;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

// ============================================================================
// DUPLICATE GROUP TABLE
// ============================================================================

/// One identity behind an ambiguous printed name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub author_id: String,
    pub resolved_name: String,
    pub roster_row: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl DuplicateEntry {
    pub fn new(author_id: &str, resolved_name: &str, roster_row: usize) -> Self {
        DuplicateEntry {
            author_id: author_id.to_string(),
            resolved_name: resolved_name.to_string(),
            roster_row,
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// Ambiguous printed name → ordered identities
pub type DuplicateGroups = BTreeMap<String, Vec<DuplicateEntry>>;

// ============================================================================
// RESOLUTION OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DropReason {
    /// Same author already resolved through this or another duplicate group
    DuplicateAuthor { author_id: String },

    /// Printed name already seen in this run
    DuplicateName { name: String },

    /// Name is in a duplicate group but the author is not registered in it
    UnresolvableAmbiguity { name: String, author_id: String },
}

impl DropReason {
    pub fn is_warning(&self) -> bool {
        matches!(self, DropReason::UnresolvableAmbiguity { .. })
    }

    pub fn describe(&self) -> String {
        match self {
            DropReason::DuplicateAuthor { author_id } => {
                format!("duplicate reply from {}", author_id)
            }
            DropReason::DuplicateName { name } => format!("{} already checked in", name),
            DropReason::UnresolvableAmbiguity { name, author_id } => format!(
                "{} is ambiguous and author {} is not registered in its duplicate group",
                name, author_id
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedCandidate),
    Dropped(DropReason),
}

// ============================================================================
// DUPLICATE RESOLVER
// ============================================================================

/// Per-run resolver; owns the seen sets so one instance equals one run
pub struct DuplicateResolver<'a> {
    groups: &'a DuplicateGroups,
    seen_author_ids: HashSet<String>,
    seen_names: HashSet<String>,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(groups: &'a DuplicateGroups) -> Self {
        DuplicateResolver {
            groups,
            seen_author_ids: HashSet::new(),
            seen_names: HashSet::new(),
        }
    }

    /// Resolve one candidate, first-seen wins
    pub fn resolve(&mut self, candidate: &NamingCandidate) -> Resolution {
        match self.groups.get(&candidate.raw_name) {
            Some(entries) => self.resolve_ambiguous(candidate, entries),
            None => self.resolve_plain(candidate),
        }
    }

    fn resolve_ambiguous(
        &mut self,
        candidate: &NamingCandidate,
        entries: &[DuplicateEntry],
    ) -> Resolution {
        if self.seen_author_ids.contains(&candidate.author_id) {
            debug!(author = %candidate.author_id, "duplicate reply from resolved author");
            return Resolution::Dropped(DropReason::DuplicateAuthor {
                author_id: candidate.author_id.clone(),
            });
        }

        let Some(entry) = entries.iter().find(|e| e.author_id == candidate.author_id) else {
            let registered: Vec<&str> = entries.iter().map(|e| e.author_id.as_str()).collect();
            warn!(
                name = %candidate.raw_name,
                author = %candidate.author_id,
                registered = ?registered,
                "ambiguous name from unregistered author, dropping"
            );
            return Resolution::Dropped(DropReason::UnresolvableAmbiguity {
                name: candidate.raw_name.clone(),
                author_id: candidate.author_id.clone(),
            });
        };

        self.seen_author_ids.insert(candidate.author_id.clone());

        let resolved_name = normalize_name(&entry.resolved_name);
        debug!(
            name = %candidate.raw_name,
            resolved = %resolved_name,
            row = entry.roster_row,
            "ambiguous name resolved by author"
        );

        Resolution::Resolved(ResolvedCandidate {
            name: resolved_name,
            author_id: candidate.author_id.clone(),
            source: candidate.source,
            row: Some(entry.roster_row),
        })
    }

    fn resolve_plain(&mut self, candidate: &NamingCandidate) -> Resolution {
        if !self.seen_names.insert(candidate.raw_name.clone()) {
            debug!(name = %candidate.raw_name, "duplicate name");
            return Resolution::Dropped(DropReason::DuplicateName {
                name: candidate.raw_name.clone(),
            });
        }

        Resolution::Resolved(ResolvedCandidate {
            name: candidate.raw_name.clone(),
            author_id: candidate.author_id.clone(),
            source: candidate.source,
            row: None,
        })
    }

    /// Resolve a batch; returns survivors and drops in message order
    pub fn resolve_all(
        &mut self,
        candidates: &[NamingCandidate],
    ) -> (Vec<ResolvedCandidate>, Vec<DropReason>) {
        let mut resolved = Vec::new();
        let mut dropped = Vec::new();

        for candidate in candidates {
            match self.resolve(candidate) {
                Resolution::Resolved(r) => resolved.push(r),
                Resolution::Dropped(reason) => dropped.push(reason),
            }
        }

        (resolved, dropped)
    }
}

// ============================================================================
// TESTS
// ============================================================================
