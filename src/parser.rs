// 🔎 Name Extraction - Reply text → naming candidate
// Two extractors:
//   NameExtractor       - check-in replies ("Kim/checked-in", "Kim checked-in", fallback to profile)
//   SubmissionExtractor - "did this person post at all", profile name only

use crate::error::Result;
use crate::message::{CandidateSource, NamingCandidate, RawMessage};
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

// ============================================================================
// CONSTANTS
// ============================================================================

/// Check-in keywords used when no configuration overrides them
pub const DEFAULT_KEYWORDS: &[&str] = &[
    "출석",
    "출석했습니다",
    "출석해요",
    "출석합니다",
    "입실",
    "입실했습니다",
    "checked-in",
    "check-in",
];

/// Character that ends a written name in the pattern ("Kim/...")
pub const NAME_SEPARATOR: char = '/';

/// Affiliation suffix separators ("Kim/ClassA", "Kim_ClassA")
pub const AFFILIATION_SEPARATORS: [char; 2] = ['/', '_'];

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Cut a name at the first affiliation separator and trim it.
///
/// "Kim/ClassA" → "Kim", "Hong_CompSci" → "Hong", "Lee" → "Lee".
/// Idempotent: the result never contains a separator.
pub fn normalize_name(name: &str) -> String {
    let name = name.trim();
    let cut = match name.find(AFFILIATION_SEPARATORS) {
        Some(idx) => &name[..idx],
        None => name,
    };
    cut.trim().to_string()
}

/// Reduce a chat profile name to the printed name.
///
/// Applies [`normalize_name`], then drops a parenthesised suffix and keeps
/// only the first whitespace token: "Kim ClassA" → "Kim", "Lee (student)" → "Lee".
///
/// The first-token rule is a convention. Compound given names written with a
/// space are cut short.
pub fn profile_token(name: &str) -> String {
    let normalized = normalize_name(name);
    let without_paren = match normalized.find('(') {
        Some(idx) => &normalized[..idx],
        None => normalized.as_str(),
    };
    without_paren
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_string()
}

// ============================================================================
// NAME EXTRACTOR
// ============================================================================

pub struct NameExtractor {
    /// `letters` followed by the separator or a keyword
    pattern: Regex,

    /// Lowercased keywords for the fallback substring check
    keywords: Vec<String>,
}

impl NameExtractor {
    /// Extractor with [`DEFAULT_KEYWORDS`]
    pub fn new() -> Self {
        let keywords: Vec<String> = DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        Self::with_keywords(&keywords).expect("default check-in keywords form a valid pattern")
    }

    /// Build an extractor for a custom keyword set.
    ///
    /// Keywords are matched case-insensitively; blank entries are ignored.
    pub fn with_keywords(keywords: &[String]) -> Result<Self> {
        let mut keywords: Vec<String> = keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();

        // Longest first so "출석했습니다" is preferred over "출석"
        keywords.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        keywords.dedup();

        let mut alternatives = vec![regex::escape(&NAME_SEPARATOR.to_string())];
        alternatives.extend(keywords.iter().map(|k| regex::escape(k)));

        let pattern = Regex::new(&format!(
            r"(?i)([가-힣A-Za-z]+)\s*(?:{})",
            alternatives.join("|")
        ))?;

        Ok(NameExtractor { pattern, keywords })
    }

    /// Turn one message into at most one candidate
    pub fn extract(&self, message: &RawMessage) -> Option<NamingCandidate> {
        if let Some(name) = self.extract_written_name(&message.text) {
            return Some(NamingCandidate {
                raw_name: name,
                author_id: message.author_id.clone(),
                source: CandidateSource::Pattern,
            });
        }

        if !self.contains_keyword(&message.text) {
            return None;
        }

        let name = profile_token(message.profile_name()?);
        if name.is_empty() {
            return None;
        }

        Some(NamingCandidate {
            raw_name: name,
            author_id: message.author_id.clone(),
            source: CandidateSource::Fallback,
        })
    }

    /// Extract candidates from every message, preserving message order
    pub fn extract_all(&self, messages: &[RawMessage]) -> Vec<NamingCandidate> {
        messages
            .iter()
            .filter_map(|message| {
                let candidate = self.extract(message);
                match &candidate {
                    Some(c) => debug!(
                        name = %c.raw_name,
                        author = %c.author_id,
                        source = c.source.as_str(),
                        "candidate extracted"
                    ),
                    None => debug!(author = %message.author_id, "reply ignored"),
                }
                candidate
            })
            .collect()
    }

    /// Name written before the separator or a keyword, normalized
    pub fn extract_written_name(&self, text: &str) -> Option<String> {
        let caps = self.pattern.captures(text)?;
        let name = normalize_name(caps.get(1)?.as_str());
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Case-insensitive substring check over all keywords
    pub fn contains_keyword(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    pub fn keyword_count(&self) -> usize {
        self.keywords.len()
    }
}

impl Default for NameExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SUBMISSION EXTRACTOR
// ============================================================================

/// Collects everyone who replied, by profile name. Text is not inspected.
#[derive(Debug, Default)]
pub struct SubmissionExtractor;

impl SubmissionExtractor {
    pub fn new() -> Self {
        SubmissionExtractor
    }

    pub fn extract(&self, message: &RawMessage) -> Option<String> {
        let name = profile_token(message.profile_name()?);
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    /// Unique submitter names in first-seen order
    pub fn extract_all(&self, messages: &[RawMessage]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        for message in messages {
            if let Some(name) = self.extract(message) {
                if seen.insert(name.clone()) {
                    debug!(name = %name, "submission recorded");
                    names.push(name);
                }
            }
        }

        names
    }
}

// ============================================================================
// TESTS
// ============================================================================
