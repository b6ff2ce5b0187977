//! Include/exclude pattern matching, applied before a path is stat'd so
//! excluded subtrees never pay for a syscall that would just be thrown
//! away — the same discipline the teacher applies when it builds a
//! [`MatchEntry`] list ahead of walking a directory for `pxar` encoding.

use pathpatterns::{MatchEntry, MatchList, MatchPattern, MatchType, ParsePatternError, Pattern};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatcherError {
    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: ParsePatternError,
    },
}

/// An ordered list of exclude entries followed by include entries: an
/// include pattern layered on top of a broader exclude carves itself back
/// in, mirroring the order the teacher builds its own pattern list in
/// (a blanket exclude first, specific includes pushed after).
pub struct PatternMatcher {
    entries: Vec<MatchEntry>,
    has_includes: bool,
}

impl PatternMatcher {
    pub fn new(include_patterns: &[String], exclude_patterns: &[String]) -> Result<Self, MatcherError> {
        let mut entries = Vec::with_capacity(include_patterns.len() + exclude_patterns.len());

        for pattern in exclude_patterns {
            entries.push(MatchEntry::new(compile(pattern)?, MatchType::Exclude));
        }
        for pattern in include_patterns {
            entries.push(MatchEntry::new(compile(pattern)?, MatchType::Include));
        }

        Ok(Self {
            entries,
            has_includes: !include_patterns.is_empty(),
        })
    }

    pub fn none() -> Self {
        Self {
            entries: Vec::new(),
            has_includes: false,
        }
    }

    /// Whether `relative_path` should be backed up. Absent any matching
    /// entry, a path is included unless the caller supplied at least one
    /// include pattern, in which case an unmatched path is excluded by
    /// default (an include list acts as an allowlist).
    pub fn is_included(&self, relative_path: &[u8], is_dir: bool) -> bool {
        match self.entries.matches(relative_path, is_dir_mode(is_dir)) {
            Some(MatchType::Include) => true,
            Some(MatchType::Exclude) => false,
            None => !self.has_includes,
        }
    }
}

fn compile(pattern: &str) -> Result<MatchPattern, MatcherError> {
    Pattern::path(pattern.as_bytes())
        .map(MatchPattern::Pattern)
        .map_err(|source| MatcherError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

fn is_dir_mode(is_dir: bool) -> Option<u32> {
    // `libc::S_IFDIR`/`S_IFREG`, passed through as the `file_type` pathpatterns
    // uses to resolve directory-only patterns (a trailing `/` in the glob).
    Some(if is_dir { libc::S_IFDIR } else { libc::S_IFREG })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matcher_includes_everything() {
        let matcher = PatternMatcher::none();
        assert!(matcher.is_included(b"etc/hosts", false));
    }

    #[test]
    fn exclude_pattern_excludes_matching_paths() {
        let matcher = PatternMatcher::new(&[], &["*.tmp".to_string()]).unwrap();
        assert!(!matcher.is_included(b"scratch.tmp", false));
        assert!(matcher.is_included(b"notes.txt", false));
    }

    #[test]
    fn include_pattern_layered_over_blanket_exclude_carves_itself_back_in() {
        let matcher = PatternMatcher::new(
            &["important/**/*".to_string(), "important".to_string()],
            &["**/*".to_string()],
        )
        .unwrap();
        assert!(matcher.is_included(b"important", true));
        assert!(matcher.is_included(b"important/notes.txt", false));
        assert!(!matcher.is_included(b"other.txt", false));
    }

    #[test]
    fn an_include_list_acts_as_an_allowlist() {
        let matcher = PatternMatcher::new(&["keep.txt".to_string()], &[]).unwrap();
        assert!(matcher.is_included(b"keep.txt", false));
        assert!(!matcher.is_included(b"other.txt", false));
    }
}
