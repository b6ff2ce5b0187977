//! Shared error taxonomy.
//!
//! Every component defines its own `thiserror` enum so call sites can match
//! on a small, closed set of variants. This module only carries the bits
//! that cut across components: the coarse classification a [`crate::worker`]
//! needs to decide whether an error is retryable, counts against
//! `errorEntryCount`, or aborts the job outright.

use std::fmt;

/// Coarse bucket an error falls into, independent of which component raised it.
///
/// The worker pool and job scheduler never match on concrete error variants;
/// they ask `error.class()` and act on the answer. This keeps new error
/// variants from silently falling through a `match` written before they
/// existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad configuration discovered before any work started. Fatal at job start.
    Configuration,
    /// Problem reading one source entry. Counted, does not fail the job unless strict.
    Source,
    /// Archive format violation. Fatal to the reader; a bug if seen on write.
    Archive,
    /// Compression/encryption/integrity failure for the current entry.
    Codec,
    /// Transient or permanent storage backend failure. Subject to retry policy.
    Storage,
    /// Catalog/index failure. Always fatal.
    Index,
    /// Cancellation or timeout.
    Lifecycle,
}

impl ErrorClass {
    /// Whether an error of this class is worth retrying with backoff.
    ///
    /// Only `Storage` errors are retried, and only a subset of those (see
    /// [`crate::worker::RetryPolicy`] for the actual transient/fatal split
    /// within `Storage`); this is the first, cheap filter.
    pub fn is_retryable_class(self) -> bool {
        matches!(self, ErrorClass::Storage)
    }

    /// Whether an error of this class always fails the whole job, regardless
    /// of `strict` mode.
    pub fn is_always_fatal(self) -> bool {
        matches!(self, ErrorClass::Configuration | ErrorClass::Index)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Source => "source",
            ErrorClass::Archive => "archive",
            ErrorClass::Codec => "codec",
            ErrorClass::Storage => "storage",
            ErrorClass::Index => "index",
            ErrorClass::Lifecycle => "lifecycle",
        };
        f.write_str(s)
    }
}

/// Implemented by every component-level error enum so orchestration code can
/// classify without downcasting.
pub trait Classify {
    fn class(&self) -> ErrorClass;
}
