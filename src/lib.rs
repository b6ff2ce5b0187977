//! Content-addressed, chunked backup archive engine, worker pool and index
//! catalog.
//!
//! Reads a heterogeneous filesystem/device tree, produces chunked,
//! optionally compressed and encrypted archive files, transports them to
//! remote or removable storage, and maintains a queryable index catalog
//! supporting incremental/differential backup and historical restore.
//!
//! Module map, leaves first:
//! - [`handle`] — Buffered Handle (C1)
//! - [`chunk`] — Chunk Framing (C2)
//! - [`codec`] — Codec Pipeline (C3)
//! - [`archive`] — Archive Engine (C4)
//! - [`storage`] — Storage Adapter (C5)
//! - [`entry_pipeline`] — Entry Pipeline (C6)
//! - [`worker`] — Worker Pool + Job Scheduler (C7)
//! - [`catalog`] — Index Catalog (C8)
//! - [`password`] — Credential/Secret Handling (C9)
//!
//! [`context`] and [`error`] are the ambient pieces every component above
//! is built against: a single explicitly-passed [`context::ProcessContext`]
//! instead of process globals, and a shared [`error::Classify`] trait so
//! orchestration code (`worker`) never has to match on a specific
//! component's concrete error type.

pub mod archive;
pub mod catalog;
pub mod chunk;
pub mod codec;
pub mod context;
pub mod entry_pipeline;
pub mod error;
pub mod handle;
pub mod password;
pub mod storage;
pub mod worker;
