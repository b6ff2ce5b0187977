//! Chunk Framing (C2): self-describing typed chunks with length, CRC, and
//! parent-child nesting.
//!
//! Grounded on the teacher's `DataBlob`/`DataBlobWriter`/`DataBlobReader`
//! state machines (magic + CRC32 trailer), generalized from "one whole blob
//! per file" to a general framed stream of typed, nestable chunks as the
//! distilled spec requires.

mod header;
mod reader;
mod writer;

pub use header::{read_varint, write_varint, ChunkTag, MAX_NESTING_DEPTH};
pub use reader::{ChunkBodyReader, ChunkReader};
pub use writer::ChunkWriter;

use thiserror::Error;

use crate::error::{Classify, ErrorClass};

#[derive(Debug, Error)]
pub enum ChunkError {
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("unknown chunk type {tag:?}")]
    UnknownChunk { tag: [u8; 4] },
    #[error("chunk CRC mismatch for type {tag:?}")]
    CrcMismatch { tag: [u8; 4] },
    #[error("chunk body length mismatch: declared {declared}, consumed {consumed}")]
    LengthMismatch { declared: u64, consumed: u64 },
    #[error("nested chunk depth exceeds maximum of {MAX_NESTING_DEPTH}")]
    DepthExceeded,
    #[error("unexpected end of stream while reading chunk")]
    UnexpectedEof,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for ChunkError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Archive
    }
}
