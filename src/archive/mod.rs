//! Archive Engine (C4): the chunk-framed archive container itself —
//! entries, volumes, sparse regions and signatures built on top of the
//! Chunk Framing (C2) and Codec Pipeline (C3) layers.

pub mod entry;
mod reader;
mod signature;
mod writer;

pub use entry::{Entry, EntryKind, EntryMetadata};
pub use reader::{ArchiveReader, VolumeSource};
pub use signature::TrustSet;
pub use writer::{ArchiveWriter, VolumeSink};

use thiserror::Error;

use crate::chunk::ChunkError;
use crate::codec::CodecError;
use crate::error::{Classify, ErrorClass};

pub const FORMAT_MAJOR: u16 = 1;
pub const FORMAT_MINOR: u16 = 0;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("corrupt archive: {0}")]
    Corrupt(String),
    #[error("signature verification failed")]
    UnverifiedSignature,
    #[error("no entry is currently open")]
    NoOpenEntry,
    #[error("an entry is already open")]
    EntryAlreadyOpen,
    #[error(transparent)]
    Chunk(#[from] ChunkError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Storage(#[from] crate::storage::StorageError),
    #[error(transparent)]
    Handle(#[from] crate::handle::HandleError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Classify for ArchiveError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Archive
    }
}
