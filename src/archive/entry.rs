use serde::{Deserialize, Serialize};

use crate::chunk::ChunkTag;

/// The kind of filesystem object an archive entry represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Regular,
    Image,
    Directory,
    Link,
    Hardlink,
    Special,
}

impl EntryKind {
    pub fn chunk_tag(self) -> ChunkTag {
        match self {
            EntryKind::Regular => ChunkTag::FILE,
            EntryKind::Image => ChunkTag::IMAGE,
            EntryKind::Directory => ChunkTag::DIRECTORY,
            EntryKind::Link => ChunkTag::LINK,
            EntryKind::Hardlink => ChunkTag::HARDLINK,
            EntryKind::Special => ChunkTag::SPECIAL,
        }
    }

    pub fn from_chunk_tag(tag: ChunkTag) -> Option<Self> {
        match tag {
            ChunkTag::FILE => Some(EntryKind::Regular),
            ChunkTag::IMAGE => Some(EntryKind::Image),
            ChunkTag::DIRECTORY => Some(EntryKind::Directory),
            ChunkTag::LINK => Some(EntryKind::Link),
            ChunkTag::HARDLINK => Some(EntryKind::Hardlink),
            ChunkTag::SPECIAL => Some(EntryKind::Special),
            _ => None,
        }
    }
}

/// Metadata carried in an entry's header chunk (the `META` companion plus
/// the kind-tagged chunk itself). `link_target` covers both `Link` (path of
/// a symlink) and `Hardlink` (name of the prior entry it aliases).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub size: u64,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
    pub atime: i64,
    pub ctime: i64,
    pub link_target: Option<String>,
    pub device_major: Option<u32>,
    pub device_minor: Option<u32>,
}

impl EntryMetadata {
    pub fn regular_file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            mode: 0o100644,
            uid: 0,
            gid: 0,
            mtime: 0,
            atime: 0,
            ctime: 0,
            link_target: None,
            device_major: None,
            device_minor: None,
        }
    }
}

/// One entry yielded while reading an archive.
#[derive(Debug, Clone)]
pub struct Entry {
    pub kind: EntryKind,
    pub metadata: EntryMetadata,
}
