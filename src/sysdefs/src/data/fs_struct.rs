//! Plain data exchanged between the raw layer, the dispatcher and callers.
use crate::constants::fs_const::{FilePerm, FileType};

/// A native file descriptor. Owned by at most one table slot at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileDesc(pub i32);

impl FileDesc {
    pub const NIL: FileDesc = FileDesc(-1);

    pub fn is_nil(self) -> bool {
        self.0 < 0
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

impl Default for FileDesc {
    fn default() -> Self {
        FileDesc::NIL
    }
}

/// Unique identity of a file on the host: device plus inode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileId {
    pub dev: u64,
    pub ino: u64,
}

/// Timestamp in seconds since the NTP epoch plus a binary fraction of a
/// second (`fraction / 2^64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DateStamp {
    pub seconds: i64,
    pub fraction: u64,
}

/// Result of a stat request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileStatus {
    pub id: FileId,
    pub perm: FilePerm,
    pub kind: FileType,
    pub size: u64,
    pub creation: DateStamp,
    pub access: DateStamp,
    pub modification: DateStamp,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: Vec<u8>,
    pub kind: FileType,
}
