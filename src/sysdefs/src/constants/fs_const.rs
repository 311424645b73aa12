//! File system related constants: rights, open flags, seek origins, file
//! kinds, permissions and the compile-time limits of the handle table.
use bitflags::bitflags;

// ===== Limits =====

/// Number of slots in a handle table created with `FileTable::new`.
pub const FILE_SLOTS_MAX: usize = 256;
/// Longest path accepted by an open request, in bytes.
pub const PATH_MAX: usize = 4096;
/// Upper bound on symlink expansions during one restricted resolution.
pub const MAX_SYMLINK_EXPANSIONS: usize = 40;

// ===== Modes =====

/// Mode used for files created by an open with `CREATE`.
pub const DEFAULT_CREATE_MODE: u32 = 0o666;
/// Mode used for directories created by makedir.
pub const MAKEDIR_MODE: u32 = 0o700;

/// Name pattern of temporary files and directories, inside the host's temporary directory.
pub const MAKETMP_TEMPLATE: &str = "fsjail.XXXXXX";
/// Bytes moved per read/write pair when copying file contents.
pub const COPY_CHUNK: usize = 64 * 1024;

// Seconds between the NTP epoch (1900) and the unix epoch (1970).
pub const NTP_JAN_1970: i64 = 2_208_988_800;

bitflags! {
    /// Access rights carried by a handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileAccess: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

bitflags! {
    /// Flags of an open request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileOpenFlags: u32 {
        const APPEND = 1 << 0;
        const TRUNCATE = 1 << 1;
        const CREATE = 1 << 2;
        /// Open a final symlink itself instead of its target.
        const OPEN_SYMLINK_ITSELF = 1 << 3;
        /// Fail if the final component is a symlink.
        const NO_FOLLOW_LAST = 1 << 4;
        /// Resolve the path inside the directory the open is relative to.
        const RESTRICT_TO_ROOT = 1 << 5;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MakeDirFlags: u32 {
        const CREATE_PARENTS = 1 << 0;
        const IGNORE_EXISTING = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RemoveFlags: u32 {
        const REMOVE_DIR = 1 << 0;
        const RECURSIVE = 1 << 1;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MakeTmpFlags: u32 {
        /// Make a directory instead of a regular file.
        const DIRECTORY = 1 << 0;
    }
}

bitflags! {
    /// Unix permission bits of a file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FilePerm: u16 {
        const OTHER_EXEC = 1 << 0;
        const OTHER_WRITE = 1 << 1;
        const OTHER_READ = 1 << 2;
        const GROUP_EXEC = 1 << 3;
        const GROUP_WRITE = 1 << 4;
        const GROUP_READ = 1 << 5;
        const OWNER_EXEC = 1 << 6;
        const OWNER_WRITE = 1 << 7;
        const OWNER_READ = 1 << 8;
        const STICKY_BIT = 1 << 9;
        const SET_GID = 1 << 10;
        const SET_UID = 1 << 11;
    }
}

impl Default for FilePerm {
    fn default() -> Self {
        FilePerm::empty()
    }
}

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum FileWhence {
    Set = 0,
    End = 1,
    Current = 2,
}

impl FileWhence {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(FileWhence::Set),
            1 => Some(FileWhence::End),
            2 => Some(FileWhence::Current),
            _ => None,
        }
    }
}

/// Classification of a file, captured from stat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum FileType {
    #[default]
    Unknown = 0,
    Regular = 1,
    Directory = 2,
    Symlink = 3,
    Block = 4,
    Character = 5,
    Fifo = 6,
    Socket = 7,
}

impl FileType {
    /// Only directories can be walked through or listed.
    pub fn is_dir(self) -> bool {
        self == FileType::Directory
    }
}
