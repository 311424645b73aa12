use std::fmt;

use crate::commonconstants::HANDLE_INDEX_BITS;

/// An opaque handle given to callers in place of a native descriptor.
///
/// The value packs `(generation << 32) | index`.  This is the wire contract
/// with guests, so the layout must not change.  Two handles are the same
/// handle only if their values are equal.
#[derive(Clone, Copy, Hash, Debug, PartialEq, Eq, Default)]
pub struct FileHandle(u64);

impl FileHandle {
    /// The nil handle.  Never minted by a table.
    pub const NIL: FileHandle = FileHandle(0);

    /// Pack a slot index and generation into a handle.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        FileHandle(((generation as u64) << HANDLE_INDEX_BITS) | index as u64)
    }

    /// Slot index part of the handle.
    #[must_use]
    pub const fn index(self) -> u32 {
        (self.0 & 0xffff_ffff) as u32
    }

    /// Generation part of the handle.
    #[must_use]
    pub const fn generation(self) -> u32 {
        (self.0 >> HANDLE_INDEX_BITS) as u32
    }

    /// Is this the nil handle?
    #[must_use]
    pub const fn is_nil(self) -> bool {
        self.0 == 0
    }

    /// Raw wire value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its wire value.  No validation happens here,
    /// that is the table's job.
    #[must_use]
    pub const fn from_u64(raw: u64) -> Self {
        FileHandle(raw)
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_nil() {
            write!(f, "nil")
        } else {
            write!(f, "{}:{}", self.index(), self.generation())
        }
    }
}
