// This is the handle table implementation.  A table is a fixed-capacity
// pool of slots.  Each slot describes one open native descriptor and is
// addressed by a generation-counted handle.
//
// Allocation pops the free list first and only then bumps the cursor of
// "highest index ever handed out", which here is simply `slots.len()`.
// Recycled slots are threaded onto a singly-linked free list through their
// `next_free` field, with the head kept in the table.
//
// Nothing in here is synchronized.  Callers that share a table between
// threads put the whole table behind a lock.

use log::{trace, warn};

use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{FileAccess, FileType};
use sysdefs::data::fs_struct::FileDesc;

use crate::commonconstants::{FILE_SLOTS_MAX, FIRST_GENERATION, NULL_FUNC};
use crate::handle::FileHandle;

/// One entry of the table, describing one open native descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileSlot {
    generation: u32,
    /// Native descriptor owned by this slot while it is open.
    pub fd: FileDesc,
    /// Rights granted at open.  Never widened afterwards.
    pub rights: FileAccess,
    /// File type captured at open.
    pub kind: FileType,
    /// Last sticky error, `None` if the last operation succeeded.
    pub error: Option<IoError>,
    /// Once set, only close and error queries are served for this slot.
    pub fatal: bool,
    in_use: bool,
    next_free: Option<u32>,
}

impl FileSlot {
    fn fresh() -> Self {
        FileSlot {
            generation: FIRST_GENERATION,
            fd: FileDesc::NIL,
            rights: FileAccess::empty(),
            kind: FileType::Unknown,
            error: None,
            fatal: false,
            in_use: false,
            next_free: None,
        }
    }

    // Everything except the generation goes back to its default.
    fn reset(&mut self) {
        self.fd = FileDesc::NIL;
        self.rights = FileAccess::empty();
        self.kind = FileType::Unknown;
        self.error = None;
        self.fatal = false;
        self.next_free = None;
    }

    /// Generation the slot's current handle was minted with.
    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// True between allocation and recycling.
    #[must_use]
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// Record an error on the slot.  Does not poison it.
    pub fn set_error(&mut self, error: IoError) {
        self.error = Some(error);
    }

    /// Record an error and poison the slot.
    pub fn set_fatal(&mut self, error: IoError) {
        self.error = Some(error);
        self.fatal = true;
    }
}

/// A fixed-capacity table of slots.  Owned by its user: the host keeps one
/// and every guest instance keeps its own.
#[derive(Debug)]
pub struct FileTable {
    slots: Vec<FileSlot>,
    capacity: usize,
    free_head: Option<u32>,
    close_handler: fn(FileDesc),
}

impl Default for FileTable {
    fn default() -> Self {
        FileTable::new()
    }
}

impl FileTable {
    /// A table with `FILE_SLOTS_MAX` slots.
    #[must_use]
    pub fn new() -> Self {
        FileTable::with_capacity(FILE_SLOTS_MAX)
    }

    /// A table with a custom number of slots.  Capacities beyond what a
    /// handle can index are clamped.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(u32::MAX as usize);
        FileTable {
            slots: Vec::new(),
            capacity,
            free_head: None,
            close_handler: NULL_FUNC,
        }
    }

    /// Register the function called for every descriptor still open when
    /// the table is dropped.
    pub fn register_close_handler(&mut self, handler: fn(FileDesc)) {
        self.close_handler = handler;
    }

    /// Number of slots this table can hold.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of slots currently allocated.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|s| s.in_use).count()
    }

    /// Take a slot, either a recycled one or a never used one.
    ///
    /// # Errors
    ///
    /// `TooManyOpenFiles` when every slot is in use.
    pub fn alloc(&mut self) -> Result<u32, IoError> {
        let index = match self.free_head {
            Some(index) => {
                self.free_head = self.slots[index as usize].next_free;
                index
            }
            None => {
                if self.slots.len() >= self.capacity {
                    return Err(IoError::TooManyOpenFiles);
                }
                self.slots.push(FileSlot::fresh());
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.reset();
        slot.in_use = true;
        trace!("alloc slot {index} gen {}", slot.generation);
        Ok(index)
    }

    /// Return a slot to the free list and bump its generation so that
    /// handles minted before can never validate again.
    ///
    /// The descriptor is NOT closed here, that is the caller's job.  A
    /// second recycle of the same slot is ignored.
    pub fn recycle(&mut self, index: u32) {
        let free_head = self.free_head;
        let Some(slot) = self.slots.get_mut(index as usize) else {
            warn!("recycle of slot {index} which was never allocated");
            return;
        };
        if !slot.in_use {
            warn!("double recycle of slot {index} ignored");
            return;
        }

        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation == 0 {
            slot.generation = FIRST_GENERATION;
        }
        slot.in_use = false;
        slot.fd = FileDesc::NIL;
        slot.next_free = free_head;
        self.free_head = Some(index);
    }

    /// Look a handle up.  `None` for nil, out of range, stale or free.
    #[must_use]
    pub fn resolve(&self, handle: FileHandle) -> Option<&FileSlot> {
        if handle.is_nil() {
            return None;
        }
        self.slots
            .get(handle.index() as usize)
            .filter(|s| s.in_use && s.generation == handle.generation())
    }

    /// Mutable version of [`FileTable::resolve`].
    pub fn resolve_mut(&mut self, handle: FileHandle) -> Option<&mut FileSlot> {
        if handle.is_nil() {
            return None;
        }
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|s| s.in_use && s.generation == handle.generation())
    }

    /// Mint the handle for a slot index.  Nil if the index was never
    /// allocated.
    #[must_use]
    pub fn handle_for(&self, index: u32) -> FileHandle {
        match self.slots.get(index as usize) {
            Some(slot) => FileHandle::new(index, slot.generation),
            None => FileHandle::NIL,
        }
    }

    /// Slot by index, for use right after `alloc`.
    #[must_use]
    pub fn slot(&self, index: u32) -> Option<&FileSlot> {
        self.slots.get(index as usize)
    }

    /// Mutable slot by index.
    pub fn slot_mut(&mut self, index: u32) -> Option<&mut FileSlot> {
        self.slots.get_mut(index as usize)
    }
}

impl Drop for FileTable {
    fn drop(&mut self) {
        let handler = self.close_handler;
        for slot in self.slots.iter_mut().filter(|s| s.in_use) {
            if !slot.fd.is_nil() {
                handler(slot.fd);
                slot.fd = FileDesc::NIL;
            }
        }
    }
}
