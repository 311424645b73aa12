//! This file contains all the implementation related to the Cage structure: the per-guest state,
//! and the global map used to find a cage by its id. A cage owns its own handle table; nothing in
//! one cage's table is reachable from another cage.
use fdtables::{FileHandle, FileTable};
use log::debug;
pub use once_cell::sync::Lazy;
/// Uses spinlocks first (for short waits) and parks threads when blocking to reduce kernel
/// interaction and increases efficiency.
pub use parking_lot::{Mutex, RwLock};
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;
use sysdefs::constants::err_const::IoError;

/// Highest cage id plus one.
pub const MAX_CAGEID: usize = 1024;

#[derive(Debug)]
pub struct Cage {
    // Identifying ID number for this cage
    pub cageid: u64,
    // Host directory this cage sees as its root
    pub data_dir: PathBuf,
    // Handle (in `files`) of the preopened data directory. Opens with a nil at-handle are resolved
    // against it, and the guest can't close it.
    pub root_dir: FileHandle,
    // The cage's own handle table. All requests of a cage are serialized by this lock.
    pub files: Mutex<FileTable>,
}

impl Cage {
    pub fn new(cageid: u64, data_dir: PathBuf, root_dir: FileHandle, files: FileTable) -> Self {
        Cage {
            cageid,
            data_dir,
            root_dir,
            files: Mutex::new(files),
        }
    }
}

/// We achieve an O(1) complexity for our cage map implementation through the following approaches:
///
/// Direct Indexing with `cageid`:
///     `cageid` directly as the index to access the `Vec`, allowing O(1) complexity for lookup, insertion,
///     and deletion.
/// `Vec<Option<Arc<Cage>>>` for Efficient Deletion:
///     When deleting an entry, we replace it with `None` instead of restructuring the `Vec`.
/// `RwLock` for Concurrent Access Control:
///     Writes occur only at cage init and exit, so lookups almost never wait.
///
/// Pre-allocate MAX_CAGEID elements, all initialized to None.
/// Lazy causes `CAGE_MAP` to be initialized when it is first accessed, rather than when the program starts.
pub static CAGE_MAP: Lazy<RwLock<Vec<Option<Arc<Cage>>>>> = Lazy::new(|| {
    let mut vec = Vec::with_capacity(MAX_CAGEID);
    vec.resize_with(MAX_CAGEID, || None);
    RwLock::new(vec)
});

/// Add a cage to `CAGE_MAP` and map `cageid` to its index
///
/// ## Returns:
/// - `InvalidArgument` if `cageid` is out of range
/// - `AlreadyExists` if a cage with that id is still registered
pub fn add_cage(cageid: u64, cage: Cage) -> Result<(), IoError> {
    let mut list = CAGE_MAP.write();
    let entry = list
        .get_mut(cageid as usize)
        .ok_or(IoError::InvalidArgument)?;
    if entry.is_some() {
        return Err(IoError::AlreadyExists);
    }
    *entry = Some(Arc::new(cage));
    debug!("cage {cageid} added");
    Ok(())
}

/// Delete the cage from `CAGE_MAP` by `cageid` as index. The cage's descriptors are released when
/// the last reference to it goes away.
pub fn remove_cage(cageid: u64) -> Option<Arc<Cage>> {
    let mut list = CAGE_MAP.write();
    let removed = list.get_mut(cageid as usize).and_then(Option::take);
    if removed.is_some() {
        debug!("cage {cageid} removed");
    }
    removed
}

/// Get the cage's `Arc` reference via `cageid`
/// Error handling (when `Cage` is None) happens when calling
pub fn get_cage(cageid: u64) -> Option<Arc<Cage>> {
    let list = CAGE_MAP.read();
    list.get(cageid as usize).cloned().flatten()
}

/// Clear `CAGE_MAP`
///
/// Return:
///     the ids of the cages that were registered
pub fn cagetable_clear() -> Vec<u64> {
    let mut exitvec = Vec::new();
    let mut list = CAGE_MAP.write();
    for (cageid, cage) in list.iter_mut().enumerate() {
        if cage.take().is_some() {
            exitvec.push(cageid as u64);
        }
    }
    exitvec
}
