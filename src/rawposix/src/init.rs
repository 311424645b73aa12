//! Process-wide state: the host's own handle table, and the setup and teardown of cages.
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use lazy_static::lazy_static;
use log::info;
use parking_lot::Mutex;

use cage::{add_cage, cagetable_clear, get_cage, remove_cage, Cage};
use fdtables::FileTable;
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{FileAccess, FileOpenFlags};

use crate::dispatcher::{io_open_at, io_wait_single_req, Completion, Request};
use crate::fs_calls::kernel_close;

lazy_static! {
    // The table used by trusted host code. Guests never see it.
    pub static ref GLOBALFILETABLE: Mutex<FileTable> = Mutex::new(new_file_table());
}

/// A table whose descriptors are closed when it is dropped.
pub fn new_file_table() -> FileTable {
    let mut table = FileTable::new();
    table.register_close_handler(kernel_close);
    table
}

/// Run a request against the host table.
pub fn io_wait_single_req_global(req: Request<'_>) -> Completion {
    let mut table = GLOBALFILETABLE.lock();
    io_wait_single_req(&mut table, req)
}

/// Set up a cage whose file system view is `data_dir`.
///
/// `data_dir` is opened by the host, unrestricted, with read and write rights. This is the only
/// unrestricted open made on behalf of a cage: every later open is resolved below it.
///
/// Return:
///     - the error of the preopen, `NotADirectory` if `data_dir` isn't one, or the cage map's
///       error if `cageid` is out of range or taken
pub fn cage_init(cageid: u64, data_dir: &Path) -> Result<(), IoError> {
    let mut files = new_file_table();
    let cmp = io_open_at(
        &mut files,
        fdtables::FileHandle::NIL,
        data_dir.as_os_str().as_bytes(),
        FileAccess::READ | FileAccess::WRITE,
        FileOpenFlags::empty(),
    );
    if let Some(e) = cmp.error {
        return Err(e);
    }
    let root_dir = cmp.handle();
    let is_dir = files
        .resolve(root_dir)
        .is_some_and(|slot| slot.kind.is_dir());
    if !is_dir {
        return Err(IoError::NotADirectory);
    }

    add_cage(
        cageid,
        Cage::new(cageid, data_dir.to_path_buf(), root_dir, files),
    )?;
    info!("cage {cageid} rooted at {}", data_dir.display());
    Ok(())
}

/// Tear a cage down. Its remaining descriptors are closed once no request holds it any more.
///
/// Return:
///     - `InvalidHandle` if no such cage exists
pub fn cage_exit(cageid: u64) -> Result<(), IoError> {
    match remove_cage(cageid) {
        Some(_) => {
            info!("cage {cageid} exited");
            Ok(())
        }
        None => Err(IoError::InvalidHandle),
    }
}

/// Is a cage with this id registered?
pub fn cage_exists(cageid: u64) -> bool {
    get_cage(cageid).is_some()
}

/// Exit every cage.
pub fn rawposix_shutdown() {
    for cageid in cagetable_clear() {
        info!("cage {cageid} exited on shutdown");
    }
}
