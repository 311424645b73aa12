//! Host file API
//!
//! Convenience wrappers that build one request each and unpack its completion. Failures come back
//! as neutral values (0, a default status, an empty list); the error itself stays on the handle and
//! is read with `file_last_error`. Makedir, remove and copy return their error directly.
use fdtables::{FileHandle, FileTable};
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{
    FileAccess, FileOpenFlags, FileWhence, MakeDirFlags, MakeTmpFlags, RemoveFlags,
};
use sysdefs::data::fs_struct::{DirEntry, FileStatus};

use crate::dispatcher::{io_wait_single_req, CompletionResult, Request};

/// Open `path` relative to `at`. The returned handle is only nil when the table is full; check
/// `file_last_error` for the outcome of the open itself.
pub fn file_open_at(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    rights: FileAccess,
    flags: FileOpenFlags,
) -> FileHandle {
    io_wait_single_req(
        table,
        Request::OpenAt {
            at,
            path,
            rights,
            flags,
        },
    )
    .handle()
}

/// Open `path` relative to the host's current directory.
pub fn file_open(
    table: &mut FileTable,
    path: &[u8],
    rights: FileAccess,
    flags: FileOpenFlags,
) -> FileHandle {
    file_open_at(table, FileHandle::NIL, path, rights, flags)
}

/// A new temporary file, or directory, open for reading and writing. Nil only when the table is
/// full.
pub fn file_maketmp(table: &mut FileTable, flags: MakeTmpFlags) -> FileHandle {
    io_wait_single_req(table, Request::MakeTmp { flags }).handle()
}

pub fn file_close(table: &mut FileTable, handle: FileHandle) {
    io_wait_single_req(table, Request::Close { handle });
}

/// Move the file position. Returns the new position, 0 on failure.
pub fn file_seek(table: &mut FileTable, handle: FileHandle, offset: i64, whence: FileWhence) -> i64 {
    match io_wait_single_req(
        table,
        Request::Seek {
            handle,
            offset,
            whence,
        },
    )
    .result
    {
        CompletionResult::Offset(pos) => pos,
        _ => 0,
    }
}

pub fn file_pos(table: &mut FileTable, handle: FileHandle) -> i64 {
    file_seek(table, handle, 0, FileWhence::Current)
}

/// Read into `buffer`. Returns the number of bytes read, 0 on failure.
pub fn file_read(table: &mut FileTable, handle: FileHandle, buffer: &mut [u8]) -> u64 {
    match io_wait_single_req(table, Request::Read { handle, buffer }).result {
        CompletionResult::Size(n) => n,
        _ => 0,
    }
}

/// Write `buffer`. Returns the number of bytes written, 0 on failure.
pub fn file_write(table: &mut FileTable, handle: FileHandle, buffer: &[u8]) -> u64 {
    match io_wait_single_req(table, Request::Write { handle, buffer }).result {
        CompletionResult::Size(n) => n,
        _ => 0,
    }
}

/// The sticky error of `handle`. A handle that doesn't resolve reports `InvalidHandle`.
pub fn file_last_error(table: &mut FileTable, handle: FileHandle) -> Option<IoError> {
    let cmp = io_wait_single_req(table, Request::GetError { handle });
    match cmp.result {
        CompletionResult::Error(error) => error,
        _ => cmp.error,
    }
}

pub fn file_get_status(table: &mut FileTable, handle: FileHandle) -> FileStatus {
    match io_wait_single_req(table, Request::Stat { handle }).result {
        CompletionResult::Status(status) => status,
        _ => FileStatus::default(),
    }
}

pub fn file_size(table: &mut FileTable, handle: FileHandle) -> u64 {
    file_get_status(table, handle).size
}

pub fn file_makedir(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    flags: MakeDirFlags,
) -> Option<IoError> {
    io_wait_single_req(table, Request::MakeDir { at, path, flags }).error
}

pub fn file_remove(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    flags: RemoveFlags,
) -> Option<IoError> {
    io_wait_single_req(table, Request::Remove { at, path, flags }).error
}

/// Entries of the directory open on `handle`, sorted by name. Empty on failure.
pub fn file_listdir(table: &mut FileTable, handle: FileHandle) -> Vec<DirEntry> {
    match io_wait_single_req(table, Request::ListDir { handle }).result {
        CompletionResult::Entries(entries) => entries,
        _ => Vec::new(),
    }
}

pub fn file_copy(table: &mut FileTable, src: FileHandle, dst: FileHandle) -> Option<IoError> {
    io_wait_single_req(table, Request::Copy { handle: src, dst }).error
}
