//! Request dispatcher
//!
//! One synchronous request at a time against one handle table. A request names its operation and
//! carries only what that operation needs; the answer is a single `Completion`. There is no state
//! kept between two requests other than what is stored in the table's slots.
//!
//! Slot policy:
//!     - a handle that doesn't resolve is `InvalidHandle`
//!     - a poisoned slot only serves `Close` and `GetError`, everything else is
//!       `PreviousFatalError` and the descriptor is not touched
//!     - errors of an operation on a slot are recorded on it, so `GetError` can report them later
use std::path::Path;

use log::{debug, trace, warn};

use fdtables::{FileHandle, FileSlot, FileTable};
use sysdefs::constants::err_const::{IoError, IoResult};
use sysdefs::constants::fs_const::{
    FileAccess, FileOpenFlags, FileType, FileWhence, MakeDirFlags, MakeTmpFlags, RemoveFlags,
};
use sysdefs::data::fs_struct::{DirEntry, FileDesc, FileId, FileStatus};
use typemap::{is_absolute, is_dot_or_dotdot, join_path, split_parent, split_path, validate_path};

use crate::fs_calls::{
    raw_close, raw_copy_contents, raw_create_at, raw_fstat, raw_fstat_at, raw_list_dir,
    raw_make_tmp, raw_mkdir_at, raw_open_at, raw_open_dir_at, raw_read, raw_read_link_at,
    raw_seek, raw_symlink_at, raw_unlink_at, raw_write,
};
use crate::restrict::open_restrict;

/// One operation on a handle table.
#[derive(Debug)]
pub enum Request<'a> {
    /// Open `path` relative to `at`. A nil `at` means the current directory of the host and is
    /// only valid without `RESTRICT_TO_ROOT`.
    OpenAt {
        at: FileHandle,
        path: &'a [u8],
        rights: FileAccess,
        flags: FileOpenFlags,
    },
    Close {
        handle: FileHandle,
    },
    Stat {
        handle: FileHandle,
    },
    Seek {
        handle: FileHandle,
        offset: i64,
        whence: FileWhence,
    },
    Read {
        handle: FileHandle,
        buffer: &'a mut [u8],
    },
    Write {
        handle: FileHandle,
        buffer: &'a [u8],
    },
    GetError {
        handle: FileHandle,
    },
    /// Create a directory. Runs jailed below `at` unless `at` is nil.
    MakeDir {
        at: FileHandle,
        path: &'a [u8],
        flags: MakeDirFlags,
    },
    /// Remove a file or directory. Runs jailed below `at` unless `at` is nil.
    Remove {
        at: FileHandle,
        path: &'a [u8],
        flags: RemoveFlags,
    },
    ListDir {
        handle: FileHandle,
    },
    /// Create a temporary file, or directory, in the host's temporary directory.
    MakeTmp {
        flags: MakeTmpFlags,
    },
    /// Copy the file or directory tree open on `handle` into `dst`.
    Copy {
        handle: FileHandle,
        dst: FileHandle,
    },
}

impl Request<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Request::OpenAt { .. } => "open_at",
            Request::Close { .. } => "close",
            Request::Stat { .. } => "stat",
            Request::Seek { .. } => "seek",
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
            Request::GetError { .. } => "get_error",
            Request::MakeDir { .. } => "makedir",
            Request::Remove { .. } => "remove",
            Request::ListDir { .. } => "listdir",
            Request::MakeTmp { .. } => "maketmp",
            Request::Copy { .. } => "copy",
        }
    }
}

/// What a request produced.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CompletionResult {
    #[default]
    None,
    Handle(FileHandle),
    Size(u64),
    Offset(i64),
    Status(FileStatus),
    Error(Option<IoError>),
    Entries(Vec<DirEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Completion {
    pub error: Option<IoError>,
    pub result: CompletionResult,
}

impl Completion {
    pub fn ok(result: CompletionResult) -> Self {
        Completion {
            error: None,
            result,
        }
    }

    pub fn err(error: IoError) -> Self {
        Completion {
            error: Some(error),
            result: CompletionResult::None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The handle minted by an open, nil for any other result.
    pub fn handle(&self) -> FileHandle {
        match self.result {
            CompletionResult::Handle(handle) => handle,
            _ => FileHandle::NIL,
        }
    }

    // A failure that still carries a result, like a failed open and its handle.
    fn with_error(error: IoError, result: CompletionResult) -> Self {
        Completion {
            error: Some(error),
            result,
        }
    }

    fn from_result(res: IoResult<CompletionResult>) -> Self {
        match res {
            Ok(result) => Completion::ok(result),
            Err(e) => Completion::err(e),
        }
    }
}

/// Run one request against `table` and wait for its completion.
pub fn io_wait_single_req(table: &mut FileTable, req: Request<'_>) -> Completion {
    let name = req.name();
    trace!("io request {name}");

    let cmp = match req {
        Request::OpenAt {
            at,
            path,
            rights,
            flags,
        } => io_open_at(table, at, path, rights, flags),
        Request::Close { handle } => io_close(table, handle),
        Request::GetError { handle } => io_get_error(table, handle),
        Request::MakeDir { at, path, flags } => io_makedir(table, at, path, flags),
        Request::Remove { at, path, flags } => io_remove(table, at, path, flags),
        Request::MakeTmp { flags } => io_make_tmp(table, flags),
        Request::Copy { handle, dst } => io_copy(table, handle, dst),
        Request::Stat { handle } => with_slot(table, handle, FileAccess::empty(), |slot| {
            raw_fstat(slot.fd).map(CompletionResult::Status)
        }),
        Request::Seek {
            handle,
            offset,
            whence,
        } => with_slot(table, handle, FileAccess::empty(), |slot| {
            raw_seek(slot.fd, offset, whence).map(CompletionResult::Offset)
        }),
        Request::Read { handle, buffer } => with_slot(table, handle, FileAccess::READ, |slot| {
            if buffer.is_empty() {
                return Ok(CompletionResult::Size(0));
            }
            raw_read(slot.fd, buffer).map(|n| CompletionResult::Size(n as u64))
        }),
        Request::Write { handle, buffer } => with_slot(table, handle, FileAccess::WRITE, |slot| {
            if buffer.is_empty() {
                return Ok(CompletionResult::Size(0));
            }
            raw_write(slot.fd, buffer).map(|n| CompletionResult::Size(n as u64))
        }),
        Request::ListDir { handle } => with_slot(table, handle, FileAccess::empty(), |slot| {
            if !slot.kind.is_dir() {
                return Err(IoError::NotADirectory);
            }
            raw_list_dir(slot.fd).map(CompletionResult::Entries)
        }),
    };

    if let Some(e) = cmp.error {
        debug!("{name} failed: {e}");
    }
    cmp
}

// Resolve, check poison and rights, run `op` and record its error on the slot.
fn with_slot<F>(table: &mut FileTable, handle: FileHandle, access: FileAccess, op: F) -> Completion
where
    F: FnOnce(&FileSlot) -> IoResult<CompletionResult>,
{
    let Some(slot) = table.resolve_mut(handle) else {
        return Completion::err(IoError::InvalidHandle);
    };
    if slot.fatal {
        return Completion::err(IoError::PreviousFatalError);
    }
    if !slot.rights.contains(access) {
        slot.set_error(IoError::PermissionDenied);
        return Completion::err(IoError::PermissionDenied);
    }

    match op(slot) {
        Ok(result) => Completion::ok(result),
        Err(e) => {
            slot.set_error(e);
            Completion::err(e)
        }
    }
}

fn io_get_error(table: &FileTable, handle: FileHandle) -> Completion {
    match table.resolve(handle) {
        Some(slot) => Completion::ok(CompletionResult::Error(slot.error)),
        None => Completion::err(IoError::InvalidHandle),
    }
}

/// Release the slot's descriptor and recycle the slot. Close errors are ignored, and a poisoned
/// slot is closed like any other.
pub fn io_close(table: &mut FileTable, handle: FileHandle) -> Completion {
    let Some(slot) = table.resolve_mut(handle) else {
        return Completion::err(IoError::InvalidHandle);
    };
    if !slot.fd.is_nil() {
        if let Err(e) = raw_close(slot.fd) {
            debug!("close of {handle} ignored error {e}");
        }
        slot.fd = FileDesc::NIL;
    }
    table.recycle(handle.index());
    Completion::ok(CompletionResult::None)
}

/// Open `path` relative to `at`, with rights narrowed to what `at` holds.
///
/// A slot is taken first and its handle is returned even when the open fails, so callers always
/// get something to query and close. Any failure after the slot is taken poisons it.
///
/// Input:
///     - at: handle the path is relative to. Nil means the host's current directory, which is
///           only allowed for unrestricted opens.
///     - path: path bytes
///     - rights: requested rights. They must all be held by `at`; nothing is silently dropped.
///     - flags: open flags. `RESTRICT_TO_ROOT` confines resolution below `at`.
///
/// Return:
///     - `Completion.result` is the handle, nil only if the table was full
pub fn io_open_at(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    rights: FileAccess,
    flags: FileOpenFlags,
) -> Completion {
    let index = match table.alloc() {
        Ok(index) => index,
        Err(e) => {
            return Completion::with_error(e, CompletionResult::Handle(FileHandle::NIL));
        }
    };
    let handle = table.handle_for(index);

    let opened = open_for_slot(table, handle, at, path, rights, flags).and_then(classify);
    fill_slot(table, index, handle, rights, opened)
}

// Pairs a fresh descriptor with its kind, closing it if it can't be classified.
fn classify(fd: FileDesc) -> IoResult<(FileDesc, FileType)> {
    match raw_fstat(fd) {
        Ok(status) => Ok((fd, status.kind)),
        Err(e) => {
            let _ = raw_close(fd);
            Err(e)
        }
    }
}

// Store the outcome of an open in the slot taken for it. A failure poisons the slot.
fn fill_slot(
    table: &mut FileTable,
    index: u32,
    handle: FileHandle,
    rights: FileAccess,
    opened: IoResult<(FileDesc, FileType)>,
) -> Completion {
    let Some(slot) = table.slot_mut(index) else {
        if let Ok((fd, _)) = opened {
            let _ = raw_close(fd);
        }
        return Completion::with_error(IoError::Unknown, CompletionResult::Handle(handle));
    };
    slot.rights = rights;
    match opened {
        Ok((fd, kind)) => {
            slot.fd = fd;
            slot.kind = kind;
            trace!("opened {handle} as {kind:?}");
            Completion::ok(CompletionResult::Handle(handle))
        }
        Err(e) => {
            slot.set_fatal(e);
            Completion::with_error(e, CompletionResult::Handle(handle))
        }
    }
}

/// Create a temporary file, or a directory with `MakeTmpFlags::DIRECTORY`, and open it with read
/// and write rights. It isn't removed when the handle is closed.
///
/// As with an open, the handle is returned even when creation fails, and its slot is poisoned.
pub fn io_make_tmp(table: &mut FileTable, flags: MakeTmpFlags) -> Completion {
    make_tmp_in(table, &std::env::temp_dir(), flags)
}

pub(crate) fn make_tmp_in(
    table: &mut FileTable,
    parent: &Path,
    flags: MakeTmpFlags,
) -> Completion {
    let index = match table.alloc() {
        Ok(index) => index,
        Err(e) => {
            return Completion::with_error(e, CompletionResult::Handle(FileHandle::NIL));
        }
    };
    let handle = table.handle_for(index);

    let made = raw_make_tmp(parent, flags.contains(MakeTmpFlags::DIRECTORY)).and_then(classify);
    fill_slot(table, index, handle, FileAccess::READ | FileAccess::WRITE, made)
}

// Steps of an open that happen before the slot is filled in.
fn open_for_slot(
    table: &FileTable,
    handle: FileHandle,
    at: FileHandle,
    path: &[u8],
    rights: FileAccess,
    flags: FileOpenFlags,
) -> IoResult<FileDesc> {
    validate_path(path)?;

    let at_fd = if at.is_nil() {
        FileDesc::NIL
    } else {
        // the slot just taken can't be its own directory
        if at == handle {
            return Err(IoError::InvalidHandle);
        }
        let at_slot = table.resolve(at).ok_or(IoError::InvalidHandle)?;
        if at_slot.fatal {
            return Err(IoError::PreviousFatalError);
        }
        if at_slot.rights.intersection(rights) != rights {
            return Err(IoError::PermissionDenied);
        }
        at_slot.fd
    };

    if flags.contains(FileOpenFlags::RESTRICT_TO_ROOT) {
        if at_fd.is_nil() {
            return Err(IoError::InvalidHandle);
        }
        open_restrict(at_fd, path, rights, flags)
    } else {
        raw_open_at(at_fd, path, rights, flags)
    }
}

// Resolve the `at` handle of a makedir or remove. These operations don't have a slot of their
// own, so nothing is recorded on `at` except a rights failure.
fn dir_operand(table: &mut FileTable, at: FileHandle) -> IoResult<FileDesc> {
    if at.is_nil() {
        return Ok(FileDesc::NIL);
    }
    let slot = table.resolve_mut(at).ok_or(IoError::InvalidHandle)?;
    if slot.fatal {
        return Err(IoError::PreviousFatalError);
    }
    if !slot.rights.contains(FileAccess::READ | FileAccess::WRITE) {
        slot.set_error(IoError::PermissionDenied);
        return Err(IoError::PermissionDenied);
    }
    Ok(slot.fd)
}

// Open the parent directory of the last component of `path`, jailed below `root` unless `root`
// is nil. Returns the descriptor and the last component.
fn open_parent<'p>(root: FileDesc, path: &'p [u8]) -> IoResult<(FileDesc, &'p [u8])> {
    let (parents, name) = split_parent(path).ok_or(IoError::InvalidArgument)?;
    if is_dot_or_dotdot(name) {
        return Err(IoError::InvalidArgument);
    }

    let mut parent_path = join_path(&parents);
    if root.is_nil() {
        if is_absolute(path) {
            parent_path.insert(0, b'/');
        }
        if parent_path.is_empty() {
            parent_path.push(b'.');
        }
        let fd = raw_open_at(FileDesc::NIL, &parent_path, FileAccess::READ, FileOpenFlags::empty())?;
        Ok((fd, name))
    } else {
        let fd = open_restrict(root, &parent_path, FileAccess::READ, FileOpenFlags::empty())?;
        Ok((fd, name))
    }
}

// Runs `op` on the parent directory of `path` and closes it afterwards.
fn in_parent<T, F>(root: FileDesc, path: &[u8], op: F) -> IoResult<T>
where
    F: FnOnce(FileDesc, &[u8]) -> IoResult<T>,
{
    let (parent, name) = open_parent(root, path)?;
    let res = op(parent, name);
    let _ = raw_close(parent);
    res
}

/// Create the directory `path` relative to `at`.
pub fn io_makedir(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    flags: MakeDirFlags,
) -> Completion {
    Completion::from_result(
        validate_path(path)
            .and_then(|()| dir_operand(table, at))
            .and_then(|root| makedir(root, path, flags))
            .map(|()| CompletionResult::None),
    )
}

fn makedir(root: FileDesc, path: &[u8], flags: MakeDirFlags) -> IoResult<()> {
    if flags.contains(MakeDirFlags::CREATE_PARENTS) {
        // create every prefix in turn, each one resolved from `root` again
        let comps = split_path(path);
        let mut prefix: Vec<&[u8]> = Vec::with_capacity(comps.len());
        for comp in comps {
            prefix.push(comp);
            if is_dot_or_dotdot(comp) {
                continue;
            }
            let mut sub = join_path(&prefix);
            if root.is_nil() && is_absolute(path) {
                sub.insert(0, b'/');
            }
            makedir(root, &sub, MakeDirFlags::IGNORE_EXISTING)?;
        }
        return Ok(());
    }

    in_parent(root, path, |parent, name| match raw_mkdir_at(parent, name) {
        Err(IoError::AlreadyExists) if flags.contains(MakeDirFlags::IGNORE_EXISTING) => {
            match raw_fstat_at(parent, name, true) {
                Ok(st) if st.kind.is_dir() => Ok(()),
                Ok(_) => Err(IoError::AlreadyExists),
                Err(e) => Err(e),
            }
        }
        res => res,
    })
}

/// Remove the file or directory `path` relative to `at`.
pub fn io_remove(
    table: &mut FileTable,
    at: FileHandle,
    path: &[u8],
    flags: RemoveFlags,
) -> Completion {
    Completion::from_result(
        validate_path(path)
            .and_then(|()| dir_operand(table, at))
            .and_then(|root| in_parent(root, path, |parent, name| remove_at(parent, name, flags)))
            .map(|()| CompletionResult::None),
    )
}

fn remove_at(parent: FileDesc, name: &[u8], flags: RemoveFlags) -> IoResult<()> {
    let status = raw_fstat_at(parent, name, false)?;
    if !status.kind.is_dir() {
        return raw_unlink_at(parent, name, false);
    }
    if flags.contains(RemoveFlags::RECURSIVE) {
        let dir = raw_open_dir_at(parent, name)?;
        let res = remove_contents(dir);
        let _ = raw_close(dir);
        res?;
    } else if !flags.contains(RemoveFlags::REMOVE_DIR) {
        return Err(IoError::IsADirectory);
    }
    raw_unlink_at(parent, name, true)
}

// Depth first. Subdirectories are opened without following symlinks, and symlinks themselves are
// unlinked, so nothing outside `dir` is touched.
fn remove_contents(dir: FileDesc) -> IoResult<()> {
    for entry in raw_list_dir(dir)? {
        remove_at(dir, &entry.name, RemoveFlags::RECURSIVE)?;
    }
    Ok(())
}

// A copy operand: its descriptor, kind and identity. Rights and poison are checked here, and a
// missing right is recorded on the operand.
fn copy_operand(
    table: &mut FileTable,
    handle: FileHandle,
    access: FileAccess,
) -> IoResult<(FileDesc, FileType, FileId)> {
    let slot = table.resolve_mut(handle).ok_or(IoError::InvalidHandle)?;
    if slot.fatal {
        return Err(IoError::PreviousFatalError);
    }
    if !slot.rights.contains(access) {
        slot.set_error(IoError::PermissionDenied);
        return Err(IoError::PermissionDenied);
    }
    let id = raw_fstat(slot.fd)?.id;
    Ok((slot.fd, slot.kind, id))
}

/// Copy what `src` is open on into `dst`.
///
/// A regular file replaces the contents of a regular file. A directory is copied entry by entry
/// into a directory: subdirectories are created as needed, existing files are overwritten and
/// symlinks are recreated as symlinks, never followed. Nothing is written outside `dst`, and a
/// `dst` lying inside `src` is not copied into itself.
///
/// `src` needs the read right and `dst` the write right. Failures of the copy itself are recorded
/// on `dst`.
pub fn io_copy(table: &mut FileTable, src: FileHandle, dst: FileHandle) -> Completion {
    let operands = copy_operand(table, src, FileAccess::READ)
        .and_then(|from| Ok((from, copy_operand(table, dst, FileAccess::WRITE)?)));
    let ((src_fd, src_kind, src_id), (dst_fd, dst_kind, dst_id)) = match operands {
        Ok(operands) => operands,
        Err(e) => return Completion::err(e),
    };

    let res = if src_id == dst_id {
        Err(IoError::InvalidArgument)
    } else {
        match (src_kind, dst_kind) {
            (FileType::Regular, FileType::Regular) => {
                raw_copy_contents(src_fd, dst_fd).map(|_| ())
            }
            (FileType::Regular, FileType::Directory) => Err(IoError::IsADirectory),
            (FileType::Directory, FileType::Directory) => copy_tree(src_fd, dst_fd, dst_id),
            (FileType::Directory, _) => Err(IoError::NotADirectory),
            _ => Err(IoError::UnsupportedOperation),
        }
    };

    match res {
        Ok(()) => Completion::ok(CompletionResult::None),
        Err(e) => {
            if let Some(slot) = table.resolve_mut(dst) {
                slot.set_error(e);
            }
            Completion::err(e)
        }
    }
}

// Copies the entries of `src` into `dst`, depth first. `skip` is the top destination, left out
// wherever it shows up below `src`.
fn copy_tree(src: FileDesc, dst: FileDesc, skip: FileId) -> IoResult<()> {
    for entry in raw_list_dir(src)? {
        let name = entry.name.as_slice();
        let status = raw_fstat_at(src, name, false)?;
        if status.id == skip {
            continue;
        }
        match status.kind {
            FileType::Regular => {
                let from =
                    raw_open_at(src, name, FileAccess::READ, FileOpenFlags::NO_FOLLOW_LAST)?;
                let res = raw_create_at(dst, name, status.perm).and_then(|to| {
                    let res = raw_copy_contents(from, to);
                    let _ = raw_close(to);
                    res
                });
                let _ = raw_close(from);
                res?;
            }
            FileType::Directory => {
                match raw_mkdir_at(dst, name) {
                    Ok(()) | Err(IoError::AlreadyExists) => {}
                    Err(e) => return Err(e),
                }
                let from = raw_open_dir_at(src, name)?;
                let res = raw_open_dir_at(dst, name).and_then(|to| {
                    let res = copy_tree(from, to, skip);
                    let _ = raw_close(to);
                    res
                });
                let _ = raw_close(from);
                res?;
            }
            FileType::Symlink => {
                let target = raw_read_link_at(src, name)?;
                match raw_symlink_at(&target, dst, name) {
                    // a link left by an earlier copy is replaced, anything else stays
                    Err(IoError::AlreadyExists)
                        if raw_fstat_at(dst, name, false)?.kind == FileType::Symlink =>
                    {
                        raw_unlink_at(dst, name, false)?;
                        raw_symlink_at(&target, dst, name)?;
                    }
                    res => res?,
                }
            }
            kind => warn!("copy skipped {} ({kind:?})", String::from_utf8_lossy(name)),
        }
    }
    Ok(())
}
