// Host file API tests
//
// The wrappers unpack completions into plain values and leave errors on the handle.

use serial_test::serial;

use crate::file_api::*;
use crate::init::{io_wait_single_req_global, GLOBALFILETABLE};
use crate::tests::*;
use crate::{CompletionResult, Request};
use fdtables::FileHandle;
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{
    FileAccess, FileOpenFlags, FileType, FileWhence, MakeDirFlags, MakeTmpFlags, RemoveFlags,
};

// === WRAPPERS ===

/// Test: write, seek back, read, and the size and position along the way
#[test]
fn test_file_api_round_trip() {
    let mut jail = test_jail();
    let root = jail.root;
    let t = &mut jail.table;

    let flags = FileOpenFlags::CREATE | FileOpenFlags::RESTRICT_TO_ROOT;
    let h = file_open_at(t, root, b"api.txt", rw(), flags);
    assert_eq!(file_last_error(t, h), None);
    assert_eq!(file_write(t, h, b"0123456789"), 10);
    assert_eq!(file_pos(t, h), 10);
    assert_eq!(file_size(t, h), 10);

    assert_eq!(file_seek(t, h, 4, FileWhence::Set), 4);
    let mut buf = [0u8; 3];
    assert_eq!(file_read(t, h, &mut buf), 3);
    assert_eq!(&buf, b"456");

    let status = file_get_status(t, h);
    assert_eq!(status.kind, FileType::Regular);
    assert!(status.modification.seconds > 0);

    file_close(t, h);
    assert_eq!(file_last_error(t, h), Some(IoError::InvalidHandle));
}

/// Test: failures come back as neutral values with the error on the handle
#[test]
fn test_file_api_failures() {
    let mut jail = test_jail();
    let root = jail.root;
    let t = &mut jail.table;

    let flags = FileOpenFlags::CREATE | FileOpenFlags::RESTRICT_TO_ROOT;
    let h = file_open_at(t, root, b"ro.txt", FileAccess::READ, flags);
    assert_eq!(file_write(t, h, b"nope"), 0);
    assert_eq!(file_last_error(t, h), Some(IoError::PermissionDenied));

    let restrict = FileOpenFlags::RESTRICT_TO_ROOT;
    let missing = file_open_at(t, root, b"missing", FileAccess::READ, restrict);
    assert!(!missing.is_nil());
    assert_eq!(file_last_error(t, missing), Some(IoError::NotFound));
    assert_eq!(file_size(t, missing), 0);
    assert_eq!(file_seek(t, missing, 0, FileWhence::End), 0);
    assert!(file_listdir(t, missing).is_empty());
    // still the first error
    assert_eq!(file_last_error(t, missing), Some(IoError::NotFound));
}

/// Test: makedir, listdir and remove through the wrappers
#[test]
fn test_file_api_directories() {
    let mut jail = test_jail();
    let root = jail.root;
    let t = &mut jail.table;

    assert_eq!(
        file_makedir(t, root, b"d1/d2", MakeDirFlags::CREATE_PARENTS),
        None
    );
    assert_eq!(
        file_makedir(t, root, b"d1", MakeDirFlags::empty()),
        Some(IoError::AlreadyExists)
    );

    let entries = file_listdir(t, root);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, b"d1");
    assert_eq!(entries[0].kind, FileType::Directory);

    assert_eq!(
        file_remove(t, root, b"d1", RemoveFlags::empty()),
        Some(IoError::IsADirectory)
    );
    assert_eq!(file_remove(t, root, b"d1", RemoveFlags::RECURSIVE), None);
    assert!(file_listdir(t, root).is_empty());
}

/// Test: copy a sandbox file into a temporary file and read it back
#[cfg(target_os = "linux")]
#[test]
fn test_file_api_maketmp_and_copy() {
    let mut jail = test_jail();
    jail.write("src.txt", b"copied out");
    let root = jail.root;
    let t = &mut jail.table;

    let src = file_open_at(t, root, b"src.txt", FileAccess::READ, FileOpenFlags::RESTRICT_TO_ROOT);
    let tmp = file_maketmp(t, MakeTmpFlags::empty());
    assert_eq!(file_last_error(t, tmp), None);
    assert_eq!(file_copy(t, src, tmp), None);
    assert_eq!(file_size(t, tmp), 10);

    let mut buf = [0u8; 16];
    assert_eq!(file_read(t, tmp, &mut buf), 10);
    assert_eq!(&buf[..10], b"copied out");

    // a copy onto a read-only handle is refused
    assert_eq!(file_copy(t, tmp, src), Some(IoError::PermissionDenied));
    remove_opened(t, tmp);
}

// === GLOBAL TABLE ===

/// Test: host code opens absolute paths on the global table
#[test]
#[serial]
fn test_global_table_unrestricted_open() {
    let jail = test_jail();
    jail.write("host.txt", b"host");
    let path = jail.path("host.txt");

    let cmp = io_wait_single_req_global(Request::OpenAt {
        at: FileHandle::NIL,
        path: path_bytes(&path),
        rights: FileAccess::READ,
        flags: FileOpenFlags::empty(),
    });
    assert!(cmp.is_ok(), "{:?}", cmp.error);
    let h = cmp.handle();

    {
        let mut table = GLOBALFILETABLE.lock();
        let mut buf = [0u8; 8];
        assert_eq!(file_read(&mut table, h, &mut buf), 4);
        assert_eq!(&buf[..4], b"host");
    }

    let cmp = io_wait_single_req_global(Request::Close { handle: h });
    assert!(cmp.is_ok());
    assert_eq!(
        io_wait_single_req_global(Request::Stat { handle: h }).result,
        CompletionResult::None
    );
}
