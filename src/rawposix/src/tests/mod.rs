// RawPOSIX Test Suite
//
// Unit tests for the resolver, the dispatcher, the host file API and the guest bridge.
//
// Every test builds its own sandbox under a temporary directory:
//
//     <outer>/secret.txt      something a walkout would reach
//     <outer>/jail/           the jail root
//
// Tests that touch process-wide state (the cage map, the host table) are marked `#[serial]`.

mod file_api_tests; // Host wrappers and the global table

use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use fdtables::{FileHandle, FileTable};
use sysdefs::constants::fs_const::{FileAccess, FileOpenFlags};
use tempfile::TempDir;

use crate::dispatcher::{io_open_at, io_wait_single_req, Completion, Request};
use crate::init::new_file_table;

/// Contents of the file outside the jail.
pub const SECRET: &[u8] = b"outside the jail";

/// A jail and a table holding an unrestricted handle to its root.
pub struct Jail {
    pub table: FileTable,
    pub root: FileHandle,
    pub outer: TempDir,
}

impl Jail {
    /// Host path of `rel` inside the jail.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.outer.path().join("jail").join(rel)
    }

    pub fn jail_dir(&self) -> PathBuf {
        self.outer.path().join("jail")
    }

    pub fn mkdir(&self, rel: &str) {
        fs::create_dir_all(self.path(rel)).unwrap();
    }

    pub fn write(&self, rel: &str, contents: &[u8]) {
        fs::write(self.path(rel), contents).unwrap();
    }

    pub fn symlink(&self, target: &str, rel: &str) {
        symlink(target, self.path(rel)).unwrap();
    }

    /// Restricted open relative to the jail root.
    pub fn open(&mut self, path: &str, rights: FileAccess, flags: FileOpenFlags) -> Completion {
        self.open_at(self.root, path, rights, flags | FileOpenFlags::RESTRICT_TO_ROOT)
    }

    pub fn open_at(
        &mut self,
        at: FileHandle,
        path: &str,
        rights: FileAccess,
        flags: FileOpenFlags,
    ) -> Completion {
        io_wait_single_req(
            &mut self.table,
            Request::OpenAt {
                at,
                path: path.as_bytes(),
                rights,
                flags,
            },
        )
    }

    pub fn req(&mut self, req: Request<'_>) -> Completion {
        io_wait_single_req(&mut self.table, req)
    }

    /// Read everything left in `handle`.
    pub fn read_all(&mut self, handle: FileHandle) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 64];
        loop {
            let cmp = self.req(Request::Read {
                handle,
                buffer: &mut buf,
            });
            assert!(cmp.is_ok(), "read failed: {:?}", cmp.error);
            match cmp.result {
                crate::CompletionResult::Size(0) => return out,
                crate::CompletionResult::Size(n) => out.extend_from_slice(&buf[..n as usize]),
                other => panic!("unexpected read result {other:?}"),
            }
        }
    }
}

/// Setup function for tests
/// Builds the sandbox and opens its root with read and write rights
pub fn test_jail() -> Jail {
    let outer = tempfile::tempdir().unwrap();
    fs::create_dir(outer.path().join("jail")).unwrap();
    fs::write(outer.path().join("secret.txt"), SECRET).unwrap();

    let mut table = new_file_table();
    let cmp = io_open_at(
        &mut table,
        FileHandle::NIL,
        outer.path().join("jail").as_os_str().as_bytes(),
        FileAccess::READ | FileAccess::WRITE,
        FileOpenFlags::empty(),
    );
    assert!(cmp.is_ok(), "preopen failed: {:?}", cmp.error);
    let root = cmp.handle();
    Jail { table, root, outer }
}

/// Helper: bytes of a host path
pub fn path_bytes(p: &Path) -> &[u8] {
    p.as_os_str().as_bytes()
}

/// Remove what `handle` is open on, located through `/proc`. For temporary files made in the
/// host's temporary directory rather than the sandbox.
#[cfg(target_os = "linux")]
pub fn remove_opened(table: &FileTable, handle: FileHandle) -> PathBuf {
    let fd = table.resolve(handle).unwrap().fd;
    let path = fs::read_link(format!("/proc/self/fd/{}", fd.raw())).unwrap();
    if path.is_dir() {
        fs::remove_dir_all(&path).unwrap();
    } else {
        fs::remove_file(&path).unwrap();
    }
    path
}

pub fn rw() -> FileAccess {
    FileAccess::READ | FileAccess::WRITE
}

pub fn no_flags() -> FileOpenFlags {
    FileOpenFlags::empty()
}
