//! Path resolution restricted to a directory
//!
//! `open_restrict` opens a path "as if" a given directory were the root of the file system. The
//! path is walked one component at a time from that directory. `..` is checked against the
//! identity of the starting directory before every ascent, and symlinks are expanded here rather
//! than by the kernel, so neither can lead outside. Every native open made during the walk refuses
//! to follow a symlink, which closes the window between classifying an entry and opening it.
use std::collections::VecDeque;

use log::{trace, warn};

use sysdefs::constants::err_const::{IoError, IoResult};
use sysdefs::constants::fs_const::{FileAccess, FileOpenFlags, FileType, MAX_SYMLINK_EXPANSIONS};
use sysdefs::data::fs_struct::{FileDesc, FileId};
use typemap::{is_absolute, split_path};

use crate::fs_calls::{
    raw_close, raw_exists_at, raw_fstat, raw_fstat_at, raw_open_at, raw_open_dir_at,
    raw_read_link_at,
};

/// Open `path` below the directory `root`.
///
/// Input:
///     - root: descriptor of the jail root. It is never closed and never returned.
///     - path: path bytes. Leading separators are ignored, so `/a` is `a` below `root`.
///     - rights / flags: applied to the last component only. Every directory walked through on
///       the way is opened read-only.
///
/// Return:
///     - a fresh descriptor for the last component
///     - `Walkout` when `..` or an absolute symlink target would leave `root`
///     - `TooManySymlinks` for a symlink loop, or a final symlink with `NO_FOLLOW_LAST`
///     - `NotFound` / `NotADirectory` for missing or non-directory intermediate components
pub fn open_restrict(
    root: FileDesc,
    path: &[u8],
    rights: FileAccess,
    flags: FileOpenFlags,
) -> IoResult<FileDesc> {
    if root.is_nil() {
        return Err(IoError::InvalidHandle);
    }
    let root_id = raw_fstat(root)?.id;

    let mut remaining: VecDeque<Vec<u8>> =
        split_path(path).into_iter().map(<[u8]>::to_vec).collect();
    if remaining.is_empty() {
        remaining.push_back(b".".to_vec());
    }

    let mut walk = Walk {
        root,
        root_id,
        current: root,
        expansions: 0,
    };
    match walk.run(remaining, rights, flags) {
        Ok(fd) => Ok(fd),
        Err(e) => {
            walk.release();
            if e == IoError::Walkout {
                warn!("walkout attempt on {:?}", String::from_utf8_lossy(path));
            }
            Err(e)
        }
    }
}

struct Walk {
    root: FileDesc,
    root_id: FileId,
    current: FileDesc,
    expansions: usize,
}

impl Walk {
    fn run(
        &mut self,
        mut remaining: VecDeque<Vec<u8>>,
        rights: FileAccess,
        flags: FileOpenFlags,
    ) -> IoResult<FileDesc> {
        while let Some(name) = remaining.pop_front() {
            // symlink expansion pushes components back, so this is checked on every turn
            let is_last = remaining.is_empty();

            match name.as_slice() {
                b"." => {
                    if is_last {
                        let fd = raw_open_at(self.current, b".", rights, without_create(flags))?;
                        self.advance(fd);
                    }
                }
                b".." => {
                    if self.current == self.root || raw_fstat(self.current)?.id == self.root_id {
                        return Err(IoError::Walkout);
                    }
                    let fd = if is_last {
                        raw_open_at(self.current, b"..", rights, without_create(flags))?
                    } else {
                        raw_open_dir_at(self.current, b"..")?
                    };
                    self.advance(fd);
                }
                _ => {
                    if let Some(target) = self.step(&name, is_last, rights, flags)? {
                        trace!(
                            "expanding symlink {:?} -> {:?}",
                            String::from_utf8_lossy(&name),
                            String::from_utf8_lossy(&target)
                        );
                        let mut comps: Vec<&[u8]> = split_path(&target);
                        if comps.is_empty() {
                            comps.push(&b"."[..]);
                        }
                        for comp in comps.into_iter().rev() {
                            remaining.push_front(comp.to_vec());
                        }
                    }
                }
            }
        }

        if self.current == self.root {
            // only reachable through components that were all skipped; hand out a copy
            let fd = raw_open_at(self.root, b".", rights, without_create(flags))?;
            self.advance(fd);
        }
        Ok(self.current)
    }

    // Handle a regular name. Returns the link target when the name is a symlink that must be
    // expanded.
    fn step(
        &mut self,
        name: &[u8],
        is_last: bool,
        rights: FileAccess,
        flags: FileOpenFlags,
    ) -> IoResult<Option<Vec<u8>>> {
        if !raw_exists_at(self.current, name)? {
            if !(is_last && flags.contains(FileOpenFlags::CREATE)) {
                return Err(IoError::NotFound);
            }
            let fd = raw_open_at(self.current, name, rights, final_flags(flags))?;
            self.advance(fd);
            return Ok(None);
        }
        let status = raw_fstat_at(self.current, name, false)?;

        match status.kind {
            FileType::Symlink => {
                if is_last && flags.contains(FileOpenFlags::OPEN_SYMLINK_ITSELF) {
                    let fd = raw_open_at(self.current, name, rights, flags)?;
                    self.advance(fd);
                    return Ok(None);
                }
                if is_last && flags.contains(FileOpenFlags::NO_FOLLOW_LAST) {
                    return Err(IoError::TooManySymlinks);
                }
                self.expansions += 1;
                if self.expansions > MAX_SYMLINK_EXPANSIONS {
                    return Err(IoError::TooManySymlinks);
                }
                let target = raw_read_link_at(self.current, name)?;
                if is_absolute(&target) {
                    return Err(IoError::Walkout);
                }
                Ok(Some(target))
            }
            FileType::Directory => {
                let fd = if is_last {
                    raw_open_at(self.current, name, rights, final_flags(flags))?
                } else {
                    raw_open_dir_at(self.current, name)?
                };
                self.advance(fd);
                Ok(None)
            }
            // regular files and everything else can only be the last component
            _ => {
                if !is_last {
                    return Err(IoError::NotADirectory);
                }
                let fd = raw_open_at(self.current, name, rights, final_flags(flags))?;
                self.advance(fd);
                Ok(None)
            }
        }
    }

    fn advance(&mut self, fd: FileDesc) {
        if self.current != self.root {
            let _ = raw_close(self.current);
        }
        self.current = fd;
    }

    fn release(&mut self) {
        if self.current != self.root {
            let _ = raw_close(self.current);
        }
        self.current = self.root;
    }
}

// `.` and `..` always name an existing directory.
fn without_create(flags: FileOpenFlags) -> FileOpenFlags {
    flags.difference(FileOpenFlags::CREATE | FileOpenFlags::OPEN_SYMLINK_ITSELF)
}

// The last component was classified as something other than a symlink. If it has been swapped
// for one since, the open fails instead of following it.
fn final_flags(flags: FileOpenFlags) -> FileOpenFlags {
    flags.difference(FileOpenFlags::OPEN_SYMLINK_ITSELF) | FileOpenFlags::NO_FOLLOW_LAST
}
