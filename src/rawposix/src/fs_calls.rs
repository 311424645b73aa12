//! Raw file system calls
//!
//! Thin wrappers over the libc `*at` family. Every function here either succeeds or returns the
//! `IoError` for the errno it observed, so errno is interpreted in exactly one place. Nothing here
//! knows about handles or jails: callers decide which directory descriptor a call is relative to.
use std::ffi::CStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use sysdefs::constants::err_const::{IoError, IoResult};
use sysdefs::constants::fs_const::{
    FileAccess, FileOpenFlags, FilePerm, FileType, FileWhence, COPY_CHUNK, DEFAULT_CREATE_MODE,
    MAKEDIR_MODE, MAKETMP_TEMPLATE, PATH_MAX,
};
use sysdefs::data::fs_struct::{DirEntry, FileDesc, FileStatus};
use typemap::{
    convert_open_flags, convert_stat, convert_whence, dir_open_flags, is_absolute,
    kind_from_dirent_type, last_error, to_cstring,
};

// A nil descriptor means "relative to the current directory".
fn dirfd_or_cwd(dir: FileDesc) -> i32 {
    if dir.is_nil() {
        libc::AT_FDCWD
    } else {
        dir.raw()
    }
}

/// Close handler registered with every handle table
///
/// This function will perform kernel close when a table is torn down with descriptors still open
pub fn kernel_close(fd: FileDesc) {
    let _ret = unsafe { libc::close(fd.raw()) };
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/openat.2.html
///
/// Opens `path` relative to `dir` with native flags derived from `rights` and `flags`. If the
/// target already exists and is a directory, it is opened read-only whatever the rights ask for,
/// since a directory descriptor can't be opened for writing. A symlink to a directory counts as a
/// directory unless the open stops at the symlink. `OPEN_SYMLINK_ITSELF` only takes effect when
/// the target is a symlink.
///
/// Input:
///     - dir: directory the path is relative to, nil for the current directory. An absolute path
///            with a non-nil `dir` is still taken relative to `dir`.
///     - path: path bytes, no NUL
///     - rights / flags: requested access and open flags
///
/// Return:
///     - the new descriptor, or the mapped error
pub fn raw_open_at(
    dir: FileDesc,
    path: &[u8],
    rights: FileAccess,
    mut flags: FileOpenFlags,
) -> IoResult<FileDesc> {
    let rel: Vec<u8>;
    let path = if !dir.is_nil() && is_absolute(path) {
        rel = [&b"."[..], path].concat();
        &rel[..]
    } else {
        path
    };

    // classify what the open will land on, so the stat follows a final symlink exactly when
    // the open does
    let follow =
        !flags.intersects(FileOpenFlags::NO_FOLLOW_LAST | FileOpenFlags::OPEN_SYMLINK_ITSELF);
    let kind = raw_fstat_at(dir, path, follow).map(|st| st.kind).ok();
    if flags.contains(FileOpenFlags::OPEN_SYMLINK_ITSELF) && kind != Some(FileType::Symlink) {
        flags.remove(FileOpenFlags::OPEN_SYMLINK_ITSELF);
    }
    let mut oflags = convert_open_flags(rights, flags);
    if kind.is_some_and(FileType::is_dir) {
        oflags = dir_open_flags(oflags);
    }

    let cpath = to_cstring(path)?;
    let fd = unsafe {
        libc::openat(
            dirfd_or_cwd(dir),
            cpath.as_ptr(),
            oflags,
            DEFAULT_CREATE_MODE as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(last_error());
    }
    Ok(FileDesc(fd))
}

/// Opens a directory to walk through it: read-only, must be a directory, never follows a symlink.
pub fn raw_open_dir_at(dir: FileDesc, name: &[u8]) -> IoResult<FileDesc> {
    let cname = to_cstring(name)?;
    let oflags = libc::O_RDONLY | libc::O_DIRECTORY | libc::O_NOFOLLOW | libc::O_CLOEXEC;
    let fd = unsafe { libc::openat(dirfd_or_cwd(dir), cname.as_ptr(), oflags) };
    if fd < 0 {
        return Err(last_error());
    }
    Ok(FileDesc(fd))
}

/// Creates `name` in `dir` for writing, or truncates it if it is already a regular file. A
/// symlink in its place is refused rather than followed.
pub fn raw_create_at(dir: FileDesc, name: &[u8], perm: FilePerm) -> IoResult<FileDesc> {
    let cname = to_cstring(name)?;
    let oflags = libc::O_WRONLY | libc::O_CREAT | libc::O_TRUNC | libc::O_NOFOLLOW;
    let fd = unsafe {
        libc::openat(
            dirfd_or_cwd(dir),
            cname.as_ptr(),
            oflags | libc::O_CLOEXEC,
            perm.bits() as libc::c_uint,
        )
    };
    if fd < 0 {
        return Err(last_error());
    }
    Ok(FileDesc(fd))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/mkstemp.3.html
///
/// Creates a file with a fresh name in `parent` and opens it for reading and writing. With
/// `directory` set a directory is created instead and opened read-only.
pub fn raw_make_tmp(parent: &Path, directory: bool) -> IoResult<FileDesc> {
    let template = parent.join(MAKETMP_TEMPLATE);
    // mkstemp and mkdtemp fill in the X's in place
    let mut buf = to_cstring(template.as_os_str().as_bytes())?.into_bytes_with_nul();
    let ptr = buf.as_mut_ptr().cast::<libc::c_char>();

    let fd = if directory {
        if unsafe { libc::mkdtemp(ptr) }.is_null() {
            return Err(last_error());
        }
        unsafe { libc::open(ptr, libc::O_RDONLY | libc::O_DIRECTORY | libc::O_CLOEXEC) }
    } else {
        unsafe { libc::mkstemp(ptr) }
    };
    if fd < 0 {
        return Err(last_error());
    }
    Ok(FileDesc(fd))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/close.2.html
pub fn raw_close(fd: FileDesc) -> IoResult<()> {
    if unsafe { libc::close(fd.raw()) } < 0 {
        return Err(last_error());
    }
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/fstat.2.html
pub fn raw_fstat(fd: FileDesc) -> IoResult<FileStatus> {
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstat(fd.raw(), &mut st) } < 0 {
        return Err(last_error());
    }
    Ok(convert_stat(&st))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/fstatat.2.html
///
/// With `follow` unset a symlink is reported as itself.
pub fn raw_fstat_at(dir: FileDesc, name: &[u8], follow: bool) -> IoResult<FileStatus> {
    let cname = to_cstring(name)?;
    let atflags = if follow { 0 } else { libc::AT_SYMLINK_NOFOLLOW };
    let mut st: libc::stat = unsafe { std::mem::zeroed() };
    if unsafe { libc::fstatat(dirfd_or_cwd(dir), cname.as_ptr(), &mut st, atflags) } < 0 {
        return Err(last_error());
    }
    Ok(convert_stat(&st))
}

/// Does `name` exist in `dir`? A dangling symlink exists.
pub fn raw_exists_at(dir: FileDesc, name: &[u8]) -> IoResult<bool> {
    match raw_fstat_at(dir, name, false) {
        Ok(_) => Ok(true),
        Err(IoError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/readlinkat.2.html
///
/// Return:
///     - the link target bytes. A target that doesn't fit in `PATH_MAX` is `PathTooLong`.
pub fn raw_read_link_at(dir: FileDesc, name: &[u8]) -> IoResult<Vec<u8>> {
    let cname = to_cstring(name)?;
    let mut buf = vec![0u8; PATH_MAX + 1];
    let len = unsafe {
        libc::readlinkat(
            dirfd_or_cwd(dir),
            cname.as_ptr(),
            buf.as_mut_ptr().cast::<libc::c_char>(),
            buf.len(),
        )
    };
    if len < 0 {
        return Err(last_error());
    }
    let len = len as usize;
    if len > PATH_MAX {
        return Err(IoError::PathTooLong);
    }
    buf.truncate(len);
    Ok(buf)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/lseek.2.html
pub fn raw_seek(fd: FileDesc, offset: i64, whence: FileWhence) -> IoResult<i64> {
    let pos = unsafe { libc::lseek(fd.raw(), offset as libc::off_t, convert_whence(whence)) };
    if pos < 0 {
        return Err(last_error());
    }
    Ok(pos as i64)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/read.2.html
pub fn raw_read(fd: FileDesc, buffer: &mut [u8]) -> IoResult<usize> {
    let ret = unsafe {
        libc::read(
            fd.raw(),
            buffer.as_mut_ptr().cast::<libc::c_void>(),
            buffer.len(),
        )
    };
    if ret < 0 {
        return Err(last_error());
    }
    Ok(ret as usize)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/write.2.html
pub fn raw_write(fd: FileDesc, buffer: &[u8]) -> IoResult<usize> {
    let ret = unsafe {
        libc::write(
            fd.raw(),
            buffer.as_ptr().cast::<libc::c_void>(),
            buffer.len(),
        )
    };
    if ret < 0 {
        return Err(last_error());
    }
    Ok(ret as usize)
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/pread.2.html
///
/// Replaces the contents of `dst` with those of `src`. Both are addressed by offset, so neither
/// descriptor's file position moves.
///
/// Return:
///     - the number of bytes copied
pub fn raw_copy_contents(src: FileDesc, dst: FileDesc) -> IoResult<u64> {
    if unsafe { libc::ftruncate(dst.raw(), 0) } < 0 {
        return Err(last_error());
    }
    let mut buf = vec![0u8; COPY_CHUNK];
    let mut offset: u64 = 0;
    loop {
        let n = unsafe {
            libc::pread(
                src.raw(),
                buf.as_mut_ptr().cast::<libc::c_void>(),
                buf.len(),
                offset as libc::off_t,
            )
        };
        if n < 0 {
            return Err(last_error());
        }
        if n == 0 {
            return Ok(offset);
        }
        let mut pending = &buf[..n as usize];
        while !pending.is_empty() {
            let w = unsafe {
                libc::pwrite(
                    dst.raw(),
                    pending.as_ptr().cast::<libc::c_void>(),
                    pending.len(),
                    offset as libc::off_t,
                )
            };
            if w < 0 {
                return Err(last_error());
            }
            if w == 0 {
                return Err(IoError::OutOfSpace);
            }
            pending = &pending[w as usize..];
            offset += w as u64;
        }
    }
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/symlinkat.2.html
pub fn raw_symlink_at(target: &[u8], dir: FileDesc, name: &[u8]) -> IoResult<()> {
    let ctarget = to_cstring(target)?;
    let cname = to_cstring(name)?;
    if unsafe { libc::symlinkat(ctarget.as_ptr(), dirfd_or_cwd(dir), cname.as_ptr()) } < 0 {
        return Err(last_error());
    }
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/mkdirat.2.html
///
/// New directories are created with `MAKEDIR_MODE`.
pub fn raw_mkdir_at(dir: FileDesc, name: &[u8]) -> IoResult<()> {
    let cname = to_cstring(name)?;
    if unsafe { libc::mkdirat(dirfd_or_cwd(dir), cname.as_ptr(), MAKEDIR_MODE as libc::mode_t) } < 0
    {
        return Err(last_error());
    }
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/unlinkat.2.html
///
/// `remove_dir` selects `AT_REMOVEDIR`. A symlink is removed itself.
pub fn raw_unlink_at(dir: FileDesc, name: &[u8], remove_dir: bool) -> IoResult<()> {
    let cname = to_cstring(name)?;
    let atflags = if remove_dir { libc::AT_REMOVEDIR } else { 0 };
    if unsafe { libc::unlinkat(dirfd_or_cwd(dir), cname.as_ptr(), atflags) } < 0 {
        return Err(last_error());
    }
    Ok(())
}

/// Reference to Linux: https://man7.org/linux/man-pages/man2/dup.2.html
pub fn raw_dup(fd: FileDesc) -> IoResult<FileDesc> {
    let newfd = unsafe { libc::fcntl(fd.raw(), libc::F_DUPFD_CLOEXEC, 0) };
    if newfd < 0 {
        return Err(last_error());
    }
    Ok(FileDesc(newfd))
}

/// Reference to Linux: https://man7.org/linux/man-pages/man3/readdir.3.html
///
/// Lists the entries of the directory open on `fd`, without `.` and `..`. The listing works on a
/// duplicate of `fd` rewound to the start, so `fd` itself is left as it was. Entries whose type
/// the directory doesn't report are classified with a stat that doesn't follow symlinks.
///
/// Return:
///     - the entries sorted by name
pub fn raw_list_dir(fd: FileDesc) -> IoResult<Vec<DirEntry>> {
    let dupfd = raw_dup(fd)?;
    let dir = unsafe { libc::fdopendir(dupfd.raw()) };
    if dir.is_null() {
        let err = last_error();
        let _ = raw_close(dupfd);
        return Err(err);
    }
    // the duplicate shares its offset with `fd`
    unsafe { libc::rewinddir(dir) };

    let mut entries = Vec::new();
    loop {
        let ent = unsafe { libc::readdir(dir) };
        if ent.is_null() {
            break;
        }
        let (name, d_type) = unsafe {
            (
                CStr::from_ptr((*ent).d_name.as_ptr()).to_bytes().to_vec(),
                (*ent).d_type,
            )
        };
        if name == b"." || name == b".." {
            continue;
        }
        let mut kind = kind_from_dirent_type(d_type);
        if kind == FileType::Unknown {
            kind = raw_fstat_at(fd, &name, false).map_or(FileType::Unknown, |st| st.kind);
        }
        entries.push(DirEntry { name, kind });
    }
    // rewind again so the offset shared with `fd` is back at the start
    unsafe {
        libc::rewinddir(dir);
        libc::closedir(dir);
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
