//! File system's type conversion related API
//!
//! Conversions from guest-facing rights, flags and seek origins into the
//! native libc values, and from native errno values into `IoError`. This is
//! the only place where an errno is interpreted.
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{FileAccess, FileOpenFlags, FileWhence};

/// Read the calling thread's errno.
pub fn get_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Map a native errno into the error taxonomy.
///
/// ## Arguments:
/// errno: value read right after the failing libc call
///
/// ## Returns:
/// The matching `IoError`. Values without a counterpart map to `Unknown`.
pub fn convert_errno(errno: i32) -> IoError {
    match errno {
        libc::EPERM | libc::EACCES | libc::EROFS | libc::EBADF => IoError::PermissionDenied,
        libc::ENOENT => IoError::NotFound,
        libc::EINTR => IoError::Interrupted,
        libc::EIO => IoError::PhysicalIOError,
        libc::ENXIO | libc::ENODEV => IoError::NoSuchDevice,
        libc::ENOMEM => IoError::OutOfMemory,
        libc::EFAULT | libc::EINVAL | libc::EDOM | libc::ESPIPE => IoError::InvalidArgument,
        libc::EBUSY | libc::EAGAIN => IoError::NotReady,
        libc::EEXIST => IoError::AlreadyExists,
        libc::ENOTDIR => IoError::NotADirectory,
        libc::EISDIR => IoError::IsADirectory,
        libc::ENFILE | libc::EMFILE => IoError::TooManyOpenFiles,
        libc::EFBIG => IoError::FileTooLarge,
        libc::ENOSPC | libc::EDQUOT => IoError::OutOfSpace,
        libc::ELOOP => IoError::TooManySymlinks,
        libc::ENAMETOOLONG => IoError::PathTooLong,
        libc::EOVERFLOW => IoError::Overflow,
        _ => IoError::Unknown,
    }
}

/// The error for the errno left by the last failing libc call.
pub fn last_error() -> IoError {
    convert_errno(get_errno())
}

/// Translate rights and open flags into `O_*` flags for `openat`.
///
/// Symlink handling flags are applied here as well: `NO_FOLLOW_LAST` maps
/// to `O_NOFOLLOW`, `OPEN_SYMLINK_ITSELF` to the platform's way of opening
/// the link entry itself. `RESTRICT_TO_ROOT` has no native counterpart.
pub fn convert_open_flags(rights: FileAccess, flags: FileOpenFlags) -> i32 {
    let mut oflags = if rights.contains(FileAccess::READ | FileAccess::WRITE) {
        libc::O_RDWR
    } else if rights.contains(FileAccess::WRITE) {
        libc::O_WRONLY
    } else {
        libc::O_RDONLY
    };

    if flags.contains(FileOpenFlags::TRUNCATE) {
        oflags |= libc::O_TRUNC;
    }
    if flags.contains(FileOpenFlags::APPEND) {
        oflags |= libc::O_APPEND;
    }
    if flags.contains(FileOpenFlags::CREATE) {
        oflags |= libc::O_CREAT;
    }
    if flags.contains(FileOpenFlags::NO_FOLLOW_LAST) {
        oflags |= libc::O_NOFOLLOW;
    }
    if flags.contains(FileOpenFlags::OPEN_SYMLINK_ITSELF) {
        oflags |= symlink_itself_flags();
    }
    oflags | libc::O_CLOEXEC
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn symlink_itself_flags() -> i32 {
    libc::O_PATH | libc::O_NOFOLLOW
}

#[cfg(target_os = "macos")]
fn symlink_itself_flags() -> i32 {
    libc::O_SYMLINK
}

#[cfg(not(any(target_os = "linux", target_os = "android", target_os = "macos")))]
fn symlink_itself_flags() -> i32 {
    libc::O_NOFOLLOW
}

/// Native flags for opening an existing directory. Directories can only be
/// opened read-only and can't be created by `openat`, so write access and
/// the create/truncate/append bits are dropped. The write right is still
/// carried by the handle.
pub fn dir_open_flags(oflags: i32) -> i32 {
    (oflags & !(libc::O_ACCMODE | libc::O_TRUNC | libc::O_APPEND | libc::O_CREAT)) | libc::O_RDONLY
}

/// Translate a seek origin into the native whence value.
pub fn convert_whence(whence: FileWhence) -> i32 {
    match whence {
        FileWhence::Set => libc::SEEK_SET,
        FileWhence::End => libc::SEEK_END,
        FileWhence::Current => libc::SEEK_CUR,
    }
}
