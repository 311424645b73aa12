//! Path related API
//!
//! Guest paths arrive as raw bytes. Nothing here touches the file system:
//! these helpers only split, join and validate byte strings so the resolver
//! can walk a path one component at a time.
use std::ffi::CString;
use sysdefs::constants::err_const::{IoError, IoResult};
use sysdefs::constants::fs_const::PATH_MAX;

pub const PATH_SEPARATOR: u8 = b'/';

/// Split a path into its components.
///
/// ## Arguments:
/// path: the path bytes as given by the caller
///
/// ## Returns:
/// The non-empty components in order. Repeated and trailing separators
/// produce no components, so `"/a//b/"` yields `["a", "b"]` and `"/"`
/// yields nothing.
pub fn split_path(path: &[u8]) -> Vec<&[u8]> {
    path.split(|b| *b == PATH_SEPARATOR)
        .filter(|comp| !comp.is_empty())
        .collect()
}

/// Join components with the path separator. No leading separator is added.
pub fn join_path<T: AsRef<[u8]>>(components: &[T]) -> Vec<u8> {
    let mut joined = Vec::new();
    for (i, comp) in components.iter().enumerate() {
        if i > 0 {
            joined.push(PATH_SEPARATOR);
        }
        joined.extend_from_slice(comp.as_ref());
    }
    joined
}

pub fn is_absolute(path: &[u8]) -> bool {
    path.first() == Some(&PATH_SEPARATOR)
}

/// `.` and `..` never name a new entry.
pub fn is_dot_or_dotdot(name: &[u8]) -> bool {
    name == b"." || name == b".."
}

/// Split a path into its parent components and its final name.
///
/// ## Returns:
/// `None` if the path has no components at all.
pub fn split_parent(path: &[u8]) -> Option<(Vec<&[u8]>, &[u8])> {
    let mut comps = split_path(path);
    let last = comps.pop()?;
    Some((comps, last))
}

/// Check a path given to an open request.
///
/// ## Returns:
/// - `InvalidArgument` for an empty path or one containing a NUL byte
/// - `PathTooLong` for a path longer than `PATH_MAX` bytes
pub fn validate_path(path: &[u8]) -> IoResult<()> {
    if path.is_empty() {
        return Err(IoError::InvalidArgument);
    }
    if path.len() > PATH_MAX {
        return Err(IoError::PathTooLong);
    }
    if path.contains(&0) {
        return Err(IoError::InvalidArgument);
    }
    Ok(())
}

/// Convert path bytes into a `CString` for libc.
pub fn to_cstring(path: &[u8]) -> IoResult<CString> {
    CString::new(path).map_err(|_| IoError::InvalidArgument)
}
