//! Entry point for requests coming from a cage.
//!
//! A guest only ever works below the directory its cage was set up with. Requests are rewritten
//! before dispatch so that this holds whatever the guest asks for:
//!     - a nil at-handle means the cage's root directory
//!     - every open is restricted to the directory it is relative to
//!     - the root directory handle can't be closed
use fdtables::FileHandle;
use log::trace;

use cage::get_cage;
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::FileOpenFlags;

use crate::dispatcher::{io_wait_single_req, Completion, Request};

/// Run a request on behalf of cage `cageid`.
pub fn guest_io_request(cageid: u64, req: Request<'_>) -> Completion {
    let Some(cage) = get_cage(cageid) else {
        return Completion::err(IoError::InvalidHandle);
    };

    let req = match confine(cage.root_dir, req) {
        Ok(req) => req,
        Err(e) => return Completion::err(e),
    };
    trace!("cage {cageid}: {}", req.name());

    let mut files = cage.files.lock();
    io_wait_single_req(&mut files, req)
}

fn at_or_root(at: FileHandle, root: FileHandle) -> FileHandle {
    if at.is_nil() {
        root
    } else {
        at
    }
}

fn confine(root: FileHandle, req: Request<'_>) -> Result<Request<'_>, IoError> {
    Ok(match req {
        Request::OpenAt {
            at,
            path,
            rights,
            flags,
        } => Request::OpenAt {
            at: at_or_root(at, root),
            path,
            rights,
            flags: flags | FileOpenFlags::RESTRICT_TO_ROOT,
        },
        Request::MakeDir { at, path, flags } => Request::MakeDir {
            at: at_or_root(at, root),
            path,
            flags,
        },
        Request::Remove { at, path, flags } => Request::Remove {
            at: at_or_root(at, root),
            path,
            flags,
        },
        Request::Close { handle } if handle == root => return Err(IoError::PermissionDenied),
        other => other,
    })
}
