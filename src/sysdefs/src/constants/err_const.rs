//! Error taxonomy for handle operations.
//!
//! Native errors are mapped into an `IoError` exactly once, at the raw OS
//! boundary, and are never re-interpreted afterwards. The discriminants are
//! the values guests see on the wire; `0` is reserved for "no error" and is
//! represented as `None` wherever an `Option<IoError>` is stored.

// Let's not have clippy warn about the unit error of `from_discriminant`
#![allow(clippy::result_unit_err)]

/// Wire value meaning "no error".
pub const IO_OK: u32 = 0;

#[doc(hidden)]
macro_rules! reversible_enum {
    ($(#[$settings: meta])* $visibility: vis enum $enumname:ident {
        $($(#[$valmeta: meta])* $valuename: ident = $value: expr,)*
    }) => {
        $(#[$settings])*
        $visibility enum $enumname {
            $($(#[$valmeta])* $valuename = $value,)*
        }

        impl $enumname {
            /// Map a wire value back to its variant.
            $visibility fn from_discriminant(v: u32) -> Result<Self, ()> {
                match v {
                    $($value => Ok($enumname::$valuename),)*
                    _ => Err(()),
                }
            }
        }
    }
}

reversible_enum! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
    #[repr(u32)]
    /// Error kinds reported by the handle subsystem.
    pub enum IoError {
        #[error("unknown error")]
        Unknown = 1,
        #[error("unsupported operation")]
        UnsupportedOperation = 2,
        #[error("invalid handle")]
        InvalidHandle = 3,
        #[error("handle previously had a fatal error")]
        PreviousFatalError = 4,
        #[error("invalid argument or argument combination")]
        InvalidArgument = 5,
        #[error("access denied")]
        PermissionDenied = 6,
        #[error("no space left")]
        OutOfSpace = 7,
        #[error("file or directory does not exist")]
        NotFound = 8,
        #[error("file already exists")]
        AlreadyExists = 9,
        #[error("path element is not a directory")]
        NotADirectory = 10,
        #[error("is a directory")]
        IsADirectory = 11,
        #[error("max open files reached")]
        TooManyOpenFiles = 12,
        #[error("too many symbolic links in path")]
        TooManySymlinks = 13,
        #[error("path too long")]
        PathTooLong = 14,
        #[error("file too big")]
        FileTooLarge = 15,
        #[error("offset too big")]
        Overflow = 16,
        #[error("no data ready to be read/written")]
        NotReady = 17,
        #[error("failed to allocate memory")]
        OutOfMemory = 18,
        #[error("operation interrupted by a signal")]
        Interrupted = 19,
        #[error("physical IO error")]
        PhysicalIOError = 20,
        #[error("device not found")]
        NoSuchDevice = 21,
        #[error("attempted to walk out of root directory")]
        Walkout = 22,
    }
}

/// Result alias used by every fallible operation below the dispatcher.
pub type IoResult<T> = Result<T, IoError>;

impl IoError {
    /// The wire value of this error.
    pub fn code(self) -> u32 {
        self as u32
    }

    /// Decode a wire value. `IO_OK` decodes to `None`, unknown values are
    /// rejected.
    pub fn from_code(code: u32) -> Result<Option<IoError>, ()> {
        if code == IO_OK {
            return Ok(None);
        }
        IoError::from_discriminant(code).map(Some)
    }
}

/// Encode a sticky error slot value for the wire.
pub fn error_code(error: Option<IoError>) -> u32 {
    error.map_or(IO_OK, IoError::code)
}
