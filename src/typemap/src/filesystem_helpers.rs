use sysdefs::constants::fs_const::{FilePerm, FileType, NTP_JAN_1970};
use sysdefs::data::fs_struct::{DateStamp, FileId, FileStatus};

// The host's `libc::stat` layout differs between platforms. FileStatus is
// what callers see, so every field goes through an explicit conversion here.

/// Classify a file from the `S_IFMT` bits of its mode.
pub fn kind_from_mode(mode: u32) -> FileType {
    let fmt = mode & (libc::S_IFMT as u32);
    if fmt == libc::S_IFREG as u32 {
        FileType::Regular
    } else if fmt == libc::S_IFDIR as u32 {
        FileType::Directory
    } else if fmt == libc::S_IFLNK as u32 {
        FileType::Symlink
    } else if fmt == libc::S_IFBLK as u32 {
        FileType::Block
    } else if fmt == libc::S_IFCHR as u32 {
        FileType::Character
    } else if fmt == libc::S_IFIFO as u32 {
        FileType::Fifo
    } else if fmt == libc::S_IFSOCK as u32 {
        FileType::Socket
    } else {
        FileType::Unknown
    }
}

/// Permission bits of a mode, without the file type.
pub fn perm_from_mode(mode: u32) -> FilePerm {
    FilePerm::from_bits_truncate((mode & 0o7777) as u16)
}

/// Classify a `d_type` value from a directory entry.
pub fn kind_from_dirent_type(d_type: u8) -> FileType {
    match d_type {
        libc::DT_REG => FileType::Regular,
        libc::DT_DIR => FileType::Directory,
        libc::DT_LNK => FileType::Symlink,
        libc::DT_BLK => FileType::Block,
        libc::DT_CHR => FileType::Character,
        libc::DT_FIFO => FileType::Fifo,
        libc::DT_SOCK => FileType::Socket,
        _ => FileType::Unknown,
    }
}

/// Convert a unix timestamp into an NTP based `DateStamp`.
///
/// ## Arguments:
/// - `secs`: seconds since the unix epoch
/// - `nsecs`: nanoseconds within that second
pub fn datestamp_from_unix(secs: i64, nsecs: i64) -> DateStamp {
    let nsecs = nsecs.clamp(0, 999_999_999) as u128;
    DateStamp {
        seconds: secs.saturating_add(NTP_JAN_1970),
        fraction: ((nsecs << 64) / 1_000_000_000) as u64,
    }
}

/// Build a `FileStatus` out of a `libc::stat` obtained from the host.
pub fn convert_stat(st: &libc::stat) -> FileStatus {
    let mode = st.st_mode as u32;
    FileStatus {
        id: FileId {
            dev: st.st_dev as u64,
            ino: st.st_ino as u64,
        },
        perm: perm_from_mode(mode),
        kind: kind_from_mode(mode),
        size: st.st_size.max(0) as u64,
        creation: creation_stamp(st),
        access: datestamp_from_unix(st.st_atime as i64, st.st_atime_nsec as i64),
        modification: datestamp_from_unix(st.st_mtime as i64, st.st_mtime_nsec as i64),
    }
}

#[cfg(target_os = "macos")]
fn creation_stamp(st: &libc::stat) -> DateStamp {
    datestamp_from_unix(st.st_birthtime as i64, st.st_birthtime_nsec as i64)
}

// No birth time in `struct stat` here, the status change time stands in.
#[cfg(not(target_os = "macos"))]
fn creation_stamp(st: &libc::stat) -> DateStamp {
    datestamp_from_unix(st.st_ctime as i64, st.st_ctime_nsec as i64)
}
