use crate::cli::{CliOptions, Command};
use anyhow::{bail, Context, Result};
use fdtables::FileHandle;
use log::debug;
use rawposix::{cage_init, guest_io_request, Completion, CompletionResult, Request};
use std::io::{Read, Write};
use sysdefs::constants::err_const::IoError;
use sysdefs::constants::fs_const::{
    FileAccess, FileOpenFlags, FileType, MakeDirFlags, RemoveFlags, NTP_JAN_1970,
};
use sysdefs::data::fs_struct::FileStatus;

/// The one cage this tool runs as.
const FSJAIL_CAGEID: u64 = 1;

const CHUNK: usize = 64 * 1024;

/// Boots the cage and runs the selected subcommand in it.
///
/// The cage's data directory is opened once by the host; from there on every request goes
/// through `guest_io_request`, so the subcommands get the same treatment a guest would.
pub fn execute(fsjail_cli: &CliOptions) -> Result<()> {
    cage_init(FSJAIL_CAGEID, &fsjail_cli.root)
        .with_context(|| format!("can't use {} as root", fsjail_cli.root.display()))?;
    debug!("running {:?}", fsjail_cli.command);

    let guest = Guest {
        cageid: FSJAIL_CAGEID,
    };
    match &fsjail_cli.command {
        Command::Cat { path } => guest.cat(path),
        Command::Write { path, text, append } => match text {
            Some(text) => guest.write(path, *append, &mut text.as_bytes()),
            None => guest.write(path, *append, &mut std::io::stdin().lock()),
        },
        Command::Stat { path } => guest.stat(path),
        Command::Ls { path } => guest.ls(path),
        Command::Mkdir { path, parents } => {
            let flags = if *parents {
                MakeDirFlags::CREATE_PARENTS | MakeDirFlags::IGNORE_EXISTING
            } else {
                MakeDirFlags::empty()
            };
            guest
                .run(Request::MakeDir {
                    at: FileHandle::NIL,
                    path: path.as_bytes(),
                    flags,
                })
                .with_context(|| format!("mkdir {path}"))?;
            Ok(())
        }
        Command::Cp { src, dst } => guest.cp(src, dst),
        Command::Rm {
            path,
            recursive,
            dir,
        } => {
            let mut flags = RemoveFlags::empty();
            flags.set(RemoveFlags::RECURSIVE, *recursive);
            flags.set(RemoveFlags::REMOVE_DIR, *dir);
            guest
                .run(Request::Remove {
                    at: FileHandle::NIL,
                    path: path.as_bytes(),
                    flags,
                })
                .with_context(|| format!("rm {path}"))?;
            Ok(())
        }
    }
}

struct Guest {
    cageid: u64,
}

impl Guest {
    fn run(&self, req: Request<'_>) -> Result<CompletionResult, IoError> {
        let Completion { error, result } = guest_io_request(self.cageid, req);
        match error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    /// Open `path` and run `f` on the handle. The handle is closed whether `f` succeeds or not.
    fn with_open<T>(
        &self,
        path: &str,
        rights: FileAccess,
        flags: FileOpenFlags,
        f: impl FnOnce(FileHandle) -> Result<T>,
    ) -> Result<T> {
        let cmp = guest_io_request(
            self.cageid,
            Request::OpenAt {
                at: FileHandle::NIL,
                path: path.as_bytes(),
                rights,
                flags,
            },
        );
        let handle = cmp.handle();
        let res = match cmp.error {
            Some(e) => Err(e).with_context(|| format!("can't open {path}")),
            None => f(handle),
        };
        if !handle.is_nil() {
            let _ = self.run(Request::Close { handle });
        }
        res
    }

    fn cat(&self, path: &str) -> Result<()> {
        self.with_open(path, FileAccess::READ, FileOpenFlags::empty(), |handle| {
            let mut stdout = std::io::stdout().lock();
            let mut buf = vec![0u8; CHUNK];
            loop {
                let n = match self.run(Request::Read {
                    handle,
                    buffer: &mut buf,
                })? {
                    CompletionResult::Size(n) => n as usize,
                    other => bail!("unexpected read result {other:?}"),
                };
                if n == 0 {
                    break;
                }
                stdout.write_all(&buf[..n])?;
            }
            stdout.flush()?;
            Ok(())
        })
    }

    fn write(&self, path: &str, append: bool, input: &mut impl Read) -> Result<()> {
        let mut flags = FileOpenFlags::CREATE;
        flags |= if append {
            FileOpenFlags::APPEND
        } else {
            FileOpenFlags::TRUNCATE
        };
        self.with_open(path, FileAccess::WRITE, flags, |handle| {
            let mut buf = vec![0u8; CHUNK];
            loop {
                let n = input.read(&mut buf).context("reading input")?;
                if n == 0 {
                    return Ok(());
                }
                let mut pending = &buf[..n];
                while !pending.is_empty() {
                    let written = match self.run(Request::Write {
                        handle,
                        buffer: pending,
                    })? {
                        CompletionResult::Size(w) => w as usize,
                        other => bail!("unexpected write result {other:?}"),
                    };
                    if written == 0 {
                        bail!("short write to {path}");
                    }
                    pending = &pending[written..];
                }
            }
        })
    }

    fn stat(&self, path: &str) -> Result<()> {
        let flags = FileOpenFlags::OPEN_SYMLINK_ITSELF;
        let status = self.with_open(path, FileAccess::READ, flags, |handle| {
            match self.run(Request::Stat { handle })? {
                CompletionResult::Status(status) => Ok(status),
                other => bail!("unexpected stat result {other:?}"),
            }
        })?;
        print_status(path, &status);
        Ok(())
    }

    /// A directory is copied into `dst`, which is created if missing.
    fn cp(&self, src: &str, dst: &str) -> Result<()> {
        self.with_open(src, FileAccess::READ, FileOpenFlags::empty(), |from| {
            let kind = match self.run(Request::Stat { handle: from })? {
                CompletionResult::Status(status) => status.kind,
                other => bail!("unexpected stat result {other:?}"),
            };
            let flags = if kind.is_dir() {
                self.run(Request::MakeDir {
                    at: FileHandle::NIL,
                    path: dst.as_bytes(),
                    flags: MakeDirFlags::IGNORE_EXISTING,
                })
                .with_context(|| format!("mkdir {dst}"))?;
                FileOpenFlags::empty()
            } else {
                FileOpenFlags::CREATE
            };
            self.with_open(dst, FileAccess::WRITE, flags, |to| {
                self.run(Request::Copy {
                    handle: from,
                    dst: to,
                })
                .with_context(|| format!("cp {src} {dst}"))?;
                Ok(())
            })
        })
    }

    fn ls(&self, path: &str) -> Result<()> {
        let entries = self.with_open(path, FileAccess::READ, FileOpenFlags::empty(), |handle| {
            match self.run(Request::ListDir { handle })? {
                CompletionResult::Entries(entries) => Ok(entries),
                other => bail!("unexpected listing {other:?}"),
            }
        })?;
        for entry in entries {
            let name = String::from_utf8_lossy(&entry.name);
            match entry.kind {
                FileType::Directory => println!("{name}/"),
                FileType::Symlink => println!("{name}@"),
                _ => println!("{name}"),
            }
        }
        Ok(())
    }
}

fn print_status(path: &str, status: &FileStatus) {
    println!("  File: {path}");
    println!("  Type: {:?}", status.kind);
    println!("  Size: {}", status.size);
    println!("  Mode: {:04o}", status.perm.bits());
    println!("Device: {}  Inode: {}", status.id.dev, status.id.ino);
    println!("Modify: {}", status.modification.seconds - NTP_JAN_1970);
}
