//! Error kinds shared by every component, and their mapping to POSIX errno
//! values at the FUSE boundary (spec §7).

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("file exists")]
    Exists,
    #[error("not a directory")]
    NotADirectory,
    #[error("not a regular file")]
    NotARegularFile,
    #[error("no space left on device")]
    NoSpace,
    #[error("offset beyond end of file")]
    BadOffset,
    #[error("empty path")]
    EmptyPath,
    #[error("name too long")]
    NameTooLong,
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

pub type FsResult<T> = Result<T, FsError>;

impl FsError {
    /// Negative return code for the dispatcher boundary (spec §7), mapping
    /// `not-found` to the kernel "no such entry" code.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::Exists => libc::EEXIST,
            FsError::NotADirectory => libc::ENOTDIR,
            FsError::NotARegularFile => libc::EISDIR,
            FsError::NoSpace => libc::ENOSPC,
            FsError::BadOffset | FsError::EmptyPath => libc::EINVAL,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::Io(_) => libc::EIO,
        }
    }
}
