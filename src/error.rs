//! The filesystem's error taxonomy.
//!
//! Every fallible core operation (disk I/O, allocation, path parsing,
//! directory/file lookup and mutation) returns `Result<T, FsError>`. The
//! facade layer (`fuse_fs`) is the only place `FsError` is translated into a
//! raw `libc` errno for `fuser`'s `Reply*::error()` calls.

use thiserror::Error;

/// Filesystem error codes, mirroring the on-disk/operation taxonomy.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("path names a directory, not a file")]
    IsDirectory,
    #[error("name or extension too long")]
    NameTooLong,
    #[error("already exists")]
    Exists,
    #[error("no space left on device")]
    NoSpace,
    #[error("operation not permitted")]
    PermissionDenied,
    #[error("file too large")]
    FileTooLarge,
    #[error("disk I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl FsError {
    /// Maps this error to the `libc` errno `fuser`'s `Reply*::error()` expects.
    pub fn as_errno(&self) -> i32 {
        match self {
            FsError::NotFound => libc::ENOENT,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::Exists => libc::EEXIST,
            FsError::NoSpace => libc::ENOSPC,
            FsError::PermissionDenied => libc::EPERM,
            FsError::FileTooLarge => libc::EFBIG,
            FsError::IoError(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
