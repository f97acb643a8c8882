use thiserror::Error;

pub type FsResult<T> = Result<T, FsError>;

/// Errors a filesystem operation can report back to the FUSE host.
///
/// Every variant translates to exactly one errno; the host forwards that
/// code to the kernel unchanged.
#[derive(Error, Debug)]
pub enum FsError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("is a directory: {0}")]
    IsDirectory(String),

    #[error("not a directory: {0}")]
    NotDirectory(String),

    #[error("read-only: {0}")]
    ReadOnly(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("cannot move {0} across hierarchy levels")]
    KindMismatch(String),

    #[error("database operation failed: {0}")]
    Interrupted(String),

    #[error("not supported: {0}")]
    NotSupported(String),
}

impl FsError {
    /// Convert to a POSIX errno.
    pub fn to_errno(&self) -> i32 {
        match self {
            FsError::NotFound(_) => libc::ENOENT,
            FsError::InvalidPath(_) => libc::EINVAL,
            FsError::IsDirectory(_) => libc::EISDIR,
            FsError::NotDirectory(_) => libc::ENOTDIR,
            FsError::ReadOnly(_) => libc::EROFS,
            FsError::PermissionDenied(_) => libc::EACCES,
            FsError::KindMismatch(_) => libc::ENOSPC,
            FsError::Interrupted(_) => libc::EINTR,
            FsError::NotSupported(_) => libc::ENOSYS,
        }
    }
}
