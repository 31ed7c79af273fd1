//! Error types you might see while assembling or reading a build context

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors during build context assembly and access
#[derive(Error, Debug)]
pub enum ContextError {
    /// the object was used after being disposed
    #[error("{0} was used after being disposed")]
    Disposed(&'static str),

    /// a real path given to the archive does not exist
    #[error("path not found: {0:?}")]
    NotFound(PathBuf),

    /// a path given to add_file is not a regular file
    #[error("expected a regular file: {0:?}")]
    NotAFile(PathBuf),

    /// io error
    #[error("io error: {0}")]
    IOError(#[from] std::io::Error),

    /// a suspendable operation was cancelled
    #[error("operation cancelled")]
    Cancelled,

    /// a real file name can't be represented as an archive path
    #[error("file name is not valid utf-8: {0:?}")]
    NonUtf8Path(PathBuf),

    /// archive path is empty, contains a nul byte, or contains `..`
    #[error("invalid archive path: {0:?}")]
    InvalidArchivePath(String),

    /// a file got shorter while its contents were being archived
    #[error("file shrank while being archived: {path:?}, expected {expected} bytes, found {found}")]
    FileTruncated {
        path: PathBuf,
        expected: u64,
        found: u64,
    },
}

impl ContextError {
    /// Convert an io error from opening or listing `path`, keeping NotFound
    /// distinct from other io failures
    pub(crate) fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => ContextError::NotFound(path.to_path_buf()),
            _ => ContextError::IOError(err),
        }
    }

    /// Carry this error through an io::Read/AsyncRead boundary
    pub(crate) fn into_stream(self) -> std::io::Error {
        let kind = match &self {
            ContextError::FileTruncated { .. } => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, self)
    }

    /// Recover an error carried by [ContextError::into_stream()]; any other
    /// io error stays an IOError
    pub(crate) fn from_stream(err: std::io::Error) -> Self {
        if !err.get_ref().map_or(false, |inner| inner.is::<ContextError>()) {
            return ContextError::IOError(err);
        }
        let kind = err.kind();
        match err.into_inner().map(|inner| inner.downcast::<ContextError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => ContextError::IOError(std::io::Error::new(kind, other)),
            None => ContextError::IOError(kind.into()),
        }
    }
}
