use std::io;
use std::path::PathBuf;

/// Failures that stop an extraction.
///
/// Entries rejected for safety reasons are not errors; they are reported as
/// [`Warning`](crate::Warning)s next to the outcome.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format: '{path}'")]
    UnsupportedFormat { path: PathBuf },

    #[error("failed to open archive '{path}': {source}")]
    Open { path: PathBuf, source: io::Error },

    #[cfg(feature = "zip")]
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed entry header: {source}")]
    Header { source: io::Error },

    #[error("malformed entry '{entry}': {reason}")]
    MalformedEntry { entry: PathBuf, reason: String },

    #[error("size limit exceeded at '{entry}': {would_be} bytes exceeds limit {limit}")]
    SizeLimitExceeded {
        entry: PathBuf,
        limit: u64,
        would_be: u64,
    },

    #[error("entry '{entry}' holds more than its declared {declared} bytes")]
    SizeMismatch { entry: PathBuf, declared: u64 },

    #[error("failed to prepare destination root '{path}': {source}")]
    Root { path: PathBuf, source: io::Error },

    #[error("failed to create directory: {path}: {source}")]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to create symlink '{link}' -> '{target}': {source}")]
    SymlinkCreationFailed {
        target: PathBuf,
        link: PathBuf,
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
