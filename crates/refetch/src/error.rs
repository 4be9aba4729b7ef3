//! Error types for refetch.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A header or transfer record could not be parsed.
    Format,
    /// The server answered with a status the current step cannot handle.
    Server,
    /// Local storage failed.
    Io,
    /// The transport failed before or while delivering a response.
    Network,
    /// The caller cancelled the download or its deadline passed.
    Cancelled,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("content-length not supported: {0:?}")]
    InvalidContentLength(String),

    #[error("malformed transfer record {}: {reason}", .path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error("[{status} {status_text}] {body}")]
    Server {
        status:      u16,
        status_text: String,
        body:        String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Fs(#[from] refetch_fs::Error),

    #[error("transfer record {} is already closed", .0.display())]
    RecordClosed(PathBuf),

    #[error("length mismatch: expected {expected} bytes, received {received}")]
    LengthMismatch { expected: u64, received: u64 },

    #[error("download cancelled")]
    Cancelled,

    #[error("download deadline exceeded")]
    DeadlineExceeded,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidContentLength(_) | Error::MalformedRecord { .. } => ErrorKind::Format,
            Error::Server { .. } => ErrorKind::Server,
            Error::Network(_) => ErrorKind::Network,
            Error::Io { .. } | Error::Fs(_) | Error::RecordClosed(_) | Error::LengthMismatch { .. } => {
                ErrorKind::Io
            }
            Error::Cancelled | Error::DeadlineExceeded => ErrorKind::Cancelled,
        }
    }

    /// Whether a later attempt has a reasonable chance of succeeding.
    ///
    /// Transport failures, short bodies, deadlines, 5xx, 408 and 429 qualify.
    /// Explicit cancellation, format errors and other 4xx do not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Network(_) | Error::DeadlineExceeded => true,
            Error::LengthMismatch { expected, received } => received < expected,
            Error::Server { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn io(path: &Path) -> impl FnOnce(io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
