use std::io;
use std::time::Duration;

use thiserror::Error;

/// Run-level errors. Any of these means no vocabulary was produced.
#[derive(Debug, Error)]
pub enum VocabError {
    /// The file cannot be split into the requested number of non-empty ranges.
    #[error("cannot split {file_size} bytes into {parts} parts")]
    InvalidArgument { file_size: i64, parts: i64 },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The completion barrier was not satisfied in time.
    #[error("timed out after {waited:?} with {pending} chunk(s) still running")]
    Timeout { waited: Duration, pending: usize },

    /// Every worker hung up but some never handed off a report.
    #[error("{pending} worker(s) exited without reporting")]
    WorkerLost { pending: usize },

    #[error("could not build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl VocabError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Errors raised while pulling tokens out of a byte stream.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A run of non-whitespace bytes exceeded the token cap. The whole run
    /// has been skipped and scanning can continue.
    #[error("token of {len} bytes exceeds the {max} byte limit")]
    TokenTooLong { len: usize, max: usize },

    /// The underlying reader failed. The token stream ends after this.
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    /// The run was cancelled before the next read. The token stream ends after this.
    #[error("scan cancelled")]
    Cancelled,
}
