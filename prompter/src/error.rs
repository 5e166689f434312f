//! Error types for prompter.

use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Boxed error returned by user-supplied reply functions and actions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for prompter operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Stream read/write and decoding errors
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Matcher configuration errors
    #[error("Match error: {0}")]
    Match(#[from] MatchError),

    /// Errors raised by reply functions or actions
    #[error("Callback error: {0}")]
    Callback(#[from] CallbackError),

    /// Shared buffer errors
    #[error("Buffer error: {0}")]
    Buffer(#[from] BufferError),

    /// Worker lifecycle errors
    #[error("Watcher error: {0}")]
    Watcher(#[from] WatcherError),
}

/// Errors on the watched output stream or the process input stream.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Reading process output failed
    #[error("Read failed: {0}")]
    Read(#[source] io::Error),

    /// Writing a reply to process input failed
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),

    /// Output bytes are not valid for the configured encoding
    #[error("Malformed {encoding} input after {valid_up_to} valid bytes")]
    Malformed {
        encoding: &'static str,
        valid_up_to: usize,
    },

    /// A reply contains a character the configured encoding cannot represent
    #[error("Character {ch:?} cannot be encoded as {encoding}")]
    Unencodable { encoding: &'static str, ch: char },

    /// The requested process stream was already taken or never piped
    #[error("Process {stream} is not available")]
    Unavailable { stream: &'static str },
}

/// Matcher set configuration errors.
#[derive(Error, Debug)]
pub enum MatchError {
    /// More than one unordered matcher accepted the same token
    #[error("Token {token:?} matched by more than one prompt ({matches})")]
    Ambiguous { token: String, matches: usize },

    /// Invalid regex pattern for a prompt or delimiter
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Failures raised by caller-provided code.
#[derive(Error, Debug)]
pub enum CallbackError {
    /// A dynamic reply function failed
    #[error("Reply function failed: {0}")]
    Reply(#[source] BoxError),

    /// An inline trigger action failed
    #[error("Action failed: {0}")]
    Action(#[source] BoxError),
}

/// Shared buffer errors.
#[derive(Error, Debug)]
pub enum BufferError {
    /// The ring cannot grow enough to hold a write
    #[error("Maximum buffer size exceeded: need {needed} more bytes with length {length}")]
    CapacityExceeded { needed: usize, length: usize },

    /// The endpoint was already closed
    #[error("Buffer closed")]
    Closed,

    /// A thread panicked while holding the buffer lock
    #[error("Buffer lock poisoned")]
    Poisoned,
}

impl From<BufferError> for io::Error {
    fn from(err: BufferError) -> Self {
        let kind = match err {
            BufferError::CapacityExceeded { .. } => io::ErrorKind::OutOfMemory,
            BufferError::Closed => io::ErrorKind::BrokenPipe,
            BufferError::Poisoned => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

/// Errors about the worker task itself rather than the stream it watches.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// The worker was cancelled through its handle
    #[error("Watcher cancelled")]
    Cancelled,

    /// The worker panicked
    #[error("Watcher panicked: {0}")]
    Panicked(String),

    /// Waiting for the worker timed out
    #[error("Watcher did not finish within {0:?}")]
    Timeout(Duration),

    /// The worker's outcome was already delivered
    #[error("Watcher result already taken")]
    AlreadyJoined,

    /// A stream copier failed
    #[error("Copying process {stream} failed: {source}")]
    Copy {
        stream: &'static str,
        #[source]
        source: io::Error,
    },
}

impl From<JoinError> for WatcherError {
    fn from(err: JoinError) -> Self {
        if err.is_cancelled() {
            return WatcherError::Cancelled;
        }
        let payload = err.into_panic();
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic".to_string()
        };
        WatcherError::Panicked(message)
    }
}

/// Result type alias using prompter's Error.
pub type Result<T> = std::result::Result<T, Error>;
