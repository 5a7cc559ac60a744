use thiserror::Error;
use std::collections::TryReserveError;

use crate::output::Stats;

/// Broad classification of a failure, stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Io,
    Format,
    Input,
    OutOfMemory,
    Param,
    Config,
}

#[derive(Error, Debug)]
pub enum DeltaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed header, unknown magic, truncated record or bad command tag.
    #[error("Format error: {0}")]
    Format(String),

    /// Out-of-range basis access or input ending in the middle of a command.
    #[error("Input error: {0}")]
    Input(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Invalid parameter: {0}")]
    Param(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl DeltaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeltaError::Io(_) => ErrorKind::Io,
            DeltaError::Format(_) => ErrorKind::Format,
            DeltaError::Input(_) => ErrorKind::Input,
            DeltaError::OutOfMemory(_) => ErrorKind::OutOfMemory,
            DeltaError::Param(_) => ErrorKind::Param,
            DeltaError::Config(_) => ErrorKind::Config,
        }
    }
}

impl From<toml::de::Error> for DeltaError {
    fn from(err: toml::de::Error) -> Self {
        DeltaError::Config(err.to_string())
    }
}

impl From<TryReserveError> for DeltaError {
    fn from(err: TryReserveError) -> Self {
        DeltaError::OutOfMemory(err.to_string())
    }
}

/// A job that stopped with an error, together with what it managed to do.
///
/// Output already handed to the sink is not rolled back.
#[derive(Error, Debug)]
#[error("{error} (after {} bytes in, {} bytes out)", .stats.in_bytes, .stats.out_bytes)]
pub struct JobFailure {
    #[source]
    pub error: DeltaError,
    pub stats: Stats,
}

impl JobFailure {
    pub fn new(error: DeltaError, stats: Stats) -> Self {
        Self { error, stats }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

impl From<JobFailure> for DeltaError {
    fn from(failure: JobFailure) -> Self {
        failure.error
    }
}

pub type Result<T> = std::result::Result<T, DeltaError>;

pub type JobResult<T> = std::result::Result<T, JobFailure>;
