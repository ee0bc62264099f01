//! Error kinds raised by the pipeline.
//!
//! Every per-subject failure is attributable: the cohort driver turns the
//! recoverable ones into [`crate::asymmetry::SkipNotice`]s and keeps going,
//! while [`Error::InvalidConfiguration`] aborts the whole run.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Non-positive sample rate, empty buffer, channel/row count mismatch,
    /// duplicate channel names.
    #[error("invalid recording: {0}")]
    InvalidRecording(String),

    /// Bad band bounds, zero segment length, too many ICA components, …
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// FastICA did not converge within its iteration cap, or the data could
    /// not be whitened.
    #[error("ICA decomposition failed: {0}")]
    DecompositionFailed(String),

    /// A required channel (e.g. `F3`) is not in the recording.
    #[error("channel '{0}' not found")]
    MissingChannel(String),

    /// The series is too short for the requested spectral estimate.
    #[error("insufficient samples: {0}")]
    InsufficientSamples(String),

    /// Band power is zero or negative, so its logarithm is undefined.
    #[error("non-positive band power: {0}")]
    NonPositivePower(String),

    #[error("malformed recording file: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// `true` for errors that skip one subject; `false` for errors that
    /// should stop a cohort run.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::InvalidConfiguration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
