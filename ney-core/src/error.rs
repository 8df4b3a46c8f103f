//! # Error Types
//!
//! Every failure the analysis pipeline can report. The variants map one-to-one onto
//! the conditions a caller has to tell apart: a bad upload, an unreadable recording,
//! a recording without a steady tone, and impossible frequencies.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Which part of the upload was missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingInputKind {
    /// The request carried no audio field at all.
    NoFile,
    /// The audio field was present but held zero bytes.
    EmptyFile,
}

impl fmt::Display for MissingInputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingInputKind::NoFile => write!(f, "no audio file was uploaded"),
            MissingInputKind::EmptyFile => write!(f, "the uploaded audio file is empty"),
        }
    }
}

/// Errors produced while turning a recording into a [`crate::PitchResult`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("missing input: {0}")]
    MissingInput(MissingInputKind),

    /// Both the direct decode and the transcoding fallback failed.
    #[error("could not read audio: {primary}; transcoding fallback failed: {fallback}")]
    Decode { primary: String, fallback: String },

    /// The decoded recording is longer than the configured limit.
    #[error("recording is {duration_secs:.1} s long, the limit is {max_secs:.1} s")]
    TooLong { duration_secs: f64, max_secs: f64 },

    #[error("only {found} reliable voiced frames found, at least {required} are needed")]
    InsufficientEvidence { found: usize, required: usize },

    #[error("invalid frequency: measured {measured} Hz, standard {standard} Hz")]
    InvalidFrequency { measured: f64, standard: f64 },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse classification used by front ends to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller can fix it (re-upload, re-record).
    UserInput,
    /// Decode or compute failure on our side.
    Internal,
}

impl AnalysisError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AnalysisError::MissingInput(_)
            | AnalysisError::TooLong { .. }
            | AnalysisError::InsufficientEvidence { .. }
            | AnalysisError::InvalidFrequency { .. } => ErrorKind::UserInput,
            AnalysisError::Decode { .. } | AnalysisError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from the external transcoder used as the decode fallback.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("`{program}` did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected configuration values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("unrecognised note name `{0}`")]
    InvalidNote(String),

    #[error("pitch range is empty: fmin {fmin:.2} Hz must be below fmax {fmax:.2} Hz")]
    EmptyRange { fmin: f64, fmax: f64 },

    #[error("invalid framing: {0}")]
    Framing(String),

    #[error("invalid value for `{field}`: {reason}")]
    Value { field: &'static str, reason: String },
}
