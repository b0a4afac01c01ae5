//! Error types for every fallible boundary in the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::SessionState;

/// Errors emitted by the session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("please provide a response before moving to the next question")]
    EmptyResponse,
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },
    #[error("please enter both Name and User ID")]
    MissingIdentity,
}

/// Errors emitted by a grammar checker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GrammarError {
    #[error("grammar service request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("grammar service returned status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("grammar service returned a malformed response: {0}")]
    Malformed(String),
}

/// Terminal outcomes of a single speech capture attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("no speech detected before the listen timeout")]
    SilenceTimeout,
    #[error("unable to understand the speech")]
    Unintelligible,
    #[error("speech service error: {0}")]
    Service(String),
}

/// Errors surfaced by the input layer when asked for a response.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("no response provided")]
    NoResponse,
    #[error("a speech capture is still in progress")]
    CapturePending,
}

/// Errors emitted while writing a report artifact.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("session is not complete yet")]
    Incomplete,
    #[error("failed to write report to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write csv report to {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ExportError {
    /// The path the exporter attempted to write, when one was chosen.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ExportError::Incomplete => None,
            ExportError::Io { path, .. } | ExportError::Csv { path, .. } => Some(path),
        }
    }
}

/// A config file that exists but cannot be used.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("config {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors emitted while loading the question bank.
#[derive(Debug, Error)]
pub enum QuestionBankError {
    #[error("no questions exist for part {0}")]
    UnknownPart(u8),
    #[error("question table for part {part} is malformed: {source}")]
    Malformed {
        part: u8,
        #[source]
        source: serde_json::Error,
    },
}
