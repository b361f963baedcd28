//! Error types produced by probes, notifiers and registry construction.

use std::{error::Error as StdError, io, time::Duration};

use thiserror::Error;

type BoxError = Box<dyn StdError + Send + Sync>;

/// A single presence check could not be completed.
///
/// The error is authoritative: whatever presence value the probe may have
/// observed before failing is discarded.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("could not resolve target '{target}': {source}")]
    Resolve {
        target: String,
        #[source]
        source: io::Error,
    },
    #[error("{0:#}")]
    Io(#[from] io::Error),
    #[error("probe panicked: {0}")]
    Panicked(String),
    #[error("{0}")]
    Other(BoxError),
}

impl ProbeError {
    /// Wrap any error raised by a concrete probe implementation
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }
}

/// A single notification could not be delivered.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),
    #[error("notification rejected with status {status}")]
    Rejected { status: u16 },
    #[error("notifier panicked: {0}")]
    Panicked(String),
    #[error("notification transport failed: {0}")]
    Transport(BoxError),
}

impl NotifyError {
    pub fn transport(err: impl Into<BoxError>) -> Self {
        Self::Transport(err.into())
    }
}

/// The probe set could not be assembled.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("probe name cannot be empty")]
    EmptyName,
    #[error("probe '{0}' is defined more than once")]
    DuplicateName(String),
}
