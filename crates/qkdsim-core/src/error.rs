//! Error taxonomy shared by every protocol stage and the command shell.
//!
//! Library calls return [`Result`] and propagate with `?`. The command shell
//! is the recovery boundary: every variant is rendered there as a single
//! `% <message>` diagnostic line and the session continues.
//!
//! A QBER above the security threshold is deliberately *not* an error. It is
//! reported through [`crate::simulator::AbortReason`] so callers can refuse to
//! use a key without the computation failing.

use thiserror::Error;

/// Result alias used throughout `qkdsim-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Two sequences that must run index-for-index have different lengths.
    #[error("length mismatch: {what} has {found} elements, expected {expected}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    /// Zero-length key material where a non-empty input is required.
    #[error("empty input: {0}")]
    EmptyInput(&'static str),

    /// Malformed command arguments or an out-of-range value.
    #[error("{0}")]
    InvalidCommandSyntax(String),

    /// The command exists but is not accepted in the current mode.
    #[error("'{command}' is not available in {mode} mode (valid in: {valid_in})")]
    InvalidModeTransition {
        command: String,
        mode: &'static str,
        valid_in: String,
    },

    /// `run` was requested before a sweep mode and parameter were declared.
    #[error("Sweep not configured. Set 'sweep mode' and at least one 'sweep parameter' first")]
    SweepNotConfigured,

    /// The measurement collaborator could not deliver bits.
    #[error("measurement source unavailable: {0}")]
    SourceUnavailable(String),

    /// A link endpoint that was never created.
    #[error("unknown node '{0}': both nodes must exist first")]
    UnknownNode(String),

    /// Input that matches no command in any mode.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A sweep worker thread panicked.
    #[error("sweep worker failed: {0}")]
    Worker(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidCommandSyntax`] with a formatted message.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::InvalidCommandSyntax(message.into())
    }
}

/// Fail with [`Error::LengthMismatch`] unless `found == expected`.
pub(crate) fn ensure_len(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if found == expected {
        Ok(())
    } else {
        Err(Error::LengthMismatch {
            what,
            expected,
            found,
        })
    }
}
