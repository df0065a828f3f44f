//! Error types for fclink.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Result type for fclink operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for fclink operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (serial port, file operations).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serial port error.
    #[cfg(feature = "native")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Recoverable protocol error (bad checksum, truncated payload, ...).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unrecoverable receive failure. The session cannot continue.
    #[error("Fatal session error: {0}")]
    Fatal(String),

    /// An external tool could not be found, launched, or exited with failure.
    #[error("{tool}: {reason}")]
    Tool {
        /// Program name as invoked.
        tool: String,
        /// What went wrong.
        reason: String,
    },

    /// A DFU descriptor line is missing a required field.
    #[error("could not determine flash {field} from {line:?}")]
    Descriptor {
        /// Name of the field that could not be parsed.
        field: &'static str,
        /// The offending descriptor line.
        line: String,
    },

    /// Timed out waiting for something.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// No explicit target name and none detected from the board.
    #[error("empty target name")]
    EmptyTarget,

    /// The build output directory holds no binary for the target.
    #[error("could not find binary for target {target} in {}", dir.display())]
    BinaryNotFound {
        /// Target name that was searched for.
        target: String,
        /// Directory that was searched.
        dir: PathBuf,
    },
}

impl Error {
    pub(crate) fn tool(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            reason: reason.into(),
        }
    }
}
