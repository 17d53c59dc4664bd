//! Error types for the mount driver
//!
//! One enum covers the whole driver surface. Connect failures leave the
//! driver disconnected; mid-operation failures (timeout, malformed
//! response) are surfaced to the immediate caller and do not tear the
//! link down. Repeated failures are the caller's cue to disconnect and
//! start over.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum MountError {
    /// Connect failed: host/port unreachable, serial port busy or denied.
    #[error("link unavailable: {target} - {reason}")]
    LinkUnavailable { target: String, reason: String },

    /// Operation attempted without an open link.
    #[error("not connected")]
    NotConnected,

    /// No response terminator arrived within the deadline.
    #[error("command {command:?} timed out after {timeout_ms}ms")]
    CommandTimeout { command: String, timeout_ms: u64 },

    /// The transport reported EOF or a closed handle mid-exchange.
    #[error("link closed by peer")]
    LinkClosed,

    /// A terminated reply arrived but could not be parsed as expected.
    #[error("malformed response to {command:?}: {response:?}")]
    MalformedResponse { command: String, response: String },

    /// The device understood the command and refused it.
    #[error("device rejected {command:?}: {detail}")]
    DeviceRejected { command: String, detail: String },

    /// Caller-supplied value outside physical or configured limits.
    #[error("{param} = {value} out of range ({min} to {max})")]
    OutOfRange {
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Transport-level I/O failure other than EOF.
    #[error("I/O error: {0}")]
    Io(String),
}

impl MountError {
    pub fn timeout(command: impl Into<String>, timeout_ms: u64) -> Self {
        MountError::CommandTimeout {
            command: command.into(),
            timeout_ms,
        }
    }

    pub fn malformed(command: impl Into<String>, response: impl Into<String>) -> Self {
        MountError::MalformedResponse {
            command: command.into(),
            response: response.into(),
        }
    }

    pub fn rejected(command: impl Into<String>, detail: impl Into<String>) -> Self {
        MountError::DeviceRejected {
            command: command.into(),
            detail: detail.into(),
        }
    }

    /// True for failures where the response may still arrive late and the
    /// channel should drain stale bytes before the next exchange.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MountError::CommandTimeout { .. })
    }
}

impl From<std::io::Error> for MountError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::BrokenPipe => MountError::LinkClosed,
            _ => MountError::Io(err.to_string()),
        }
    }
}
