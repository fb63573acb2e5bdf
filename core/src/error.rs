//! Error taxonomy for the bridge.
//!
//! Errors are split by the policy the dispatcher applies to them:
//!
//! - [`DecodeError`]: the caller sent a malformed command. Contract violations
//!   are surfaced to the caller.
//! - [`EngineError`]: the monitoring engine failed a call. Logged and swallowed
//!   for everything except the start-up commands.
//! - [`BridgeError`]: what actually crosses the dispatcher boundary.

use thiserror::Error;

/// Failure to turn a [`MethodCall`](crate::call::MethodCall) into a
/// [`Command`](crate::command::Command).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The method name is not part of the command surface.
    ///
    /// The dispatcher answers these with `Reply::NotImplemented` instead of
    /// treating them as a contract violation.
    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    /// A required argument is missing, null, or has the wrong type.
    #[error("Invalid arguments for {method}: {source}")]
    InvalidArguments {
        /// Method whose arguments failed to decode
        method: String,
        /// Underlying deserialization error (names the offending field)
        #[source]
        source: serde_json::Error,
    },

    /// `endPoint` is empty or not an upload URL.
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint {
        /// The endpoint exactly as the caller sent it
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },
}

impl DecodeError {
    /// Whether this error means "not part of the command surface" rather
    /// than "malformed command".
    #[must_use]
    pub const fn is_unknown_method(&self) -> bool {
        matches!(self, Self::UnknownMethod(_))
    }
}

/// Failure reported by a [`MonitoringEngine`](crate::engine::MonitoringEngine).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The engine refused the operation (bad input, wrong state).
    #[error("Engine rejected {operation}: {reason}")]
    Rejected {
        /// Engine operation that failed
        operation: &'static str,
        /// Engine-provided reason
        reason: String,
    },

    /// The engine could not be reached or is not running.
    #[error("Engine unavailable: {0}")]
    Unavailable(String),
}

impl EngineError {
    /// Shorthand for [`EngineError::Rejected`].
    #[must_use]
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Errors that cross the dispatcher boundary back to the caller.
///
/// Everything else (sequencing no-ops, engine failures on lifecycle and record
/// commands) terminates inside the dispatcher.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The caller sent a command with missing or malformed fields.
    #[error("Contract violation: {0}")]
    ContractViolation(#[from] DecodeError),

    /// The engine failed while starting monitoring or enabling error reporting.
    #[error("{command} failed: {source}")]
    StartupFailed {
        /// Command that was being executed
        command: &'static str,
        /// Engine failure
        #[source]
        source: EngineError,
    },

    /// `crashNative` was invoked.
    #[error("This is a deliberate native crash")]
    CrashRequested,
}

impl BridgeError {
    /// Whether this is the deliberate fault injected by `crashNative`.
    #[must_use]
    pub const fn is_crash(&self) -> bool {
        matches!(self, Self::CrashRequested)
    }
}
