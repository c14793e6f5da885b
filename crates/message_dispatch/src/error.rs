//! Error types for handlers, sessions, and registration.
//!
//! None of these ever escape `MessageDispatcher::handle` or
//! `MessageDispatcher::load`; they end up in log output.

use std::time::Duration;

/// Failure raised by a single handler invocation.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("expected payload {expected} but received {actual}")]
    PayloadMismatch {
        expected: &'static str,
        actual: &'static str,
    },
    #[error("Handler execution error: {0}")]
    Execution(String),
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
    #[error("Handler panicked: {0}")]
    Panicked(String),
    #[error("Handler timed out after {0:?}")]
    TimedOut(Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A handler factory could not produce an instance.
#[derive(Debug, thiserror::Error)]
pub enum InstantiateError {
    #[error("failed to instantiate {handler}: {reason}")]
    Failed { handler: String, reason: String },
}

impl InstantiateError {
    pub fn failed(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            handler: handler.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("opcode 0 is reserved")]
    ReservedOpcode,
    #[error("opcode {opcode} is already bound to {existing}")]
    DuplicateOpcode { opcode: u16, existing: &'static str },
    #[error("message type {message_type} is already bound to opcode {existing}")]
    DuplicateType {
        message_type: &'static str,
        existing: u16,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session is closed")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
}
