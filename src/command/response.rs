use std::fmt;

use crate::ids::ConnectionId;

/// Acknowledges the command whose `command_id` equals `correlation_id`.
///
/// On STOMP this is produced from a `RECEIPT` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    pub correlation_id: i32,
}

impl Response {
    pub fn new(correlation_id: i32) -> Self {
        Self { correlation_id }
    }
}

/// Error details reported by the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerError {
    /// Short description (the STOMP `message` header).
    pub message: String,
    /// Longer explanation (the `ERROR` frame body).
    pub details: Option<String>,
}

impl BrokerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(details) = &self.details {
            write!(f, ": {}", details)?;
        }
        Ok(())
    }
}

impl std::error::Error for BrokerError {}

/// A failed command: the broker answered with an error instead of a receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub correlation_id: i32,
    pub error: BrokerError,
}

impl ExceptionResponse {
    pub fn new(correlation_id: i32, error: BrokerError) -> Self {
        Self {
            correlation_id,
            error,
        }
    }
}

/// An error that is not tied to any pending command; the connection is
/// unusable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionError {
    pub connection_id: Option<ConnectionId>,
    pub error: BrokerError,
}

impl ConnectionError {
    pub fn new(connection_id: Option<ConnectionId>, error: BrokerError) -> Self {
        Self {
            connection_id,
            error,
        }
    }
}
