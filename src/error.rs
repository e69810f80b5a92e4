//! # Error Types
//!
//! Error handling for the login service.
//!
//! This module defines every error variant that can occur while decoding packets,
//! validating login requests, assigning player ids, and moving bytes over a connection.
//!
//! ## Error Categories
//! - **Codec Errors**: Missing prefix/terminator, unpaired keys, oversized frames
//! - **Binding Errors**: Non-numeric values for numeric fields
//! - **Validation Errors**: A login field violating its rule
//! - **Registry Errors**: Collision space exhausted, poisoned lock
//! - **Transport Errors**: I/O failures, timeouts, peer closing the connection
//!
//! Codec, binding and validation errors are answered with an error packet.
//! Transport errors only ever terminate the connection they happened on.
//!
//! ## Example Usage
//! ```rust
//! use gamespy_login::core::packet::Packet;
//! use gamespy_login::error::ProtocolError;
//!
//! match Packet::from_bytes(b"\\key\\value") {
//!     Err(ProtocolError::MalformedFraming) => {}
//!     other => panic!("unexpected result: {other:?}"),
//! }
//! ```

use std::fmt;
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Registry errors
    pub const ERR_REGISTRY_LOCK: &str = "Failed to acquire player registry lock";

    /// Connection errors
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
    pub const ERR_TIMEOUT: &str = "Operation timed out";

    /// Login reply errors
    pub const ERR_LOGIN_REJECTED: &str = "Login rejected by server";
    pub const ERR_PROOF_MISMATCH: &str = "Server proof does not match the expected value";
}

/// The rule a login field failed to satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationRule {
    /// The key must be present in the packet
    Required,
    /// The value must be empty
    Empty,
    /// The value must have exactly this many characters
    Length(usize),
    /// The value must not be empty
    NonEmpty,
    /// The value must consist of ASCII digits only
    Numeric,
    /// The value must be a 32 character lower-case hex digest
    Md5,
}

impl fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationRule::Required => write!(f, "required"),
            ValidationRule::Empty => write!(f, "must be empty"),
            ValidationRule::Length(len) => write!(f, "must be exactly {len} characters"),
            ValidationRule::NonEmpty => write!(f, "must not be empty"),
            ValidationRule::Numeric => write!(f, "must be numeric"),
            ValidationRule::Md5 => write!(f, "must be an md5 hex digest"),
        }
    }
}

// ProtocolError is the primary error type for all operations
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Packet is malformed: missing \\ prefix or \\final\\ terminator")]
    MalformedFraming,

    #[error("Packet contains key without corresponding value")]
    OddElementCount,

    #[error("Packet too large: {0} bytes")]
    OversizedPacket(usize),

    #[error("Field '{field}' cannot be parsed as an integer: '{value}'")]
    FieldType { field: String, value: String },

    #[error("Validation for '{field}' failed: {rule}")]
    Validation {
        field: &'static str,
        rule: ValidationRule,
    },

    #[error("No free player id left in the collision range")]
    RegistryExhausted,

    #[error("Invalid handshake transition from {from} to {to}")]
    InvalidStateTransition {
        from: &'static str,
        to: &'static str,
    },

    #[error("Password decode error: {0}")]
    PasswordDecode(String),

    #[error("{}", constants::ERR_CONNECTION_CLOSED)]
    ConnectionClosed,

    #[error("{}", constants::ERR_TIMEOUT)]
    Timeout,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Custom error: {0}")]
    Custom(String),
}

impl ProtocolError {
    /// Whether the error belongs to the packet/login layer and must be answered
    /// with an error packet instead of dropping the connection.
    pub fn is_login_failure(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedFraming
                | ProtocolError::OddElementCount
                | ProtocolError::OversizedPacket(_)
                | ProtocolError::FieldType { .. }
                | ProtocolError::Validation { .. }
        )
    }

    /// Timeouts, EOF and resets are routine on a public login port.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ProtocolError::Timeout | ProtocolError::ConnectionClosed => true,
            ProtocolError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field_and_rule() {
        let err = ProtocolError::Validation {
            field: "challenge",
            rule: ValidationRule::Length(32),
        };
        assert_eq!(
            err.to_string(),
            "Validation for 'challenge' failed: must be exactly 32 characters"
        );
        assert!(err.is_login_failure());
        assert!(!err.is_disconnect());
    }

    #[test]
    fn test_disconnect_classification() {
        assert!(ProtocolError::Timeout.is_disconnect());
        assert!(ProtocolError::ConnectionClosed.is_disconnect());
        assert!(ProtocolError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_disconnect());
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(!ProtocolError::Io(denied).is_disconnect());
        assert!(!ProtocolError::RegistryExhausted.is_login_failure());
    }
}
