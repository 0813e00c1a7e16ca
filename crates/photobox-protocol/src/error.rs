//! Protocol errors.

use thiserror::Error;

/// Errors raised while decoding client input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// The frame is JSON but not an object with an `action` string
    #[error("Missing action field")]
    MissingAction,

    /// The `action` names no known request
    #[error("Unsupported action: {0}")]
    UnknownAction(String),

    /// The action is known but its fields are wrong
    #[error("Invalid {action} request: {reason}")]
    InvalidRequest { action: String, reason: String },

    /// The print payload could not be decoded into image bytes
    #[error("Invalid image payload: {0}")]
    InvalidImage(String),
}
