//! Error types for personality-mcp.

use thiserror::Error;

use crate::protocol::error_codes;

/// Result type for personality-mcp operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for personality-mcp.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing tool argument.
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// Personality id or alias not recognized.
    #[error("unknown personality: {0}")]
    UnknownPersonality(String),

    /// JSON-RPC method not recognized.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// Tool name not recognized.
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    /// Resource URI not recognized.
    #[error("unknown resource: {0}")]
    UnknownResource(String),

    /// Response generation failed for one personality.
    #[error("generation failed: {0}")]
    Generation(String),

    /// Response generation did not finish in time.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// JSON-RPC error code reported to the peer.
    pub fn code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::UnknownPersonality(_) => error_codes::INVALID_PARAMS,
            Error::UnknownMethod(_) | Error::UnknownTool(_) => error_codes::METHOD_NOT_FOUND,
            Error::UnknownResource(_) => error_codes::RESOURCE_NOT_FOUND,
            Error::Generation(_)
            | Error::Timeout(_)
            | Error::Serialization(_)
            | Error::Io(_) => error_codes::INTERNAL_ERROR,
        }
    }

    /// Whether this error is recovered inside an operation instead of failing it.
    pub fn is_generation_failure(&self) -> bool {
        matches!(self, Error::Generation(_) | Error::Timeout(_))
    }
}
