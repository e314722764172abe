//! WolfDFS Error Types

use thiserror::Error;

use crate::network::protocol::ErrorCode;

/// Result type alias for WolfDFS operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfDFS error types
#[derive(Error, Debug)]
pub enum Error {
    // Namespace errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsDirectory(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Chunk errors
    #[error("Chunk not found: {0}")]
    ChunkNotFound(String),

    // Persistence errors
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionTimeout(_) | Error::ConnectionFailed { .. } | Error::Network(_)
        )
    }

    /// Wire code used when this error crosses an RPC boundary
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::AlreadyExists(_) => ErrorCode::AlreadyExists,
            Error::NotADirectory(_) => ErrorCode::NotADirectory,
            Error::IsDirectory(_) => ErrorCode::IsDirectory,
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::ChunkNotFound(_) => ErrorCode::ChunkNotFound,
            Error::Io(_) => ErrorCode::Io,
            Error::Network(_) | Error::ConnectionFailed { .. } | Error::ConnectionTimeout(_) => {
                ErrorCode::Unavailable
            }
            Error::ShuttingDown => ErrorCode::ShuttingDown,
            _ => ErrorCode::Internal,
        }
    }

    /// Rebuild an error received from a remote peer
    pub fn from_remote(code: ErrorCode, message: String) -> Self {
        match code {
            ErrorCode::NotFound => Error::NotFound(message),
            ErrorCode::AlreadyExists => Error::AlreadyExists(message),
            ErrorCode::NotADirectory => Error::NotADirectory(message),
            ErrorCode::IsDirectory => Error::IsDirectory(message),
            ErrorCode::InvalidArgument => Error::InvalidArgument(message),
            ErrorCode::ChunkNotFound => Error::ChunkNotFound(message),
            ErrorCode::Io => Error::Io(std::io::Error::new(std::io::ErrorKind::Other, message)),
            ErrorCode::Unavailable => Error::Network(message),
            ErrorCode::ShuttingDown => Error::ShuttingDown,
            ErrorCode::Internal => Error::Internal(message),
        }
    }

    /// Detail message without the variant prefix, for sending over the wire
    pub fn detail(&self) -> String {
        match self {
            Error::NotFound(m)
            | Error::AlreadyExists(m)
            | Error::NotADirectory(m)
            | Error::IsDirectory(m)
            | Error::InvalidArgument(m)
            | Error::ChunkNotFound(m)
            | Error::Network(m)
            | Error::Internal(m) => m.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_round_trip_keeps_variant() {
        let err = Error::AlreadyExists("file1".into());
        let rebuilt = Error::from_remote(err.code(), err.detail());
        assert!(matches!(rebuilt, Error::AlreadyExists(ref m) if m == "file1"));
    }

    #[test]
    fn test_retryable() {
        assert!(Error::ConnectionTimeout("dn1:7700".into()).is_retryable());
        assert!(!Error::NotFound("x".into()).is_retryable());
    }
}
