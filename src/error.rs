//! Central error handling for the photon map.
//!
//! Provides a unified PhotonMapError enum with consistent categorization.
//! Precondition violations (querying before balancing, storing afterwards)
//! are programmer errors and assert instead of surfacing here.

/// Centralized error type for all photon map operations
#[derive(thiserror::Error, Debug)]
pub enum PhotonMapError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt photon map data: {0}")]
    Corrupt(String),
}

impl PhotonMapError {
    /// Convenience constructor for malformed serialized data
    pub fn corrupt<T: ToString>(msg: T) -> Self {
        PhotonMapError::Corrupt(msg.to_string())
    }
}

/// Result type alias for photon map operations
pub type Result<T> = std::result::Result<T, PhotonMapError>;
