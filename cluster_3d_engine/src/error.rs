//! Error types for the Cluster3D engine
//!
//! This module defines the error types used throughout the engine,
//! including rendering, initialization, asset loading and configuration.

use std::fmt;

/// Result type for Cluster3D engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Cluster3D engine errors
#[derive(Debug, Clone)]
pub enum Error {
    /// Backend-specific error (Vulkan call failure, lost surface, etc.)
    BackendError(String),

    /// Out of GPU memory
    OutOfMemory,

    /// Invalid resource (texture, buffer, shader, frame slot, etc.)
    InvalidResource(String),

    /// Initialization failed (device, swapchain, required features)
    InitializationFailed(String),

    /// Malformed scene or image data
    AssetError(String),

    /// Configuration value out of range
    InvalidConfig(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BackendError(msg) => write!(f, "Backend error: {}", msg),
            Error::OutOfMemory => write!(f, "Out of GPU memory"),
            Error::InvalidResource(msg) => write!(f, "Invalid resource: {}", msg),
            Error::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            Error::AssetError(msg) => write!(f, "Asset error: {}", msg),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
