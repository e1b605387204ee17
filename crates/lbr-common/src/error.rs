//! Error types for LBRoute

use thiserror::Error;

/// LBRoute error type
#[derive(Error, Debug)]
pub enum RoutingError {
    /// Topology provider cannot produce a traversable graph
    #[error("unsupported topology representation: {0}")]
    UnsupportedTopologyRepresentation(String),

    /// Frame could not be parsed into flow-defining fields
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// Identifier text could not be parsed
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Intent service rejected or failed a request
    #[error("intent service error: {0}")]
    IntentService(String),

    /// Engine is stopping or stopped
    #[error("engine stopped")]
    EngineStopped,

    /// No async runtime to run on
    #[error("runtime error: {0}")]
    Runtime(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    ConfigError(String),
}

/// Result type for LBRoute
pub type RoutingResult<T> = Result<T, RoutingError>;
