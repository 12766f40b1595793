//! CrawlHive error types

use thiserror::Error;

/// CrawlHive error type
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// No reply arrived within the request timeout. The outcome of the
    /// request is unknown; callers must not assume it was processed.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The transport exchange completed but the command was not recognized
    #[error("Unknown command \"{0}\"")]
    UnknownCommand(String),

    /// No agent record exists for this id
    #[error("Agent {0} not found")]
    AgentNotFound(u32),

    /// The agent has a record but no running process
    #[error("Agent {0} not running")]
    AgentNotRunning(u32),

    /// The agent has a process handle but the process has exited
    #[error("Agent {0} is not alive")]
    AgentNotAlive(u32),

    /// Command-specific argument parsing failure
    #[error("Malformed parameters: {0}")]
    MalformedParams(String),

    /// Socket or framing error not classified above
    #[error("Transport error: {0}")]
    Transport(String),

    /// An agent's startup hook failed; the runtime aborts before its main loop
    #[error("Initialization error: {0}")]
    Init(String),

    /// Store error
    #[error("Store error: {0}")]
    Store(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for CrawlHive operations
pub type Result<T> = std::result::Result<T, Error>;
