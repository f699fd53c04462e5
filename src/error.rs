//! Error Taxonomy
//!
//! Every fallible operation in the crate returns [`Result`]. Errors are
//! `Clone` so a single connection failure can be fanned out to every command
//! queued on a transaction or batch.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// A key object was used before being attached to a container.
    #[error("key '{key}' is not attached to a container")]
    NotAttached { key: String },

    /// No codec rule applies, or the stored bytes do not decode to the
    /// requested type.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rejected before any network call.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The store is unreachable or the connection failed mid-command.
    #[error("connection error: {0}")]
    Connection(String),

    /// Error reply sent back by the store (e.g. WRONGTYPE).
    #[error("server error: {0}")]
    Server(String),

    /// Malformed RESP data or a reply of an unexpected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A queued command was never applied: its transaction aborted, or the
    /// transaction/batch was dropped before `execute`.
    #[error("command discarded before execution")]
    Discarded,

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn serialization(msg: impl std::fmt::Display) -> Self {
        Error::Serialization(msg.to_string())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// True for failures of the transport rather than of the command.
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
