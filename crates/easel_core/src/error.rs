//! Error types for the context proxy and its call channel

use std::time::Duration;
use thiserror::Error;

/// Failures reported by a [`RemoteCallChannel`](crate::RemoteCallChannel).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The transport could not deliver the call
    #[error("Transport failure: {0}")]
    Transport(String),

    /// The remote side received the call and rejected it
    #[error("Remote call failed: {0}")]
    Remote(String),

    /// No answer arrived within the configured call timeout
    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    /// The channel has been shut down
    #[error("Channel closed")]
    Closed,
}

/// Errors surfaced by [`BatchedContextProxy`](crate::BatchedContextProxy) operations.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// The proxy was disposed before or during this operation
    #[error("Context proxy already disposed")]
    AlreadyDisposed,

    /// The one-time `add` call failed. A later operation will attempt registration again.
    #[error("Registration of {context} context failed: {source}")]
    RegistrationFailed {
        context: String,
        #[source]
        source: ChannelError,
    },

    /// A batched transmission failed.
    ///
    /// Only the caller whose enqueue or batch end triggered the flush sees this error.
    /// Calls from other callers that were coalesced into the same batch are lost without
    /// a distinct error of their own.
    #[error("Batched transmission of {calls} call(s) failed: {source}")]
    FlushFailed {
        calls: usize,
        #[source]
        source: ChannelError,
    },

    /// A request/response call failed
    #[error("Read-back `{operation}` failed: {source}")]
    ReadBackFailed {
        operation: String,
        #[source]
        source: ChannelError,
    },

    /// An argument could not be converted to its wire value
    #[error("Failed to encode arguments of `{operation}`: {source}")]
    Encode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },

    /// A read-back answered with a value of the wrong shape
    #[error("Failed to decode result of `{operation}`: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result type for proxy operations
pub type Result<T> = std::result::Result<T, ProxyError>;

/// Configuration loading errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration TOML
    #[error("Invalid proxy configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
