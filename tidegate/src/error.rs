//! Error types for the client coordinator.

use thiserror::Error;

/// Errors that can occur while coordinating channels and operations.
///
/// Synchronous failures (configuration, closed resources, refused
/// connections) are returned from the call site. Remote completion
/// failures arrive asynchronously through the operation callback as
/// [`ClientError::Remote`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// No provider with this name is registered.
    #[error("no such provider: {name}")]
    UnknownProvider {
        /// The provider name that was looked up.
        name: String,
    },

    /// The context has been closed; no further channels can be created.
    #[error("context has been closed")]
    ContextClosed,

    /// The channel has been destroyed or its owning context closed.
    #[error("channel closed")]
    ChannelClosed,

    /// The transport refused to create a connection for this name.
    #[error("failed to create channel '{name}': {message}")]
    ChannelCreateFailed {
        /// The resource name the connection was requested for.
        name: String,
        /// Details reported by the transport.
        message: String,
    },

    /// The request descriptor could not be translated into options.
    #[error("bad request: {message}")]
    BadRequest {
        /// What was wrong with the descriptor.
        message: String,
    },

    /// The textual request mini-language is declared but not implemented.
    #[error("request expression parsing not implemented")]
    RequestExprUnsupported,

    /// The remote end completed the exchange with a non-success status.
    ///
    /// Delivered through the operation callback, never synchronously.
    #[error("remote error: {message}")]
    Remote {
        /// Message text reported by the transport.
        message: String,
    },

    /// A provider-internal failure with no more specific classification.
    #[error("transport error: {message}")]
    Transport {
        /// Details about the transport failure.
        message: String,
    },
}

/// Result type for coordinator operations.
pub type ClientResult<T> = Result<T, ClientError>;
