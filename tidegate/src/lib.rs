//! # Tidegate
//!
//! Client-side coordinator for a named-resource remote access protocol.
//!
//! This crate provides:
//! - **Context**: owns a transport provider and a deduplicated registry of
//!   channels by resource name
//! - **Channel**: a stateful handle to one named remote resource, with a
//!   transport-driven connection-state machine
//! - **Operation**: an asynchronous get exchange with restart / suspend /
//!   cancel lifecycle hooks
//! - **Provider seam**: object-safe traits a transport implements, plus a
//!   process-wide provider registry
//!
//! The transport owns all worker threads and pushes connection-state,
//! connect-phase, and completion notifications through notifier handles;
//! the coordinator spawns no threads of its own. A single re-entrant
//! serialization lock per context guards every registry mutation and
//! every user-callback invocation; blocking transport calls always run
//! with it released.
//!
//! # Example
//!
//! ```ignore
//! use tidegate::{Context, Request};
//!
//! let ctxt = Context::new("pva")?;
//! let channel = ctxt.channel("DEV:TEMP:1")?;
//! let op = channel.get(
//!     |result| match result {
//!         Ok(value) => println!("value: {value:?}"),
//!         Err(error) => println!("failed: {error}"),
//!     },
//!     None,
//! )?;
//! // the callback fires once the channel connects and the exchange
//! // completes; drop or cancel the handle to abandon it
//! ```

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

// =============================================================================
// Modules
// =============================================================================

/// Error types for the client coordinator.
pub mod error;

/// Structured value model and marshalling.
pub mod value;

/// Request descriptors and the request-options builder.
pub mod request;

/// Transport provider registry and transport-facing traits.
pub mod provider;

/// Context handles.
pub mod context;

/// Channel handles and the connection-state machine.
pub mod channel;

/// Operation handles and the get-exchange lifecycle.
pub mod operation;

mod core;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use channel::{Channel, ConnectionNotifier, ConnectionState};
pub use context::Context;
pub use error::{ClientError, ClientResult};
pub use operation::{GetNotifier, Operation};
pub use provider::{
    debug_level, provider_names, register_provider, unregister_provider, ChannelProvider,
    Connection, DebugLevel, GetExchange, ProviderFactory,
};
pub use request::{build_request, Request};
pub use value::Value;
