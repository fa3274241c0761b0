//! Channel handles and the connection-state machine.
//!
//! A [`Channel`] is a stateful handle to one named remote resource. Its
//! connection state is driven exclusively by transport-pushed transitions
//! delivered through [`ConnectionNotifier`]; the coordinator never polls
//! "is it connected", which would race a concurrently delivered
//! disconnect.
//!
//! # Connection lifecycle
//!
//! ```text
//! ┌───────────────┐         ┌───────────┐
//! │NeverConnected ├────────►│ Connected │◄─────┐
//! └───────────────┘         └─────┬─────┘      │ reconnect:
//!                                 │            │ restart each op
//!                                 ▼            │
//!                          ┌──────────────┐    │
//!                          │ Disconnected ├────┘
//!                          └──────┬───────┘
//!                                 │
//!                                 ▼
//!                          ┌───────────┐
//!                          │ Destroyed │  terminal: cancel each op
//!                          └───────────┘
//! ```
//!
//! On every transition the state machine takes exclusive ownership of the
//! channel's operation set (swapping it for an empty one) before iterating
//! a private snapshot, so handlers that re-register themselves
//! mid-iteration cannot corrupt the set being iterated.

use std::sync::{Arc, Weak};

use crate::core::{ChannelId, Core, OpEntry, OpKind};
use crate::error::{ClientError, ClientResult};
use crate::operation::Operation;
use crate::provider::chatter_enabled;
use crate::request::{build_request, Request};
use crate::value::Value;

/// Connection state of a channel, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No connection has been established yet.
    NeverConnected,
    /// The connection is up; operations may run.
    Connected,
    /// The connection dropped; operations are suspended until reconnect.
    Disconnected,
    /// The connection is permanently gone. Terminal.
    Destroyed,
}

/// Transport-facing notifier for one channel.
///
/// Handed to [`crate::ChannelProvider::create_connection`]; the transport
/// calls it from its own threads. Holds only a weak core reference plus a
/// token, so the transport never keeps the coordinator alive.
#[derive(Clone)]
pub struct ConnectionNotifier {
    core: Weak<Core>,
    channel: ChannelId,
}

impl ConnectionNotifier {
    pub(crate) fn new(core: Weak<Core>, channel: ChannelId) -> Self {
        ConnectionNotifier { core, channel }
    }

    /// Creation status report. A failure here is unexpected from transports
    /// that instead signal through `state_changed`; it is logged only.
    pub fn created(&self, status: Result<(), String>) {
        if let Err(message) = status {
            tracing::warn!(%message, "unexpected channel creation status");
        }
    }

    /// Deliver a connection-state transition.
    ///
    /// Transitions on one channel are serialized by the core lock; the
    /// operation-lifecycle calls they trigger run before the next
    /// transition is processed.
    pub fn state_changed(&self, state: ConnectionState) {
        if let Some(core) = self.core.upgrade() {
            core.connection_state_changed(self.channel, state);
        }
    }
}

impl Core {
    pub(crate) fn connection_state_changed(self: &Arc<Self>, id: ChannelId, state: ConnectionState) {
        let snapshot: Vec<crate::core::OpId> = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            let Some(ch) = st.channels.get_mut(&id) else {
                return;
            };
            if ch.state == ConnectionState::Destroyed {
                // terminal; late notifications are ignored
                return;
            }
            ch.state = state;
            if chatter_enabled() {
                tracing::debug!(channel = %ch.name, ?state, ops = ch.ops.len(), "state change");
            }
            if state == ConnectionState::Destroyed {
                ch.conn = None;
            }
            // take ownership of the whole set; handlers re-insert themselves
            ch.ops.drain().collect()
        };
        match state {
            ConnectionState::NeverConnected => {}
            ConnectionState::Connected => {
                for op in snapshot {
                    if let Err(error) = self.restart_op(op) {
                        tracing::warn!(%error, "restart failed; operation dropped");
                    }
                }
            }
            ConnectionState::Disconnected => {
                for op in snapshot {
                    self.lost_conn_op(op);
                }
            }
            ConnectionState::Destroyed => {
                for op in snapshot {
                    self.cancel_op(op);
                }
            }
        }
    }
}

/// A handle to one named remote resource.
///
/// Cheap to clone; all clones obtained for the same name from the same
/// [`Context`](crate::Context) share one transport connection.
#[derive(Clone)]
pub struct Channel {
    core: Arc<Core>,
    id: ChannelId,
}

impl Channel {
    pub(crate) fn new(core: Arc<Core>, id: ChannelId) -> Self {
        Channel { core, id }
    }

    /// The bound resource name.
    ///
    /// # Errors
    ///
    /// [`ClientError::ChannelClosed`] once the channel has been destroyed
    /// or its owning context closed.
    pub fn name(&self) -> ClientResult<String> {
        let guard = self.core.lock();
        let st = guard.borrow();
        match st.channels.get(&self.id) {
            Some(ch) if ch.state != ConnectionState::Destroyed => Ok(ch.name.clone()),
            _ => Err(ClientError::ChannelClosed),
        }
    }

    /// Initiate a get operation.
    ///
    /// The callback is invoked exactly once per completed exchange, under
    /// the serialization lock, with either the result value or an error.
    /// If the channel is currently connected the exchange starts
    /// immediately; otherwise it waits for the next `Connected` transition
    /// and then proceeds automatically.
    ///
    /// # Errors
    ///
    /// Fails synchronously if the channel is closed, the request
    /// descriptor cannot be translated, or an immediate exchange creation
    /// is refused by the transport.
    pub fn get<F>(&self, callback: F, request: Option<Request>) -> ClientResult<Operation>
    where
        F: FnMut(Result<Value, ClientError>) + Send + 'static,
    {
        let options = build_request(request)?;
        let (op, connected) = {
            let guard = self.core.lock();
            let mut st = guard.borrow_mut();
            let op = st.alloc_op();
            let Some(ch) = st.channels.get_mut(&self.id) else {
                return Err(ClientError::ChannelClosed);
            };
            if ch.state == ConnectionState::Destroyed {
                return Err(ClientError::ChannelClosed);
            }
            if chatter_enabled() {
                tracing::debug!(channel = %ch.name, "get");
            }
            let connected = ch.state == ConnectionState::Connected;
            ch.ops.insert(op);
            st.ops.insert(
                op,
                OpEntry {
                    channel: Some(self.id),
                    callback: Some(Box::new(callback)),
                    callback_running: false,
                    options,
                    kind: OpKind::Get { exchange: None },
                },
            );
            (op, connected)
        };
        if connected {
            if let Err(error) = self.core.restart_op(op) {
                self.core.cancel_op(op);
                self.core.forget_op(op);
                return Err(error);
            }
        }
        Ok(Operation::new(self.core.clone(), op))
    }
}
