//! Operation handles and the get-exchange lifecycle.
//!
//! An operation is one asynchronous exchange bound to a channel. The
//! channel's state machine drives it through three lifecycle hooks:
//!
//! - restart: (re)create the transport exchange; only while `Connected`
//! - lost connection: abandon the in-flight exchange but stay registered,
//!   so the next `Connected` transition resumes it automatically
//! - cancel: permanent; the operation leaves its channel's set, releases
//!   its callback, and can never restart again
//!
//! Completion is delivered exactly once per exchange, under the
//! serialization lock. A callback that panics is logged and suppressed;
//! transport state is unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::core::{Core, OpId, OpKind};
use crate::error::{ClientError, ClientResult};
use crate::provider::{chatter_enabled, GetExchange};
use crate::value::Value;

/// Transport-facing notifier for one get exchange.
///
/// Handed to [`crate::Connection::create_get`]; the transport calls it
/// from its own threads, or synchronously nested inside `create_get` /
/// `start`.
#[derive(Clone)]
pub struct GetNotifier {
    core: Weak<Core>,
    op: OpId,
}

impl GetNotifier {
    pub(crate) fn new(core: Weak<Core>, op: OpId) -> Self {
        GetNotifier { core, op }
    }

    /// Connect-phase report for the exchange.
    ///
    /// On success the actual data request is issued against the now-ready
    /// exchange, which may deliver completion recursively. On failure the
    /// exchange is left stalled: no callback fires until a reconnect cycle
    /// restarts the operation or the user cancels it.
    pub fn connected(&self, status: Result<(), String>, exchange: &dyn GetExchange) {
        match status {
            Ok(()) => exchange.start(),
            Err(message) => {
                tracing::warn!(%message, "get exchange failed to connect; stalled until reconnect");
            }
        }
    }

    /// Completion report: the result value or the transport's error
    /// message. Ignored if the operation was cancelled or already
    /// completed for this exchange.
    pub fn complete(&self, result: Result<Value, String>) {
        if let Some(core) = self.core.upgrade() {
            core.complete_op(self.op, result);
        }
    }
}

impl Core {
    /// (Re)start an operation's exchange. Called only while the channel is
    /// connected. Re-inserts the operation into the channel's set.
    pub(crate) fn restart_op(self: &Arc<Self>, id: OpId) -> ClientResult<()> {
        let (conn, options, previous) = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            let state = &mut *st;
            let Some(op) = state.ops.get_mut(&id) else {
                return Ok(());
            };
            let Some(ch_id) = op.channel else {
                return Ok(());
            };
            let Some(conn) = state.channels.get(&ch_id).and_then(|ch| ch.conn.clone()) else {
                return Ok(());
            };
            let previous = match &mut op.kind {
                OpKind::Get { exchange } => exchange.take(),
            };
            (conn, op.options.clone(), previous)
        };
        // blocking transport calls run with the lock released
        if let Some(previous) = previous {
            previous.destroy();
        }
        let exchange = conn.create_get(GetNotifier::new(Arc::downgrade(self), id), &options)?;
        let stale = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            let state = &mut *st;
            match state.ops.get_mut(&id) {
                Some(op) if op.channel.is_some() => {
                    if let Some(ch_id) = op.channel {
                        if let Some(ch) = state.channels.get_mut(&ch_id) {
                            ch.ops.insert(id);
                        }
                    }
                    match &mut op.kind {
                        OpKind::Get { exchange: slot } => *slot = Some(exchange),
                    }
                    None
                }
                // cancelled during the unlocked window
                _ => Some(exchange),
            }
        };
        if let Some(stale) = stale {
            stale.destroy();
        }
        Ok(())
    }

    /// The channel lost its connection: abandon the in-flight exchange but
    /// re-register for the next `Connected` transition.
    pub(crate) fn lost_conn_op(self: &Arc<Self>, id: OpId) {
        let exchange = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            let state = &mut *st;
            let Some(op) = state.ops.get_mut(&id) else {
                return;
            };
            let Some(ch_id) = op.channel else {
                return;
            };
            if let Some(ch) = state.channels.get_mut(&ch_id) {
                ch.ops.insert(id);
            }
            match &mut op.kind {
                OpKind::Get { exchange } => exchange.take(),
            }
        };
        if let Some(exchange) = exchange {
            // the abandoned exchange never reports; destroyed exchanges
            // must not notify
            exchange.destroy();
        }
    }

    /// Permanently cancel an operation. Returns whether a callback was
    /// still installed, i.e. whether cancellation interrupted anything.
    pub(crate) fn cancel_op(self: &Arc<Self>, id: OpId) -> bool {
        let (had_callback, exchange, callback) = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            let state = &mut *st;
            let Some(op) = state.ops.get_mut(&id) else {
                return false;
            };
            // idempotent: a second call finds no channel binding
            let Some(ch_id) = op.channel.take() else {
                return false;
            };
            if let Some(ch) = state.channels.get_mut(&ch_id) {
                ch.ops.remove(&id);
            }
            let callback = op.callback.take();
            let exchange = match &mut op.kind {
                OpKind::Get { exchange } => exchange.take(),
            };
            (callback.is_some() || op.callback_running, exchange, callback)
        };
        // the callback may own arbitrary user state; drop it outside the
        // registry borrow so a re-entrant destructor cannot trip it
        drop(callback);
        if let Some(exchange) = exchange {
            exchange.destroy();
            if Arc::strong_count(&exchange) > 1 {
                // teardown should have released the transport's references
                tracing::warn!("cancelled exchange still referenced by the transport");
            }
        }
        had_callback
    }

    /// Deliver an exchange completion to the operation's callback.
    pub(crate) fn complete_op(self: &Arc<Self>, id: OpId, result: Result<Value, String>) {
        // callbacks run under the lock but outside any registry borrow,
        // so they may call back into the API
        let guard = self.lock();
        let mut callback = {
            let mut st = guard.borrow_mut();
            let Some(op) = st.ops.get_mut(&id) else {
                return;
            };
            match op.callback.take() {
                Some(callback) => {
                    op.callback_running = true;
                    callback
                }
                None => return,
            }
        };
        if chatter_enabled() {
            tracing::debug!(ok = result.is_ok(), "get complete");
        }
        let outcome = result.map_err(|message| ClientError::Remote { message });
        if catch_unwind(AssertUnwindSafe(|| callback(outcome))).is_err() {
            tracing::warn!("completion callback panicked; suppressed");
        }
        let leftover = {
            let mut st = guard.borrow_mut();
            match st.ops.get_mut(&id) {
                // re-install unless the callback cancelled the operation
                Some(op) if op.channel.is_some() && op.callback.is_none() => {
                    op.callback_running = false;
                    op.callback = Some(callback);
                    None
                }
                Some(op) => {
                    op.callback_running = false;
                    Some(callback)
                }
                None => Some(callback),
            }
        };
        drop(leftover);
    }

    /// Drop an operation's registry entry. The entry's callback (if any)
    /// is dropped outside the borrow.
    pub(crate) fn forget_op(self: &Arc<Self>, id: OpId) {
        let entry = {
            let guard = self.lock();
            let mut st = guard.borrow_mut();
            st.ops.remove(&id)
        };
        drop(entry);
    }
}

/// A pending or in-flight operation.
///
/// Single-owner handle: dropping it cancels the operation if cancellation
/// has not already run, so an operation can never outlive its last owner
/// uncancelled.
pub struct Operation {
    core: Arc<Core>,
    id: OpId,
}

impl Operation {
    pub(crate) fn new(core: Arc<Core>, id: OpId) -> Self {
        Operation { core, id }
    }

    /// Cancel the operation.
    ///
    /// Idempotent. Returns `true` if cancellation interrupted a live
    /// callback binding; every subsequent call returns `false`. No
    /// completion callback fires afterwards, even if the transport later
    /// reports one.
    pub fn cancel(&self) -> bool {
        self.core.cancel_op(self.id)
    }
}

impl Drop for Operation {
    fn drop(&mut self) {
        self.core.cancel_op(self.id);
        self.core.forget_op(self.id);
    }
}
