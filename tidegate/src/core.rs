//! Shared registry state behind the serialization lock.
//!
//! One [`Core`] per context owns every piece of mutable bookkeeping: the
//! provider handle, the name→channel dedup map, the channel table, and the
//! operation table. A single re-entrant lock serializes all registry
//! access and every user-callback invocation; fine-grained per-object
//! locking is deliberately avoided to keep ordering reasoning tractable.
//!
//! # Locking rules
//!
//! - Every registry read or mutation happens under [`Core::lock`], inside
//!   a `RefCell` borrow.
//! - The `RefCell` borrow is always released before invoking a user
//!   callback or dropping one (a callback's destructor can re-enter the
//!   API), while the lock itself stays held for callback invocation.
//! - Blocking transport calls (`create_connection`, `create_get`,
//!   `destroy`) are issued with the lock released and re-acquired
//!   afterwards, so a notification arriving on a transport thread during
//!   the call cannot deadlock. Calls nested under a running callback keep
//!   the outer re-entrant hold; the transport must not require the
//!   coordinator's lock to make progress on its own threads.
//! - Transport notifiers hold only a [`Weak`] core reference plus a
//!   numeric token, never a strong back-reference, so the
//!   coordinator→transport→coordinator graph has no strong cycle.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::channel::ConnectionState;
use crate::error::ClientError;
use crate::provider::{ChannelProvider, Connection, GetExchange};
use crate::value::Value;

/// Registry token for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ChannelId(u64);

/// Registry token for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct OpId(u64);

/// User completion callback. Invoked under the serialization lock with
/// either the moved result value or the transport's error.
pub(crate) type GetCallback = Box<dyn FnMut(Result<Value, ClientError>) + Send>;

/// Per-kind operation payload.
///
/// Get is the only kind currently implemented; put and monitor are natural
/// siblings and would add variants here rather than a trait hierarchy.
pub(crate) enum OpKind {
    Get {
        /// The in-flight exchange, at most one at a time.
        exchange: Option<Arc<dyn GetExchange>>,
    },
}

pub(crate) struct OpEntry {
    /// Owning channel; cleared permanently on cancellation.
    pub(crate) channel: Option<ChannelId>,
    /// User callback; taken during invocation, cleared on cancellation.
    pub(crate) callback: Option<GetCallback>,
    /// True while the callback is out of the entry being invoked, so a
    /// re-entrant cancel still sees a live callback binding.
    pub(crate) callback_running: bool,
    /// Captured request options, reused on every restart.
    pub(crate) options: Value,
    pub(crate) kind: OpKind,
}

pub(crate) struct ChannelEntry {
    pub(crate) name: String,
    /// Transport connection; filled after the unlocked blocking create,
    /// dropped when the transport reports destruction.
    pub(crate) conn: Option<Arc<dyn Connection>>,
    pub(crate) state: ConnectionState,
    /// Operations that need to react to the next state transition.
    pub(crate) ops: HashSet<OpId>,
}

pub(crate) struct CoreState {
    /// Present while the context is open, cleared by close().
    pub(crate) provider: Option<Arc<dyn ChannelProvider>>,
    /// Name → channel dedup registry.
    pub(crate) by_name: HashMap<String, ChannelId>,
    pub(crate) channels: HashMap<ChannelId, ChannelEntry>,
    pub(crate) ops: HashMap<OpId, OpEntry>,
    next_channel: u64,
    next_op: u64,
}

impl CoreState {
    pub(crate) fn alloc_channel(&mut self) -> ChannelId {
        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        id
    }

    pub(crate) fn alloc_op(&mut self) -> OpId {
        let id = OpId(self.next_op);
        self.next_op += 1;
        id
    }
}

/// Shared core of one context: the serialization lock around the whole
/// registry graph.
pub(crate) struct Core {
    lock: ReentrantMutex<RefCell<CoreState>>,
}

impl Core {
    pub(crate) fn new(provider: Arc<dyn ChannelProvider>) -> Arc<Self> {
        Arc::new(Core {
            lock: ReentrantMutex::new(RefCell::new(CoreState {
                provider: Some(provider),
                by_name: HashMap::new(),
                channels: HashMap::new(),
                ops: HashMap::new(),
                next_channel: 0,
                next_op: 0,
            })),
        })
    }

    /// Acquire the serialization lock. Re-entrant: a user callback running
    /// under it may call back into the API on the same thread.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<CoreState>> {
        self.lock.lock()
    }
}
