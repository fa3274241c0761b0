//! Context: the root of the ownership graph.
//!
//! A [`Context`] owns one transport provider instance and a deduplicated
//! registry of channels by resource name. Closing it (explicitly or by
//! dropping it) force-destroys every tracked channel, which cancels every
//! registered operation.

use std::collections::HashSet;
use std::sync::Arc;

use crate::channel::{Channel, ConnectionNotifier, ConnectionState};
use crate::core::{ChannelEntry, Core};
use crate::error::{ClientError, ClientResult};
use crate::provider::{self, DebugLevel};

/// Client context for one transport provider.
///
/// Single owner of its channel registry; dropping the context closes it.
pub struct Context {
    core: Arc<Core>,
}

impl Context {
    /// Open a context backed by the named provider.
    ///
    /// Each context instantiates its own provider from the registered
    /// factory, so it can destroy channels at will without affecting
    /// other contexts.
    ///
    /// # Errors
    ///
    /// [`ClientError::UnknownProvider`] if no factory is registered under
    /// this name; whatever the factory reports if instantiation fails.
    pub fn new(provider: &str) -> ClientResult<Self> {
        let provider = provider::create_provider(provider)?;
        Ok(Context {
            core: Core::new(provider),
        })
    }

    /// Look up or create the channel for a resource name.
    ///
    /// Two calls with the same name yield handles sharing one transport
    /// connection. The blocking transport create runs with the
    /// serialization lock released, so a notification arriving for
    /// another channel meanwhile cannot deadlock; as a consequence,
    /// concurrent calls for the same not-yet-registered name may race to
    /// duplicate transport connections, and the last registration wins.
    ///
    /// # Errors
    ///
    /// [`ClientError::ContextClosed`] after [`close`](Context::close);
    /// [`ClientError::ChannelCreateFailed`] if the transport refuses.
    pub fn channel(&self, name: &str) -> ClientResult<Channel> {
        let (provider, id) = {
            let guard = self.core.lock();
            let mut st = guard.borrow_mut();
            let provider = st.provider.clone().ok_or(ClientError::ContextClosed)?;
            if let Some(&id) = st.by_name.get(name) {
                return Ok(Channel::new(self.core.clone(), id));
            }
            let id = st.alloc_channel();
            st.channels.insert(
                id,
                ChannelEntry {
                    name: name.to_string(),
                    conn: None,
                    state: ConnectionState::NeverConnected,
                    ops: HashSet::new(),
                },
            );
            (provider, id)
        };
        let notifier = ConnectionNotifier::new(Arc::downgrade(&self.core), id);
        let conn = match provider.create_connection(name, notifier) {
            Ok(conn) => conn,
            Err(error) => {
                let guard = self.core.lock();
                guard.borrow_mut().channels.remove(&id);
                return Err(ClientError::ChannelCreateFailed {
                    name: name.to_string(),
                    message: error.to_string(),
                });
            }
        };
        let guard = self.core.lock();
        let mut st = guard.borrow_mut();
        if let Some(ch) = st.channels.get_mut(&id) {
            ch.conn = Some(conn);
        }
        st.by_name.insert(name.to_string(), id);
        if provider::chatter_enabled() {
            tracing::debug!(channel = %name, "channel created");
        }
        Ok(Channel::new(self.core.clone(), id))
    }

    /// Close the context. Idempotent.
    ///
    /// Clears the provider handle and the name registry, then destroys
    /// every tracked connection with the lock released; the transport's
    /// `Destroyed` notifications cancel the registered operations. After
    /// close, [`channel`](Context::channel) always fails.
    pub fn close(&self) {
        let conns = {
            let guard = self.core.lock();
            let mut st = guard.borrow_mut();
            if st.provider.take().is_none() {
                return;
            }
            st.by_name.clear();
            st.channels
                .values()
                .filter_map(|ch| ch.conn.clone())
                .collect::<Vec<_>>()
        };
        if provider::chatter_enabled() {
            tracing::debug!(channels = conns.len(), "context close");
        }
        for conn in conns {
            conn.destroy();
        }
    }

    /// Names of all currently registered transport providers.
    pub fn providers() -> Vec<String> {
        provider::provider_names()
    }

    /// Set the process-wide protocol logging verbosity.
    pub fn set_debug(level: DebugLevel) {
        provider::set_debug(level);
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.close();
    }
}
