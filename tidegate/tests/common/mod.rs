//! Scripted mock transport shared by the integration tests.
//!
//! The mock plays the transport's role exactly as the trait contracts
//! describe it: tests drive connection-state transitions, connect-phase
//! reports, and completions by hand, on whichever thread they like, and
//! the coordinator under test reacts. Destroyed connections and exchanges
//! never notify, matching the transport contract.

// not every test binary uses every helper
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use tidegate::{
    register_provider, ChannelProvider, ClientError, ClientResult, Connection, ConnectionNotifier,
    ConnectionState, GetExchange, GetNotifier, ProviderFactory, Value,
};

/// Install a log subscriber once so failing tests show coordinator chatter.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Everything a test's callback has observed, in delivery order.
pub type Seen = Arc<Mutex<Vec<Result<Value, ClientError>>>>;

/// A recording completion callback plus its observation log.
pub fn collector() -> (Seen, impl FnMut(Result<Value, ClientError>) + Send + 'static) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |result| sink.lock().push(result))
}

/// Handle for registering and inspecting one mock transport.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    name: String,
    created: AtomicUsize,
    fail_connect: AtomicBool,
    connections: Mutex<Vec<Arc<MockConnection>>>,
}

impl MockTransport {
    /// Register a mock transport under the given provider name.
    pub fn register(name: &str) -> MockTransport {
        let inner = Arc::new(MockInner {
            name: name.to_string(),
            created: AtomicUsize::new(0),
            fail_connect: AtomicBool::new(false),
            connections: Mutex::new(Vec::new()),
        });
        register_provider(Arc::new(MockFactory {
            inner: inner.clone(),
        }));
        MockTransport { inner }
    }

    /// How many transport connections have been created.
    pub fn created_count(&self) -> usize {
        self.inner.created.load(Ordering::SeqCst)
    }

    /// Make the next connection creation fail.
    pub fn fail_next_connect(&self) {
        self.inner.fail_connect.store(true, Ordering::SeqCst);
    }

    /// The connection created for a resource name. Panics if absent.
    pub fn connection(&self, name: &str) -> Arc<MockConnection> {
        self.inner
            .connections
            .lock()
            .iter()
            .find(|c| c.name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no mock connection for '{name}'"))
    }
}

struct MockFactory {
    inner: Arc<MockInner>,
}

impl ProviderFactory for MockFactory {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn create(&self) -> ClientResult<Arc<dyn ChannelProvider>> {
        Ok(Arc::new(MockProvider {
            inner: self.inner.clone(),
        }))
    }
}

struct MockProvider {
    inner: Arc<MockInner>,
}

impl ChannelProvider for MockProvider {
    fn create_connection(
        &self,
        name: &str,
        notifier: ConnectionNotifier,
    ) -> ClientResult<Arc<dyn Connection>> {
        if self.inner.fail_connect.swap(false, Ordering::SeqCst) {
            return Err(ClientError::Transport {
                message: "connection refused".to_string(),
            });
        }
        self.inner.created.fetch_add(1, Ordering::SeqCst);
        let conn = Arc::new(MockConnection {
            name: name.to_string(),
            notifier,
            exchanges: Mutex::new(Vec::new()),
            destroyed: AtomicBool::new(false),
        });
        conn.notifier.created(Ok(()));
        self.inner.connections.lock().push(conn.clone());
        Ok(conn)
    }
}

/// One scripted transport connection.
pub struct MockConnection {
    pub name: String,
    notifier: ConnectionNotifier,
    exchanges: Mutex<Vec<Arc<MockExchange>>>,
    destroyed: AtomicBool,
}

impl MockConnection {
    /// Deliver a connection-state transition to the coordinator.
    pub fn transition(&self, state: ConnectionState) {
        if !self.destroyed.load(Ordering::SeqCst) {
            self.notifier.state_changed(state);
        }
    }

    /// How many get exchanges were created on this connection.
    pub fn exchange_count(&self) -> usize {
        self.exchanges.lock().len()
    }

    /// The n-th exchange created on this connection. Panics if absent.
    pub fn exchange(&self, index: usize) -> Arc<MockExchange> {
        self.exchanges.lock()[index].clone()
    }

    /// The most recently created exchange. Panics if none exist.
    pub fn last_exchange(&self) -> Arc<MockExchange> {
        self.exchanges
            .lock()
            .last()
            .cloned()
            .expect("no exchange created yet")
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl Connection for MockConnection {
    fn create_get(
        &self,
        notifier: GetNotifier,
        options: &Value,
    ) -> ClientResult<Arc<dyn GetExchange>> {
        let exchange = Arc::new(MockExchange {
            notifier,
            options: options.clone(),
            started: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
            reply: Mutex::new(None),
        });
        self.exchanges.lock().push(exchange.clone());
        Ok(exchange)
    }

    fn destroy(&self) {
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            self.notifier.state_changed(ConnectionState::Destroyed);
        }
    }
}

/// One scripted get exchange.
pub struct MockExchange {
    notifier: GetNotifier,
    pub options: Value,
    started: AtomicBool,
    destroyed: AtomicBool,
    reply: Mutex<Option<Result<Value, String>>>,
}

impl MockExchange {
    /// Stage the reply that `start()` will deliver.
    pub fn stage_reply(&self, reply: Result<Value, String>) {
        *self.reply.lock() = Some(reply);
    }

    /// Report connect-phase success; `start()` runs nested and delivers
    /// any staged reply.
    pub fn open(&self) {
        self.notifier.connected(Ok(()), self);
    }

    /// Report connect-phase failure.
    pub fn fail_connect_phase(&self, message: &str) {
        self.notifier.connected(Err(message.to_string()), self);
    }

    /// Deliver a completion directly, as a transport thread would.
    /// Destroyed exchanges stay silent per the transport contract.
    pub fn complete(&self, reply: Result<Value, String>) {
        if !self.destroyed.load(Ordering::SeqCst) {
            self.notifier.complete(reply);
        }
    }

    pub fn was_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

impl GetExchange for MockExchange {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
        let staged = self.reply.lock().take();
        if let Some(reply) = staged {
            if !self.destroyed.load(Ordering::SeqCst) {
                self.notifier.complete(reply);
            }
        }
    }

    fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}
