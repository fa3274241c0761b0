//! Transport provider registry and the transport-facing trait seam.
//!
//! The coordinator never talks to a network itself. A registered
//! [`ProviderFactory`] instantiates a [`ChannelProvider`] per context; the
//! provider creates [`Connection`]s, and connections create
//! [`GetExchange`]s. All notifications flow back through the notifier
//! handles the coordinator supplies ([`ConnectionNotifier`],
//! [`GetNotifier`]), on whatever threads the transport owns.
//!
//! Trait-based so tests can swap in a scripted mock transport the same way
//! a real deployment plugs in its protocol implementation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use crate::channel::ConnectionNotifier;
use crate::error::{ClientError, ClientResult};
use crate::operation::GetNotifier;
use crate::value::Value;

/// Factory for a named transport implementation.
///
/// Registered process-wide; each context instantiates its own provider from
/// the factory so it can destroy channels at will without affecting other
/// contexts.
pub trait ProviderFactory: Send + Sync {
    /// The provider name used for registry lookup.
    fn name(&self) -> &str;

    /// Instantiate a fresh provider.
    fn create(&self) -> ClientResult<Arc<dyn ChannelProvider>>;
}

/// A transport provider instance, owned by one context.
pub trait ChannelProvider: Send + Sync {
    /// Create a transport-level connection to the named resource.
    ///
    /// Blocking; the coordinator calls this with its serialization lock
    /// released. Connection-state transitions are delivered through the
    /// supplied notifier, possibly before this call returns.
    fn create_connection(
        &self,
        name: &str,
        notifier: ConnectionNotifier,
    ) -> ClientResult<Arc<dyn Connection>>;
}

/// A transport-level connection to one named resource.
pub trait Connection: Send + Sync {
    /// Create a get exchange against this connection.
    ///
    /// The exchange reports its connect phase and completion through the
    /// notifier; completion may be delivered synchronously (nested) or
    /// from a transport thread.
    fn create_get(
        &self,
        notifier: GetNotifier,
        options: &Value,
    ) -> ClientResult<Arc<dyn GetExchange>>;

    /// Tear the connection down.
    ///
    /// Must result in a final `Destroyed` state-change notification so
    /// registered operations get cancelled.
    fn destroy(&self);
}

/// One in-flight get exchange.
pub trait GetExchange: Send + Sync {
    /// Issue the actual data request; called once the connect phase
    /// reports success.
    fn start(&self);

    /// Abandon the exchange. A destroyed exchange must never deliver
    /// further notifications.
    fn destroy(&self);
}

static REGISTRY: Mutex<BTreeMap<String, Arc<dyn ProviderFactory>>> = Mutex::new(BTreeMap::new());

/// Register a provider factory under its name, replacing any previous
/// registration for that name.
pub fn register_provider(factory: Arc<dyn ProviderFactory>) {
    let name = factory.name().to_string();
    REGISTRY.lock().insert(name, factory);
}

/// Remove a provider registration. Returns whether one was present.
pub fn unregister_provider(name: &str) -> bool {
    REGISTRY.lock().remove(name).is_some()
}

/// Names of all currently registered providers, sorted.
pub fn provider_names() -> Vec<String> {
    REGISTRY.lock().keys().cloned().collect()
}

pub(crate) fn create_provider(name: &str) -> ClientResult<Arc<dyn ChannelProvider>> {
    let factory = REGISTRY
        .lock()
        .get(name)
        .cloned()
        .ok_or_else(|| ClientError::UnknownProvider {
            name: name.to_string(),
        })?;
    factory.create()
}

/// Process-wide protocol logging verbosity, set via
/// [`Context::set_debug`](crate::Context::set_debug).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DebugLevel {
    /// No protocol chatter.
    Off = 0,
    /// Errors only.
    Error = 1,
    /// Errors and warnings.
    Warn = 2,
    /// Informational.
    Info = 3,
    /// Per-call protocol chatter.
    Debug = 4,
    /// Everything.
    Trace = 5,
}

static DEBUG_LEVEL: AtomicU8 = AtomicU8::new(DebugLevel::Off as u8);

pub(crate) fn set_debug(level: DebugLevel) {
    DEBUG_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// The currently configured protocol verbosity.
pub fn debug_level() -> DebugLevel {
    match DEBUG_LEVEL.load(Ordering::Relaxed) {
        0 => DebugLevel::Off,
        1 => DebugLevel::Error,
        2 => DebugLevel::Warn,
        3 => DebugLevel::Info,
        4 => DebugLevel::Debug,
        _ => DebugLevel::Trace,
    }
}

/// Whether per-call protocol chatter should be emitted.
pub(crate) fn chatter_enabled() -> bool {
    debug_level() >= DebugLevel::Debug
}
