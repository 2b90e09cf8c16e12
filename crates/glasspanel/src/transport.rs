//! The property transport consumed by the registry.
//!
//! The transport itself (the socket to the simulator) lives outside this
//! crate. The registry only needs to subscribe paths; connection-open events
//! and value notifications are pushed in by whoever owns the connection via
//! [`Registry::connection_opened`](crate::registry::Registry::connection_opened)
//! and [`Registry::property_changed`](crate::registry::Registry::property_changed).

use crate::error::Result;
use crate::property::PropertyPath;

/// Handle returned by a successful subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A source of property-change notifications.
pub trait PropertyTransport {
    /// Ask the host to start sending changes for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Subscribe`](crate::Error::Subscribe) if the host
    /// refuses the subscription.
    fn subscribe(&mut self, path: &PropertyPath) -> Result<SubscriptionId>;
}

/// Transport used when replaying a recorded property log.
///
/// Recorded changes are pushed into the registry directly, so this only keeps
/// track of which paths were subscribed.
#[derive(Debug, Default)]
pub struct ReplayTransport {
    subscribed: Vec<PropertyPath>,
    next_id: u64,
}

impl ReplayTransport {
    /// Create a transport with no subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths subscribed so far, in subscription order.
    #[must_use]
    pub fn subscriptions(&self) -> &[PropertyPath] {
        &self.subscribed
    }

    /// Whether `path` has been subscribed.
    #[must_use]
    pub fn is_subscribed(&self, path: &PropertyPath) -> bool {
        self.subscribed.contains(path)
    }
}

impl PropertyTransport for ReplayTransport {
    fn subscribe(&mut self, path: &PropertyPath) -> Result<SubscriptionId> {
        self.subscribed.push(path.clone());
        self.next_id += 1;
        Ok(SubscriptionId(self.next_id))
    }
}
