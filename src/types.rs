//! Core types for the live query server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Unique identifier for a subscription.
///
/// Doubles as the delta channel name for the owning connection: deltas are
/// delivered on the event `patch/{id}`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub u64);

impl fmt::Debug for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionId({})", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a client connection, assigned by the transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Debug for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectionId({})", self.0)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A client connection as seen by the core: an identity plus a one-way,
/// fire-and-forget event sink.
///
/// The transport is assumed reliable with per-connection FIFO delivery, so
/// `send` reports nothing. A connection that has gone away is cleaned up via
/// the transport's disconnect notification, never from a failed send.
pub trait ConnectionHandle: Send + Sync {
    /// Stable identity for this connection.
    fn id(&self) -> ConnectionId;

    /// Emit a named event to this connection.
    fn send(&self, event: &str, payload: Value);
}

/// Execution context for a query or action invocation.
///
/// Built by merging the request-supplied context with the server's context
/// hook output (hook fields win). The `live` flag is the explicit liveness
/// signal: a query invoked with `live == true` registers a subscription.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Context {
    /// Whether the caller asked for a live subscription to the result.
    #[serde(default)]
    pub live: bool,

    /// Free-form request-scoped and server-derived fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Context {
    /// Empty, non-live context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Context requesting a live subscription.
    pub fn live() -> Self {
        Self {
            live: true,
            ..Default::default()
        }
    }

    /// Look up a context field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Set a context field, returning self for chaining.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Merge another context over this one. `other`'s fields override ours;
    /// liveness is the OR of both sides.
    pub fn merge(mut self, other: Context) -> Self {
        self.live |= other.live;
        for (key, value) in other.fields {
            self.fields.insert(key, value);
        }
        self
    }
}
