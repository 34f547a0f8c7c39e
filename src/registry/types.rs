//! Subscription entry type.

use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::sync::Arc;

use crate::types::{ConnectionHandle, Context, SubscriptionId};

/// A single live-query subscription.
///
/// Everything but `last_output` is fixed at registration time. `last_output`
/// is the snapshot most recently delivered to the owner (initially the
/// registration output) and is the diff baseline for the next recomputation;
/// only the patch engine writes it.
pub struct Subscription {
    /// Registry key and delta channel identity.
    pub id: SubscriptionId,

    /// The connection that created the subscription. Only this connection
    /// may cancel it; deltas are delivered through it.
    pub owner: Arc<dyn ConnectionHandle>,

    /// Query name matched against patch triggers.
    pub query: String,

    /// Immutable query parameters, re-supplied on every recomputation.
    pub input: Value,

    /// Merged execution context captured at subscription time.
    pub context: Context,

    last_output: Mutex<Value>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        owner: Arc<dyn ConnectionHandle>,
        query: String,
        input: Value,
        context: Context,
        initial_output: Value,
    ) -> Self {
        Self {
            id,
            owner,
            query,
            input,
            context,
            last_output: Mutex::new(initial_output),
        }
    }

    /// The event name deltas for this subscription are delivered on.
    pub fn channel(&self) -> String {
        format!("patch/{}", self.id)
    }

    /// Snapshot of the last delivered output.
    pub fn last_output(&self) -> Value {
        self.last_output.lock().clone()
    }

    /// Exclusive access to the output cell. The engine holds this lock across
    /// its read-modify-diff-write-send sequence so concurrent sweeps on the
    /// same query never race on one subscription.
    pub(crate) fn lock_output(&self) -> MutexGuard<'_, Value> {
        self.last_output.lock()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner.id())
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}
