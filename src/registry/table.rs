//! The subscription table.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::Subscription;
use crate::types::{ConnectionHandle, ConnectionId, Context, SubscriptionId};

/// In-memory store of active subscriptions.
///
/// Created at server start and torn down at shutdown; never ambient state.
pub struct SubscriptionRegistry {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Arc<Subscription>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh subscription id, unique for the process lifetime.
    pub fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Insert a new subscription keyed by `id`.
    ///
    /// Callers guarantee id uniqueness by allocating through
    /// [`allocate_id`](Self::allocate_id); a duplicate is a programming
    /// error, not a runtime condition.
    pub fn register(
        &self,
        id: SubscriptionId,
        owner: Arc<dyn ConnectionHandle>,
        query: impl Into<String>,
        input: Value,
        context: Context,
        initial_output: Value,
    ) {
        let query = query.into();
        debug!(subscription = %id, connection = %owner.id(), query = %query, "register subscription");
        let subscription = Arc::new(Subscription::new(
            id,
            owner,
            query,
            input,
            context,
            initial_output,
        ));
        let previous = self.subscriptions.write().insert(id, subscription);
        debug_assert!(previous.is_none(), "duplicate subscription id {id}");
    }

    /// Remove the subscription keyed by `id` iff it exists and is owned by
    /// `requester`. Anything else is a silent no-op: a cancellation attempt
    /// from a non-owner must not even learn whether the id exists.
    pub fn unregister(&self, id: SubscriptionId, requester: ConnectionId) {
        let mut subs = self.subscriptions.write();
        match subs.get(&id) {
            Some(sub) if sub.owner.id() == requester => {
                subs.remove(&id);
                debug!(subscription = %id, connection = %requester, "unregister subscription");
            }
            _ => {
                trace!(subscription = %id, connection = %requester, "unregister ignored");
            }
        }
    }

    /// Remove every subscription owned by `owner`. Called on disconnect;
    /// zero matches is fine.
    pub fn unregister_owner(&self, owner: ConnectionId) {
        let mut subs = self.subscriptions.write();
        let before = subs.len();
        subs.retain(|_, sub| sub.owner.id() != owner);
        let removed = before - subs.len();
        if removed > 0 {
            debug!(connection = %owner, removed, "disconnect sweep");
        }
    }

    /// Snapshot of the subscriptions currently registered for `query`.
    ///
    /// The snapshot is taken under the read lock and iterated without it, so
    /// a patch sweep never observes a half-inserted entry and concurrent
    /// registration or unregistration cannot corrupt the iteration. Order is
    /// unspecified.
    pub fn matching(&self, query: &str) -> Vec<Arc<Subscription>> {
        self.subscriptions
            .read()
            .values()
            .filter(|sub| sub.query == query)
            .map(Arc::clone)
            .collect()
    }

    /// Look up a subscription by id.
    pub fn get(&self, id: SubscriptionId) -> Option<Arc<Subscription>> {
        self.subscriptions.read().get(&id).map(Arc::clone)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
