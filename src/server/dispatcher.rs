//! The dispatcher: inbound events from connections to callable invocation.

use crossbeam_channel::Sender;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use super::config::{ContextHook, QueryFn, RequestInfo, RequestKind, ServerConfig};
use super::engine::{ApplyFn, AssertFn, PatchEngine};
use super::queue::{PatchJob, PatchQueue};
use crate::error::{BoxError, Result, ServerError};
use crate::patch::StructuralDiff;
use crate::registry::SubscriptionRegistry;
use crate::types::{ConnectionHandle, ConnectionId, Context, SubscriptionId};

/// A registered action callable.
pub type ActionFn =
    Arc<dyn Fn(&Value, &ActionContext) -> std::result::Result<Value, BoxError> + Send + Sync>;

// The callable's own error type, not ServerError
type CallableResult = std::result::Result<Value, BoxError>;

/// Result of a handled query: the output plus, for live queries, the id of
/// the registered subscription (also the delta channel identity).
#[derive(Clone, Debug)]
pub struct QueryReply {
    pub output: Value,
    pub subscription: Option<SubscriptionId>,
}

/// Execution context handed to action callables: the merged request context
/// plus the patch-trigger capability bound to the invoking connection.
pub struct ActionContext {
    context: Context,
    connection: ConnectionId,
    action: String,
    patches: Sender<PatchJob>,
}

impl ActionContext {
    /// The connection that fired the action.
    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    /// Schedule a patch sweep for every subscription of `query`.
    ///
    /// Runs asynchronously after this call returns; the action's own output
    /// is delivered to its caller independently of any scheduled patches.
    pub fn trigger_patch<A>(&self, query: impl Into<String>, apply: A)
    where
        A: Fn(&Value, &Value, &Context) -> CallableResult + Send + Sync + 'static,
    {
        self.schedule(query.into(), Arc::new(apply), None);
    }

    /// Like [`trigger_patch`](Self::trigger_patch), but gated per
    /// subscription by `assert` on the subscription's input and context.
    pub fn trigger_patch_if<A, G>(&self, query: impl Into<String>, apply: A, assert: G)
    where
        A: Fn(&Value, &Value, &Context) -> CallableResult + Send + Sync + 'static,
        G: Fn(&Value, &Context) -> std::result::Result<bool, BoxError> + Send + Sync + 'static,
    {
        self.schedule(query.into(), Arc::new(apply), Some(Arc::new(assert)));
    }

    fn schedule(&self, query: String, apply: ApplyFn, assert: Option<AssertFn>) {
        debug!(
            query = %query,
            action = %self.action,
            connection = %self.connection,
            "patch trigger scheduled"
        );
        let _ = self.patches.send(PatchJob {
            query,
            apply,
            assert,
            action: self.action.clone(),
            connection: self.connection,
        });
    }
}

impl std::ops::Deref for ActionContext {
    type Target = Context;

    fn deref(&self) -> &Context {
        &self.context
    }
}

/// The live query server core.
///
/// Owns the subscription registry, the query/action callable tables, and the
/// patch worker. One instance per process, created at startup; dropping it
/// shuts the worker down once in-flight triggers drain.
pub struct Server {
    queries: RwLock<HashMap<String, QueryFn>>,
    actions: RwLock<HashMap<String, ActionFn>>,
    context_hook: Option<ContextHook>,
    registry: Arc<SubscriptionRegistry>,
    queue: PatchQueue,
}

impl Server {
    /// Build a server from configuration.
    pub fn new(config: ServerConfig) -> Result<Self> {
        let registry = Arc::new(SubscriptionRegistry::new());
        let differ = config
            .differ
            .unwrap_or_else(|| Arc::new(StructuralDiff));
        let engine = PatchEngine::new(Arc::clone(&registry), differ);
        let queue = PatchQueue::start(engine)?;

        Ok(Self {
            queries: RwLock::new(HashMap::new()),
            actions: RwLock::new(HashMap::new()),
            context_hook: config.context_hook,
            registry,
            queue,
        })
    }

    /// The subscription registry (for transports and inspection).
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    // --- Callable registration ---

    /// Register a query callable under `name`. Duplicate names are rejected.
    pub fn register_query<F>(&self, name: impl Into<String>, query: F) -> Result<()>
    where
        F: Fn(&Value, &Context) -> CallableResult + Send + Sync + 'static,
    {
        let name = name.into();
        let mut queries = self.queries.write();
        if queries.contains_key(&name) {
            return Err(ServerError::QueryExists(name));
        }
        queries.insert(name, Arc::new(query));
        Ok(())
    }

    /// Register an action callable under `name`. Duplicate names are rejected.
    pub fn register_action<F>(&self, name: impl Into<String>, action: F) -> Result<()>
    where
        F: Fn(&Value, &ActionContext) -> CallableResult + Send + Sync + 'static,
    {
        let name = name.into();
        let mut actions = self.actions.write();
        if actions.contains_key(&name) {
            return Err(ServerError::ActionExists(name));
        }
        actions.insert(name, Arc::new(action));
        Ok(())
    }

    // --- Inbound events ---

    /// Handle a query request from a connection.
    ///
    /// If the merged context asks for liveness, a subscription is registered
    /// with the query output as its initial snapshot and its id is returned
    /// alongside the output.
    pub fn handle_query(
        &self,
        connection: &Arc<dyn ConnectionHandle>,
        query: &str,
        input: Value,
        request: Context,
    ) -> Result<QueryReply> {
        debug!(query, connection = %connection.id(), "query");
        let callable = self
            .queries
            .read()
            .get(query)
            .cloned()
            .ok_or_else(|| ServerError::UnknownQuery(query.to_string()))?;

        let context = self.build_context(request, RequestKind::Query, query, &input);
        let output = callable(&input, &context).map_err(|source| ServerError::QueryFailed {
            name: query.to_string(),
            source,
        })?;

        if !context.live {
            return Ok(QueryReply {
                output,
                subscription: None,
            });
        }

        let id = self.registry.allocate_id();
        self.registry.register(
            id,
            Arc::clone(connection),
            query,
            input,
            context,
            output.clone(),
        );
        Ok(QueryReply {
            output,
            subscription: Some(id),
        })
    }

    /// Handle a subscription cancellation. Fire-and-forget: an unknown id or
    /// a non-owning requester is silently absorbed.
    pub fn handle_unquery(&self, connection: ConnectionId, id: SubscriptionId) {
        self.registry.unregister(id, connection);
    }

    /// Handle an action request from a connection.
    ///
    /// Patch triggers fired by the callable are scheduled asynchronously; the
    /// returned output never waits on them.
    pub fn handle_action(
        &self,
        connection: &Arc<dyn ConnectionHandle>,
        action: &str,
        input: Value,
        request: Context,
    ) -> Result<Value> {
        debug!(action, connection = %connection.id(), "action");
        let callable = self
            .actions
            .read()
            .get(action)
            .cloned()
            .ok_or_else(|| ServerError::UnknownAction(action.to_string()))?;

        let context = self.build_context(request, RequestKind::Action, action, &input);
        let ctx = ActionContext {
            context,
            connection: connection.id(),
            action: action.to_string(),
            patches: self.queue.handle(),
        };

        callable(&input, &ctx).map_err(|source| ServerError::ActionFailed {
            name: action.to_string(),
            source,
        })
    }

    /// Handle a connection disconnect: synchronously remove every
    /// subscription it owns, so no later patch sweep observes a dead owner.
    pub fn handle_disconnect(&self, connection: ConnectionId) {
        debug!(connection = %connection, "disconnect");
        self.registry.unregister_owner(connection);
    }

    fn build_context(
        &self,
        request: Context,
        kind: RequestKind,
        name: &str,
        input: &Value,
    ) -> Context {
        match &self.context_hook {
            Some(hook) => {
                let derived = hook(&request, &RequestInfo { kind, name, input });
                request.merge(derived)
            }
            None => request,
        }
    }
}
