//! Server configuration and collaborator contracts.

use serde_json::Value;
use std::sync::Arc;

use crate::error::BoxError;
use crate::patch::Differ;
use crate::types::Context;

/// What kind of request a context hook is being consulted for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    Query,
    Action,
}

/// Descriptor of the request being dispatched, passed to the context hook.
#[derive(Debug)]
pub struct RequestInfo<'a> {
    pub kind: RequestKind,
    pub name: &'a str,
    pub input: &'a Value,
}

/// Server-side context hook: derives cross-cutting context fields (e.g. from
/// auth data in the incoming context) for each request. Expected to be pure.
/// Its output is merged over the request context, so hook fields win.
pub type ContextHook = Arc<dyn Fn(&Context, &RequestInfo<'_>) -> Context + Send + Sync>;

/// A registered query callable.
pub type QueryFn = Arc<dyn Fn(&Value, &Context) -> Result<Value, BoxError> + Send + Sync>;

/// Server configuration.
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Context hook consulted on every query and action. `None` means the
    /// request context is used as-is.
    pub context_hook: Option<ContextHook>,

    /// Diff collaborator. `None` selects the built-in
    /// [`StructuralDiff`](crate::patch::StructuralDiff).
    pub differ: Option<Arc<dyn Differ>>,
}
