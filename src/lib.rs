//! # livequery
//!
//! Server core for live, incrementally-updated queries: clients subscribe to
//! the result of a named, parameterized query and receive minimal JSON Patch
//! deltas whenever a server-side action invalidates that result.
//!
//! ## Core Concepts
//!
//! - **Live query**: a query whose result is tracked per connection until
//!   cancelled or the connection disconnects
//! - **Action**: a state-changing operation that may trigger recomputation
//!   of affected live queries
//! - **Delta**: the ordered patch-op list transforming the previous output
//!   into the new one, delivered on the subscription's `patch/{id}` channel
//!
//! The transport (connections, framing, event emission) is a collaborator
//! behind the [`ConnectionHandle`] trait, not part of this crate.
//!
//! ## Example
//!
//! ```ignore
//! use livequery::{Context, Server, ServerConfig};
//! use serde_json::json;
//!
//! let server = Server::new(ServerConfig::default())?;
//!
//! server.register_query("todos", |_input, _ctx| Ok(json!(["a"])))?;
//!
//! server.register_action("add_todo", |input, ctx| {
//!     let todo = input.clone();
//!     ctx.trigger_patch("todos", move |out, _input, _ctx| {
//!         let mut items = out.as_array().cloned().unwrap_or_default();
//!         items.push(todo.clone());
//!         Ok(items.into())
//!     });
//!     Ok(json!({"ok": true}))
//! })?;
//!
//! // conn: Arc<dyn ConnectionHandle> supplied by the transport
//! let reply = server.handle_query(&conn, "todos", json!({}), Context::live())?;
//! ```

pub mod error;
pub mod patch;
pub mod registry;
pub mod server;
pub mod types;

// Re-exports
pub use error::{BoxError, Result, ServerError};
pub use patch::{apply, diff, Differ, PatchError, PatchOp, StructuralDiff};
pub use registry::{Subscription, SubscriptionRegistry};
pub use server::{
    ActionContext, ActionFn, ApplyFn, AssertFn, ContextHook, PatchEngine, QueryFn, QueryReply,
    RequestInfo, RequestKind, Server, ServerConfig,
};
pub use types::{ConnectionHandle, ConnectionId, Context, SubscriptionId};
