//! Query/action dispatch and patch delivery.
//!
//! [`Server`] owns the subscription registry, the callable registries, and
//! the patch worker. Inbound transport events map onto `handle_query`,
//! `handle_unquery`, `handle_action`, and `handle_disconnect`.

mod config;
mod dispatcher;
mod engine;
mod queue;

pub use config::{ContextHook, QueryFn, RequestInfo, RequestKind, ServerConfig};
pub use dispatcher::{ActionContext, ActionFn, QueryReply, Server};
pub use engine::{ApplyFn, AssertFn, PatchEngine};
