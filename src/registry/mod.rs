//! Subscription registry: the table of active live-query subscriptions.
//!
//! The registry is the single shared mutable resource in the server. It
//! supports concurrent registration, owner-checked unregistration, disconnect
//! sweeps, and snapshot iteration that tolerates structural changes made
//! elsewhere in the table while a patch sweep is running.

mod table;
mod types;

pub use table::SubscriptionRegistry;
pub use types::Subscription;
