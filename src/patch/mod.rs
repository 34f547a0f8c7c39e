//! Structural diff primitive: JSON Patch operations, diffing, and application.
//!
//! The engine only requires the [`Differ`] contract: deterministic, and an
//! empty patch iff the two values are structurally equal. [`StructuralDiff`]
//! is the default implementation; [`apply()`] is the inverse used by clients
//! and by the round-trip tests.

mod apply;
mod diff;
mod types;

pub use apply::apply;
pub use diff::{diff, Differ, StructuralDiff};
pub use types::{PatchError, PatchOp};
