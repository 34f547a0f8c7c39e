//! Deferred patch execution.
//!
//! Patch triggers fired inside an action are not run inline: they are queued
//! here and drained by a dedicated worker thread, so the action's response
//! never waits on patch delivery and deliveries never block the dispatcher.
//! No ordering is guaranteed across triggers.

use crossbeam_channel::{unbounded, Sender};
use std::thread;
use tracing::debug;

use super::engine::{ApplyFn, AssertFn, PatchEngine};
use crate::types::ConnectionId;

/// One scheduled patch trigger. `action` and `connection` identify the
/// trigger's origin for diagnostics only; they carry no authorization.
pub(crate) struct PatchJob {
    pub query: String,
    pub apply: ApplyFn,
    pub assert: Option<AssertFn>,
    pub action: String,
    pub connection: ConnectionId,
}

/// Channel into the patch worker. Dropping the queue (and any outstanding
/// action contexts holding a sender clone) disconnects the channel and the
/// worker exits after draining.
pub(crate) struct PatchQueue {
    sender: Sender<PatchJob>,
}

impl PatchQueue {
    /// Spawn the worker thread and return the queue handle.
    pub fn start(engine: PatchEngine) -> std::io::Result<Self> {
        let (sender, receiver) = unbounded::<PatchJob>();

        thread::Builder::new()
            .name("livequery-patch".to_string())
            .spawn(move || {
                while let Ok(job) = receiver.recv() {
                    debug!(
                        query = %job.query,
                        action = %job.action,
                        connection = %job.connection,
                        "running patch trigger"
                    );
                    engine.apply_patch(&job.query, &job.apply, job.assert.as_ref());
                }
            })?;

        Ok(Self { sender })
    }

    /// Sender clone for an action context.
    pub fn handle(&self) -> Sender<PatchJob> {
        self.sender.clone()
    }
}
