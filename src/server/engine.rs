//! Patch engine: recompute, diff, and deliver deltas for one trigger.

use serde_json::Value;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::error::BoxError;
use crate::patch::Differ;
use crate::registry::SubscriptionRegistry;
use crate::types::Context;

/// Recompute callable supplied by a patch trigger: maps the current snapshot
/// plus the subscription's fixed input and context to the new snapshot. Must
/// return a value structurally equal to the snapshot for subscriptions it
/// does not intend to affect.
pub type ApplyFn = Arc<dyn Fn(&Value, &Value, &Context) -> Result<Value, BoxError> + Send + Sync>;

/// Optional per-subscription gate evaluated before recomputing. Absent means
/// the trigger applies to every subscription of the query.
pub type AssertFn = Arc<dyn Fn(&Value, &Context) -> Result<bool, BoxError> + Send + Sync>;

/// Walks the subscriptions of a query, recomputes each output, and delivers
/// the delta to the owning connection when something changed.
pub struct PatchEngine {
    registry: Arc<SubscriptionRegistry>,
    differ: Arc<dyn Differ>,
}

impl PatchEngine {
    pub fn new(registry: Arc<SubscriptionRegistry>, differ: Arc<dyn Differ>) -> Self {
        Self { registry, differ }
    }

    /// Run one patch trigger against every subscription of `query`.
    ///
    /// A failing assert or apply callable skips that subscription only (its
    /// prior output is retained) and never aborts the sweep. Zero matching
    /// subscriptions is a silent no-op. For each delivery, the output cell
    /// stays locked from recomputation through send, so concurrent sweeps on
    /// the same query serialize per subscription.
    pub fn apply_patch(&self, query: &str, apply: &ApplyFn, assert: Option<&AssertFn>) {
        for sub in self.registry.matching(query) {
            if let Some(assert) = assert {
                match assert(&sub.input, &sub.context) {
                    Ok(true) => {}
                    Ok(false) => continue,
                    Err(error) => {
                        warn!(subscription = %sub.id, query, %error, "assert failed, skipping");
                        continue;
                    }
                }
            }

            let mut output = sub.lock_output();
            let updated = match apply(&output, &sub.input, &sub.context) {
                Ok(value) => value,
                Err(error) => {
                    warn!(subscription = %sub.id, query, %error, "apply failed, skipping");
                    continue;
                }
            };

            let delta = self.differ.diff(&output, &updated);
            if delta.is_empty() {
                trace!(subscription = %sub.id, query, "no-op patch");
                continue;
            }

            let payload = match serde_json::to_value(&delta) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!(subscription = %sub.id, query, %error, "unserializable delta, skipping");
                    continue;
                }
            };

            *output = updated;
            trace!(subscription = %sub.id, query, ops = delta.len(), "delta delivered");
            sub.owner.send(&sub.channel(), payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{apply as apply_ops, PatchOp, StructuralDiff};
    use crate::types::{ConnectionHandle, ConnectionId};
    use parking_lot::Mutex;
    use serde_json::json;

    struct RecordingConnection {
        id: ConnectionId,
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl RecordingConnection {
        fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ConnectionId(id),
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(String, Value)> {
            self.sent.lock().clone()
        }
    }

    impl ConnectionHandle for RecordingConnection {
        fn id(&self) -> ConnectionId {
            self.id
        }
        fn send(&self, event: &str, payload: Value) {
            self.sent.lock().push((event.to_string(), payload));
        }
    }

    fn engine_with_registry() -> (PatchEngine, Arc<SubscriptionRegistry>) {
        let registry = Arc::new(SubscriptionRegistry::new());
        let engine = PatchEngine::new(Arc::clone(&registry), Arc::new(StructuralDiff));
        (engine, registry)
    }

    fn subscribe(
        registry: &SubscriptionRegistry,
        conn: &Arc<RecordingConnection>,
        query: &str,
        input: Value,
        output: Value,
    ) -> crate::types::SubscriptionId {
        let id = registry.allocate_id();
        registry.register(
            id,
            Arc::clone(conn) as Arc<dyn ConnectionHandle>,
            query,
            input,
            crate::types::Context::live(),
            output,
        );
        id
    }

    fn append_b() -> ApplyFn {
        Arc::new(|out, _input, _ctx| {
            let mut items = out.as_array().cloned().unwrap_or_default();
            items.push(json!("b"));
            Ok(Value::Array(items))
        })
    }

    #[test]
    fn test_delta_delivered_and_output_updated() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let id = subscribe(&registry, &conn, "todos", json!({}), json!(["a"]));

        engine.apply_patch("todos", &append_b(), None);

        let sent = conn.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, format!("patch/{id}"));
        assert_eq!(sent[0].1, json!([{"op": "add", "path": "/1", "value": "b"}]));
        assert_eq!(registry.get(id).unwrap().last_output(), json!(["a", "b"]));
    }

    #[test]
    fn test_delta_roundtrip_law() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let id = subscribe(
            &registry,
            &conn,
            "todos",
            json!({}),
            json!({"items": ["a"], "count": 1}),
        );

        let apply: ApplyFn = Arc::new(|_out, _input, _ctx| {
            Ok(json!({"items": ["a", "b"], "count": 2}))
        });
        engine.apply_patch("todos", &apply, None);

        let sent = conn.sent();
        let ops: Vec<PatchOp> = serde_json::from_value(sent[0].1.clone()).unwrap();
        let rebuilt = apply_ops(&json!({"items": ["a"], "count": 1}), &ops).unwrap();
        assert_eq!(rebuilt, registry.get(id).unwrap().last_output());
    }

    #[test]
    fn test_equal_output_sends_nothing() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let id = subscribe(&registry, &conn, "todos", json!({}), json!(["a"]));

        let identity: ApplyFn = Arc::new(|out, _input, _ctx| Ok(out.clone()));
        engine.apply_patch("todos", &identity, None);

        assert!(conn.sent().is_empty());
        assert_eq!(registry.get(id).unwrap().last_output(), json!(["a"]));
    }

    #[test]
    fn test_assert_false_gates_everything() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let id = subscribe(&registry, &conn, "todos", json!({}), json!(["a"]));

        let never: AssertFn = Arc::new(|_input, _ctx| Ok(false));
        engine.apply_patch("todos", &append_b(), Some(&never));

        assert!(conn.sent().is_empty());
        assert_eq!(registry.get(id).unwrap().last_output(), json!(["a"]));
    }

    #[test]
    fn test_assert_selects_by_input() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let mine = subscribe(&registry, &conn, "todos", json!({"user": "a"}), json!([]));
        let theirs = subscribe(&registry, &conn, "todos", json!({"user": "b"}), json!([]));

        let only_a: AssertFn =
            Arc::new(|input, _ctx| Ok(input.get("user") == Some(&json!("a"))));
        engine.apply_patch("todos", &append_b(), Some(&only_a));

        assert_eq!(registry.get(mine).unwrap().last_output(), json!(["b"]));
        assert_eq!(registry.get(theirs).unwrap().last_output(), json!([]));
        assert_eq!(conn.sent().len(), 1);
    }

    #[test]
    fn test_failing_apply_skips_one_subscription_only() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let poisoned = subscribe(&registry, &conn, "todos", json!({"poison": true}), json!(["a"]));
        let healthy = subscribe(&registry, &conn, "todos", json!({}), json!(["a"]));

        let apply: ApplyFn = Arc::new(|out, input, _ctx| {
            if input.get("poison").is_some() {
                return Err("boom".into());
            }
            let mut items = out.as_array().cloned().unwrap_or_default();
            items.push(json!("b"));
            Ok(Value::Array(items))
        });
        engine.apply_patch("todos", &apply, None);

        assert_eq!(registry.get(poisoned).unwrap().last_output(), json!(["a"]));
        assert_eq!(registry.get(healthy).unwrap().last_output(), json!(["a", "b"]));
        assert_eq!(conn.sent().len(), 1);
    }

    #[test]
    fn test_no_subscriptions_is_silent() {
        let (engine, registry) = engine_with_registry();
        engine.apply_patch("orders", &append_b(), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_consecutive_patches_diff_against_latest() {
        let (engine, registry) = engine_with_registry();
        let conn = RecordingConnection::new(1);
        let id = subscribe(&registry, &conn, "todos", json!({}), json!([]));

        engine.apply_patch("todos", &append_b(), None);
        engine.apply_patch("todos", &append_b(), None);

        let sent = conn.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, json!([{"op": "add", "path": "/0", "value": "b"}]));
        assert_eq!(sent[1].1, json!([{"op": "add", "path": "/1", "value": "b"}]));
        assert_eq!(registry.get(id).unwrap().last_output(), json!(["b", "b"]));
    }
}
