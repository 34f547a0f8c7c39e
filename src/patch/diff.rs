//! Structural diff: generate a JSON Patch transforming one value into another.

use serde_json::{Map, Value};

use super::types::{escape, PatchOp};

/// The diff collaborator contract.
///
/// Implementations must be deterministic and must return an empty patch iff
/// the two values are structurally equal. The round-trip law is tested in
/// this module: applying the patch to `old` yields `new`.
pub trait Differ: Send + Sync {
    fn diff(&self, old: &Value, new: &Value) -> Vec<PatchOp>;
}

/// Default differ backed by [`diff`].
#[derive(Clone, Copy, Debug, Default)]
pub struct StructuralDiff;

impl Differ for StructuralDiff {
    fn diff(&self, old: &Value, new: &Value) -> Vec<PatchOp> {
        diff(old, new)
    }
}

/// Generate an ordered list of patch operations that transforms `old` into
/// `new`. Returns an empty list iff the two values are structurally equal.
pub fn diff(old: &Value, new: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at(&mut ops, "", old, new);
    ops
}

fn diff_at(ops: &mut Vec<PatchOp>, path: &str, old: &Value, new: &Value) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(o), Value::Object(n)) => diff_object(ops, path, o, n),
        (Value::Array(o), Value::Array(n)) => diff_array(ops, path, o, n),
        _ => ops.push(PatchOp::Replace {
            path: path.to_string(),
            value: new.clone(),
        }),
    }
}

fn diff_object(ops: &mut Vec<PatchOp>, path: &str, old: &Map<String, Value>, new: &Map<String, Value>) {
    // Keys dropped from the new value
    for key in old.keys() {
        if !new.contains_key(key) {
            ops.push(PatchOp::Remove {
                path: format!("{}/{}", path, escape(key)),
            });
        }
    }
    // New and surviving keys
    for (key, new_val) in new {
        let child = format!("{}/{}", path, escape(key));
        match old.get(key) {
            None => ops.push(PatchOp::Add {
                path: child,
                value: new_val.clone(),
            }),
            Some(old_val) => diff_at(ops, &child, old_val, new_val),
        }
    }
}

/// Array diff: trim the common prefix and suffix, recurse pairwise over the
/// overlapping middle, then emit trailing adds (or repeated removes at the
/// same index, since each removal shifts the remainder left).
fn diff_array(ops: &mut Vec<PatchOp>, path: &str, old: &[Value], new: &[Value]) {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = (1..=max_suffix)
        .take_while(|&i| old[old.len() - i] == new[new.len() - i])
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];
    let overlap = old_mid.len().min(new_mid.len());

    for i in 0..overlap {
        let child = format!("{}/{}", path, prefix + i);
        diff_at(ops, &child, &old_mid[i], &new_mid[i]);
    }
    for (i, value) in new_mid.iter().enumerate().skip(overlap) {
        ops.push(PatchOp::Add {
            path: format!("{}/{}", path, prefix + i),
            value: value.clone(),
        });
    }
    for _ in overlap..old_mid.len() {
        ops.push(PatchOp::Remove {
            path: format!("{}/{}", path, prefix + overlap),
        });
    }
}
