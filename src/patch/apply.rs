//! Apply a JSON Patch to a document.

use serde_json::Value;

use super::types::{parse_pointer, PatchError, PatchOp};

/// Apply `ops` to `doc` in order, producing the patched document.
///
/// The input document is not modified; a failed op leaves no partial result
/// in the caller's hands.
pub fn apply(doc: &Value, ops: &[PatchOp]) -> Result<Value, PatchError> {
    let mut out = doc.clone();
    for op in ops {
        apply_op(&mut out, op)?;
    }
    Ok(out)
}

fn apply_op(doc: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Add { path, value } => add(doc, path, value.clone()),
        PatchOp::Remove { path } => remove(doc, path).map(|_| ()),
        PatchOp::Replace { path, value } => {
            let target = resolve_mut(doc, path)?;
            *target = value.clone();
            Ok(())
        }
        PatchOp::Move { path, from } => {
            let value = remove(doc, from)?;
            add(doc, path, value)
        }
        PatchOp::Copy { path, from } => {
            let value = resolve(doc, from)?.clone();
            add(doc, path, value)
        }
        PatchOp::Test { path, value } => {
            if resolve(doc, path)? == value {
                Ok(())
            } else {
                Err(PatchError::TestFailed(path.clone()))
            }
        }
    }
}

/// Walk the full pointer, immutably.
fn resolve<'a>(doc: &'a Value, path: &str) -> Result<&'a Value, PatchError> {
    let mut current = doc;
    for token in parse_pointer(path)? {
        current = match current {
            Value::Object(map) => map
                .get(&token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let idx = parse_index(&token, path)?;
                items
                    .get(idx)
                    .ok_or_else(|| PatchError::OutOfBounds(path.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(path.to_string())),
        };
    }
    Ok(current)
}

/// Walk the full pointer, mutably. Every step must already exist.
fn resolve_mut<'a>(doc: &'a mut Value, path: &str) -> Result<&'a mut Value, PatchError> {
    let tokens = parse_pointer(path)?;
    resolve_tokens_mut(doc, &tokens, path)
}

fn add(doc: &mut Value, path: &str, value: Value) -> Result<(), PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        *doc = value;
        return Ok(());
    };
    let parent = resolve_tokens_mut(doc, parent_tokens, path)?;
    match parent {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            if last == "-" {
                items.push(value);
                return Ok(());
            }
            let idx = parse_index(last, path)?;
            if idx > items.len() {
                return Err(PatchError::OutOfBounds(path.to_string()));
            }
            items.insert(idx, value);
            Ok(())
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn remove(doc: &mut Value, path: &str) -> Result<Value, PatchError> {
    let tokens = parse_pointer(path)?;
    let Some((last, parent_tokens)) = tokens.split_last() else {
        return Ok(std::mem::take(doc));
    };
    let parent = resolve_tokens_mut(doc, parent_tokens, path)?;
    match parent {
        Value::Object(map) => map
            .remove(last)
            .ok_or_else(|| PatchError::PathNotFound(path.to_string())),
        Value::Array(items) => {
            let idx = parse_index(last, path)?;
            if idx >= items.len() {
                return Err(PatchError::OutOfBounds(path.to_string()));
            }
            Ok(items.remove(idx))
        }
        _ => Err(PatchError::PathNotFound(path.to_string())),
    }
}

fn resolve_tokens_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
    path: &str,
) -> Result<&'a mut Value, PatchError> {
    let mut current = doc;
    for token in tokens {
        current = match current {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| PatchError::PathNotFound(path.to_string()))?,
            Value::Array(items) => {
                let idx = parse_index(token, path)?;
                items
                    .get_mut(idx)
                    .ok_or_else(|| PatchError::OutOfBounds(path.to_string()))?
            }
            _ => return Err(PatchError::PathNotFound(path.to_string())),
        };
    }
    Ok(current)
}

fn parse_index(token: &str, path: &str) -> Result<usize, PatchError> {
    // RFC 6901 forbids leading zeros
    if token.len() > 1 && token.starts_with('0') {
        return Err(PatchError::InvalidPointer(path.to_string()));
    }
    token
        .parse()
        .map_err(|_| PatchError::InvalidPointer(path.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_to_object_and_array() {
        let doc = json!({"items": ["a", "c"]});
        let ops = vec![
            PatchOp::Add { path: "/items/1".into(), value: json!("b") },
            PatchOp::Add { path: "/items/-".into(), value: json!("d") },
            PatchOp::Add { path: "/count".into(), value: json!(4) },
        ];
        assert_eq!(
            apply(&doc, &ops).unwrap(),
            json!({"items": ["a", "b", "c", "d"], "count": 4})
        );
    }

    #[test]
    fn test_remove_and_replace() {
        let doc = json!({"a": 1, "b": [1, 2, 3]});
        let ops = vec![
            PatchOp::Remove { path: "/b/0".into() },
            PatchOp::Replace { path: "/a".into(), value: json!(9) },
        ];
        assert_eq!(apply(&doc, &ops).unwrap(), json!({"a": 9, "b": [2, 3]}));
    }

    #[test]
    fn test_move_and_copy() {
        let doc = json!({"a": {"x": 1}, "b": {}});
        let ops = vec![
            PatchOp::Copy { path: "/b/y".into(), from: "/a/x".into() },
            PatchOp::Move { path: "/b/x".into(), from: "/a/x".into() },
        ];
        assert_eq!(
            apply(&doc, &ops).unwrap(),
            json!({"a": {}, "b": {"x": 1, "y": 1}})
        );
    }

    #[test]
    fn test_test_op() {
        let doc = json!({"a": 1});
        let ok = vec![PatchOp::Test { path: "/a".into(), value: json!(1) }];
        assert!(apply(&doc, &ok).is_ok());

        let bad = vec![PatchOp::Test { path: "/a".into(), value: json!(2) }];
        assert!(matches!(apply(&doc, &bad), Err(PatchError::TestFailed(_))));
    }

    #[test]
    fn test_whole_document_replace() {
        let doc = json!({"a": 1});
        let ops = vec![PatchOp::Replace { path: "".into(), value: json!([1, 2]) }];
        assert_eq!(apply(&doc, &ops).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_missing_paths_error() {
        let doc = json!({"a": [1]});
        assert!(matches!(
            apply(&doc, &[PatchOp::Remove { path: "/b".into() }]),
            Err(PatchError::PathNotFound(_))
        ));
        assert!(matches!(
            apply(&doc, &[PatchOp::Remove { path: "/a/5".into() }]),
            Err(PatchError::OutOfBounds(_))
        ));
        assert!(matches!(
            apply(&doc, &[PatchOp::Add { path: "/a/01".into(), value: json!(0) }]),
            Err(PatchError::InvalidPointer(_))
        ));
    }

    #[test]
    fn test_failed_op_leaves_input_untouched() {
        let doc = json!({"a": 1});
        let ops = vec![
            PatchOp::Replace { path: "/a".into(), value: json!(2) },
            PatchOp::Remove { path: "/missing".into() },
        ];
        assert!(apply(&doc, &ops).is_err());
        assert_eq!(doc, json!({"a": 1}));
    }
}
