use serde_json::{Map, Value};

/// Structural deep merge of `patch` into `target`.
///
/// Objects merge recursively; arrays and scalars replace the target value
/// wholesale. Keys absent from the patch are never removed. The dotted path
/// (under `prefix`) of every written leaf is pushed to `written`.
pub fn deep_merge(
    target: &mut Map<String, Value>,
    patch: &Map<String, Value>,
    prefix: &str,
    written: &mut Vec<String>,
) {
    for (key, incoming) in patch {
        let path = join(prefix, key);
        match (target.get_mut(key), incoming) {
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                deep_merge(existing, nested, &path, written);
            }
            _ => {
                collect_leaves(incoming, &path, written);
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

/// Push the path of every leaf under `value`. An empty object counts as a leaf.
pub fn collect_leaves(value: &Value, path: &str, out: &mut Vec<String>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, nested) in map {
                collect_leaves(nested, &join(path, key), out);
            }
        }
        _ => out.push(path.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn nested_objects_merge_and_keep_untouched_keys() {
        let mut target = obj(json!({
            "owner": {"name": "Dana", "phone": "050"},
            "garage": {"name": "Kiryat"}
        }));
        let mut written = Vec::new();
        deep_merge(
            &mut target,
            &obj(json!({"owner": {"phone": "052"}})),
            "stakeholders",
            &mut written,
        );
        assert_eq!(
            Value::Object(target),
            json!({
                "owner": {"name": "Dana", "phone": "052"},
                "garage": {"name": "Kiryat"}
            })
        );
        assert_eq!(written, vec!["stakeholders.owner.phone".to_string()]);
    }

    #[test]
    fn arrays_and_scalars_replace() {
        let mut target = obj(json!({"images": [1, 2, 3], "km": 1000, "insurance": "legacy"}));
        let mut written = Vec::new();
        deep_merge(
            &mut target,
            &obj(json!({"images": [4], "insurance": {"company": "Harel"}})),
            "",
            &mut written,
        );
        assert_eq!(
            Value::Object(target),
            json!({"images": [4], "km": 1000, "insurance": {"company": "Harel"}})
        );
        written.sort();
        assert_eq!(written, vec!["images", "insurance.company"]);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let original = obj(json!({"a": {"b": 1}}));
        let mut target = original.clone();
        let mut written = Vec::new();
        deep_merge(&mut target, &Map::new(), "meta", &mut written);
        assert_eq!(target, original);
        assert!(written.is_empty());
    }
}
