use crate::domain::Payload;
use serde_json::{Map, Value, json};
use std::collections::HashMap;

/// Key of the marker object that replaces a repeated reference.
pub const REF_KEY: &str = "$ref";

/// Converts a payload graph into a finite JSON tree.
///
/// The walk is a depth-first search that remembers every container it has
/// entered. Reaching a container a second time, whether through a cycle or a
/// shared branch, emits `{"$ref": "<path of first visit>"}` instead of
/// descending again, so each container is rendered once and the output stays
/// linear in the size of the graph. `Undefined` object entries are dropped and
/// `Undefined` array items become `null`.
pub fn decycle(payload: &Payload) -> Value {
    let mut seen = Seen::default();
    walk(payload, "$".to_string(), &mut seen)
}

/// First-visit path per container. The handles are kept so a container
/// address cannot be reused by another one during the walk.
#[derive(Default)]
struct Seen {
    paths: HashMap<usize, String>,
    retained: Vec<Payload>,
}

fn walk(payload: &Payload, path: String, seen: &mut Seen) -> Value {
    let Some(id) = payload.container_id() else {
        return match payload {
            Payload::Bool(b) => Value::Bool(*b),
            Payload::Number(n) => Value::Number(n.clone()),
            Payload::String(s) => Value::String(s.clone()),
            _ => Value::Null,
        };
    };

    if let Some(first_path) = seen.paths.get(&id) {
        return json!({ REF_KEY: first_path });
    }
    seen.paths.insert(id, path.clone());
    seen.retained.push(payload.clone());

    match payload {
        Payload::Array(items) => {
            // Snapshot so no lock is held while descending.
            let snapshot: Vec<Payload> = items.read().clone();
            let out = snapshot
                .iter()
                .enumerate()
                .map(|(index, item)| walk(item, format!("{path}[{index}]"), seen))
                .collect();
            Value::Array(out)
        }
        Payload::Object(map) => {
            let snapshot: Vec<(String, Payload)> = map
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let mut out = Map::new();
            for (key, value) in &snapshot {
                if value.is_undefined() {
                    continue;
                }
                let child_path = format!("{path}[{}]", Value::String(key.clone()));
                out.insert(key.clone(), walk(value, child_path, seen));
            }
            Value::Object(out)
        }
        _ => Value::Null,
    }
}
