//! Structural diff between two document snapshots.
//!
//! Objects are compared key by key and recursed into. Arrays are compared as
//! whole values: a changed array yields one `Modify` for the array itself,
//! never per-element changes. Undo and redo restore full snapshots, so the
//! diff only has to tell observers what to re-render.

use crate::path::NodePath;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Add,
    Remove,
    Modify,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub path: NodePath,
    pub kind: ChangeKind,
    /// Value in the newer snapshot; `None` for removals.
    pub value: Option<Value>,
    /// Value in the older snapshot; `None` for additions.
    pub old_value: Option<Value>,
}

/// Changes turning `old` into `new`. Output order follows `old`'s keys, then
/// keys only present in `new`, so identical inputs give identical output.
pub fn diff(old: &Value, new: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_at(old, new, &NodePath::root(), &mut changes);
    changes
}

fn diff_at(old: &Value, new: &Value, path: &NodePath, out: &mut Vec<Change>) {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            diff_objects(old_map, new_map, path, out)
        }
        _ if old != new => out.push(Change {
            path: path.clone(),
            kind: ChangeKind::Modify,
            value: Some(new.clone()),
            old_value: Some(old.clone()),
        }),
        _ => {}
    }
}

fn diff_objects(
    old: &Map<String, Value>,
    new: &Map<String, Value>,
    path: &NodePath,
    out: &mut Vec<Change>,
) {
    for (key, old_value) in old {
        let child = path.child(key.as_str());
        match new.get(key) {
            None => out.push(Change {
                path: child,
                kind: ChangeKind::Remove,
                value: None,
                old_value: Some(old_value.clone()),
            }),
            Some(new_value) => diff_at(old_value, new_value, &child, out),
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            out.push(Change {
                path: path.child(key.as_str()),
                kind: ChangeKind::Add,
                value: Some(new_value.clone()),
                old_value: None,
            });
        }
    }
}
