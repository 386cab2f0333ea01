//! Deep observation of a JSON document.
//!
//! [`observe`] wraps a document root in an [`Observed`] view. Nested views are
//! produced on access and carry their path from the root, so nothing is
//! traversed up front. Every write or delete made through any view is
//! reported to a single [`ChangeObserver`] with the full path of the touched
//! key; reads are never reported.

use crate::path::{self, NodePath};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Set,
    Delete,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Object,
    Array,
}

/// A write that went through an observed view.
#[derive(Clone, Debug, PartialEq)]
pub struct Mutation {
    /// Full path of the written key, from the document root.
    pub path: NodePath,
    /// New value; `None` for deletes.
    pub value: Option<Value>,
    /// Value held at `path` before the write.
    pub previous: Option<Value>,
    /// Kind of the container the key lives in.
    pub container: ContainerKind,
    pub operation: Operation,
}

impl Mutation {
    /// Path of the container that was written into.
    pub fn container_path(&self) -> NodePath {
        self.path.parent().unwrap_or_default()
    }
}

pub trait ChangeObserver {
    /// Whether the container at `container` accepts writes. A rejected write
    /// leaves the document untouched and produces no change.
    fn permits(&self, _container: &NodePath) -> bool {
        true
    }

    /// Called after every effective write. `root` is the whole document, so
    /// the observer may adjust it further before returning.
    fn on_change(&mut self, root: &mut Value, mutation: Mutation);
}

impl<O: ChangeObserver + ?Sized> ChangeObserver for &mut O {
    fn permits(&self, container: &NodePath) -> bool {
        (**self).permits(container)
    }

    fn on_change(&mut self, root: &mut Value, mutation: Mutation) {
        (**self).on_change(root, mutation)
    }
}

/// Wrap `root` so that writes through the returned view reach `observer`.
pub fn observe<O: ChangeObserver>(root: &mut Value, observer: O) -> Observed<'_, O> {
    Observed {
        root,
        observer,
        path: NodePath::root(),
    }
}

/// View of one object or array inside an observed document.
pub struct Observed<'a, O: ChangeObserver> {
    root: &'a mut Value,
    observer: O,
    path: NodePath,
}

impl<'a, O: ChangeObserver> Observed<'a, O> {
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    /// Current value behind this view.
    pub fn value(&self) -> Option<&Value> {
        path::resolve(&*self.root, &self.path)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value().and_then(|value| path::child(value, key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Object keys, or element indices for arrays.
    pub fn keys(&self) -> Vec<String> {
        match self.value() {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            Some(Value::Array(items)) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self.value() {
            Some(Value::Object(map)) => map.len(),
            Some(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nested view of the object or array at `key`. Scalars have no view;
    /// read them with [`Observed::get`].
    pub fn child(&mut self, key: &str) -> Option<Observed<'_, &mut O>> {
        if !is_container(self.get(key)?) {
            return None;
        }
        Some(Observed {
            root: &mut *self.root,
            observer: &mut self.observer,
            path: self.path.child(key),
        })
    }

    /// Like [`Observed::child`], but hands the borrow over to the new view.
    pub fn descend(self, key: &str) -> Option<Observed<'a, O>> {
        if !is_container(self.get(key)?) {
            return None;
        }
        let path = self.path.child(key);
        Some(Observed {
            root: self.root,
            observer: self.observer,
            path,
        })
    }

    pub fn descend_path(self, relative: &NodePath) -> Option<Observed<'a, O>> {
        relative
            .segments()
            .iter()
            .try_fold(self, |view, segment| view.descend(segment))
    }

    /// Write `value` under `key`.
    ///
    /// Returns `false` when the write is rejected: the container refuses
    /// writes, the view is not over an object or array, or `key` is not an
    /// index at most one past the end of an array. Writing a value equal to
    /// the current one succeeds without a change being reported.
    pub fn set(&mut self, key: &str, value: Value) -> bool {
        if !self.observer.permits(&self.path) {
            return false;
        }
        let Some(container) = path::resolve_mut(&mut *self.root, &self.path) else {
            return false;
        };
        let (previous, kind) = match container {
            Value::Object(map) => {
                if map.get(key) == Some(&value) {
                    return true;
                }
                (map.insert(key.to_owned(), value.clone()), ContainerKind::Object)
            }
            Value::Array(items) => {
                let Ok(index) = key.parse::<usize>() else {
                    return false;
                };
                if index < items.len() {
                    if items[index] == value {
                        return true;
                    }
                    let previous = std::mem::replace(&mut items[index], value.clone());
                    (Some(previous), ContainerKind::Array)
                } else if index == items.len() {
                    items.push(value.clone());
                    (None, ContainerKind::Array)
                } else {
                    return false;
                }
            }
            _ => return false,
        };
        let mutation = Mutation {
            path: self.path.child(key),
            value: Some(value),
            previous,
            container: kind,
            operation: Operation::Set,
        };
        self.observer.on_change(&mut *self.root, mutation);
        true
    }

    /// Append to the array behind this view.
    pub fn push(&mut self, value: Value) -> bool {
        let index = match self.value() {
            Some(Value::Array(items)) => items.len(),
            _ => return false,
        };
        self.set(&index.to_string(), value)
    }

    /// Remove `key`. Array elements are spliced out. Returns `false` when the
    /// container refuses writes or there is nothing to delete.
    pub fn delete(&mut self, key: &str) -> bool {
        if !self.observer.permits(&self.path) {
            return false;
        }
        let Some(container) = path::resolve_mut(&mut *self.root, &self.path) else {
            return false;
        };
        let (previous, kind) = match container {
            Value::Object(map) => match map.shift_remove(key) {
                Some(previous) => (previous, ContainerKind::Object),
                None => return false,
            },
            Value::Array(items) => match key.parse::<usize>() {
                Ok(index) if index < items.len() => (items.remove(index), ContainerKind::Array),
                _ => return false,
            },
            _ => return false,
        };
        let mutation = Mutation {
            path: self.path.child(key),
            value: None,
            previous: Some(previous),
            container: kind,
            operation: Operation::Delete,
        };
        self.observer.on_change(&mut *self.root, mutation);
        true
    }
}

fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Recorder {
        seen: Vec<Mutation>,
        frozen: HashSet<NodePath>,
    }

    impl ChangeObserver for Recorder {
        fn permits(&self, container: &NodePath) -> bool {
            !self.frozen.contains(container)
        }

        fn on_change(&mut self, _root: &mut Value, mutation: Mutation) {
            self.seen.push(mutation);
        }
    }

    #[test]
    fn nested_write_reports_full_path() {
        let mut doc = json!({ "wildcards": { "A": { "instruction": "", "wildcards": [] } } });
        let mut recorder = Recorder::default();
        {
            let mut root = observe(&mut doc, &mut recorder);
            let mut a = root.child("wildcards").unwrap().descend("A").unwrap();
            assert!(a.set("instruction", json!("be brief")));
        }
        assert_eq!(recorder.seen.len(), 1);
        let seen = &recorder.seen[0];
        assert_eq!(seen.path.to_string(), "wildcards/A/instruction");
        assert_eq!(seen.previous, Some(json!("")));
        assert_eq!(seen.value, Some(json!("be brief")));
        assert_eq!(seen.container, ContainerKind::Object);
        assert_eq!(seen.operation, Operation::Set);
        assert_eq!(doc["wildcards"]["A"]["instruction"], "be brief");
    }

    #[test]
    fn reads_and_identical_writes_are_silent() {
        let mut doc = json!({ "a": { "b": 1 } });
        let mut recorder = Recorder::default();
        {
            let mut root = observe(&mut doc, &mut recorder);
            assert_eq!(root.get("a"), Some(&json!({ "b": 1 })));
            let mut a = root.child("a").unwrap();
            assert_eq!(a.keys(), vec!["b".to_string()]);
            assert!(a.set("b", json!(1)));
        }
        assert!(recorder.seen.is_empty());
    }

    #[test]
    fn scalars_have_no_view() {
        let mut doc = json!({ "a": 1, "b": [1, 2] });
        let mut root = observe(&mut doc, Recorder::default());
        assert!(root.child("a").is_none());
        assert!(root.child("missing").is_none());
        assert!(root.child("b").is_some());
    }

    #[test]
    fn array_push_and_delete() {
        let mut doc = json!({ "list": ["x"] });
        let mut recorder = Recorder::default();
        {
            let mut root = observe(&mut doc, &mut recorder);
            let mut list = root.child("list").unwrap();
            assert!(list.push(json!("y")));
            assert!(!list.set("5", json!("gap")));
            assert!(list.delete("0"));
            assert!(!list.delete("3"));
        }
        assert_eq!(doc["list"], json!(["y"]));
        let paths: Vec<String> = recorder.seen.iter().map(|m| m.path.to_string()).collect();
        assert_eq!(paths, ["list/1", "list/0"]);
        assert_eq!(recorder.seen[1].operation, Operation::Delete);
        assert_eq!(recorder.seen[1].previous, Some(json!("x")));
    }

    #[test]
    fn delete_missing_key_is_not_a_change() {
        let mut doc = json!({ "a": 1 });
        let mut recorder = Recorder::default();
        assert!(!observe(&mut doc, &mut recorder).delete("b"));
        assert!(recorder.seen.is_empty());
    }

    #[test]
    fn frozen_container_rejects_writes() {
        let mut doc = json!({ "locked": { "k": 1 } });
        let mut recorder = Recorder::default();
        recorder.frozen.insert(NodePath::parse("locked"));
        {
            let mut root = observe(&mut doc, &mut recorder);
            let mut locked = root.child("locked").unwrap();
            assert!(!locked.set("k", json!(2)));
            assert!(!locked.set("new", json!(true)));
            assert!(!locked.delete("k"));
        }
        assert!(recorder.seen.is_empty());
        assert_eq!(doc, json!({ "locked": { "k": 1 } }));
    }

    #[test]
    fn descend_path_follows_segments() {
        let mut doc = json!({ "a": { "b": { "c": {} } } });
        let root = observe(&mut doc, Recorder::default());
        let view = root.descend_path(&NodePath::parse("a/b/c")).unwrap();
        assert_eq!(view.path().to_string(), "a/b/c");
        assert!(view.is_empty());
    }
}
