//! Shape of the wildcard document.
//!
//! The root object holds the category tree under [`TREE`] plus a few metadata
//! fields. A category is an object whose reserved keys are [`INSTRUCTION`],
//! [`ENTRIES`] and [`ID`]; every other object-valued key is a child category.

use crate::path::NodePath;
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

pub const TREE: &str = "wildcards";
pub const SYSTEM_PROMPT: &str = "systemPrompt";
pub const SUGGEST_ITEM_PROMPT: &str = "suggestItemPrompt";
pub const PINNED: &str = "pinnedCategories";

pub const INSTRUCTION: &str = "instruction";
pub const ENTRIES: &str = "wildcards";
pub const ID: &str = "_id";

pub const RESERVED: [&str; 3] = [INSTRUCTION, ENTRIES, ID];

pub fn is_reserved(name: &str) -> bool {
    RESERVED.contains(&name)
}

pub fn tree_path() -> NodePath {
    NodePath::root().child(TREE)
}

pub fn empty_document() -> Value {
    json!({
        TREE: {},
        SYSTEM_PROMPT: "",
        SUGGEST_ITEM_PROMPT: "",
        PINNED: [],
    })
}

/// Fill in missing or mistyped root fields. Returns whether anything changed.
pub fn ensure_shape(document: &mut Value) -> bool {
    if !document.is_object() {
        *document = empty_document();
        return true;
    }
    let mut changed = false;
    if let Value::Object(root) = document {
        changed |= ensure_field(root, TREE, Value::is_object, || json!({}));
        changed |= ensure_field(root, SYSTEM_PROMPT, Value::is_string, || json!(""));
        changed |= ensure_field(root, SUGGEST_ITEM_PROMPT, Value::is_string, || json!(""));
        changed |= ensure_field(root, PINNED, Value::is_array, || json!([]));
    }
    changed
}

fn ensure_field(
    root: &mut Map<String, Value>,
    key: &str,
    valid: fn(&Value) -> bool,
    default: fn() -> Value,
) -> bool {
    match root.get(key) {
        Some(value) if valid(value) => false,
        _ => {
            root.insert(key.to_owned(), default());
            true
        }
    }
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Fresh category with an empty entry list.
pub fn new_category() -> Value {
    json!({ INSTRUCTION: "", ENTRIES: [], ID: new_id() })
}

/// Named child categories of `node`, in insertion order.
pub fn child_categories(node: &Value) -> impl Iterator<Item = (&String, &Value)> {
    node.as_object()
        .into_iter()
        .flat_map(|map| map.iter())
        .filter(|(key, value)| !is_reserved(key) && value.is_object())
}

/// Give every category at or below `node` an id, keeping existing ones.
/// Returns the number of ids assigned.
pub fn assign_category_ids(node: &mut Value) -> usize {
    let Value::Object(map) = node else {
        return 0;
    };
    let mut assigned = 0;
    if !map.get(ID).is_some_and(Value::is_string) {
        map.insert(ID.to_owned(), Value::String(new_id()));
        assigned += 1;
    }
    for (key, child) in map.iter_mut() {
        if !is_reserved(key) && child.is_object() {
            assigned += assign_category_ids(child);
        }
    }
    assigned
}

/// Assign ids throughout a category tree. The tree object itself is a plain
/// container and gets none.
pub fn assign_missing_ids(tree: &mut Value) -> usize {
    let Value::Object(map) = tree else {
        return 0;
    };
    map.iter_mut()
        .filter(|(key, child)| !is_reserved(key) && child.is_object())
        .map(|(_, child)| assign_category_ids(child))
        .sum()
}

/// Visit every category below `tree`, parents before children.
pub fn walk_categories<'a>(tree: &'a Value, visit: &mut dyn FnMut(&NodePath, &'a Value)) {
    fn walk<'a>(node: &'a Value, at: &NodePath, visit: &mut dyn FnMut(&NodePath, &'a Value)) {
        for (name, child) in child_categories(node) {
            let path = at.child(name.as_str());
            visit(&path, child);
            walk(child, &path, visit);
        }
    }
    walk(tree, &NodePath::root(), visit)
}

/// Whether a change at `path` (from the document root) alters the category
/// topology: it lies in the tree and names no reserved field on the way.
pub fn is_structural_path(path: &NodePath) -> bool {
    match path.segments().split_first() {
        Some((first, rest)) => first == TREE && !rest.iter().any(|s| is_reserved(s)),
        None => false,
    }
}

/// Sort the entry list of `node` and of every category below it.
pub fn sort_entries_below(node: &mut Value) {
    let Value::Object(map) = node else {
        return;
    };
    for (key, child) in map.iter_mut() {
        match child {
            Value::Array(entries) if key == ENTRIES => {
                if !entries_sorted(entries) {
                    sort_entries(entries);
                }
            }
            Value::Object(_) if !is_reserved(key) => sort_entries_below(child),
            _ => {}
        }
    }
}

/// Tree-relative paths of categories that carry an entry list, sorted.
pub fn entry_paths(tree: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    walk_categories(tree, &mut |path, node| {
        if node.get(ENTRIES).is_some_and(Value::is_array) {
            paths.push(path.to_string());
        }
    });
    paths.sort();
    paths
}

/// Stable id to tree-relative path for every category that has one.
pub fn index_ids(tree: &Value) -> HashMap<String, NodePath> {
    let mut index = HashMap::new();
    walk_categories(tree, &mut |path, node| {
        if let Some(id) = node.get(ID).and_then(Value::as_str) {
            index.insert(id.to_owned(), path.clone());
        }
    });
    index
}

fn compare_entries(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => entry_text(a).cmp(&entry_text(b)),
    }
}

/// Case-sensitive lexicographic order. Non-string entries sort by their
/// JSON text.
pub fn sort_entries(entries: &mut [Value]) {
    entries.sort_by(compare_entries);
}

pub fn entries_sorted(entries: &[Value]) -> bool {
    entries
        .windows(2)
        .all(|pair| compare_entries(&pair[0], &pair[1]) != Ordering::Greater)
}

fn entry_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Turn loosely nested data into the category shape.
///
/// Arrays become entry lists, scalars single-entry lists, objects categories
/// whose non-reserved keys are normalized recursively. Existing instructions
/// and ids are kept.
pub fn normalize_tree(raw: &Value) -> Value {
    let mut tree = Map::new();
    if let Value::Object(map) = raw {
        for (key, value) in map {
            if !is_reserved(key) {
                tree.insert(key.clone(), normalize_category(value));
            }
        }
    }
    Value::Object(tree)
}

fn normalize_category(raw: &Value) -> Value {
    match raw {
        Value::Object(map) => {
            let mut category = Map::new();
            let instruction = map.get(INSTRUCTION).and_then(Value::as_str).unwrap_or("");
            category.insert(INSTRUCTION.to_owned(), json!(instruction));
            if let Some(id) = map.get(ID).and_then(Value::as_str) {
                category.insert(ID.to_owned(), json!(id));
            }
            if let Some(entries) = map.get(ENTRIES) {
                category.insert(ENTRIES.to_owned(), normalize_entries(entries));
            }
            for (key, value) in map {
                if !is_reserved(key) {
                    category.insert(key.clone(), normalize_category(value));
                }
            }
            Value::Object(category)
        }
        other => json!({ INSTRUCTION: "", ENTRIES: normalize_entries(other) }),
    }
}

fn normalize_entries(raw: &Value) -> Value {
    let mut words: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .filter(|item| !item.is_null() && !item.is_object() && !item.is_array())
            .map(entry_text)
            .collect(),
        Value::Null | Value::Object(_) => Vec::new(),
        scalar => vec![entry_text(scalar)],
    };
    words.retain(|word| !word.trim().is_empty());
    words.sort();
    words.dedup();
    Value::Array(words.into_iter().map(Value::String).collect())
}
