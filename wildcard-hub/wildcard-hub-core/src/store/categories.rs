//! Category editing on top of the observed root. Every operation runs as a
//! single batch, so it is one undo step.

use super::WildcardStore;
use crate::document::{self, ENTRIES, INSTRUCTION, PINNED};
use crate::observe::ChangeObserver;
use crate::path::{self, NodePath, SEPARATOR};
use serde_json::{json, Value};

fn valid_name(name: &str) -> bool {
    !name.trim().is_empty() && !name.contains(SEPARATOR) && !document::is_reserved(name)
}

fn category_path(path: &str) -> Option<NodePath> {
    let path = NodePath::parse(path);
    if path.is_empty() || path.segments().iter().any(|s| document::is_reserved(s)) {
        return None;
    }
    Some(path)
}

/// `pinned` re-rooted from `from` to `to` when it lies at or below `from`.
fn rebase(pinned: &str, from: &NodePath, to: &NodePath) -> Option<String> {
    NodePath::parse(pinned)
        .strip_prefix(from)
        .map(|rest| to.join(&rest).to_string())
}

impl WildcardStore {
    fn is_category(&self, path: &NodePath) -> bool {
        self.get_by_path(&path.to_string())
            .is_some_and(Value::is_object)
    }

    /// Create the category at `path` along with any missing ancestors.
    pub fn create_category(&mut self, path: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        if self.get_by_path(&path.to_string()).is_some() {
            return false;
        }
        self.batch(|store| {
            let Some(mut view) = store.tree_view() else {
                return false;
            };
            for segment in path.segments() {
                if !view.contains(segment) && !view.set(segment, document::new_category()) {
                    return false;
                }
                view = match view.descend(segment) {
                    Some(next) => next,
                    None => return false,
                };
            }
            true
        })
    }

    pub fn delete_category(&mut self, path: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        if !self.is_category(&path) {
            return false;
        }
        self.batch(|store| {
            let parent = path.parent().unwrap_or_default();
            let Some(name) = path.last() else {
                return false;
            };
            let deleted = store
                .category_view(&parent)
                .is_some_and(|mut view| view.delete(name));
            if deleted {
                store.rewrite_pins(|pinned| {
                    if NodePath::parse(pinned).starts_with(&path) {
                        None
                    } else {
                        Some(pinned.to_owned())
                    }
                });
            }
            deleted
        })
    }

    /// Give the category at `path` a new name under the same parent. The id
    /// travels with the node.
    pub fn rename_category(&mut self, path: &str, new_name: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        let new_name = new_name.trim();
        if !valid_name(new_name) || !self.is_category(&path) {
            return false;
        }
        let parent = path.parent().unwrap_or_default();
        self.relocate(&path, &parent, new_name)
    }

    /// Re-parent the category at `path` under `new_parent` (empty for top
    /// level), keeping its name and id.
    pub fn move_category(&mut self, path: &str, new_parent: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        let new_parent = NodePath::parse(new_parent);
        if !self.is_category(&path) || new_parent.starts_with(&path) {
            return false;
        }
        if !new_parent.is_empty() && !self.is_category(&new_parent) {
            return false;
        }
        let Some(name) = path.last().map(str::to_owned) else {
            return false;
        };
        self.relocate(&path, &new_parent, &name)
    }

    fn relocate(&mut self, from: &NodePath, parent: &NodePath, name: &str) -> bool {
        let to = parent.child(name);
        if self.get_by_path(&to.to_string()).is_some() {
            return false;
        }
        let Some(node) = self.get_by_path(&from.to_string()).cloned() else {
            return false;
        };
        let old_parent = from.parent().unwrap_or_default();
        let Some(old_name) = from.last().map(str::to_owned) else {
            return false;
        };
        let tree = document::tree_path();
        let writable = [parent, &old_parent]
            .iter()
            .all(|container| self.pipeline.permits(&tree.join(container)));
        if !writable {
            return false;
        }
        self.batch(|store| {
            let inserted = store
                .category_view(parent)
                .is_some_and(|mut view| view.set(name, node));
            if !inserted {
                return false;
            }
            let removed = store
                .category_view(&old_parent)
                .is_some_and(|mut view| view.delete(&old_name));
            if !removed {
                // Never leave two nodes sharing one id.
                if let Some(mut view) = store.category_view(parent) {
                    view.delete(name);
                }
                return false;
            }
            store.rewrite_pins(|pinned| {
                Some(rebase(pinned, from, &to).unwrap_or_else(|| pinned.to_owned()))
            });
            true
        })
    }

    pub fn set_instruction(&mut self, path: &str, text: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        self.batch(|store| {
            store
                .category_view(&path)
                .is_some_and(|mut view| view.set(INSTRUCTION, json!(text)))
        })
    }

    /// Add `word` to the entry list at `path`, creating the list on a pure
    /// container. Blank and duplicate words are ignored.
    pub fn add_wildcard(&mut self, path: &str, word: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        let word = word.trim();
        if word.is_empty() {
            return false;
        }
        self.batch(|store| {
            let Some(mut view) = store.category_view(&path) else {
                return false;
            };
            let duplicate = match view.get(ENTRIES) {
                Some(Value::Array(entries)) => {
                    Some(entries.iter().any(|e| e.as_str() == Some(word)))
                }
                _ => None,
            };
            match duplicate {
                Some(true) => false,
                Some(false) => view
                    .descend(ENTRIES)
                    .is_some_and(|mut list| list.push(json!(word))),
                None => view.set(ENTRIES, json!([word])),
            }
        })
    }

    /// Remove every listed word from the entry list at `path`. Returns how
    /// many entries were removed.
    pub fn remove_wildcards(&mut self, path: &str, words: &[&str]) -> usize {
        let Some(path) = category_path(path) else {
            return 0;
        };
        let list_path = path.child(ENTRIES);
        self.batch(|store| {
            let Some(mut list) = store.category_view(&list_path) else {
                return 0;
            };
            let doomed: Vec<usize> = match list.value() {
                Some(Value::Array(entries)) => entries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| e.as_str().is_some_and(|w| words.contains(&w)))
                    .map(|(i, _)| i)
                    .collect(),
                _ => return 0,
            };
            doomed
                .into_iter()
                .rev()
                .filter(|index| list.delete(&index.to_string()))
                .count()
        })
    }

    /// Tree-relative paths of every category with an entry list, sorted.
    pub fn entry_paths(&self) -> Vec<String> {
        document::entry_paths(self.tree())
    }

    /// Names of the categories sharing a parent with `path`, `path` included.
    pub fn sibling_names(&self, path: &str) -> Vec<String> {
        let parent = NodePath::parse(path).parent().unwrap_or_default();
        match path::resolve(self.tree(), &parent) {
            Some(container) => document::child_categories(container)
                .map(|(name, _)| name.clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Entry-list paths containing `term`, ignoring case.
    pub fn search_paths(&self, term: &str) -> Vec<String> {
        let term = term.to_lowercase();
        self.entry_paths()
            .into_iter()
            .filter(|path| path.to_lowercase().contains(&term))
            .collect()
    }

    pub fn pinned_paths(&self) -> Vec<String> {
        self.document[PINNED]
            .as_array()
            .map(|pins| {
                pins.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn pin(&mut self, path: &str) -> bool {
        let Some(path) = category_path(path) else {
            return false;
        };
        let key = path.to_string();
        if !self.is_category(&path) || self.pinned_paths().contains(&key) {
            return false;
        }
        self.batch(|store| {
            store
                .root()
                .descend(PINNED)
                .is_some_and(|mut pins| pins.push(json!(key)))
        })
    }

    pub fn unpin(&mut self, path: &str) -> bool {
        let path = NodePath::parse(path).to_string();
        let Some(index) = self.document[PINNED]
            .as_array()
            .and_then(|pins| pins.iter().position(|p| p.as_str() == Some(path.as_str())))
        else {
            return false;
        };
        self.batch(|store| {
            store
                .root()
                .descend(PINNED)
                .is_some_and(|mut pins| pins.delete(&index.to_string()))
        })
    }

    /// Replace each pinned path with `f(path)`, dropping it on `None`.
    fn rewrite_pins(&mut self, f: impl Fn(&str) -> Option<String>) {
        let current: Vec<Value> = match self.document[PINNED].as_array() {
            Some(pins) => pins.clone(),
            None => return,
        };
        let mut rewritten: Vec<Value> = current
            .iter()
            .filter_map(|pin| match pin.as_str() {
                Some(pinned) => f(pinned).map(Value::String),
                None => Some(pin.clone()),
            })
            .collect();
        rewritten.dedup();
        if rewritten != current {
            self.root().set(PINNED, Value::Array(rewritten));
        }
    }
}
