use crate::config::StoreConfig;
use crate::document::{self, ENTRIES, ID, TREE};
use crate::events::{ChangeEvent, EventBus};
use crate::history::History;
use crate::observe::{ChangeObserver, ContainerKind, Mutation, Operation};
use crate::path::{self, NodePath};
use crate::storage::{Persistence, SaveOutcome};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Reacts to every write made through the store's observed root: keeps
/// entry lists sorted, gives new categories ids, tracks the structural
/// version, persists and checkpoints, then publishes the change.
pub struct ChangePipeline {
    pub(crate) config: StoreConfig,
    pub(crate) history: History,
    pub(crate) persistence: Persistence,
    pub(crate) events: EventBus,
    pub(crate) structural_version: u64,
    /// Set while undo/redo or a reset swaps the document in.
    pub(crate) replaying: bool,
    pub(crate) batch_depth: usize,
    pub(crate) frozen: HashSet<NodePath>,
    pub(crate) ids: HashMap<String, NodePath>,
}

impl ChangePipeline {
    pub(crate) fn new(
        config: StoreConfig,
        persistence: Persistence,
        history: History,
        structural_version: u64,
        document: &Value,
    ) -> Self {
        let events = EventBus::new(config.event_capacity);
        let mut pipeline = Self {
            config,
            history,
            persistence,
            events,
            structural_version,
            replaying: false,
            batch_depth: 0,
            frozen: HashSet::new(),
            ids: HashMap::new(),
        };
        pipeline.reindex(document);
        pipeline
    }

    /// Checkpoint `document` and persist the history if it was pushed.
    pub(crate) fn checkpoint(&mut self, document: &Value) -> bool {
        let pushed = self.history.checkpoint(document.to_string());
        if pushed {
            self.save_history();
        }
        pushed
    }

    pub(crate) fn save_history(&mut self) -> SaveOutcome {
        self.persistence.save_history(self.history.log_mut())
    }

    pub(crate) fn bump_structural_version(&mut self) {
        self.structural_version += 1;
        self.persistence
            .save_structure_version(self.structural_version);
    }

    pub(crate) fn reindex(&mut self, document: &Value) {
        self.ids = document::index_ids(&document[TREE]);
    }
}

impl ChangeObserver for ChangePipeline {
    fn permits(&self, container: &NodePath) -> bool {
        !self.frozen.contains(container)
    }

    fn on_change(&mut self, root: &mut Value, mutation: Mutation) {
        if let Some(relative) = mutation.path.strip_prefix(&document::tree_path()) {
            if let Some(list) = entry_list_path(&mutation, &relative) {
                if let Some(Value::Array(entries)) = path::resolve_mut(root, &list) {
                    if !document::entries_sorted(entries) {
                        document::sort_entries(entries);
                    }
                }
            }
            if mutation.operation == Operation::Set {
                adopt_categories(root, &mutation, &relative);
            }
        }

        let structural = document::is_structural_path(&mutation.path);
        if structural {
            self.bump_structural_version();
        }
        if structural || mutation.path.last() == Some(ID) {
            self.reindex(root);
        }

        if !self.replaying {
            self.persistence.save_document(root);
            if self.batch_depth == 0 {
                self.checkpoint(root);
            }
        }

        tracing::trace!(path = %mutation.path, operation = ?mutation.operation, structural, "document changed");
        self.events.send_change(ChangeEvent::Mutation {
            path: mutation.path,
            value: mutation.value,
            operation: mutation.operation,
        });
    }
}

/// Full path of the entry list touched by `mutation`, if any: either an
/// element of a `wildcards` array or the array itself.
fn entry_list_path(mutation: &Mutation, relative: &NodePath) -> Option<NodePath> {
    if mutation.container == ContainerKind::Array
        && relative.len() >= 3
        && relative.second_to_last() == Some(ENTRIES)
    {
        return Some(mutation.container_path());
    }
    let whole_list = relative.len() >= 2
        && relative.last() == Some(ENTRIES)
        && mutation.value.as_ref().is_some_and(Value::is_array);
    whole_list.then(|| mutation.path.clone())
}

/// Categories written into the tree get ids and sorted entry lists.
fn adopt_categories(root: &mut Value, mutation: &Mutation, relative: &NodePath) {
    if !mutation.value.as_ref().is_some_and(Value::is_object)
        || relative.segments().iter().any(|s| document::is_reserved(s))
    {
        return;
    }
    let Some(node) = path::resolve_mut(root, &mutation.path) else {
        return;
    };
    let assigned = if relative.is_empty() {
        document::assign_missing_ids(node)
    } else {
        document::assign_category_ids(node)
    };
    if assigned > 0 {
        tracing::debug!(path = %mutation.path, assigned, "assigned category ids");
    }
    document::sort_entries_below(node);
}
