//! The wildcard store: one document, observed at every depth.
//!
//! All mutation goes through [`WildcardStore::root`], whose writes run the
//! [`ChangePipeline`]. The store owns the authoritative document; the
//! observed root is a short-lived view rebuilt on every call.

mod categories;
mod pipeline;

pub use pipeline::ChangePipeline;

use crate::bootstrap::{self, Bootstrap, EmptyBootstrap};
use crate::config::StoreConfig;
use crate::document::{self, ID, TREE};
use crate::events::{ChangeEvent, ResetEvent};
use crate::history::{History, HistoryLog};
use crate::observe::{observe, Observed};
use crate::path::{self, NodePath};
use crate::storage::{KeyValueBackend, MemoryBackend, Persistence};
use serde_json::Value;
use tokio::sync::broadcast;

/// Observed view handed out by [`WildcardStore::root`].
pub type ObservedRoot<'a> = Observed<'a, &'a mut ChangePipeline>;

pub struct WildcardStore {
    pub(crate) document: Value,
    pub(crate) pipeline: ChangePipeline,
}

/// Bring a document into the shape the store relies on: root fields present,
/// entry lists sorted, every category carrying an id.
pub(crate) fn prepare_document(document: &mut Value) {
    document::ensure_shape(document);
    let tree = &mut document[TREE];
    document::sort_entries_below(tree);
    let assigned = document::assign_missing_ids(tree);
    if assigned > 0 {
        tracing::debug!(assigned, "assigned missing category ids");
    }
}

fn is_blank(document: &Value) -> bool {
    match document {
        Value::Object(map) => map.is_empty(),
        _ => true,
    }
}

impl WildcardStore {
    /// Open the store persisted in `backend`, or build one from `bootstrap`
    /// when nothing usable is stored.
    pub fn open(
        config: StoreConfig,
        backend: impl KeyValueBackend + 'static,
        bootstrap: &dyn Bootstrap,
    ) -> Self {
        let persistence = Persistence::new(backend, &config.key_prefix);

        let mut document = match persistence.load_document() {
            Some(document) if !is_blank(&document) => document,
            _ => {
                tracing::info!("no persisted document, bootstrapping");
                bootstrap::load_or_empty(bootstrap)
            }
        };
        prepare_document(&mut document);

        let structural_version = persistence.load_structure_version().unwrap_or(0);
        let history = match persistence.load_history::<HistoryLog>() {
            Some(log) => History::from_log(log, config.history_limit),
            None => History::new(config.history_limit),
        };

        let mut pipeline =
            ChangePipeline::new(config, persistence, history, structural_version, &document);
        pipeline.persistence.save_document(&document);
        if !pipeline.checkpoint(&document) {
            pipeline.save_history();
        }
        tracing::debug!(
            history = pipeline.history.len(),
            version = structural_version,
            "store opened"
        );

        Self { document, pipeline }
    }

    /// Store backed by memory only, starting empty.
    pub fn in_memory(config: StoreConfig) -> Self {
        Self::open(config, MemoryBackend::new(), &EmptyBootstrap)
    }

    /// Store backed by memory only, starting from `document`: a full root
    /// document or a loose category tree.
    pub fn with_document(config: StoreConfig, document: Value) -> Self {
        struct Given(Value);

        impl Bootstrap for Given {
            fn load(&self) -> anyhow::Result<Value> {
                Ok(bootstrap::document_from_json(self.0.clone()))
            }
        }

        Self::open(config, MemoryBackend::new(), &Given(document))
    }

    /// Observed view of the whole document. Writes through it are
    /// persisted, checkpointed and published.
    pub fn root(&mut self) -> ObservedRoot<'_> {
        observe(&mut self.document, &mut self.pipeline)
    }

    /// Observed view of the category tree.
    pub fn tree_view(&mut self) -> Option<ObservedRoot<'_>> {
        self.root().descend(TREE)
    }

    pub(crate) fn category_view(&mut self, path: &NodePath) -> Option<ObservedRoot<'_>> {
        self.tree_view()?.descend_path(path)
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn tree(&self) -> &Value {
        &self.document[TREE]
    }

    pub fn config(&self) -> &StoreConfig {
        &self.pipeline.config
    }

    /// Node at a tree-relative path.
    pub fn get_by_path(&self, path: &str) -> Option<&Value> {
        path::get_by_path(self.tree(), path)
    }

    /// Container holding the last segment of a tree-relative path; the tree
    /// itself for top-level names.
    pub fn get_parent_by_path(&self, path: &str) -> Option<&Value> {
        path::get_parent_by_path(self.tree(), path)
    }

    pub fn node_id_by_path(&self, path: &str) -> Option<String> {
        let node = self.get_by_path(path)?;
        node.get(ID)?.as_str().map(str::to_owned)
    }

    pub fn path_by_node_id(&self, id: &str) -> Option<String> {
        self.pipeline.ids.get(id).map(NodePath::to_string)
    }

    /// Bumped whenever a category is added, removed, renamed or moved.
    pub fn structural_version(&self) -> u64 {
        self.pipeline.structural_version
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.pipeline.events.subscribe_changes()
    }

    pub fn subscribe_resets(&self) -> broadcast::Receiver<ResetEvent> {
        self.pipeline.events.subscribe_resets()
    }

    /// Run `f` as one undo step: the per-write checkpoints are held back and
    /// a single checkpoint is taken when the outermost batch ends.
    pub fn batch<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.pipeline.batch_depth += 1;
        let result = f(self);
        self.pipeline.batch_depth -= 1;
        if self.pipeline.batch_depth == 0 {
            self.pipeline.checkpoint(&self.document);
        }
        result
    }

    /// Reject further writes directly into the container at `path` (from the
    /// document root). Nested containers stay writable.
    pub fn freeze(&mut self, path: &str) -> bool {
        let path = NodePath::parse(path);
        match path::resolve(&self.document, &path) {
            Some(Value::Object(_)) | Some(Value::Array(_)) => self.pipeline.frozen.insert(path),
            _ => false,
        }
    }

    pub fn thaw(&mut self, path: &str) -> bool {
        self.pipeline.frozen.remove(&NodePath::parse(path))
    }

    pub fn is_frozen(&self, path: &str) -> bool {
        self.pipeline.frozen.contains(&NodePath::parse(path))
    }
}

#[cfg(test)]
mod tests;
