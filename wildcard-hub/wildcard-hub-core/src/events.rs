use crate::diff::Change;
use crate::observe::Operation;
use crate::path::NodePath;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A single write or delete went through the observed document.
    Mutation {
        path: NodePath,
        value: Option<Value>,
        operation: Operation,
    },
    /// Undo or redo restored a snapshot close enough to patch in place.
    Patch { changes: Vec<Change> },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetReason {
    Undo,
    Redo,
    /// The document was replaced wholesale by the caller.
    Reset,
    Import,
}

/// Observers must drop incremental state and re-render from scratch.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResetEvent {
    pub reason: ResetReason,
    pub structural_version: u64,
}

#[derive(Clone)]
pub struct EventBus {
    changes: broadcast::Sender<ChangeEvent>,
    resets: broadcast::Sender<ResetEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (changes, _) = broadcast::channel(capacity);
        let (resets, _) = broadcast::channel(capacity);
        Self { changes, resets }
    }

    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    pub fn subscribe_resets(&self) -> broadcast::Receiver<ResetEvent> {
        self.resets.subscribe()
    }

    pub fn send_change(&self, event: ChangeEvent) {
        let _ = self.changes.send(event);
    }

    pub fn send_reset(&self, event: ResetEvent) {
        let _ = self.resets.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(100)
    }
}
