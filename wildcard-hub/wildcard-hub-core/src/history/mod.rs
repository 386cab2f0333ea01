//! Bounded undo/redo over full document snapshots.
//!
//! [`History`] is a cursor over serialized snapshots. Undo and redo restore a
//! snapshot wholesale and then tell observers, through the event bus, whether
//! a patch is enough or a full re-render is needed.

use crate::diff;
use crate::document;
use crate::events::{ChangeEvent, ResetEvent, ResetReason};
use crate::storage::Trimmable;
use crate::store::WildcardStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub taken_at: DateTime<Utc>,
    /// Serialized root document.
    pub snapshot: String,
}

/// Persisted form of the undo stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryLog {
    pub cursor: usize,
    pub checkpoints: Vec<Checkpoint>,
}

impl Trimmable for HistoryLog {
    fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// Redo entries go first, then the oldest, so the cursor stays on the
    /// snapshot of the live document.
    fn trim_to(&mut self, len: usize) {
        self.checkpoints.truncate(self.cursor + 1);
        let excess = self.checkpoints.len().saturating_sub(len);
        self.checkpoints.drain(..excess);
        self.cursor = self.checkpoints.len().saturating_sub(1);
    }

    fn clear(&mut self) {
        self.checkpoints.clear();
        self.cursor = 0;
    }
}

#[derive(Debug, Clone)]
pub struct History {
    log: HistoryLog,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        Self {
            log: HistoryLog::default(),
            limit: limit.max(1),
        }
    }

    /// Adopt a persisted log, repairing an out-of-range cursor and trimming
    /// to `limit`.
    pub fn from_log(mut log: HistoryLog, limit: usize) -> Self {
        let limit = limit.max(1);
        log.cursor = log.cursor.min(log.checkpoints.len().saturating_sub(1));
        if log.checkpoints.len() > limit {
            log.trim_to(limit);
        }
        Self { log, limit }
    }

    /// Push `snapshot` after the cursor, dropping any redo entries and the
    /// oldest entries beyond the limit. A snapshot identical to the one at
    /// the cursor is not pushed again.
    pub fn checkpoint(&mut self, snapshot: String) -> bool {
        if self.current().is_some_and(|c| c.snapshot == snapshot) {
            return false;
        }
        self.log.checkpoints.truncate(self.log.cursor + 1);
        self.log.checkpoints.push(Checkpoint {
            taken_at: Utc::now(),
            snapshot,
        });
        let excess = self.log.checkpoints.len().saturating_sub(self.limit);
        self.log.checkpoints.drain(..excess);
        self.log.cursor = self.log.checkpoints.len() - 1;
        true
    }

    /// Discard everything and start over from a single snapshot.
    pub fn reset(&mut self, snapshot: String) {
        self.log.clear();
        self.log.checkpoints.push(Checkpoint {
            taken_at: Utc::now(),
            snapshot,
        });
    }

    pub fn can_undo(&self) -> bool {
        self.log.cursor > 0 && self.log.cursor < self.log.checkpoints.len()
    }

    pub fn can_redo(&self) -> bool {
        self.log.cursor + 1 < self.log.checkpoints.len()
    }

    pub fn current(&self) -> Option<&Checkpoint> {
        self.log.checkpoints.get(self.log.cursor)
    }

    pub fn snapshot_at(&self, index: usize) -> Option<&str> {
        self.log.checkpoints.get(index).map(|c| c.snapshot.as_str())
    }

    fn move_to(&mut self, index: usize) -> bool {
        if index >= self.log.checkpoints.len() {
            return false;
        }
        self.log.cursor = index;
        true
    }

    pub fn len(&self) -> usize {
        self.log.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.checkpoints.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.log.cursor
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.log.checkpoints
    }

    pub(crate) fn log_mut(&mut self) -> &mut HistoryLog {
        &mut self.log
    }
}

impl WildcardStore {
    /// Mark an undo boundary at the current document.
    pub fn checkpoint(&mut self) -> bool {
        self.pipeline.checkpoint(&self.document)
    }

    pub fn undo(&mut self) -> bool {
        if !self.pipeline.history.can_undo() {
            return false;
        }
        let target = self.pipeline.history.cursor() - 1;
        self.travel(target, ResetReason::Undo)
    }

    pub fn redo(&mut self) -> bool {
        if !self.pipeline.history.can_redo() {
            return false;
        }
        let target = self.pipeline.history.cursor() + 1;
        self.travel(target, ResetReason::Redo)
    }

    pub fn can_undo(&self) -> bool {
        self.pipeline.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.pipeline.history.can_redo()
    }

    pub fn history_len(&self) -> usize {
        self.pipeline.history.len()
    }

    pub fn history_cursor(&self) -> usize {
        self.pipeline.history.cursor()
    }

    pub fn history(&self) -> &History {
        &self.pipeline.history
    }

    /// Replace the whole document, e.g. a factory reset. History restarts
    /// from the new document.
    pub fn reset(&mut self, document: Value) {
        self.replace_document(document, ResetReason::Reset)
    }

    /// Replace the document with imported JSON, either a full document or a
    /// loose category tree.
    pub fn import_tree(&mut self, raw: Value) {
        let document = crate::bootstrap::document_from_json(raw);
        self.replace_document(document, ResetReason::Import)
    }

    fn replace_document(&mut self, mut document: Value, reason: ResetReason) {
        crate::store::prepare_document(&mut document);
        let pipeline = &mut self.pipeline;
        pipeline.replaying = true;
        self.document = document;
        pipeline.reindex(&self.document);
        pipeline.persistence.save_document(&self.document);
        pipeline.history.reset(self.document.to_string());
        pipeline.save_history();
        pipeline.bump_structural_version();
        pipeline.replaying = false;

        tracing::debug!(?reason, version = pipeline.structural_version, "document replaced");
        pipeline.events.send_reset(ResetEvent {
            reason,
            structural_version: pipeline.structural_version,
        });
    }

    fn travel(&mut self, target: usize, reason: ResetReason) -> bool {
        let pipeline = &mut self.pipeline;
        let Some(snapshot) = pipeline.history.snapshot_at(target) else {
            return false;
        };
        let restored: Value = match serde_json::from_str(snapshot) {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(error = %e, target, "unreadable history snapshot, staying put");
                return false;
            }
        };

        pipeline.replaying = true;
        let changes = diff::diff(&self.document, &restored);
        let inconclusive = !self.document.is_object() || !restored.is_object();
        self.document = restored;
        pipeline.history.move_to(target);
        pipeline.reindex(&self.document);
        pipeline.persistence.save_document(&self.document);
        pipeline.save_history();
        if changes.iter().any(|c| document::is_structural_path(&c.path)) {
            pipeline.bump_structural_version();
        }
        pipeline.replaying = false;

        tracing::debug!(
            ?reason,
            cursor = pipeline.history.cursor(),
            changes = changes.len(),
            "history restored"
        );
        if inconclusive || changes.len() >= pipeline.config.patch_threshold {
            pipeline.events.send_reset(ResetEvent {
                reason,
                structural_version: pipeline.structural_version,
            });
        } else {
            pipeline.events.send_change(ChangeEvent::Patch { changes });
        }
        true
    }
}
