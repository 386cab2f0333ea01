//! Initial documents for a store with nothing persisted yet.

use crate::document::{self, TREE};
use anyhow::{Context, Result};
use serde_json::Value;
use std::path::PathBuf;

pub trait Bootstrap {
    /// Produce a full root document.
    fn load(&self) -> Result<Value>;
}

/// Starts from an empty category tree.
pub struct EmptyBootstrap;

impl Bootstrap for EmptyBootstrap {
    fn load(&self) -> Result<Value> {
        Ok(document::empty_document())
    }
}

/// Reads a JSON file. A file with a top-level `wildcards` object is taken as
/// a full document; anything else is treated as a loose category tree.
pub struct JsonFileBootstrap {
    path: PathBuf,
}

impl JsonFileBootstrap {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Bootstrap for JsonFileBootstrap {
    fn load(&self) -> Result<Value> {
        let data = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading bootstrap file {}", self.path.display()))?;
        let raw: Value = serde_json::from_str(&data)
            .with_context(|| format!("parsing bootstrap file {}", self.path.display()))?;
        Ok(document_from_json(raw))
    }
}

/// Build a root document from imported JSON.
pub fn document_from_json(raw: Value) -> Value {
    match raw {
        Value::Object(mut root) if root.get(TREE).is_some_and(Value::is_object) => {
            let tree = root
                .remove(TREE)
                .map(|tree| document::normalize_tree(&tree))
                .unwrap_or_default();
            root.insert(TREE.to_owned(), tree);
            let mut doc = Value::Object(root);
            document::ensure_shape(&mut doc);
            doc
        }
        loose => {
            let mut doc = document::empty_document();
            doc[TREE] = document::normalize_tree(&loose);
            doc
        }
    }
}

/// Run `bootstrap`, falling back to an empty document on failure.
pub fn load_or_empty(bootstrap: &dyn Bootstrap) -> Value {
    match bootstrap.load() {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "bootstrap failed, starting empty");
            document::empty_document()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ENTRIES, PINNED, SYSTEM_PROMPT};
    use serde_json::json;

    #[test]
    fn full_document_keeps_metadata() {
        let doc = document_from_json(json!({
            TREE: { "colors": ["red"] },
            SYSTEM_PROMPT: "keep me",
            PINNED: ["colors"]
        }));
        assert_eq!(doc[SYSTEM_PROMPT], "keep me");
        assert_eq!(doc[PINNED], json!(["colors"]));
        assert_eq!(doc[TREE]["colors"][ENTRIES], json!(["red"]));
    }

    #[test]
    fn loose_tree_is_wrapped() {
        let doc = document_from_json(json!({ "animals": { "cats": ["tabby"] } }));
        assert_eq!(doc[TREE]["animals"]["cats"][ENTRIES], json!(["tabby"]));
        assert_eq!(doc[PINNED], json!([]));
    }

    #[test]
    fn missing_file_falls_back_to_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let bootstrap = JsonFileBootstrap::new(dir.path().join("absent.json"));
        assert!(bootstrap.load().is_err());
        assert_eq!(load_or_empty(&bootstrap), document::empty_document());
    }

    #[test]
    fn json_file_is_normalized() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("seed.json");
        std::fs::write(&path, r#"{ "colors": ["red", "Blue"] }"#).unwrap();
        let doc = JsonFileBootstrap::new(&path).load().unwrap();
        assert_eq!(doc[TREE]["colors"][ENTRIES], json!(["Blue", "red"]));
    }
}
