//! Slash-delimited addressing into the document tree.
//!
//! Paths are plain owned segments rather than references into the tree, so
//! two paths naming the same node compare equal and can be serialized into
//! events and history records.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

pub const SEPARATOR: char = '/';

/// Location of a node relative to some root, one segment per level.
///
/// Array elements are addressed by their decimal index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePath(Vec<String>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Split `path` on `/`. Empty segments are dropped, so `""` is the root
    /// and `"a//b/"` is the same as `"a/b"`.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(str::to_owned)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn join(&self, other: &NodePath) -> Self {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Self(segments)
    }

    /// Path of the containing node; `None` for the root itself.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn second_to_last(&self) -> Option<&str> {
        let len = self.0.len();
        if len < 2 {
            return None;
        }
        Some(self.0[len - 2].as_str())
    }

    pub fn starts_with(&self, prefix: &NodePath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn strip_prefix(&self, prefix: &NodePath) -> Option<Self> {
        self.0
            .strip_prefix(prefix.0.as_slice())
            .map(|rest| Self(rest.to_vec()))
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

impl FromStr for NodePath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl From<&str> for NodePath {
    fn from(s: &str) -> Self {
        Self::parse(s)
    }
}

impl<S: Into<String>> FromIterator<S> for NodePath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Direct child of `value` named by `segment`. Objects are looked up by key,
/// arrays by decimal index; scalars have no children.
pub fn child<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

pub fn child_mut<'a>(value: &'a mut Value, segment: &str) -> Option<&'a mut Value> {
    match value {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => items.get_mut(segment.parse::<usize>().ok()?),
        _ => None,
    }
}

pub fn resolve<'a>(root: &'a Value, path: &NodePath) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| child(node, segment))
}

pub fn resolve_mut<'a>(root: &'a mut Value, path: &NodePath) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(root, |node, segment| child_mut(node, segment))
}

/// Node at `path` below `root`, or `None` when any segment is missing.
pub fn get_by_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    resolve(root, &NodePath::parse(path))
}

/// Container holding the last segment of `path`. A path without a separator
/// lives directly in `root`.
pub fn get_parent_by_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    match NodePath::parse(path).parent() {
        Some(parent) => resolve(root, &parent),
        None => Some(root),
    }
}
