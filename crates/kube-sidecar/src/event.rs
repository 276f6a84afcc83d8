//! Normalized change notifications for watched resources.

use serde::{Deserialize, Serialize};

/// What happened to a watched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Added => write!(f, "added"),
            Action::Modified => write!(f, "modified"),
            Action::Deleted => write!(f, "deleted"),
        }
    }
}

/// One key of a resource's data block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    pub data: String,
}

impl Entry {
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// A single add/modify/delete notification for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// `namespace/name` of the source resource.
    pub resource_id: String,
    pub namespace: String,
    pub action: Action,
    pub entries: Vec<Entry>,
}

impl ChangeEvent {
    pub fn new(
        namespace: impl Into<String>,
        name: &str,
        action: Action,
        entries: Vec<Entry>,
    ) -> Self {
        let namespace = namespace.into();
        Self {
            resource_id: resource_id(&namespace, name),
            namespace,
            action,
            entries,
        }
    }

    pub fn added(namespace: impl Into<String>, name: &str, entries: Vec<Entry>) -> Self {
        Self::new(namespace, name, Action::Added, entries)
    }

    pub fn modified(namespace: impl Into<String>, name: &str, entries: Vec<Entry>) -> Self {
        Self::new(namespace, name, Action::Modified, entries)
    }

    pub fn deleted(namespace: impl Into<String>, name: &str) -> Self {
        Self::new(namespace, name, Action::Deleted, Vec::new())
    }

    /// The resource name, i.e. the id without its namespace prefix.
    pub fn name(&self) -> &str {
        self.resource_id
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.resource_id)
    }

    pub fn is_deleted(&self) -> bool {
        self.action == Action::Deleted
    }
}

/// Builds the `namespace/name` key of a resource.
pub fn resource_id(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}
