//! Last-writer-wins fold of change events, keyed by resource id.

use std::collections::BTreeMap;

use crate::event::ChangeEvent;

/// `resource_id` → entry name → entry data, for every resource still present.
pub type FlattenedView = BTreeMap<String, BTreeMap<String, String>>;

/// Holds the latest event seen for every resource id.
#[derive(Debug, Default)]
pub struct Aggregator {
    resources: BTreeMap<String, ChangeEvent>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces whatever was known about the event's resource.
    ///
    /// Deleted events are kept as tombstones so passthrough mode can
    /// remove the files the resource produced; `flatten` skips them.
    pub fn apply(&mut self, event: ChangeEvent) {
        self.resources.insert(event.resource_id.clone(), event);
    }

    pub fn remove(&mut self, resource_id: &str) -> Option<ChangeEvent> {
        self.resources.remove(resource_id)
    }

    pub fn get(&self, resource_id: &str) -> Option<&ChangeEvent> {
        self.resources.get(resource_id)
    }

    /// Ids of every tracked resource, tombstones included, in sorted order.
    pub fn resource_ids(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn flatten(&self) -> FlattenedView {
        self.resources
            .iter()
            .filter(|(_, event)| !event.is_deleted())
            .map(|(id, event)| {
                let entries = event
                    .entries
                    .iter()
                    .map(|entry| (entry.name.clone(), entry.data.clone()))
                    .collect();
                (id.clone(), entries)
            })
            .collect()
    }
}
