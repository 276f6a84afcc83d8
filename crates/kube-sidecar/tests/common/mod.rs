//! Shared helpers for kube-sidecar integration tests.
//!
//! `Harness` wires a `Reconciler` from a YAML config against in-memory
//! cluster, notifier and metrics implementations, with file output going
//! to a temporary directory.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use kube_sidecar::cluster::{MemoryCluster, ObjectKind, ObjectRef};
use kube_sidecar::{
    load_config_from_str, ChangeEvent, Entry, MemoryNotifier, MemoryValidity, Outcome, Publisher,
    Reconciler,
};

/// Placeholder in config snippets replaced by the harness output directory.
pub const OUT: &str = "$OUT";

pub struct Harness {
    _temp_dir: TempDir,
    pub out_dir: PathBuf,
    pub cluster: Arc<MemoryCluster>,
    pub notifier: Arc<MemoryNotifier>,
    pub validity: Arc<MemoryValidity>,
    pub reconciler: Reconciler,
}

impl Harness {
    /// Builds a harness from a config snippet; `$OUT` expands to the
    /// temporary output directory.
    pub fn new(config_yaml: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let out_dir = temp_dir.path().join("out");
        let config_yaml = config_yaml.replace(OUT, &out_dir.display().to_string());

        let config = load_config_from_str(&config_yaml)
            .expect("Failed to load test config")
            .config;

        let cluster = Arc::new(MemoryCluster::new());
        let notifier = Arc::new(MemoryNotifier::new());
        let validity = Arc::new(MemoryValidity::new());

        let publisher = Publisher::from_config(&config, Some(cluster.clone()), notifier.clone());
        let reconciler = Reconciler::from_config(&config, publisher, validity.clone())
            .expect("Failed to build reconciler");

        Self {
            _temp_dir: temp_dir,
            out_dir,
            cluster,
            notifier,
            validity,
            reconciler,
        }
    }

    pub async fn handle(&mut self, event: ChangeEvent) -> Outcome {
        self.reconciler.handle(event).await
    }

    /// Content of a file below the output directory, if it exists.
    pub fn read(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.out_dir.join(relative)).ok()
    }

    pub fn secret_data(&self, namespace: &str, name: &str, key: &str) -> Option<String> {
        let target = ObjectRef {
            kind: ObjectKind::Secret,
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.cluster
            .get(&target)
            .and_then(|data| data.get(key).cloned())
    }
}

/// An Added event for a resource with the given entries.
pub fn added(namespace: &str, name: &str, entries: &[(&str, &str)]) -> ChangeEvent {
    ChangeEvent::added(namespace, name, to_entries(entries))
}

pub fn modified(namespace: &str, name: &str, entries: &[(&str, &str)]) -> ChangeEvent {
    ChangeEvent::modified(namespace, name, to_entries(entries))
}

fn to_entries(entries: &[(&str, &str)]) -> Vec<Entry> {
    entries
        .iter()
        .map(|(name, data)| Entry::new(*name, *data))
        .collect()
}
