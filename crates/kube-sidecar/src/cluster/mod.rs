//! Writing rendered output back into the cluster.

pub mod client;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ClusterError;

pub use client::KubeCluster;

/// Where the pod's own namespace is mounted.
pub const SERVICE_ACCOUNT_NAMESPACE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// The cluster object kinds output can be published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectKind {
    Secret,
    ConfigMap,
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ObjectKind::Secret => write!(f, "Secret"),
            ObjectKind::ConfigMap => write!(f, "ConfigMap"),
        }
    }
}

/// A named object in a namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub namespace: String,
    pub name: String,
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}/{}", self.kind, self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Get-or-create-or-update of flat string maps.
#[async_trait]
pub trait ClusterWriter: Send + Sync {
    async fn upsert(
        &self,
        target: &ObjectRef,
        data: BTreeMap<String, String>,
    ) -> Result<UpsertOutcome, ClusterError>;
}

/// Returns `namespace` when set, else the pod's namespace, else `default`.
pub fn resolve_namespace(namespace: &str) -> String {
    log::debug!("namespace: {}", namespace);
    if !namespace.is_empty() {
        return namespace.to_string();
    }
    match std::fs::read_to_string(SERVICE_ACCOUNT_NAMESPACE) {
        Ok(pod_namespace) if !pod_namespace.trim().is_empty() => pod_namespace.trim().to_string(),
        _ => "default".to_string(),
    }
}

type ObjectKey = (ObjectKind, String, String);

/// In-memory cluster for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    objects: Mutex<BTreeMap<ObjectKey, BTreeMap<String, String>>>,
    failing: AtomicBool,
}

impl MemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following upsert fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }

    pub fn get(&self, target: &ObjectRef) -> Option<BTreeMap<String, String>> {
        self.objects.lock().ok().and_then(|objects| {
            objects
                .get(&(target.kind, target.namespace.clone(), target.name.clone()))
                .cloned()
        })
    }
}

#[async_trait]
impl ClusterWriter for MemoryCluster {
    async fn upsert(
        &self,
        target: &ObjectRef,
        data: BTreeMap<String, String>,
    ) -> Result<UpsertOutcome, ClusterError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(ClusterError::Client(format!("{} is unreachable", target)));
        }
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| ClusterError::Client(e.to_string()))?;
        let previous = objects.insert(
            (target.kind, target.namespace.clone(), target.name.clone()),
            data,
        );
        Ok(match previous {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Created,
        })
    }
}
