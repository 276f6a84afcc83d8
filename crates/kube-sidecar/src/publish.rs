//! Delivery of validated output to its sinks.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info};

use crate::cluster::{resolve_namespace, ClusterWriter, ObjectKind, ObjectRef};
use crate::config::Config;
use crate::error::StorageError;
use crate::notify::Notifier;
use crate::storage;

/// Which sinks accepted a publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl PublishReport {
    /// True when every configured sink was written.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn any_succeeded(&self) -> bool {
        !self.succeeded.is_empty()
    }
}

pub struct Publisher {
    file: Option<PathBuf>,
    objects: Vec<ObjectRef>,
    data_key: String,
    cluster: Option<Arc<dyn ClusterWriter>>,
    reload_urls: Vec<String>,
    notifier: Arc<dyn Notifier>,
}

impl Publisher {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            file: None,
            objects: Vec::new(),
            data_key: String::new(),
            cluster: None,
            reload_urls: Vec::new(),
            notifier,
        }
    }

    /// Sinks as configured: the file `ToDirectory/ToFileName` in templated
    /// mode when `ToDirectory` is set, plus the named Secret / ConfigMap in
    /// `ToNamespace`.
    pub fn from_config(
        config: &Config,
        cluster: Option<Arc<dyn ClusterWriter>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let mut publisher = Self::new(notifier).with_reload_urls(config.url_reloads.clone());
        publisher.data_key = config.to_file_name.clone();

        if config.is_templated() && !config.to_directory.is_empty() {
            publisher.file = Some(Path::new(&config.to_directory).join(&config.to_file_name));
        }

        if !config.to_secret_name.is_empty() || !config.to_config_map_name.is_empty() {
            let namespace = resolve_namespace(&config.to_namespace);
            if !config.to_secret_name.is_empty() {
                publisher.objects.push(ObjectRef {
                    kind: ObjectKind::Secret,
                    namespace: namespace.clone(),
                    name: config.to_secret_name.clone(),
                });
            }
            if !config.to_config_map_name.is_empty() {
                publisher.objects.push(ObjectRef {
                    kind: ObjectKind::ConfigMap,
                    namespace,
                    name: config.to_config_map_name.clone(),
                });
            }
        }

        publisher.cluster = cluster;
        publisher
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn with_object(
        mut self,
        target: ObjectRef,
        data_key: impl Into<String>,
        cluster: Arc<dyn ClusterWriter>,
    ) -> Self {
        self.objects.push(target);
        self.data_key = data_key.into();
        self.cluster = Some(cluster);
        self
    }

    pub fn with_reload_urls(mut self, urls: Vec<String>) -> Self {
        self.reload_urls = urls;
        self
    }

    /// Writes `output` to every sink. Each sink is independent; reload
    /// webhooks fire when at least one of them succeeded.
    pub async fn publish(&self, output: &str) -> PublishReport {
        let mut report = PublishReport::default();

        if let Some(path) = &self.file {
            let sink = path.display().to_string();
            match storage::write_file(path, output).await {
                Ok(()) => {
                    info!("Changed write to File {}", sink);
                    report.succeeded.push(sink);
                }
                Err(e) => {
                    error!("{}", e);
                    report.failed.push(sink);
                }
            }
        }

        for target in &self.objects {
            let sink = target.to_string();
            let Some(cluster) = &self.cluster else {
                error!("No cluster client to write {}", sink);
                report.failed.push(sink);
                continue;
            };

            let data = BTreeMap::from([(self.data_key.clone(), output.to_string())]);
            match cluster.upsert(target, data).await {
                Ok(outcome) => {
                    info!("Changed write to {} ({:?})", sink, outcome);
                    report.succeeded.push(sink);
                }
                Err(e) => {
                    error!("{}", e);
                    report.failed.push(sink);
                }
            }
        }

        if report.any_succeeded() {
            self.fire_reloads().await;
        }
        report
    }

    /// Writes one passthrough entry.
    pub async fn write_entry(&self, path: &Path, data: &str) -> Result<(), StorageError> {
        storage::write_file(path, data).await?;
        info!("Write file {}", path.display());
        Ok(())
    }

    /// Removes one passthrough entry. Returns false if it did not exist.
    pub async fn remove_entry(&self, path: &Path) -> Result<bool, StorageError> {
        let removed = storage::remove_file(path).await?;
        if removed {
            info!("Delete file {}", path.display());
        }
        Ok(removed)
    }

    /// Calls every reload URL in order.
    pub async fn fire_reloads(&self) {
        for url in &self.reload_urls {
            self.notifier.notify(url).await;
        }
    }
}
