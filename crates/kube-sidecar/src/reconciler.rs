//! The single consumer of change events.
//!
//! Every event is folded into the [`Aggregator`]; then either the whole view
//! is rendered into one artifact (templated mode) or every tracked
//! resource's entries are written as individual files (passthrough mode).
//! All state lives in the [`Reconciler`] and is only touched by the task
//! that runs it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::aggregator::Aggregator;
use crate::config::Config;
use crate::error::{SidecarError, WatchError};
use crate::event::ChangeEvent;
use crate::metrics::ValiditySink;
use crate::publish::Publisher;
use crate::render::Renderer;
use crate::validate::Validator;

/// What a single event led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// New output reached every sink.
    Published,
    /// New output reached only some sinks; it is retried on the next event.
    PartiallyPublished,
    /// Output equals the last published one.
    Unchanged,
    /// Rendering failed or the output stayed invalid after eviction.
    NoOutput,
    Passthrough { written: usize, removed: usize },
}

pub struct Reconciler {
    aggregator: Aggregator,
    renderer: Renderer,
    validator: Validator,
    publisher: Publisher,
    validity: Arc<dyn ValiditySink>,
    check_file_name: String,
    directory_template: String,
    last_published: String,
    written: BTreeMap<PathBuf, String>,
    rejected: BTreeMap<PathBuf, String>,
    produced: BTreeMap<String, BTreeSet<PathBuf>>,
}

impl Reconciler {
    pub fn new(
        renderer: Renderer,
        validator: Validator,
        publisher: Publisher,
        validity: Arc<dyn ValiditySink>,
    ) -> Self {
        Self {
            aggregator: Aggregator::new(),
            renderer,
            validator,
            publisher,
            validity,
            check_file_name: String::new(),
            directory_template: String::new(),
            last_published: String::new(),
            written: BTreeMap::new(),
            rejected: BTreeMap::new(),
            produced: BTreeMap::new(),
        }
    }

    /// Builds renderer and validator from `config`.
    pub fn from_config(
        config: &Config,
        publisher: Publisher,
        validity: Arc<dyn ValiditySink>,
    ) -> Result<Self, SidecarError> {
        let renderer = Renderer::from_config(config)?;
        let validator = Validator::from_config(config)?;
        Ok(Self::new(renderer, validator, publisher, validity)
            .with_check_file_name(&config.to_file_name)
            .with_directory_template(&config.to_directory))
    }

    /// Name of the temporary file handed to the check command.
    pub fn with_check_file_name(mut self, name: &str) -> Self {
        self.check_file_name = name.to_string();
        self
    }

    /// Destination directory template used in passthrough mode.
    pub fn with_directory_template(mut self, template: &str) -> Self {
        self.directory_template = template.to_string();
        self
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn last_published(&self) -> &str {
        &self.last_published
    }

    /// Consumes events until shutdown or until every producer is gone.
    pub async fn run(
        mut self,
        mut events: UnboundedReceiver<ChangeEvent>,
        shutdown: CancellationToken,
    ) -> Result<(), WatchError> {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping reconciliation");
                    return Ok(());
                }
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event).await;
                    }
                    None => return Err(WatchError::ChannelClosed),
                },
            }
        }
    }

    /// Processes one event to completion.
    pub async fn handle(&mut self, event: ChangeEvent) -> Outcome {
        let span = info_span!(
            "reconcile",
            resource_id = %event.resource_id,
            action = %event.action,
        );
        debug!("Received {} {}", event.resource_id, event.action);

        if self.renderer.is_templated() {
            self.reconcile_templated(event).instrument(span).await
        } else {
            self.reconcile_passthrough(event).instrument(span).await
        }
    }

    async fn reconcile_templated(&mut self, event: ChangeEvent) -> Outcome {
        let resource_id = event.resource_id.clone();
        let namespace = event.namespace.clone();
        let deleted = event.is_deleted();

        self.aggregator.apply(event);
        if deleted {
            // Nothing to keep around once the view no longer shows it.
            self.aggregator.remove(&resource_id);
        }

        let Some(mut output) = self.render() else {
            return Outcome::NoOutput;
        };

        let valid = self.validator.check(&output, &self.check_file_name).await;
        self.validity.observe(&namespace, &resource_id, valid);
        if valid {
            info!("Syntax OK {}", resource_id);
        } else {
            warn!("INVALID syntax: {}", resource_id);
            self.aggregator.remove(&resource_id);

            output = match self.render() {
                Some(output) => output,
                None => return Outcome::NoOutput,
            };
            if !self.validator.check(&output, &self.check_file_name).await {
                error!(
                    "Output is still invalid without {}, keeping the previous output",
                    resource_id
                );
                return Outcome::NoOutput;
            }
        }

        if output == self.last_published {
            debug!("Output unchanged");
            return Outcome::Unchanged;
        }

        let report = self.publisher.publish(&output).await;
        if report.is_complete() {
            self.last_published = output;
            Outcome::Published
        } else {
            warn!("Failed sinks: {}", report.failed.join(", "));
            Outcome::PartiallyPublished
        }
    }

    fn render(&self) -> Option<String> {
        match self.renderer.render_view(&self.aggregator.flatten()) {
            Ok(output) => Some(output),
            Err(e) => {
                error!("{}", e);
                None
            }
        }
    }

    async fn reconcile_passthrough(&mut self, event: ChangeEvent) -> Outcome {
        self.aggregator.apply(event);

        let mut written = 0;
        // Paths some resource stopped producing during this pass.
        let mut released = BTreeSet::new();

        for resource_id in self.aggregator.resource_ids() {
            let Some(resource) = self.aggregator.get(&resource_id).cloned() else {
                continue;
            };

            if resource.is_deleted() {
                info!("Delete files of {} (deleted)", resource_id);
                released.extend(self.produced.remove(&resource_id).unwrap_or_default());
                self.aggregator.remove(&resource_id);
                continue;
            }

            let directory = match self
                .renderer
                .render_directory(&self.directory_template, &resource)
            {
                Ok(directory) => directory,
                Err(e) => {
                    error!("{}: {}", resource_id, e);
                    continue;
                }
            };
            debug!("Rename dir: {} to {}", self.directory_template, directory);

            let mut paths = BTreeSet::new();
            for entry in &resource.entries {
                let path = Path::new(&directory).join(&entry.name);
                paths.insert(path.clone());

                let data = self.renderer.post_process(&entry.data);
                if self.written.get(&path) == Some(&data) || self.rejected.get(&path) == Some(&data)
                {
                    continue;
                }

                let file_name = if self.check_file_name.is_empty() {
                    entry.name.as_str()
                } else {
                    self.check_file_name.as_str()
                };
                let valid = self.validator.check(&data, file_name).await;
                self.validity.observe(&resource.namespace, &resource_id, valid);
                if !valid {
                    warn!("INVALID syntax: {} ({})", resource_id, entry.name);
                    self.rejected.insert(path, data);
                    continue;
                }

                match self.publisher.write_entry(&path, &data).await {
                    Ok(()) => {
                        written += 1;
                        self.rejected.remove(&path);
                        self.written.insert(path, data);
                    }
                    Err(e) => error!("{}", e),
                }
            }

            let previous = self
                .produced
                .insert(resource_id.clone(), paths.clone())
                .unwrap_or_default();
            released.extend(previous.difference(&paths).cloned());
        }

        let mut removed = 0;
        for path in released {
            if self.is_produced(&path) {
                debug!("Keep {}, still produced by another resource", path.display());
                continue;
            }
            if self.remove_path(&path).await {
                removed += 1;
            }
        }

        if written + removed > 0 {
            self.publisher.fire_reloads().await;
        }
        Outcome::Passthrough { written, removed }
    }

    fn is_produced(&self, path: &Path) -> bool {
        self.produced.values().any(|paths| paths.contains(path))
    }

    async fn remove_path(&mut self, path: &Path) -> bool {
        self.written.remove(path);
        self.rejected.remove(path);
        match self.publisher.remove_entry(path).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("{}", e);
                false
            }
        }
    }
}
