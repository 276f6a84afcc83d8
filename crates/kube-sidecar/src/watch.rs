//! Label-selected watches over ConfigMaps and Secrets.
//!
//! Every selector gets its own task. Tasks translate watcher events into
//! [`ChangeEvent`]s and push them into the shared channel; they never touch
//! reconciliation state.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::time::Duration;

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::NamespaceResourceScope;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource, ResourceExt};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{Selector, SelectorKind};
use crate::event::{resource_id, Action, ChangeEvent, Entry};

/// Objects whose data block can be turned into entries.
pub trait WatchedObject {
    fn entries(&self) -> Vec<Entry>;
}

impl WatchedObject for ConfigMap {
    /// `data` followed by `binaryData`, the latter decoded as lossy UTF-8.
    fn entries(&self) -> Vec<Entry> {
        let text = self
            .data
            .iter()
            .flatten()
            .map(|(name, data)| Entry::new(name, data));
        let binary = self
            .binary_data
            .iter()
            .flatten()
            .map(|(name, bytes)| Entry::new(name, String::from_utf8_lossy(&bytes.0)));
        text.chain(binary).collect()
    }
}

impl WatchedObject for Secret {
    fn entries(&self) -> Vec<Entry> {
        self.data
            .iter()
            .flatten()
            .map(|(name, bytes)| Entry::new(name, String::from_utf8_lossy(&bytes.0)))
            .collect()
    }
}

/// Turns raw watcher events into change events, remembering which ids
/// exist so a re-list can report the ones that vanished meanwhile.
#[derive(Debug, Default)]
pub struct EventTranslator {
    known: BTreeSet<String>,
    relisted: Option<BTreeSet<String>>,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn translate<K>(&mut self, event: watcher::Event<K>) -> Vec<ChangeEvent>
    where
        K: Resource + WatchedObject,
    {
        match event {
            watcher::Event::Init => {
                self.relisted = Some(BTreeSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(object) => {
                let change = to_change_event(&object, Action::Added);
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(change.resource_id.clone());
                }
                self.known.insert(change.resource_id.clone());
                vec![change]
            }
            watcher::Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let vanished: Vec<ChangeEvent> = self
                    .known
                    .difference(&relisted)
                    .map(|id| match id.split_once('/') {
                        Some((namespace, name)) => ChangeEvent::deleted(namespace, name),
                        None => ChangeEvent::deleted("", id),
                    })
                    .collect();
                self.known = relisted;
                vanished
            }
            watcher::Event::Apply(object) => {
                let change = to_change_event(&object, Action::Modified);
                self.known.insert(change.resource_id.clone());
                vec![change]
            }
            watcher::Event::Delete(object) => {
                let change = ChangeEvent::deleted(
                    object.namespace().unwrap_or_default(),
                    &object.name_any(),
                );
                debug!("{} {}", change.action, change.resource_id);
                self.known.remove(&change.resource_id);
                vec![change]
            }
        }
    }
}

fn to_change_event<K>(object: &K, action: Action) -> ChangeEvent
where
    K: Resource + WatchedObject,
{
    let namespace = object.namespace().unwrap_or_default();
    let name = object.name_any();
    debug!("{} {}", action, resource_id(&namespace, &name));
    ChangeEvent::new(namespace, &name, action, object.entries())
}

/// Starts one watch task per selector.
///
/// The n-th selector starts `n * start_delay` after the first, so the
/// primary selector is listed before the ones that complement it.
pub fn spawn_watchers(
    client: Client,
    selectors: Vec<Selector>,
    namespace: Option<String>,
    start_delay: Duration,
    events: UnboundedSender<ChangeEvent>,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    selectors
        .into_iter()
        .enumerate()
        .map(|(index, selector)| {
            let client = client.clone();
            let namespace = namespace.clone();
            let events = events.clone();
            let shutdown = shutdown.clone();
            let delay = start_delay * index as u32;

            tokio::spawn(async move {
                tokio::select! {
                    _ = shutdown.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
                info!(
                    "Watching {} in {}",
                    selector,
                    namespace.as_deref().unwrap_or("all namespaces")
                );
                match selector.kind {
                    SelectorKind::ConfigMap => {
                        let api: Api<ConfigMap> = scoped_api(client, namespace.as_deref());
                        watch_selector(api, selector, events, shutdown).await
                    }
                    SelectorKind::Secret => {
                        let api: Api<Secret> = scoped_api(client, namespace.as_deref());
                        watch_selector(api, selector, events, shutdown).await
                    }
                }
            })
        })
        .collect()
}

fn scoped_api<K>(client: Client, namespace: Option<&str>) -> Api<K>
where
    K: Resource<Scope = NamespaceResourceScope>,
    K::DynamicType: Default,
{
    match namespace {
        Some(namespace) => Api::namespaced(client, namespace),
        None => Api::all(client),
    }
}

async fn watch_selector<K>(
    api: Api<K>,
    selector: Selector,
    events: UnboundedSender<ChangeEvent>,
    shutdown: CancellationToken,
) where
    K: Resource + WatchedObject + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default,
{
    let config = watcher::Config::default().labels(&selector.labels);
    let mut stream = watcher(api, config).default_backoff().boxed();
    let mut translator = EventTranslator::new();

    loop {
        let item = tokio::select! {
            _ = shutdown.cancelled() => return,
            item = stream.next() => item,
        };

        match item {
            Some(Ok(event)) => {
                for change in translator.translate(event) {
                    if events.send(change).is_err() {
                        debug!("Event channel closed, stopping watch of {}", selector);
                        return;
                    }
                }
            }
            Some(Err(e)) => warn!("Watch of {} failed: {}", selector, e),
            None => {
                warn!("Watch of {} ended", selector);
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use k8s_openapi::ByteString;
    use std::collections::BTreeMap;

    fn config_map(namespace: &str, name: &str, data: &[(&str, &str)]) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_map_entries() {
        let mut cm = config_map("ns", "rules", &[("a.yml", "a: 1")]);
        cm.binary_data = Some(BTreeMap::from([(
            "b.bin".to_string(),
            ByteString(b"raw\xff".to_vec()),
        )]));

        let entries = cm.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], Entry::new("a.yml", "a: 1"));
        assert_eq!(entries[1].name, "b.bin");
        assert!(entries[1].data.starts_with("raw"));
    }

    #[test]
    fn test_secret_entries() {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some("creds".to_string()),
                namespace: Some("ns".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "token".to_string(),
                ByteString(b"s3cr3t".to_vec()),
            )])),
            ..Default::default()
        };
        assert_eq!(secret.entries(), vec![Entry::new("token", "s3cr3t")]);
    }

    #[test]
    fn test_empty_object_has_no_entries() {
        assert!(ConfigMap::default().entries().is_empty());
        assert!(Secret::default().entries().is_empty());
    }

    #[test]
    fn test_translate_actions() {
        let mut translator = EventTranslator::new();
        let cm = config_map("ns", "a", &[("f", "x")]);

        let added = translator.translate(watcher::Event::InitApply(cm.clone()));
        assert_eq!(added[0].action, Action::Added);
        assert_eq!(added[0].resource_id, "ns/a");

        let modified = translator.translate(watcher::Event::Apply(cm.clone()));
        assert_eq!(modified[0].action, Action::Modified);
        assert_eq!(modified[0].entries, vec![Entry::new("f", "x")]);

        let deleted = translator.translate(watcher::Event::Delete(cm));
        assert_eq!(deleted, vec![ChangeEvent::deleted("ns", "a")]);
    }

    #[test]
    fn test_relist_reports_vanished_resources() {
        let mut translator = EventTranslator::new();

        assert!(translator.translate::<ConfigMap>(watcher::Event::Init).is_empty());
        translator.translate(watcher::Event::InitApply(config_map("ns", "a", &[])));
        translator.translate(watcher::Event::InitApply(config_map("ns", "b", &[])));
        assert!(translator.translate::<ConfigMap>(watcher::Event::InitDone).is_empty());

        // Re-list after a watch restart: "b" is gone.
        translator.translate::<ConfigMap>(watcher::Event::Init);
        translator.translate(watcher::Event::InitApply(config_map("ns", "a", &[])));
        let vanished = translator.translate::<ConfigMap>(watcher::Event::InitDone);

        assert_eq!(vanished, vec![ChangeEvent::deleted("ns", "b")]);
    }

    #[test]
    fn test_applied_resources_count_as_known() {
        let mut translator = EventTranslator::new();
        translator.translate(watcher::Event::Apply(config_map("ns", "late", &[])));

        translator.translate::<ConfigMap>(watcher::Event::Init);
        let vanished = translator.translate::<ConfigMap>(watcher::Event::InitDone);

        assert_eq!(vanished, vec![ChangeEvent::deleted("ns", "late")]);
    }
}
