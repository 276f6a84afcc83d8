use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;

use super::{ClusterWriter, ObjectKind, ObjectRef, UpsertOutcome};
use crate::error::ClusterError;

/// Builds a client from an explicit kubeconfig, or from the in-cluster
/// service account / `KUBECONFIG` when none is given.
pub async fn connect(kubeconfig: Option<&Path>) -> Result<Client, ClusterError> {
    let Some(path) = kubeconfig else {
        return Client::try_default()
            .await
            .map_err(|e| ClusterError::Client(e.to_string()));
    };

    let kubeconfig =
        Kubeconfig::read_from(path).map_err(|e| ClusterError::Client(e.to_string()))?;
    let config = kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| ClusterError::Client(e.to_string()))?;
    Client::try_from(config).map_err(|e| ClusterError::Client(e.to_string()))
}

/// Publishes to Secrets and ConfigMaps through the Kubernetes API.
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl KubeCluster {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn upsert_secret(
        &self,
        target: &ObjectRef,
        data: BTreeMap<String, String>,
    ) -> Result<UpsertOutcome, ClusterError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &target.namespace);
        let existing = api
            .get_opt(&target.name)
            .await
            .map_err(|e| get_error(target, e))?;

        match existing {
            Some(mut secret) => {
                // string_data is merged into data server-side; clear data so
                // keys no longer rendered disappear.
                secret.data = None;
                secret.string_data = Some(data);
                api.replace(&target.name, &PostParams::default(), &secret)
                    .await
                    .map_err(|e| update_error(target, e))?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let secret = Secret {
                    metadata: object_meta(target),
                    string_data: Some(data),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &secret)
                    .await
                    .map_err(|e| create_error(target, e))?;
                Ok(UpsertOutcome::Created)
            }
        }
    }

    async fn upsert_config_map(
        &self,
        target: &ObjectRef,
        data: BTreeMap<String, String>,
    ) -> Result<UpsertOutcome, ClusterError> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &target.namespace);
        let existing = api
            .get_opt(&target.name)
            .await
            .map_err(|e| get_error(target, e))?;

        match existing {
            Some(mut config_map) => {
                config_map.data = Some(data);
                api.replace(&target.name, &PostParams::default(), &config_map)
                    .await
                    .map_err(|e| update_error(target, e))?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                let config_map = ConfigMap {
                    metadata: object_meta(target),
                    data: Some(data),
                    ..Default::default()
                };
                api.create(&PostParams::default(), &config_map)
                    .await
                    .map_err(|e| create_error(target, e))?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

#[async_trait]
impl ClusterWriter for KubeCluster {
    async fn upsert(
        &self,
        target: &ObjectRef,
        data: BTreeMap<String, String>,
    ) -> Result<UpsertOutcome, ClusterError> {
        match target.kind {
            ObjectKind::Secret => self.upsert_secret(target, data).await,
            ObjectKind::ConfigMap => self.upsert_config_map(target, data).await,
        }
    }
}

fn object_meta(target: &ObjectRef) -> ObjectMeta {
    ObjectMeta {
        name: Some(target.name.clone()),
        namespace: Some(target.namespace.clone()),
        ..Default::default()
    }
}

fn get_error(target: &ObjectRef, source: kube::Error) -> ClusterError {
    ClusterError::Get {
        kind: target.kind.to_string(),
        namespace: target.namespace.clone(),
        name: target.name.clone(),
        source,
    }
}

fn update_error(target: &ObjectRef, source: kube::Error) -> ClusterError {
    ClusterError::Update {
        kind: target.kind.to_string(),
        namespace: target.namespace.clone(),
        name: target.name.clone(),
        source,
    }
}

fn create_error(target: &ObjectRef, source: kube::Error) -> ClusterError {
    ClusterError::Create {
        kind: target.kind.to_string(),
        namespace: target.namespace.clone(),
        name: target.name.clone(),
        source,
    }
}
