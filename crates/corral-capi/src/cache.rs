//! Reflector-backed caches for the cached read path

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use futures::StreamExt;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, Resource};
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use corral_common::crd::{Cluster, Machine};
use corral_common::Error;

use crate::kube_utils::in_namespace;

/// Start a cluster-wide reflector for `K` and return its store
///
/// The watch stream is driven on a background task for the life of the
/// process; watch errors are retried with the default backoff.
fn spawn_reflector<K>(api: Api<K>) -> Store<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
    K::DynamicType: Default + Eq + Hash + Clone,
{
    let (reader, writer) = reflector::store();
    let stream = reflector::reflector(writer, watcher(api, watcher::Config::default()))
        .default_backoff()
        .touched_objects();
    let kind = K::kind(&K::DynamicType::default()).to_string();
    tokio::spawn(async move {
        stream
            .for_each(|event| {
                if let Err(e) = event {
                    warn!(kind = %kind, error = %e, "cache watch error");
                }
                futures::future::ready(())
            })
            .await;
    });
    reader
}

/// Informer caches for Clusters and Machines
#[derive(Clone)]
pub struct ResourceCache {
    clusters: Store<Cluster>,
    machines: Store<Machine>,
}

impl ResourceCache {
    /// Start the watchers and wait for the initial list to land
    pub async fn start(client: Client) -> Result<Self, Error> {
        let clusters = spawn_reflector(Api::<Cluster>::all(client.clone()));
        let machines = spawn_reflector(Api::<Machine>::all(client));

        clusters.wait_until_ready().await.map_err(|e| {
            Error::internal_with_context("cache", format!("cluster cache not ready: {}", e))
        })?;
        machines.wait_until_ready().await.map_err(|e| {
            Error::internal_with_context("cache", format!("machine cache not ready: {}", e))
        })?;

        info!(
            clusters = clusters.state().len(),
            machines = machines.state().len(),
            "resource cache synced"
        );
        Ok(Self { clusters, machines })
    }

    /// One cluster from the cache
    pub fn cluster(&self, namespace: &str, name: &str) -> Result<Cluster, Error> {
        self.clusters
            .get(&ObjectRef::new(name).within(namespace))
            .map(|c| c.as_ref().clone())
            .ok_or_else(|| Error::not_found("Cluster", name))
    }

    /// Every cluster in a namespace
    pub fn clusters(&self, namespace: &str) -> Vec<Cluster> {
        owned_in_namespace(self.clusters.state(), namespace)
    }

    /// Every machine in a namespace
    pub fn machines(&self, namespace: &str) -> Vec<Machine> {
        owned_in_namespace(self.machines.state(), namespace)
    }

    /// Machines of one cluster, selected by the CAPI cluster-name label
    pub fn machines_for_cluster(&self, namespace: &str, cluster_name: &str) -> Vec<Machine> {
        machines_labelled_for(self.machines(namespace), cluster_name)
    }
}

fn owned_in_namespace<K: Resource + Clone>(objects: Vec<Arc<K>>, namespace: &str) -> Vec<K> {
    objects
        .into_iter()
        .filter(|o| in_namespace(o.as_ref(), namespace))
        .map(|o| o.as_ref().clone())
        .collect()
}

fn machines_labelled_for(machines: Vec<Machine>, cluster_name: &str) -> Vec<Machine> {
    machines
        .into_iter()
        .filter(|m| m.cluster_label() == Some(cluster_name))
        .collect()
}
