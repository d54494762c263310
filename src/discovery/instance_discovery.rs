//! # Instance Discovery
//!
//! Produces, per logical service name, the raw list of `Instance` records
//! the selection core works on. Every call returns a fresh, complete
//! snapshot; nothing here tracks changes between calls.
//!
//! `KubernetesDiscovery` builds instances from EndpointSlices. Service
//! labels land in the service-level partition and the target pod's labels
//! and annotations land in the pod-level partition, so a generic consumer
//! reading only service-level attributes does not see the pod's zone.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::config::DiscoverySettings;
use crate::core::error::{ZoneAffinityError, ZoneAffinityResult};
use crate::core::types::{Instance, PodMetadata};
use crate::registry::{
    EndpointGroup, EndpointTopologySource, GroupPort, PodRecord, PodRegistry, ServiceCatalog,
};

/// Source of raw instance lists
#[async_trait]
pub trait InstanceDiscovery: Send + Sync {
    /// Current instances of a logical service, in discovery order
    async fn instances(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>>;

    /// Names of all known services
    async fn services(&self) -> ZoneAffinityResult<Vec<String>>;

    /// Human-readable description for logs
    fn description(&self) -> String;
}

/// EndpointSlice-backed discovery
pub struct KubernetesDiscovery {
    topology: Arc<dyn EndpointTopologySource>,
    pods: Arc<dyn PodRegistry>,
    catalog: Arc<dyn ServiceCatalog>,
    namespace: String,
    settings: DiscoverySettings,
}

impl KubernetesDiscovery {
    pub fn new(
        topology: Arc<dyn EndpointTopologySource>,
        pods: Arc<dyn PodRegistry>,
        catalog: Arc<dyn ServiceCatalog>,
        namespace: impl Into<String>,
        settings: DiscoverySettings,
    ) -> Self {
        Self {
            topology,
            pods,
            catalog,
            namespace: namespace.into(),
            settings,
        }
    }

    /// Pods of the namespace keyed by name, empty when pod metadata is off
    async fn pods_by_name(&self, groups: &[EndpointGroup]) -> HashMap<String, PodRecord> {
        let wants_pods = self.settings.include_pod_metadata
            && groups
                .iter()
                .flat_map(|group| &group.endpoints)
                .any(|endpoint| endpoint.target_pod.is_some());
        if !wants_pods {
            return HashMap::new();
        }

        match self.pods.list_pods(&self.namespace).await {
            Ok(pods) => pods.into_iter().map(|pod| (pod.name.clone(), pod)).collect(),
            Err(e) => {
                warn!(
                    namespace = %self.namespace,
                    error = %e,
                    "Failed to list pods, instances will carry no pod metadata"
                );
                HashMap::new()
            }
        }
    }

    fn select_port(&self, ports: &[GroupPort]) -> Option<u16> {
        match &self.settings.port_name {
            Some(name) => ports
                .iter()
                .find(|port| port.name.as_deref() == Some(name.as_str()))
                .map(|port| port.port),
            None => ports.first().map(|port| port.port),
        }
    }
}

#[async_trait]
impl InstanceDiscovery for KubernetesDiscovery {
    async fn instances(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>> {
        let groups = self
            .topology
            .endpoint_groups(&self.namespace, service_name)
            .await
            .map_err(|e| ZoneAffinityError::discovery(format!(
                "Failed to discover instances of {}: {}",
                service_name, e
            )))?;

        let service_labels = self
            .catalog
            .service_labels(&self.namespace, service_name)
            .await?
            .unwrap_or_default();
        let pods = self.pods_by_name(&groups).await;

        let mut instances = Vec::new();
        for group in &groups {
            let Some(port) = self.select_port(&group.ports) else {
                warn!(
                    service = %service_name,
                    group = %group.name,
                    port_name = self.settings.port_name.as_deref().unwrap_or("<first>"),
                    "EndpointSlice has no matching port, skipping"
                );
                continue;
            };

            for endpoint in group.endpoints.iter().filter(|endpoint| endpoint.ready) {
                let pod = endpoint.target_pod.as_ref().and_then(|name| pods.get(name));

                for address in &endpoint.addresses {
                    let id = endpoint
                        .target_uid
                        .clone()
                        .or_else(|| pod.and_then(|pod| pod.uid.clone()))
                        .unwrap_or_else(|| format!("{}:{}", address, port));

                    let mut instance = Instance::new(id, service_name, address.as_str(), port);
                    instance.attributes.service = service_attributes(
                        &service_labels,
                        &self.settings.namespace_attribute,
                        &self.namespace,
                    );
                    if let Some(pod) = pod {
                        instance.attributes.pod = Some(PodMetadata {
                            labels: pod.labels.clone(),
                            annotations: pod.annotations.clone(),
                        });
                    }
                    instances.push(instance);
                }
            }
        }

        debug!(
            service = %service_name,
            groups = groups.len(),
            instances = instances.len(),
            "Discovered instances"
        );
        Ok(instances)
    }

    async fn services(&self) -> ZoneAffinityResult<Vec<String>> {
        self.catalog.service_names(&self.namespace).await
    }

    fn description(&self) -> String {
        format!("Kubernetes EndpointSlice discovery (namespace {})", self.namespace)
    }
}

fn service_attributes(
    labels: &BTreeMap<String, String>,
    namespace_attribute: &str,
    namespace: &str,
) -> HashMap<String, String> {
    let mut attributes: HashMap<String, String> =
        labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    attributes.insert(namespace_attribute.to_string(), namespace.to_string());
    attributes
}

/// In-memory discovery for testing and simple deployments
#[derive(Default)]
pub struct StaticDiscovery {
    instances: DashMap<String, Vec<Instance>>,
    fail: AtomicBool,
}

impl StaticDiscovery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instance to its service's list
    pub fn add_static_instance(&self, instance: Instance) {
        self.instances
            .entry(instance.service_name.clone())
            .or_default()
            .push(instance);
    }

    pub fn set_instances(&self, service_name: &str, instances: Vec<Instance>) {
        self.instances.insert(service_name.to_string(), instances);
    }

    pub fn remove_instance(&self, service_name: &str, instance_id: &str) {
        if let Some(mut instances) = self.instances.get_mut(service_name) {
            instances.retain(|instance| instance.id != instance_id);
        }
    }

    /// Make every subsequent `instances` call fail
    pub fn fail_discovery(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl InstanceDiscovery for StaticDiscovery {
    async fn instances(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ZoneAffinityError::discovery(format!(
                "Static discovery unavailable for {}",
                service_name
            )));
        }

        Ok(self
            .instances
            .get(service_name)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }

    async fn services(&self) -> ZoneAffinityResult<Vec<String>> {
        let mut names: Vec<String> = self.instances.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    fn description(&self) -> String {
        "Static discovery".to_string()
    }
}
