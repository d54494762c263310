//! # Registry Snapshot Accessor
//!
//! Reads raw pod, endpoint-topology and service records from the cluster
//! control plane. Each trait is one collaborator boundary; the zone
//! strategies and the Kubernetes discovery source only ever talk to these
//! traits, so tests can swap in `StaticRegistry`.
//!
//! Records are converted out of the `k8s-openapi` types at this boundary.
//! Nothing above this module sees a Kubernetes object.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::api::discovery::v1::{Endpoint, EndpointSlice};
use kube::api::{Api, ListParams};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tracing::debug;

use crate::core::error::{collaborator, ZoneAffinityError, ZoneAffinityResult};

/// Label EndpointSlices carry to name the Service they back
pub const SERVICE_NAME_LABEL: &str = "kubernetes.io/service-name";

/// A pod as seen by the pod registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub name: String,
    pub namespace: String,
    pub uid: Option<String>,
    /// Reported pod IP; `None` while the pod is still being scheduled
    pub ip: Option<IpAddr>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

impl PodRecord {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, ip: Option<IpAddr>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            uid: None,
            ip,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// One topology-aware endpoint: a zone plus the addresses it covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyEndpoint {
    pub zone: Option<String>,
    pub addresses: Vec<String>,
    /// Unset readiness counts as ready
    pub ready: bool,
    /// Name of the pod this endpoint targets
    pub target_pod: Option<String>,
    pub target_uid: Option<String>,
}

impl TopologyEndpoint {
    pub fn new<I, S>(zone: Option<&str>, addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            zone: zone.map(str::to_string),
            addresses: addresses.into_iter().map(Into::into).collect(),
            ready: true,
            target_pod: None,
            target_uid: None,
        }
    }

    pub fn targeting(mut self, pod: impl Into<String>) -> Self {
        self.target_pod = Some(pod.into());
        self
    }
}

/// A port published by an endpoint group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPort {
    pub name: Option<String>,
    pub port: u16,
}

/// A group of endpoints backing one service (one EndpointSlice)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointGroup {
    pub name: String,
    pub endpoints: Vec<TopologyEndpoint>,
    pub ports: Vec<GroupPort>,
}

/// Pod registry collaborator, used by the direct-lookup strategy and by
/// the Kubernetes discovery source
#[async_trait]
pub trait PodRegistry: Send + Sync {
    /// All pods in a namespace
    async fn list_pods(&self, namespace: &str) -> ZoneAffinityResult<Vec<PodRecord>>;
}

/// Endpoint topology collaborator, used by the EndpointSlice strategy
#[async_trait]
pub trait EndpointTopologySource: Send + Sync {
    /// All endpoint groups labelled as backing `service_name`
    async fn endpoint_groups(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Vec<EndpointGroup>>;
}

/// Service catalog collaborator, used by the Kubernetes discovery source
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Labels of a service, `None` when the service does not exist
    async fn service_labels(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Option<BTreeMap<String, String>>>;

    /// Names of all services in a namespace
    async fn service_names(&self, namespace: &str) -> ZoneAffinityResult<Vec<String>>;
}

/// Kubernetes API backed registry implementing all three collaborators
#[derive(Clone)]
pub struct KubeRegistry {
    client: kube::Client,
}

impl KubeRegistry {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }

    /// Connect with an explicit kubeconfig, or the in-cluster/default config
    pub async fn connect(kubeconfig_path: Option<&str>) -> ZoneAffinityResult<Self> {
        let client = if let Some(kubeconfig_path) = kubeconfig_path {
            let kubeconfig = kube::config::Kubeconfig::read_from(kubeconfig_path)
                .map_err(|e| ZoneAffinityError::config(format!("Failed to read kubeconfig: {}", e)))?;
            let config = kube::Config::from_custom_kubeconfig(kubeconfig, &Default::default())
                .await
                .map_err(|e| ZoneAffinityError::config(format!("Failed to create kube config: {}", e)))?;
            kube::Client::try_from(config)
                .map_err(|e| ZoneAffinityError::config(format!("Failed to create kube client: {}", e)))?
        } else {
            kube::Client::try_default()
                .await
                .map_err(|e| ZoneAffinityError::config(format!("Failed to create default kube client: {}", e)))?
        };

        Ok(Self::new(client))
    }
}

#[async_trait]
impl PodRegistry for KubeRegistry {
    async fn list_pods(&self, namespace: &str) -> ZoneAffinityResult<Vec<PodRecord>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let pod_list = pods
            .list(&ListParams::default())
            .await
            .map_err(|e| ZoneAffinityError::collaborator(
                collaborator::POD_REGISTRY,
                format!("Failed to list pods in namespace {}: {}", namespace, e),
            ))?;

        debug!(namespace = %namespace, pods = pod_list.items.len(), "Listed pods");
        Ok(pod_list.items.into_iter().map(pod_record).collect())
    }
}

#[async_trait]
impl EndpointTopologySource for KubeRegistry {
    async fn endpoint_groups(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Vec<EndpointGroup>> {
        let slices: Api<EndpointSlice> = Api::namespaced(self.client.clone(), namespace);
        let selector = format!("{}={}", SERVICE_NAME_LABEL, service_name);
        let slice_list = slices
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| ZoneAffinityError::collaborator(
                collaborator::ENDPOINT_TOPOLOGY,
                format!("Failed to list EndpointSlices for {}/{}: {}", namespace, service_name, e),
            ))?;

        debug!(
            namespace = %namespace,
            service = %service_name,
            slices = slice_list.items.len(),
            "Listed EndpointSlices"
        );
        Ok(slice_list.items.into_iter().map(endpoint_group).collect())
    }
}

#[async_trait]
impl ServiceCatalog for KubeRegistry {
    async fn service_labels(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Option<BTreeMap<String, String>>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services
            .get_opt(service_name)
            .await
            .map_err(|e| ZoneAffinityError::discovery(
                format!("Failed to get service {}/{}: {}", namespace, service_name, e),
            ))?;

        Ok(service.map(|s| s.metadata.labels.unwrap_or_default()))
    }

    async fn service_names(&self, namespace: &str) -> ZoneAffinityResult<Vec<String>> {
        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service_list = services
            .list(&ListParams::default())
            .await
            .map_err(|e| ZoneAffinityError::discovery(
                format!("Failed to list services in namespace {}: {}", namespace, e),
            ))?;

        Ok(service_list
            .items
            .into_iter()
            .filter_map(|s| s.metadata.name)
            .collect())
    }
}

fn pod_record(pod: Pod) -> PodRecord {
    let ip = pod
        .status
        .as_ref()
        .and_then(|status| status.pod_ip.as_deref())
        .and_then(|ip| ip.parse().ok());

    PodRecord {
        name: pod.metadata.name.unwrap_or_default(),
        namespace: pod.metadata.namespace.unwrap_or_default(),
        uid: pod.metadata.uid,
        ip,
        labels: pod.metadata.labels.unwrap_or_default(),
        annotations: pod.metadata.annotations.unwrap_or_default(),
    }
}

fn endpoint_group(slice: EndpointSlice) -> EndpointGroup {
    let ports = slice
        .ports
        .unwrap_or_default()
        .into_iter()
        .filter_map(|port| {
            let number = port.port.and_then(|p| u16::try_from(p).ok())?;
            Some(GroupPort { name: port.name, port: number })
        })
        .collect();

    EndpointGroup {
        name: slice.metadata.name.unwrap_or_default(),
        endpoints: slice.endpoints.into_iter().map(topology_endpoint).collect(),
        ports,
    }
}

fn topology_endpoint(endpoint: Endpoint) -> TopologyEndpoint {
    let ready = endpoint
        .conditions
        .as_ref()
        .and_then(|conditions| conditions.ready)
        .unwrap_or(true);
    let (target_pod, target_uid) = match endpoint.target_ref {
        Some(target) if target.kind.as_deref().map_or(true, |kind| kind == "Pod") => {
            (target.name, target.uid)
        }
        _ => (None, None),
    };

    TopologyEndpoint {
        zone: endpoint.zone,
        addresses: endpoint.addresses,
        ready,
        target_pod,
        target_uid,
    }
}

/// In-memory registry for tests and static deployments
///
/// Failure injection flips a collaborator into returning errors, and call
/// counters expose how often each collaborator was queried.
#[derive(Default)]
pub struct StaticRegistry {
    pods: RwLock<Vec<PodRecord>>,
    groups: RwLock<HashMap<(String, String), Vec<EndpointGroup>>>,
    services: RwLock<HashMap<(String, String), BTreeMap<String, String>>>,
    fail_pods: AtomicBool,
    fail_topology: AtomicBool,
    pod_list_calls: AtomicUsize,
    topology_calls: AtomicUsize,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_pod(&self, pod: PodRecord) {
        self.pods.write().push(pod);
    }

    /// Replace the endpoint groups backing a service
    pub fn set_endpoint_groups(&self, namespace: &str, service_name: &str, groups: Vec<EndpointGroup>) {
        self.groups
            .write()
            .insert((namespace.to_string(), service_name.to_string()), groups);
    }

    pub fn add_service(&self, namespace: &str, service_name: &str, labels: BTreeMap<String, String>) {
        self.services
            .write()
            .insert((namespace.to_string(), service_name.to_string()), labels);
    }

    pub fn fail_pod_listing(&self, fail: bool) {
        self.fail_pods.store(fail, Ordering::SeqCst);
    }

    pub fn fail_topology_listing(&self, fail: bool) {
        self.fail_topology.store(fail, Ordering::SeqCst);
    }

    pub fn pod_list_calls(&self) -> usize {
        self.pod_list_calls.load(Ordering::SeqCst)
    }

    pub fn topology_calls(&self) -> usize {
        self.topology_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PodRegistry for StaticRegistry {
    async fn list_pods(&self, namespace: &str) -> ZoneAffinityResult<Vec<PodRecord>> {
        self.pod_list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pods.load(Ordering::SeqCst) {
            return Err(ZoneAffinityError::collaborator(
                collaborator::POD_REGISTRY,
                format!("pods is forbidden in namespace {}", namespace),
            ));
        }

        Ok(self
            .pods
            .read()
            .iter()
            .filter(|pod| pod.namespace == namespace)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EndpointTopologySource for StaticRegistry {
    async fn endpoint_groups(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Vec<EndpointGroup>> {
        self.topology_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_topology.load(Ordering::SeqCst) {
            return Err(ZoneAffinityError::collaborator(
                collaborator::ENDPOINT_TOPOLOGY,
                format!("endpointslices is forbidden in namespace {}", namespace),
            ));
        }

        Ok(self
            .groups
            .read()
            .get(&(namespace.to_string(), service_name.to_string()))
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ServiceCatalog for StaticRegistry {
    async fn service_labels(
        &self,
        namespace: &str,
        service_name: &str,
    ) -> ZoneAffinityResult<Option<BTreeMap<String, String>>> {
        Ok(self
            .services
            .read()
            .get(&(namespace.to_string(), service_name.to_string()))
            .cloned())
    }

    async fn service_names(&self, namespace: &str) -> ZoneAffinityResult<Vec<String>> {
        let mut names: Vec<String> = self
            .services
            .read()
            .keys()
            .filter(|(ns, _)| ns == namespace)
            .map(|(_, name)| name.clone())
            .collect();
        names.sort();
        Ok(names)
    }
}
