//! # Direct Lookup Strategy
//!
//! Resolves an instance's zone by listing every pod in the instance's
//! namespace and scanning for the one that reports the instance's IP.
//!
//! This costs one full pod list per instance per selection cycle. It is
//! fine for demo-scale registries; for anything larger, index pods by IP
//! from a watch stream or use `EndpointSliceResolver`.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::core::error::ZoneAffinityResult;
use crate::core::types::{Instance, ZoneLabelKeys};
use crate::registry::{PodRecord, PodRegistry};
use crate::zone::resolver::ZoneResolver;

pub struct DirectLookupResolver {
    pods: Arc<dyn PodRegistry>,
    default_namespace: String,
    namespace_attribute: String,
    keys: ZoneLabelKeys,
}

impl DirectLookupResolver {
    pub fn new(
        pods: Arc<dyn PodRegistry>,
        default_namespace: impl Into<String>,
        namespace_attribute: impl Into<String>,
        keys: ZoneLabelKeys,
    ) -> Self {
        Self {
            pods,
            default_namespace: default_namespace.into(),
            namespace_attribute: namespace_attribute.into(),
            keys,
        }
    }

    /// Namespace an instance lives in, from its service-level attributes
    fn namespace_of<'a>(&'a self, instance: &'a Instance) -> &'a str {
        instance
            .attributes
            .service
            .get(&self.namespace_attribute)
            .map(String::as_str)
            .filter(|namespace| !namespace.is_empty())
            .unwrap_or(self.default_namespace.as_str())
    }
}

#[async_trait]
impl ZoneResolver for DirectLookupResolver {
    async fn resolve_zone(&self, _service_name: &str, instance: &Instance) -> ZoneAffinityResult<Option<String>> {
        let Some(ip) = instance.ip() else {
            warn!(instance_id = %instance.id, host = %instance.host, "Instance host is not an IP address");
            return Ok(None);
        };

        let namespace = self.namespace_of(instance);
        let pods = self.pods.list_pods(namespace).await?;

        // First match wins while two pods briefly share an IP during churn
        let Some(pod) = pods.iter().find(|pod| pod.ip == Some(ip)) else {
            debug!(host = %instance.host, namespace = %namespace, "No pod found for instance IP");
            return Ok(None);
        };

        let zone = zone_label(pod, &self.keys);
        debug!(
            host = %instance.host,
            pod = %pod.name,
            zone = zone.as_deref().unwrap_or("none"),
            "Resolved zone from pod registry"
        );
        Ok(zone)
    }

    fn strategy_name(&self) -> &'static str {
        "direct_lookup"
    }
}

fn zone_label(pod: &PodRecord, keys: &ZoneLabelKeys) -> Option<String> {
    keys.lookup(|key| pod.labels.get(key)).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::collaborator;
    use crate::core::types::TOPOLOGY_ZONE_KEY;
    use crate::registry::StaticRegistry;

    fn resolver(registry: Arc<StaticRegistry>) -> DirectLookupResolver {
        DirectLookupResolver::new(registry, "lb-demo", "k8s_namespace", ZoneLabelKeys::default())
    }

    fn pod(name: &str, namespace: &str, ip: &str) -> PodRecord {
        PodRecord::new(name, namespace, Some(ip.parse().unwrap()))
    }

    #[tokio::test]
    async fn test_resolves_zone_by_pod_ip() {
        let registry = Arc::new(StaticRegistry::new());
        registry.add_pod(pod("sample-a", "lb-demo", "10.1.0.4").with_label("zone", "zone-a"));
        registry.add_pod(pod("sample-b", "lb-demo", "10.1.0.5").with_label(TOPOLOGY_ZONE_KEY, "zone-b"));

        let resolver = resolver(registry);
        let a = Instance::new("a", "sample-service", "10.1.0.4", 8080);
        let b = Instance::new("b", "sample-service", "10.1.0.5", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &a).await.unwrap().as_deref(), Some("zone-a"));
        assert_eq!(resolver.resolve_zone("sample-service", &b).await.unwrap().as_deref(), Some("zone-b"));
    }

    #[tokio::test]
    async fn test_namespace_attribute_overrides_default() {
        let registry = Arc::new(StaticRegistry::new());
        registry.add_pod(pod("sample-a", "payments", "10.1.0.4").with_label("zone", "zone-a"));

        let resolver = resolver(registry);
        let default_ns = Instance::new("a", "sample-service", "10.1.0.4", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &default_ns).await.unwrap(), None);

        let scoped = default_ns.with_service_attribute("k8s_namespace", "payments");
        assert_eq!(resolver.resolve_zone("sample-service", &scoped).await.unwrap().as_deref(), Some("zone-a"));
    }

    #[tokio::test]
    async fn test_first_pod_with_shared_ip_wins() {
        let registry = Arc::new(StaticRegistry::new());
        registry.add_pod(pod("old", "lb-demo", "10.1.0.4").with_label("zone", "zone-a"));
        registry.add_pod(pod("new", "lb-demo", "10.1.0.4").with_label("zone", "zone-b"));

        let instance = Instance::new("a", "sample-service", "10.1.0.4", 8080);
        assert_eq!(resolver(registry).resolve_zone("sample-service", &instance).await.unwrap().as_deref(), Some("zone-a"));
    }

    #[tokio::test]
    async fn test_unlabelled_pod_and_hostname_resolve_to_none() {
        let registry = Arc::new(StaticRegistry::new());
        registry.add_pod(pod("bare", "lb-demo", "10.1.0.4"));
        let resolver = resolver(registry.clone());

        let instance = Instance::new("a", "sample-service", "10.1.0.4", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &instance).await.unwrap(), None);

        let named = Instance::new("b", "sample-service", "sample.lb-demo.svc", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &named).await.unwrap(), None);
        assert_eq!(registry.pod_list_calls(), 1);
    }

    #[tokio::test]
    async fn test_pod_registry_failure_is_returned() {
        let registry = Arc::new(StaticRegistry::new());
        registry.fail_pod_listing(true);

        let instance = Instance::new("a", "sample-service", "10.1.0.4", 8080);
        let err = resolver(registry).resolve_zone("sample-service", &instance).await.unwrap_err();
        assert_eq!(err.collaborator_name(), collaborator::POD_REGISTRY);
    }
}
