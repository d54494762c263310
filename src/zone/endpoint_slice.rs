//! # EndpointSlice Strategy
//!
//! Resolves zones from topology-aware endpoint records. `refresh` rebuilds
//! the service's `ZoneCache` from the current EndpointSlices and
//! `resolve_zone` is a plain map lookup by instance IP.
//!
//! The cache is refreshed on every selection cycle, even when the instance
//! list has not changed.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

use crate::core::error::ZoneAffinityResult;
use crate::core::types::Instance;
use crate::observability::metrics::record_cache_entries;
use crate::registry::EndpointTopologySource;
use crate::zone::cache::ZoneCache;
use crate::zone::resolver::ZoneResolver;

pub struct EndpointSliceResolver {
    topology: Arc<dyn EndpointTopologySource>,
    namespace: String,
    caches: DashMap<String, Arc<ZoneCache>>,
}

impl EndpointSliceResolver {
    pub fn new(topology: Arc<dyn EndpointTopologySource>, namespace: impl Into<String>) -> Self {
        Self {
            topology,
            namespace: namespace.into(),
            caches: DashMap::new(),
        }
    }

    /// The cache for a service, if it has been refreshed at least once
    pub fn cache(&self, service_name: &str) -> Option<Arc<ZoneCache>> {
        self.caches.get(service_name).map(|entry| entry.value().clone())
    }

    fn cache_for(&self, service_name: &str) -> Arc<ZoneCache> {
        self.caches
            .entry(service_name.to_string())
            .or_insert_with(|| Arc::new(ZoneCache::new(service_name)))
            .value()
            .clone()
    }
}

#[async_trait]
impl ZoneResolver for EndpointSliceResolver {
    async fn refresh(&self, service_name: &str) -> ZoneAffinityResult<()> {
        let cache = self.cache_for(service_name);

        match self.topology.endpoint_groups(&self.namespace, service_name).await {
            Ok(groups) => {
                let entries = cache.rebuild(&groups);
                record_cache_entries(service_name, entries);
                debug!(
                    service = %service_name,
                    groups = groups.len(),
                    entries,
                    "Rebuilt zone cache"
                );
                Ok(())
            }
            Err(e) => {
                // Never serve the previous snapshot after a failed refresh
                cache.clear();
                record_cache_entries(service_name, 0);
                debug!(service = %service_name, error = %e, "Zone cache refresh failed, cache cleared");
                Err(e)
            }
        }
    }

    async fn resolve_zone(&self, service_name: &str, instance: &Instance) -> ZoneAffinityResult<Option<String>> {
        Ok(self
            .cache(service_name)
            .and_then(|cache| cache.zone_for_host(&instance.host)))
    }

    fn strategy_name(&self) -> &'static str {
        "endpoint_slice"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{EndpointGroup, StaticRegistry, TopologyEndpoint};

    fn slice(endpoints: Vec<TopologyEndpoint>) -> Vec<EndpointGroup> {
        vec![EndpointGroup {
            name: "sample-service-x1".to_string(),
            endpoints,
            ports: Vec::new(),
        }]
    }

    #[tokio::test]
    async fn test_resolve_before_refresh_is_absent() {
        let registry = Arc::new(StaticRegistry::new());
        let resolver = EndpointSliceResolver::new(registry, "lb-demo");

        let instance = Instance::new("a", "sample-service", "10.0.0.1", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &instance).await.unwrap(), None);
        assert!(resolver.cache("sample-service").is_none());
    }

    #[tokio::test]
    async fn test_caches_are_scoped_per_service() {
        let registry = Arc::new(StaticRegistry::new());
        registry.set_endpoint_groups(
            "lb-demo",
            "sample-service",
            slice(vec![TopologyEndpoint::new(Some("zone-a"), ["10.0.0.1"])]),
        );
        let resolver = EndpointSliceResolver::new(registry, "lb-demo");
        resolver.refresh("sample-service").await.unwrap();
        resolver.refresh("other-service").await.unwrap();

        let same_ip_other_service = Instance::new("b", "other-service", "10.0.0.1", 8080);
        assert_eq!(resolver.resolve_zone("other-service", &same_ip_other_service).await.unwrap(), None);

        let instance = Instance::new("a", "sample-service", "10.0.0.1", 8080);
        assert_eq!(resolver.resolve_zone("sample-service", &instance).await.unwrap().as_deref(), Some("zone-a"));
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_cache() {
        let registry = Arc::new(StaticRegistry::new());
        registry.set_endpoint_groups(
            "lb-demo",
            "sample-service",
            slice(vec![TopologyEndpoint::new(Some("zone-a"), ["10.0.0.1"])]),
        );
        let resolver = EndpointSliceResolver::new(registry.clone(), "lb-demo");
        resolver.refresh("sample-service").await.unwrap();
        assert_eq!(resolver.cache("sample-service").map(|c| c.len()), Some(1));

        registry.fail_topology_listing(true);
        assert!(resolver.refresh("sample-service").await.is_err());
        assert_eq!(resolver.cache("sample-service").map(|c| c.len()), Some(0));
    }
}
