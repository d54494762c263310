//! # Metadata Enrichment Adapter
//!
//! Copies an instance's zone from its pod-level labels into its
//! service-level attributes, under both the primary and the fallback zone
//! key. A generic zone-preference selector that reads service-level
//! attributes only can then filter on zone without knowing about pods.
//!
//! Existing service-level values are never overwritten. The adapter does
//! no filtering of its own.

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::ZoneAffinityResult;
use crate::core::types::{Instance, ZoneLabelKeys};
use crate::discovery::InstanceDiscovery;

/// Instance with its pod zone exposed in the service-level partition
///
/// Returned unchanged when the pod-level partition carries no zone.
pub fn enrich_instance(mut instance: Instance, keys: &ZoneLabelKeys) -> Instance {
    let Some(zone) = instance
        .attributes
        .pod
        .as_ref()
        .and_then(|pod| keys.lookup(|key| pod.labels.get(key)))
        .map(str::to_string)
    else {
        return instance;
    };

    for key in keys.keys() {
        instance
            .attributes
            .service
            .entry(key.to_string())
            .or_insert_with(|| zone.clone());
    }
    instance
}

/// Discovery decorator that enriches every instance it returns
pub struct ZoneEnrichingDiscovery<D> {
    inner: D,
    keys: ZoneLabelKeys,
}

impl<D: InstanceDiscovery> ZoneEnrichingDiscovery<D> {
    pub fn new(inner: D, keys: ZoneLabelKeys) -> Self {
        Self { inner, keys }
    }

    /// Current instances of a service, enriched, in discovery order
    pub async fn enrich(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>> {
        let instances = self.inner.instances(service_name).await?;
        let total = instances.len();

        let enriched: Vec<Instance> = instances
            .into_iter()
            .map(|instance| enrich_instance(instance, &self.keys))
            .collect();

        debug!(
            service = %service_name,
            instances = total,
            with_zone = enriched
                .iter()
                .filter(|i| self.keys.lookup(|key| i.attributes.service.get(key)).is_some())
                .count(),
            "Enriched instance metadata"
        );
        Ok(enriched)
    }
}

#[async_trait]
impl<D: InstanceDiscovery> InstanceDiscovery for ZoneEnrichingDiscovery<D> {
    async fn instances(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>> {
        self.enrich(service_name).await
    }

    async fn services(&self) -> ZoneAffinityResult<Vec<String>> {
        self.inner.services().await
    }

    fn description(&self) -> String {
        format!("Zone enriching {}", self.inner.description())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{PodMetadata, TOPOLOGY_ZONE_KEY};

    #[test]
    fn test_enrich_copies_zone_under_both_keys() {
        let instance = Instance::new("a", "svc", "10.0.0.1", 80)
            .with_pod_metadata(PodMetadata::with_labels([(TOPOLOGY_ZONE_KEY, "zone-a")]));
        let enriched = enrich_instance(instance, &ZoneLabelKeys::default());

        assert_eq!(enriched.attributes.service.get("zone").map(String::as_str), Some("zone-a"));
        assert_eq!(
            enriched.attributes.service.get(TOPOLOGY_ZONE_KEY).map(String::as_str),
            Some("zone-a")
        );
    }

    #[test]
    fn test_enrich_without_pod_zone_is_identity() {
        let instance = Instance::new("a", "svc", "10.0.0.1", 80).with_service_attribute("app", "svc");
        assert_eq!(enrich_instance(instance.clone(), &ZoneLabelKeys::default()), instance);
    }
}
