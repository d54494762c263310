//! Zone strategies that read labels already attached to the instance.
//!
//! Neither strategy talks to a collaborator, so neither ever fails.

use async_trait::async_trait;
use tracing::debug;

use crate::core::error::ZoneAffinityResult;
use crate::core::types::{Instance, ZoneLabelKeys};
use crate::zone::resolver::ZoneResolver;

/// Reads the zone from the pod-level `labels` partition
///
/// Instances from a discovery backend without a pod-level partition
/// resolve to no zone.
#[derive(Debug, Clone, Default)]
pub struct PodMetadataResolver {
    keys: ZoneLabelKeys,
}

impl PodMetadataResolver {
    pub fn new(keys: ZoneLabelKeys) -> Self {
        Self { keys }
    }

    pub fn zone_of(&self, instance: &Instance) -> Option<String> {
        let pod = instance.attributes.pod.as_ref()?;
        self.keys.lookup(|key| pod.labels.get(key)).map(str::to_string)
    }
}

#[async_trait]
impl ZoneResolver for PodMetadataResolver {
    async fn resolve_zone(&self, _service_name: &str, instance: &Instance) -> ZoneAffinityResult<Option<String>> {
        let zone = self.zone_of(instance);
        if zone.is_none() && instance.attributes.pod.is_none() {
            debug!(instance_id = %instance.id, "Instance has no pod-level metadata");
        }
        Ok(zone)
    }

    fn strategy_name(&self) -> &'static str {
        "pod_metadata"
    }
}

/// Reads the zone from service-level attributes only
///
/// This is what a zone-agnostic consumer sees. It finds a zone only after
/// enrichment has copied one into the service-level partition.
#[derive(Debug, Clone, Default)]
pub struct ServiceMetadataResolver {
    keys: ZoneLabelKeys,
}

impl ServiceMetadataResolver {
    pub fn new(keys: ZoneLabelKeys) -> Self {
        Self { keys }
    }

    pub fn zone_of(&self, instance: &Instance) -> Option<String> {
        self.keys
            .lookup(|key| instance.attributes.service.get(key))
            .map(str::to_string)
    }
}

#[async_trait]
impl ZoneResolver for ServiceMetadataResolver {
    async fn resolve_zone(&self, _service_name: &str, instance: &Instance) -> ZoneAffinityResult<Option<String>> {
        Ok(self.zone_of(instance))
    }

    fn strategy_name(&self) -> &'static str {
        "service_metadata"
    }
}
