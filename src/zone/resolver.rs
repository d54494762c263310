//! # Zone Resolver Contract
//!
//! Every zone strategy sits behind `ZoneResolver`. The concrete strategy is
//! chosen once, from configuration, by `create_zone_resolver`; callers never
//! inspect instances to decide how to resolve them.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::core::config::{ZoneAffinityConfig, ZoneStrategy};
use crate::core::error::ZoneAffinityResult;
use crate::core::types::Instance;
use crate::registry::{EndpointTopologySource, PodRegistry};
use crate::zone::chained::ChainedResolver;
use crate::zone::direct::DirectLookupResolver;
use crate::zone::endpoint_slice::EndpointSliceResolver;
use crate::zone::metadata::{PodMetadataResolver, ServiceMetadataResolver};

/// Determines the zone an instance runs in
///
/// `Ok(None)` means the zone could not be determined, which is never an
/// error. `Err` is reserved for collaborator failures; callers degrade those
/// to an absent zone.
#[async_trait]
pub trait ZoneResolver: Send + Sync {
    /// Rebuild any per-service state before a selection cycle
    ///
    /// Must complete before `resolve_zone` is called for instances of the
    /// same service in that cycle.
    async fn refresh(&self, _service_name: &str) -> ZoneAffinityResult<()> {
        Ok(())
    }

    /// Zone of a single instance of `service_name`
    ///
    /// `service_name` is the name the selection cycle was requested for,
    /// which need not equal `instance.service_name`.
    async fn resolve_zone(
        &self,
        service_name: &str,
        instance: &Instance,
    ) -> ZoneAffinityResult<Option<String>>;

    /// Strategy name for logs and metrics labels
    fn strategy_name(&self) -> &'static str;
}

/// Build the resolver for the configured strategy
pub fn create_zone_resolver(
    config: &ZoneAffinityConfig,
    pods: Arc<dyn PodRegistry>,
    topology: Arc<dyn EndpointTopologySource>,
) -> Arc<dyn ZoneResolver> {
    let resolver = build(&config.strategy, config, &pods, &topology);
    info!(
        strategy = resolver.strategy_name(),
        namespace = %config.namespace,
        "Created zone resolver"
    );
    resolver
}

fn build(
    strategy: &ZoneStrategy,
    config: &ZoneAffinityConfig,
    pods: &Arc<dyn PodRegistry>,
    topology: &Arc<dyn EndpointTopologySource>,
) -> Arc<dyn ZoneResolver> {
    match strategy {
        ZoneStrategy::DirectLookup => Arc::new(DirectLookupResolver::new(
            pods.clone(),
            config.namespace.clone(),
            config.discovery.namespace_attribute.clone(),
            config.zone_labels.clone(),
        )),
        ZoneStrategy::PodMetadata => Arc::new(PodMetadataResolver::new(config.zone_labels.clone())),
        ZoneStrategy::EndpointSlice => Arc::new(EndpointSliceResolver::new(
            topology.clone(),
            config.namespace.clone(),
        )),
        ZoneStrategy::ServiceMetadata => {
            Arc::new(ServiceMetadataResolver::new(config.zone_labels.clone()))
        }
        ZoneStrategy::Chained { order } => Arc::new(ChainedResolver::new(
            order
                .iter()
                .map(|member| build(member, config, pods, topology))
                .collect(),
        )),
    }
}
