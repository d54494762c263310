//! The `select(service_name)` entry point: discovery, zone refresh and
//! selection in one call.

use std::sync::Arc;
use tracing::{error, warn};

use crate::core::error::ZoneAffinityResult;
use crate::core::types::{ClientZone, Instance};
use crate::discovery::InstanceDiscovery;
use crate::load_balancing::selector::{ZonePreferenceSelector, ZoneSelection};
use crate::observability::metrics::record_resolution_failure;
use crate::zone::ZoneResolver;

pub struct ZoneAwareSupplier {
    discovery: Arc<dyn InstanceDiscovery>,
    selector: ZonePreferenceSelector,
}

impl ZoneAwareSupplier {
    pub fn new(
        discovery: Arc<dyn InstanceDiscovery>,
        resolver: Arc<dyn ZoneResolver>,
        client_zone: ClientZone,
    ) -> Self {
        Self {
            discovery,
            selector: ZonePreferenceSelector::new(resolver, client_zone),
        }
    }

    /// Instances of `service_name` to call, same-zone first
    ///
    /// Only a discovery failure is returned as an error.
    pub async fn select(&self, service_name: &str) -> ZoneAffinityResult<Vec<Instance>> {
        Ok(self.select_with_outcome(service_name).await?.instances)
    }

    pub async fn select_with_outcome(&self, service_name: &str) -> ZoneAffinityResult<ZoneSelection> {
        let instances = self.discovery.instances(service_name).await?;

        if self.selector.client_zone().is_enabled() {
            let resolver = self.selector.resolver();
            match resolver.refresh(service_name).await {
                Ok(()) => {}
                Err(e) if e.is_collaborator_failure() => {
                    warn!(
                        service = %service_name,
                        strategy = resolver.strategy_name(),
                        error = %e,
                        "Zone refresh failed, zones will resolve as absent"
                    );
                    record_resolution_failure(resolver.strategy_name(), e.collaborator_name());
                }
                Err(e) => {
                    error!(
                        service = %service_name,
                        strategy = resolver.strategy_name(),
                        error = %e,
                        error_type = e.error_type(),
                        "Unexpected zone refresh error"
                    );
                }
            }
        }

        Ok(self.selector.select_with_outcome(service_name, instances).await)
    }
}
