//! # Zone Preference Selector
//!
//! Filters an instance list down to the instances in the client's zone,
//! falling back to the full list when none match. Availability wins over
//! strict zone isolation.
//!
//! ## Guarantees
//!
//! - Affinity disabled (empty or `"unknown"` client zone): the input is
//!   returned untouched and no zone is resolved
//! - Never returns an empty list unless the input was empty
//! - A missing zone, or a collaborator failure while resolving one, counts
//!   as "does not match" and never surfaces as an error

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::core::types::{ClientZone, Instance};
use crate::observability::metrics::{record_resolution_failure, record_selection};
use crate::zone::ZoneResolver;

/// Which branch a selection took
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectionOutcome {
    /// Affinity disabled, input returned as-is
    Disabled,
    /// Filtered to same-zone instances
    SameZone,
    /// No same-zone instance, full list returned
    Fallback,
}

impl SelectionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionOutcome::Disabled => "disabled",
            SelectionOutcome::SameZone => "same_zone",
            SelectionOutcome::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for SelectionOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one selection
#[derive(Debug, Clone)]
pub struct ZoneSelection {
    pub instances: Vec<Instance>,
    pub outcome: SelectionOutcome,
}

pub struct ZonePreferenceSelector {
    resolver: Arc<dyn ZoneResolver>,
    client_zone: ClientZone,
}

impl ZonePreferenceSelector {
    pub fn new(resolver: Arc<dyn ZoneResolver>, client_zone: ClientZone) -> Self {
        info!(
            client_zone = %client_zone,
            strategy = resolver.strategy_name(),
            affinity_enabled = client_zone.is_enabled(),
            "Created zone preference selector"
        );
        Self { resolver, client_zone }
    }

    pub fn client_zone(&self) -> &ClientZone {
        &self.client_zone
    }

    pub fn resolver(&self) -> &Arc<dyn ZoneResolver> {
        &self.resolver
    }

    /// Same-zone instances of `service`, or all of them when none match
    pub async fn select(&self, service: &str, instances: Vec<Instance>) -> Vec<Instance> {
        self.select_with_outcome(service, instances).await.instances
    }

    pub async fn select_with_outcome(&self, service: &str, instances: Vec<Instance>) -> ZoneSelection {
        let started = Instant::now();
        let selection = self.filter(service, instances).await;
        record_selection(service, selection.outcome.as_str(), started.elapsed());
        selection
    }

    async fn filter(&self, service: &str, instances: Vec<Instance>) -> ZoneSelection {
        if !self.client_zone.is_enabled() {
            debug!(service = %service, "Zone affinity disabled, returning all instances");
            return ZoneSelection {
                instances,
                outcome: SelectionOutcome::Disabled,
            };
        }

        let mut same_zone = Vec::new();
        for instance in &instances {
            let zone = self.zone_of(service, instance).await;
            let matches = self.client_zone.matches(zone.as_deref());
            debug!(
                service = %service,
                instance_id = %instance.id,
                host = %instance.host,
                zone = zone.as_deref().unwrap_or("none"),
                client_zone = %self.client_zone,
                matches,
                "Checked instance zone"
            );
            if matches {
                same_zone.push(instance.clone());
            }
        }

        if same_zone.is_empty() {
            warn!(
                service = %service,
                client_zone = %self.client_zone,
                instances = instances.len(),
                "No instances in client zone, falling back to all instances"
            );
            return ZoneSelection {
                instances,
                outcome: SelectionOutcome::Fallback,
            };
        }

        info!(
            service = %service,
            client_zone = %self.client_zone,
            selected = same_zone.len(),
            total = instances.len(),
            "Filtered instances to client zone"
        );
        ZoneSelection {
            instances: same_zone,
            outcome: SelectionOutcome::SameZone,
        }
    }

    async fn zone_of(&self, service: &str, instance: &Instance) -> Option<String> {
        let strategy = self.resolver.strategy_name();
        match self.resolver.resolve_zone(service, instance).await {
            Ok(zone) => zone,
            Err(e) if e.is_collaborator_failure() => {
                warn!(
                    strategy,
                    instance_id = %instance.id,
                    host = %instance.host,
                    error = %e,
                    "Zone resolution failed, treating zone as absent"
                );
                record_resolution_failure(strategy, e.collaborator_name());
                None
            }
            Err(e) => {
                error!(
                    strategy,
                    instance_id = %instance.id,
                    error = %e,
                    error_type = e.error_type(),
                    "Unexpected zone resolution error, treating zone as absent"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{collaborator, ZoneAffinityError, ZoneAffinityResult};
    use crate::core::types::ZoneLabelKeys;
    use crate::zone::ServiceMetadataResolver;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fails for instance "a", puts everything else in zone-b, and records
    /// the service names it was asked about
    struct ScriptedResolver {
        error: ZoneAffinityError,
        services: Mutex<Vec<String>>,
    }

    impl ScriptedResolver {
        fn failing_with(error: ZoneAffinityError) -> Arc<Self> {
            Arc::new(Self {
                error,
                services: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ZoneResolver for ScriptedResolver {
        async fn resolve_zone(
            &self,
            service_name: &str,
            instance: &Instance,
        ) -> ZoneAffinityResult<Option<String>> {
            self.services.lock().push(service_name.to_string());
            if instance.id == "a" {
                Err(self.error.clone())
            } else {
                Ok(Some("zone-b".to_string()))
            }
        }

        fn strategy_name(&self) -> &'static str {
            "scripted"
        }
    }

    fn instance(id: &str, zone: Option<&str>) -> Instance {
        let instance = Instance::new(id, "sample-service", format!("10.0.0.{}", id.len()), 8080);
        match zone {
            Some(zone) => instance.with_service_attribute("zone", zone),
            None => instance,
        }
    }

    fn selector(client_zone: &str) -> ZonePreferenceSelector {
        ZonePreferenceSelector::new(
            Arc::new(ServiceMetadataResolver::new(ZoneLabelKeys::default())),
            ClientZone::new(client_zone),
        )
    }

    #[tokio::test]
    async fn test_outcomes() {
        let instances = vec![instance("a", Some("zone-a")), instance("bb", Some("zone-b"))];

        let same = selector("zone-a").select_with_outcome("sample-service", instances.clone()).await;
        assert_eq!(same.outcome, SelectionOutcome::SameZone);
        assert_eq!(same.instances.len(), 1);

        let fallback = selector("zone-c").select_with_outcome("sample-service", instances.clone()).await;
        assert_eq!(fallback.outcome, SelectionOutcome::Fallback);
        assert_eq!(fallback.instances, instances);

        let disabled = selector("unknown").select_with_outcome("sample-service", instances.clone()).await;
        assert_eq!(disabled.outcome, SelectionOutcome::Disabled);
        assert_eq!(disabled.instances, instances);
    }

    #[tokio::test]
    async fn test_empty_input_stays_empty() {
        let selection = selector("zone-a").select_with_outcome("sample-service", Vec::new()).await;
        assert!(selection.instances.is_empty());
        assert_eq!(selection.outcome, SelectionOutcome::Fallback);
    }

    #[tokio::test]
    async fn test_instances_without_zone_never_match() {
        let instances = vec![instance("a", None), instance("bb", Some("ZONE-A"))];
        let selected = selector("zone-a").select("sample-service", instances).await;
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, "bb");
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(SelectionOutcome::SameZone.to_string(), "same_zone");
        assert_eq!(SelectionOutcome::Fallback.as_str(), "fallback");
        assert_eq!(SelectionOutcome::Disabled.as_str(), "disabled");
    }

    #[tokio::test]
    async fn test_resolution_errors_count_as_absent_zone() {
        for error in [
            ZoneAffinityError::collaborator(collaborator::POD_REGISTRY, "forbidden"),
            ZoneAffinityError::internal("resolver bug"),
        ] {
            let instances = vec![instance("a", None), instance("bb", None)];

            let same = ZonePreferenceSelector::new(ScriptedResolver::failing_with(error.clone()), ClientZone::new("zone-b"))
                .select_with_outcome("sample-service", instances.clone())
                .await;
            assert_eq!(same.outcome, SelectionOutcome::SameZone);
            assert_eq!(same.instances.len(), 1);
            assert_eq!(same.instances[0].id, "bb");

            let fallback = ZonePreferenceSelector::new(ScriptedResolver::failing_with(error), ClientZone::new("zone-a"))
                .select_with_outcome("sample-service", instances.clone())
                .await;
            assert_eq!(fallback.outcome, SelectionOutcome::Fallback);
            assert_eq!(fallback.instances, instances);
        }
    }

    #[tokio::test]
    async fn test_requested_service_name_reaches_resolver() {
        let resolver = ScriptedResolver::failing_with(ZoneAffinityError::internal("unused"));
        let selector = ZonePreferenceSelector::new(resolver.clone(), ClientZone::new("zone-b"));

        selector.select("sample-alias", vec![instance("bb", None)]).await;
        assert_eq!(*resolver.services.lock(), vec!["sample-alias".to_string()]);
    }
}
