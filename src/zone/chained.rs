//! Precedence-ordered combination of zone strategies.
//!
//! Members are consulted in order and the first present zone wins, so two
//! strategies that disagree about an address never race. A failing member
//! is logged, counted and skipped.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

use crate::core::error::ZoneAffinityResult;
use crate::core::types::Instance;
use crate::observability::metrics::record_resolution_failure;
use crate::zone::resolver::ZoneResolver;

pub struct ChainedResolver {
    members: Vec<Arc<dyn ZoneResolver>>,
}

impl ChainedResolver {
    pub fn new(members: Vec<Arc<dyn ZoneResolver>>) -> Self {
        Self { members }
    }

    pub fn member_names(&self) -> Vec<&'static str> {
        self.members.iter().map(|member| member.strategy_name()).collect()
    }
}

#[async_trait]
impl ZoneResolver for ChainedResolver {
    /// Refreshes every member; returns the first failure after all have run
    async fn refresh(&self, service_name: &str) -> ZoneAffinityResult<()> {
        let mut first_error = None;
        for member in &self.members {
            if let Err(e) = member.refresh(service_name).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    async fn resolve_zone(&self, service_name: &str, instance: &Instance) -> ZoneAffinityResult<Option<String>> {
        for member in &self.members {
            match member.resolve_zone(service_name, instance).await {
                Ok(Some(zone)) => return Ok(Some(zone)),
                Ok(None) => continue,
                Err(e) => {
                    warn!(
                        strategy = member.strategy_name(),
                        instance_id = %instance.id,
                        error = %e,
                        "Zone strategy failed, trying next"
                    );
                    record_resolution_failure(member.strategy_name(), e.collaborator_name());
                }
            }
        }
        Ok(None)
    }

    fn strategy_name(&self) -> &'static str {
        "chained"
    }
}
