//! # Zone Cache
//!
//! IP to zone mapping for one logical service, rebuilt wholesale from a
//! topology snapshot.
//!
//! ## Snapshot Semantics
//!
//! - `rebuild` builds a fresh map and publishes it by swapping an `Arc`;
//!   entries from earlier snapshots never survive a rebuild
//! - Readers clone the current `Arc` and never see a half-built map
//! - The write lock is held only for the pointer swap

use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use crate::registry::EndpointGroup;

pub type ZoneSnapshot = Arc<HashMap<IpAddr, String>>;

#[derive(Debug)]
pub struct ZoneCache {
    service_name: String,
    snapshot: RwLock<ZoneSnapshot>,
}

impl ZoneCache {
    /// Empty cache for a service
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            snapshot: RwLock::new(Arc::new(HashMap::new())),
        }
    }

    /// Replace the cache with the mapping described by `groups`
    ///
    /// Endpoints without a zone and addresses that are not IPs are skipped.
    /// When an address appears twice the later entry wins. Returns the new
    /// entry count.
    pub fn rebuild(&self, groups: &[EndpointGroup]) -> usize {
        let mut entries = HashMap::new();

        for group in groups {
            for endpoint in &group.endpoints {
                let Some(zone) = endpoint.zone.as_deref().filter(|zone| !zone.is_empty()) else {
                    continue;
                };
                for address in &endpoint.addresses {
                    match address.parse::<IpAddr>() {
                        Ok(ip) => {
                            entries.insert(ip, zone.to_string());
                        }
                        Err(_) => {
                            debug!(
                                service = %self.service_name,
                                group = %group.name,
                                address = %address,
                                "Skipping non-IP endpoint address"
                            );
                        }
                    }
                }
            }
        }

        let count = entries.len();
        self.publish(entries);
        count
    }

    /// Publish an empty snapshot
    pub fn clear(&self) {
        self.publish(HashMap::new());
    }

    fn publish(&self, entries: HashMap<IpAddr, String>) {
        *self.snapshot.write() = Arc::new(entries);
    }

    /// Current snapshot; stays valid while later rebuilds publish new ones
    pub fn snapshot(&self) -> ZoneSnapshot {
        self.snapshot.read().clone()
    }

    pub fn lookup(&self, ip: &IpAddr) -> Option<String> {
        self.snapshot.read().get(ip).cloned()
    }

    /// Lookup by host string; hostnames never match
    pub fn zone_for_host(&self, host: &str) -> Option<String> {
        host.parse::<IpAddr>().ok().and_then(|ip| self.lookup(&ip))
    }

    pub fn len(&self) -> usize {
        self.snapshot.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TopologyEndpoint;

    fn group(endpoints: Vec<TopologyEndpoint>) -> EndpointGroup {
        EndpointGroup {
            name: "sample-service-abc".to_string(),
            endpoints,
            ports: Vec::new(),
        }
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = ZoneCache::new("sample-service");
        assert!(cache.is_empty());
        assert_eq!(cache.zone_for_host("10.0.0.1"), None);
    }

    #[test]
    fn test_rebuild_skips_zoneless_and_non_ip_entries() {
        let cache = ZoneCache::new("sample-service");
        let count = cache.rebuild(&[group(vec![
            TopologyEndpoint::new(Some("zone-a"), ["10.0.0.1", "not-an-ip"]),
            TopologyEndpoint::new(None, ["10.0.0.2"]),
            TopologyEndpoint::new(Some(""), ["10.0.0.3"]),
        ])]);

        assert_eq!(count, 1);
        assert_eq!(cache.zone_for_host("10.0.0.1").as_deref(), Some("zone-a"));
        assert_eq!(cache.zone_for_host("10.0.0.2"), None);
        assert_eq!(cache.zone_for_host("10.0.0.3"), None);
    }

    #[test]
    fn test_held_snapshot_survives_rebuild() {
        let cache = ZoneCache::new("sample-service");
        cache.rebuild(&[group(vec![TopologyEndpoint::new(Some("zone-a"), ["10.0.0.1"])])]);
        let held = cache.snapshot();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(held.len(), 1);
    }
}
