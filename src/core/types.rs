//! # Core Types Module
//!
//! This module defines the data structures shared by every zone strategy:
//! the discovered `Instance`, its two attribute partitions, the client's
//! declared zone, and the label keys a zone is read from.
//!
//! ## Ownership Notes
//!
//! - Instances are produced fresh on every discovery poll and treated as
//!   immutable values; enrichment and filtering build new values instead of
//!   patching existing ones
//! - `Clone` is cheap enough here that lists are passed around by value

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::net::IpAddr;

/// Service-level attribute key that carries the namespace of an instance
pub const DEFAULT_NAMESPACE_ATTRIBUTE: &str = "k8s_namespace";

/// Primary zone label key
pub const DEFAULT_PRIMARY_ZONE_KEY: &str = "zone";

/// Topology-standard zone label key, consulted when the primary key is absent
pub const TOPOLOGY_ZONE_KEY: &str = "topology.kubernetes.io/zone";

/// Zone value meaning "zone affinity disabled"
pub const UNKNOWN_ZONE: &str = "unknown";

/// One reachable backend process for a logical service
///
/// `host` + `port` identify a live endpoint at a point in time. `id` may be
/// a pod uid or an opaque `host:port` string and is only used for logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// Opaque instance identifier
    pub id: String,

    /// Logical service this instance backs
    pub service_name: String,

    /// Network address; an IP address in Kubernetes endpoint mode
    pub host: String,

    /// Service port
    pub port: u16,

    /// Service-level and pod-level attributes
    #[serde(default)]
    pub attributes: InstanceAttributes,
}

impl Instance {
    /// Create a new instance with empty attributes
    pub fn new(
        id: impl Into<String>,
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: id.into(),
            service_name: service_name.into(),
            host: host.into(),
            port,
            attributes: InstanceAttributes::default(),
        }
    }

    /// Add a service-level attribute
    pub fn with_service_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.service.insert(key.into(), value.into());
        self
    }

    /// Attach a pod-level partition
    pub fn with_pod_metadata(mut self, pod: PodMetadata) -> Self {
        self.attributes.pod = Some(pod);
        self
    }

    /// Parse `host` as an IP address
    ///
    /// Returns `None` when the discovery layer handed us a hostname.
    pub fn ip(&self) -> Option<IpAddr> {
        self.host.parse().ok()
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}:{})", self.id, self.host, self.port)
    }
}

/// The two attribute namespaces attached to an instance
///
/// Generic consumers only read `service`. The `pod` partition is sourced from
/// the underlying pod's own labels and annotations and is absent when the
/// instance came from a discovery backend that knows nothing about pods.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceAttributes {
    /// Service-level attributes, visible to generic consumers
    #[serde(default)]
    pub service: HashMap<String, String>,

    /// Pod-level attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<PodMetadata>,
}

/// Pod-level attribute partition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodMetadata {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl PodMetadata {
    /// Pod metadata carrying only labels
    pub fn with_labels<I, K, V>(labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            annotations: BTreeMap::new(),
        }
    }
}

/// Keys a zone label is looked up under, in precedence order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneLabelKeys {
    pub primary: String,
    pub fallback: String,
}

impl ZoneLabelKeys {
    /// Look up a zone in any string map, primary key first
    ///
    /// Empty values count as absent.
    pub fn lookup<'a, M>(&self, get: M) -> Option<&'a str>
    where
        M: Fn(&str) -> Option<&'a String>,
    {
        get(&self.primary)
            .or_else(|| get(&self.fallback))
            .map(String::as_str)
            .filter(|zone| !zone.is_empty())
    }

    /// Both keys, primary first
    pub fn keys(&self) -> [&str; 2] {
        [self.primary.as_str(), self.fallback.as_str()]
    }
}

impl Default for ZoneLabelKeys {
    fn default() -> Self {
        Self {
            primary: DEFAULT_PRIMARY_ZONE_KEY.to_string(),
            fallback: TOPOLOGY_ZONE_KEY.to_string(),
        }
    }
}

/// The zone the calling process declares itself to be in
///
/// Empty or `"unknown"` (any case) disables zone affinity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientZone(Option<String>);

impl ClientZone {
    pub fn new(zone: impl Into<String>) -> Self {
        let zone = zone.into();
        let trimmed = zone.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(UNKNOWN_ZONE) {
            Self(None)
        } else {
            Self(Some(trimmed.to_string()))
        }
    }

    /// Affinity explicitly disabled
    pub fn disabled() -> Self {
        Self(None)
    }

    pub fn is_enabled(&self) -> bool {
        self.0.is_some()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// Case-insensitive zone comparison; an absent zone never matches
    pub fn matches(&self, zone: Option<&str>) -> bool {
        match (self.0.as_deref(), zone) {
            (Some(client), Some(zone)) => client.eq_ignore_ascii_case(zone),
            _ => false,
        }
    }
}

impl From<&str> for ClientZone {
    fn from(zone: &str) -> Self {
        Self::new(zone)
    }
}

impl From<Option<String>> for ClientZone {
    fn from(zone: Option<String>) -> Self {
        zone.map(Self::new).unwrap_or_else(Self::disabled)
    }
}

impl Default for ClientZone {
    fn default() -> Self {
        Self::disabled()
    }
}

impl fmt::Display for ClientZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_deref().unwrap_or(UNKNOWN_ZONE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_zone_sentinels_disable_affinity() {
        for zone in ["", "   ", "unknown", "UNKNOWN", "Unknown"] {
            assert!(!ClientZone::new(zone).is_enabled(), "{:?} should disable affinity", zone);
        }
        assert!(ClientZone::new("zone-a").is_enabled());
        assert!(!ClientZone::from(None).is_enabled());
    }

    #[test]
    fn test_client_zone_matches_case_insensitively() {
        let zone = ClientZone::new("Zone-A");
        assert!(zone.matches(Some("zone-a")));
        assert!(zone.matches(Some("ZONE-A")));
        assert!(!zone.matches(Some("zone-b")));
        assert!(!zone.matches(None));
        assert!(!ClientZone::disabled().matches(Some("zone-a")));
    }

    #[test]
    fn test_zone_label_lookup_prefers_primary_key() {
        let keys = ZoneLabelKeys::default();
        let mut labels = BTreeMap::new();
        labels.insert(TOPOLOGY_ZONE_KEY.to_string(), "zone-b".to_string());
        assert_eq!(keys.lookup(|k| labels.get(k)), Some("zone-b"));

        labels.insert("zone".to_string(), "zone-a".to_string());
        assert_eq!(keys.lookup(|k| labels.get(k)), Some("zone-a"));
    }

    #[test]
    fn test_zone_label_lookup_ignores_empty_values() {
        let keys = ZoneLabelKeys::default();
        let mut labels = BTreeMap::new();
        labels.insert("zone".to_string(), String::new());
        assert_eq!(keys.lookup(|k| labels.get(k)), None);
    }

    #[test]
    fn test_instance_ip() {
        let instance = Instance::new("a", "svc", "10.0.0.1", 8080);
        assert_eq!(instance.ip(), Some("10.0.0.1".parse().unwrap()));

        let v6 = Instance::new("b", "svc", "fd00::1", 8080);
        assert_eq!(v6.ip(), Some("fd00::1".parse().unwrap()));

        let named = Instance::new("c", "svc", "sample-service.lb-demo.svc", 80);
        assert_eq!(named.ip(), None);
    }
}
