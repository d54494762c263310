//! # Configuration Module
//!
//! Configuration for the zone-affinity resolver: the client's declared
//! zone, which zone strategy is active, where zone labels are read from,
//! and how the Kubernetes discovery source builds instances.
//!
//! ## Key Features
//! - YAML/JSON configuration parsing with serde
//! - Environment variable override support (`ZONE_AFFINITY_*`)
//! - Validation that reports every problem at once

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core::error::{ZoneAffinityError, ZoneAffinityResult};
use crate::core::types::{
    ClientZone, ZoneLabelKeys, DEFAULT_NAMESPACE_ATTRIBUTE, UNKNOWN_ZONE,
};
use crate::observability::config::{LogConfig, LogFormat, MetricsConfig};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneAffinityConfig {
    /// Zone this client runs in; `"unknown"` or empty disables affinity
    pub client_zone: String,

    /// Namespace pods and endpoint slices are looked up in
    pub namespace: String,

    /// Active zone strategy
    pub strategy: ZoneStrategy,

    /// Label keys a zone is read from, primary first
    pub zone_labels: ZoneLabelKeys,

    /// Kubernetes discovery settings
    pub discovery: DiscoverySettings,

    /// Logical services the daemon polls
    pub services: Vec<String>,

    /// Interval between selection cycles in the daemon
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    pub logging: LogConfig,

    pub metrics: MetricsConfig,
}

/// How an instance's zone is determined
///
/// Exactly one strategy is active per resolver; `Chained` tries its members
/// in order and the first present zone wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ZoneStrategy {
    /// Query the pod registry for the pod owning the instance IP
    DirectLookup,
    /// Read the zone from the instance's pod-level labels
    PodMetadata,
    /// Build an IP to zone cache from EndpointSlice topology
    EndpointSlice,
    /// Read the zone from service-level attributes only
    ServiceMetadata,
    /// Try several strategies in precedence order
    Chained { order: Vec<ZoneStrategy> },
}

impl ZoneStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            ZoneStrategy::DirectLookup => "direct_lookup",
            ZoneStrategy::PodMetadata => "pod_metadata",
            ZoneStrategy::EndpointSlice => "endpoint_slice",
            ZoneStrategy::ServiceMetadata => "service_metadata",
            ZoneStrategy::Chained { .. } => "chained",
        }
    }
}

impl fmt::Display for ZoneStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ZoneStrategy {
    type Err = ZoneAffinityError;

    /// Parses the simple (non-chained) strategies, accepting
    /// `EndpointSlice`, `endpoint_slice` and `endpoint-slice` alike
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "directlookup" | "direct" => Ok(ZoneStrategy::DirectLookup),
            "podmetadata" => Ok(ZoneStrategy::PodMetadata),
            "endpointslice" | "slice" => Ok(ZoneStrategy::EndpointSlice),
            "servicemetadata" => Ok(ZoneStrategy::ServiceMetadata),
            _ => Err(ZoneAffinityError::config(format!("Unknown zone strategy: {}", s))),
        }
    }
}

/// Settings for the Kubernetes-backed discovery source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverySettings {
    /// Service-level attribute holding an instance's namespace
    pub namespace_attribute: String,

    /// Fill the pod-level partition from the endpoint's target pod
    pub include_pod_metadata: bool,

    /// Copy the pod zone into service-level attributes before selection
    pub enrich_service_metadata: bool,

    /// Named port to expose; the first slice port when unset
    pub port_name: Option<String>,

    /// Kubeconfig path; in-cluster or default config when unset
    pub kubeconfig_path: Option<String>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            namespace_attribute: DEFAULT_NAMESPACE_ATTRIBUTE.to_string(),
            include_pod_metadata: true,
            enrich_service_metadata: false,
            port_name: None,
            kubeconfig_path: None,
        }
    }
}

impl Default for ZoneAffinityConfig {
    fn default() -> Self {
        Self {
            client_zone: UNKNOWN_ZONE.to_string(),
            namespace: "lb-demo".to_string(),
            strategy: ZoneStrategy::EndpointSlice,
            zone_labels: ZoneLabelKeys::default(),
            discovery: DiscoverySettings::default(),
            services: Vec::new(),
            poll_interval: Duration::from_secs(5),
            logging: LogConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl ZoneAffinityConfig {
    /// Load configuration from a YAML file
    pub async fn load_from_file<P: AsRef<Path>>(path: P) -> ZoneAffinityResult<Self> {
        let content = tokio::fs::read_to_string(path).await
            .map_err(|e| ZoneAffinityError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: ZoneAffinityConfig = serde_yaml::from_str(&content)
            .map_err(|e| ZoneAffinityError::config(format!("Failed to parse config: {}", e)))?;

        config.apply_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON
    pub async fn load_from_json<P: AsRef<Path>>(path: P) -> ZoneAffinityResult<Self> {
        let content = tokio::fs::read_to_string(path).await
            .map_err(|e| ZoneAffinityError::config(format!("Failed to read config file: {}", e)))?;

        let mut config: ZoneAffinityConfig = serde_json::from_str(&content)
            .map_err(|e| ZoneAffinityError::config(format!("Failed to parse JSON config: {}", e)))?;

        config.apply_env_overrides()?;

        config.validate()?;
        Ok(config)
    }

    /// Defaults plus environment overrides, for running without a file
    pub fn from_env() -> ZoneAffinityResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    ///
    /// Environment variables follow the pattern: ZONE_AFFINITY_<FIELD>
    /// For example: ZONE_AFFINITY_CLIENT_ZONE=zone-a
    pub fn apply_env_overrides(&mut self) -> ZoneAffinityResult<()> {
        use std::env;

        if let Ok(zone) = env::var("ZONE_AFFINITY_CLIENT_ZONE") {
            self.client_zone = zone;
        }

        if let Ok(namespace) = env::var("ZONE_AFFINITY_NAMESPACE") {
            self.namespace = namespace;
        }

        if let Ok(strategy) = env::var("ZONE_AFFINITY_STRATEGY") {
            self.strategy = strategy.parse()
                .map_err(|e| ZoneAffinityError::config(format!("Invalid ZONE_AFFINITY_STRATEGY: {}", e)))?;
        }

        if let Ok(enrich) = env::var("ZONE_AFFINITY_ENRICH") {
            self.discovery.enrich_service_metadata = enrich.parse()
                .map_err(|e| ZoneAffinityError::config(format!("Invalid ZONE_AFFINITY_ENRICH: {}", e)))?;
        }

        if let Ok(path) = env::var("KUBECONFIG_PATH") {
            self.discovery.kubeconfig_path = Some(path);
        }

        if let Ok(interval) = env::var("ZONE_AFFINITY_POLL_INTERVAL") {
            self.poll_interval = humantime::parse_duration(&interval)
                .map_err(|e| ZoneAffinityError::config(format!("Invalid ZONE_AFFINITY_POLL_INTERVAL: {}", e)))?;
        }

        if let Ok(level) = env::var("ZONE_AFFINITY_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(format) = env::var("ZONE_AFFINITY_LOG_FORMAT") {
            self.logging.format = format.parse::<LogFormat>()
                .map_err(|e| ZoneAffinityError::config(format!("Invalid ZONE_AFFINITY_LOG_FORMAT: {}", e)))?;
        }

        if let Ok(enabled) = env::var("ZONE_AFFINITY_METRICS_ENABLED") {
            self.metrics.enabled = enabled.parse()
                .map_err(|e| ZoneAffinityError::config(format!("Invalid ZONE_AFFINITY_METRICS_ENABLED: {}", e)))?;
        }

        Ok(())
    }

    /// Validation that collects every problem before failing
    pub fn validate(&self) -> ZoneAffinityResult<()> {
        let mut errors = Vec::new();

        if self.namespace.trim().is_empty() {
            errors.push("namespace cannot be empty".to_string());
        }

        if self.zone_labels.primary.is_empty() || self.zone_labels.fallback.is_empty() {
            errors.push("zone_labels.primary and zone_labels.fallback cannot be empty".to_string());
        } else if self.zone_labels.primary == self.zone_labels.fallback {
            errors.push(format!(
                "zone_labels.primary and zone_labels.fallback are both '{}'",
                self.zone_labels.primary
            ));
        }

        if self.discovery.namespace_attribute.is_empty() {
            errors.push("discovery.namespace_attribute cannot be empty".to_string());
        }

        if let ZoneStrategy::Chained { order } = &self.strategy {
            if order.is_empty() {
                errors.push("Chained strategy needs at least one member".to_string());
            }
            if order.iter().any(|s| matches!(s, ZoneStrategy::Chained { .. })) {
                errors.push("Chained strategy cannot nest another Chained strategy".to_string());
            }
        }

        if self.poll_interval.is_zero() {
            errors.push("poll_interval must be greater than 0".to_string());
        }

        if self.metrics.listen_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "metrics.listen_address '{}' is not a socket address",
                self.metrics.listen_address
            ));
        }

        for (index, service) in self.services.iter().enumerate() {
            if service.trim().is_empty() {
                errors.push(format!("Service {} has an empty name", index));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ZoneAffinityError::config(errors.join("; ")))
        }
    }

    /// The client zone as a typed value
    pub fn client_zone(&self) -> ClientZone {
        ClientZone::new(self.client_zone.as_str())
    }
}
