//! # Zone Affinity - Polling Daemon
//!
//! Runs the configured zone strategy against the cluster. Every
//! `poll_interval` it selects instances for each configured service and
//! logs the target a round-robin picker would call, until Ctrl-C.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use zone_affinity::core::config::ZoneAffinityConfig;
use zone_affinity::core::error::ZoneAffinityResult;
use zone_affinity::discovery::{InstanceDiscovery, KubernetesDiscovery};
use zone_affinity::enrichment::ZoneEnrichingDiscovery;
use zone_affinity::load_balancing::{RoundRobin, ZoneAwareSupplier};
use zone_affinity::observability::{init_logging, metrics::install_prometheus_exporter};
use zone_affinity::registry::KubeRegistry;
use zone_affinity::zone::{create_zone_resolver, ServiceMetadataResolver, ZoneResolver};

#[tokio::main]
async fn main() -> ZoneAffinityResult<()> {
    let config = load_config().await?;
    init_logging(&config.logging);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        client_zone = %config.client_zone(),
        namespace = %config.namespace,
        strategy = %config.strategy,
        "🚀 Starting zone-affinity"
    );

    if config.metrics.enabled {
        install_prometheus_exporter(&config.metrics)?;
    }

    let (supplier, discovery) = build_supplier(&config).await?;
    let services = resolve_service_names(&config, &discovery).await?;
    if services.is_empty() {
        warn!("No services configured or discovered, nothing to select");
    }

    run(&config, &supplier, &services).await;

    info!("✅ zone-affinity shutdown complete");
    Ok(())
}

async fn load_config() -> ZoneAffinityResult<ZoneAffinityConfig> {
    let config_path = std::env::var("ZONE_AFFINITY_CONFIG_PATH")
        .unwrap_or_else(|_| "config/zone-affinity.yaml".to_string());
    let path = Path::new(&config_path);

    if !path.exists() {
        return ZoneAffinityConfig::from_env();
    }

    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => ZoneAffinityConfig::load_from_json(path).await,
        _ => ZoneAffinityConfig::load_from_file(path).await,
    }
}

/// Supplier plus the discovery source it reads from
async fn build_supplier(
    config: &ZoneAffinityConfig,
) -> ZoneAffinityResult<(ZoneAwareSupplier, Arc<dyn InstanceDiscovery>)> {
    let registry = Arc::new(KubeRegistry::connect(config.discovery.kubeconfig_path.as_deref()).await?);

    let kubernetes = KubernetesDiscovery::new(
        registry.clone(),
        registry.clone(),
        registry.clone(),
        config.namespace.clone(),
        config.discovery.clone(),
    );

    let (discovery, resolver): (Arc<dyn InstanceDiscovery>, Arc<dyn ZoneResolver>) =
        if config.discovery.enrich_service_metadata {
            info!("Service metadata enrichment enabled, selecting on service-level zone labels");
            (
                Arc::new(ZoneEnrichingDiscovery::new(kubernetes, config.zone_labels.clone())),
                Arc::new(ServiceMetadataResolver::new(config.zone_labels.clone())),
            )
        } else {
            (
                Arc::new(kubernetes),
                create_zone_resolver(config, registry.clone(), registry),
            )
        };

    info!(discovery = %discovery.description(), strategy = resolver.strategy_name(), "Built supplier");
    let supplier = ZoneAwareSupplier::new(discovery.clone(), resolver, config.client_zone());
    Ok((supplier, discovery))
}

async fn resolve_service_names(
    config: &ZoneAffinityConfig,
    discovery: &Arc<dyn InstanceDiscovery>,
) -> ZoneAffinityResult<Vec<String>> {
    if !config.services.is_empty() {
        return Ok(config.services.clone());
    }
    discovery.services().await
}

async fn run(config: &ZoneAffinityConfig, supplier: &ZoneAwareSupplier, services: &[String]) {
    let mut pickers: HashMap<&str, RoundRobin> = services
        .iter()
        .map(|service| (service.as_str(), RoundRobin::new()))
        .collect();
    let mut interval = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                for service in services {
                    poll_service(supplier, service, pickers.entry(service.as_str()).or_default()).await;
                }
            }
            result = signal::ctrl_c() => {
                if let Err(e) = result {
                    error!(error = %e, "Failed to listen for shutdown signal");
                }
                info!("Shutdown signal received");
                break;
            }
        }
    }
}

async fn poll_service(supplier: &ZoneAwareSupplier, service: &str, picker: &RoundRobin) {
    match supplier.select_with_outcome(service).await {
        Ok(selection) => {
            let hosts: Vec<&str> = selection.instances.iter().map(|i| i.host.as_str()).collect();
            match picker.pick(&selection.instances) {
                Some(target) => info!(
                    service = %service,
                    outcome = %selection.outcome,
                    candidates = ?hosts,
                    target = %target,
                    "Selected instance"
                ),
                None => warn!(service = %service, "No instances available"),
            }
        }
        Err(e) => error!(service = %service, error = %e, "Instance discovery failed"),
    }
}
