//! # Zone Affinity - Core Library Crate
//!
//! Zone-aware instance selection for services running in Kubernetes. Given a
//! logical service name, the library returns the backend instances that sit
//! in the caller's availability zone, and falls back to every instance when
//! none do.
//!
//! ## How a selection flows
//!
//! 1. An `InstanceDiscovery` source produces the raw instance list
//! 2. The active `ZoneResolver` refreshes any per-service state (the
//!    EndpointSlice strategy rebuilds its `ZoneCache` here)
//! 3. `ZonePreferenceSelector` resolves each instance's zone and keeps the
//!    same-zone ones, or returns the whole list as a fallback
//!
//! Callers that prefer to keep a generic selector can instead wrap their
//! discovery source in `ZoneEnrichingDiscovery`, which copies each pod's
//! zone into the service-level attributes such a selector reads.

/// Error types, configuration and the shared data model
pub mod core;

/// Collaborator boundary to the cluster control plane (pods, EndpointSlices, Services)
pub mod registry;

/// Instance discovery sources
pub mod discovery;

/// Zone resolution strategies and the per-service zone cache
pub mod zone;

/// Zone preference selection and target picking
pub mod load_balancing;

/// Discovery-layer metadata enrichment
pub mod enrichment;

/// Logging and metrics
pub mod observability;

pub use crate::core::config::{ZoneAffinityConfig, ZoneStrategy};
pub use crate::core::error::{ZoneAffinityError, ZoneAffinityResult};
pub use crate::core::types::{ClientZone, Instance, InstanceAttributes, PodMetadata, ZoneLabelKeys};

pub use crate::discovery::{InstanceDiscovery, KubernetesDiscovery, StaticDiscovery};
pub use crate::enrichment::{enrich_instance, ZoneEnrichingDiscovery};
pub use crate::load_balancing::{RoundRobin, SelectionOutcome, ZoneAwareSupplier, ZonePreferenceSelector};
pub use crate::zone::{create_zone_resolver, ZoneCache, ZoneResolver};
