//! # Zone Resolution
//!
//! Strategies that determine which zone an instance runs in:
//!
//! - `DirectLookupResolver`: pod registry scan by instance IP
//! - `PodMetadataResolver`: pod-level labels carried on the instance
//! - `EndpointSliceResolver`: per-service `ZoneCache` built from topology records
//! - `ServiceMetadataResolver`: service-level attributes only
//! - `ChainedResolver`: several of the above in precedence order

pub mod cache;
pub mod chained;
pub mod direct;
pub mod endpoint_slice;
pub mod metadata;
pub mod resolver;

pub use cache::{ZoneCache, ZoneSnapshot};
pub use chained::ChainedResolver;
pub use direct::DirectLookupResolver;
pub use endpoint_slice::EndpointSliceResolver;
pub use metadata::{PodMetadataResolver, ServiceMetadataResolver};
pub use resolver::{create_zone_resolver, ZoneResolver};
