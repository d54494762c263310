pub mod adapter;

pub use adapter::{enrich_instance, ZoneEnrichingDiscovery};
