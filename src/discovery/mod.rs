pub mod instance_discovery;

pub use instance_discovery::{InstanceDiscovery, KubernetesDiscovery, StaticDiscovery};
