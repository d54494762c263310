pub mod snapshot;

pub use snapshot::{
    EndpointGroup, EndpointTopologySource, GroupPort, KubeRegistry, PodRecord, PodRegistry,
    ServiceCatalog, StaticRegistry, TopologyEndpoint, SERVICE_NAME_LABEL,
};
