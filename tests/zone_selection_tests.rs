//! Selection and fallback behaviour of the zone preference selector.

use std::sync::Arc;

use zone_affinity::core::types::{ClientZone, Instance, PodMetadata, ZoneLabelKeys};
use zone_affinity::load_balancing::{SelectionOutcome, ZonePreferenceSelector};
use zone_affinity::zone::{PodMetadataResolver, ZoneResolver};

fn instance(id: &str, host: &str, zone: Option<&str>) -> Instance {
    let instance = Instance::new(id, "sample-service", host, 8080);
    match zone {
        Some(zone) => instance.with_pod_metadata(PodMetadata::with_labels([("zone", zone)])),
        None => instance,
    }
}

fn four_instances() -> Vec<Instance> {
    vec![
        instance("a1", "10.0.1.1", Some("zone-a")),
        instance("b1", "10.0.2.1", Some("zone-b")),
        instance("a2", "10.0.1.2", Some("zone-a")),
        instance("b2", "10.0.2.2", Some("zone-b")),
    ]
}

fn selector(client_zone: &str) -> ZonePreferenceSelector {
    let resolver: Arc<dyn ZoneResolver> = Arc::new(PodMetadataResolver::new(ZoneLabelKeys::default()));
    ZonePreferenceSelector::new(resolver, ClientZone::new(client_zone))
}

fn ids(instances: &[Instance]) -> Vec<&str> {
    instances.iter().map(|instance| instance.id.as_str()).collect()
}

#[tokio::test]
async fn test_selects_exactly_the_same_zone_instances() {
    let selected = selector("zone-a").select("sample-service", four_instances()).await;

    let mut selected_ids = ids(&selected);
    selected_ids.sort();
    assert_eq!(selected_ids, vec!["a1", "a2"]);
}

#[tokio::test]
async fn test_falls_back_when_client_zone_instances_are_gone() {
    let remaining: Vec<Instance> = four_instances()
        .into_iter()
        .filter(|instance| !instance.id.starts_with('a'))
        .collect();

    let selection = selector("zone-a").select_with_outcome("sample-service", remaining.clone()).await;
    assert_eq!(selection.outcome, SelectionOutcome::Fallback);
    assert_eq!(selection.instances, remaining);
}

#[tokio::test]
async fn test_fallback_preserves_order_and_content() {
    let instances = four_instances();
    let selected = selector("zone-z").select("sample-service", instances.clone()).await;
    assert_eq!(selected, instances);
}

#[tokio::test]
async fn test_sentinel_client_zones_are_identity() {
    let instances = four_instances();
    for zone in ["", "unknown", "UNKNOWN", "Unknown", "  "] {
        let selection = selector(zone).select_with_outcome("sample-service", instances.clone()).await;
        assert_eq!(selection.outcome, SelectionOutcome::Disabled, "client zone {:?}", zone);
        assert_eq!(selection.instances, instances);
    }
}

#[tokio::test]
async fn test_selected_subset_only_contains_client_zone() {
    let resolver = PodMetadataResolver::new(ZoneLabelKeys::default());
    for client_zone in ["zone-a", "zone-b"] {
        let selected = selector(client_zone).select("sample-service", four_instances()).await;
        assert!(!selected.is_empty());
        for instance in &selected {
            assert_eq!(resolver.zone_of(instance).as_deref(), Some(client_zone));
        }
    }
}

#[tokio::test]
async fn test_zone_comparison_is_case_insensitive() {
    let selected = selector("ZONE-B").select("sample-service", four_instances()).await;
    assert_eq!(ids(&selected), vec!["b1", "b2"]);
}

#[tokio::test]
async fn test_instances_without_zone_data_fall_back() {
    let instances = vec![
        instance("x", "10.0.0.1", None),
        instance("y", "10.0.0.2", None),
    ];
    let selection = selector("zone-a").select_with_outcome("sample-service", instances.clone()).await;
    assert_eq!(selection.outcome, SelectionOutcome::Fallback);
    assert_eq!(selection.instances, instances);
}

#[tokio::test]
async fn test_empty_input_returns_empty() {
    assert!(selector("zone-a").select("sample-service", Vec::new()).await.is_empty());
    assert!(selector("unknown").select("sample-service", Vec::new()).await.is_empty());
}

#[test]
fn test_selection_from_blocking_code() {
    let selected = tokio_test::block_on(selector("zone-a").select("sample-service", four_instances()));
    assert_eq!(selected.len(), 2);
}
