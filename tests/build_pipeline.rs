use std::collections::HashMap;

use resel_core_types::{ArtifactId, Platform, SelectorStrategy, Stability};
use resel_locator::{BuildPipeline, LocatorPolicy, RawElementRecord, RawNode, RawTree};
use resel_profile_store::{ProfileStoreBuilder, StorePolicyView};
use tempfile::tempdir;

fn node(parent: Option<usize>, attrs: &[(&str, &str)]) -> RawNode {
    RawNode {
        parent,
        attributes: attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect::<HashMap<_, _>>(),
        bounds: None,
    }
}

fn record(logical: &str, platform: Platform, nodes: Vec<RawNode>, target: usize) -> RawElementRecord {
    RawElementRecord {
        logical_id: Some(logical.to_string()),
        platform,
        tree: RawTree { nodes },
        target,
    }
}

#[test]
fn flat_android_capture_prefers_identifier() {
    let records = vec![record(
        "login_button",
        Platform::Android,
        vec![
            node(None, &[("resource-id", "login_button"), ("text", "Log In")]),
            node(None, &[("resource-id", "register"), ("text", "Register")]),
        ],
        0,
    )];

    let entries = BuildPipeline::default().run(&ArtifactId::new("login_suite"), records);
    assert_eq!(entries.len(), 1);
    let profile = entries[0].result.as_ref().expect("profile");
    assert_eq!(profile.primary.strategy, SelectorStrategy::ExactId);
    assert_eq!(profile.primary.value, "login_button");
    assert_eq!(profile.stability, Stability::High);
    assert_eq!(
        profile
            .fallbacks
            .iter()
            .map(|candidate| candidate.strategy)
            .collect::<Vec<_>>(),
        vec![SelectorStrategy::VisibleText]
    );
}

#[test]
fn duplicated_label_on_web_falls_back_to_structure() {
    let nodes = vec![
        node(None, &[("tag", "body")]),
        node(Some(0), &[("tag", "form")]),
        node(Some(1), &[("tag", "button"), ("text", "Submit")]),
        node(Some(0), &[("tag", "div")]),
        node(Some(3), &[("tag", "button"), ("text", "Submit")]),
    ];
    let records = vec![record("checkout_submit", Platform::Web, nodes, 2)];

    let entries = BuildPipeline::default().run(&ArtifactId::new("checkout"), records);
    let profile = entries[0].result.as_ref().expect("profile");
    assert_eq!(profile.primary.strategy, SelectorStrategy::CssNthChild);
    assert_eq!(profile.primary.value, "form > button:nth-child(1)");
    assert!(!profile.contains_strategy(SelectorStrategy::VisibleTextExact));
    assert!(!profile.contains_strategy(SelectorStrategy::VisibleTextContains));
    assert!(!profile.contains_strategy(SelectorStrategy::TagOnly));
    assert_eq!(profile.stability, Stability::Low);
    assert!(profile.fallbacks.iter().all(|candidate| candidate.is_unique));
}

#[test]
fn malformed_records_do_not_abort_the_batch() {
    let mut broken = record("ghost", Platform::Ios, vec![node(None, &[])], 0);
    broken.target = 7;
    let records = vec![
        broken,
        record(
            "save",
            Platform::Ios,
            vec![node(None, &[("identifier", "save")])],
            0,
        ),
    ];

    let entries = BuildPipeline::new(&LocatorPolicy::default()).run(&ArtifactId::new("notes"), records);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].label, "ghost");
    assert!(entries[0].result.is_err());
    assert!(entries[1].result.is_ok());
}

#[tokio::test]
async fn built_profiles_persist_at_version_one() {
    let tmp = tempdir().expect("temp dir");
    let store = ProfileStoreBuilder::new(StorePolicyView::fs(tmp.path())).build();
    let records = vec![record(
        "login_button",
        Platform::Android,
        vec![node(None, &[("resource-id", "login_button")])],
        0,
    )];

    for entry in BuildPipeline::default().run(&ArtifactId::new("login_suite"), records) {
        store.create(entry.result.expect("profile")).await.expect("create");
    }

    let keys = store.keys(None).await.expect("keys");
    assert_eq!(keys.len(), 1);
    let stored = store.get(&keys[0]).await.expect("get");
    assert_eq!(stored.version, 1);
    assert!(stored.is_well_formed());
}
