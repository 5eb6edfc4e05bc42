//! Integration tests for the omni-retention command bodies.

use omni_retention::{ResolvedSettings, RetentionSettings, RuntimeSettings, policy_with_overrides, prune_json, simulate};
use omni_types::{ConfidenceTier, RetentionPolicy, TrimMode};
use omni_window::EngineConfig;
use serde_json::Value;

const PAYLOAD: &str = include_str!("fixtures/payload.json");
const DOCUMENT: &str = include_str!("fixtures/long_conversation.json");

#[test]
fn test_prune_keeps_last_rounds() {
    let report = prune_json(PAYLOAD, 2, false).unwrap();
    assert!(report.pruned);
    assert_eq!(report.stats.rounds_total, 3);
    assert_eq!(report.stats.rounds_kept, 2);

    let value: Value = serde_json::from_str(&report.output).unwrap();
    let mapping = value["mapping"].as_object().unwrap();
    assert!(!mapping.contains_key("u1"));
    assert!(!mapping.contains_key("a1"));
    assert!(mapping.contains_key("u2"));
    assert_eq!(mapping["root"]["children"], serde_json::json!(["u2"]));
    assert_eq!(value["current_node"], "a3");
    assert_eq!(value["title"], "retention demo");
}

#[test]
fn test_prune_within_budget_is_verbatim() {
    let report = prune_json(PAYLOAD, 10, true).unwrap();
    assert!(!report.pruned);
    let original: Value = serde_json::from_str(PAYLOAD).unwrap();
    let output: Value = serde_json::from_str(&report.output).unwrap();
    assert_eq!(output, original);
}

#[test]
fn test_prune_rejects_non_json() {
    let err = prune_json("not json", 2, false).unwrap_err();
    assert!(err.to_string().contains("not valid JSON"));
}

#[tokio::test(start_paused = true)]
async fn test_simulate_hides_old_rounds() {
    let report = simulate(DOCUMENT, RetentionPolicy::keeping(2), EngineConfig::default())
        .await
        .unwrap();
    let status = report.status.unwrap();
    assert_eq!(status.total_rounds, 4);
    assert_eq!(status.visible_rounds, 2);
    assert_eq!(status.tier, ConfidenceTier::MessageAttributes);
    assert_eq!(report.evaluations, 1);
    assert!(report.writes > 0);
}

#[tokio::test(start_paused = true)]
async fn test_simulate_placeholder_mode() {
    let policy = RetentionPolicy {
        trim_mode: TrimMode::Placeholder,
        ..RetentionPolicy::keeping(1)
    };
    let report = simulate(DOCUMENT, policy, EngineConfig::default()).await.unwrap();
    let status = report.status.unwrap();
    assert_eq!(status.visible_rounds, 1);
    // One replacement per trimmed turn.
    assert_eq!(report.writes, 6);
}

#[tokio::test]
async fn test_simulate_rejects_bad_fixture() {
    let err = simulate("{}", RetentionPolicy::default(), EngineConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("invalid document fixture"));
}

#[test]
fn test_resolved_settings_serialize() {
    let resolved = ResolvedSettings::from_settings(&RuntimeSettings::default());
    let value = serde_json::to_value(&resolved).unwrap();
    assert_eq!(value["policy"]["keep_rounds"], 10);
    assert_eq!(value["engine"]["debounce_ms"], 80);
}

#[test]
fn test_explicit_keep_rounds_out_of_range_is_rejected() {
    let settings = RuntimeSettings::default();
    for keep_rounds in [0, 101] {
        let err = policy_with_overrides(&settings, Some(keep_rounds), None).unwrap_err();
        assert!(err.to_string().contains("--keep-rounds rejected"));
        assert!(format!("{err:#}").contains("Invalid policy"));
    }
}

#[test]
fn test_overrides_replace_settings_values() {
    let settings = RuntimeSettings {
        retention: RetentionSettings {
            keep_rounds: Some(500),
            ..RetentionSettings::default()
        },
        ..RuntimeSettings::default()
    };
    // File values are clamped rather than rejected.
    let policy = policy_with_overrides(&settings, None, None).unwrap();
    assert_eq!(policy.keep_rounds, 100);

    let policy = policy_with_overrides(&settings, Some(3), Some(TrimMode::Placeholder)).unwrap();
    assert_eq!(policy.keep_rounds, 3);
    assert_eq!(policy.trim_mode, TrimMode::Placeholder);
}
