//! Configuration tests: defaults, partial overrides, and validation.

use ringtrace_core::config::EngineConfig;

#[test]
fn defaults_match_production_thresholds() {
    let config = EngineConfig::default();
    assert_eq!(config.cycle.hub_degree_limit, 20);
    assert_eq!(config.smurfing.fan_threshold, 10);
    assert_eq!(config.smurfing.exclusion_threshold, 20);
    assert_eq!(config.smurfing.window_hours, 72);
    assert_eq!(config.shell.min_hops, 3);
    assert_eq!(config.shell.max_hops, 5);
    assert!(config.validate().is_ok());
}

/// A partial JSON document overrides only what it names.
#[test]
fn partial_override_keeps_defaults() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"smurfing": {"fan_threshold": 5}}"#).expect("valid json");

    assert_eq!(config.smurfing.fan_threshold, 5);
    assert_eq!(config.smurfing.window_hours, 72, "Unnamed field keeps default");
    assert_eq!(config.cycle.hub_degree_limit, 20, "Unnamed section keeps defaults");
    assert!(config.validate().is_ok());
}

#[test]
fn exclusion_below_fan_threshold_rejected() {
    let config: EngineConfig = serde_json::from_str(
        r#"{"smurfing": {"fan_threshold": 25, "exclusion_threshold": 20}}"#,
    )
    .expect("valid json");

    let err = config.validate().expect_err("must be rejected");
    assert!(
        err.to_string().contains("exclusion_threshold"),
        "Unexpected message: {err}"
    );
}

#[test]
fn inverted_hop_bounds_rejected() {
    let config: EngineConfig =
        serde_json::from_str(r#"{"shell": {"min_hops": 6, "max_hops": 4}}"#).expect("valid json");

    let err = config.validate().expect_err("must be rejected");
    assert!(err.to_string().contains("hop bounds"), "Unexpected message: {err}");
}
