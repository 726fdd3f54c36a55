use playbox::{Config, EXAMPLE_CONFIG, ReplacePolicy};

#[test]
fn example_config_parses_and_matches_defaults() {
    let config = Config::parse_toml(EXAMPLE_CONFIG).unwrap();
    let default = Config::default();

    assert_eq!(config.concurrency, default.concurrency);
    assert_eq!(config.queue_wait_ms, default.queue_wait_ms);
    assert_eq!(config.grace_ms, default.grace_ms);
    assert_eq!(config.replace_policy, ReplacePolicy::Replace);
}

#[test]
fn empty_config_falls_back_to_defaults() {
    let config = Config::parse_toml("").unwrap();
    assert_eq!(config.concurrency, 4);
    assert_eq!(config.queue_wait_ms, 2_000);
    assert_eq!(config.grace_ms, 25);
}

#[test]
fn partial_config_overrides_only_named_keys() {
    let config = Config::parse_toml("concurrency = 1").unwrap();
    assert_eq!(config.concurrency, 1);
    assert_eq!(config.queue_wait_ms, 2_000);
}

#[test]
fn zero_concurrency_is_rejected() {
    assert!(Config::parse_toml("concurrency = 0").is_err());
}

#[test]
fn zero_default_wall_time_is_rejected() {
    let toml = "[default_limits]\nwall_time_ms = 0\n";
    assert!(Config::parse_toml(toml).is_err());
}
