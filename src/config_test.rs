use super::*;

#[test]
fn defaults_match_stated_values() {
    let config = ClientConfig::new("http://127.0.0.1:3000");

    assert_eq!(config.reconnect_base_delay, Duration::from_secs(1));
    assert_eq!(config.reconnect_max_delay, Duration::from_secs(30));
    assert_eq!(config.max_reconnect_attempts, 10);
    assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
    assert_eq!(config.resize_debounce, Duration::from_millis(150));
    assert_eq!(config.recenter_settle_delay, Duration::from_millis(100));
}

#[test]
fn parse_or_accepts_valid_values() {
    assert_eq!(parse_or::<u64>(Some("2500"), 1000), 2500);
    assert_eq!(parse_or::<u32>(Some("3"), 10), 3);
}

#[test]
fn parse_or_falls_back_on_garbage() {
    assert_eq!(parse_or::<u64>(Some("soon"), 1000), 1000);
    assert_eq!(parse_or::<u64>(Some(""), 1000), 1000);
    assert_eq!(parse_or::<u64>(None, 1000), 1000);
}

#[test]
fn from_env_without_overrides_uses_defaults() {
    // Relies on ENGAGE_* not being set in the test environment.
    let config = ClientConfig::from_env();

    assert_eq!(config.max_reconnect_attempts, 10);
    assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
}
