//! Chaos faults fire only for opted-in requests, and never in test mode.

use crate::chaos::ChaosPolicy;
use crate::config::ServerConfig;

#[test]
fn test_full_rate_fails_every_opted_in_request() {
    let policy = ChaosPolicy::new(1.0, false);
    for _ in 0..100 {
        assert!(policy.should_fail(true));
    }
}

#[test]
fn test_requests_without_opt_in_never_fail() {
    let policy = ChaosPolicy::new(1.0, false);
    for _ in 0..100 {
        assert!(!policy.should_fail(false));
    }
}

#[test]
fn test_test_mode_suppresses_chaos_entirely() {
    let policy = ChaosPolicy::new(1.0, true);
    for _ in 0..100 {
        assert!(!policy.should_fail(true));
    }
}

#[test]
fn test_default_config_is_quiet() {
    let config = ServerConfig::default();
    assert!(config.test_mode);
    assert!(!config.chaos_disconnect);
    let policy = ChaosPolicy::new(config.chaos_rate, config.test_mode);
    assert!(!policy.should_fail(true));
}
