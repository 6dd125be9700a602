//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use factcheck_scheduler::config::scheduler::ENV_MAX_WORKERS;
use factcheck_scheduler::config::{PipelineConfig, SchedulerConfig};

#[test]
fn test_scheduler_config_defaults() {
    let cfg = SchedulerConfig::default();
    assert_eq!(cfg.max_workers, 4);
    assert_eq!(cfg.dispatch_poll(), Duration::from_secs(1));
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_scheduler_config_invalid_max_workers() {
    let invalid = SchedulerConfig::default().with_max_workers(0);
    assert!(invalid.validate().is_err());
}

#[test]
fn test_scheduler_config_invalid_stack_size() {
    let invalid = SchedulerConfig {
        thread_stack_size: 1024,
        ..SchedulerConfig::default()
    };
    assert!(invalid.validate().unwrap_err().contains("thread_stack_size"));
}

#[test]
fn test_scheduler_config_from_json() {
    let cfg = SchedulerConfig::from_json_str(r#"{"max_workers": 16}"#).unwrap();
    assert_eq!(cfg.max_workers, 16);
    assert_eq!(cfg.shutdown_timeout_secs, SchedulerConfig::default().shutdown_timeout_secs);

    assert!(SchedulerConfig::from_json_str(r#"{"max_workers": 0}"#).is_err());
    assert!(SchedulerConfig::from_json_str("not json").unwrap_err().starts_with("parse error"));
}

#[test]
fn test_scheduler_config_from_lookup() {
    let vars = HashMap::from([(ENV_MAX_WORKERS, "12")]);
    let cfg = SchedulerConfig::from_lookup(&|key| vars.get(key).map(|v| (*v).to_string())).unwrap();
    assert_eq!(cfg.max_workers, 12);

    let bad = HashMap::from([(ENV_MAX_WORKERS, "many")]);
    assert!(SchedulerConfig::from_lookup(&|key| bad.get(key).map(|v| (*v).to_string())).is_err());
}

#[test]
fn test_pipeline_config_validation() {
    let cfg = PipelineConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.drain_timeout(), None);

    let bounded = cfg.with_drain_timeout_secs(30);
    assert_eq!(bounded.drain_timeout(), Some(Duration::from_secs(30)));

    assert!(PipelineConfig::default().with_poll_interval_ms(0).validate().is_err());
    assert!(PipelineConfig::from_json_str(r#"{"drain_timeout_secs": 0}"#).is_err());
}
