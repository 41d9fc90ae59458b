use config::Config;
use federation_report::config::{AppConfig, ConfigError};
use std::time::Duration;

fn from_yaml(yaml_content: &str) -> AppConfig {
    Config::builder()
        .add_source(config::File::from_str(
            yaml_content,
            config::FileFormat::Yaml,
        ))
        .build()
        .expect("Failed to build config")
        .try_deserialize()
        .expect("Failed to deserialize app config")
}

#[test]
fn test_app_config_deserialization() {
    let config = from_yaml(
        r#"
bind_address: "127.0.0.1:9000"
probe_timeout_secs: 5
dns_timeout_secs: 3
max_concurrent_probes: 16
"#,
    );

    assert_eq!(config.bind_address, "127.0.0.1:9000");
    assert!(config.validate().is_ok());
    assert_eq!(config.dns_timeout(), Duration::from_secs(3));

    let options = config.report_options();
    assert_eq!(options.probe_timeout, Duration::from_secs(5));
    assert_eq!(options.max_concurrent_probes, 16);
}

#[test]
fn test_app_config_defaults_for_missing_keys() {
    let config = from_yaml("probe_timeout_secs: 2\n");

    assert_eq!(config.bind_address, "0.0.0.0:8080");
    assert_eq!(config.probe_timeout_secs, 2);
    assert_eq!(config.dns_timeout_secs, 10);
    assert_eq!(config.max_concurrent_probes, 8);
}

#[test]
fn test_app_config_rejects_zero_timeouts() {
    let config = from_yaml("dns_timeout_secs: 0\n");

    match config.validate() {
        Err(ConfigError::Validation(msg)) => assert!(msg.contains("dns_timeout_secs")),
        other => panic!("expected validation error, got {other:?}"),
    }
}
