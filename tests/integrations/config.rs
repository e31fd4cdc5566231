use batchdns::cli::Cli;
use batchdns::config::{Config, DnssecMode};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        pretty = true
        [dns]
        timeout_ms = 2000
        per_domain_timeout_ms = 15000
        concurrency = 8
        nameservers = ["1.1.1.1", "9.9.9.9:53"]
        retries = 4
        cache_ttl_default_secs = 30
        cache_capacity = 500
        dnssec_mode = "disabled"
    "#;

    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    let config = Config::load(&cli).unwrap();

    assert_eq!(config.log_level, "debug");
    assert!(config.pretty);
    assert_eq!(config.dns.timeout_ms, 2000);
    assert_eq!(config.dns.per_domain_timeout_ms, Some(15000));
    assert_eq!(config.dns.concurrency, 8);
    assert_eq!(
        config.dns.nameservers,
        Some(vec!["1.1.1.1".to_string(), "9.9.9.9:53".to_string()])
    );
    assert_eq!(config.dns.retries, 4);
    assert_eq!(config.dns.cache_ttl_default_secs, 30);
    assert_eq!(config.dns.cache_capacity, 500);
    assert_eq!(config.dns.dnssec_mode, DnssecMode::Disabled);
}

#[test]
fn test_defaults_without_a_config_file() {
    let config = Config::load(&Cli::default()).unwrap();

    assert_eq!(config.log_level, "info");
    assert!(!config.pretty);
    assert_eq!(config.dns.timeout_ms, 3000);
    assert_eq!(config.dns.concurrency, 50);
    assert_eq!(config.dns.nameservers, None);
    assert_eq!(config.dns.dnssec_mode, DnssecMode::Presence);
}

#[test]
fn test_cli_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
        [dns]
        concurrency = 8
        retries = 4
        timeout_ms = 2000
        "#
    )
    .unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        concurrency: Some(3),
        timeout_ms: Some(750),
        nameservers: vec!["192.0.2.1:5353".to_string()],
        ..Default::default()
    };
    let config = Config::load(&cli).unwrap();

    assert_eq!(config.dns.concurrency, 3);
    assert_eq!(config.dns.timeout_ms, 750);
    assert_eq!(config.dns.retries, 4);
    assert_eq!(
        config.dns.nameservers,
        Some(vec!["192.0.2.1:5353".to_string()])
    );
}

#[test]
fn test_env_overrides_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[dns]\nbackoff_base_ms = 20\n").unwrap();
    std::env::set_var("BATCHDNS_DNS__BACKOFF_BASE_MS", "250");

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    let config = Config::load(&cli);
    std::env::remove_var("BATCHDNS_DNS__BACKOFF_BASE_MS");

    assert_eq!(config.unwrap().dns.backoff_base_ms, 250);
}

#[test]
fn test_invalid_value_is_rejected() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[dns]\ndnssec_mode = \"validate\"\n").unwrap();

    let cli = Cli {
        config: Some(file.path().to_path_buf()),
        ..Default::default()
    };
    assert!(Config::load(&cli).is_err());
}

#[test]
fn test_collect_domains_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        "# batch one\nexample.com\n\n  example.org  \n#example.net\n"
    )
    .unwrap();

    let cli = Cli {
        domains: vec!["first.example".to_string()],
        file: Some(file.path().to_path_buf()),
        ..Default::default()
    };

    assert_eq!(
        cli.collect_domains().unwrap(),
        vec!["first.example", "example.com", "example.org"]
    );
}

#[test]
fn test_collect_domains_missing_file() {
    let cli = Cli {
        file: Some("/nonexistent/domains.txt".into()),
        ..Default::default()
    };
    assert!(cli.collect_domains().is_err());
}
