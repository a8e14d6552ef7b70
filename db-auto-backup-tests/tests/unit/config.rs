//! Configuration from the environment and from TOML files

use db_auto_backup::config::{load_config, Config, ConfigError, TimestampOrder};
use db_auto_backup::utils::Compression;
use rstest::rstest;
use std::path::PathBuf;
use test_utils::{OptionAssertions, ResultAssertions};

fn from_vars(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    Config::from_vars(vars.iter().map(|(k, v)| (k.to_string(), v.to_string())))
}

#[test]
fn test_empty_environment_gives_defaults() {
    let config = from_vars(&[]).assert_ok();

    assert_eq!(config.backup_dir, PathBuf::from("/var/backups"));
    assert!(config.schedule().is_none());
    assert_eq!(config.compression, Compression::Plain);
    assert_eq!(config.max_parallel, 1);
    assert!(!config.timestamp.enabled);
    assert!(!config.hooks.is_configured());
    assert!(!config.s3.enabled);
}

#[test]
fn test_full_environment() {
    let config = from_vars(&[
        ("BACKUP_DIR", "/srv/dumps"),
        ("SCHEDULE", "0 4 * * *"),
        ("COMPRESSION", "gzip"),
        ("MAX_PARALLEL", "3"),
        ("TIMESTAMP", "true"),
        ("TIMESTAMP_FORMAT", "%Y%m%d"),
        ("TIMESTAMP_ORDER", "before"),
        ("SUCCESS_HOOK_URL", "https://hooks.test/ok"),
        ("INCLUDE_LOGS", "yes"),
    ])
    .assert_ok();

    assert_eq!(config.backup_dir, PathBuf::from("/srv/dumps"));
    assert_eq!(config.schedule(), Some("0 4 * * *"));
    assert_eq!(config.compression, Compression::Gzip);
    assert_eq!(config.max_parallel, 3);
    assert!(config.timestamp.enabled);
    assert_eq!(config.timestamp.order, TimestampOrder::Before);
    assert_eq!(config.hooks.success_url().as_deref(), Some("https://hooks.test/ok"));
    // Without an explicit failure URL failures go to the success URL
    assert_eq!(config.hooks.failure_url().as_deref(), Some("https://hooks.test/ok"));
    assert!(config.hooks.include_logs);
}

#[rstest]
#[case("gzip", Compression::Gzip)]
#[case("lzma", Compression::Lzma)]
#[case("xz", Compression::Lzma)]
#[case("bz2", Compression::Bz2)]
#[case("plain", Compression::Plain)]
fn test_compression_names(#[case] name: &str, #[case] expected: Compression) {
    let config = from_vars(&[("COMPRESSION", name)]).assert_ok();
    assert_eq!(config.compression, expected);
}

#[rstest]
#[case(&[("COMPRESSION", "zstd")], "COMPRESSION")]
#[case(&[("MAX_PARALLEL", "many")], "MAX_PARALLEL")]
#[case(&[("MAX_PARALLEL", "0")], "max_parallel")]
#[case(&[("SCHEDULE", "every day")], "every day")]
#[case(&[("TIMESTAMP_ORDER", "sideways")], "TIMESTAMP_ORDER")]
#[case(&[("TIMESTAMP", "1"), ("TIMESTAMP_FORMAT", "%Y/%m/%d")], "'/'")]
fn test_invalid_environment(#[case] vars: &[(&str, &str)], #[case] needle: &str) {
    from_vars(vars).assert_err_contains(needle);
}

#[test]
fn test_s3_enabled_requires_every_field() {
    let err = from_vars(&[("S3_ENABLED", "true"), ("S3_ENDPOINT", "http://minio:9000")])
        .err()
        .assert_some()
        .to_string();

    assert!(err.contains("bucket"));
    assert!(err.contains("access_key"));
    assert!(err.contains("secret_key"));
    assert!(!err.contains("endpoint"));
}

#[test]
fn test_healthchecks_id_resolves_both_urls() {
    let config = from_vars(&[("HEALTHCHECKS_ID", "abc-123")]).assert_ok();

    assert_eq!(
        config.hooks.success_url().as_deref(),
        Some("https://hc-ping.com/abc-123")
    );
    assert_eq!(
        config.hooks.failure_url().as_deref(),
        Some("https://hc-ping.com/abc-123/fail")
    );
}

#[test]
fn test_load_config_from_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
backup_dir = "/data/backups"
schedule = "30 2 * * *"
compression = "bz2"
max_parallel = 2

[timestamp]
enabled = true
order = "after"

[hooks]
uptime_kuma_url = "https://kuma.test/api/push/xyz"

[s3]
enabled = true
endpoint = "http://minio:9000"
bucket = "dbs"
access_key = "key"
secret_key = "secret"
prefix = ""
keep_local = false
"#,
    )
    .unwrap();

    let config = load_config(&path).assert_ok();
    assert_eq!(config.compression, Compression::Bz2);
    assert_eq!(config.max_parallel, 2);
    assert_eq!(config.timestamp.format, "%Y-%m-%d_%H-%M");
    assert_eq!(
        config.hooks.success_url().as_deref(),
        Some("https://kuma.test/api/push/xyz")
    );
    assert_eq!(config.s3.prefix, "");
    assert!(!config.s3.keep_local);
}

#[test]
fn test_load_config_rejects_unknown_compression() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "compression = \"zip\"\n").unwrap();

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}
