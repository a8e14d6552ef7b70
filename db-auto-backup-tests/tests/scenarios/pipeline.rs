//! File output, naming and uploads

use rstest::rstest;
use std::io::Read;
use test_utils::fixtures::{self, container};
use test_utils::{
    Compression, ConfigBuilder, MockExec, MockObjectStore, TargetError, TestContext, TimestampOrder,
};

fn decode(compression: Compression, bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    compression.decoder(bytes).read_to_end(&mut out).unwrap();
    out
}

#[rstest]
#[case(Compression::Plain, "app-db.sql")]
#[case(Compression::Gzip, "app-db.sql.gz")]
#[case(Compression::Lzma, "app-db.sql.xz")]
#[case(Compression::Bz2, "app-db.sql.bz2")]
#[tokio::test]
async fn test_every_codec_restores_the_dump(#[case] compression: Compression, #[case] file: &str) {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_compression(compression));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout(fixtures::sample_dump("app-db")));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success(), "{}", report.summary());
    assert_eq!(ctx.backup_files(), vec![file.to_string()]);
    let stored = ctx.read_backup(file).unwrap();
    assert_eq!(decode(compression, &stored), fixtures::sample_dump("app-db"));
}

#[tokio::test]
async fn test_redis_file_extension() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_compression(Compression::Lzma));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::redis_container("r1", "cache"))
        .with_exec("r1", "redis-cli", MockExec::stdout("OK"))
        .with_exec("r1", "cat", MockExec::stdout(b"REDIS0011\xfe\x00"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success(), "{}", report.summary());
    assert_eq!(ctx.backup_files(), vec!["cache.rdb.xz"]);
}

#[rstest]
#[case(TimestampOrder::After, "app-db__20240102.sql")]
#[case(TimestampOrder::Before, "20240102__app-db.sql")]
fn test_timestamp_placement(#[case] order: TimestampOrder, #[case] expected: &str) {
    use chrono::TimeZone;
    use db_auto_backup::managers::pipeline::backup_file_name;

    let config = ConfigBuilder::new().with_timestamp("%Y%m%d", order).build();
    let started = chrono::Local.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();

    let name = backup_file_name(
        "app-db",
        db_auto_backup::EngineKind::Postgres,
        config.compression,
        &config.timestamp,
        &started,
    );
    assert_eq!(name, expected);
}

#[tokio::test]
async fn test_colliding_names_get_distinct_files() {
    let ctx = TestContext::new();
    // Both names sanitise to `app_db`
    let runtime = ctx
        .runtime()
        .with_container(container("aaaaaaaaaaaa1111", "app db", "postgres:16", &[]))
        .with_container(container("bbbbbbbbbbbb2222", "app_db", "postgres:16", &[]))
        .with_exec("aaaaaaaaaaaa1111", "pg_dumpall", MockExec::stdout("first"))
        .with_exec("bbbbbbbbbbbb2222", "pg_dumpall", MockExec::stdout("second"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success(), "{}", report.summary());
    let files = ctx.backup_files();
    assert_eq!(files.len(), 2);
    assert!(files.contains(&"app_db-aaaaaaaaaaaa.sql".to_string()));
    assert!(files.contains(&"app_db-bbbbbbbbbbbb.sql".to_string()));
}

#[tokio::test]
async fn test_empty_dump_is_kept_with_warning() {
    let ctx = TestContext::new();
    let runtime = ctx
        .runtime()
        .with_container(fixtures::mysql_container("m1", "empty-db"))
        .with_exec("m1", "mysql", MockExec::stdout(fixtures::mysql_database_list(&[])));

    let report = ctx.manager(runtime.clone()).run_once().await;

    assert!(report.success());
    assert_eq!(ctx.backup_files(), vec!["empty-db.sql"]);
    assert!(ctx.read_backup("empty-db.sql").unwrap().is_empty());
    assert_eq!(report.warnings().len(), 1);
    assert!(!runtime.was_called("m1", "mysqldump"));
}

#[tokio::test]
async fn test_upload_keeps_local_copy_by_default() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_s3("nightly/", true));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("payload"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success(), "{}", report.summary());
    assert_eq!(report.uploaded_count(), 1);

    let uploads = ctx.store().get_uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].key, "nightly/app-db.sql");
    // The object is the finished file, not a partial one
    assert_eq!(uploads[0].contents, b"payload");
    assert!(ctx.backup_path("app-db.sql").exists());
}

#[tokio::test]
async fn test_upload_removes_local_copy_when_configured() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_s3("", false));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("payload"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success(), "{}", report.summary());
    assert_eq!(ctx.store().keys(), vec!["app-db.sql"]);
    assert!(ctx.backup_files().is_empty());

    let artifact = report.outcomes[0].result.as_ref().unwrap();
    assert!(artifact.local_path.is_none());
    assert_eq!(artifact.s3_key.as_deref(), Some("app-db.sql"));
}

#[tokio::test]
async fn test_failed_upload_keeps_local_file_and_fails_target() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_s3("backups", false))
        .with_store(MockObjectStore::new().with_failing_key("backups/app-db.sql"));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_container(fixtures::postgres_container("p2", "other-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("one"))
        .with_exec("p2", "pg_dumpall", MockExec::stdout("two"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(!report.success());
    let failed = report.outcomes.iter().find(|o| o.target_name == "app-db").unwrap();
    assert!(matches!(failed.result, Err(TargetError::Upload { .. })));
    // Local copy survives the failed upload even with keep_local off
    assert_eq!(ctx.backup_files(), vec!["app-db.sql"]);
    assert_eq!(ctx.store().keys(), vec!["backups/other-db.sql"]);
}

#[tokio::test]
async fn test_failed_dump_never_uploads() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_s3("backups", true));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec(
            "p1",
            "pg_dumpall",
            MockExec::Failure {
                exit_code: 2,
                stdout: b"-- partial".to_vec(),
                stderr: "server closed the connection".to_string(),
            },
        );

    let report = ctx.manager(runtime).run_once().await;

    assert!(!report.success());
    assert!(ctx.store().get_uploads().is_empty());
    assert!(ctx.backup_files().is_empty());
}
