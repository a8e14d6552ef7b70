//! Credentials flow from container environment to the exec calls

use db_auto_backup::managers::discovery::{classify, BackupTarget};
use db_auto_backup::managers::dump::run_dump;
use db_auto_backup::utils::ContainerInfo;
use std::time::Duration;
use test_utils::fixtures::{self, container};
use test_utils::{MockExec, MockRuntime, ResultAssertions, TargetError};

const TIMEOUT: Duration = Duration::from_secs(10);

fn target(info: &ContainerInfo) -> BackupTarget {
    classify(info).expect("fixture should classify")
}

fn env_value<'a>(env: &'a [(String, String)], key: &str) -> Option<&'a str> {
    env.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
}

#[test]
fn test_postgres_password_travels_in_exec_env() {
    let info = fixtures::postgres_container("p1", "app-db");
    let runtime = MockRuntime::new().with_exec("p1", "pg_dumpall", MockExec::stdout("-- all"));

    let mut out = Vec::new();
    run_dump(&runtime, &target(&info), &mut out, TIMEOUT).assert_ok();

    let calls = runtime.calls_for("p1");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].argv, vec!["pg_dumpall", "-U", "app"]);
    assert_eq!(env_value(&calls[0].env, "PGPASSWORD"), Some("pg-secret"));
    // The secret never appears on the command line
    assert!(!calls[0].argv.iter().any(|a| a.contains("pg-secret")));
}

#[test]
fn test_mysql_root_password_used_for_every_step() {
    let info = fixtures::mysql_container("m1", "shop-db");
    let runtime = MockRuntime::new()
        .with_exec("m1", "mysql", MockExec::stdout(fixtures::mysql_database_list(&["shop", "crm"])))
        .with_exec("m1", "mysqldump", MockExec::stdout(fixtures::sample_dump("shop-db")));

    let mut out = Vec::new();
    let summary = run_dump(&runtime, &target(&info), &mut out, TIMEOUT).assert_ok();
    assert_eq!(summary.bytes, out.len() as u64);

    let calls = runtime.calls_for("m1");
    let programs: Vec<&str> = calls.iter().map(|c| c.argv[0].as_str()).collect();
    assert_eq!(programs, vec!["which", "mysql", "mysqldump"]);

    let dump = &calls[2];
    assert!(dump.argv.contains(&"--user=root".to_string()));
    assert!(dump.argv.ends_with(&["shop".to_string(), "crm".to_string()]));
    assert_eq!(env_value(&dump.env, "MYSQL_PWD"), Some("root-secret"));
}

#[test]
fn test_mariadb_application_user() {
    let info = fixtures::mariadb_container("d1", "wiki-db");
    let runtime = MockRuntime::new()
        .with_exec("d1", "which", MockExec::stdout("/usr/bin/mariadb-dump\n"))
        .with_exec("d1", "mariadb", MockExec::stdout("wiki\n"))
        .with_exec("d1", "mariadb-dump", MockExec::stdout("-- wiki"));

    let mut out = Vec::new();
    run_dump(&runtime, &target(&info), &mut out, TIMEOUT).assert_ok();

    assert_eq!(out, b"-- wiki");
    let dump = runtime.calls_for("d1").pop().unwrap();
    assert!(dump.argv.contains(&"--user=app".to_string()));
    assert_eq!(env_value(&dump.env, "MYSQL_PWD"), Some("maria-secret"));
}

#[test]
fn test_mysql_without_credentials_is_a_planning_error() {
    let info = container("m2", "bare", "mysql:8", &[("MYSQL_MAJOR", "8.0")]);
    let runtime = MockRuntime::new();

    let mut out = Vec::new();
    let err = run_dump(&runtime, &target(&info), &mut out, TIMEOUT).unwrap_err();

    assert!(matches!(err, TargetError::Planning(_)));
    assert!(runtime.get_calls().is_empty());
}

#[test]
fn test_redis_password_passed_to_cli() {
    let info = container("r1", "cache", "redis:7", &[("REDIS_PASSWORD", "hunter2")]);
    let runtime = MockRuntime::new()
        .with_exec("r1", "redis-cli", MockExec::stdout("OK\n"))
        .with_exec("r1", "cat", MockExec::stdout(b"REDIS0011"));

    let mut out = Vec::new();
    run_dump(&runtime, &target(&info), &mut out, TIMEOUT).assert_ok();

    let save = &runtime.calls_for("r1")[0];
    assert_eq!(save.argv, vec!["redis-cli", "SAVE"]);
    assert_eq!(env_value(&save.env, "REDISCLI_AUTH"), Some("hunter2"));
    assert_eq!(out, b"REDIS0011");
}
