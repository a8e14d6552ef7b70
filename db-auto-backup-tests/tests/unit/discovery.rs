//! Container classification and target discovery

use db_auto_backup::engines::{match_engine, ConnectionParams};
use db_auto_backup::managers::discovery::{discover, SkipReason, OPT_OUT_ENV, OPT_OUT_LABEL};
use db_auto_backup::EngineKind;
use rstest::rstest;
use std::collections::HashMap;
use test_utils::fixtures::{self, container};
use test_utils::{MockRuntime, ResultAssertions};

#[rstest]
#[case("postgres:16", EngineKind::Postgres)]
#[case("docker.io/library/postgres:15-alpine", EngineKind::Postgres)]
#[case("ghcr.io/immich-app/postgres:14-vectorchord0.3.0", EngineKind::Postgres)]
#[case("timescale/timescaledb-ha:pg16", EngineKind::Postgres)]
#[case("mariadb:11@sha256:0123abcd", EngineKind::MariaDb)]
#[case("lscr.io/linuxserver/mariadb:latest", EngineKind::MariaDb)]
#[case("mysql:8.4", EngineKind::MySql)]
#[case("percona:8", EngineKind::MySql)]
#[case("redis:7-alpine", EngineKind::Redis)]
#[case("localhost:5000/redis/redis-stack-server", EngineKind::Redis)]
fn test_image_rules(#[case] image: &str, #[case] expected: EngineKind) {
    let descriptor = match_engine(image, &HashMap::new()).expect("image should match");
    assert_eq!(descriptor.kind, expected);
}

#[test]
fn test_env_marker_rule_for_custom_image() {
    let env = HashMap::from([("PG_MAJOR".to_string(), "16".to_string())]);
    let descriptor = match_engine("registry.example.com/team/custom-db:1", &env).unwrap();
    assert_eq!(descriptor.kind, EngineKind::Postgres);
}

#[test]
fn test_image_rule_wins_over_env_marker() {
    // A MariaDB image that also declares a MySQL marker
    let env = HashMap::from([("MYSQL_VERSION".to_string(), "8".to_string())]);
    let descriptor = match_engine("mariadb:11", &env).unwrap();
    assert_eq!(descriptor.kind, EngineKind::MariaDb);
}

#[test]
fn test_unknown_image_without_markers() {
    assert!(match_engine("nginx:latest", &HashMap::new()).is_none());
    assert!(match_engine("mypostgres:1", &HashMap::new()).is_none());
}

#[test]
fn test_discover_mixed_containers() {
    let runtime = MockRuntime::new()
        .with_container(fixtures::redis_container("r1", "cache"))
        .with_container(fixtures::nginx_container("n1", "web"))
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_container(fixtures::with_label(
            fixtures::mysql_container("m1", "legacy"),
            OPT_OUT_LABEL,
            "false",
        ));

    let discovery = discover(&runtime).assert_ok();

    assert_eq!(discovery.containers_seen, 4);
    let names: Vec<&str> = discovery
        .targets
        .iter()
        .map(|t| t.container_name.as_str())
        .collect();
    assert_eq!(names, vec!["app-db", "cache"]);

    assert_eq!(discovery.skipped.len(), 2);
    let legacy = discovery.skipped.iter().find(|s| s.name == "legacy").unwrap();
    assert_eq!(legacy.reason, SkipReason::OptedOut);
    let web = discovery.skipped.iter().find(|s| s.name == "web").unwrap();
    assert_eq!(web.reason, SkipReason::UnknownEngine);
}

#[test]
fn test_discover_extracts_connection_params() {
    let runtime = MockRuntime::new().with_container(fixtures::postgres_container("p1", "app-db"));
    let discovery = discover(&runtime).assert_ok();

    match &discovery.targets[0].params {
        ConnectionParams::Postgres(params) => {
            assert_eq!(params.user, "app");
            assert_eq!(params.password.as_deref(), Some("pg-secret"));
        }
        other => panic!("unexpected params: {:?}", other),
    }
}

#[rstest]
#[case("false", true)]
#[case("0", true)]
#[case("off", true)]
#[case("true", false)]
#[case("1", false)]
fn test_opt_out_env(#[case] value: &str, #[case] skipped: bool) {
    let runtime = MockRuntime::new().with_container(container(
        "p1",
        "app-db",
        "postgres:16",
        &[(OPT_OUT_ENV, value)],
    ));
    let discovery = discover(&runtime).assert_ok();
    assert_eq!(discovery.targets.is_empty(), skipped);
}

#[test]
fn test_discover_surfaces_runtime_failure() {
    let runtime = MockRuntime::new().with_failing_list();
    assert!(discover(&runtime).is_err());
}
