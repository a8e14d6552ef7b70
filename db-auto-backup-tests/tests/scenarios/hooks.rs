//! End-of-run hook calls

use test_utils::fixtures;
use test_utils::{ConfigBuilder, HookMethod, MockExec, MockTransport, TestContext};

#[tokio::test]
async fn test_no_hook_configured_sends_nothing() {
    let ctx = TestContext::new();
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::fail(1, "boom"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(!report.success());
    assert!(ctx.transport().get_requests().is_empty());
}

#[tokio::test]
async fn test_hook_failure_does_not_change_outcome() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_success_url("http://hooks.test/ok"))
        .with_transport(MockTransport::new().with_failure());
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("dump"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(report.success());
    assert_eq!(ctx.backup_files(), vec!["app-db.sql"]);
}

#[tokio::test]
async fn test_failure_payload_lists_every_target() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_failure_url("http://hooks.test/fail"));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_container(fixtures::mysql_container("m1", "shop-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("dump"))
        .with_exec("m1", "mysql", MockExec::fail(1, "Access denied for user 'root'"));

    let report = ctx.manager(runtime).run_once().await;
    assert!(!report.success());

    let requests = ctx.transport().get_requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, HookMethod::Post);

    let body = request.body.as_ref().unwrap();
    assert_eq!(body["success"], false);
    assert!(body["summary"].as_str().unwrap().contains("shop-db"));
    assert!(body["started_at"].as_str().is_some());

    let targets = body["targets"].as_array().unwrap();
    assert_eq!(targets.len(), 2);
    assert_eq!(targets[0]["name"], "app-db");
    assert_eq!(targets[0]["engine"], "postgres");
    assert_eq!(targets[0]["success"], true);
    assert_eq!(targets[0]["file"], "app-db.sql");
    assert_eq!(targets[1]["name"], "shop-db");
    assert_eq!(targets[1]["success"], false);
    assert!(targets[1]["error"].as_str().unwrap().contains("Access denied"));
}

#[tokio::test]
async fn test_only_success_url_receives_failures_too() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_success_url("http://hooks.test/ping"));
    let runtime = ctx
        .runtime()
        .with_container(fixtures::redis_container("r1", "cache"))
        .with_exec("r1", "redis-cli", MockExec::stdout("ERR disabled"));

    let report = ctx.manager(runtime).run_once().await;

    assert!(!report.success());
    let requests = ctx.transport().get_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].url, "http://hooks.test/ping");
    assert_eq!(requests[0].method, HookMethod::Post);
}

#[tokio::test]
async fn test_empty_dump_flagged_in_payload() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .with_failure_url("http://hooks.test/fail")
            .with_success_url("http://hooks.test/ok"),
    );
    let runtime = ctx
        .runtime()
        .with_container(fixtures::mysql_container("m1", "empty-db"))
        .with_container(fixtures::postgres_container("p1", "broken"))
        .with_exec("m1", "mysql", MockExec::stdout(fixtures::mysql_database_list(&[])))
        .with_exec("p1", "pg_dumpall", MockExec::fail(1, "boom"));

    ctx.manager(runtime).run_once().await;

    let requests = ctx.transport().get_requests();
    let body = requests[0].body.as_ref().unwrap();
    let empty = body["targets"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "empty-db")
        .unwrap();
    assert_eq!(empty["success"], true);
    assert_eq!(empty["bytes"], 0);
    assert_eq!(empty["warning"], "empty dump");
}
