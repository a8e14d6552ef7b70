//! Scheduler driving real backup runs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use test_utils::fixtures;
use test_utils::{ConfigBuilder, MockExec, TestContext};
use db_auto_backup::{Scheduler, SchedulerState};
use tokio::sync::watch;

#[tokio::test]
async fn test_unscheduled_config_runs_once() {
    let ctx = TestContext::new();
    let runtime = ctx
        .runtime()
        .with_container(fixtures::postgres_container("p1", "app-db"))
        .with_exec("p1", "pg_dumpall", MockExec::stdout("dump"));
    let manager = ctx.manager(runtime.clone());

    let scheduler = Scheduler::from_config(ctx.config()).unwrap();
    let (_tx, shutdown) = watch::channel(false);
    let runs = scheduler
        .run(
            || async {
                manager.run_once().await;
            },
            shutdown,
        )
        .await;

    assert_eq!(runs, 1);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
    assert_eq!(runtime.get_calls().len(), 1);
}

#[tokio::test]
async fn test_shutdown_before_first_trigger() {
    let ctx = TestContext::from_builder(ConfigBuilder::new().with_schedule("0 3 * * *"));
    let manager = ctx.manager(ctx.runtime());
    let scheduler = Scheduler::from_config(ctx.config()).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let (tx, shutdown) = watch::channel(false);

    let job_counter = Arc::clone(&counter);
    let run = scheduler.run(
        || {
            let counter = Arc::clone(&job_counter);
            let manager = &manager;
            async move {
                manager.run_once().await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        },
        shutdown,
    );

    let stop = async {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        let _ = tx.send(true);
    };

    let (runs, _) = tokio::time::timeout(std::time::Duration::from_secs(5), async {
        tokio::join!(run, stop)
    })
    .await
    .expect("scheduler should stop promptly");

    assert_eq!(runs, 0);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.state(), SchedulerState::Stopped);
}
