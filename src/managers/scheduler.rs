//! Run scheduling
//!
//! Idle -> Running -> Idle ... -> Stopped. The next trigger is computed only
//! after the current run has finished, so runs never overlap. Without a
//! schedule there is exactly one run.

use crate::config::Config;
use crate::utils::cron::{parse_schedule, CronSchedule, ScheduleError};
use chrono::{DateTime, Local};
use std::future::Future;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

pub struct Scheduler {
    schedule: Option<CronSchedule>,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(schedule: Option<CronSchedule>) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self { schedule, state }
    }

    pub fn from_config(config: &Config) -> Result<Self, ScheduleError> {
        let schedule = config.schedule().map(parse_schedule).transpose()?;
        Ok(Self::new(schedule))
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Observe state transitions
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    pub fn next_trigger(&self, after: &DateTime<Local>) -> Option<DateTime<Local>> {
        self.schedule.as_ref()?.next_after(after)
    }

    /// Drive `job` until the schedule runs out or `shutdown` flips to true.
    ///
    /// A shutdown request never interrupts a running job; it only prevents
    /// the next one. Returns the number of completed runs.
    pub async fn run<F, Fut>(&self, mut job: F, mut shutdown: watch::Receiver<bool>) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut runs = 0;

        let Some(schedule) = &self.schedule else {
            info!("No schedule configured, running once");
            self.execute(&mut job).await;
            self.state.send_replace(SchedulerState::Stopped);
            return 1;
        };

        info!("Scheduling backups with '{}'", schedule.expression());

        loop {
            if *shutdown.borrow() {
                info!("Shutdown requested, not scheduling another run");
                break;
            }

            let now = Local::now();
            let Some(next) = schedule.next_after(&now) else {
                warn!("Schedule '{}' has no upcoming trigger", schedule.expression());
                break;
            };
            info!("Next backup run at {}", next.format("%Y-%m-%d %H:%M:%S"));
            let wait = (next - now).to_std().unwrap_or_default();

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown channel closed");
                        break;
                    }
                    continue;
                }
            }

            self.execute(&mut job).await;
            runs += 1;
        }

        self.state.send_replace(SchedulerState::Stopped);
        runs
    }

    async fn execute<F, Fut>(&self, job: &mut F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        self.state.send_replace(SchedulerState::Running);
        job().await;
        self.state.send_replace(SchedulerState::Idle);
    }
}
