//! Once-a-day job scheduling.
//!
//! The [`Scheduler`] owns the next trigger instant and polls for it; nothing
//! about the schedule lives in global state. Each run of the job is wrapped
//! so that a panic inside it is logged and the loop carries on.

use std::{any::Any, panic::AssertUnwindSafe, pin::pin, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use futures::FutureExt;
use tracing::{error, info, warn};

use crate::tz::from_local_naive;

/// A wall-clock time of day in a time zone, e.g. 22:00 UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    /// Local time of day the job fires at.
    pub time: NaiveTime,
    /// Zone `time` is interpreted in.
    pub tz: Tz,
}

impl DailyTrigger {
    /// Creates a trigger for `time` in `tz`.
    pub fn new(time: NaiveTime, tz: Tz) -> Self {
        Self { time, tz }
    }

    /// First trigger instant strictly after `instant`.
    ///
    /// A trigger time that falls into a DST gap fires at the first valid
    /// minute after the gap; one that occurs twice fires at the earlier
    /// occurrence only.
    pub fn next_after(&self, instant: DateTime<Utc>) -> DateTime<Utc> {
        let local_date = instant.with_timezone(&self.tz).date_naive();
        for day in local_date.iter_days().take(3) {
            let naive = day.and_time(self.time);
            match from_local_naive(naive, self.tz) {
                Ok(candidate) if candidate > instant => return candidate,
                Ok(_) => {}
                Err(e) => warn!(date = %day, error = %e, "skipping unresolvable trigger time"),
            }
        }
        // Only reachable for zones with gaps longer than the shift cap.
        instant + chrono::Duration::days(1)
    }
}

/// Work the scheduler runs on every trigger.
#[async_trait]
pub trait ScheduledJob {
    /// Summary produced by one run.
    type Report: Send;

    /// Runs the job once. Failures are expected to be folded into the report.
    async fn run(&self) -> Self::Report;
}

/// Result of one guarded job invocation.
#[derive(Debug)]
pub enum JobRun<R> {
    /// The job returned normally.
    Completed(R),
    /// The job panicked; the payload message is kept for the log.
    Panicked(String),
}

/// Owns the job, its trigger and the next instant it is due.
pub struct Scheduler<J> {
    job: J,
    trigger: DailyTrigger,
    next_trigger: DateTime<Utc>,
    poll_interval: Duration,
}

impl<J> Scheduler<J>
where
    J: ScheduledJob + Sync,
{
    /// Creates a scheduler whose first trigger is the first one after `now`.
    pub fn new(job: J, trigger: DailyTrigger, poll_interval: Duration, now: DateTime<Utc>) -> Self {
        Self {
            job,
            next_trigger: trigger.next_after(now),
            trigger,
            poll_interval,
        }
    }

    /// Instant the job will fire at next.
    pub fn next_trigger(&self) -> DateTime<Utc> {
        self.next_trigger
    }

    /// Runs the job immediately, outside the schedule, catching panics.
    async fn run_now(&self) -> JobRun<J::Report> {
        match AssertUnwindSafe(self.job.run()).catch_unwind().await {
            Ok(report) => JobRun::Completed(report),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(panic = %message, "job panicked");
                JobRun::Panicked(message)
            }
        }
    }

    /// Runs the job now and schedules the first trigger after `now`.
    pub async fn start(&mut self, now: DateTime<Utc>) -> JobRun<J::Report> {
        self.next_trigger = self.trigger.next_after(now);
        info!("running startup job");
        let run = self.run_now().await;
        info!(next_trigger = %self.next_trigger, "startup job finished");
        run
    }

    /// Fires the job if the next trigger is due at `now`.
    ///
    /// Triggers missed while the process was busy or suspended collapse into
    /// this one run; the next trigger is always strictly after both `now`
    /// and the trigger that just fired.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Option<JobRun<J::Report>> {
        if now < self.next_trigger {
            return None;
        }
        let due = self.next_trigger;
        self.next_trigger = self.trigger.next_after(now.max(due));
        info!(trigger = %due, "scheduled job due");
        let run = self.run_now().await;
        info!(next_trigger = %self.next_trigger, "scheduled job finished");
        Some(run)
    }

    /// Polls for due triggers until Ctrl-C is received.
    ///
    /// The signal is only observed while sleeping between polls, so a job
    /// that is running always finishes before the loop exits.
    pub async fn run_forever(mut self) {
        let mut shutdown = pin!(tokio::signal::ctrl_c());
        let mut listen = true;
        info!(next_trigger = %self.next_trigger, poll_secs = self.poll_interval.as_secs(), "scheduler started");
        loop {
            self.tick(Utc::now()).await;
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                res = &mut shutdown, if listen => match res {
                    Ok(()) => {
                        info!("shutdown requested, stopping scheduler");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "cannot listen for Ctrl-C, running until killed");
                        listen = false;
                    }
                },
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
