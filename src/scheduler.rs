//! Periodic background jobs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use log::*;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Every {
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl Every {
    /// `None` when the interval does not fit in seconds.
    pub fn period(&self) -> Option<Duration> {
        let secs = match *self {
            Every::Seconds(n) => Some(n),
            Every::Minutes(n) => n.checked_mul(60),
            Every::Hours(n) => n.checked_mul(60 * 60),
            Every::Days(n) => n.checked_mul(24 * 60 * 60),
        };

        secs.map(Duration::from_secs)
    }
}

#[derive(Clone)]
struct ScheduledJob {
    job: Arc<dyn Job>,
    period: Duration,
}

/// Runs registered jobs on their intervals until stopped.
///
/// Jobs run one at a time on a single task, so a job never overlaps with
/// itself. A run that outlasts its interval delays the next one instead of
/// queueing missed runs.
pub struct JobManager {
    jobs: Vec<ScheduledJob>,
    cancel: CancellationToken,
    run_on_start: bool,
}

impl JobManager {
    pub fn new(run_on_start: bool) -> Self {
        Self {
            jobs: Vec::new(),
            cancel: CancellationToken::new(),
            run_on_start,
        }
    }

    pub fn add_job(&mut self, every: Every, job: Arc<dyn Job>) -> Result<()> {
        let period = match every.period() {
            Some(period) if period.is_zero() => {
                bail!("Job {} needs a non zero interval", job.name())
            }
            Some(period) if Instant::now().checked_add(period).is_some() => period,
            _ => bail!("Job {} interval {:?} is out of range", job.name(), every),
        };

        info!("Scheduled job {} every {:?}", job.name(), period);

        self.jobs.push(ScheduledJob { job, period });

        info!("Total jobs: {}", self.total());

        Ok(())
    }

    pub fn total(&self) -> usize {
        self.jobs.len()
    }

    pub fn start(&self) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        let cancel = self.cancel.clone();
        let run_on_start = self.run_on_start;

        tokio::spawn(async move {
            let now = Instant::now();

            let mut next_runs: Vec<Instant> = jobs
                .iter()
                .map(|job| if run_on_start { now } else { now + job.period })
                .collect();

            loop {
                let Some((index, at)) = next_runs
                    .iter()
                    .copied()
                    .enumerate()
                    .min_by_key(|(_, at)| *at)
                else {
                    cancel.cancelled().await;
                    break;
                };

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep_until(at) => {}
                }

                let scheduled = &jobs[index];

                debug!("Running job {}", scheduled.job.name());

                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = scheduled.job.run() => {
                        if let Err(err) = result {
                            error!("Job {} failed: {:#}", scheduled.job.name(), err);
                        }
                    }
                }

                let mut next = at + scheduled.period;
                if next <= Instant::now() {
                    next = Instant::now() + scheduled.period;
                }
                next_runs[index] = next;
            }

            info!("Job scheduler stopped");
        })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
