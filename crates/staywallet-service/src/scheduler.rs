//! Scheduled job runner.
//!
//! Each job runs on its own tokio interval. Before every run the scheduler
//! takes the job's lease in the store; if another runner holds it, the run is
//! skipped. Leases expire, so a crashed runner cannot block a job forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use staywallet_core::{JobLease, Result};
use staywallet_store::Store;

use crate::outbox::{DispatchReport, OutboxDispatcher, OUTBOX_JOB};
use crate::settlement::{AutoCancelJob, JobReport, ReleaseJob, AUTO_CANCEL_JOB, RELEASE_JOB};

/// The scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Release of held funds.
    Release,
    /// Auto-cancellation of unconfirmed bookings.
    AutoCancel,
    /// Outbox delivery.
    Outbox,
}

impl Job {
    /// Name used for leases and logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Release => RELEASE_JOB,
            Self::AutoCancel => AUTO_CANCEL_JOB,
            Self::Outbox => OUTBOX_JOB,
        }
    }
}

/// How often each job runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCadence {
    /// Release job period.
    pub release: Duration,
    /// Auto-cancellation job period.
    pub auto_cancel: Duration,
    /// Outbox dispatcher period.
    pub outbox: Duration,
}

impl JobCadence {
    const fn period(&self, job: Job) -> Duration {
        match job {
            Job::Release => self.release,
            Job::AutoCancel => self.auto_cancel,
            Job::Outbox => self.outbox,
        }
    }
}

impl Default for JobCadence {
    fn default() -> Self {
        Self {
            release: Duration::from_secs(24 * 60 * 60),
            auto_cancel: Duration::from_secs(60 * 60),
            outbox: Duration::from_secs(60),
        }
    }
}

/// Runs the settlement jobs under store-backed leases.
pub struct Scheduler {
    store: Arc<dyn Store>,
    release: Arc<ReleaseJob>,
    auto_cancel: Arc<AutoCancelJob>,
    outbox: Arc<OutboxDispatcher>,
    cadence: JobCadence,
    holder: String,
    lease_ttl: chrono::Duration,
}

impl Scheduler {
    /// Create a scheduler. `holder` identifies this runner in job leases.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        release: Arc<ReleaseJob>,
        auto_cancel: Arc<AutoCancelJob>,
        outbox: Arc<OutboxDispatcher>,
        holder: impl Into<String>,
    ) -> Self {
        Self {
            store,
            release,
            auto_cancel,
            outbox,
            cadence: JobCadence::default(),
            holder: holder.into(),
            lease_ttl: chrono::Duration::minutes(15),
        }
    }

    /// Override the job periods.
    #[must_use]
    pub fn with_cadence(mut self, cadence: JobCadence) -> Self {
        self.cadence = cadence;
        self
    }

    /// Override how long a lease is valid.
    #[must_use]
    pub fn with_lease_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }

    /// Run the release job once. `None` if another runner holds the lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease or the candidate scan fails.
    pub async fn run_release(&self, now: DateTime<Utc>) -> Result<Option<JobReport>> {
        self.with_lease(Job::Release, now, self.release.run(now.date_naive()))
            .await
    }

    /// Run the auto-cancellation job once. `None` if another runner holds
    /// the lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease or the candidate scan fails.
    pub async fn run_auto_cancel(&self, now: DateTime<Utc>) -> Result<Option<JobReport>> {
        self.with_lease(Job::AutoCancel, now, self.auto_cancel.run(now))
            .await
    }

    /// Drain one outbox batch. `None` if another runner holds the lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lease or the store fails.
    pub async fn run_outbox(&self, now: DateTime<Utc>) -> Result<Option<DispatchReport>> {
        self.with_lease(Job::Outbox, now, self.outbox.run(now)).await
    }

    async fn with_lease<T>(
        &self,
        job: Job,
        now: DateTime<Utc>,
        work: impl std::future::Future<Output = Result<T>>,
    ) -> Result<Option<T>> {
        let lease = JobLease::new(job.name(), self.holder.as_str(), now, self.lease_ttl);
        if !self.store.try_acquire_lease(&lease)? {
            tracing::debug!(job = job.name(), "Lease held by another runner, skipping");
            return Ok(None);
        }

        let result = work.await;

        if let Err(e) = self.store.release_lease(job.name(), &self.holder) {
            tracing::warn!(job = job.name(), error = %e, "Failed to release job lease");
        }
        result.map(Some)
    }

    async fn tick(&self, job: Job) {
        let now = Utc::now();
        let outcome = match job {
            Job::Release => self.run_release(now).await.map(|r| r.is_some()),
            Job::AutoCancel => self.run_auto_cancel(now).await.map(|r| r.is_some()),
            Job::Outbox => self.run_outbox(now).await.map(|r| r.is_some()),
        };

        match outcome {
            Ok(true) => {}
            Ok(false) => tracing::debug!(job = job.name(), "Run skipped"),
            Err(e) => tracing::error!(job = job.name(), error = %e, "Job run failed"),
        }
    }

    async fn run_loop(self: Arc<Self>, job: Job, mut shutdown: watch::Receiver<bool>) {
        let period = self.cadence.period(job).max(Duration::from_secs(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(job = job.name(), period_seconds = period.as_secs(), "Job scheduled");
        loop {
            tokio::select! {
                _ = interval.tick() => self.tick(job).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!(job = job.name(), "Job stopped");
    }

    /// Spawn one loop per job. They stop once `shutdown` turns `true` or its
    /// sender is dropped.
    #[must_use]
    pub fn spawn(self: &Arc<Self>, shutdown: &watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        [Job::Release, Job::AutoCancel, Job::Outbox]
            .into_iter()
            .map(|job| tokio::spawn(Arc::clone(self).run_loop(job, shutdown.clone())))
            .collect()
    }
}
