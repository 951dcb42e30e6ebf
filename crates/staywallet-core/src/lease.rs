//! Job leases for scheduled-job mutual exclusion.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Exclusive, expiring right to run a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLease {
    /// Job name, e.g. `release_pending_funds`.
    pub job: String,

    /// Who holds the lease (instance id).
    pub holder: String,

    /// When the lease was taken.
    pub acquired_at: DateTime<Utc>,

    /// When the lease lapses if not released.
    pub expires_at: DateTime<Utc>,
}

impl JobLease {
    /// Create a lease valid for `ttl` from `now`.
    #[must_use]
    pub fn new(
        job: impl Into<String>,
        holder: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            job: job.into(),
            holder: holder.into(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    /// Whether the lease has lapsed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_expires_after_ttl() {
        let now = Utc::now();
        let lease = JobLease::new("release", "node-a", now, Duration::minutes(30));
        assert!(!lease.is_expired(now));
        assert!(!lease.is_expired(now + Duration::minutes(29)));
        assert!(lease.is_expired(now + Duration::minutes(30)));
    }
}
