//! Batch job summaries.

use staywallet_core::BookingId;

/// A booking a job could not process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// The booking.
    pub booking_id: BookingId,
    /// What went wrong.
    pub error: String,
}

/// Summary of one job run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    /// Job name.
    pub job: &'static str,
    /// Bookings selected.
    pub scanned: usize,
    /// Bookings fully processed.
    pub succeeded: usize,
    /// Bookings that failed outright.
    pub failed: usize,
    /// Bookings processed with a ledger step missing.
    pub reconciliation_required: usize,
    /// Per-booking errors.
    pub failures: Vec<JobFailure>,
}

impl JobReport {
    /// Start a report for `scanned` bookings.
    #[must_use]
    pub fn new(job: &'static str, scanned: usize) -> Self {
        Self {
            job,
            scanned,
            succeeded: 0,
            failed: 0,
            reconciliation_required: 0,
            failures: Vec::new(),
        }
    }

    /// Count a fully processed booking.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Count a booking that failed.
    pub fn record_failure(&mut self, booking_id: BookingId, error: impl ToString) {
        let error = error.to_string();
        tracing::warn!(job = self.job, booking_id = %booking_id, error = %error, "Booking failed");
        self.failed += 1;
        self.failures.push(JobFailure { booking_id, error });
    }

    /// Count a booking that was processed but needs manual reconciliation.
    pub fn record_reconciliation(&mut self, booking_id: BookingId, detail: impl ToString) {
        self.reconciliation_required += 1;
        self.failures.push(JobFailure {
            booking_id,
            error: detail.to_string(),
        });
    }

    /// Whether every booking went through cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub(crate) fn log(&self) {
        if self.is_clean() {
            tracing::info!(
                job = self.job,
                scanned = self.scanned,
                succeeded = self.succeeded,
                "Job run finished"
            );
        } else {
            tracing::warn!(
                job = self.job,
                scanned = self.scanned,
                succeeded = self.succeeded,
                failed = self.failed,
                reconciliation_required = self.reconciliation_required,
                "Job run finished with failures"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes() {
        let mut report = JobReport::new("release", 3);
        report.record_success();
        report.record_failure(BookingId::generate(), "boom");
        report.record_reconciliation(BookingId::generate(), "refund failed");

        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.reconciliation_required, 1);
        assert_eq!(report.failures.len(), 2);
        assert!(!report.is_clean());
    }
}
