//! Booking settlement: holding, releasing and refunding booking funds.
//!
//! - [`BookingFunds`] drives the per-booking fund state machine.
//! - [`ReleaseJob`] pays out holds whose check-in date has arrived.
//! - [`AutoCancelJob`] cancels and refunds bookings nobody confirmed in time.

pub mod auto_cancel;
pub mod funds;
pub mod release;
pub mod report;

pub use auto_cancel::{AutoCancelJob, AUTO_CANCEL_HOURS_KEY, AUTO_CANCEL_JOB};
pub use funds::{BookingFunds, CancellationActor, CancellationOutcome};
pub use release::{ReleaseJob, RELEASE_JOB};
pub use report::{JobFailure, JobReport};
