//! StayWallet settlement service.
//!
//! Wallet ledger and booking settlement for a short-stay rental platform:
//!
//! - Wallet credits, debits, transfers, refunds and gateway funding
//! - Booking funds held until check-in, then released to the owner
//! - Cancellation refunds, including automatic cancellation of bookings
//!   nobody confirmed in time
//! - An outbox that delivers settlement events to the calendar and
//!   notification services
//!
//! # Consistency
//!
//! Every wallet mutation runs under a per-wallet lock and lands in the store
//! as one atomic commit together with its transaction rows, booking update
//! and outbox events.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod collaborators;
pub mod config;
pub mod error;
pub mod ledger;
pub mod locks;
pub mod outbox;
pub mod scheduler;
pub mod settlement;
pub mod state;

pub use collaborators::Collaborators;
pub use config::ServiceConfig;
pub use error::CollaboratorError;
pub use ledger::{
    PendingBalance, PendingHold, RefundRequest, Transfer, TransactionFilter, TransactionPage,
    WalletAudit, WalletLedger,
};
pub use outbox::{DispatchReport, OutboxDispatcher};
pub use scheduler::{Job, JobCadence, Scheduler};
pub use settlement::{
    AutoCancelJob, BookingFunds, CancellationActor, CancellationOutcome, JobReport, ReleaseJob,
};
pub use state::AppState;
