//! Application state.

use std::sync::Arc;

use staywallet_store::Store;

use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::ledger::WalletLedger;
use crate::outbox::OutboxDispatcher;
use crate::scheduler::{JobCadence, Scheduler};
use crate::settlement::{AutoCancelJob, BookingFunds, ReleaseJob};

/// Everything the service wires together at startup.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// External collaborators.
    pub collaborators: Collaborators,

    /// Wallet ledger.
    pub ledger: Arc<WalletLedger>,

    /// Booking fund movements.
    pub funds: Arc<BookingFunds>,

    /// Job runner.
    pub scheduler: Arc<Scheduler>,
}

impl AppState {
    /// Build the ledger, settlement jobs and scheduler over a store.
    #[must_use]
    pub fn new(store: Arc<dyn Store>, config: ServiceConfig, collaborators: Collaborators) -> Self {
        let ledger = Arc::new(WalletLedger::new(Arc::clone(&store)));
        let funds = Arc::new(BookingFunds::new(Arc::clone(&ledger)));

        let release = Arc::new(ReleaseJob::new(Arc::clone(&ledger)));
        let auto_cancel = Arc::new(AutoCancelJob::new(
            Arc::clone(&funds),
            Arc::clone(&collaborators.config),
            config.booking_auto_cancel_hours,
        ));
        let outbox = Arc::new(
            OutboxDispatcher::new(
                Arc::clone(&store),
                Arc::clone(&collaborators.notifier),
                Arc::clone(&collaborators.availability),
            )
            .with_limits(config.outbox_max_attempts, config.outbox_batch_size),
        );

        let scheduler = Arc::new(
            Scheduler::new(
                Arc::clone(&store),
                release,
                auto_cancel,
                outbox,
                config.instance_id.clone(),
            )
            .with_cadence(JobCadence {
                release: config.release_interval(),
                auto_cancel: config.auto_cancel_interval(),
                outbox: config.outbox_interval(),
            })
            .with_lease_ttl(config.lease_ttl()),
        );

        tracing::info!(
            instance_id = %config.instance_id,
            payment_gateway = collaborators.payment_gateway.is_some(),
            "Application state ready"
        );

        Self {
            store,
            config,
            collaborators,
            ledger,
            funds,
            scheduler,
        }
    }

    /// Check if a payment gateway is configured.
    #[must_use]
    pub fn has_payment_gateway(&self) -> bool {
        self.collaborators.payment_gateway.is_some()
    }
}
