//! Delayed delivery
//!
//! Confirming an order queues a one-shot delivery task. The task is persisted
//! in redb (`pending_deliveries`) by the same transaction as the `confirmed`
//! transition, then handed to the [`DeliveryWorker`] which sleeps until it is
//! due and calls [`OrdersManager::complete_delivery`]. Tasks that were pending
//! when the process stopped are reloaded on startup, so a callback may run
//! more than once; `complete_delivery` re-checks the current state every time.
//!
//! There is no cancel primitive: cancelling an order during the delay window
//! makes the task a no-op when it fires.

use super::manager::{DeliveryOutcome, OrdersManager};
use super::storage::{OrderStorage, PendingDelivery};
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// First retry delay for a failed delivery; doubles on each further failure
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Failed attempts before a task is left for the next startup
const MAX_DELIVERY_ATTEMPTS: u32 = 5;

/// Hands committed delivery tasks to whatever runs them
pub trait DeliveryScheduler: Send + Sync {
    /// Run `complete_delivery(entry.order_id)` once `entry.due_at` has passed
    ///
    /// `entry` is already durable, so this never fails: a task that cannot be
    /// handed over now is recovered on the next startup.
    fn schedule(&self, entry: PendingDelivery);
}

/// In-process channel feeding a [`DeliveryWorker`]
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<PendingDelivery>,
}

impl DeliveryQueue {
    /// Create the queue and the receiving end for [`DeliveryWorker::run`]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PendingDelivery>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl DeliveryScheduler for DeliveryQueue {
    fn schedule(&self, entry: PendingDelivery) {
        let order_id = entry.order_id;
        tracing::info!(
            order_id,
            delivery_id = entry.delivery_id,
            delay_ms = entry.due_at - entry.enqueued_at,
            "Delivery scheduled"
        );
        if self.tx.send(entry).is_err() {
            tracing::warn!(order_id, "Delivery worker not running, task deferred to restart");
        }
    }
}

/// Background worker executing delivery tasks when they fall due
pub struct DeliveryWorker {
    storage: OrderStorage,
    manager: Arc<OrdersManager>,
    retry_backoff: Duration,
}

impl DeliveryWorker {
    pub fn new(storage: OrderStorage, manager: Arc<OrdersManager>) -> Self {
        Self {
            storage,
            manager,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Override the first retry delay after a failed delivery
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Reload pending tasks, then serve new ones until shutdown
    pub async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<PendingDelivery>,
        shutdown: CancellationToken,
    ) {
        let worker = Arc::new(self);

        match worker.storage.get_pending_deliveries() {
            Ok(entries) if entries.is_empty() => {}
            Ok(entries) => {
                tracing::info!(count = entries.len(), "Recovering pending deliveries");
                for entry in entries {
                    worker.spawn_delivery(entry, shutdown.clone());
                }
            }
            Err(e) => tracing::error!(error = %e, "Failed to load pending deliveries"),
        }

        tracing::info!("DeliveryWorker started");

        loop {
            tokio::select! {
                entry = rx.recv() => {
                    match entry {
                        Some(entry) => worker.spawn_delivery(entry, shutdown.clone()),
                        None => {
                            tracing::info!("Delivery channel closed, shutting down DeliveryWorker");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("DeliveryWorker received shutdown signal");
                    break;
                }
            }
        }
    }

    fn spawn_delivery(self: &Arc<Self>, entry: PendingDelivery, shutdown: CancellationToken) {
        let worker = self.clone();
        tokio::spawn(async move {
            let mut wait = Duration::from_millis((entry.due_at - now_millis()).max(0) as u64);
            let mut backoff = worker.retry_backoff;

            for attempt in 1..=MAX_DELIVERY_ATTEMPTS {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    // Entry stays persisted and is recovered on next startup
                    _ = shutdown.cancelled() => return,
                }
                if worker.deliver(&entry) {
                    return;
                }
                tracing::warn!(
                    order_id = entry.order_id,
                    attempt,
                    retry_in_ms = backoff.as_millis() as u64,
                    "Delivery will be retried"
                );
                wait = backoff;
                backoff *= 2;
            }

            tracing::error!(
                order_id = entry.order_id,
                delivery_id = entry.delivery_id,
                "Delivery still failing after {} attempts, left for next startup",
                MAX_DELIVERY_ATTEMPTS
            );
        });
    }

    /// Run the callback once; false if it failed and should be retried
    fn deliver(&self, entry: &PendingDelivery) -> bool {
        match self.manager.complete_delivery(entry.order_id) {
            Ok(DeliveryOutcome::Delivered(_)) | Ok(DeliveryOutcome::Skipped { .. }) => {
                if let Err(e) = self.storage.remove_pending_delivery(entry.delivery_id) {
                    tracing::error!(
                        delivery_id = entry.delivery_id,
                        error = %e,
                        "Failed to remove completed delivery task"
                    );
                }
                true
            }
            Err(e) => {
                tracing::error!(order_id = entry.order_id, error = %e, "Delivery failed");
                false
            }
        }
    }
}
