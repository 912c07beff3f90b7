//! OrdersManager - order lifecycle orchestration
//!
//! # Creation Flow
//!
//! ```text
//! create_order(req)
//!     ├─ 1. Resolve user token (IdentityVerifier) → InvalidToken if absent
//!     ├─ 2. Duplicate check by code
//!     ├─ 3. Persist order + `created` transition (one write transaction)
//!     ├─ 4. Initiate payment
//!     │      ├─ Pending  → return order (settled later via confirm/cancel)
//!     │      ├─ Paid/Declined → update_state(confirmed/cancelled)
//!     │      └─ Error → discard the order, report Payment
//!     └─ 5. Return order with its history
//! ```
//!
//! # Transitions
//!
//! ```text
//! created ──▶ confirmed ──▶ delivered (terminal)
//!    │            │
//!    └────────────┴──────▶ cancelled (terminal)
//! ```
//!
//! Every append is optimistic: the decision is taken against the latest
//! transition, and the store rejects the append if another writer committed
//! in between. The manager then re-reads and decides again.

mod error;
pub use error::*;

use super::delivery::DeliveryScheduler;
use super::storage::{OrderStore, StorageError};
use crate::clients::{ClientError, IdentityVerifier, PaymentInitiator, PaymentOutcome, PaymentRequest};
use shared::order::{CreateOrderRequest, Order, OrderState, PaymentType, StateView, Transition};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Transition broadcast channel capacity
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Attempts at an optimistic append before giving up
const MAX_APPEND_ATTEMPTS: usize = 3;

/// Result of a delivery callback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// `delivered` was appended
    Delivered(Transition),
    /// Order was not `confirmed` (or no longer exists); nothing appended
    Skipped { current: Option<OrderState> },
}

/// Order orchestrator
pub struct OrdersManager {
    store: Arc<dyn OrderStore>,
    identity: Arc<dyn IdentityVerifier>,
    payment: Arc<dyn PaymentInitiator>,
    scheduler: Arc<dyn DeliveryScheduler>,
    delivery_delay: Duration,
    event_tx: broadcast::Sender<Transition>,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("store", &"<OrderStore>")
            .field("event_tx", &"<broadcast::Sender>")
            .field("delivery_delay", &self.delivery_delay)
            .finish()
    }
}

impl OrdersManager {
    pub fn new(
        store: Arc<dyn OrderStore>,
        identity: Arc<dyn IdentityVerifier>,
        payment: Arc<dyn PaymentInitiator>,
        scheduler: Arc<dyn DeliveryScheduler>,
        delivery_delay: Duration,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            identity,
            payment,
            scheduler,
            delivery_delay,
            event_tx,
        }
    }

    /// Subscribe to committed transitions
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.event_tx.subscribe()
    }

    pub fn delivery_delay(&self) -> Duration {
        self.delivery_delay
    }

    // ========== Creation ==========

    /// Verify the caller's token, then create the order on their behalf
    pub async fn create_order(&self, req: CreateOrderRequest) -> ManagerResult<Order> {
        let identity = self
            .identity
            .verify(&req.user_token)
            .await
            .map_err(ManagerError::Identity)?
            .ok_or(ManagerError::InvalidToken)?;

        self.create(&req.code, identity.id, req.payment_type, &req.user_token)
            .await
    }

    /// Create an order for an already-resolved user and start payment
    pub async fn create(
        &self,
        code: &str,
        user_id: i64,
        payment_type: PaymentType,
        user_token: &str,
    ) -> ManagerResult<Order> {
        if self.store.find_by_code(code)?.is_some() {
            return Err(ManagerError::DuplicateCode(code.to_string()));
        }

        // Uniqueness is re-checked inside the write transaction
        let order = self.store.create_order(code, user_id)?;
        tracing::info!(order_id = order.id, code = %order.code, user_id, "Order created");

        let request = PaymentRequest {
            order_id: order.id,
            user_token: user_token.to_string(),
            payment_type,
        };
        let outcome = match self.payment.initiate(&request).await {
            Ok(outcome) => outcome,
            Err(ClientError::QueueClosed) => {
                // Fire-and-forget: never fails the creation
                tracing::error!(order_id = order.id, "Payment queue closed, initiation dropped");
                PaymentOutcome::Pending
            }
            Err(e) => {
                tracing::warn!(order_id = order.id, error = %e, "Payment failed, discarding order");
                if let Err(discard) = self.store.discard_created(order.id) {
                    tracing::error!(order_id = order.id, error = %discard, "Failed to discard unpaid order");
                }
                return Err(ManagerError::Payment(e));
            }
        };

        if let Some(created) = order.latest_transition() {
            self.broadcast(created);
        }
        let settled = match outcome {
            PaymentOutcome::Pending => return Ok(order),
            PaymentOutcome::Paid => OrderState::Confirmed,
            PaymentOutcome::Declined => OrderState::Cancelled,
        };
        self.update_state(order.id, settled)?;

        self.store
            .find_by_id(order.id)?
            .ok_or_else(|| ManagerError::NotFound(order.id.to_string()))
    }

    // ========== Transitions ==========

    /// Append `state` unless the order is in a terminal state
    ///
    /// Confirming queues the delayed delivery in the same write as the
    /// transition. The method does not restrict `state` itself; the HTTP
    /// surface only exposes confirm and cancel.
    pub fn update_state(&self, order_id: i64, state: OrderState) -> ManagerResult<Transition> {
        let (transition, delivery) = self.retry_on_conflict(order_id, || {
            let latest = self
                .store
                .latest_transition(order_id)?
                .ok_or_else(|| ManagerError::NotFound(order_id.to_string()))?;
            match latest.state {
                OrderState::Delivered => return Err(ManagerError::NotAllowedDelivered(order_id)),
                OrderState::Cancelled => return Err(ManagerError::NotAllowedCancelled(order_id)),
                _ => {}
            }

            if state == OrderState::Confirmed {
                let (transition, entry) = self.store.append_with_delivery(
                    order_id,
                    latest.sequence,
                    state,
                    self.delivery_delay,
                )?;
                Ok((transition, Some(entry)))
            } else {
                Ok((self.store.append(order_id, latest.sequence, state)?, None))
            }
        })?;

        tracing::info!(order_id, state = %state, sequence = transition.sequence, "Order state updated");
        self.broadcast(&transition);
        if let Some(entry) = delivery {
            self.scheduler.schedule(entry);
        }
        Ok(transition)
    }

    /// Delivery callback: append `delivered` only if the order is still `confirmed`
    ///
    /// Safe to invoke more than once for the same order.
    pub fn complete_delivery(&self, order_id: i64) -> ManagerResult<DeliveryOutcome> {
        let outcome = self.retry_on_conflict(order_id, || {
            match self.store.latest_transition(order_id)? {
                Some(latest) if latest.state == OrderState::Confirmed => {
                    let transition =
                        self.store
                            .append(order_id, latest.sequence, OrderState::Delivered)?;
                    Ok(DeliveryOutcome::Delivered(transition))
                }
                other => Ok(DeliveryOutcome::Skipped {
                    current: other.map(|t| t.state),
                }),
            }
        })?;

        match &outcome {
            DeliveryOutcome::Delivered(transition) => {
                tracing::info!(order_id, sequence = transition.sequence, "Order delivered");
                self.broadcast(transition);
            }
            DeliveryOutcome::Skipped { current: None } => {
                tracing::warn!(order_id, "Delivery fired for unknown order");
            }
            DeliveryOutcome::Skipped {
                current: Some(current),
            } => {
                tracing::warn!(order_id, state = %current, "Delivery skipped, order not confirmed");
            }
        }
        Ok(outcome)
    }

    /// Re-run `attempt` while its append loses to a concurrent writer
    ///
    /// Each attempt reads the latest transition and decides again.
    fn retry_on_conflict<T, F>(&self, order_id: i64, attempt: F) -> ManagerResult<T>
    where
        F: Fn() -> ManagerResult<T>,
    {
        for n in 1..=MAX_APPEND_ATTEMPTS {
            match attempt() {
                Err(ManagerError::Storage(StorageError::ConcurrentWrite {
                    expected, actual, ..
                })) => {
                    tracing::debug!(order_id, attempt = n, expected, actual, "Concurrent append, re-checking");
                }
                result => return result,
            }
        }

        tracing::warn!(order_id, "Giving up after {} append attempts", MAX_APPEND_ATTEMPTS);
        Err(ManagerError::ConcurrentModification(order_id))
    }

    fn broadcast(&self, transition: &Transition) {
        if self.event_tx.send(transition.clone()).is_err() {
            tracing::trace!("Transition broadcast skipped: no active receivers");
        }
    }

    // ========== Queries ==========

    /// Look up by id or by code; an existing id wins
    pub fn get(&self, id_or_code: &str) -> ManagerResult<Order> {
        if let Ok(id) = id_or_code.parse::<i64>()
            && let Some(order) = self.store.find_by_id(id)?
        {
            return Ok(order);
        }
        self.store
            .find_by_code(id_or_code)?
            .ok_or_else(|| ManagerError::NotFound(id_or_code.to_string()))
    }

    /// Latest transition with its display label
    pub fn check_state(&self, order_id: i64) -> ManagerResult<StateView> {
        self.store
            .latest_transition(order_id)?
            .map(StateView::from)
            .ok_or_else(|| ManagerError::NotFound(order_id.to_string()))
    }
}

#[cfg(test)]
mod tests;
