//! Persisted order records
//!
//! An [`Order`] owns an append-only list of [`Transition`]s. The current
//! state of an order is always the state of its last transition.

use super::types::OrderState;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// Order with its full transition history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Order {
    /// System-assigned identifier
    pub id: i64,
    /// Caller-assigned code, unique across all orders
    pub code: String,
    /// Owning user (resolved from the identity service)
    pub user_id: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Transition history ordered by `sequence`
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl Order {
    /// Most recent transition, `None` only for an order that was never persisted
    pub fn latest_transition(&self) -> Option<&Transition> {
        self.transitions.last()
    }

    /// Current state (state of the most recent transition)
    pub fn current_state(&self) -> Option<OrderState> {
        self.latest_transition().map(|t| t.state)
    }
}

/// Immutable state change record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transition {
    /// Globally unique, monotonically increasing id
    pub id: i64,
    pub order_id: i64,
    /// Position inside the order's history (1-based)
    pub sequence: u64,
    pub state: OrderState,
    pub created_at: Timestamp,
}

/// Latest transition plus its display label
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateView {
    pub id: i64,
    pub order_id: i64,
    pub sequence: u64,
    pub state: OrderState,
    pub created_at: Timestamp,
    pub state_text: String,
}

impl From<Transition> for StateView {
    fn from(t: Transition) -> Self {
        Self {
            id: t.id,
            order_id: t.order_id,
            sequence: t.sequence,
            state: t.state,
            created_at: t.created_at,
            state_text: t.state.label().to_string(),
        }
    }
}
