//! redb-based storage layer for orders and their transition log
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `OrderRow` | Order identity/metadata |
//! | `order_codes` | `code` | `order_id` | Unique code index |
//! | `transitions` | `(order_id, sequence)` | `Transition` | Transition log (append-only) |
//! | `sequence_counter` | `&str` | `u64` | Id generators |
//! | `pending_deliveries` | `delivery_id` | `PendingDelivery` | Scheduled delivery tasks |
//!
//! A `confirmed` transition and its delivery task are written by the same
//! transaction ([`OrderStore::append_with_delivery`]): there is no committed
//! confirm without a queued delivery.
//!
//! # Concurrency
//!
//! redb allows a single write transaction at a time. Every check that guards
//! a write (code uniqueness, expected last sequence) runs inside the same
//! write transaction as the write itself, so two writers can never both pass
//! the check.

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use serde::{Deserialize, Serialize};
use shared::order::{Order, OrderState, Transition};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Order rows: key = order_id, value = JSON-serialized OrderRow
const ORDERS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("orders");

/// Code index: key = order code, value = order_id
const ORDER_CODES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("order_codes");

/// Transition log: key = (order_id, sequence), value = JSON-serialized Transition
const TRANSITIONS_TABLE: TableDefinition<(i64, u64), &[u8]> = TableDefinition::new("transitions");

/// Id generators: key = counter name, value = last issued id
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

/// Delivery queue: key = delivery_id, value = JSON-serialized PendingDelivery
const PENDING_DELIVERY_TABLE: TableDefinition<u64, &[u8]> =
    TableDefinition::new("pending_deliveries");

const ORDER_ID_KEY: &str = "order_id";
const TRANSITION_ID_KEY: &str = "transition_id";
const DELIVERY_ID_KEY: &str = "delivery_id";

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(i64),

    #[error("Order code already exists: {0}")]
    DuplicateCode(String),

    #[error(
        "Concurrent write on order {order_id} (expected sequence {expected}, found {actual})"
    )]
    ConcurrentWrite {
        order_id: i64,
        expected: u64,
        actual: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order store capability set consumed by the orchestrator
///
/// `append` is optimistic: the caller passes the sequence of the transition
/// its decision was based on, and the append is rejected with
/// [`StorageError::ConcurrentWrite`] if anything was committed since.
pub trait OrderStore: Send + Sync {
    /// Load an order with its full transition history
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Order>>;

    /// Load an order by its unique code
    fn find_by_code(&self, code: &str) -> StorageResult<Option<Order>>;

    /// Persist a new order together with its `created` transition
    fn create_order(&self, code: &str, user_id: i64) -> StorageResult<Order>;

    /// Most recent transition without loading the whole history
    fn latest_transition(&self, order_id: i64) -> StorageResult<Option<Transition>>;

    /// Append a transition if the order's last sequence is still `expected_sequence`
    fn append(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
    ) -> StorageResult<Transition>;

    /// Like [`append`](Self::append), and queue a delivery due after `delay`
    /// in the same write transaction
    fn append_with_delivery(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
        delay: Duration,
    ) -> StorageResult<(Transition, PendingDelivery)>;

    /// Remove an order that never got past `created`
    ///
    /// Fails with [`StorageError::ConcurrentWrite`] if anything was appended
    /// after the `created` transition.
    fn discard_created(&self, order_id: i64) -> StorageResult<()>;
}

/// Order metadata as stored (history lives in the transitions table)
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OrderRow {
    id: i64,
    code: String,
    user_id: i64,
    created_at: i64,
    updated_at: i64,
}

impl OrderRow {
    fn into_order(self, transitions: Vec<Transition>) -> Order {
        Order {
            id: self.id,
            code: self.code,
            user_id: self.user_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
            transitions,
        }
    }
}

/// Scheduled delivery that has not completed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDelivery {
    pub delivery_id: u64,
    pub order_id: i64,
    /// Unix millis after which the delivery may run
    pub due_at: i64,
    pub enqueued_at: i64,
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: once `commit()`
    /// returns, the transition is on disk.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_CODES_TABLE)?;
            let _ = write_txn.open_table(TRANSITIONS_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
            let _ = write_txn.open_table(PENDING_DELIVERY_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    // ========== Id Generation ==========

    /// Increment the named counter and return the new value (within transaction)
    fn next_id(txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(key, next)?;
        Ok(next)
    }

    // ========== Transition Log Helpers ==========

    fn read_order_row(
        table: &impl ReadableTable<i64, &'static [u8]>,
        id: i64,
    ) -> StorageResult<Option<OrderRow>> {
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    fn read_transitions(
        table: &impl ReadableTable<(i64, u64), &'static [u8]>,
        order_id: i64,
    ) -> StorageResult<Vec<Transition>> {
        let mut transitions = Vec::new();
        for result in table.range((order_id, 0u64)..=(order_id, u64::MAX))? {
            let (_key, value) = result?;
            transitions.push(serde_json::from_slice::<Transition>(value.value())?);
        }
        Ok(transitions)
    }

    fn read_latest(
        table: &impl ReadableTable<(i64, u64), &'static [u8]>,
        order_id: i64,
    ) -> StorageResult<Option<Transition>> {
        let mut range = table.range((order_id, 0u64)..=(order_id, u64::MAX))?;
        match range.next_back() {
            Some(result) => {
                let (_key, value) = result?;
                Ok(Some(serde_json::from_slice(value.value())?))
            }
            None => Ok(None),
        }
    }

    /// Optimistic append inside an open write transaction
    fn append_in(
        txn: &WriteTransaction,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
    ) -> StorageResult<Transition> {
        let mut orders = txn.open_table(ORDERS_TABLE)?;
        let mut row =
            Self::read_order_row(&orders, order_id)?.ok_or(StorageError::OrderNotFound(order_id))?;

        let mut transitions = txn.open_table(TRANSITIONS_TABLE)?;
        let actual = Self::read_latest(&transitions, order_id)?
            .map(|t| t.sequence)
            .unwrap_or(0);
        if actual != expected_sequence {
            return Err(StorageError::ConcurrentWrite {
                order_id,
                expected: expected_sequence,
                actual,
            });
        }

        let now = now_millis();
        let transition = Transition {
            id: Self::next_id(txn, TRANSITION_ID_KEY)? as i64,
            order_id,
            sequence: actual + 1,
            state,
            created_at: now,
        };
        transitions.insert(
            (order_id, transition.sequence),
            serde_json::to_vec(&transition)?.as_slice(),
        )?;

        row.updated_at = now;
        orders.insert(order_id, serde_json::to_vec(&row)?.as_slice())?;

        Ok(transition)
    }

    fn load_order(&self, id: i64) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let Some(row) = Self::read_order_row(&orders, id)? else {
            return Ok(None);
        };
        let transitions = read_txn.open_table(TRANSITIONS_TABLE)?;
        let history = Self::read_transitions(&transitions, id)?;
        Ok(Some(row.into_order(history)))
    }

    // ========== Delivery Queue ==========

    /// All deliveries that have not been completed, ordered by id
    pub fn get_pending_deliveries(&self) -> StorageResult<Vec<PendingDelivery>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_DELIVERY_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice::<PendingDelivery>(value.value())?);
        }
        Ok(entries)
    }

    /// Remove a delivery task once it has run (whatever the outcome)
    pub fn remove_pending_delivery(&self, delivery_id: u64) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(PENDING_DELIVERY_TABLE)?;
            table.remove(delivery_id)?;
        }
        txn.commit()?;
        Ok(())
    }
}

impl OrderStore for OrderStorage {
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Order>> {
        self.load_order(id)
    }

    fn find_by_code(&self, code: &str) -> StorageResult<Option<Order>> {
        let id = {
            let read_txn = self.db.begin_read()?;
            let codes = read_txn.open_table(ORDER_CODES_TABLE)?;
            let id = codes.get(code)?.map(|guard| guard.value());
            id
        };
        match id {
            Some(id) => self.load_order(id),
            None => Ok(None),
        }
    }

    fn create_order(&self, code: &str, user_id: i64) -> StorageResult<Order> {
        let txn = self.db.begin_write()?;
        let order = {
            let mut codes = txn.open_table(ORDER_CODES_TABLE)?;
            if codes.get(code)?.is_some() {
                return Err(StorageError::DuplicateCode(code.to_string()));
            }

            let order_id = Self::next_id(&txn, ORDER_ID_KEY)? as i64;
            let transition_id = Self::next_id(&txn, TRANSITION_ID_KEY)? as i64;
            let now = now_millis();

            let row = OrderRow {
                id: order_id,
                code: code.to_string(),
                user_id,
                created_at: now,
                updated_at: now,
            };
            let created = Transition {
                id: transition_id,
                order_id,
                sequence: 1,
                state: OrderState::Created,
                created_at: now,
            };

            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(order_id, serde_json::to_vec(&row)?.as_slice())?;
            codes.insert(code, order_id)?;

            let mut transitions = txn.open_table(TRANSITIONS_TABLE)?;
            transitions.insert((order_id, 1u64), serde_json::to_vec(&created)?.as_slice())?;

            row.into_order(vec![created])
        };
        txn.commit()?;
        Ok(order)
    }

    fn latest_transition(&self, order_id: i64) -> StorageResult<Option<Transition>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(TRANSITIONS_TABLE)?;
        Self::read_latest(&table, order_id)
    }

    fn append(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
    ) -> StorageResult<Transition> {
        let txn = self.db.begin_write()?;
        let transition = Self::append_in(&txn, order_id, expected_sequence, state)?;
        txn.commit()?;
        Ok(transition)
    }

    fn append_with_delivery(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
        delay: Duration,
    ) -> StorageResult<(Transition, PendingDelivery)> {
        let txn = self.db.begin_write()?;
        let transition = Self::append_in(&txn, order_id, expected_sequence, state)?;
        let entry = {
            let delivery_id = Self::next_id(&txn, DELIVERY_ID_KEY)?;
            let entry = PendingDelivery {
                delivery_id,
                order_id,
                due_at: transition.created_at + delay.as_millis() as i64,
                enqueued_at: transition.created_at,
            };
            let mut table = txn.open_table(PENDING_DELIVERY_TABLE)?;
            table.insert(delivery_id, serde_json::to_vec(&entry)?.as_slice())?;
            entry
        };
        txn.commit()?;
        Ok((transition, entry))
    }

    fn discard_created(&self, order_id: i64) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let row =
                Self::read_order_row(&orders, order_id)?.ok_or(StorageError::OrderNotFound(order_id))?;

            let mut transitions = txn.open_table(TRANSITIONS_TABLE)?;
            let actual = Self::read_latest(&transitions, order_id)?
                .map(|t| t.sequence)
                .unwrap_or(0);
            if actual != 1 {
                return Err(StorageError::ConcurrentWrite {
                    order_id,
                    expected: 1,
                    actual,
                });
            }

            let mut codes = txn.open_table(ORDER_CODES_TABLE)?;
            transitions.remove((order_id, 1u64))?;
            codes.remove(row.code.as_str())?;
            orders.remove(order_id)?;
        }
        txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage() -> OrderStorage {
        OrderStorage::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_order_writes_created_transition() {
        let storage = storage();
        let order = storage.create_order("ABC123", 1).unwrap();

        assert_eq!(order.id, 1);
        assert_eq!(order.code, "ABC123");
        assert_eq!(order.transitions.len(), 1);
        assert_eq!(order.transitions[0].state, OrderState::Created);
        assert_eq!(order.transitions[0].sequence, 1);

        let loaded = storage.find_by_id(order.id).unwrap().unwrap();
        assert_eq!(loaded, order);
    }

    #[test]
    fn test_duplicate_code_is_rejected() {
        let storage = storage();
        storage.create_order("DUP", 1).unwrap();

        let err = storage.create_order("DUP", 2).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateCode(code) if code == "DUP"));

        // The failed create must not burn an order row
        let other = storage.create_order("OTHER", 2).unwrap();
        assert_eq!(other.id, 2);
        assert!(storage.find_by_id(3).unwrap().is_none());
    }

    #[test]
    fn test_find_by_code() {
        let storage = storage();
        let order = storage.create_order("XYZ", 9).unwrap();

        let by_code = storage.find_by_code("XYZ").unwrap().unwrap();
        assert_eq!(by_code, order);
        assert!(storage.find_by_code("missing").unwrap().is_none());
    }

    #[test]
    fn test_append_orders_transitions() {
        let storage = storage();
        let order = storage.create_order("SEQ", 1).unwrap();

        let confirmed = storage.append(order.id, 1, OrderState::Confirmed).unwrap();
        let delivered = storage.append(order.id, 2, OrderState::Delivered).unwrap();
        assert_eq!(confirmed.sequence, 2);
        assert_eq!(delivered.sequence, 3);
        assert!(delivered.id > confirmed.id);
        assert!(delivered.created_at >= confirmed.created_at);

        let loaded = storage.find_by_id(order.id).unwrap().unwrap();
        let states: Vec<_> = loaded.transitions.iter().map(|t| t.state).collect();
        assert_eq!(
            states,
            vec![OrderState::Created, OrderState::Confirmed, OrderState::Delivered]
        );
        assert_eq!(loaded.current_state(), Some(OrderState::Delivered));
        assert!(loaded.updated_at >= loaded.created_at);
    }

    #[test]
    fn test_append_with_stale_sequence_fails() {
        let storage = storage();
        let order = storage.create_order("STALE", 1).unwrap();
        storage.append(order.id, 1, OrderState::Confirmed).unwrap();

        let err = storage.append(order.id, 1, OrderState::Cancelled).unwrap_err();
        assert!(matches!(
            err,
            StorageError::ConcurrentWrite {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        let latest = storage.latest_transition(order.id).unwrap().unwrap();
        assert_eq!(latest.state, OrderState::Confirmed);
    }

    #[test]
    fn test_append_to_missing_order() {
        let storage = storage();
        let err = storage.append(42, 1, OrderState::Confirmed).unwrap_err();
        assert!(matches!(err, StorageError::OrderNotFound(42)));
    }

    #[test]
    fn test_latest_transition_is_per_order() {
        let storage = storage();
        let a = storage.create_order("A", 1).unwrap();
        let b = storage.create_order("B", 1).unwrap();
        storage.append(a.id, 1, OrderState::Cancelled).unwrap();

        assert_eq!(
            storage.latest_transition(a.id).unwrap().unwrap().state,
            OrderState::Cancelled
        );
        assert_eq!(
            storage.latest_transition(b.id).unwrap().unwrap().state,
            OrderState::Created
        );
        assert!(storage.latest_transition(99).unwrap().is_none());
    }

    #[test]
    fn test_confirm_queues_delivery_atomically() {
        let storage = storage();
        let order = storage.create_order("Q", 1).unwrap();

        let (first_t, first) = storage
            .append_with_delivery(order.id, 1, OrderState::Confirmed, Duration::from_secs(5))
            .unwrap();
        assert_eq!(first_t.sequence, 2);
        assert_eq!(first.order_id, order.id);
        assert_eq!(first.due_at - first.enqueued_at, 5_000);

        let (_, second) = storage
            .append_with_delivery(order.id, 2, OrderState::Confirmed, Duration::ZERO)
            .unwrap();
        assert_ne!(first.delivery_id, second.delivery_id);
        assert_eq!(
            storage.get_pending_deliveries().unwrap(),
            vec![first.clone(), second.clone()]
        );

        storage.remove_pending_delivery(first.delivery_id).unwrap();
        assert_eq!(storage.get_pending_deliveries().unwrap(), vec![second]);
    }

    #[test]
    fn test_rejected_confirm_queues_nothing() {
        let storage = storage();
        let order = storage.create_order("Q-STALE", 1).unwrap();
        storage.append(order.id, 1, OrderState::Cancelled).unwrap();

        let err = storage
            .append_with_delivery(order.id, 1, OrderState::Confirmed, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentWrite { actual: 2, .. }));
        assert!(storage.get_pending_deliveries().unwrap().is_empty());

        let err = storage
            .append_with_delivery(77, 1, OrderState::Confirmed, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, StorageError::OrderNotFound(77)));
        assert!(storage.get_pending_deliveries().unwrap().is_empty());
    }

    #[test]
    fn test_discard_created_frees_code() {
        let storage = storage();
        let order = storage.create_order("GONE", 1).unwrap();

        storage.discard_created(order.id).unwrap();
        assert!(storage.find_by_id(order.id).unwrap().is_none());
        assert!(storage.find_by_code("GONE").unwrap().is_none());
        assert!(storage.latest_transition(order.id).unwrap().is_none());

        let again = storage.create_order("GONE", 1).unwrap();
        assert_ne!(again.id, order.id);
    }

    #[test]
    fn test_discard_keeps_progressed_order() {
        let storage = storage();
        let order = storage.create_order("KEEP", 1).unwrap();
        storage.append(order.id, 1, OrderState::Confirmed).unwrap();

        let err = storage.discard_created(order.id).unwrap_err();
        assert!(matches!(err, StorageError::ConcurrentWrite { expected: 1, actual: 2, .. }));
        assert_eq!(storage.find_by_code("KEEP").unwrap().unwrap().transitions.len(), 2);

        assert!(matches!(
            storage.discard_created(404),
            Err(StorageError::OrderNotFound(404))
        ));
    }

    #[test]
    fn test_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.redb");
        let id = {
            let storage = OrderStorage::open(&path).unwrap();
            let order = storage.create_order("DISK", 3).unwrap();
            storage.append(order.id, 1, OrderState::Confirmed).unwrap();
            order.id
        };

        let storage = OrderStorage::open(&path).unwrap();
        let order = storage.find_by_id(id).unwrap().unwrap();
        assert_eq!(order.transitions.len(), 2);
        assert_eq!(order.current_state(), Some(OrderState::Confirmed));
        // Counters survive the restart
        let next = storage.create_order("DISK-2", 3).unwrap();
        assert_eq!(next.id, id + 1);
    }
}
