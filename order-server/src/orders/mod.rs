//! Order lifecycle module
//!
//! - **storage**: redb-based order store, transition log and delivery queue
//! - **manager**: OrdersManager, the state machine and its orchestration
//! - **delivery**: delayed delivery scheduling and the worker that runs it
//!
//! # Architecture
//!
//! ```text
//! HTTP → OrdersManager ──▶ OrderStore (redb)
//!            │    │
//!            │    └──▶ PaymentInitiator / IdentityVerifier
//!            ▼
//!      DeliveryQueue ──▶ pending_deliveries ──▶ DeliveryWorker
//!                                                   │
//!            OrdersManager::complete_delivery ◀─────┘
//! ```

pub mod delivery;
pub mod manager;
pub mod storage;

// Re-exports
pub use delivery::{DeliveryQueue, DeliveryScheduler, DeliveryWorker};
pub use manager::{DeliveryOutcome, ManagerError, ManagerResult, OrdersManager};
pub use storage::{OrderStorage, OrderStore, PendingDelivery, StorageError, StorageResult};
