use super::*;
use crate::clients::{ClientResult, UserIdentity};
use crate::orders::storage::{OrderStorage, PendingDelivery, StorageResult};
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

const VALID_TOKEN: &str = "valid-token";
const VALID_USER_ID: i64 = 1;
const DELAY: Duration = Duration::from_secs(5);

// ========================================================================
// Fake collaborators
// ========================================================================

/// Resolves exactly one token; "identity-down" simulates an outage
struct StaticIdentity;

#[async_trait]
impl IdentityVerifier for StaticIdentity {
    async fn verify(&self, token: &str) -> ClientResult<Option<UserIdentity>> {
        match token {
            VALID_TOKEN => Ok(Some(UserIdentity {
                id: VALID_USER_ID,
                display_name: "Test User".to_string(),
                username: "test".to_string(),
                created_at: None,
                updated_at: None,
            })),
            "identity-down" => Err(ClientError::UnexpectedStatus {
                service: "identity",
                status: 500,
                body: String::new(),
            }),
            _ => Ok(None),
        }
    }
}

/// Records every initiation; fails the first `failures` calls, then answers
/// with a fixed outcome
struct RecordingPayment {
    outcome: PaymentOutcome,
    failures: AtomicUsize,
    requests: Mutex<Vec<PaymentRequest>>,
}

impl RecordingPayment {
    fn answering(outcome: PaymentOutcome) -> Self {
        Self::failing_then(0, outcome)
    }

    /// Request/response shape whose service is down
    fn failing() -> Self {
        Self::failing_then(usize::MAX, PaymentOutcome::Paid)
    }

    /// Service that is down for `failures` calls, then recovers
    fn failing_then(failures: usize, outcome: PaymentOutcome) -> Self {
        Self {
            outcome,
            failures: AtomicUsize::new(failures),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<PaymentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentInitiator for RecordingPayment {
    async fn initiate(&self, request: &PaymentRequest) -> ClientResult<PaymentOutcome> {
        self.requests.lock().unwrap().push(request.clone());
        let down = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if down {
            return Err(ClientError::UnexpectedStatus {
                service: "payment",
                status: 503,
                body: "down".to_string(),
            });
        }
        Ok(self.outcome)
    }
}

/// Records each handed-over delivery as (order_id, delay)
#[derive(Default)]
struct RecordingScheduler {
    scheduled: Mutex<Vec<(i64, Duration)>>,
}

impl RecordingScheduler {
    fn scheduled(&self) -> Vec<(i64, Duration)> {
        self.scheduled.lock().unwrap().clone()
    }
}

impl DeliveryScheduler for RecordingScheduler {
    fn schedule(&self, entry: PendingDelivery) {
        let delay = Duration::from_millis((entry.due_at - entry.enqueued_at) as u64);
        self.scheduled.lock().unwrap().push((entry.order_id, delay));
    }
}

/// Store that lets a competing writer commit right before each of the
/// first `interleave` appends
struct InterleavingStore {
    inner: OrderStorage,
    competing: OrderState,
    interleave: usize,
    appends: AtomicUsize,
}

impl InterleavingStore {
    fn new(inner: OrderStorage, competing: OrderState, interleave: usize) -> Self {
        Self {
            inner,
            competing,
            interleave,
            appends: AtomicUsize::new(0),
        }
    }
}

impl OrderStore for InterleavingStore {
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Order>> {
        self.inner.find_by_id(id)
    }

    fn find_by_code(&self, code: &str) -> StorageResult<Option<Order>> {
        self.inner.find_by_code(code)
    }

    fn create_order(&self, code: &str, user_id: i64) -> StorageResult<Order> {
        self.inner.create_order(code, user_id)
    }

    fn latest_transition(&self, order_id: i64) -> StorageResult<Option<Transition>> {
        self.inner.latest_transition(order_id)
    }

    fn append(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
    ) -> StorageResult<Transition> {
        if self.appends.fetch_add(1, Ordering::SeqCst) < self.interleave {
            self.inner
                .append(order_id, expected_sequence, self.competing)?;
        }
        self.inner.append(order_id, expected_sequence, state)
    }

    fn append_with_delivery(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
        delay: Duration,
    ) -> StorageResult<(Transition, PendingDelivery)> {
        if self.appends.fetch_add(1, Ordering::SeqCst) < self.interleave {
            self.inner
                .append(order_id, expected_sequence, self.competing)?;
        }
        self.inner
            .append_with_delivery(order_id, expected_sequence, state, delay)
    }

    fn discard_created(&self, order_id: i64) -> StorageResult<()> {
        self.inner.discard_created(order_id)
    }
}

/// Store whose delivery queue cannot be written
struct BrokenQueueStore {
    inner: OrderStorage,
}

impl OrderStore for BrokenQueueStore {
    fn find_by_id(&self, id: i64) -> StorageResult<Option<Order>> {
        self.inner.find_by_id(id)
    }

    fn find_by_code(&self, code: &str) -> StorageResult<Option<Order>> {
        self.inner.find_by_code(code)
    }

    fn create_order(&self, code: &str, user_id: i64) -> StorageResult<Order> {
        self.inner.create_order(code, user_id)
    }

    fn latest_transition(&self, order_id: i64) -> StorageResult<Option<Transition>> {
        self.inner.latest_transition(order_id)
    }

    fn append(
        &self,
        order_id: i64,
        expected_sequence: u64,
        state: OrderState,
    ) -> StorageResult<Transition> {
        self.inner.append(order_id, expected_sequence, state)
    }

    fn append_with_delivery(
        &self,
        _order_id: i64,
        _expected_sequence: u64,
        _state: OrderState,
        _delay: Duration,
    ) -> StorageResult<(Transition, PendingDelivery)> {
        let corrupt = serde_json::from_str::<PendingDelivery>("{").unwrap_err();
        Err(StorageError::Serialization(corrupt))
    }

    fn discard_created(&self, order_id: i64) -> StorageResult<()> {
        self.inner.discard_created(order_id)
    }
}

// ========================================================================
// Harness
// ========================================================================

struct Harness {
    manager: OrdersManager,
    storage: OrderStorage,
    payment: Arc<RecordingPayment>,
    scheduler: Arc<RecordingScheduler>,
}

fn harness_with(payment: RecordingPayment) -> Harness {
    let storage = OrderStorage::open_in_memory().unwrap();
    let payment = Arc::new(payment);
    let scheduler = Arc::new(RecordingScheduler::default());
    let manager = OrdersManager::new(
        Arc::new(storage.clone()),
        Arc::new(StaticIdentity),
        payment.clone(),
        scheduler.clone(),
        DELAY,
    );
    Harness {
        manager,
        storage,
        payment,
        scheduler,
    }
}

/// Fire-and-forget shape
fn create_test_harness() -> Harness {
    harness_with(RecordingPayment::answering(PaymentOutcome::Pending))
}

fn create_request(code: &str) -> CreateOrderRequest {
    CreateOrderRequest {
        code: code.to_string(),
        user_token: VALID_TOKEN.to_string(),
        payment_type: PaymentType::Cash,
    }
}

fn states(order: &Order) -> Vec<OrderState> {
    order.transitions.iter().map(|t| t.state).collect()
}

fn history(storage: &OrderStorage, order_id: i64) -> Vec<OrderState> {
    states(&storage.find_by_id(order_id).unwrap().unwrap())
}
