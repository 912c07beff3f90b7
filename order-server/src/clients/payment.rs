//! Payment service clients
//!
//! Two shapes share the [`PaymentInitiator`] contract:
//!
//! ```text
//! request/response:  initiate() ── POST /api/payments ──▶ {paid} ──▶ Paid | Declined
//!
//! fire-and-forget:   initiate() ── mpsc ──▶ PaymentDispatcher ── POST /api/payments/initiate
//!                        └──▶ Pending (settlement arrives later via confirm/cancel)
//! ```
//!
//! Neither shape retries: a failed call is reported (request/response) or
//! logged (dispatcher) and left to the payment service.

use super::{ClientError, ClientResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::order::PaymentType;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Payment initiation message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub order_id: i64,
    pub user_token: String,
    pub payment_type: PaymentType,
}

/// Result of initiating a payment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// Message handed off, verdict arrives out-of-band
    Pending,
    Paid,
    Declined,
}

/// Starts payment for a freshly created order
#[async_trait]
pub trait PaymentInitiator: Send + Sync {
    async fn initiate(&self, request: &PaymentRequest) -> ClientResult<PaymentOutcome>;
}

#[derive(Debug, Deserialize)]
struct PaymentVerdict {
    paid: bool,
}

// ============================================================================
// Request/response
// ============================================================================

/// Synchronous payment client: waits for the paid/not-paid verdict
#[derive(Debug, Clone)]
pub struct HttpPaymentClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPaymentClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl PaymentInitiator for HttpPaymentClient {
    async fn initiate(&self, request: &PaymentRequest) -> ClientResult<PaymentOutcome> {
        let resp = self
            .client
            .post(format!("{}/api/payments", self.base_url))
            .json(request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::UnexpectedStatus {
                service: "payment",
                status,
                body,
            });
        }

        let verdict: PaymentVerdict = resp.json().await?;
        tracing::info!(order_id = request.order_id, paid = verdict.paid, "Payment settled");
        Ok(if verdict.paid {
            PaymentOutcome::Paid
        } else {
            PaymentOutcome::Declined
        })
    }
}

// ============================================================================
// Fire-and-forget
// ============================================================================

/// Fire-and-forget initiator: queues the message and returns immediately
#[derive(Debug, Clone)]
pub struct QueuedPaymentPublisher {
    tx: mpsc::UnboundedSender<PaymentRequest>,
}

impl QueuedPaymentPublisher {
    /// Create the publisher and the receiving end for [`PaymentDispatcher`]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<PaymentRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl PaymentInitiator for QueuedPaymentPublisher {
    async fn initiate(&self, request: &PaymentRequest) -> ClientResult<PaymentOutcome> {
        self.tx
            .send(request.clone())
            .map_err(|_| ClientError::QueueClosed)?;
        tracing::debug!(order_id = request.order_id, "Payment message queued");
        Ok(PaymentOutcome::Pending)
    }
}

/// Background worker posting queued payment messages to the payment service
pub struct PaymentDispatcher {
    base_url: String,
    client: reqwest::Client,
}

impl PaymentDispatcher {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> ClientResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Drain the queue until it closes or shutdown is requested
    pub async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<PaymentRequest>,
        shutdown: CancellationToken,
    ) {
        tracing::info!("PaymentDispatcher started");

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(request) => self.dispatch(&request).await,
                        None => {
                            tracing::info!("Payment channel closed, shutting down PaymentDispatcher");
                            break;
                        }
                    }
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("PaymentDispatcher received shutdown signal");
                    break;
                }
            }
        }
    }

    async fn dispatch(&self, request: &PaymentRequest) {
        let result = self
            .client
            .post(format!("{}/api/payments/initiate", self.base_url))
            .json(request)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(order_id = request.order_id, "Payment initiated");
            }
            Ok(resp) => {
                tracing::error!(
                    order_id = request.order_id,
                    status = %resp.status(),
                    "Payment service rejected initiation"
                );
            }
            Err(e) => {
                tracing::error!(order_id = request.order_id, error = %e, "Payment service unreachable");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use std::sync::{Arc, Mutex};

    type Received = Arc<Mutex<Vec<PaymentRequest>>>;

    async fn settle(Json(req): Json<PaymentRequest>) -> Json<serde_json::Value> {
        // Cash always clears, credit is declined
        Json(serde_json::json!({ "paid": req.payment_type == PaymentType::Cash }))
    }

    async fn initiate(State(received): State<Received>, Json(req): Json<PaymentRequest>) {
        received.lock().unwrap().push(req);
    }

    async fn spawn_payment_service() -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route("/api/payments", post(settle))
            .route("/api/payments/initiate", post(initiate))
            .with_state(received.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), received)
    }

    fn request(payment_type: PaymentType) -> PaymentRequest {
        PaymentRequest {
            order_id: 1,
            user_token: "tok".to_string(),
            payment_type,
        }
    }

    #[tokio::test]
    async fn test_http_client_verdicts() {
        let (url, _) = spawn_payment_service().await;
        let client = HttpPaymentClient::new(url, Duration::from_secs(5)).unwrap();

        let paid = client.initiate(&request(PaymentType::Cash)).await.unwrap();
        assert_eq!(paid, PaymentOutcome::Paid);
        let declined = client.initiate(&request(PaymentType::Credit)).await.unwrap();
        assert_eq!(declined, PaymentOutcome::Declined);
    }

    #[tokio::test]
    async fn test_http_client_unreachable() {
        let addr = {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };
        let client =
            HttpPaymentClient::new(format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let err = client.initiate(&request(PaymentType::Cash)).await.unwrap_err();
        assert!(matches!(err, ClientError::Transport(_)));
    }

    #[tokio::test]
    async fn test_publisher_returns_pending_and_dispatcher_posts() {
        let (url, received) = spawn_payment_service().await;
        let (publisher, rx) = QueuedPaymentPublisher::channel();
        let dispatcher = PaymentDispatcher::new(url, Duration::from_secs(5)).unwrap();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(dispatcher.run(rx, shutdown.clone()));

        let outcome = publisher.initiate(&request(PaymentType::Credit)).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Pending);

        for _ in 0..50 {
            if !received.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(received.lock().unwrap().as_slice(), &[request(PaymentType::Credit)]);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_publisher_closed_queue() {
        let (publisher, rx) = QueuedPaymentPublisher::channel();
        drop(rx);
        let err = publisher.initiate(&request(PaymentType::Cash)).await.unwrap_err();
        assert!(matches!(err, ClientError::QueueClosed));
    }
}
