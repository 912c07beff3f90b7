use std::sync::Arc;

use tokio::sync::mpsc;

use crate::clients::{
    HttpIdentityVerifier, HttpPaymentClient, IdentityVerifier, PaymentDispatcher,
    PaymentInitiator, PaymentRequest, QueuedPaymentPublisher,
};
use crate::core::{BackgroundTasks, Config, PaymentMode, Result, TaskKind};
use crate::orders::{DeliveryQueue, DeliveryWorker, OrderStorage, OrdersManager, PendingDelivery};

/// 服务器状态 - 持有所有 handler 共享的资源
///
/// 克隆开销很小：内部均为 `Arc` 或句柄。
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (redb)
    pub storage: OrderStorage,
    /// 订单编排器
    pub orders: Arc<OrdersManager>,
}

/// 尚未启动的后台工作者及其接收端
pub struct Workers {
    delivery: DeliveryWorker,
    delivery_rx: mpsc::UnboundedReceiver<PendingDelivery>,
    payment: Option<(PaymentDispatcher, mpsc::UnboundedReceiver<PaymentRequest>)>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 数据库 (work_dir/database/orders.redb)
    /// 3. 外部服务客户端 (身份、支付；支付形态由 PAYMENT_MODE 决定)
    /// 4. 订单编排器与送达队列
    pub fn initialize(config: &Config) -> Result<(Self, Workers)> {
        config.ensure_work_dir_structure()?;

        let storage = OrderStorage::open(config.database_path())?;
        tracing::info!(path = %config.database_path().display(), "Order database opened");

        let timeout = config.request_timeout();
        let identity = Arc::new(HttpIdentityVerifier::new(
            config.auth_service_url.clone(),
            timeout,
        )?);

        let (payment, dispatcher) = match config.payment_mode {
            PaymentMode::Async => {
                let (publisher, rx) = QueuedPaymentPublisher::channel();
                let dispatcher =
                    PaymentDispatcher::new(config.payment_service_url.clone(), timeout)?;
                (Arc::new(publisher) as Arc<dyn PaymentInitiator>, Some((dispatcher, rx)))
            }
            PaymentMode::Sync => {
                let client = HttpPaymentClient::new(config.payment_service_url.clone(), timeout)?;
                (Arc::new(client) as Arc<dyn PaymentInitiator>, None)
            }
        };
        tracing::info!(mode = ?config.payment_mode, "Payment initiator configured");

        let (state, mut workers) =
            Self::with_collaborators(config.clone(), storage, identity, payment);
        workers.payment = dispatcher;
        Ok((state, workers))
    }

    /// 使用给定的外部服务实现组装状态
    ///
    /// 送达队列始终基于 redb；测试可以注入假的身份/支付服务。
    pub fn with_collaborators(
        config: Config,
        storage: OrderStorage,
        identity: Arc<dyn IdentityVerifier>,
        payment: Arc<dyn PaymentInitiator>,
    ) -> (Self, Workers) {
        let (queue, delivery_rx) = DeliveryQueue::channel();
        let orders = Arc::new(OrdersManager::new(
            Arc::new(storage.clone()),
            identity,
            payment,
            Arc::new(queue),
            config.delivery_delay(),
        ));
        let delivery = DeliveryWorker::new(storage.clone(), orders.clone());

        let state = Self {
            config,
            storage,
            orders,
        };
        let workers = Workers {
            delivery,
            delivery_rx,
            payment: None,
        };
        (state, workers)
    }

    /// 启动后台任务
    ///
    /// 启动的任务：
    /// - 送达调度 (DeliveryWorker)
    /// - 支付投递 (PaymentDispatcher，仅 async 模式)
    /// - 状态变更日志 (transition_listener)
    pub fn start_background_tasks(&self, workers: Workers, tasks: &mut BackgroundTasks) {
        let token = tasks.shutdown_token();

        tasks.spawn(
            "delivery_worker",
            TaskKind::Worker,
            workers.delivery.run(workers.delivery_rx, token.clone()),
        );

        if let Some((dispatcher, rx)) = workers.payment {
            tasks.spawn(
                "payment_dispatcher",
                TaskKind::Worker,
                dispatcher.run(rx, token.clone()),
            );
        }

        let mut events = self.orders.subscribe();
        tasks.spawn("transition_listener", TaskKind::Listener, async move {
            loop {
                tokio::select! {
                    event = events.recv() => match event {
                        Ok(t) => tracing::debug!(
                            order_id = t.order_id,
                            sequence = t.sequence,
                            state = %t.state,
                            "Transition committed"
                        ),
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "Transition listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    },
                    _ = token.cancelled() => break,
                }
            }
        });

        tasks.log_summary();
    }
}
