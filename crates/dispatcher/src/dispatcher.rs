use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rpcbus_core::{BusError, BusResult, DispatcherConfig};
use rpcbus_domain::{MessageBroker, Request, RequestMethod, Response};

use crate::correlation::CorrelationRegistry;
use crate::delay::DelayScheduler;
use crate::metrics::{self, DispatchOutcome};

/// 请求分发器
///
/// 把发后即忘的主题路由总线变成每请求一次的同步调用：构造请求
/// 信封、登记关联、发布到目标路由键，然后让调用方在结果槽上
/// 有界等待。应答订阅流由进程内唯一的分发循环消费，按关联ID
/// 分派，绝不因为某个慢调用方而阻塞。
pub struct RequestDispatcher {
    broker: Arc<dyn MessageBroker>,
    registry: Arc<CorrelationRegistry>,
    delay_scheduler: DelayScheduler,
    reply_queue: String,
    shutdown_tx: broadcast::Sender<()>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// 在结果产生前调用方离开（future被丢弃）时注销登记项，
/// 使迟到应答被丢弃而不是投递到复用的结果槽。
struct CorrelationGuard {
    registry: Arc<CorrelationRegistry>,
    correlation_id: String,
}

impl Drop for CorrelationGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.correlation_id);
    }
}

impl RequestDispatcher {
    /// 启动分发器：订阅进程级应答队列并拉起分发循环与清扫任务
    pub async fn start(
        broker: Arc<dyn MessageBroker>,
        config: DispatcherConfig,
    ) -> BusResult<Arc<Self>> {
        config.validate()?;

        let reply_queue = match &config.reply_queue {
            Some(queue) => queue.clone(),
            None => default_reply_queue(&config.publisher),
        };

        let reply_rx = broker.subscribe_replies(&reply_queue).await?;
        let registry = Arc::new(CorrelationRegistry::new());
        let (shutdown_tx, _) = broadcast::channel(16);

        // 应答分发循环：进程内唯一消费应答流的任务。resolve是
        // 非阻塞的单写交接，循环不会被慢调用方拖住。
        let loop_registry = registry.clone();
        let loop_queue = reply_queue.clone();
        let mut loop_shutdown = shutdown_tx.subscribe();
        let reply_task = tokio::spawn(async move {
            let mut reply_rx = reply_rx;
            loop {
                tokio::select! {
                    _ = loop_shutdown.recv() => break,
                    maybe_envelope = reply_rx.recv() => match maybe_envelope {
                        Some(envelope) => {
                            if !loop_registry.resolve(&envelope.correlation_id, envelope.response) {
                                debug!(
                                    correlation_id = %envelope.correlation_id,
                                    "丢弃无主应答（已完成、已过期或已取消）"
                                );
                                metrics::record_dropped_reply(&loop_queue);
                            }
                        }
                        None => {
                            warn!("应答订阅流已关闭，分发循环退出");
                            break;
                        }
                    },
                }
            }
        });

        // 超时清扫任务。等待方自身也持有本地截止时间，清扫只负责
        // 回收等待方已离开的登记项，粒度粗一些无妨。
        let sweep_registry = registry.clone();
        let sweep_interval = Duration::from_millis(config.sweep_interval_ms);
        let mut sweep_shutdown = shutdown_tx.subscribe();
        let sweep_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = sweep_shutdown.recv() => break,
                    _ = ticker.tick() => {
                        let expired = sweep_registry.expire(Instant::now());
                        if !expired.is_empty() {
                            metrics::record_expired_calls(expired.len() as u64);
                        }
                    }
                }
            }
        });

        info!(
            publisher = %config.publisher,
            reply_queue = %reply_queue,
            "请求分发器已启动"
        );

        Ok(Arc::new(Self {
            delay_scheduler: DelayScheduler::new(broker.clone()),
            broker,
            registry,
            reply_queue,
            shutdown_tx,
            background_tasks: Mutex::new(vec![reply_task, sweep_task]),
        }))
    }

    /// 发送请求
    ///
    /// `timeout_ms`: 同步等待应答的上限（毫秒）。
    /// `delay_ms`: 0表示立即发送并等待应答；大于0时走延迟投递，
    /// 立刻返回 `Ok(None)`，不等待远端效果。
    pub async fn dispatch(
        &self,
        target: &str,
        uri: &str,
        method: RequestMethod,
        timeout_ms: u64,
        delay_ms: u64,
        data_type: &str,
        data: Option<serde_json::Value>,
    ) -> BusResult<Option<Response>> {
        let correlation_id = Uuid::new_v4().to_string();
        let request = Request::new(
            uri,
            method,
            data_type,
            data,
            correlation_id,
            self.reply_queue.clone(),
        );

        if delay_ms > 0 {
            self.delay_scheduler
                .schedule_delayed(target, &request, delay_ms)
                .await?;
            return Ok(None);
        }

        self.dispatch_direct(target, request, timeout_ms)
            .await
            .map(Some)
    }

    /// 同步路径：登记、发布、有界等待
    async fn dispatch_direct(
        &self,
        target: &str,
        request: Request,
        timeout_ms: u64,
    ) -> BusResult<Response> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        let mut result_rx = self.registry.register(&request.correlation_id, deadline)?;
        let _guard = CorrelationGuard {
            registry: self.registry.clone(),
            correlation_id: request.correlation_id.clone(),
        };

        let resource = request.resource().to_string();
        let method_label = request.method.to_string();
        let start = Instant::now();

        if let Err(e) = self.broker.publish(target, &request).await {
            // guard负责注销刚登记的条目
            metrics::record_request_process_time(
                target,
                &resource,
                &method_label,
                DispatchOutcome::Rejected,
                start.elapsed().as_secs_f64() * 1000.0,
            );
            return Err(e);
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let sleep = tokio::time::sleep(deadline.saturating_duration_since(Instant::now()));
        tokio::pin!(sleep);

        let result = tokio::select! {
            res = &mut result_rx => match res {
                Ok(response) => Ok(response),
                // 发送端被清扫任务丢弃，等同截止时间已过
                Err(_) => Err(BusError::timeout(target, request.uri.as_str())),
            },
            _ = &mut sleep => {
                self.registry.remove(&request.correlation_id);
                Err(BusError::timeout(target, request.uri.as_str()))
            }
            _ = shutdown_rx.recv() => {
                self.registry.remove(&request.correlation_id);
                Err(BusError::cancelled(target, request.uri.as_str()))
            }
        };

        let outcome = match &result {
            Ok(_) => DispatchOutcome::Success,
            Err(BusError::Timeout { .. }) => DispatchOutcome::Timeout,
            Err(BusError::Cancelled { .. }) => DispatchOutcome::Cancelled,
            Err(_) => DispatchOutcome::Rejected,
        };
        metrics::record_request_process_time(
            target,
            &resource,
            &method_label,
            outcome,
            start.elapsed().as_secs_f64() * 1000.0,
        );

        result
    }

    /// 本进程的应答队列名
    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    /// 当前未完成的同步调用数
    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    /// 底层总线句柄
    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    /// 优雅关闭：唤醒所有等待方（`Cancelled`）并停止后台任务
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        let tasks: Vec<JoinHandle<()>> = match self.background_tasks.lock() {
            Ok(mut guard) => guard.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for task in tasks {
            let _ = task.await;
        }
        info!("请求分发器已关闭");
    }
}

/// 进程级应答队列名：`<publisher>.reply.<hostname>.<uuid8>`
fn default_reply_queue(publisher: &str) -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string());
    let suffix = &Uuid::new_v4().to_string()[..8];
    format!("{publisher}.reply.{host}.{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_reply_queue_is_process_unique() {
        let a = default_reply_queue("call-manager");
        let b = default_reply_queue("call-manager");
        assert!(a.starts_with("call-manager.reply."));
        assert_ne!(a, b);
    }
}
