use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use rpcbus_core::{BusError, BusResult};
use rpcbus_domain::{MessageBroker, ReplyEnvelope, Request, Response};

/// 内存消息总线
///
/// 使用Tokio channels实现的进程内总线，适用于嵌入式部署和测试。
/// 每个队列一条无界通道；先发布后订阅时消息在通道中缓存，不丢失。
/// 延迟投递由定时任务实现，投递保证以总线为准（发后即忘）。
#[derive(Debug, Default)]
pub struct InMemoryBroker {
    queues: Arc<RwLock<HashMap<String, QueueChannel>>>,
}

#[derive(Debug)]
enum Delivery {
    Request(Request),
    Reply(ReplyEnvelope),
}

#[derive(Debug)]
struct QueueChannel {
    sender: mpsc::UnboundedSender<Delivery>,
    /// 订阅时被取走；每个队列只允许一个消费者
    receiver: Option<mpsc::UnboundedReceiver<Delivery>>,
}

impl QueueChannel {
    fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Some(receiver),
        }
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn sender_for(&self, queue: &str) -> mpsc::UnboundedSender<Delivery> {
        {
            let queues = self.queues.read().await;
            if let Some(entry) = queues.get(queue) {
                return entry.sender.clone();
            }
        }
        let mut queues = self.queues.write().await;
        queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannel::new)
            .sender
            .clone()
    }

    async fn take_receiver(&self, queue: &str) -> BusResult<mpsc::UnboundedReceiver<Delivery>> {
        let mut queues = self.queues.write().await;
        let entry = queues
            .entry(queue.to_string())
            .or_insert_with(QueueChannel::new);
        entry
            .receiver
            .take()
            .ok_or_else(|| BusError::message_queue(format!("队列 {queue} 已被订阅")))
    }

    /// 当前队列数，测试用
    pub async fn queue_count(&self) -> usize {
        self.queues.read().await.len()
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, target: &str, request: &Request) -> BusResult<()> {
        let sender = self.sender_for(target).await;
        sender
            .send(Delivery::Request(request.clone()))
            .map_err(|_| BusError::message_queue(format!("队列 {target} 已关闭")))?;
        debug!(target_queue = target, uri = %request.uri, "消息已发布");
        Ok(())
    }

    async fn publish_with_delay(
        &self,
        target: &str,
        request: &Request,
        delay_ms: u64,
    ) -> BusResult<()> {
        let sender = self.sender_for(target).await;
        let request = request.clone();
        let target = target.to_string();
        // 交接即返回；到期投递失败只能记录，延迟调用没有等待方
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            if sender.send(Delivery::Request(request)).is_err() {
                warn!(target_queue = %target, "延迟消息到期时队列已关闭");
            }
        });
        Ok(())
    }

    async fn subscribe_replies(
        &self,
        reply_queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<ReplyEnvelope>> {
        let mut raw_rx = self.take_receiver(reply_queue).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = reply_queue.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = raw_rx.recv().await {
                match delivery {
                    Delivery::Reply(envelope) => {
                        if tx.send(envelope).is_err() {
                            break;
                        }
                    }
                    Delivery::Request(_) => {
                        warn!(queue = %queue, "应答队列收到请求消息，丢弃");
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn subscribe_requests(
        &self,
        queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<Request>> {
        let mut raw_rx = self.take_receiver(queue).await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let queue = queue.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = raw_rx.recv().await {
                match delivery {
                    Delivery::Request(request) => {
                        if tx.send(request).is_err() {
                            break;
                        }
                    }
                    Delivery::Reply(_) => {
                        warn!(queue = %queue, "请求队列收到应答消息，丢弃");
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn publish_reply(
        &self,
        reply_to: &str,
        correlation_id: &str,
        response: &Response,
    ) -> BusResult<()> {
        let sender = self.sender_for(reply_to).await;
        sender
            .send(Delivery::Reply(ReplyEnvelope {
                correlation_id: correlation_id.to_string(),
                response: response.clone(),
            }))
            .map_err(|_| BusError::message_queue(format!("应答队列 {reply_to} 已关闭")))
    }

    async fn close(&self) -> BusResult<()> {
        let mut queues = self.queues.write().await;
        queues.clear();
        debug!("内存总线已关闭");
        Ok(())
    }
}
