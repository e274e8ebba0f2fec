use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use lapin::types::{AMQPValue, FieldTable};
use lapin::{
    options::*, BasicProperties, Channel, Connection, ConnectionProperties, Queue,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use rpcbus_core::{BrokerConfig, BusError, BusResult};
use rpcbus_domain::{MessageBroker, ReplyEnvelope, Request, Response, CONTENT_TYPE_JSON};

/// RabbitMQ消息总线实现
///
/// 请求发布到默认交换机、以目标队列名为路由键。延迟投递通过
/// 按延迟建立的暂存队列实现：消息TTL到期后经死信路由回到目标
/// 队列，无需broker插件。
pub struct RabbitMQBroker {
    connection: Connection,
    channel: Arc<Mutex<Channel>>,
}

impl RabbitMQBroker {
    /// 建立连接并创建通道
    pub async fn new(config: &BrokerConfig) -> BusResult<Self> {
        config.validate()?;

        let connect_timeout = Duration::from_secs(config.connection_timeout_seconds);
        let connection = tokio::time::timeout(
            connect_timeout,
            Connection::connect(&config.url, ConnectionProperties::default()),
        )
        .await
        .map_err(|_| BusError::message_queue("连接RabbitMQ超时"))?
        .map_err(|e| BusError::message_queue(format!("连接RabbitMQ失败: {e}")))?;

        let channel = connection
            .create_channel()
            .await
            .map_err(|e| BusError::message_queue(format!("创建通道失败: {e}")))?;

        info!("成功连接到RabbitMQ: {}", config.url);

        Ok(Self {
            connection,
            channel: Arc::new(Mutex::new(channel)),
        })
    }

    async fn declare_queue(
        channel: &Channel,
        queue_name: &str,
        options: QueueDeclareOptions,
        arguments: FieldTable,
    ) -> BusResult<Queue> {
        let queue = channel
            .queue_declare(queue_name, options, arguments)
            .await
            .map_err(|e| BusError::message_queue(format!("声明队列 {queue_name} 失败: {e}")))?;

        debug!("队列 {} 声明成功", queue_name);
        Ok(queue)
    }

    async fn basic_publish(
        channel: &Channel,
        routing_key: &str,
        payload: &[u8],
        properties: BasicProperties,
    ) -> BusResult<()> {
        let confirm = channel
            .basic_publish(
                "",
                routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| {
                BusError::message_queue(format!("发布消息到 {routing_key} 失败: {e}"))
            })?;

        confirm
            .await
            .map_err(|e| BusError::message_queue(format!("消息发布确认失败: {e}")))?;
        Ok(())
    }

    fn request_properties() -> BasicProperties {
        BasicProperties::default()
            .with_delivery_mode(2) // 2 = persistent
            .with_content_type(CONTENT_TYPE_JSON.into())
    }

    /// 获取连接状态
    pub fn is_connected(&self) -> bool {
        self.connection.status().connected()
    }
}

#[async_trait]
impl MessageBroker for RabbitMQBroker {
    async fn publish(&self, target: &str, request: &Request) -> BusResult<()> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| BusError::serialization(format!("序列化请求失败: {e}")))?;

        let channel = self.channel.lock().await;
        Self::basic_publish(&channel, target, &payload, Self::request_properties()).await?;

        debug!(target_queue = target, uri = %request.uri, "请求已发布");
        Ok(())
    }

    async fn publish_with_delay(
        &self,
        target: &str,
        request: &Request,
        delay_ms: u64,
    ) -> BusResult<()> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| BusError::serialization(format!("序列化请求失败: {e}")))?;

        // 按延迟粒度建立暂存队列：TTL到期经死信路由回目标队列。
        // x-expires在最后一条消息到期后回收暂存队列本身。
        let staging_queue = format!("{target}.delayed.{delay_ms}");
        let mut arguments = FieldTable::default();
        arguments.insert(
            "x-message-ttl".into(),
            AMQPValue::LongLongInt(delay_ms as i64),
        );
        arguments.insert("x-dead-letter-exchange".into(), AMQPValue::LongString("".into()));
        arguments.insert(
            "x-dead-letter-routing-key".into(),
            AMQPValue::LongString(target.into()),
        );
        arguments.insert(
            "x-expires".into(),
            AMQPValue::LongLongInt(delay_ms as i64 + 60_000),
        );

        let channel = self.channel.lock().await;
        Self::declare_queue(
            &channel,
            &staging_queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            arguments,
        )
        .await?;

        Self::basic_publish(&channel, &staging_queue, &payload, Self::request_properties())
            .await?;

        debug!(
            target_queue = target,
            staging_queue = %staging_queue,
            delay_ms,
            "延迟请求已入暂存队列"
        );
        Ok(())
    }

    async fn subscribe_replies(
        &self,
        reply_queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<ReplyEnvelope>> {
        let channel = self.channel.lock().await;
        Self::declare_queue(
            &channel,
            reply_queue,
            QueueDeclareOptions {
                exclusive: true,
                auto_delete: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

        let mut consumer = channel
            .basic_consume(
                reply_queue,
                &format!("{reply_queue}.consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::message_queue(format!("创建应答消费者失败: {e}")))?;
        drop(channel);

        let (tx, rx) = mpsc::unbounded_channel();
        let queue_name = reply_queue.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!(queue = %queue_name, "消费应答失败: {e}");
                        break;
                    }
                };
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(queue = %queue_name, "确认应答失败: {e}");
                }

                let correlation_id = match delivery.properties.correlation_id() {
                    Some(id) => id.as_str().to_string(),
                    None => {
                        warn!(queue = %queue_name, "应答缺少correlation_id属性，丢弃");
                        continue;
                    }
                };
                match serde_json::from_slice::<Response>(&delivery.data) {
                    Ok(response) => {
                        if tx
                            .send(ReplyEnvelope {
                                correlation_id,
                                response,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => warn!(queue = %queue_name, "应答反序列化失败: {e}"),
                }
            }
        });
        Ok(rx)
    }

    async fn subscribe_requests(
        &self,
        queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<Request>> {
        let channel = self.channel.lock().await;
        Self::declare_queue(
            &channel,
            queue,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

        let mut consumer = channel
            .basic_consume(
                queue,
                &format!("{queue}.consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(|e| BusError::message_queue(format!("创建请求消费者失败: {e}")))?;
        drop(channel);

        let (tx, rx) = mpsc::unbounded_channel();
        let queue_name = queue.to_string();
        tokio::spawn(async move {
            while let Some(delivery) = consumer.next().await {
                let delivery = match delivery {
                    Ok(delivery) => delivery,
                    Err(e) => {
                        error!(queue = %queue_name, "消费请求失败: {e}");
                        break;
                    }
                };
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    warn!(queue = %queue_name, "确认请求失败: {e}");
                }

                match serde_json::from_slice::<Request>(&delivery.data) {
                    Ok(request) => {
                        if tx.send(request).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(queue = %queue_name, "请求反序列化失败: {e}"),
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
        let payload = serde_json::to_vec(response)
            .map_err(|e| BusError::serialization(format!("序列化应答失败: {e}")))?;

        let properties = BasicProperties::default()
            .with_content_type(CONTENT_TYPE_JSON.into())
            .with_correlation_id(correlation_id.into());

        let channel = self.channel.lock().await;
        Self::basic_publish(&channel, reply_to, &payload, properties).await
    }

    async fn close(&self) -> BusResult<()> {
        self.connection
            .close(200, "正常关闭")
            .await
            .map_err(|e| BusError::message_queue(format!("关闭连接失败: {e}")))?;

        info!("RabbitMQ连接已关闭");
        Ok(())
    }
}
