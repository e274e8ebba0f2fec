use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::entities::{ReplyEnvelope, Request, Response};
use rpcbus_core::BusResult;

/// 消息总线抽象接口
///
/// 总线按主题路由，投递语义为至少一次；分发器不依赖任何具体拓扑。
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// 发布请求到目标路由键
    async fn publish(&self, target: &str, request: &Request) -> BusResult<()>;

    /// 延迟发布：总线在 `delay_ms` 毫秒后才向消费者投递
    async fn publish_with_delay(
        &self,
        target: &str,
        request: &Request,
        delay_ms: u64,
    ) -> BusResult<()>;

    /// 订阅应答队列，返回按关联ID携带的应答流
    async fn subscribe_replies(
        &self,
        reply_queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<ReplyEnvelope>>;

    /// 订阅请求队列（服务端消费侧）
    async fn subscribe_requests(
        &self,
        queue: &str,
    ) -> BusResult<mpsc::UnboundedReceiver<Request>>;

    /// 向请求方的应答队列回复
    async fn publish_reply(
        &self,
        reply_to: &str,
        correlation_id: &str,
        response: &Response,
    ) -> BusResult<()>;

    /// 关闭总线连接
    async fn close(&self) -> BusResult<()>;
}
