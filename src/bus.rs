use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use rpcbus_core::AppConfig;
use rpcbus_dispatcher::RequestDispatcher;
use rpcbus_domain::{MessageBroker, RequestMethod, Response};
use rpcbus_infrastructure::BrokerFactory;

/// 总线门面：按配置装配消息总线与请求分发器
///
/// 大多数调用方只需要 `RpcBus::start` 加 `send_request`；需要更细
/// 控制时可直接使用 `dispatcher()` 与 `broker()`。
pub struct RpcBus {
    config: AppConfig,
    broker: Arc<dyn MessageBroker>,
    dispatcher: Arc<RequestDispatcher>,
}

impl RpcBus {
    /// 创建总线连接并启动分发器
    pub async fn start(config: AppConfig) -> Result<Self> {
        config.validate().context("配置校验失败")?;

        let broker = BrokerFactory::create(&config.broker)
            .await
            .context("创建消息总线失败")?;

        let dispatcher = RequestDispatcher::start(broker.clone(), config.dispatcher.clone())
            .await
            .context("启动请求分发器失败")?;

        info!(publisher = %config.dispatcher.publisher, "rpcbus已启动");
        Ok(Self {
            config,
            broker,
            dispatcher,
        })
    }

    /// 发送请求，超时取配置的默认值
    ///
    /// `delay_ms` 大于0时走延迟投递并立即返回 `Ok(None)`。
    pub async fn send_request(
        &self,
        target: &str,
        uri: &str,
        method: RequestMethod,
        delay_ms: u64,
        data_type: &str,
        data: Option<serde_json::Value>,
    ) -> Result<Option<Response>> {
        let response = self
            .dispatcher
            .dispatch(
                target,
                uri,
                method,
                self.config.dispatcher.default_timeout_ms,
                delay_ms,
                data_type,
                data,
            )
            .await?;
        Ok(response)
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub fn broker(&self) -> &Arc<dyn MessageBroker> {
        &self.broker
    }

    /// 关闭分发器与总线连接
    pub async fn shutdown(&self) -> Result<()> {
        self.dispatcher.shutdown().await;
        self.broker.close().await?;
        info!("rpcbus已关闭");
        Ok(())
    }
}
