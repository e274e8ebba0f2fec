use std::sync::Arc;

use tracing::{debug, info};

use rpcbus_core::{BrokerConfig, BrokerType, BusResult};
use rpcbus_domain::MessageBroker;

use crate::{InMemoryBroker, RabbitMQBroker};

pub struct BrokerFactory;

impl BrokerFactory {
    /// 按配置创建消息总线实例
    pub async fn create(config: &BrokerConfig) -> BusResult<Arc<dyn MessageBroker>> {
        debug!("创建消息总线，类型: {:?}", config.r#type);

        match config.r#type {
            BrokerType::Rabbitmq => {
                info!("初始化RabbitMQ消息总线");
                let broker = RabbitMQBroker::new(config).await?;
                Ok(Arc::new(broker))
            }
            BrokerType::InMemory => {
                info!("初始化内存消息总线");
                Ok(Arc::new(InMemoryBroker::new()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_in_memory_broker() {
        let config = BrokerConfig {
            r#type: BrokerType::InMemory,
            url: String::new(),
            connection_timeout_seconds: 1,
        };
        let broker = BrokerFactory::create(&config).await.unwrap();
        assert!(broker.close().await.is_ok());
    }
}
