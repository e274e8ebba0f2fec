//! rpcbus：把主题路由的消息总线变成同步的请求-应答调用。
//!
//! 核心能力：
//! - 关联ID登记与应答分派（每调用一个结果槽，首写获胜）
//! - 有界等待：本地截止时间加后台清扫，超时以 `Timeout` 返回
//! - 延迟投递：发后即忘，用于定时器、分级重试与计划动作
//! - 应答解释：2xx成功、>299远端错误、无应答合成404

pub mod bus;

pub use bus::RpcBus;

pub use rpcbus_core::{
    init_logging, AppConfig, BrokerConfig, BrokerType, BusError, BusResult, DispatcherConfig,
    LogFormat, LoggingConfig,
};
pub use rpcbus_dispatcher::{
    interpret, CorrelationRegistry, DelayScheduler, RequestDispatcher, ResponseOutcome,
};
pub use rpcbus_domain::{
    request_target, MessageBroker, ReplyEnvelope, Request, RequestMethod, Response,
    CONTENT_TYPE_JSON, CONTENT_TYPE_NONE, CONTENT_TYPE_TEXT,
};
pub use rpcbus_infrastructure::{BrokerFactory, InMemoryBroker, RabbitMQBroker};
