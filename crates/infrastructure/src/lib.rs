pub mod broker_factory;
pub mod in_memory;
pub mod observability;
pub mod rabbitmq;

pub use broker_factory::BrokerFactory;
pub use in_memory::InMemoryBroker;
pub use rabbitmq::RabbitMQBroker;
