pub mod config;
pub mod errors;
pub mod logging;

pub use config::{AppConfig, BrokerConfig, BrokerType, DispatcherConfig};
pub use errors::{BusError, BusResult};
pub use logging::{init_logging, LogFormat, LoggingConfig};
