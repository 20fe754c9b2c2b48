pub mod condition;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod lifecycle;
pub mod units;

pub use condition::{Condition, Operator, UnknownOperator};
pub use config::{
    AppConfig, ChainConfig, MonitorConfig, OracleBackend, OracleConfig, OrderBookConfig,
    PendingConfig, ProtocolConfig, RetryConfig, ServerConfig, TokenConfig,
};
pub use config_loader::{ConfigError, ConfigLoader};
pub use error::{ErrorCode, HasErrorCode};
pub use lifecycle::OrderState;
