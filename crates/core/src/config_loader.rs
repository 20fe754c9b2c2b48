use crate::config::{AppConfig, OracleBackend};
use crate::error::{ErrorCode, HasErrorCode};
use ethers::types::Address;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use thiserror::Error;

/// Environment variable prefix. Nested keys use `__`, e.g. `CONDSWAP_CHAIN__RPC_URL`.
pub const ENV_PREFIX: &str = "CONDSWAP_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl HasErrorCode for ConfigError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Config
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads configuration by layering defaults, `config/Config.toml`, `config/Config.json`,
    /// and `CONDSWAP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a present file cannot be parsed or the result fails validation.
    pub fn load() -> Result<AppConfig, ConfigError> {
        Self::from_figment(Self::base("config/Config.toml"))
    }

    /// Loads configuration from an explicit TOML file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or the result fails validation.
    pub fn load_from(path: &str) -> Result<AppConfig, ConfigError> {
        Self::from_figment(Self::base(path))
    }

    /// Loads configuration with a profile overlay `config/Config.{profile}.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration files cannot be read or parsed.
    pub fn load_with_profile(profile: &str) -> Result<AppConfig, ConfigError> {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file("config/Config.toml"))
            .merge(Toml::file(format!("config/Config.{profile}.toml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::from_figment(figment)
    }

    fn base(toml_path: &str) -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(toml_path))
            .join(Json::file("config/Config.json"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<AppConfig, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        Self::validate(&config)?;
        tracing::debug!(
            chain_id = config.chain.chain_id,
            oracle_backend = ?config.oracle.backend,
            tokens = config.tokens.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Checks cross-field invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` describing the first violated rule.
    pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
        if config.chain.chain_id == 0 {
            return Err(ConfigError::Invalid("chain.chain_id must be non-zero".into()));
        }
        if config.oracle.backend == OracleBackend::Rpc && config.chain.rpc_url.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "chain.rpc_url is required when oracle.backend = \"rpc\"".into(),
            ));
        }
        if config.protocol.address == Address::zero() {
            return Err(ConfigError::Invalid("protocol.address must be set".into()));
        }
        if config.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if config.monitor.interval_secs == 0 {
            return Err(ConfigError::Invalid("monitor.interval_secs must be positive".into()));
        }
        if config.order_book.requests_per_minute == 0 {
            return Err(ConfigError::Invalid(
                "order_book.requests_per_minute must be positive".into(),
            ));
        }
        for token in &config.tokens {
            if token.symbol.trim().is_empty() {
                return Err(ConfigError::Invalid("token symbol cannot be empty".into()));
            }
            if token.decimals > 36 {
                return Err(ConfigError::Invalid(format!(
                    "token {} has unsupported decimals {}",
                    token.symbol, token.decimals
                )));
            }
        }
        Ok(())
    }
}
