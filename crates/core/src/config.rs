use ethers::types::Address;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// 1inch limit-order protocol v4 router, deployed at the same address on every supported chain.
pub const LIMIT_ORDER_PROTOCOL_V4: &str = "0x111111125421cA6dc452d289314280a0f8842A65";

/// Base mainnet chain ID.
pub const BASE_CHAIN_ID: u64 = 8453;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub chain: ChainConfig,
    pub oracle: OracleConfig,
    pub protocol: ProtocolConfig,
    pub order_book: OrderBookConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub pending: PendingConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default = "default_tokens")]
    pub tokens: Vec<TokenConfig>,
    /// Recover the signer of every submitted order and require it to be the maker.
    #[serde(default = "default_true")]
    pub verify_signatures: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub rpc_url: String,
    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

/// Which implementation answers oracle reads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleBackend {
    /// `eth_call` against the deployed oracle contract.
    Rpc,
    /// In-process registry seeded with the predefined indices.
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Address of the index oracle contract. Predicates call `getValue` on it at fill time.
    pub contract_address: Address,
    pub backend: OracleBackend,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Settlement protocol address, also the EIP-712 verifying contract.
    pub address: Address,
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default = "default_domain_version")]
    pub domain_version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookConfig {
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,
    #[serde(default = "default_order_book_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 10_000,
            multiplier: 1.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingConfig {
    pub ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for PendingConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 1_800,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub interval_secs: u64,
    pub call_timeout_ms: u64,
    /// How long a terminal order's last report stays visible.
    #[serde(default = "default_report_retention_secs")]
    pub report_retention_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            call_timeout_ms: 5_000,
            report_retention_secs: default_report_retention_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u32,
}

fn default_true() -> bool {
    true
}

fn default_report_retention_secs() -> u64 {
    3_600
}

fn default_rpc_timeout_ms() -> u64 {
    10_000
}

fn default_read_timeout_ms() -> u64 {
    5_000
}

fn default_order_book_timeout_ms() -> u64 {
    15_000
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_domain_name() -> String {
    "1inch Aggregation Router".to_string()
}

fn default_domain_version() -> String {
    "6".to_string()
}

fn parse_const_address(addr: &str) -> Address {
    addr.parse().unwrap_or_default()
}

/// Base mainnet tokens used when no `[[tokens]]` table is configured.
#[must_use]
pub fn default_tokens() -> Vec<TokenConfig> {
    vec![
        TokenConfig {
            symbol: "USDC".to_string(),
            address: parse_const_address("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            decimals: 6,
        },
        TokenConfig {
            symbol: "WETH".to_string(),
            address: parse_const_address("0x4200000000000000000000000000000000000006"),
            decimals: 18,
        },
        TokenConfig {
            symbol: "DAI".to_string(),
            address: parse_const_address("0x50c5725949A6F0c72E6C4a641F24049A917DB0Cb"),
            decimals: 18,
        },
    ]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            chain: ChainConfig {
                chain_id: BASE_CHAIN_ID,
                rpc_url: "https://mainnet.base.org".to_string(),
                rpc_timeout_ms: default_rpc_timeout_ms(),
            },
            oracle: OracleConfig {
                contract_address: Address::zero(),
                backend: OracleBackend::Local,
                read_timeout_ms: default_read_timeout_ms(),
            },
            protocol: ProtocolConfig {
                address: parse_const_address(LIMIT_ORDER_PROTOCOL_V4),
                domain_name: default_domain_name(),
                domain_version: default_domain_version(),
            },
            order_book: OrderBookConfig {
                base_url: "https://api.1inch.dev".to_string(),
                api_key: None,
                timeout_ms: default_order_book_timeout_ms(),
                requests_per_minute: default_requests_per_minute(),
            },
            retry: RetryConfig::default(),
            pending: PendingConfig::default(),
            monitor: MonitorConfig::default(),
            tokens: default_tokens(),
            verify_signatures: true,
        }
    }
}

impl AppConfig {
    /// Socket address string the HTTP server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
