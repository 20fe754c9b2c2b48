//! CLI commands for the conditional swap order service.

pub mod index;
pub mod serve;
pub mod show_config;

pub use index::{run_index, IndexArgs};
pub use serve::{run_serve, ServeArgs};
pub use show_config::{run_show_config, ShowConfigArgs};

use anyhow::{Context, Result};
use clap::Args;
use condswap_core::{AppConfig, ConfigLoader};

/// Where configuration comes from. Shared by every command.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Config file path
    #[arg(short, long, default_value = "config/Config.toml")]
    pub config: String,

    /// Profile overlay, reads config/Config.{profile}.toml on top of config/Config.toml
    #[arg(long, env = "CONDSWAP_PROFILE")]
    pub profile: Option<String>,
}

impl ConfigArgs {
    pub fn load(&self) -> Result<AppConfig> {
        let config = match &self.profile {
            Some(profile) => ConfigLoader::load_with_profile(profile),
            None => ConfigLoader::load_from(&self.config),
        };
        config.with_context(|| format!("loading configuration from {}", self.config))
    }
}
