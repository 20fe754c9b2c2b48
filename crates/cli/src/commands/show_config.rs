//! Prints the resolved configuration. Secrets are never printed.

use super::ConfigArgs;
use anyhow::Result;
use clap::Args;
use condswap_core::AppConfig;
use secrecy::ExposeSecret;

#[derive(Args, Debug)]
pub struct ShowConfigArgs {
    #[command(flatten)]
    pub config: ConfigArgs,
}

pub fn run_show_config(args: &ShowConfigArgs) -> Result<()> {
    let config = args.config.load()?;
    println!("{}", render(&config)?);
    Ok(())
}

/// `order_book.api_key` is skipped by serialization; only its presence is shown.
fn render(config: &AppConfig) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    let key_state = match &config.order_book.api_key {
        Some(key) if !key.expose_secret().is_empty() => "<redacted>",
        _ => "<unset>",
    };
    if let Some(book) = value.get_mut("order_book").and_then(|b| b.as_object_mut()) {
        book.insert("api_key".to_string(), key_state.into());
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
