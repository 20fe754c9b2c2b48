//! Reads indices through the configured oracle backend.

use super::ConfigArgs;
use crate::wiring::build_oracle;
use anyhow::Result;
use clap::Args;

#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Index id to read. Lists every index when omitted.
    pub id: Option<u64>,
}

pub async fn run_index(args: IndexArgs) -> Result<()> {
    let config = args.config.load()?;
    let oracle = build_oracle(&config)?;

    let output = match args.id {
        Some(id) => {
            let index = oracle.get_index(id).await?;
            serde_json::to_string_pretty(&index)?
        }
        None => serde_json::to_string_pretty(&oracle.list_indices().await?)?,
    };
    println!("{output}");

    Ok(())
}
