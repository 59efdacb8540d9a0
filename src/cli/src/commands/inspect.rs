//! `strata inspect` command - Display detailed layer information as JSON.

use clap::Args;
use strata_core::{LayerId, LayerInfo};
use strata_runtime::StrataDriver;

#[derive(Args)]
pub struct InspectArgs {
    /// Layer IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub async fn execute(driver: &StrataDriver, args: InspectArgs) -> Result<(), Box<dyn std::error::Error>> {
    let ids = args
        .ids
        .into_iter()
        .map(LayerId::new)
        .collect::<strata_core::Result<Vec<_>>>()?;

    let store = driver.store().clone();
    let infos = tokio::task::spawn_blocking(move || -> strata_core::Result<Vec<LayerInfo>> {
        ids.iter().map(|id| store.info(id)).collect()
    })
    .await??;

    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}
