//! `strata cleanup` command - Remove leftovers of interrupted removals.

use clap::Args;
use strata_runtime::StrataDriver;

#[derive(Args)]
pub struct CleanupArgs {}

pub async fn execute(driver: &StrataDriver, _args: CleanupArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = driver.store().clone();
    let removed = tokio::task::spawn_blocking(move || store.cleanup()).await??;
    println!("Removed {removed} interrupted removal(s)");
    Ok(())
}
