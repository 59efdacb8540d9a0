//! `strata status` command - Show driver status.

use clap::Args;
use strata_runtime::{GraphDriver, StrataDriver};

#[derive(Args)]
pub struct StatusArgs {}

pub async fn execute(driver: &StrataDriver, _args: StatusArgs) -> Result<(), Box<dyn std::error::Error>> {
    for (key, value) in driver.status().await {
        println!("{key}: {value}");
    }
    Ok(())
}
