//! `strata rm` command - Remove one or more layers.

use clap::Args;
use strata_runtime::{GraphDriver, StrataDriver};

#[derive(Args)]
pub struct RmArgs {
    /// Layer IDs
    #[arg(required = true)]
    pub ids: Vec<String>,
}

pub async fn execute(driver: &StrataDriver, args: RmArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut errors = Vec::new();

    for id in &args.ids {
        match driver.remove(id).await {
            Ok(()) => println!("{id}"),
            Err(e) => errors.push(format!("{id}: {e}")),
        }
    }

    if !errors.is_empty() {
        return Err(errors.join("\n").into());
    }
    Ok(())
}
