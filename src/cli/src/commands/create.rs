//! `strata create` command - Create a layer.

use clap::Args;
use strata_runtime::{GraphDriver, StrataDriver};

#[derive(Args)]
pub struct CreateArgs {
    /// Layer ID
    pub id: String,

    /// Parent layer ID (omit for a root layer)
    #[arg(short, long, default_value = "")]
    pub parent: String,

    /// Create a read-write layer populated from its ancestry
    #[arg(long)]
    pub rw: bool,
}

pub async fn execute(driver: &StrataDriver, args: CreateArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.rw {
        driver.create_read_write(&args.id, &args.parent).await?;
    } else {
        driver.create(&args.id, &args.parent).await?;
    }
    println!("{}", args.id);
    Ok(())
}
