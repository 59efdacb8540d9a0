//! `strata exists` command - Exit non-zero when a layer is absent.

use clap::Args;
use strata_runtime::{GraphDriver, StrataDriver};

#[derive(Args)]
pub struct ExistsArgs {
    /// Layer ID
    pub id: String,

    /// Print nothing; report through the exit status only
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(driver: &StrataDriver, args: ExistsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let exists = driver.exists(&args.id).await;
    if !args.quiet {
        println!("{exists}");
    }
    if !exists {
        std::process::exit(1);
    }
    Ok(())
}
