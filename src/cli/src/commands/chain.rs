//! `strata chain` command - Print a layer's ancestry.

use clap::Args;
use strata_core::LayerId;
use strata_runtime::StrataDriver;

#[derive(Args)]
pub struct ChainArgs {
    /// Layer ID
    pub id: String,

    /// Print root first instead of leaf first
    #[arg(long)]
    pub reverse: bool,
}

pub async fn execute(driver: &StrataDriver, args: ChainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let id = LayerId::new(args.id)?;
    let store = driver.store().clone();
    let mut chain = tokio::task::spawn_blocking(move || store.chain(&id)).await??;

    if args.reverse {
        chain.reverse();
    }
    for layer in chain {
        println!("{layer}");
    }
    Ok(())
}
