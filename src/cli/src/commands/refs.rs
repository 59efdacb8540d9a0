//! `strata ref` command - Pin and unpin layers by holder token.

use clap::{Args, Subcommand};
use strata_core::LayerId;
use strata_runtime::StrataDriver;

#[derive(Args)]
pub struct RefArgs {
    #[command(subcommand)]
    pub action: RefAction,
}

#[derive(Subcommand)]
pub enum RefAction {
    /// Record a holder in the layer's ref area
    Acquire(HolderArgs),
    /// Drop a holder from the layer's ref area
    Release(HolderArgs),
    /// List the holders of a layer
    Ls(LayerArg),
}

#[derive(Args)]
pub struct HolderArgs {
    /// Layer ID
    pub id: String,

    /// Holder token, e.g. a process or container ID
    pub holder: String,
}

#[derive(Args)]
pub struct LayerArg {
    /// Layer ID
    pub id: String,
}

pub async fn execute(driver: &StrataDriver, args: RefArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = driver.store().clone();

    match args.action {
        RefAction::Acquire(HolderArgs { id, holder }) => {
            let id = LayerId::new(id)?;
            let added = tokio::task::spawn_blocking(move || store.acquire(&id, &holder)).await??;
            if !added {
                tracing::info!("Holder already present");
            }
        }
        RefAction::Release(HolderArgs { id, holder }) => {
            let id = LayerId::new(id)?;
            let removed = tokio::task::spawn_blocking(move || store.release(&id, &holder)).await??;
            if !removed {
                tracing::info!("Holder was not present");
            }
        }
        RefAction::Ls(LayerArg { id }) => {
            let id = LayerId::new(id)?;
            let holders = tokio::task::spawn_blocking(move || store.references(&id)).await??;
            for holder in holders {
                println!("{holder}");
            }
        }
    }
    Ok(())
}
