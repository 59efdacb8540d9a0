//! `strata ls` command - List layers.

use clap::Args;
use strata_core::LayerInfo;
use strata_runtime::StrataDriver;

use crate::output;

#[derive(Args)]
pub struct LsArgs {
    /// Only display layer IDs
    #[arg(short, long)]
    pub quiet: bool,
}

pub async fn execute(driver: &StrataDriver, args: LsArgs) -> Result<(), Box<dyn std::error::Error>> {
    let store = driver.store().clone();
    let infos = tokio::task::spawn_blocking(move || -> strata_core::Result<Vec<LayerInfo>> {
        store.list()?.iter().map(|id| store.info(id)).collect()
    })
    .await??;

    if args.quiet {
        for info in &infos {
            println!("{}", info.id);
        }
        return Ok(());
    }

    let mut table = output::new_table(&["LAYER ID", "PARENT", "KIND", "REFS", "CHILDREN", "CREATED"]);
    for info in &infos {
        table.add_row([
            info.id.to_string(),
            output::or_dash(info.parent.as_ref()),
            info.kind.to_string(),
            info.references.len().to_string(),
            info.links.len().to_string(),
            output::or_dash(info.created_at.as_ref().map(output::format_ago)),
        ]);
    }
    println!("{table}");
    Ok(())
}
