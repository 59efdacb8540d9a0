//! Copy-up materialization of a layer chain into a work area.

use std::path::Path;

use strata_core::error::Result;
use strata_core::layer::LayerId;

use crate::copy::{copy_tree, CopyStats};
use crate::layout::LayerLayout;
use crate::whiteout;

/// Totals for one materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub layers: usize,
    pub copied: CopyStats,
    pub whiteouts: usize,
}

/// Compose `chain` into `work`.
///
/// `chain` is ordered leaf first, as returned by
/// [`ChainResolver::resolve`](crate::chain::ChainResolver::resolve). Diffs
/// are applied root first so upper layers win, and whiteouts are
/// reconciled after every layer so a deletion only hides what lies below
/// it. On error `work` is left partially merged.
pub fn materialize(layout: &LayerLayout, chain: &[LayerId], work: &Path) -> Result<MaterializeReport> {
    let mut report = MaterializeReport::default();

    for layer in chain.iter().rev() {
        let diff = layout.diff_dir(layer);
        tracing::debug!(
            layer = %layer,
            diff = %diff.display(),
            work = %work.display(),
            "Copying up layer"
        );

        let stats = copy_tree(&diff, work)?;
        let whiteouts = whiteout::reconcile(work, layout.whiteout_prefix())?;

        report.layers += 1;
        report.whiteouts += whiteouts;
        report.copied.files += stats.files;
        report.copied.dirs += stats.dirs;
        report.copied.symlinks += stats.symlinks;
        report.copied.special += stats.special;
        report.copied.bytes += stats.bytes;
    }

    Ok(report)
}
