//! Whiteout reconciliation.
//!
//! An entry named `<prefix><name>` records that `<name>` from a lower
//! layer is deleted. Reconciling a merged tree removes every whited-out
//! path together with its marker.

use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use strata_core::error::{LayerError, Result};

/// Remove every whited-out path under `root`, then the markers themselves.
///
/// Returns the number of markers processed. A target that is already
/// absent is not an error; any other removal failure aborts the walk.
pub fn reconcile(root: &Path, prefix: &str) -> Result<usize> {
    let mut processed = 0;
    reconcile_dir(root, prefix.as_bytes(), &mut processed)?;
    Ok(processed)
}

fn reconcile_dir(dir: &Path, prefix: &[u8], processed: &mut usize) -> Result<()> {
    let read_dir = std::fs::read_dir(dir).map_err(|e| LayerError::io("read directory", dir, e))?;

    let mut markers = Vec::new();
    let mut subdirs = Vec::new();
    for entry in read_dir {
        let entry = entry.map_err(|e| LayerError::io("read directory entry", dir, e))?;
        let name = entry.file_name();
        if name.as_bytes().starts_with(prefix) {
            markers.push(name);
            continue;
        }
        let file_type = entry
            .file_type()
            .map_err(|e| LayerError::io("stat", entry.path(), e))?;
        if file_type.is_dir() {
            subdirs.push(entry.path());
        }
    }

    for marker in markers {
        let target = &marker.as_bytes()[prefix.len()..];
        if names_entry(target) {
            remove_path(&dir.join(OsStr::from_bytes(target)))?;
        }
        remove_path(&dir.join(&marker))?;
        *processed += 1;

        tracing::trace!(
            dir = %dir.display(),
            target = %String::from_utf8_lossy(target),
            "Applied whiteout"
        );
    }

    for subdir in subdirs {
        // May have been whited out above.
        if is_real_dir(&subdir) {
            reconcile_dir(&subdir, prefix, processed)?;
        }
    }

    Ok(())
}

/// `.` and `..` never name an entry of the marker's directory.
fn names_entry(target: &[u8]) -> bool {
    !matches!(target, b"" | b"." | b"..")
}

fn is_real_dir(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

/// Remove a file, link or directory tree; a missing path is a no-op.
fn remove_path(path: &Path) -> Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(LayerError::io("stat", path, e)),
    };

    match result {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => {
            Err(LayerError::io("remove whiteout target", path, e))
        }
        _ => Ok(()),
    }
}
