//! Recursive directory merge.
//!
//! Copies the contents of one tree over another. Entries already present
//! in the destination are replaced; entries only present in the
//! destination are left alone. Permission bits and ownership are
//! preserved, symlinks are recreated rather than followed, and FIFOs,
//! sockets and device nodes are recreated with `mknod`.
//!
//! Hard links are not tracked: each name of a multiply linked file becomes
//! an independent copy. Modification and access times are not preserved.

use std::ffi::CString;
use std::fs::Metadata;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::Path;

use strata_core::error::{LayerError, Result};

/// Counters for one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub files: u64,
    pub dirs: u64,
    pub symlinks: u64,
    pub special: u64,
    pub bytes: u64,
}

/// Merge the contents of `src` into the existing directory `dst`.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    let mut stats = CopyStats::default();
    copy_dir_contents(src, dst, &mut stats)?;
    Ok(stats)
}

fn copy_dir_contents(src: &Path, dst: &Path, stats: &mut CopyStats) -> Result<()> {
    let read_dir = std::fs::read_dir(src).map_err(|e| LayerError::io("read directory", src, e))?;

    for entry in read_dir {
        let entry = entry.map_err(|e| LayerError::io("read directory entry", src, e))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let meta = std::fs::symlink_metadata(&src_path)
            .map_err(|e| LayerError::io("stat", &src_path, e))?;
        let file_type = meta.file_type();

        if file_type.is_dir() {
            ensure_dir(&dst_path)?;
            copy_dir_contents(&src_path, &dst_path, stats)?;
            // Applied after the children so read-only directories can be filled.
            std::fs::set_permissions(&dst_path, std::fs::Permissions::from_mode(meta.mode()))
                .map_err(|e| LayerError::io("set permissions", &dst_path, e))?;
            preserve_owner(&dst_path, &meta)?;
            stats.dirs += 1;
        } else if file_type.is_file() {
            clear_dest(&dst_path)?;
            let copied = std::fs::copy(&src_path, &dst_path)
                .map_err(|e| LayerError::io("copy file", &src_path, e))?;
            preserve_owner(&dst_path, &meta)?;
            stats.files += 1;
            stats.bytes += copied;
        } else if file_type.is_symlink() {
            clear_dest(&dst_path)?;
            let target = std::fs::read_link(&src_path)
                .map_err(|e| LayerError::io("read link", &src_path, e))?;
            std::os::unix::fs::symlink(&target, &dst_path)
                .map_err(|e| LayerError::io("create symlink", &dst_path, e))?;
            preserve_owner(&dst_path, &meta)?;
            stats.symlinks += 1;
        } else {
            clear_dest(&dst_path)?;
            make_node(&dst_path, &meta)?;
            preserve_owner(&dst_path, &meta)?;
            stats.special += 1;
        }
    }

    Ok(())
}

/// Make sure `path` is a writable directory, replacing whatever else is there.
fn ensure_dir(path: &Path) -> Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => {
            if meta.mode() & 0o700 != 0o700 {
                std::fs::set_permissions(path, std::fs::Permissions::from_mode(meta.mode() | 0o700))
                    .map_err(|e| LayerError::io("set permissions", path, e))?;
            }
            return Ok(());
        }
        Ok(_) => std::fs::remove_file(path).map_err(|e| LayerError::io("remove", path, e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(LayerError::io("stat", path, e)),
    }

    std::fs::create_dir(path).map_err(|e| LayerError::io("create directory", path, e))
}

/// Remove whatever is at `path` so a non-directory can take its place.
fn clear_dest(path: &Path) -> Result<()> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(LayerError::io("stat", path, e)),
    };

    result.map_err(|e| LayerError::io("remove", path, e))
}

/// Apply the source owner to `path` when it differs, without following links.
fn preserve_owner(path: &Path, src: &Metadata) -> Result<()> {
    let current =
        std::fs::symlink_metadata(path).map_err(|e| LayerError::io("stat", path, e))?;
    if current.uid() == src.uid() && current.gid() == src.gid() {
        return Ok(());
    }

    std::os::unix::fs::lchown(path, Some(src.uid()), Some(src.gid()))
        .map_err(|e| LayerError::io("change owner", path, e))
}

/// Recreate a FIFO, socket or device node.
fn make_node(path: &Path, src: &Metadata) -> Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| {
        LayerError::io(
            "create node",
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path contains NUL"),
        )
    })?;

    // SAFETY: c_path is a valid NUL-terminated string for the duration of the call.
    let rc = unsafe {
        libc::mknod(
            c_path.as_ptr(),
            src.mode() as libc::mode_t,
            src.rdev() as libc::dev_t,
        )
    };
    if rc != 0 {
        return Err(LayerError::io(
            "create node",
            path,
            std::io::Error::last_os_error(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn read(root: &Path, rel: &str) -> String {
        fs::read_to_string(root.join(rel)).unwrap()
    }

    fn dirs(tmp: &TempDir) -> (std::path::PathBuf, std::path::PathBuf) {
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&dst).unwrap();
        (src, dst)
    }

    #[test]
    fn test_hard_links_become_independent_copies() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&src, "a", "shared");
        fs::hard_link(src.join("a"), src.join("b")).unwrap();

        let stats = copy_tree(&src, &dst).unwrap();

        assert_eq!(stats.files, 2);
        assert_eq!(fs::metadata(dst.join("a")).unwrap().nlink(), 1);
        fs::write(dst.join("a"), "changed").unwrap();
        assert_eq!(read(&dst, "b"), "shared");
    }

    #[test]
    fn test_copies_nested_files() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&src, "a", "1");
        write(&src, "dir/sub/f", "y");

        let stats = copy_tree(&src, &dst).unwrap();

        assert_eq!(read(&dst, "a"), "1");
        assert_eq!(read(&dst, "dir/sub/f"), "y");
        assert_eq!(stats.files, 2);
        assert_eq!(stats.dirs, 2);
        assert_eq!(stats.bytes, 2);
    }

    #[test]
    fn test_merge_overwrites_and_keeps_existing() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&dst, "a", "old");
        write(&dst, "keep", "k");
        write(&dst, "dir/lower", "l");
        write(&src, "a", "new");
        write(&src, "dir/upper", "u");

        copy_tree(&src, &dst).unwrap();

        assert_eq!(read(&dst, "a"), "new");
        assert_eq!(read(&dst, "keep"), "k");
        assert_eq!(read(&dst, "dir/lower"), "l");
        assert_eq!(read(&dst, "dir/upper"), "u");
    }

    #[test]
    fn test_file_replaces_directory_and_back() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&dst, "x/inner", "i");
        write(&dst, "y", "file");
        write(&src, "x", "now a file");
        write(&src, "y/inner", "now a dir");

        copy_tree(&src, &dst).unwrap();

        assert_eq!(read(&dst, "x"), "now a file");
        assert!(dst.join("y").is_dir());
        assert_eq!(read(&dst, "y/inner"), "now a dir");
    }

    #[test]
    fn test_preserves_permission_bits() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&src, "bin/tool", "#!/bin/sh");
        fs::set_permissions(src.join("bin/tool"), fs::Permissions::from_mode(0o751)).unwrap();
        fs::set_permissions(src.join("bin"), fs::Permissions::from_mode(0o711)).unwrap();

        copy_tree(&src, &dst).unwrap();

        let file_mode = fs::metadata(dst.join("bin/tool")).unwrap().mode() & 0o7777;
        let dir_mode = fs::metadata(dst.join("bin")).unwrap().mode() & 0o7777;
        assert_eq!(file_mode, 0o751);
        assert_eq!(dir_mode, 0o711);
    }

    #[test]
    fn test_read_only_directory_is_filled() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&src, "ro/f", "data");
        fs::set_permissions(src.join("ro"), fs::Permissions::from_mode(0o555)).unwrap();

        copy_tree(&src, &dst).unwrap();
        assert_eq!(read(&dst, "ro/f"), "data");

        // Let TempDir clean up.
        fs::set_permissions(src.join("ro"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::set_permissions(dst.join("ro"), fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_symlinks_are_recreated_not_followed() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&src, "target", "t");
        std::os::unix::fs::symlink("target", src.join("link")).unwrap();
        std::os::unix::fs::symlink("/nonexistent/elsewhere", src.join("dangling")).unwrap();

        let stats = copy_tree(&src, &dst).unwrap();

        assert_eq!(fs::read_link(dst.join("link")).unwrap(), Path::new("target"));
        assert_eq!(
            fs::read_link(dst.join("dangling")).unwrap(),
            Path::new("/nonexistent/elsewhere")
        );
        assert_eq!(stats.symlinks, 2);
    }

    #[test]
    fn test_symlink_replaces_directory() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        write(&dst, "lib/libc.so", "elf");
        std::os::unix::fs::symlink("usr/lib", src.join("lib")).unwrap();

        copy_tree(&src, &dst).unwrap();

        let meta = fs::symlink_metadata(dst.join("lib")).unwrap();
        assert!(meta.file_type().is_symlink());
    }

    #[test]
    fn test_fifo_is_recreated() {
        let tmp = TempDir::new().unwrap();
        let (src, dst) = dirs(&tmp);
        let fifo = CString::new(src.join("pipe").as_os_str().as_bytes()).unwrap();
        // SAFETY: fifo is a valid C string.
        assert_eq!(unsafe { libc::mkfifo(fifo.as_ptr(), 0o644) }, 0);

        let stats = copy_tree(&src, &dst).unwrap();

        use std::os::unix::fs::FileTypeExt;
        assert!(fs::symlink_metadata(dst.join("pipe"))
            .unwrap()
            .file_type()
            .is_fifo());
        assert_eq!(stats.special, 1);
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let err = copy_tree(&tmp.path().join("nope"), tmp.path()).unwrap_err();
        assert!(matches!(err, LayerError::Io { .. }));
    }
}
