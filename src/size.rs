//! Recursive byte-size accounting for snapshot trees.

use crate::error::Result;
use ignore::WalkBuilder;
use std::io;
use std::path::Path;

/// Reports the total size of the regular files under a path.
pub trait SnapshotSizeProbe: Send + Sync {
    fn size_of(&self, path: &Path) -> Result<u64>;
}

/// Walks the tree on every call. Directories and symlinks contribute nothing
/// themselves; symlinks are not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkSizeProbe;

impl WalkSizeProbe {
    pub fn new() -> Self {
        Self
    }
}

impl SnapshotSizeProbe for WalkSizeProbe {
    fn size_of(&self, path: &Path) -> Result<u64> {
        // The root itself must exist; entries below may vanish mid-walk while
        // a receiver renames its temporary files.
        std::fs::symlink_metadata(path)?;

        let walker = WalkBuilder::new(path)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .build();

        let mut total = 0u64;
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(into_io(e).into()),
            };

            if !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }

            match entry.metadata() {
                Ok(meta) => total += meta.len(),
                Err(e) if is_not_found(&e) => continue,
                Err(e) => return Err(into_io(e).into()),
            }
        }

        Ok(total)
    }
}

fn is_not_found(err: &ignore::Error) -> bool {
    err.io_error()
        .map_or(false, |e| e.kind() == io::ErrorKind::NotFound)
}

fn into_io(err: ignore::Error) -> io::Error {
    err.into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "directory walk failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_sums_nested_files() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.bin"), vec![0u8; 100]).unwrap();
        fs::create_dir_all(tmp.path().join("sub/deeper")).unwrap();
        fs::write(tmp.path().join("sub/b.bin"), vec![0u8; 250]).unwrap();
        fs::write(tmp.path().join("sub/deeper/.hidden"), vec![0u8; 7]).unwrap();

        assert_eq!(WalkSizeProbe::new().size_of(tmp.path()).unwrap(), 357);
    }

    #[test]
    fn test_empty_dir_is_zero() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(WalkSizeProbe::new().size_of(tmp.path()).unwrap(), 0);
    }

    #[test]
    fn test_gitignore_not_honored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gitignore"), "*.log\n").unwrap();
        fs::write(tmp.path().join("kept.log"), vec![0u8; 40]).unwrap();

        // .gitignore (6 bytes) + kept.log (40 bytes)
        assert_eq!(WalkSizeProbe::new().size_of(tmp.path()).unwrap(), 46);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_counted() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("big.bin"), vec![0u8; 1000]).unwrap();
        fs::write(tmp.path().join("small.bin"), vec![0u8; 10]).unwrap();
        std::os::unix::fs::symlink(outside.path().join("big.bin"), tmp.path().join("link"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("dirlink")).unwrap();

        assert_eq!(WalkSizeProbe::new().size_of(tmp.path()).unwrap(), 10);
    }

    #[test]
    fn test_missing_root_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(WalkSizeProbe::new()
            .size_of(&tmp.path().join("missing"))
            .is_err());
    }
}
