//! Filesystem backed by the host operating system

use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::fs::{DirEntry, FileSystem, FileType, Metadata};

/// Pass-through to `std::fs`; paths are host paths
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFs;

impl OsFs {
    /// Create a handle to the host filesystem
    pub fn new() -> Self {
        OsFs
    }
}

fn convert(meta: &fs::Metadata) -> Metadata {
    Metadata {
        file_type: if meta.is_dir() {
            FileType::Dir
        } else {
            FileType::File
        },
        len: if meta.is_dir() { 0 } else { meta.len() },
        modified: meta.modified().unwrap_or(UNIX_EPOCH),
    }
}

impl FileSystem for OsFs {
    fn metadata(&self, path: &Path) -> Result<Metadata> {
        fs::metadata(path)
            .map(|meta| convert(&meta))
            .map_err(|e| Error::from_io(e, path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| Error::from_io(e, path))? {
            let entry = entry?;
            // follows symlinks, so a linked directory is copied as a directory
            let meta = fs::metadata(entry.path()).map_err(|e| Error::from_io(e, &entry.path()))?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                metadata: convert(&meta),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|e| Error::from_io(e, path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        fs::write(path, contents).map_err(|e| Error::from_io(e, path))
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        fs::create_dir(path).map_err(|e| Error::from_io(e, path))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).map_err(|e| Error::from_io(e, path))
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| Error::from_io(e, path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        fs::remove_dir_all(path).map_err(|e| Error::from_io(e, path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        if to.exists() {
            return Err(Error::AlreadyExists(to.to_path_buf()));
        }
        fs::rename(from, to).map_err(|e| Error::from_io(e, from))
    }

    #[allow(deprecated)] // into_path is called keep() on newer tempfile releases
    fn temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        let dir = tempfile::Builder::new().prefix(prefix).tempdir()?;
        Ok(dir.into_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::{copy_dir, dir_size};
    use crate::MemoryFs;
    use tempfile::TempDir;

    #[test]
    fn test_basic_operations() {
        let dir = TempDir::new().unwrap();
        let fs = OsFs::new();
        let root = dir.path();

        fs.create_dir_all(&root.join("a/b")).unwrap();
        fs.write(&root.join("a/b/file"), b"content").unwrap();

        let meta = fs.metadata(&root.join("a/b/file")).unwrap();
        assert!(meta.is_file());
        assert_eq!(meta.len, 7);

        let names: Vec<_> = fs
            .read_dir(&root.join("a"))
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["b"]);

        fs.remove_dir_all(&root.join("a")).unwrap();
        assert!(!fs.exists(&root.join("a")).unwrap());
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let dir = TempDir::new().unwrap();
        let fs = OsFs::new();

        let err = fs.metadata(&dir.path().join("nope")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rename_refuses_existing_target() {
        let dir = TempDir::new().unwrap();
        let fs = OsFs::new();
        fs.create_dir(&dir.path().join("a")).unwrap();
        fs.create_dir(&dir.path().join("b")).unwrap();

        let result = fs.rename(&dir.path().join("a"), &dir.path().join("b"));
        assert!(matches!(result, Err(Error::AlreadyExists(_))));
    }

    #[test]
    fn test_copy_from_memory_to_disk() {
        let dir = TempDir::new().unwrap();
        let mem = MemoryFs::new();
        mem.create_dir_all(Path::new("/bp/data")).unwrap();
        mem.write(Path::new("/bp/blueprint.yaml"), b"kind: Blueprint\n").unwrap();
        mem.write(Path::new("/bp/data/blob"), &[7u8; 64]).unwrap();

        let target = dir.path().join("entry");
        copy_dir(&mem, Path::new("/bp"), &OsFs, &target).unwrap();

        assert_eq!(dir_size(&OsFs, &target).unwrap(), 16 + 64);
        assert_eq!(std::fs::read(target.join("data/blob")).unwrap(), vec![7u8; 64]);
    }

    #[test]
    fn test_temp_dir() {
        let fs = OsFs::new();
        let path = fs.temp_dir("blueprintfs-test").unwrap();
        assert!(path.is_dir());
        std::fs::remove_dir_all(path).unwrap();
    }
}
