//! Filesystem abstraction
//!
//! Paths handed to a [`FileSystem`] are absolute within that filesystem.
//! [`copy_dir`] and [`dir_size`] work across any two implementations, so a
//! tree can be copied from disk into memory and back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{Error, Result};

/// Kind of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Dir,
}

/// Metadata of a filesystem node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    /// Node kind
    pub file_type: FileType,
    /// Length in bytes (0 for directories)
    pub len: u64,
    /// Last modification time
    pub modified: SystemTime,
}

impl Metadata {
    /// Whether the node is a directory
    pub fn is_dir(&self) -> bool {
        self.file_type == FileType::Dir
    }

    /// Whether the node is a regular file
    pub fn is_file(&self) -> bool {
        self.file_type == FileType::File
    }
}

/// A single entry returned by [`FileSystem::read_dir`]
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// File name of the entry (no directory part)
    pub name: String,
    /// Metadata of the entry
    pub metadata: Metadata,
}

/// Filesystem primitives the blueprint store is built on
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Stat a path
    fn metadata(&self, path: &Path) -> Result<Metadata>;

    /// List a directory, sorted by name
    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Read a whole file
    fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Create or truncate a file with the given contents
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Create a single directory; the parent must exist
    fn create_dir(&self, path: &Path) -> Result<()>;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a single file
    fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and everything below it
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Move a file or directory; `to` must not exist
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Create a fresh, uniquely named directory for scratch data
    fn temp_dir(&self, prefix: &str) -> Result<PathBuf>;

    /// Whether a path exists. Errors other than not-found are returned.
    fn exists(&self, path: &Path) -> Result<bool> {
        match self.metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Recursively copy the directory `src_path` of `src` to `dst_path` of `dst`.
///
/// `dst_path` is created if missing; existing files below it are overwritten.
pub fn copy_dir(
    src: &dyn FileSystem,
    src_path: &Path,
    dst: &dyn FileSystem,
    dst_path: &Path,
) -> Result<()> {
    let meta = src.metadata(src_path)?;
    if !meta.is_dir() {
        return Err(Error::NotADirectory(src_path.to_path_buf()));
    }
    dst.create_dir_all(dst_path)?;

    for entry in src.read_dir(src_path)? {
        let from = src_path.join(&entry.name);
        let to = dst_path.join(&entry.name);
        if entry.metadata.is_dir() {
            copy_dir(src, &from, dst, &to)?;
        } else {
            let contents = src.read(&from)?;
            dst.write(&to, &contents)?;
        }
    }
    Ok(())
}

/// Total size in bytes of all files below `path`
pub fn dir_size(fs: &dyn FileSystem, path: &Path) -> Result<u64> {
    let mut size = 0;
    for entry in fs.read_dir(path)? {
        if entry.metadata.is_dir() {
            size += dir_size(fs, &path.join(&entry.name))?;
        } else {
            size += entry.metadata.len;
        }
    }
    Ok(size)
}

/// Relative paths of all files below `path`, in sorted order
pub fn list_files(fs: &dyn FileSystem, path: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_files(fs, path, Path::new(""), &mut files)?;
    Ok(files)
}

fn collect_files(
    fs: &dyn FileSystem,
    base: &Path,
    rel: &Path,
    out: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in fs.read_dir(&base.join(rel))? {
        let child = rel.join(&entry.name);
        if entry.metadata.is_dir() {
            collect_files(fs, base, &child, out)?;
        } else {
            out.push(child);
        }
    }
    Ok(())
}
