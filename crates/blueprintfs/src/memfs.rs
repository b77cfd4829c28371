//! In-memory filesystem
//!
//! A flat map from normalized absolute path to node. Relative paths resolve
//! against `/`; `..` may not climb above the root.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::fs::{DirEntry, FileSystem, FileType, Metadata};

const TEMP_ROOT: &str = "/tmp";

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

impl Node {
    fn metadata(&self) -> Metadata {
        match self {
            Node::Dir { modified } => Metadata {
                file_type: FileType::Dir,
                len: 0,
                modified: *modified,
            },
            Node::File { data, modified } => Metadata {
                file_type: FileType::File,
                len: data.len() as u64,
                modified: *modified,
            },
        }
    }

    fn is_dir(&self) -> bool {
        matches!(self, Node::Dir { .. })
    }
}

/// Filesystem that lives entirely in memory
#[derive(Debug)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
    temp_counter: AtomicU64,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only `/`
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathBuf::from("/"),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Self {
            nodes: RwLock::new(nodes),
            temp_counter: AtomicU64::new(0),
        }
    }

    fn require_dir(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Result<()> {
        match nodes.get(path) {
            Some(node) if node.is_dir() => Ok(()),
            Some(_) => Err(Error::NotADirectory(path.to_path_buf())),
            None => Err(Error::NotFound(path.to_path_buf())),
        }
    }

    fn require_parent(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> Result<()> {
        match path.parent() {
            Some(parent) => Self::require_dir(nodes, parent),
            None => Err(Error::InvalidPath(path.to_path_buf())),
        }
    }
}

/// Resolve `path` to an absolute path without `.`/`..` components
fn normalize(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::from("/");
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(name) => out.push(name),
            Component::ParentDir => {
                if !out.pop() {
                    return Err(Error::InvalidPath(path.to_path_buf()));
                }
            }
            Component::Prefix(_) => return Err(Error::InvalidPath(path.to_path_buf())),
        }
    }
    Ok(out)
}

impl FileSystem for MemoryFs {
    fn metadata(&self, path: &Path) -> Result<Metadata> {
        let path = normalize(path)?;
        self.nodes
            .read()
            .get(&path)
            .map(Node::metadata)
            .ok_or(Error::NotFound(path))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let path = normalize(path)?;
        let nodes = self.nodes.read();
        Self::require_dir(&nodes, &path)?;

        let entries = nodes
            .iter()
            .filter(|(key, _)| key.parent() == Some(path.as_path()))
            .filter_map(|(key, node)| {
                key.file_name().map(|name| DirEntry {
                    name: name.to_string_lossy().into_owned(),
                    metadata: node.metadata(),
                })
            })
            .collect();
        Ok(entries)
    }

    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let path = normalize(path)?;
        match self.nodes.read().get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(Error::IsADirectory(path)),
            None => Err(Error::NotFound(path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write();
        Self::require_parent(&nodes, &path)?;
        if nodes.get(&path).is_some_and(Node::is_dir) {
            return Err(Error::IsADirectory(path));
        }
        nodes.insert(
            path,
            Node::File {
                data: contents.to_vec(),
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write();
        if nodes.contains_key(&path) {
            return Err(Error::AlreadyExists(path));
        }
        Self::require_parent(&nodes, &path)?;
        nodes.insert(
            path,
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write();
        let now = SystemTime::now();

        // ancestors() yields the path itself first; walk from the root down
        let mut missing = Vec::new();
        for ancestor in path.ancestors() {
            match nodes.get(ancestor) {
                Some(node) if node.is_dir() => break,
                Some(_) => return Err(Error::NotADirectory(ancestor.to_path_buf())),
                None => missing.push(ancestor.to_path_buf()),
            }
        }
        for dir in missing.into_iter().rev() {
            nodes.insert(dir, Node::Dir { modified: now });
        }
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write();
        match nodes.get(&path) {
            Some(Node::File { .. }) => {
                nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(Error::IsADirectory(path)),
            None => Err(Error::NotFound(path)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let path = normalize(path)?;
        if path.parent().is_none() {
            return Err(Error::InvalidPath(path));
        }
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(&path) {
            return Err(Error::NotFound(path));
        }
        nodes.retain(|key, _| !key.starts_with(&path));
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let from = normalize(from)?;
        let to = normalize(to)?;
        let mut nodes = self.nodes.write();
        if !nodes.contains_key(&from) {
            return Err(Error::NotFound(from));
        }
        if nodes.contains_key(&to) {
            return Err(Error::AlreadyExists(to));
        }
        if to.starts_with(&from) || from.parent().is_none() {
            return Err(Error::InvalidPath(to));
        }
        Self::require_parent(&nodes, &to)?;

        let moved: Vec<PathBuf> = nodes
            .keys()
            .filter(|key| key.starts_with(&from))
            .cloned()
            .collect();
        for old in moved {
            if let (Some(node), Ok(rest)) = (nodes.remove(&old), old.strip_prefix(&from)) {
                let new = if rest.as_os_str().is_empty() {
                    to.clone()
                } else {
                    to.join(rest)
                };
                nodes.insert(new, node);
            }
        }
        Ok(())
    }

    fn temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        self.create_dir_all(Path::new(TEMP_ROOT))?;
        loop {
            let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
            let candidate = Path::new(TEMP_ROOT).join(format!("{}{}", prefix, n));
            match self.create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(Error::AlreadyExists(_)) => continue,
                Err(e) => return Err(e),
            }
        }
    }
}
