//! Blueprint decoding
//!
//! A blueprint is a directory tree with a `blueprint.yaml` manifest at its
//! root. Decoding reads the manifest and keeps a handle on the tree so
//! auxiliary files can be read lazily.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fs::{list_files, FileSystem};

/// File name of the blueprint manifest inside a blueprint directory
pub const BLUEPRINT_FILE_NAME: &str = "blueprint.yaml";

/// Decoded `blueprint.yaml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlueprintManifest {
    /// API version of the manifest
    #[serde(default)]
    pub api_version: String,

    /// Manifest kind, normally `Blueprint`
    #[serde(default)]
    pub kind: String,

    /// Free-form annotations
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Every other top-level field, kept verbatim
    #[serde(flatten)]
    pub spec: BTreeMap<String, serde_yaml::Value>,
}

/// Decode manifest bytes
pub fn decode_manifest(bytes: &[u8]) -> Result<BlueprintManifest> {
    let manifest: BlueprintManifest = serde_yaml::from_slice(bytes)?;
    Ok(manifest)
}

/// A decoded blueprint together with read access to its directory tree
#[derive(Clone)]
pub struct Blueprint {
    manifest: BlueprintManifest,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
}

impl Blueprint {
    /// Decode the blueprint rooted at `root` on `fs`
    pub fn from_path(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let bytes = fs.read(&root.join(BLUEPRINT_FILE_NAME))?;
        let manifest = decode_manifest(&bytes)?;
        Ok(Self { manifest, fs, root })
    }

    /// Decoded manifest
    pub fn manifest(&self) -> &BlueprintManifest {
        &self.manifest
    }

    /// Shortcut for the manifest annotations
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.manifest.annotations
    }

    /// Filesystem holding the blueprint tree
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Root directory of the blueprint tree on [`Blueprint::fs`]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a file relative to the blueprint root
    pub fn read_file(&self, rel: impl AsRef<Path>) -> Result<Vec<u8>> {
        let rel = rel.as_ref();
        if !rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::InvalidPath(rel.to_path_buf()));
        }
        self.fs.read(&self.root.join(rel))
    }

    /// Relative paths of every file in the tree
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        list_files(self.fs.as_ref(), &self.root)
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blueprint")
            .field("manifest", &self.manifest)
            .field("root", &self.root)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryFs;

    const MANIFEST: &str = "\
apiVersion: landscaper.gardener.cloud/v1alpha1
kind: Blueprint
annotations:
  test: cached
imports:
  - name: cluster
";

    fn blueprint_fs() -> Arc<MemoryFs> {
        let fs = Arc::new(MemoryFs::new());
        fs.create_dir_all(Path::new("/bp/data")).unwrap();
        fs.write(Path::new("/bp/blueprint.yaml"), MANIFEST.as_bytes())
            .unwrap();
        fs.write(Path::new("/bp/data/values"), b"abc").unwrap();
        fs
    }

    #[test]
    fn test_decode_manifest() {
        let manifest = decode_manifest(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.kind, "Blueprint");
        assert_eq!(manifest.annotations.get("test").map(String::as_str), Some("cached"));
        assert!(manifest.spec.contains_key("imports"));
    }

    #[test]
    fn test_decode_invalid_yaml() {
        let result = decode_manifest(b"annotations: [unterminated");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_from_path() {
        let bp = Blueprint::from_path(blueprint_fs(), "/bp").unwrap();
        assert_eq!(bp.annotations().get("test").map(String::as_str), Some("cached"));
        assert_eq!(bp.read_file("data/values").unwrap(), b"abc");
        assert_eq!(
            bp.files().unwrap(),
            vec![PathBuf::from("blueprint.yaml"), PathBuf::from("data/values")]
        );
    }

    #[test]
    fn test_from_path_without_manifest() {
        let fs = Arc::new(MemoryFs::new());
        fs.create_dir(Path::new("/empty")).unwrap();
        let err = Blueprint::from_path(fs, "/empty").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_read_file_rejects_escape() {
        let bp = Blueprint::from_path(blueprint_fs(), "/bp").unwrap();
        assert!(matches!(
            bp.read_file("../secret"),
            Err(Error::InvalidPath(_))
        ));
    }
}
