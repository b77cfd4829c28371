//! Blueprint archive import and export
//!
//! Imports accept plain tar and gzip-compressed tar. The blueprint root is
//! either the archive root or its single top-level directory.

use anyhow::{Context, Result};
use blueprintfs::{Blueprint, OsFs, BLUEPRINT_FILE_NAME};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::{Archive, Builder, EntryType, Header};
use tempfile::TempDir;
use tracing::{debug, info};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// An archive extracted into a temporary directory.
///
/// The directory is deleted on drop, so keep this alive until the blueprint
/// has been stored.
#[derive(Debug)]
pub struct ExtractedBlueprint {
    _dir: TempDir,
    root: PathBuf,
}

impl ExtractedBlueprint {
    /// Root of the blueprint tree
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Decode the extracted blueprint
    pub fn blueprint(&self) -> Result<Blueprint> {
        Blueprint::from_path(Arc::new(OsFs), &self.root)
            .with_context(|| format!("Failed to decode blueprint in {:?}", self.root))
    }
}

/// Extract a tar or tar.gz blueprint archive
pub fn extract_archive<P: AsRef<Path>>(path: P) -> Result<ExtractedBlueprint> {
    let path = path.as_ref();
    let mut file = File::open(path).context(format!("Failed to open archive: {:?}", path))?;

    let mut magic = [0u8; 2];
    let compressed = file.read_exact(&mut magic).is_ok() && magic == GZIP_MAGIC;
    file.seek(SeekFrom::Start(0))
        .context("Failed to rewind archive")?;

    let dir = tempfile::Builder::new()
        .prefix("bpcd-import-")
        .tempdir()
        .context("Failed to create temporary extraction directory")?;

    let unpacked = if compressed {
        Archive::new(GzDecoder::new(file)).unpack(dir.path())
    } else {
        Archive::new(file).unpack(dir.path())
    };
    unpacked.context(format!("Failed to extract archive: {:?}", path))?;

    let root = locate_root(dir.path())?;
    debug!("Extracted {:?} to {:?}", path, root);
    Ok(ExtractedBlueprint { _dir: dir, root })
}

fn locate_root(dir: &Path) -> Result<PathBuf> {
    if dir.join(BLUEPRINT_FILE_NAME).is_file() {
        return Ok(dir.to_path_buf());
    }

    let entries = fs::read_dir(dir)
        .context("Failed to read extraction directory")?
        .collect::<std::io::Result<Vec<_>>>()
        .context("Failed to read directory entry")?;
    if let [single] = entries.as_slice() {
        let candidate = single.path();
        if candidate.join(BLUEPRINT_FILE_NAME).is_file() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("Archive does not contain a {}", BLUEPRINT_FILE_NAME)
}

/// Write `blueprint` as a tar.gz archive to `dest`, returning the archive size
pub fn export_blueprint<P: AsRef<Path>>(blueprint: &Blueprint, dest: P) -> Result<u64> {
    let dest = dest.as_ref();
    let file = File::create(dest).context(format!("Failed to create archive: {:?}", dest))?;
    let mut tar = Builder::new(GzEncoder::new(file, Compression::default()));
    let mtime = u64::try_from(Utc::now().timestamp()).unwrap_or(0);

    for rel in blueprint.files().context("Failed to list blueprint files")? {
        let data = blueprint
            .read_file(&rel)
            .context(format!("Failed to read blueprint file: {:?}", rel))?;
        debug!("Adding {:?} ({} bytes)", rel, data.len());

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        tar.append_data(&mut header, &rel, data.as_slice())
            .context(format!("Failed to add file to archive: {:?}", rel))?;
    }

    tar.into_inner()
        .and_then(|encoder| encoder.finish())
        .context("Failed to finalize archive")?;

    let size = fs::metadata(dest)?.len();
    info!("Exported blueprint to {:?} ({} bytes)", dest, size);
    Ok(size)
}
