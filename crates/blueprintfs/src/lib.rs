//! # blueprintfs
//!
//! Filesystem layer for the blueprint store.
//!
//! ## Contents
//! - **FileSystem**: the primitives the store needs (stat, mkdir, remove-all, rename, ...)
//! - **OsFs / MemoryFs**: host-backed and in-memory implementations
//! - **copy_dir / dir_size**: recursive helpers that work across filesystems
//! - **Blueprint**: a decoded `blueprint.yaml` plus read access to its tree

#![warn(missing_docs)]

mod blueprint;
mod error;
mod fs;
mod memfs;
mod osfs;

pub use blueprint::{decode_manifest, Blueprint, BlueprintManifest, BLUEPRINT_FILE_NAME};
pub use error::{Error, Result};
pub use fs::{copy_dir, dir_size, list_files, DirEntry, FileSystem, FileType, Metadata};
pub use memfs::MemoryFs;
pub use osfs::OsFs;
