//! Error types for blueprintfs

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Result type alias for filesystem operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for filesystem operations
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(io::Error),

    /// Path does not exist
    NotFound(PathBuf),

    /// Path already exists
    AlreadyExists(PathBuf),

    /// A directory was expected
    NotADirectory(PathBuf),

    /// A file was expected
    IsADirectory(PathBuf),

    /// Path is malformed or escapes the filesystem root
    InvalidPath(PathBuf),

    /// Blueprint manifest could not be decoded
    Decode(String),
}

impl Error {
    /// Map an I/O error for `path`, keeping not-found and already-exists distinct
    pub fn from_io(err: io::Error, path: &Path) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Error::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => Error::AlreadyExists(path.to_path_buf()),
            _ => Error::Io(err),
        }
    }

    /// Whether the error means the path does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::NotFound(path) => write!(f, "No such file or directory: {}", path.display()),
            Error::AlreadyExists(path) => write!(f, "Path already exists: {}", path.display()),
            Error::NotADirectory(path) => write!(f, "Not a directory: {}", path.display()),
            Error::IsADirectory(path) => write!(f, "Is a directory: {}", path.display()),
            Error::InvalidPath(path) => write!(f, "Invalid path: {}", path.display()),
            Error::Decode(msg) => write!(f, "Unable to decode blueprint definition: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
