//! Error types for bpcache

use std::fmt;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for store operations
#[derive(Debug)]
pub enum Error {
    /// Filesystem or decode error from the backing filesystem
    Fs(blueprintfs::Error),

    /// Cache lookups are disabled
    NotFound,

    /// The store has been closed
    StoreClosed,

    /// Content handed to `put` does not carry a blueprint tree
    UnexpectedContent(String),

    /// Key cannot be used as a directory name
    InvalidKey(String),

    /// Invalid store configuration
    Config(String),

    /// Size or duration string could not be parsed
    Parse(String),

    /// The maintenance thread could not be started
    Worker(std::io::Error),
}

impl Error {
    /// Whether the error means "no such entry"
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound => true,
            Error::Fs(e) => e.is_not_found(),
            _ => false,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fs(e) => write!(f, "{}", e),
            Error::NotFound => write!(f, "NOTFOUND"),
            Error::StoreClosed => write!(f, "STORE_CLOSED"),
            Error::UnexpectedContent(media_type) => {
                write!(f, "Content of type {:?} is not a file system", media_type)
            }
            Error::InvalidKey(key) => write!(f, "Invalid cache key: {:?}", key),
            Error::Config(msg) => write!(f, "Invalid store configuration: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Worker(e) => write!(f, "Unable to start maintenance thread: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fs(e) => Some(e),
            Error::Worker(e) => Some(e),
            _ => None,
        }
    }
}

impl From<blueprintfs::Error> for Error {
    fn from(err: blueprintfs::Error) -> Self {
        Error::Fs(err)
    }
}
