//! Cache key derivation and validation
//!
//! A key names the top-level directory of an entry, so it must be a single
//! normal path component. Names starting with `.` are reserved for staging.

use sha2::{Digest, Sha256};

use crate::config::IndexMethod;
use crate::error::{Error, Result};

/// Identity of the component that ships a blueprint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentIdentity {
    /// Raw repository context the component was resolved from
    pub repository_context: Option<Vec<u8>>,
    /// Component name
    pub name: String,
    /// Component version
    pub version: String,
}

/// Identity of the blueprint resource within its component
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceIdentity {
    /// Resource name
    pub name: String,
    /// Resource version
    pub version: String,
}

/// Hex sha256 over the repository context and both identities
pub fn component_identity_key(component: &ComponentIdentity, resource: &ResourceIdentity) -> String {
    let mut hasher = Sha256::new();
    if let Some(ctx) = &component.repository_context {
        hasher.update(ctx);
    }
    hasher.update(
        format!(
            "{}-{}-{}-{}",
            component.name, component.version, resource.name, resource.version
        )
        .as_bytes(),
    );
    hex::encode(hasher.finalize())
}

/// Directory-safe form of a blob digest (`sha256:ab..` becomes `sha256-ab..`)
pub fn digest_key(digest: &str) -> Result<String> {
    let key: String = digest
        .trim()
        .chars()
        .map(|c| if c == ':' || c == '/' || c == '\\' { '-' } else { c })
        .collect();
    validate_key(&key)?;
    Ok(key)
}

/// Derive the key for a blueprint according to `method`.
///
/// `digest` is required for [`IndexMethod::BlueprintDigest`].
pub fn derive_key(
    method: IndexMethod,
    component: &ComponentIdentity,
    resource: &ResourceIdentity,
    digest: Option<&str>,
) -> Result<String> {
    match method {
        IndexMethod::ComponentDescriptorIdentity => Ok(component_identity_key(component, resource)),
        IndexMethod::BlueprintDigest => match digest {
            Some(digest) => digest_key(digest),
            None => Err(Error::InvalidKey(format!(
                "digest of resource {} is required for the digest index",
                resource.name
            ))),
        },
    }
}

/// Name prefix of the directory a `put` is staged in
pub(crate) const STAGING_PREFIX: &str = ".staging-";

/// Longest accepted key in bytes; the staging name must still fit the
/// 255 byte file name limit.
pub const MAX_KEY_LEN: usize = 255 - STAGING_PREFIX.len();

/// Check that a non-empty key is usable as an entry directory name
pub fn validate_key(key: &str) -> Result<()> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && !key.starts_with('.')
        && !key.contains(['/', '\\', '\0']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidKey(key.to_string()))
    }
}
