//! Typed content handed to the store

use blueprintfs::Blueprint;

/// Content type of blueprint trees
pub const BLUEPRINT_TYPE: &str = "blueprint";

/// Resolved resource payload
#[derive(Debug, Clone)]
pub enum Resource {
    /// An extracted blueprint directory tree
    Blueprint(Blueprint),
    /// Opaque bytes that the store cannot hold
    Raw(Vec<u8>),
}

/// A resource payload together with its content type
#[derive(Debug, Clone)]
pub struct TypedContent {
    /// Content type string
    pub content_type: String,
    /// The payload
    pub resource: Resource,
}

impl TypedContent {
    /// Wrap a blueprint tree
    pub fn blueprint(blueprint: Blueprint) -> Self {
        Self {
            content_type: BLUEPRINT_TYPE.to_string(),
            resource: Resource::Blueprint(blueprint),
        }
    }

    /// Wrap opaque bytes
    pub fn raw(content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            content_type: content_type.into(),
            resource: Resource::Raw(bytes),
        }
    }

    /// The blueprint tree, if this content carries one
    pub fn as_blueprint(&self) -> Option<&Blueprint> {
        match &self.resource {
            Resource::Blueprint(bp) => Some(bp),
            Resource::Raw(_) => None,
        }
    }
}
