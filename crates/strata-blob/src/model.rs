use serde::{Deserialize, Serialize};
use strata_types::EntityId;

/// URL scheme of content held in the blob store.
pub const INTERNAL_SCHEME: &str = "cassandra";

/// A stored binary object: an ordered list of parts plus a streaming
/// SHA-256 over their concatenated bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub id: EntityId,
    pub parts: Vec<EntityId>,
    pub size: u64,
    /// Lowercase hex SHA-256. Empty until the upload finishes.
    pub hash: String,
}

impl Blob {
    /// A blob row with no parts yet.
    pub fn empty(id: EntityId) -> Self {
        Self {
            id,
            parts: Vec::new(),
            size: 0,
            hash: String::new(),
        }
    }

    /// Internal url referencing this blob, `cassandra://<id>`.
    pub fn url(&self) -> String {
        internal_url(&self.id)
    }

    /// `true` once the upload has been finalized.
    pub fn is_complete(&self) -> bool {
        !self.hash.is_empty()
    }
}

/// Internal url for a blob id.
pub fn internal_url(id: &EntityId) -> String {
    format!("{INTERNAL_SCHEME}://{id}")
}

/// One immutable chunk of a blob.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobPart {
    pub id: EntityId,
    pub content: Vec<u8>,
    /// `content` is a zip archive holding a single member named `data`.
    pub compressed: bool,
    pub blob_id: EntityId,
}

impl BlobPart {
    pub fn new(blob_id: EntityId, content: Vec<u8>) -> Self {
        Self {
            id: EntityId::new(),
            content,
            compressed: false,
            blob_id,
        }
    }

    pub fn compressed(blob_id: EntityId, archive: Vec<u8>) -> Self {
        Self {
            compressed: true,
            ..Self::new(blob_id, archive)
        }
    }
}

impl std::fmt::Debug for BlobPart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobPart")
            .field("id", &self.id)
            .field("len", &self.content.len())
            .field("compressed", &self.compressed)
            .field("blob_id", &self.blob_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_uses_internal_scheme() {
        let blob = Blob::empty(EntityId::new());
        assert_eq!(blob.url(), format!("cassandra://{}", blob.id));
        assert!(!blob.is_complete());
    }

    #[test]
    fn part_debug_hides_bytes() {
        let part = BlobPart::new(EntityId::new(), vec![7; 4096]);
        let dbg = format!("{part:?}");
        assert!(dbg.contains("len: 4096"));
        assert!(!dbg.contains("7, 7"));
    }
}
