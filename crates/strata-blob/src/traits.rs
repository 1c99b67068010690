use strata_types::EntityId;

use crate::error::BlobResult;
use crate::model::{Blob, BlobPart};

/// Storage for blob rows and their parts.
///
/// Implementations provide plain point reads and writes; ordering and
/// checksumming are the [`BlobStore`](crate::BlobStore)'s concern.
pub trait BlobRepository: Send + Sync {
    /// Insert or overwrite a blob row.
    fn put_blob(&self, blob: &Blob) -> BlobResult<()>;

    /// Returns `Ok(None)` if the blob does not exist.
    fn get_blob(&self, id: &EntityId) -> BlobResult<Option<Blob>>;

    /// Delete a blob row. Returns `true` if it existed.
    fn delete_blob(&self, id: &EntityId) -> BlobResult<bool>;

    fn put_part(&self, part: &BlobPart) -> BlobResult<()>;

    fn get_part(&self, id: &EntityId) -> BlobResult<Option<BlobPart>>;

    fn delete_part(&self, id: &EntityId) -> BlobResult<bool>;
}
