use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use strata_types::EntityId;

use crate::error::{BlobError, BlobResult};
use crate::model::{Blob, BlobPart};
use crate::traits::BlobRepository;

/// In-memory blob repository backed by two `RwLock<HashMap>` tables.
pub struct InMemoryBlobRepository {
    blobs: RwLock<HashMap<EntityId, Blob>>,
    parts: RwLock<HashMap<EntityId, BlobPart>>,
}

impl InMemoryBlobRepository {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            parts: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blob rows.
    pub fn blob_count(&self) -> usize {
        self.blobs.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Number of part rows.
    pub fn part_count(&self) -> usize {
        self.parts.read().map(|m| m.len()).unwrap_or(0)
    }

    fn read_blobs(&self) -> BlobResult<RwLockReadGuard<'_, HashMap<EntityId, Blob>>> {
        self.blobs.read().map_err(|_| poisoned())
    }

    fn write_blobs(&self) -> BlobResult<RwLockWriteGuard<'_, HashMap<EntityId, Blob>>> {
        self.blobs.write().map_err(|_| poisoned())
    }

    fn read_parts(&self) -> BlobResult<RwLockReadGuard<'_, HashMap<EntityId, BlobPart>>> {
        self.parts.read().map_err(|_| poisoned())
    }

    fn write_parts(&self) -> BlobResult<RwLockWriteGuard<'_, HashMap<EntityId, BlobPart>>> {
        self.parts.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> BlobError {
    BlobError::Backend("lock poisoned".into())
}

impl Default for InMemoryBlobRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl BlobRepository for InMemoryBlobRepository {
    fn put_blob(&self, blob: &Blob) -> BlobResult<()> {
        self.write_blobs()?.insert(blob.id, blob.clone());
        Ok(())
    }

    fn get_blob(&self, id: &EntityId) -> BlobResult<Option<Blob>> {
        Ok(self.read_blobs()?.get(id).cloned())
    }

    fn delete_blob(&self, id: &EntityId) -> BlobResult<bool> {
        Ok(self.write_blobs()?.remove(id).is_some())
    }

    fn put_part(&self, part: &BlobPart) -> BlobResult<()> {
        self.write_parts()?.insert(part.id, part.clone());
        Ok(())
    }

    fn get_part(&self, id: &EntityId) -> BlobResult<Option<BlobPart>> {
        Ok(self.read_parts()?.get(id).cloned())
    }

    fn delete_part(&self, id: &EntityId) -> BlobResult<bool> {
        Ok(self.write_parts()?.remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryBlobRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobRepository")
            .field("blob_count", &self.blob_count())
            .field("part_count", &self.part_count())
            .finish()
    }
}
