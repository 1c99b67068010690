use std::io::{ErrorKind, Read};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use strata_types::EntityId;
use tracing::{debug, warn};

use crate::archive::unpack_member;
use crate::error::{BlobError, BlobResult};
use crate::model::{Blob, BlobPart};
use crate::traits::BlobRepository;

/// Default part size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Streams content into fixed-size parts and reassembles it.
///
/// The `Blob` row is written before any part and finalized with its hash
/// only after the last part is stored, so an interrupted upload leaves an
/// incomplete orphan that nothing references.
#[derive(Clone)]
pub struct BlobStore {
    repo: Arc<dyn BlobRepository>,
    chunk_size: usize,
}

impl BlobStore {
    pub fn new(repo: Arc<dyn BlobRepository>) -> Self {
        Self {
            repo,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Override the part size. Zero is ignored.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.chunk_size = chunk_size;
        }
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn repository(&self) -> &Arc<dyn BlobRepository> {
        &self.repo
    }

    /// Store everything `reader` yields as a new blob.
    ///
    /// `declared_size` is informational; the stored size is the number of
    /// bytes actually read.
    pub fn create_from_stream<R: Read>(&self, mut reader: R, declared_size: u64) -> BlobResult<Blob> {
        let mut blob = Blob::empty(EntityId::new());
        self.repo.put_blob(&blob)?;

        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let filled = fill_chunk(&mut reader, &mut buf)?;
            if filled == 0 {
                break;
            }
            let chunk = &buf[..filled];
            let part = BlobPart::new(blob.id, chunk.to_vec());
            self.repo.put_part(&part)?;
            hasher.update(chunk);
            blob.parts.push(part.id);
            blob.size += filled as u64;
            if filled < buf.len() {
                break;
            }
        }

        blob.hash = hex::encode(hasher.finalize());
        if blob.size != declared_size {
            warn!(
                blob = %blob.id,
                declared = declared_size,
                actual = blob.size,
                "stream size differs from declared size"
            );
        }
        self.repo.put_blob(&blob)?;
        debug!(blob = %blob.id, parts = blob.parts.len(), size = blob.size, "blob stored");
        Ok(blob)
    }

    /// Store an in-memory buffer.
    pub fn create_from_bytes(&self, data: &[u8]) -> BlobResult<Blob> {
        self.create_from_stream(data, data.len() as u64)
    }

    pub fn find(&self, id: &EntityId) -> BlobResult<Option<Blob>> {
        self.repo.get_blob(id)
    }

    pub fn get(&self, id: &EntityId) -> BlobResult<Blob> {
        self.find(id)?.ok_or(BlobError::NotFound(*id))
    }

    /// Lazily yield the blob's parts in stored order, decompressing
    /// compressed parts.
    pub fn chunk_content(&self, blob: &Blob) -> ChunkIter<'_> {
        ChunkIter {
            repo: self.repo.as_ref(),
            blob_id: blob.id,
            parts: blob.parts.clone(),
            next: 0,
        }
    }

    /// Concatenate every chunk.
    pub fn read_all(&self, blob: &Blob) -> BlobResult<Vec<u8>> {
        let mut out = Vec::with_capacity(blob.size as usize);
        for chunk in self.chunk_content(blob) {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Delete every part of the blob, then the blob row. Returns `false`
    /// when the blob did not exist.
    pub fn delete_blob(&self, id: &EntityId) -> BlobResult<bool> {
        let Some(blob) = self.repo.get_blob(id)? else {
            return Ok(false);
        };
        for part in &blob.parts {
            self.repo.delete_part(part)?;
        }
        let existed = self.repo.delete_blob(id)?;
        debug!(blob = %id, parts = blob.parts.len(), "blob deleted");
        Ok(existed)
    }

    /// Recompute the checksum over the stored parts.
    ///
    /// Returns `Err(HashMismatch)` if the content no longer matches.
    pub fn verify(&self, id: &EntityId) -> BlobResult<()> {
        let blob = self.get(id)?;
        let mut hasher = Sha256::new();
        for chunk in self.chunk_content(&blob) {
            hasher.update(chunk?);
        }
        let computed = hex::encode(hasher.finalize());
        if computed != blob.hash {
            return Err(BlobError::HashMismatch {
                id: *id,
                expected: blob.hash,
                computed,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobStore")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}

/// Read until `buf` is full or the reader is exhausted.
fn fill_chunk<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Single-pass iterator over a blob's content.
pub struct ChunkIter<'a> {
    repo: &'a dyn BlobRepository,
    blob_id: EntityId,
    parts: Vec<EntityId>,
    next: usize,
}

impl Iterator for ChunkIter<'_> {
    type Item = BlobResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        let part_id = *self.parts.get(self.next)?;
        self.next += 1;
        let part = match self.repo.get_part(&part_id) {
            Ok(Some(part)) => part,
            Ok(None) => {
                return Some(Err(BlobError::MissingPart {
                    blob: self.blob_id,
                    part: part_id,
                }))
            }
            Err(e) => return Some(Err(e)),
        };
        if part.compressed {
            Some(unpack_member(&part.content))
        } else {
            Some(Ok(part.content))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.parts.len() - self.next;
        (left, Some(left))
    }
}
