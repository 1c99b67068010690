//! Chunked, checksummed blob storage for the Strata archive.
//!
//! File content is split into fixed-size immutable [`BlobPart`]s and
//! described by a [`Blob`] row holding the ordered part ids, the total size
//! and a flat SHA-256 over the concatenated bytes. Resources reference a
//! blob through its internal url, `cassandra://<id>`.
//!
//! [`BlobStore`] is generic over a [`BlobRepository`] backend;
//! [`InMemoryBlobRepository`] is the reference implementation.

pub mod archive;
pub mod error;
pub mod memory;
pub mod model;
pub mod store;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use memory::InMemoryBlobRepository;
pub use model::{internal_url, Blob, BlobPart, INTERNAL_SCHEME};
pub use store::{BlobStore, ChunkIter, DEFAULT_CHUNK_SIZE};
pub use traits::BlobRepository;
