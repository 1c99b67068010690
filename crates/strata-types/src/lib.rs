//! Foundation types for the Strata archive.
//!
//! This crate provides the small vocabulary shared by every other Strata
//! crate: canonical archive paths, entity identifiers, CDMI metadata boxing,
//! and the injected [`ArchiveConfig`].
//!
//! # Key Types
//!
//! - [`EntityId`]: UUID v7 identifier for collections, resources and blobs
//! - [`MetaValue`] / [`Metadata`]: CDMI metadata values (text or list)
//! - [`ArchiveConfig`]: TOML-backed configuration, reloadable via [`ConfigHandle`]
//!
//! Path helpers live in [`path`]: [`merge`], [`split`] and [`normalize`].

pub mod config;
pub mod error;
pub mod id;
pub mod metadata;
pub mod path;

pub use config::{
    AgentSettings, ArchiveConfig, BlobSettings, ConfigHandle, IngestSettings,
    NotificationSettings,
};
pub use error::TypeError;
pub use id::EntityId;
pub use metadata::{box_metadata, metadata_to_pairs, unbox_metadata, MetaValue, Metadata, StoredMetadata};
pub use path::{is_root, merge, normalize, split, ROOT};

/// Timestamp type used for every created/modified stamp.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current wall-clock time as a [`Timestamp`].
pub fn now() -> Timestamp {
    chrono::Utc::now()
}
