//! Hierarchical path store for the Strata archive.
//!
//! Collections (directories) and resources (files) are rows in a
//! partitioned table keyed by `(container, name)`. A collection owns one
//! partition holding its `.` self-descriptor row and the directory-wide
//! [`DirectoryRecord`]; its parent's partition holds a `name/` link row.
//! Resources are plain rows in their parent's partition.
//!
//! [`PathStore`] layers validation, ACL inheritance, blob cleanup and the
//! best-effort search and notification hooks over any [`TreeStore`].
//!
//! # Modules
//!
//! - [`store`]: the [`PathStore`]
//! - [`driver`]: url scheme dispatch (`cassandra://`, `file://`)
//! - [`search`]: [`SearchIndex`] hook and the in-memory [`TermIndex`]
//! - [`notification`]: outbox, publishers and [`Notifier`]

pub mod collection;
pub mod driver;
pub mod entry;
pub mod error;
pub mod memory;
pub mod notification;
pub mod resource;
pub mod search;
pub mod store;
pub mod traits;
pub mod user;

pub use collection::{Collection, CollectionUpdate};
pub use driver::{parse_url, AgentClient, Driver};
pub use entry::{DirectoryRecord, EntryData, ObjectRecord, TreeEntry};
pub use error::{ModelError, ModelResult};
pub use memory::InMemoryTreeStore;
pub use notification::{
    build_topic, BroadcastPublisher, InMemoryOutbox, MessageStream, NoPublish, Notification,
    Notifier, ObjectType, Operation, Outbox, Published, Publisher,
};
pub use resource::{is_internal_url, Resource, ResourceSpec, ResourceUpdate};
pub use search::{Indexable, NoSearch, SearchIndex, TermIndex};
pub use store::{Children, ContentStream, PathStore, Secured};
pub use traits::{BatchOutcome, TreeBatch, TreeStore};
pub use user::{Action, User};
