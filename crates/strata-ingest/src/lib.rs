//! Concurrent ingestion of a local directory tree into the Strata archive.
//!
//! One walker thread materializes collections top-down and queues a
//! [`CreateRequest`] per file on a bounded channel; a fixed pool of workers
//! streams each file into the blob store (or records a `file://` reference)
//! and creates or reconciles the resource. Re-running over an unchanged tree
//! creates and updates nothing.

pub mod cache;
pub mod error;
pub mod ingester;
pub mod options;
pub mod report;
pub mod request;
pub mod timer;
mod worker;

pub use cache::DirectoryCache;
pub use error::{IngestError, IngestResult};
pub use ingester::Ingester;
pub use options::{IngestOptions, DEFAULT_LOCAL_IP};
pub use report::{IngestFailure, IngestReport};
pub use request::CreateRequest;
pub use timer::{PhaseStat, PhaseTimer};
