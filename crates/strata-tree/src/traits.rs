use crate::entry::{DirectoryRecord, TreeEntry};
use crate::error::ModelResult;

/// A group of writes applied all-or-nothing, conditional on a set of keys
/// being absent.
#[derive(Clone, Debug, Default)]
pub struct TreeBatch {
    pub entries: Vec<TreeEntry>,
    /// `(partition, record)` to install alongside the entries.
    pub directory: Option<(String, DirectoryRecord)>,
    /// Extra `(container, name)` keys that must not exist.
    pub guards: Vec<(String, String)>,
}

impl TreeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, entry: TreeEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn directory(mut self, path: &str, record: DirectoryRecord) -> Self {
        self.directory = Some((path.to_string(), record));
        self
    }

    pub fn require_absent(mut self, container: &str, name: &str) -> Self {
        self.guards.push((container.to_string(), name.to_string()));
        self
    }

    /// Every key the batch requires to be free.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.container.as_str(), e.name.as_str()))
            .chain(self.guards.iter().map(|(c, n)| (c.as_str(), n.as_str())))
    }
}

/// Result of a conditional batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOutcome {
    Applied,
    /// Nothing was written because this key already exists.
    Conflict { container: String, name: String },
}

/// Partitioned row storage for the tree.
///
/// Backends must make [`insert_if_absent`](Self::insert_if_absent) atomic
/// with respect to every other write: concurrent writers racing on the same
/// key see exactly one `Applied`.
pub trait TreeStore: Send + Sync {
    fn get_entry(&self, container: &str, name: &str) -> ModelResult<Option<TreeEntry>>;

    fn get_directory(&self, path: &str) -> ModelResult<Option<DirectoryRecord>>;

    /// Every row in a partition, ordered by name.
    fn scan(&self, container: &str) -> ModelResult<Vec<TreeEntry>>;

    fn insert_if_absent(&self, batch: TreeBatch) -> ModelResult<BatchOutcome>;

    /// Unconditional upsert of one row.
    fn put_entry(&self, entry: TreeEntry) -> ModelResult<()>;

    /// Replace the directory record of an existing partition.
    fn put_directory(&self, path: &str, record: DirectoryRecord) -> ModelResult<()>;

    fn delete_entry(&self, container: &str, name: &str) -> ModelResult<bool>;

    /// Drop a partition with all its rows and its directory record.
    fn delete_partition(&self, container: &str) -> ModelResult<bool>;
}
