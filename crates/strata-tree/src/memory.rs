use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::entry::{DirectoryRecord, EntryData, TreeEntry};
use crate::error::{ModelError, ModelResult};
use crate::traits::{BatchOutcome, TreeBatch, TreeStore};

#[derive(Clone, Debug, Default)]
struct Partition {
    directory: Option<DirectoryRecord>,
    rows: BTreeMap<String, EntryData>,
}

/// In-memory tree table: a map of partitions behind one `RwLock`.
///
/// Holding the write lock for a whole batch gives create-if-absent the
/// same all-or-nothing behavior a lightweight transaction would.
pub struct InMemoryTreeStore {
    partitions: RwLock<HashMap<String, Partition>>,
}

impl InMemoryTreeStore {
    pub fn new() -> Self {
        Self {
            partitions: RwLock::new(HashMap::new()),
        }
    }

    /// Total number of rows across every partition.
    pub fn row_count(&self) -> usize {
        self.partitions
            .read()
            .map(|p| p.values().map(|part| part.rows.len()).sum())
            .unwrap_or(0)
    }

    /// Rows whose container is `prefix` or lies beneath it.
    pub fn rows_under(&self, prefix: &str) -> usize {
        let nested = format!("{}/", prefix.trim_end_matches('/'));
        self.partitions
            .read()
            .map(|p| {
                p.iter()
                    .filter(|(c, _)| c.as_str() == prefix || c.starts_with(&nested))
                    .map(|(_, part)| part.rows.len())
                    .sum()
            })
            .unwrap_or(0)
    }

    fn read(&self) -> ModelResult<RwLockReadGuard<'_, HashMap<String, Partition>>> {
        self.partitions
            .read()
            .map_err(|_| ModelError::undiagnosed("reading tree", "lock poisoned"))
    }

    fn write(&self) -> ModelResult<RwLockWriteGuard<'_, HashMap<String, Partition>>> {
        self.partitions
            .write()
            .map_err(|_| ModelError::undiagnosed("writing tree", "lock poisoned"))
    }
}

impl Default for InMemoryTreeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TreeStore for InMemoryTreeStore {
    fn get_entry(&self, container: &str, name: &str) -> ModelResult<Option<TreeEntry>> {
        let map = self.read()?;
        Ok(map
            .get(container)
            .and_then(|p| p.rows.get(name))
            .map(|data| TreeEntry {
                container: container.to_string(),
                name: name.to_string(),
                data: data.clone(),
            }))
    }

    fn get_directory(&self, path: &str) -> ModelResult<Option<DirectoryRecord>> {
        let map = self.read()?;
        Ok(map.get(path).and_then(|p| p.directory.clone()))
    }

    fn scan(&self, container: &str) -> ModelResult<Vec<TreeEntry>> {
        let map = self.read()?;
        Ok(map
            .get(container)
            .map(|p| {
                p.rows
                    .iter()
                    .map(|(name, data)| TreeEntry {
                        container: container.to_string(),
                        name: name.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert_if_absent(&self, batch: TreeBatch) -> ModelResult<BatchOutcome> {
        let mut map = self.write()?;
        let taken = batch.keys().find(|(container, name)| {
            map.get(*container)
                .is_some_and(|p| p.rows.contains_key(*name))
        });
        if let Some((container, name)) = taken {
            return Ok(BatchOutcome::Conflict {
                container: container.to_string(),
                name: name.to_string(),
            });
        }

        if let Some((path, record)) = batch.directory {
            map.entry(path).or_default().directory = Some(record);
        }
        for entry in batch.entries {
            debug!(container = %entry.container, name = %entry.name, "insert row");
            map.entry(entry.container)
                .or_default()
                .rows
                .insert(entry.name, entry.data);
        }
        Ok(BatchOutcome::Applied)
    }

    fn put_entry(&self, entry: TreeEntry) -> ModelResult<()> {
        let mut map = self.write()?;
        map.entry(entry.container)
            .or_default()
            .rows
            .insert(entry.name, entry.data);
        Ok(())
    }

    fn put_directory(&self, path: &str, record: DirectoryRecord) -> ModelResult<()> {
        let mut map = self.write()?;
        match map.get_mut(path) {
            Some(partition) => {
                partition.directory = Some(record);
                Ok(())
            }
            None => Err(ModelError::NoSuchCollection(path.to_string())),
        }
    }

    fn delete_entry(&self, container: &str, name: &str) -> ModelResult<bool> {
        let mut map = self.write()?;
        let Some(partition) = map.get_mut(container) else {
            return Ok(false);
        };
        let removed = partition.rows.remove(name).is_some();
        if partition.rows.is_empty() && partition.directory.is_none() {
            map.remove(container);
        }
        Ok(removed)
    }

    fn delete_partition(&self, container: &str) -> ModelResult<bool> {
        let mut map = self.write()?;
        Ok(map.remove(container).is_some())
    }
}

impl std::fmt::Debug for InMemoryTreeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTreeStore")
            .field("row_count", &self.row_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn record() -> DirectoryRecord {
        let now = strata_types::now();
        DirectoryRecord {
            id: strata_types::EntityId::new(),
            metadata: Default::default(),
            acl: Default::default(),
            created_at: now,
            modified_at: now,
        }
    }

    fn collection_batch(parent: &str, name: &str) -> TreeBatch {
        let path = strata_types::merge(parent, name);
        TreeBatch::new()
            .entry(TreeEntry::self_descriptor(&path))
            .entry(TreeEntry::link(parent, name))
            .directory(&path, record())
    }

    #[test]
    fn batch_writes_every_row() {
        let store = InMemoryTreeStore::new();
        assert_eq!(
            store.insert_if_absent(collection_batch("/", "a")).unwrap(),
            BatchOutcome::Applied
        );
        assert!(store.get_entry("/a", ".").unwrap().is_some());
        assert!(store.get_entry("/", "a/").unwrap().is_some());
        assert!(store.get_directory("/a").unwrap().is_some());
        assert_eq!(store.row_count(), 2);
    }

    #[test]
    fn conflicting_batch_writes_nothing() {
        let store = InMemoryTreeStore::new();
        store.put_entry(TreeEntry::link("/", "a")).unwrap();
        let outcome = store.insert_if_absent(collection_batch("/", "a")).unwrap();
        assert_eq!(
            outcome,
            BatchOutcome::Conflict {
                container: "/".into(),
                name: "a/".into()
            }
        );
        assert!(store.get_entry("/a", ".").unwrap().is_none());
        assert!(store.get_directory("/a").unwrap().is_none());
    }

    #[test]
    fn guards_block_without_being_written() {
        let store = InMemoryTreeStore::new();
        store.put_entry(TreeEntry::link("/", "x")).unwrap();
        let batch = TreeBatch::new()
            .entry(TreeEntry::self_descriptor("/y"))
            .require_absent("/", "x/");
        assert!(matches!(
            store.insert_if_absent(batch).unwrap(),
            BatchOutcome::Conflict { .. }
        ));

        let batch = TreeBatch::new()
            .entry(TreeEntry::self_descriptor("/y"))
            .require_absent("/", "y/");
        assert_eq!(store.insert_if_absent(batch).unwrap(), BatchOutcome::Applied);
        assert!(store.get_entry("/", "y/").unwrap().is_none());
    }

    #[test]
    fn scan_is_ordered_by_name() {
        let store = InMemoryTreeStore::new();
        store.insert_if_absent(collection_batch("/", "b")).unwrap();
        store.insert_if_absent(collection_batch("/", "a")).unwrap();
        let names: Vec<String> = store.scan("/").unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["a/", "b/"]);
        assert!(store.scan("/missing").unwrap().is_empty());
    }

    #[test]
    fn delete_partition_drops_rows_and_directory() {
        let store = InMemoryTreeStore::new();
        store.insert_if_absent(collection_batch("/", "a")).unwrap();
        assert!(store.delete_partition("/a").unwrap());
        assert!(store.get_directory("/a").unwrap().is_none());
        assert!(store.delete_entry("/", "a/").unwrap());
        assert_eq!(store.row_count(), 0);
    }

    #[test]
    fn put_directory_requires_partition() {
        let store = InMemoryTreeStore::new();
        assert!(matches!(
            store.put_directory("/nope", record()),
            Err(ModelError::NoSuchCollection(_))
        ));
    }

    #[test]
    fn concurrent_create_if_absent_applies_once() {
        let store = Arc::new(InMemoryTreeStore::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert_if_absent(collection_batch("/", "race")).unwrap())
            })
            .collect();
        let applied = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|o| *o == BatchOutcome::Applied)
            .count();
        assert_eq!(applied, 1);
        assert_eq!(store.row_count(), 2);
    }
}
