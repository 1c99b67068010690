use std::collections::{HashMap, VecDeque};

use strata_tree::Collection;

/// Bounded path -> collection cache, evicting in insertion order.
#[derive(Debug)]
pub struct DirectoryCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Collection>,
}

impl DirectoryCache {
    /// An empty cache holding at most `capacity` collections.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    /// The cached collection at `path`.
    pub fn get(&self, path: &str) -> Option<&Collection> {
        self.entries.get(path)
    }

    /// Cache `collection` under its path, evicting the oldest entry when
    /// full. Re-inserting a path does not refresh its position.
    pub fn insert(&mut self, collection: Collection) {
        let path = collection.path.clone();
        if self.entries.insert(path.clone(), collection).is_some() {
            return;
        }
        self.order.push_back(path);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strata_blob::{BlobStore, InMemoryBlobRepository};
    use strata_tree::{InMemoryTreeStore, PathStore};
    use strata_types::Metadata;

    fn collections(names: &[&str]) -> Vec<Collection> {
        let store = PathStore::new(
            Arc::new(InMemoryTreeStore::new()),
            BlobStore::new(Arc::new(InMemoryBlobRepository::new())),
        );
        store.create_root().unwrap();
        names
            .iter()
            .map(|n| store.create_collection(n, "/", Metadata::new()).unwrap())
            .collect()
    }

    #[test]
    fn evicts_oldest_first() {
        let mut cache = DirectoryCache::new(2);
        for c in collections(&["a", "b", "c"]) {
            cache.insert(c);
        }
        assert_eq!(cache.len(), 2);
        assert!(cache.get("/a").is_none());
        assert!(cache.get("/b").is_some());
        assert!(cache.get("/c").is_some());
    }

    #[test]
    fn reinsert_does_not_refresh_position() {
        let mut cache = DirectoryCache::new(2);
        let cs = collections(&["a", "b", "c"]);
        cache.insert(cs[0].clone());
        cache.insert(cs[1].clone());
        cache.insert(cs[0].clone());
        cache.insert(cs[2].clone());
        assert!(cache.get("/a").is_none());
        assert_eq!(cache.len(), 2);
    }
}
