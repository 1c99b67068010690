use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::Value;
use strata_acl::{default_acl, AccessLevel, Acl, MaskDomain};
use strata_blob::BlobStore;
use strata_types::{is_root, merge, normalize, split, AgentSettings, EntityId, Metadata, MetaValue, ROOT};
use tracing::{debug, info, warn};

use crate::collection::{Collection, CollectionUpdate};
use crate::driver::{AgentClient, Driver};
use crate::entry::{link_name, EntryData, TreeEntry, SELF_NAME};
use crate::error::{ModelError, ModelResult};
use crate::notification::{Notifier, ObjectType, Operation};
use crate::resource::{Resource, ResourceSpec, ResourceUpdate};
use crate::search::{Indexable, NoSearch, SearchIndex};
use crate::traits::{BatchOutcome, TreeBatch, TreeStore};
use crate::user::{Action, User};

/// Lazily produced resource content.
pub type ContentStream<'a> = Box<dyn Iterator<Item = ModelResult<Vec<u8>>> + 'a>;

/// Child names of a collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Children {
    pub collections: Vec<String>,
    pub resources: Vec<String>,
}

impl Children {
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty() && self.resources.is_empty()
    }
}

/// A node whose ACL takes part in access checks.
pub trait Secured {
    fn acl(&self) -> &Acl;

    fn mask_domain(&self) -> MaskDomain;

    /// Path of the collection to consult when this node's ACL is empty.
    fn parent_path(&self) -> Option<&str>;

    fn node_path(&self) -> String;
}

impl Secured for Collection {
    fn acl(&self) -> &Acl {
        &self.acl
    }

    fn mask_domain(&self) -> MaskDomain {
        MaskDomain::Container
    }

    fn parent_path(&self) -> Option<&str> {
        if self.is_root() {
            None
        } else {
            Some(&self.container)
        }
    }

    fn node_path(&self) -> String {
        self.path.clone()
    }
}

impl Secured for Resource {
    fn acl(&self) -> &Acl {
        &self.acl
    }

    fn mask_domain(&self) -> MaskDomain {
        MaskDomain::Object
    }

    fn parent_path(&self) -> Option<&str> {
        Some(&self.container)
    }

    fn node_path(&self) -> String {
        self.path()
    }
}

fn actions_for(level: AccessLevel) -> &'static [Action] {
    match level {
        AccessLevel::Read => &[Action::Read],
        AccessLevel::Write | AccessLevel::Edit => &[Action::Write, Action::Edit, Action::Delete],
        AccessLevel::ReadWrite => &[Action::Read, Action::Write, Action::Edit, Action::Delete],
        AccessLevel::None | AccessLevel::Delete => &[],
    }
}

fn actions_from_acl(user: &User, acl: &Acl, domain: MaskDomain) -> BTreeSet<Action> {
    user.identifiers()
        .filter_map(|gid| acl.get(gid))
        .filter_map(|ace| ace.level(domain))
        .flat_map(|level| actions_for(level).iter().copied())
        .collect()
}

/// Collections and resources over partitioned tree rows.
///
/// The store takes no locks of its own; uniqueness relies on the backend's
/// conditional batch. Search and notification side effects are best-effort.
pub struct PathStore {
    tree: Arc<dyn TreeStore>,
    blobs: BlobStore,
    search: Arc<dyn SearchIndex>,
    notifier: Notifier,
    agent: AgentClient,
}

impl PathStore {
    /// A store over `tree` and `blobs` with no search index, notifications
    /// disabled and a default agent client.
    pub fn new(tree: Arc<dyn TreeStore>, blobs: BlobStore) -> Self {
        Self {
            tree,
            blobs,
            search: Arc::new(NoSearch),
            notifier: Notifier::disabled(),
            agent: AgentClient::new(&AgentSettings::default()),
        }
    }

    /// Index every created or updated node into `search`.
    pub fn with_search(mut self, search: Arc<dyn SearchIndex>) -> Self {
        self.search = search;
        self
    }

    /// Record change notifications through `notifier`.
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Fetch `file://` content from agents configured by `settings`.
    pub fn with_agent(mut self, settings: &AgentSettings) -> Self {
        self.agent = AgentClient::new(settings);
        self
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    /// Create the root collection, or return it if it already exists.
    pub fn create_root(&self) -> ModelResult<Collection> {
        if let Some(root) = self.find_collection(ROOT)? {
            return Ok(root);
        }
        let now = strata_types::now();
        let root = Collection {
            id: EntityId::new(),
            path: ROOT.to_string(),
            container: ROOT.to_string(),
            name: String::new(),
            metadata: Metadata::new(),
            acl: default_acl(),
            created_at: now,
            modified_at: now,
        };
        let batch = TreeBatch::new()
            .entry(TreeEntry::self_descriptor(ROOT))
            .directory(ROOT, root.to_record());
        match self.tree.insert_if_absent(batch)? {
            BatchOutcome::Applied => {
                info!("root collection created");
                Ok(root)
            }
            BatchOutcome::Conflict { .. } => self
                .find_collection(ROOT)?
                .ok_or_else(|| ModelError::NoSuchCollection(ROOT.to_string())),
        }
    }

    /// The root collection; `NoSuchCollection` before [`create_root`](Self::create_root).
    pub fn root(&self) -> ModelResult<Collection> {
        self.find_collection(ROOT)?
            .ok_or_else(|| ModelError::NoSuchCollection(ROOT.to_string()))
    }

    /// Create collection `name` inside `container`.
    pub fn create_collection(
        &self,
        name: &str,
        container: &str,
        metadata: Metadata,
    ) -> ModelResult<Collection> {
        self.create_collection_with_acl(name, container, metadata, Acl::new())
    }

    /// Like [`create_collection`](Self::create_collection), with an initial ACL.
    /// The name is trimmed first.
    pub fn create_collection_with_acl(
        &self,
        name: &str,
        container: &str,
        metadata: Metadata,
        acl: Acl,
    ) -> ModelResult<Collection> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') || name == SELF_NAME {
            return Err(ModelError::InvalidPath(name.to_string()));
        }
        let container = normalize(container);
        if self.find_collection(&container)?.is_none() {
            return Err(ModelError::NoSuchCollection(container));
        }
        let path = merge(&container, name);
        if self.find_resource(&path)?.is_some() {
            return Err(ModelError::ResourceConflict(path));
        }
        if self.find_collection(&path)?.is_some() {
            return Err(ModelError::CollectionConflict(path));
        }

        let now = strata_types::now();
        let collection = Collection {
            id: EntityId::new(),
            path: path.clone(),
            container: container.clone(),
            name: name.to_string(),
            metadata,
            acl,
            created_at: now,
            modified_at: now,
        };
        let batch = TreeBatch::new()
            .entry(TreeEntry::self_descriptor(&path))
            .entry(TreeEntry::link(&container, name))
            .directory(&path, collection.to_record())
            .require_absent(&container, name);
        if let BatchOutcome::Conflict { name: taken, .. } = self.tree.insert_if_absent(batch)? {
            return Err(conflict_for(&taken, path));
        }

        info!(path = %path, "collection created");
        self.reindex_collection(&collection);
        self.notify_collection(Operation::Create, &collection);
        Ok(collection)
    }

    /// The collection at `path`, if any. The path is normalized first.
    pub fn find_collection(&self, path: &str) -> ModelResult<Option<Collection>> {
        let path = normalize(path);
        if self.tree.get_entry(&path, SELF_NAME)?.is_none() {
            return Ok(None);
        }
        Ok(self
            .tree
            .get_directory(&path)?
            .map(|record| Collection::from_record(&path, record)))
    }

    /// Names of the child collections and resources of `path`.
    pub fn children(&self, path: &str) -> ModelResult<Children> {
        let path = normalize(path);
        let mut children = Children::default();
        for entry in self.tree.scan(&path)? {
            match entry.data {
                EntryData::SelfDescriptor => {}
                EntryData::Link => children
                    .collections
                    .push(entry.name.trim_end_matches('/').to_string()),
                EntryData::Object(_) => children.resources.push(entry.name),
            }
        }
        Ok(children)
    }

    /// Every resource directly inside `path`.
    pub fn resources_in(&self, path: &str) -> ModelResult<Vec<Resource>> {
        let path = normalize(path);
        Ok(self
            .tree
            .scan(&path)?
            .into_iter()
            .filter_map(|entry| match entry.data {
                EntryData::Object(record) => {
                    Some(Resource::from_record(&entry.container, &entry.name, record))
                }
                _ => None,
            })
            .collect())
    }

    /// Delete one collection: its partition and its link row. Children are
    /// not visited.
    pub fn delete_collection(&self, path: &str) -> ModelResult<()> {
        let path = normalize(path);
        if is_root(&path) {
            return Err(ModelError::RootCollection);
        }
        let collection = self
            .find_collection(&path)?
            .ok_or_else(|| ModelError::NoSuchCollection(path.clone()))?;
        self.tree.delete_partition(&path)?;
        self.tree
            .delete_entry(&collection.container, &link_name(&collection.name))?;
        debug!(path = %path, "collection deleted");
        self.reset_index(&collection.id);
        self.notify_collection(Operation::Delete, &collection);
        Ok(())
    }

    /// Delete a collection and everything beneath it, depth first. The root
    /// itself survives; only its contents are removed.
    pub fn delete_all(&self, path: &str) -> ModelResult<()> {
        let path = normalize(path);
        let children = self.children(&path)?;
        for name in &children.collections {
            self.delete_all(&merge(&path, name))?;
        }
        for name in &children.resources {
            self.delete_resource(&merge(&path, name))?;
        }
        if !is_root(&path) {
            self.delete_collection(&path)?;
        }
        Ok(())
    }

    /// Apply `update` to the collection at `path`, stamp `modified_at`, then
    /// reindex and notify.
    pub fn update_collection(&self, path: &str, update: CollectionUpdate) -> ModelResult<Collection> {
        let path = normalize(path);
        let mut collection = self
            .find_collection(&path)?
            .ok_or_else(|| ModelError::NoSuchCollection(path.clone()))?;
        if let Some(metadata) = update.metadata {
            collection.metadata = metadata;
        }
        if let Some(acl) = update.acl {
            collection.acl = acl;
        }
        collection.modified_at = strata_types::now();
        self.tree.put_directory(&path, collection.to_record())?;
        debug!(path = %path, "collection updated");
        self.reindex_collection(&collection);
        self.notify_collection(Operation::Update, &collection);
        Ok(collection)
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    /// Create resource `name` inside `container`.
    pub fn create_resource(&self, container: &str, name: &str, spec: ResourceSpec) -> ModelResult<Resource> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') || name == SELF_NAME {
            return Err(ModelError::InvalidPath(name.to_string()));
        }
        let container = normalize(container);
        if self.find_collection(&container)?.is_none() {
            return Err(ModelError::NoSuchCollection(container));
        }
        let path = merge(&container, name);
        if self.find_collection(&path)?.is_some() {
            return Err(ModelError::CollectionConflict(path));
        }
        if self.find_resource(&path)?.is_some() {
            return Err(ModelError::ResourceConflict(path));
        }

        let now = strata_types::now();
        let resource = Resource {
            id: EntityId::new(),
            container: container.clone(),
            name: name.to_string(),
            url: spec.url,
            mimetype: spec.mimetype,
            size: spec.size,
            checksum: spec.checksum,
            metadata: spec.metadata,
            acl: spec.acl,
            created_at: now,
            modified_at: now,
        };
        let batch = TreeBatch::new()
            .entry(TreeEntry::object(&container, name, resource.to_record()))
            .require_absent(&container, &link_name(name));
        if let BatchOutcome::Conflict { name: taken, .. } = self.tree.insert_if_absent(batch)? {
            return Err(conflict_for(&taken, path));
        }

        debug!(path = %path, url = %resource.url, "resource created");
        self.reindex_resource(&resource);
        self.notify_resource(Operation::Create, &resource);
        Ok(resource)
    }

    /// The resource at `path`, if any.
    pub fn find_resource(&self, path: &str) -> ModelResult<Option<Resource>> {
        let (container, name) = split(path);
        if name.is_empty() {
            return Ok(None);
        }
        Ok(match self.tree.get_entry(&container, &name)? {
            Some(TreeEntry {
                data: EntryData::Object(record),
                ..
            }) => Some(Resource::from_record(&container, &name, record)),
            _ => None,
        })
    }

    /// Delete a resource, then its blob when the content is internal.
    pub fn delete_resource(&self, path: &str) -> ModelResult<()> {
        let resource = self
            .find_resource(path)?
            .ok_or_else(|| ModelError::NoSuchResource(normalize(path)))?;
        self.tree.delete_entry(&resource.container, &resource.name)?;
        if let Some(blob_id) = resource.blob_id() {
            self.discard_blob(&blob_id);
        }
        debug!(path = %resource.path(), "resource deleted");
        self.reset_index(&resource.id);
        self.notify_resource(Operation::Delete, &resource);
        Ok(())
    }

    /// Apply `update` to the resource at `path`. When the url moves away from
    /// an internal blob, that blob is deleted.
    pub fn update_resource(&self, path: &str, update: ResourceUpdate) -> ModelResult<Resource> {
        let mut resource = self
            .find_resource(path)?
            .ok_or_else(|| ModelError::NoSuchResource(normalize(path)))?;
        let replaced_blob = match &update.url {
            Some(url) if *url != resource.url => resource.blob_id(),
            _ => None,
        };
        if let Some(url) = update.url {
            resource.url = url;
        }
        if let Some(mimetype) = update.mimetype {
            resource.mimetype = Some(mimetype);
        }
        if let Some(size) = update.size {
            resource.size = size;
        }
        if let Some(checksum) = update.checksum {
            resource.checksum = Some(checksum);
        }
        if let Some(metadata) = update.metadata {
            resource.metadata = metadata;
        }
        if let Some(acl) = update.acl {
            resource.acl = acl;
        }
        resource.modified_at = strata_types::now();
        self.tree.put_entry(TreeEntry::object(
            &resource.container,
            &resource.name,
            resource.to_record(),
        ))?;
        if let Some(blob_id) = replaced_blob {
            self.discard_blob(&blob_id);
        }
        debug!(path = %resource.path(), "resource updated");
        self.reindex_resource(&resource);
        self.notify_resource(Operation::Update, &resource);
        Ok(resource)
    }

    /// Stream the resource's content through the driver for its url.
    pub fn read_content(&self, resource: &Resource) -> ModelResult<ContentStream<'_>> {
        match Driver::for_url(&resource.url)? {
            Driver::Blob(id) => {
                let blob = self.blobs.get(&id)?;
                Ok(Box::new(
                    self.blobs
                        .chunk_content(&blob)
                        .map(|chunk| chunk.map_err(ModelError::from)),
                ))
            }
            Driver::Agent { address, path } => Ok(Box::new(self.agent.fetch(&address, &path)?)),
        }
    }

    // ------------------------------------------------------------------
    // Access control
    // ------------------------------------------------------------------

    /// Actions `user` may perform on `node`. An empty ACL defers to the
    /// enclosing collection; an empty ACL all the way up grants nothing.
    pub fn authorized_actions<N: Secured>(&self, user: &User, node: &N) -> ModelResult<BTreeSet<Action>> {
        if !node.acl().is_empty() {
            return Ok(actions_from_acl(user, node.acl(), node.mask_domain()));
        }
        let mut next = node.parent_path().map(str::to_string);
        while let Some(path) = next {
            let Some(parent) = self.find_collection(&path)? else {
                break;
            };
            if !parent.acl.is_empty() {
                return Ok(actions_from_acl(user, &parent.acl, MaskDomain::Container));
            }
            next = parent.parent_path().map(str::to_string);
        }
        Ok(BTreeSet::new())
    }

    /// Administrators can do everything.
    pub fn user_can<N: Secured>(&self, user: &User, node: &N, action: Action) -> ModelResult<bool> {
        if user.administrator {
            return Ok(true);
        }
        Ok(self.authorized_actions(user, node)?.contains(&action))
    }

    /// Like [`user_can`](Self::user_can), failing with the matching access
    /// error.
    pub fn check_access<N: Secured>(&self, user: &User, node: &N, action: Action) -> ModelResult<()> {
        if self.user_can(user, node, action)? {
            return Ok(());
        }
        let (user, path) = (user.name.clone(), node.node_path());
        Err(match action {
            Action::Read => ModelError::NoReadAccess { user, path },
            _ => ModelError::NoWriteAccess { user, path },
        })
    }

    /// Replace a collection's ACL from read and write group lists.
    pub fn set_collection_acl(&self, path: &str, read: &[String], write: &[String]) -> ModelResult<Collection> {
        let acl = Acl::from_access_lists(read, write, MaskDomain::Container);
        self.update_collection(
            path,
            CollectionUpdate {
                acl: Some(acl),
                ..Default::default()
            },
        )
    }

    /// Replace a resource's ACL from read and write group lists.
    pub fn set_resource_acl(&self, path: &str, read: &[String], write: &[String]) -> ModelResult<Resource> {
        let acl = Acl::from_access_lists(read, write, MaskDomain::Object);
        self.update_resource(
            path,
            ResourceUpdate {
                acl: Some(acl),
                ..Default::default()
            },
        )
    }

    /// Replace the ACL of the collection or resource at `path` from a CDMI
    /// `cdmi_acl` document.
    pub fn update_cdmi_acl(&self, path: &str, cdmi_acl: &Value) -> ModelResult<()> {
        if self.find_collection(path)?.is_some() {
            let acl = Acl::from_cdmi(cdmi_acl, MaskDomain::Container)?;
            self.update_collection(
                path,
                CollectionUpdate {
                    acl: Some(acl),
                    ..Default::default()
                },
            )?;
            return Ok(());
        }
        if self.find_resource(path)?.is_some() {
            let acl = Acl::from_cdmi(cdmi_acl, MaskDomain::Object)?;
            self.update_resource(
                path,
                ResourceUpdate {
                    acl: Some(acl),
                    ..Default::default()
                },
            )?;
            return Ok(());
        }
        Err(ModelError::NoSuchResource(normalize(path)))
    }

    // ------------------------------------------------------------------
    // Side effects
    // ------------------------------------------------------------------

    fn discard_blob(&self, id: &EntityId) {
        if let Err(e) = self.blobs.delete_blob(id) {
            warn!(blob = %id, error = %e, "blob cleanup failed");
        }
    }

    fn reindex_collection(&self, collection: &Collection) {
        let mut fields = vec![collection.name.clone()];
        fields.extend(metadata_text(&collection.metadata));
        self.reindex(Indexable {
            id: collection.id.to_string(),
            object_type: ObjectType::Collection,
            path: collection.path.clone(),
            fields,
        });
    }

    /// Refresh the search entry for a resource. Failures are logged.
    pub fn reindex_resource(&self, resource: &Resource) {
        let mut fields = vec![resource.name.clone()];
        fields.extend(metadata_text(&resource.metadata));
        self.reindex(Indexable {
            id: resource.id.to_string(),
            object_type: ObjectType::Resource,
            path: resource.path(),
            fields,
        });
    }

    fn reindex(&self, doc: Indexable) {
        if let Err(e) = self.search.index(&doc) {
            warn!(path = %doc.path, error = %e, "search index update failed");
        }
    }

    fn reset_index(&self, id: &EntityId) {
        if let Err(e) = self.search.reset(&id.to_string()) {
            warn!(id = %id, error = %e, "search index reset failed");
        }
    }

    fn notify_collection(&self, operation: Operation, collection: &Collection) {
        self.notifier.record(
            operation,
            ObjectType::Collection,
            "",
            &collection.path,
            None,
            &collection.to_cdmi(),
        );
    }

    fn notify_resource(&self, operation: Operation, resource: &Resource) {
        self.notifier.record(
            operation,
            ObjectType::Resource,
            "",
            &resource.path(),
            None,
            &resource.to_cdmi(),
        );
    }
}

impl std::fmt::Debug for PathStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathStore")
            .field("blobs", &self.blobs)
            .field("notifier", &self.notifier)
            .finish_non_exhaustive()
    }
}

/// Map the key that blocked a conditional write to the conflict it means.
fn conflict_for(taken_name: &str, path: String) -> ModelError {
    if taken_name.ends_with('/') || taken_name == SELF_NAME {
        ModelError::CollectionConflict(path)
    } else {
        ModelError::ResourceConflict(path)
    }
}

fn metadata_text(metadata: &Metadata) -> impl Iterator<Item = String> + '_ {
    metadata.values().flat_map(|value| match value {
        MetaValue::Text(s) => vec![s.clone()],
        MetaValue::List(items) => items.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTreeStore;
    use crate::notification::{InMemoryOutbox, NoPublish, Outbox};
    use crate::search::TermIndex;
    use serde_json::json;
    use std::thread;
    use strata_acl::AUTHENTICATED;
    use strata_blob::InMemoryBlobRepository;

    struct Fixture {
        tree: Arc<InMemoryTreeStore>,
        blobs: Arc<InMemoryBlobRepository>,
        search: Arc<TermIndex>,
        outbox: Arc<InMemoryOutbox>,
        store: PathStore,
    }

    fn fixture() -> Fixture {
        let tree = Arc::new(InMemoryTreeStore::new());
        let blobs = Arc::new(InMemoryBlobRepository::new());
        let search = Arc::new(TermIndex::new());
        let outbox = Arc::new(InMemoryOutbox::new());
        let store = PathStore::new(tree.clone(), BlobStore::new(blobs.clone()))
            .with_search(search.clone())
            .with_notifier(Notifier::new(outbox.clone(), Arc::new(NoPublish)));
        store.create_root().unwrap();
        Fixture {
            tree,
            blobs,
            search,
            outbox,
            store,
        }
    }

    fn reference(url: &str) -> ResourceSpec {
        ResourceSpec::new(url)
    }

    fn groups(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ------------------------------------------------------------------
    // Scenario: create, find, delete_all
    // ------------------------------------------------------------------

    #[test]
    fn create_find_delete_all() {
        let f = fixture();
        let a = f.store.create_collection("a", "/", Metadata::new()).unwrap();
        assert_eq!(a.path, "/a");
        assert_eq!(a.container, "/");

        f.store
            .create_resource("/a", "f.txt", reference("file://10.0.0.1/src/f.txt"))
            .unwrap();
        let found = f.store.find_resource("/a/f.txt").unwrap().unwrap();
        assert_eq!(found.container, "/a");
        assert_eq!(found.name, "f.txt");

        f.store.delete_all("/a").unwrap();
        assert!(f.store.find_collection("/a").unwrap().is_none());
        assert!(f.store.find_resource("/a/f.txt").unwrap().is_none());
        assert_eq!(f.tree.rows_under("/a"), 0);
    }

    #[test]
    fn create_root_is_idempotent() {
        let f = fixture();
        let first = f.store.root().unwrap();
        let again = f.store.create_root().unwrap();
        assert_eq!(first.id, again.id);
        assert!(first.is_root());
        assert_eq!(
            first.acl.get(AUTHENTICATED).unwrap().level(MaskDomain::Container),
            Some(AccessLevel::Read)
        );
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    #[test]
    fn collection_requires_parent() {
        let f = fixture();
        assert!(matches!(
            f.store.create_collection("b", "/missing", Metadata::new()),
            Err(ModelError::NoSuchCollection(p)) if p == "/missing"
        ));
    }

    #[test]
    fn duplicate_collection_conflicts() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        assert!(matches!(
            f.store.create_collection("a", "/", Metadata::new()),
            Err(ModelError::CollectionConflict(_))
        ));
        assert_eq!(f.store.children("/").unwrap().collections, vec!["a"]);
    }

    #[test]
    fn collection_over_resource_conflicts() {
        let f = fixture();
        f.store.create_resource("/", "x", reference("file://h/x")).unwrap();
        assert!(matches!(
            f.store.create_collection("x", "/", Metadata::new()),
            Err(ModelError::ResourceConflict(_))
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let f = fixture();
        for bad in ["", "  ", "a/b", "."] {
            assert!(matches!(
                f.store.create_collection(bad, "/", Metadata::new()),
                Err(ModelError::InvalidPath(_))
            ));
        }
    }

    #[test]
    fn children_split_collections_and_resources() {
        let f = fixture();
        f.store.create_collection("sub", "/", Metadata::new()).unwrap();
        f.store.create_resource("/", "b.txt", reference("file://h/b")).unwrap();
        f.store.create_resource("/", "a.txt", reference("file://h/a")).unwrap();
        let children = f.store.children("/").unwrap();
        assert_eq!(children.collections, vec!["sub"]);
        assert_eq!(children.resources, vec!["a.txt", "b.txt"]);
        assert!(f.store.children("/sub").unwrap().is_empty());
    }

    #[test]
    fn every_collection_has_a_parent() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store.create_collection("b", "/a", Metadata::new()).unwrap();
        f.store.create_collection("c", "/a/b", Metadata::new()).unwrap();
        for path in ["/a", "/a/b", "/a/b/c"] {
            let c = f.store.find_collection(path).unwrap().unwrap();
            assert!(f.store.find_collection(&c.container).unwrap().is_some());
        }
    }

    #[test]
    fn delete_collection_is_shallow() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store.create_collection("b", "/a", Metadata::new()).unwrap();
        f.store.delete_collection("/a").unwrap();
        assert!(f.store.find_collection("/a").unwrap().is_none());
        assert!(f.store.children("/").unwrap().collections.is_empty());
        assert!(f.store.find_collection("/a/b").unwrap().is_some());
    }

    #[test]
    fn root_cannot_be_deleted() {
        let f = fixture();
        assert!(matches!(
            f.store.delete_collection("/"),
            Err(ModelError::RootCollection)
        ));
        assert!(matches!(
            f.store.delete_collection("/nope"),
            Err(ModelError::NoSuchCollection(_))
        ));
    }

    #[test]
    fn delete_all_on_root_keeps_root() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store.create_resource("/", "r", reference("file://h/r")).unwrap();
        f.store.delete_all("/").unwrap();
        assert!(f.store.children("/").unwrap().is_empty());
        assert!(f.store.find_collection("/").unwrap().is_some());
        assert_eq!(f.tree.row_count(), 1);
    }

    #[test]
    fn delete_all_removes_nested_blobs() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store.create_collection("b", "/a", Metadata::new()).unwrap();
        let blob = f.store.blobs().create_from_bytes(b"payload").unwrap();
        f.store.create_resource("/a/b", "f", ResourceSpec::new(blob.url())).unwrap();

        f.store.delete_all("/a").unwrap();
        assert_eq!(f.blobs.blob_count(), 0);
        assert_eq!(f.blobs.part_count(), 0);
        assert_eq!(f.tree.rows_under("/a"), 0);
    }

    #[test]
    fn update_collection_stamps_and_boxes_metadata() {
        let f = fixture();
        let before = f.store.create_collection("a", "/", Metadata::new()).unwrap();
        let mut metadata = Metadata::new();
        metadata.insert("tags".into(), groups(&["x", "y"]).into());
        let after = f
            .store
            .update_collection(
                "/a",
                CollectionUpdate {
                    metadata: Some(metadata.clone()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert!(after.modified_at >= before.modified_at);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(f.store.find_collection("/a").unwrap().unwrap().metadata, metadata);
    }

    // ------------------------------------------------------------------
    // Resources
    // ------------------------------------------------------------------

    #[test]
    fn resource_errors_in_order() {
        let f = fixture();
        assert!(matches!(
            f.store.create_resource("/nope", "f", reference("file://h/f")),
            Err(ModelError::NoSuchCollection(_))
        ));
        f.store.create_collection("d", "/", Metadata::new()).unwrap();
        assert!(matches!(
            f.store.create_resource("/", "d", reference("file://h/d")),
            Err(ModelError::CollectionConflict(_))
        ));
        f.store.create_resource("/", "f", reference("file://h/f")).unwrap();
        assert!(matches!(
            f.store.create_resource("/", "f", reference("file://h/other")),
            Err(ModelError::ResourceConflict(_))
        ));
        assert_eq!(f.store.children("/").unwrap().resources, vec!["f"]);
    }

    #[test]
    fn resource_name_is_trimmed() {
        let f = fixture();
        let r = f.store.create_resource("/", "  f.txt ", reference("file://h/f")).unwrap();
        assert_eq!(r.name, "f.txt");
        assert!(f.store.find_resource("/f.txt").unwrap().is_some());
    }

    #[test]
    fn deleting_reference_resource_leaves_blobs() {
        let f = fixture();
        let unrelated = f.store.blobs().create_from_bytes(b"keep").unwrap();
        f.store.create_resource("/", "ref", reference("file://h/ref")).unwrap();
        f.store.delete_resource("/ref").unwrap();
        assert!(f.store.blobs().find(&unrelated.id).unwrap().is_some());
        assert!(matches!(
            f.store.delete_resource("/ref"),
            Err(ModelError::NoSuchResource(_))
        ));
    }

    #[test]
    fn deleting_internal_resource_deletes_blob() {
        let f = fixture();
        let blob = f.store.blobs().create_from_bytes(b"bytes").unwrap();
        f.store.create_resource("/", "in", ResourceSpec::new(blob.url())).unwrap();
        f.store.delete_resource("/in").unwrap();
        assert!(f.store.blobs().find(&blob.id).unwrap().is_none());
    }

    #[test]
    fn replacing_url_discards_old_blob() {
        let f = fixture();
        let old = f.store.blobs().create_from_bytes(b"v1").unwrap();
        let new = f.store.blobs().create_from_bytes(b"v2").unwrap();
        f.store.create_resource("/", "doc", ResourceSpec::new(old.url())).unwrap();
        let updated = f
            .store
            .update_resource(
                "/doc",
                ResourceUpdate {
                    url: Some(new.url()),
                    checksum: Some(new.hash.clone()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.url, new.url());
        assert!(f.store.blobs().find(&old.id).unwrap().is_none());
        assert!(f.store.blobs().find(&new.id).unwrap().is_some());
    }

    #[test]
    fn read_content_from_blob() {
        let f = fixture();
        let blob = f.store.blobs().create_from_bytes(b"hello world").unwrap();
        let r = f.store.create_resource("/", "h", ResourceSpec::new(blob.url())).unwrap();
        let bytes: Vec<u8> = f
            .store
            .read_content(&r)
            .unwrap()
            .collect::<ModelResult<Vec<_>>>()
            .unwrap()
            .concat();
        assert_eq!(bytes, b"hello world");
    }

    #[test]
    fn read_content_unknown_scheme() {
        let f = fixture();
        let r = f.store.create_resource("/", "s3", reference("s3://bucket/key")).unwrap();
        assert!(matches!(
            f.store.read_content(&r),
            Err(ModelError::NoSuchDriver(_))
        ));
    }

    // ------------------------------------------------------------------
    // Access control
    // ------------------------------------------------------------------

    #[test]
    fn empty_acl_inherits_from_nearest_ancestor() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store.create_collection("b", "/a", Metadata::new()).unwrap();
        f.store.set_collection_acl("/a", &[], &groups(&["staff"])).unwrap();
        let r = f.store.create_resource("/a/b", "f", reference("file://h/f")).unwrap();

        let staff = User::new("s", groups(&["staff"]));
        let a = f.store.find_collection("/a").unwrap().unwrap();
        let b = f.store.find_collection("/a/b").unwrap().unwrap();
        let expected = f.store.authorized_actions(&staff, &a).unwrap();
        assert_eq!(
            expected,
            [Action::Write, Action::Edit, Action::Delete].into_iter().collect()
        );
        assert_eq!(f.store.authorized_actions(&staff, &b).unwrap(), expected);
        assert_eq!(f.store.authorized_actions(&staff, &r).unwrap(), expected);
    }

    #[test]
    fn empty_acl_up_to_root_grants_nothing() {
        let f = fixture();
        f.store
            .update_collection(
                "/",
                CollectionUpdate {
                    acl: Some(Acl::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        let c = f.store.create_collection("a", "/", Metadata::new()).unwrap();
        let user = User::new("u", groups(&["g"]));
        assert!(f.store.authorized_actions(&user, &c).unwrap().is_empty());
    }

    #[test]
    fn authenticated_read_on_root_applies_everywhere() {
        let f = fixture();
        let c = f.store.create_collection("a", "/", Metadata::new()).unwrap();
        let nobody = User::new("n", vec![]);
        assert!(f.store.user_can(&nobody, &c, Action::Read).unwrap());
        assert!(!f.store.user_can(&nobody, &c, Action::Write).unwrap());
        assert!(matches!(
            f.store.check_access(&nobody, &c, Action::Delete),
            Err(ModelError::NoWriteAccess { .. })
        ));
    }

    #[test]
    fn read_and_write_groups_union() {
        let f = fixture();
        f.store.create_resource("/", "r", reference("file://h/r")).unwrap();
        let r = f
            .store
            .set_resource_acl("/r", &groups(&["readers"]), &groups(&["writers"]))
            .unwrap();
        let both = User::new("b", groups(&["readers", "writers"]));
        assert_eq!(
            f.store.authorized_actions(&both, &r).unwrap(),
            [Action::Read, Action::Write, Action::Edit, Action::Delete]
                .into_iter()
                .collect()
        );
        let outsider = User::new("o", groups(&["other"]));
        assert!(f.store.authorized_actions(&outsider, &r).unwrap().is_empty());
        assert!(matches!(
            f.store.check_access(&outsider, &r, Action::Read),
            Err(ModelError::NoReadAccess { .. })
        ));
    }

    #[test]
    fn administrators_bypass_acl() {
        let f = fixture();
        let r = f.store.create_resource("/", "r", reference("file://h/r")).unwrap();
        let r = f.store.set_resource_acl(&r.path(), &[], &[]).unwrap();
        assert!(f.store.user_can(&User::admin("root"), &r, Action::Delete).unwrap());
    }

    #[test]
    fn cdmi_acl_update() {
        let f = fixture();
        f.store.create_collection("a", "/", Metadata::new()).unwrap();
        f.store
            .update_cdmi_acl(
                "/a",
                &json!([{"acetype": "ALLOW", "identifier": "ops", "aceflags": "OBJECT_INHERIT",
                         "acemask": "LIST_CONTAINER, READ_METADATA"}]),
            )
            .unwrap();
        let a = f.store.find_collection("/a").unwrap().unwrap();
        let ops = User::new("x", groups(&["ops"]));
        assert_eq!(
            f.store.authorized_actions(&ops, &a).unwrap(),
            [Action::Read].into_iter().collect()
        );

        // Data object names mean nothing on a container.
        f.store
            .update_cdmi_acl(
                "/a",
                &json!([{"acetype": "ALLOW", "identifier": "ops",
                         "acemask": "READ_METADATA, READ_OBJECT"}]),
            )
            .unwrap();
        let a = f.store.find_collection("/a").unwrap().unwrap();
        assert_eq!(a.acl.get("ops").unwrap().acemask, 0x08);
        assert!(f.store.authorized_actions(&ops, &a).unwrap().is_empty());
        assert!(matches!(
            f.store.update_cdmi_acl("/missing", &json!([])),
            Err(ModelError::NoSuchResource(_))
        ));
    }

    // ------------------------------------------------------------------
    // Side effects
    // ------------------------------------------------------------------

    #[test]
    fn mutations_are_indexed_and_notified() {
        let f = fixture();
        let mut metadata = Metadata::new();
        metadata.insert("project".into(), "apollo".into());
        let r = f
            .store
            .create_resource(
                "/",
                "annual_report.pdf",
                ResourceSpec {
                    metadata,
                    ..reference("file://h/r")
                },
            )
            .unwrap();
        assert_eq!(f.search.find("apollo"), vec![r.id.to_string()]);

        f.store.delete_resource("/annual_report.pdf").unwrap();
        assert!(f.search.find("apollo").is_empty());

        let topics: Vec<String> = f.outbox.all().iter().map(|n| n.topic()).collect();
        assert!(topics.contains(&"create/resource/annual_report.pdf".to_string()));
        assert!(topics.contains(&"delete/resource/annual_report.pdf".to_string()));
        assert!(f.outbox.pending().unwrap().is_empty());
    }

    // ------------------------------------------------------------------
    // Concurrency
    // ------------------------------------------------------------------

    #[test]
    fn racing_collection_creates_yield_one_winner() {
        let f = fixture();
        let store = Arc::new(f.store);
        let handles: Vec<_> = (0..12)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.create_collection("race", "/", Metadata::new()))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, ModelError::CollectionConflict(_))));
        assert_eq!(store.children("/").unwrap().collections, vec!["race"]);
    }

    #[test]
    fn racing_resource_and_collection_on_one_path() {
        let f = fixture();
        let store = Arc::new(f.store);
        let handles: Vec<_> = (0..12)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    if i % 2 == 0 {
                        store.create_collection("x", "/", Metadata::new()).map(|_| ())
                    } else {
                        store
                            .create_resource("/", "x", ResourceSpec::new("file://h/x"))
                            .map(|_| ())
                    }
                })
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| r.is_ok())
            .count();
        assert_eq!(winners, 1);
        let children = store.children("/").unwrap();
        assert_eq!(children.collections.len() + children.resources.len(), 1);
    }
}
