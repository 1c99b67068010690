use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam_channel::Sender;
use strata_acl::{AccessLevel, Acl, MaskDomain};
use strata_tree::{Collection, ModelError, PathStore};
use strata_types::{merge, split, IngestSettings, Metadata, ROOT};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

use crate::cache::DirectoryCache;
use crate::error::{IngestError, IngestResult};
use crate::options::IngestOptions;
use crate::report::{IngestFailure, IngestReport};
use crate::request::CreateRequest;
use crate::timer::PhaseTimer;
use crate::worker::Worker;

/// Mirrors a local directory tree into the archive.
///
/// A single walker creates collections top-down, so every parent exists
/// before its children, and pushes one [`CreateRequest`] per file onto a
/// bounded channel. A fixed pool of worker threads drains the channel.
/// The walker blocks while the channel is full.
pub struct Ingester {
    store: Arc<PathStore>,
    settings: IngestSettings,
    options: IngestOptions,
}

/// Walker-side state for one run.
struct Walk<'a> {
    cache: DirectoryCache,
    timer: PhaseTimer,
    tx: &'a Sender<CreateRequest>,
    collections_created: u64,
    failures: Vec<IngestFailure>,
}

impl Ingester {
    /// An ingester over `store`; nothing runs until [`run`](Self::run).
    pub fn new(store: Arc<PathStore>, settings: IngestSettings, options: IngestOptions) -> Self {
        Self {
            store,
            settings,
            options,
        }
    }

    /// Ingest the whole source tree and wait for every queued file.
    ///
    /// Files and directories that cannot be ingested end up in
    /// [`IngestReport::failures`]; only invalid options, a missing root or a
    /// dead worker pool fail the run itself.
    pub fn run(&self) -> IngestResult<IngestReport> {
        self.options.validate()?;
        let started = Instant::now();
        let root = self.store.create_root()?;

        let worker_count = self.settings.worker_count();
        info!(
            source = %self.options.source_directory.display(),
            group = %self.options.owner_group,
            user = %self.options.owner_user,
            workers = worker_count,
            import = !self.options.skip_import,
            "ingest started"
        );

        let (tx, rx) = crossbeam_channel::bounded::<CreateRequest>(self.settings.queue_capacity.max(1));
        let worker = Worker {
            store: Arc::clone(&self.store),
            acl: self.owner_acl(MaskDomain::Object),
            local_ip: self.options.local_ip.clone(),
            skip_import: self.options.skip_import,
            max_attempts: self.settings.max_attempts.max(1),
        };
        let mut handles = Vec::with_capacity(worker_count);
        for idx in 0..worker_count {
            let rx = rx.clone();
            let worker = worker.clone();
            let handle = thread::Builder::new()
                .name(format!("ingest-worker-{idx}"))
                .spawn(move || worker.run(rx))
                .map_err(IngestError::Spawn)?;
            handles.push(handle);
        }
        drop(rx);

        let mut walk = Walk {
            cache: DirectoryCache::new(self.settings.cache_capacity),
            timer: PhaseTimer::new(),
            tx: &tx,
            collections_created: 0,
            failures: Vec::new(),
        };
        walk.cache.insert(root);
        self.walk(&mut walk);
        let Walk {
            timer,
            collections_created,
            failures,
            ..
        } = walk;

        // Workers exit once the queue is drained and the sender is gone.
        drop(tx);
        let drain_started = Instant::now();
        let mut report = IngestReport {
            collections_created,
            failures,
            ..Default::default()
        };
        for handle in handles {
            match handle.join() {
                Ok(stats) => report.absorb(stats),
                Err(_) => return Err(IngestError::WorkerPanicked),
            }
        }
        debug!(wait_ms = drain_started.elapsed().as_millis() as u64, "queue drained");

        report.elapsed = started.elapsed();
        timer.summary();
        info!(
            collections = report.collections_created,
            created = report.resources_created,
            updated = report.resources_updated,
            unchanged = report.resources_unchanged,
            failed = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "ingest finished"
        );
        Ok(report)
    }

    fn walk(&self, walk: &mut Walk<'_>) {
        let source = self.options.source_directory.as_path();
        let mut entries = WalkDir::new(source)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        while let Some(entry) = entries.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            let Some(archive_path) = archive_path(source, entry.path()) else {
                warn!(path = %entry.path().display(), "skipping entry with a blank name");
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            };
            if entry.file_type().is_dir() {
                info!(path = %archive_path, "processing directory");
                walk.timer.enter("get-collection");
                let collection = self.ensure_collection(&archive_path, walk);
                walk.timer.exit("get-collection");
                if let Err(e) = collection {
                    warn!(path = %archive_path, error = %e, "skipping directory");
                    walk.failures.push(IngestFailure {
                        path: archive_path,
                        source: entry.path().to_path_buf(),
                        attempts: 1,
                        error: e.to_string(),
                    });
                    entries.skip_current_dir();
                }
            } else if entry.file_type().is_file() {
                if !self.wants_file(&entry) {
                    continue;
                }
                let (container, name) = split(&archive_path);
                let request = match CreateRequest::for_file(entry.path(), &container, &name) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(path = %archive_path, error = %e, "skipping file");
                        continue;
                    }
                };
                walk.timer.enter("push");
                let sent = walk.tx.send(request);
                walk.timer.exit("push");
                if sent.is_err() {
                    // Every worker is gone; the join reports why.
                    warn!("ingest workers stopped, abandoning walk");
                    return;
                }
            }
        }
    }

    fn wants_file(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if self
            .settings
            .skip_extensions
            .iter()
            .any(|ext| name.ends_with(ext.as_str()))
        {
            return false;
        }
        self.options.includes(&entry.path().to_string_lossy())
    }

    /// Cached collection, stored collection, or a freshly created one.
    fn ensure_collection(&self, path: &str, walk: &mut Walk<'_>) -> IngestResult<Collection> {
        if let Some(collection) = walk.cache.get(path) {
            return Ok(collection.clone());
        }
        if let Some(collection) = self.store.find_collection(path)? {
            walk.cache.insert(collection.clone());
            return Ok(collection);
        }
        let (parent, name) = split(path);
        let collection = match self.store.create_collection_with_acl(
            &name,
            &parent,
            Metadata::new(),
            self.owner_acl(MaskDomain::Container),
        ) {
            Ok(collection) => {
                walk.collections_created += 1;
                collection
            }
            Err(ModelError::CollectionConflict(_)) => self
                .store
                .find_collection(path)?
                .ok_or_else(|| ModelError::NoSuchCollection(path.to_string()))?,
            Err(e) => return Err(e.into()),
        };
        walk.cache.insert(collection.clone());
        Ok(collection)
    }

    fn owner_acl(&self, domain: MaskDomain) -> Acl {
        let mut acl = Acl::new();
        acl.set_level(&self.options.owner_group, AccessLevel::Write, domain);
        acl
    }
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Archive path of an entry below the source directory.
///
/// Each name is trimmed the way the store trims names on create, so the
/// path the walker and workers look up is the path that was stored. `None`
/// when a name is blank after trimming.
fn archive_path(source: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(source).unwrap_or(path);
    let mut archive = ROOT.to_string();
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        archive = merge(&archive, name);
    }
    Some(archive)
}
