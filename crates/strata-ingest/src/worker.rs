use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crossbeam_channel::Receiver;
use strata_acl::Acl;
use strata_tree::{ModelError, PathStore, ResourceSpec, ResourceUpdate};
use tracing::{debug, error, warn};

use crate::error::{IngestError, IngestResult};
use crate::report::{IngestFailure, WorkerStats};
use crate::request::CreateRequest;

/// What a request did to the archive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Created,
    Updated,
    Unchanged,
}

/// Everything a worker thread needs; cloned once per thread.
#[derive(Clone)]
pub(crate) struct Worker {
    pub store: Arc<PathStore>,
    pub acl: Acl,
    pub local_ip: String,
    pub skip_import: bool,
    pub max_attempts: u32,
}

impl Worker {
    /// Drain `rx` until every sender is gone.
    pub fn run(self, rx: Receiver<CreateRequest>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        for request in rx.iter() {
            match self.process(&request) {
                Ok(Outcome::Created) => stats.created += 1,
                Ok(Outcome::Updated) => stats.updated += 1,
                Ok(Outcome::Unchanged) => stats.unchanged += 1,
                Err(e) => stats.failures.push(IngestFailure {
                    path: request.path(),
                    source: request.source.clone(),
                    attempts: self.max_attempts,
                    error: e.to_string(),
                }),
            }
        }
        stats
    }

    /// Run one request, retrying every error up to `max_attempts` times.
    pub fn process(&self, request: &CreateRequest) -> IngestResult<Outcome> {
        let path = request.path();
        let mut attempt = 1;
        loop {
            match self.attempt(request) {
                Ok(outcome) => return Ok(outcome),
                Err(e) if attempt < self.max_attempts => {
                    warn!(path = %path, attempt, error = %e, "ingest attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    error!(path = %path, attempts = attempt, error = %e, "giving up on file");
                    return Err(e);
                }
            }
        }
    }

    fn attempt(&self, request: &CreateRequest) -> IngestResult<Outcome> {
        let path = request.path();
        let (url, size, checksum) = if self.skip_import {
            (format!("file://{}{}", self.local_ip, path), request.size, None)
        } else {
            self.import(request, &path)?
        };

        let spec = ResourceSpec {
            url: url.clone(),
            mimetype: request.mimetype.clone(),
            size,
            checksum: checksum.clone(),
            metadata: request.metadata(),
            acl: self.acl.clone(),
        };
        let resource = match self.store.create_resource(&request.container, &request.name, spec) {
            Ok(_) => {
                debug!(path = %path, "resource created");
                return Ok(Outcome::Created);
            }
            Err(ModelError::ResourceConflict(_)) => self
                .store
                .find_resource(&path)?
                .ok_or_else(|| ModelError::NoSuchResource(path.clone()))?,
            Err(e) => return Err(e.into()),
        };

        if resource.url == url {
            self.store.reindex_resource(&resource);
            return Ok(Outcome::Unchanged);
        }
        self.store.update_resource(
            &path,
            ResourceUpdate {
                url: Some(url),
                size: Some(size),
                checksum,
                mimetype: request.mimetype.clone(),
                ..Default::default()
            },
        )?;
        debug!(path = %path, "resource url updated");
        Ok(Outcome::Updated)
    }

    /// Stream the file into the blob store, unless the existing resource
    /// already holds identical content.
    fn import(&self, request: &CreateRequest, path: &str) -> IngestResult<(String, u64, Option<String>)> {
        let digest = request.digest()?;
        if let Some(existing) = self.store.find_resource(path)? {
            if existing.is_internal() && existing.checksum.as_deref() == Some(digest.as_str()) {
                return Ok((existing.url, existing.size, Some(digest)));
            }
        }
        let file = File::open(&request.source).map_err(|e| IngestError::io(&request.source, e))?;
        let blob = self
            .store
            .blobs()
            .create_from_stream(BufReader::new(file), request.size)?;
        Ok((blob.url(), blob.size, Some(blob.hash)))
    }
}
