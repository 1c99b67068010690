//! Url scheme dispatch for resource content.
//!
//! `cassandra://<blob>` resolves to the blob store; `file://<ip>/<path>`
//! resolves to the file-serving agent running on that host. Any other
//! scheme is an error.

use std::io::{ErrorKind, Read};
use std::sync::{Arc, OnceLock};

use strata_blob::INTERNAL_SCHEME;
use strata_types::{AgentSettings, EntityId};
use tracing::debug;

use crate::error::{ModelError, ModelResult};

/// Scheme of reference resources served by a remote agent.
pub const AGENT_SCHEME: &str = "file";

/// Split a url into `(scheme, location)`, where location is everything
/// after `://`.
pub fn parse_url(url: &str) -> ModelResult<(String, String)> {
    let (scheme, location) = url
        .split_once("://")
        .ok_or_else(|| ModelError::InvalidUrl(url.to_string()))?;
    if scheme.is_empty() {
        return Err(ModelError::InvalidUrl(url.to_string()));
    }
    Ok((scheme.to_ascii_lowercase(), location.to_string()))
}

/// Where a resource's bytes come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Driver {
    Blob(EntityId),
    Agent { address: String, path: String },
}

impl Driver {
    pub fn for_url(url: &str) -> ModelResult<Self> {
        let (scheme, location) = parse_url(url)?;
        match scheme.as_str() {
            INTERNAL_SCHEME => location
                .parse()
                .map(Self::Blob)
                .map_err(|_| ModelError::InvalidUrl(url.to_string())),
            AGENT_SCHEME => {
                let (address, path) = match location.find('/') {
                    Some(idx) => (&location[..idx], &location[idx..]),
                    None => (location.as_str(), "/"),
                };
                if address.is_empty() {
                    return Err(ModelError::InvalidUrl(url.to_string()));
                }
                Ok(Self::Agent {
                    address: address.to_string(),
                    path: path.to_string(),
                })
            }
            _ => Err(ModelError::NoSuchDriver(url.to_string())),
        }
    }
}

/// HTTP client for the remote file-serving agent.
///
/// The underlying `reqwest` client is built on the first fetch and shared by
/// every later fetch and every clone.
#[derive(Clone, Debug)]
pub struct AgentClient {
    port: u16,
    chunk_size: usize,
    http: Arc<OnceLock<reqwest::blocking::Client>>,
}

impl AgentClient {
    /// A client for agents listening on `settings.port`.
    pub fn new(settings: &AgentSettings) -> Self {
        Self {
            port: settings.port,
            chunk_size: settings.fetch_chunk_size.max(1),
            http: Arc::new(OnceLock::new()),
        }
    }

    fn http(&self) -> ModelResult<&reqwest::blocking::Client> {
        if let Some(client) = self.http.get() {
            return Ok(client);
        }
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ModelError::undiagnosed("building agent client", e))?;
        // A racing fetch may have stored its client first; either one will do.
        let _ = self.http.set(client);
        self.http
            .get()
            .ok_or_else(|| ModelError::Delivery("agent client unavailable".into()))
    }

    /// `http://<address>:<port>/get/<path>`. An address that already carries
    /// a port is used as is.
    pub fn content_url(&self, address: &str, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if address.contains(':') {
            format!("http://{address}/get/{path}")
        } else {
            format!("http://{address}:{}/get/{path}", self.port)
        }
    }

    /// Stream a file from the agent in fixed-size chunks.
    pub fn fetch(&self, address: &str, path: &str) -> ModelResult<ReaderChunks<reqwest::blocking::Response>> {
        let url = self.content_url(address, path);
        debug!(url = %url, "fetching from agent");
        let response = self
            .http()?
            .get(&url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| ModelError::undiagnosed(format!("fetching {url}"), e))?;
        Ok(ReaderChunks::new(response, self.chunk_size))
    }
}

/// Adapts a reader into an iterator of fixed-size chunks; only the last
/// chunk may be shorter.
pub struct ReaderChunks<R> {
    reader: R,
    chunk_size: usize,
    done: bool,
}

impl<R: Read> ReaderChunks<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(1),
            done: false,
        }
    }
}

impl<R: Read> Iterator for ReaderChunks<R> {
    type Item = ModelResult<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(ModelError::undiagnosed("reading remote content", e)));
                }
            }
        }
        if filled == 0 {
            return None;
        }
        buf.truncate(filled);
        Some(Ok(buf))
    }
}
