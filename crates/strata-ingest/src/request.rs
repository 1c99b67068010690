use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use strata_types::{merge, Metadata};

use crate::error::{IngestError, IngestResult};

/// One file waiting to become a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateRequest {
    pub source: PathBuf,
    pub container: String,
    pub name: String,
    pub mimetype: Option<String>,
    pub size: u64,
    /// Upper-cased extension without the dot; empty when there is none.
    pub file_type: String,
}

impl CreateRequest {
    /// Describe `source`, to be stored as `container/name`.
    pub fn for_file(source: &Path, container: &str, name: &str) -> IngestResult<Self> {
        let size = std::fs::metadata(source)
            .map_err(|e| IngestError::io(source, e))?
            .len();
        let mimetype = mime_guess::from_path(source)
            .first()
            .map(|m| m.essence_str().to_string());
        let file_type = source
            .extension()
            .map(|ext| ext.to_string_lossy().to_uppercase())
            .unwrap_or_default();
        Ok(Self {
            source: source.to_path_buf(),
            container: container.to_string(),
            name: name.to_string(),
            mimetype,
            size,
            file_type,
        })
    }

    /// Archive path of the resource.
    pub fn path(&self) -> String {
        merge(&self.container, &self.name)
    }

    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        if !self.file_type.is_empty() {
            metadata.insert("type".into(), self.file_type.clone().into());
        }
        metadata
    }

    /// Hex SHA-256 of the source file.
    pub fn digest(&self) -> IngestResult<String> {
        let mut file = File::open(&self.source).map_err(|e| IngestError::io(&self.source, e))?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher).map_err(|e| IngestError::io(&self.source, e))?;
        Ok(hex::encode(hasher.finalize()))
    }
}
