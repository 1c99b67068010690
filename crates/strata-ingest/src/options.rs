use std::path::PathBuf;

use crate::error::{IngestError, IngestResult};

pub const DEFAULT_LOCAL_IP: &str = "127.0.0.1";

/// Parameters of one ingestion run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestOptions {
    pub source_directory: PathBuf,
    /// Group granted write access on everything created.
    pub owner_group: String,
    pub owner_user: String,
    /// Address recorded in `file://` urls when import is skipped.
    pub local_ip: String,
    /// Record reference urls instead of copying content into the blob store.
    pub skip_import: bool,
    /// Only files whose path contains this substring are ingested.
    pub include_filter: Option<String>,
}

impl IngestOptions {
    pub fn new(
        source_directory: impl Into<PathBuf>,
        owner_group: impl Into<String>,
        owner_user: impl Into<String>,
    ) -> Self {
        Self {
            source_directory: source_directory.into(),
            owner_group: owner_group.into(),
            owner_user: owner_user.into(),
            local_ip: DEFAULT_LOCAL_IP.to_string(),
            skip_import: false,
            include_filter: None,
        }
    }

    pub fn validate(&self) -> IngestResult<()> {
        if self.owner_group.trim().is_empty() || self.owner_user.trim().is_empty() {
            return Err(IngestError::InvalidOptions(
                "group and user are both required".into(),
            ));
        }
        if !self.source_directory.is_dir() {
            return Err(IngestError::InvalidOptions(format!(
                "{} is not a directory",
                self.source_directory.display()
            )));
        }
        if self.local_ip.trim().is_empty() {
            return Err(IngestError::InvalidOptions("local ip is empty".into()));
        }
        Ok(())
    }

    /// `true` when `path` passes the include filter.
    pub fn includes(&self, path: &str) -> bool {
        self.include_filter
            .as_deref()
            .map_or(true, |needle| path.contains(needle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation() {
        let dir = tempfile::tempdir().unwrap();
        let ok = IngestOptions::new(dir.path(), "staff", "alice");
        ok.validate().unwrap();
        assert_eq!(ok.local_ip, "127.0.0.1");

        let mut no_group = ok.clone();
        no_group.owner_group = " ".into();
        assert!(no_group.validate().is_err());

        let missing = IngestOptions::new(dir.path().join("nope"), "staff", "alice");
        assert!(matches!(missing.validate(), Err(IngestError::InvalidOptions(_))));

        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        assert!(IngestOptions::new(&file, "staff", "alice").validate().is_err());
    }

    #[test]
    fn include_filter() {
        let mut opts = IngestOptions::new("/tmp", "g", "u");
        assert!(opts.includes("/anything"));
        opts.include_filter = Some("raw".into());
        assert!(opts.includes("/data/raw/a.csv"));
        assert!(!opts.includes("/data/clean/a.csv"));
    }
}
