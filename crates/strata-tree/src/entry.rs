//! Physical rows of the tree table.
//!
//! Rows are keyed by `(container, name)`. Each partition (one container
//! path) has at most one [`DirectoryRecord`]: the attributes of the directory
//! at that path, shared by every row in the partition. Three row shapes
//! exist:
//!
//! | row | container | name |
//! |---|---|---|
//! | self-descriptor | the directory's own path | `.` |
//! | link | the parent's path | `child/` |
//! | object | the parent's path | `file` |

use serde::{Deserialize, Serialize};
use strata_acl::Acl;
use strata_types::{EntityId, StoredMetadata, Timestamp};

/// Name of the self-descriptor row.
pub const SELF_NAME: &str = ".";

/// Name of the link row for child collection `name`.
pub fn link_name(name: &str) -> String {
    format!("{name}/")
}

/// Directory-wide attributes, stored once per partition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    pub id: EntityId,
    pub metadata: StoredMetadata,
    pub acl: Acl,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

/// Attributes of a single resource row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub id: EntityId,
    pub url: String,
    pub mimetype: Option<String>,
    pub size: u64,
    pub checksum: Option<String>,
    pub metadata: StoredMetadata,
    pub acl: Acl,
    pub created_at: Timestamp,
    pub modified_at: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum EntryData {
    SelfDescriptor,
    Link,
    Object(ObjectRecord),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub container: String,
    pub name: String,
    pub data: EntryData,
}

impl TreeEntry {
    pub fn self_descriptor(path: &str) -> Self {
        Self {
            container: path.to_string(),
            name: SELF_NAME.to_string(),
            data: EntryData::SelfDescriptor,
        }
    }

    pub fn link(parent: &str, child: &str) -> Self {
        Self {
            container: parent.to_string(),
            name: link_name(child),
            data: EntryData::Link,
        }
    }

    pub fn object(container: &str, name: &str, record: ObjectRecord) -> Self {
        Self {
            container: container.to_string(),
            name: name.to_string(),
            data: EntryData::Object(record),
        }
    }

    /// Name of the child this row points at, without the link suffix.
    /// `None` for the self-descriptor.
    pub fn child_name(&self) -> Option<&str> {
        match self.data {
            EntryData::SelfDescriptor => None,
            EntryData::Link => Some(self.name.trim_end_matches('/')),
            EntryData::Object(_) => Some(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_rows_strip_suffix() {
        let link = TreeEntry::link("/a", "b");
        assert_eq!(link.name, "b/");
        assert_eq!(link.child_name(), Some("b"));
        assert_eq!(TreeEntry::self_descriptor("/a").child_name(), None);
    }
}
